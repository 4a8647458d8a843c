use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use crate::query::QueryEngine;
use crate::rate_limiter::RateGovernor;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub verses: usize,
    pub rate_limit: RateLimitInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: u64,
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub backend: String,
}

static START_TIME: std::sync::LazyLock<SystemTime> = std::sync::LazyLock::new(SystemTime::now);

/// Marks the process start for uptime reporting.
pub fn mark_started() {
    std::sync::LazyLock::force(&START_TIME);
}

pub struct HealthChecker<'a> {
    queries: &'a QueryEngine,
    governor: &'a RateGovernor,
}

impl<'a> HealthChecker<'a> {
    pub fn new(queries: &'a QueryEngine, governor: &'a RateGovernor) -> Self {
        Self { queries, governor }
    }

    /// An empty store is reported as degraded: the service answers but has nothing to serve.
    pub fn check_health(&self) -> HealthStatus {
        let now = SystemTime::now();
        let uptime = now.duration_since(*START_TIME).unwrap_or_default().as_secs();
        let verses = self.queries.count();

        let status = if verses > 0 { "healthy" } else { "degraded" };

        HealthStatus {
            status: status.to_string(),
            timestamp: now
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            verses,
            rate_limit: RateLimitInfo {
                limit: self.governor.limit(),
                window: self.governor.window(),
                backend: self.governor.backend().to_string(),
            },
        }
    }
}
