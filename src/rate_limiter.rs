use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Result, VerseError};

/// Requests admitted per client per window.
pub const RATE_LIMIT: u64 = 25;
/// Length of a rate window.
pub const RATE_WINDOW: Duration = Duration::from_millis(60_000);

/// Storage for fixed-window request counters.
///
/// Implementations must perform the check and the increment as one step.
pub trait WindowStore: Send + Sync {
    /// Count one request for `identity` and report whether it is admitted.
    fn try_acquire(&self, identity: &str, limit: u64, window: Duration, now_ms: u64)
        -> Result<bool>;

    /// Short name for logs and health output.
    fn backend(&self) -> &'static str;

    /// Whether `try_acquire` does blocking I/O and must stay off async workers.
    fn is_blocking(&self) -> bool {
        false
    }
}

/// Per-client counter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    pub count: u64,
    pub reset_at_ms: u64,
}

/// In-process window storage.
#[derive(Clone, Default)]
pub struct LocalWindows {
    windows: Arc<Mutex<HashMap<String, RateWindow>>>,
}

impl LocalWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current window for an identity, if one exists.
    pub fn window(&self, identity: &str) -> Option<RateWindow> {
        self.windows
            .lock()
            .ok()
            .and_then(|windows| windows.get(identity).copied())
    }

    /// Number of tracked identities.
    pub fn len(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop windows that have already expired. Returns how many were removed.
    ///
    /// An expired window is replaced on the next request anyway, so removing
    /// it never changes an admission decision.
    pub fn sweep(&self, now_ms: u64) -> Result<usize> {
        let mut windows = self.windows.lock().map_err(|_| {
            VerseError::Internal("Failed to acquire write lock on rate windows".to_string())
        })?;

        let initial_count = windows.len();
        windows.retain(|_, window| now_ms <= window.reset_at_ms);
        Ok(initial_count - windows.len())
    }
}

impl WindowStore for LocalWindows {
    fn try_acquire(
        &self,
        identity: &str,
        limit: u64,
        window: Duration,
        now_ms: u64,
    ) -> Result<bool> {
        let mut windows = self.windows.lock().map_err(|_| {
            VerseError::Internal("Failed to acquire write lock on rate windows".to_string())
        })?;

        if let Some(current) = windows.get_mut(identity) {
            if now_ms <= current.reset_at_ms {
                if current.count >= limit {
                    return Ok(false);
                }
                current.count += 1;
                return Ok(true);
            }
        }

        // First request, or the previous window has passed.
        windows.insert(
            identity.to_string(),
            RateWindow {
                count: 1,
                reset_at_ms: now_ms + window.as_millis() as u64,
            },
        );
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Fixed-window request governor keyed by client identity.
#[derive(Clone)]
pub struct RateGovernor {
    store: Arc<dyn WindowStore>,
}

impl RateGovernor {
    pub fn new(store: Arc<dyn WindowStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(LocalWindows::new()))
    }

    pub fn limit(&self) -> u64 {
        RATE_LIMIT
    }

    pub fn window(&self) -> Duration {
        RATE_WINDOW
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Admit or reject one request from `identity` at the current time.
    pub fn admit(&self, identity: &str) -> bool {
        self.admit_at(identity, now_ms())
    }

    /// Admit or reject one request from async code.
    ///
    /// Blocking stores run on the blocking pool so a slow backend never
    /// stalls a runtime worker.
    pub async fn admit_async(&self, identity: &str) -> bool {
        if !self.store.is_blocking() {
            return self.admit(identity);
        }

        let governor = self.clone();
        let owned = identity.to_string();
        match tokio::task::spawn_blocking(move || governor.admit(&owned)).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(
                    target: "shloka::rate_limiter",
                    identity = %identity,
                    error = %e,
                    "Rate window task failed, admitting request"
                );
                true
            }
        }
    }

    /// Admit or reject one request from `identity` at `now_ms`.
    ///
    /// A failing store admits the request rather than failing it.
    pub fn admit_at(&self, identity: &str, now_ms: u64) -> bool {
        match self
            .store
            .try_acquire(identity, RATE_LIMIT, RATE_WINDOW, now_ms)
        {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(
                    target: "shloka::rate_limiter",
                    identity = %identity,
                    error = %e,
                    "Rate window store failed, admitting request"
                );
                true
            }
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
