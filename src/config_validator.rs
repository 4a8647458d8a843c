use crate::config::Config;
use crate::error::VerseError;
use std::path::Path;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL. An empty URL means Redis is not used.
    pub fn validate_redis_url(url: &str) -> Result<(), VerseError> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(());
        }

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(VerseError::Config(
                "Redis URL must start with 'redis://' or 'rediss://'".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates the verse table path
    pub fn validate_data_path(path: &Path) -> Result<(), VerseError> {
        if path.as_os_str().is_empty() {
            return Err(VerseError::Config("Data path cannot be empty".to_string()));
        }

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Verse table not found, the store will be empty"
            );
        }

        Ok(())
    }

    pub fn validate(config: &Config) -> Result<(), VerseError> {
        Self::validate_redis_url(&config.redis_url)?;
        Self::validate_data_path(&config.data_path)?;
        Ok(())
    }
}
