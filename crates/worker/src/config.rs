use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Worker settings, read from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Same root the media service writes uploads to.
    pub storage_root: PathBuf,
    pub poll_interval: Duration,
    /// Running jobs older than this are considered abandoned.
    pub stale_after_secs: i64,
    pub stale_check_interval: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage_root: String = env_or("MEDIA_STORAGE_ROOT", "./storage/photos".to_string())?;
        let poll_ms: u64 = env_or("WORKER_POLL_INTERVAL_MS", 1000)?;
        let stale_after_secs: i64 = env_or("WORKER_STALE_JOB_SECS", 600)?;
        let stale_check_secs: u64 = env_or("WORKER_STALE_CHECK_SECS", 60)?;

        if poll_ms == 0 || stale_check_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "WORKER_POLL_INTERVAL_MS",
                value: format!("{poll_ms}ms/{stale_check_secs}s"),
                reason: "intervals must be positive".into(),
            });
        }

        Ok(Self {
            storage_root: PathBuf::from(storage_root),
            poll_interval: Duration::from_millis(poll_ms),
            stale_after_secs,
            stale_check_interval: Duration::from_secs(stale_check_secs),
        })
    }
}

fn env_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn unset_variables_use_defaults() {
        let value: u64 = env_or("KINDRED_WORKER_TEST_UNSET", 1000).unwrap();
        assert_eq!(value, 1000);
    }

    #[test]
    fn garbage_interval_is_reported() {
        std::env::set_var("KINDRED_WORKER_TEST_BAD", "soon");
        let result: Result<u64, _> = env_or("KINDRED_WORKER_TEST_BAD", 1);
        assert_matches!(result, Err(ConfigError::Invalid { name: "KINDRED_WORKER_TEST_BAD", .. }));
    }
}
