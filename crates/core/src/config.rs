//! Runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into services. Nothing in
//! this crate reads process-wide environment variables while handling a case or a request; the
//! `from_env` constructors exist for binaries and delegate to pure `*_from_env_value` helpers
//! that tests can call directly.

use crate::constants::{
    CASES_DIR_NAME, DEFAULT_ALERT_AFTER_ATTEMPTS, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_BACKEND_URL,
    DEFAULT_DATA_DIR, DEFAULT_QUEUE_DIR,
};
use crate::error::{CoreError, CoreResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_URL: &str = "SWASTH_API_URL";
pub const ENV_QUEUE_DIR: &str = "SWASTH_QUEUE_DIR";
pub const ENV_SUBMIT_TIMEOUT_SECS: &str = "SWASTH_SUBMIT_TIMEOUT_SECS";
pub const ENV_ALERT_AFTER_ATTEMPTS: &str = "SWASTH_ALERT_AFTER_ATTEMPTS";
pub const ENV_DATA_DIR: &str = "SWASTH_DATA_DIR";
pub const ENV_TAXONOMY_FILE: &str = "SWASTH_TAXONOMY_FILE";

/// Device-side configuration for submitting cases.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    backend_url: String,
    queue_dir: PathBuf,
    attempt_timeout: Duration,
    alert_after_attempts: u32,
    taxonomy_file: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(
        backend_url: String,
        queue_dir: PathBuf,
        attempt_timeout: Duration,
        alert_after_attempts: u32,
    ) -> CoreResult<Self> {
        let backend_url = backend_url.trim().trim_end_matches('/').to_owned();
        if !(backend_url.starts_with("http://") || backend_url.starts_with("https://")) {
            return Err(CoreError::InvalidInput(format!(
                "backend URL must start with http:// or https://, got '{backend_url}'"
            )));
        }
        if attempt_timeout.is_zero() {
            return Err(CoreError::InvalidInput(
                "attempt timeout must be greater than zero".into(),
            ));
        }
        if alert_after_attempts == 0 {
            return Err(CoreError::InvalidInput(
                "alert threshold must be greater than zero".into(),
            ));
        }

        Ok(Self {
            backend_url,
            queue_dir,
            attempt_timeout,
            alert_after_attempts,
            taxonomy_file: None,
        })
    }

    /// Builds the configuration from raw (possibly unset) environment values.
    pub fn from_env_values(
        backend_url: Option<String>,
        queue_dir: Option<String>,
        timeout_secs: Option<String>,
        alert_after_attempts: Option<String>,
        taxonomy_file: Option<String>,
    ) -> CoreResult<Self> {
        let config = Self::new(
            non_empty(backend_url).unwrap_or_else(|| DEFAULT_BACKEND_URL.into()),
            path_from_env_value(queue_dir, DEFAULT_QUEUE_DIR),
            duration_secs_from_env_value(
                ENV_SUBMIT_TIMEOUT_SECS,
                timeout_secs,
                DEFAULT_ATTEMPT_TIMEOUT,
            )?,
            positive_u32_from_env_value(
                ENV_ALERT_AFTER_ATTEMPTS,
                alert_after_attempts,
                DEFAULT_ALERT_AFTER_ATTEMPTS,
            )?,
        )?;
        Ok(config.with_taxonomy_file(non_empty(taxonomy_file).map(PathBuf::from)))
    }

    pub fn from_env() -> CoreResult<Self> {
        Self::from_env_values(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_QUEUE_DIR).ok(),
            std::env::var(ENV_SUBMIT_TIMEOUT_SECS).ok(),
            std::env::var(ENV_ALERT_AFTER_ATTEMPTS).ok(),
            std::env::var(ENV_TAXONOMY_FILE).ok(),
        )
    }

    pub fn with_taxonomy_file(mut self, taxonomy_file: Option<PathBuf>) -> Self {
        self.taxonomy_file = taxonomy_file;
        self
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    pub fn queue_dir(&self) -> &Path {
        &self.queue_dir
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn alert_after_attempts(&self) -> u32 {
        self.alert_after_attempts
    }

    pub fn taxonomy_file(&self) -> Option<&Path> {
        self.taxonomy_file.as_deref()
    }
}

/// Review backend configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    data_dir: PathBuf,
}

impl ServerConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn from_env_value(data_dir: Option<String>) -> Self {
        Self::new(path_from_env_value(data_dir, DEFAULT_DATA_DIR))
    }

    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(ENV_DATA_DIR).ok())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cases_dir(&self) -> PathBuf {
        self.data_dir.join(CASES_DIR_NAME)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a directory from an optional value, falling back to `default` when unset or blank.
pub fn path_from_env_value(value: Option<String>, default: &str) -> PathBuf {
    PathBuf::from(non_empty(value).unwrap_or_else(|| default.to_owned()))
}

/// Parse a whole number of seconds. Unset or blank yields `default`; zero is rejected.
pub fn duration_secs_from_env_value(
    name: &str,
    value: Option<String>,
    default: Duration,
) -> CoreResult<Duration> {
    match non_empty(value) {
        None => Ok(default),
        Some(v) => match v.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(CoreError::InvalidInput(format!(
                "{name} must be a positive number of seconds, got '{v}'"
            ))),
        },
    }
}

/// Parse a positive integer. Unset or blank yields `default`.
pub fn positive_u32_from_env_value(
    name: &str,
    value: Option<String>,
    default: u32,
) -> CoreResult<u32> {
    match non_empty(value) {
        None => Ok(default),
        Some(v) => match v.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(CoreError::InvalidInput(format!(
                "{name} must be a positive integer, got '{v}'"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults_when_unset() {
        let config = ClientConfig::from_env_values(None, None, None, None, None).unwrap();

        assert_eq!(config.backend_url(), "http://localhost:8000");
        assert_eq!(config.queue_dir(), Path::new("swasth_queue"));
        assert_eq!(config.attempt_timeout(), Duration::from_secs(10));
        assert_eq!(config.alert_after_attempts(), 10);
        assert_eq!(config.taxonomy_file(), None);
    }

    #[test]
    fn test_client_values_are_trimmed_and_parsed() {
        let config = ClientConfig::from_env_values(
            Some(" https://review.example.org/ ".into()),
            Some("/var/lib/swasth".into()),
            Some("3".into()),
            Some("  ".into()),
            Some("groups.yaml".into()),
        )
        .unwrap();

        assert_eq!(config.backend_url(), "https://review.example.org");
        assert_eq!(config.queue_dir(), Path::new("/var/lib/swasth"));
        assert_eq!(config.attempt_timeout(), Duration::from_secs(3));
        assert_eq!(config.alert_after_attempts(), 10);
        assert_eq!(config.taxonomy_file(), Some(Path::new("groups.yaml")));
    }

    #[test]
    fn test_zero_and_garbage_numbers_rejected() {
        for timeout in ["0", "-1", "ten"] {
            assert!(
                ClientConfig::from_env_values(None, None, Some(timeout.into()), None, None)
                    .is_err(),
                "timeout {timeout:?} should be rejected"
            );
        }
        assert!(ClientConfig::from_env_values(None, None, None, Some("0".into()), None).is_err());
    }

    #[test]
    fn test_backend_url_must_be_http() {
        let err = ClientConfig::from_env_values(Some("ftp://x".into()), None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn test_server_config_cases_dir() {
        let config = ServerConfig::from_env_value(None);
        assert_eq!(config.data_dir(), Path::new("swasth_data"));
        assert_eq!(config.cases_dir(), PathBuf::from("swasth_data").join("cases"));

        let config = ServerConfig::from_env_value(Some("/srv/swasth".into()));
        assert_eq!(config.cases_dir(), PathBuf::from("/srv/swasth/cases"));
    }
}
