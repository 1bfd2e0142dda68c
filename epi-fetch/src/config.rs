use std::time::Duration;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 2;
pub(crate) const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

pub(crate) const ENV_BASE_URL: &str = "EPI_API_BASE_URL";
pub(crate) const ENV_TIMEOUT_MS: &str = "EPI_API_TIMEOUT_MS";
pub(crate) const ENV_MAX_RETRIES: &str = "EPI_API_MAX_RETRIES";
pub(crate) const ENV_RETRY_DELAY_MS: &str = "EPI_API_RETRY_DELAY_MS";

/// Errors loading a [`ClientConfig`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable isn't set.
    #[error("missing env: {0}")]
    Missing(&'static str),
    /// A variable is set but can't be parsed.
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Settings for [`crate::HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// The backend origin all paths are joined onto, e.g. `https://api.example.com/api`.
    pub base_url: String,
    /// Per attempt request timeout.
    pub timeout: Duration,
    /// How many times a transport, timeout or 5xx failure is retried.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl ClientConfig {
    /// A config for `base_url` with default timeout and retries.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Default: `30 seconds`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default: `2`
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Default: `1 second`
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Load from the process environment.
    ///
    /// `EPI_API_BASE_URL` is required, `EPI_API_TIMEOUT_MS`, `EPI_API_MAX_RETRIES` and
    /// `EPI_API_RETRY_DELAY_MS` override the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(ENV_BASE_URL)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing(ENV_BASE_URL))?;
        let mut config = Self::new(base_url);
        if let Some(timeout_ms) = parse_var::<u64>(&lookup, ENV_TIMEOUT_MS)? {
            config.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(max_retries) = parse_var::<u32>(&lookup, ENV_MAX_RETRIES)? {
            config.max_retries = max_retries;
        }
        if let Some(retry_delay_ms) = parse_var::<u64>(&lookup, ENV_RETRY_DELAY_MS)? {
            config.retry_delay = Duration::from_millis(retry_delay_ms);
        }
        Ok(config)
    }
}

fn parse_var<V>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<V>, ConfigError>
where
    V: std::str::FromStr,
    V::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<V>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
    }
}
