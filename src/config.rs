// Client configuration: connection settings plus the polling bounds
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api-testing.mozio.com/v2/";

pub const ENV_API_KEY: &str = "TRANSFER_API_KEY";
pub const ENV_BASE_URL: &str = "TRANSFER_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "TRANSFER_REQUEST_TIMEOUT_MS";
pub const ENV_POLL_INTERVAL_MS: &str = "TRANSFER_POLL_INTERVAL_MS";
pub const ENV_POLL_MAX_ATTEMPTS: &str = "TRANSFER_POLL_MAX_ATTEMPTS";
pub const ENV_POLL_TIMEOUT_MS: &str = "TRANSFER_POLL_TIMEOUT_MS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error("Initialization error: {0}")]
    InitError(String),
}

// Polling bounds shared by every async operation of a client.
// `None` for both bounds means poll until the server says the operation is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_attempts: Option<u32>,
    pub timeout_ms: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: None,
            timeout_ms: None,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeout_ms: 30_000,
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup, falling back to
    /// the defaults for everything except the API key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup(ENV_API_KEY)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_API_KEY))?;
        let base_url = lookup(ENV_BASE_URL).unwrap_or(defaults.base_url);
        let timeout_ms =
            parse_optional(&lookup, ENV_REQUEST_TIMEOUT_MS)?.unwrap_or(defaults.timeout_ms);

        let poll = PollConfig {
            interval_ms: parse_optional(&lookup, ENV_POLL_INTERVAL_MS)?
                .unwrap_or(defaults.poll.interval_ms),
            max_attempts: parse_optional(&lookup, ENV_POLL_MAX_ATTEMPTS)?,
            timeout_ms: parse_optional(&lookup, ENV_POLL_TIMEOUT_MS)?,
        };

        let config = Self {
            base_url,
            api_key,
            timeout_ms,
            poll,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_API_KEY));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: ENV_BASE_URL,
                message: format!("expected an http(s) URL, got '{}'", self.base_url),
            });
        }
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_POLL_INTERVAL_MS,
                message: "poll interval must be greater than zero".to_string(),
            });
        }
        if self.poll.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: ENV_POLL_MAX_ATTEMPTS,
                message: "at least one poll attempt is required".to_string(),
            });
        }
        Ok(())
    }

    // Base URL guaranteed to end with a single '/', so endpoint paths can be appended
    pub fn normalized_base_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_optional<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key,
                message: format!("'{}': {}", raw, e),
            }),
    }
}
