//! Client configuration

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, Result},
    retry::DEFAULT_MAX_DELAY,
};

/// Production API host
pub const DEFAULT_BASE_URL: &str = "https://mvsep.com";

/// Environment variable holding the API token
pub const ENV_API_TOKEN: &str = "AUDIOSEP_API_TOKEN";
const ENV_BASE_URL: &str = "AUDIOSEP_BASE_URL";
const ENV_TIMEOUT_SECS: &str = "AUDIOSEP_TIMEOUT_SECS";
const ENV_MAX_RETRIES: &str = "AUDIOSEP_MAX_RETRIES";
const ENV_DEBUG: &str = "AUDIOSEP_DEBUG";

/// Name of the token field in forms and query strings
pub(crate) const TOKEN_PARAM: &str = "api_token";

/// Separation client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API token sent with every request
    #[serde(default)]
    pub api_token: String,

    /// API base address
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt timeout
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Ceiling for any wait between attempts, server `Retry-After` hints included
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay: Duration,

    /// Log request lines and response bodies
    #[serde(default)]
    pub debug: bool,

    /// Headers merged into every request
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,

    /// Custom user agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: default_base_url(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            max_retry_delay: default_max_retry_delay(),
            debug: false,
            custom_headers: HashMap::new(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Create a config with the given token and defaults for everything else
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            ..Default::default()
        }
    }

    /// Load configuration from `AUDIOSEP_*` environment variables
    ///
    /// Only the token is required; unset or unparseable optional values keep their defaults.
    pub fn from_env() -> Result<Self> {
        let api_token = std::env::var(ENV_API_TOKEN).map_err(|_| {
            ApiError::invalid(format!("API token not found, set {ENV_API_TOKEN}"))
        })?;

        let mut config = Self::new(api_token);

        if let Ok(base_url) = std::env::var(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(secs) = env_parse::<u64>(ENV_TIMEOUT_SECS) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_parse::<u32>(ENV_MAX_RETRIES) {
            config.max_retries = retries;
        }
        if let Ok(debug) = std::env::var(ENV_DEBUG) {
            config.debug = matches!(debug.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Check required settings
    pub fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(ApiError::invalid("API token is required"));
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| ApiError::invalid(format!("Invalid base URL '{}': {e}", self.base_url)))?;

        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_max_retry_delay(mut self, max_retry_delay: Duration) -> Self {
        self.max_retry_delay = max_retry_delay;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

// Default value functions for serde
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_retry_delay() -> Duration {
    DEFAULT_MAX_DELAY
}

fn default_user_agent() -> String {
    format!("audiosep/{}", env!("CARGO_PKG_VERSION"))
}
