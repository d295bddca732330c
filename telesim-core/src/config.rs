use crate::{
    DEFAULT_DURATION, DEFAULT_ENDPOINT, DEFAULT_MAX_IDLE_CONNECTIONS, DEFAULT_RATE,
    DEFAULT_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid endpoint URL `{0}`: {1}")]
    InvalidEndpoint(String, #[source] url::ParseError),

    #[error("Unsupported endpoint scheme `{0}`, expected http or https")]
    UnsupportedScheme(String),

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Parameters of a single run.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub endpoint: String,
    pub rate: NonZeroU32,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    pub seed: Option<u64>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
    pub max_idle_connections: usize,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub progress_interval: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl RunConfig {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            rate: DEFAULT_RATE,
            duration: DEFAULT_DURATION,
            seed: None,
            timeout: DEFAULT_TIMEOUT,
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            progress_interval: None,
        }
    }

    pub fn rate(mut self, rate: NonZeroU32) -> Self {
        self.rate = rate;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_idle_connections(mut self, max_idle_connections: usize) -> Self {
        self.max_idle_connections = max_idle_connections;
        self
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    /// Upper bound on dispatches if every tick fits in its second.
    pub fn planned_requests(&self) -> u64 {
        u64::from(self.rate.get()) * self.duration.as_secs()
    }

    /// Checks the parameters and returns the parsed endpoint.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::InvalidEndpoint(self.endpoint.clone(), e))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(url)
    }
}
