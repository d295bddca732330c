use telesim_core::ConfigError;
use thiserror::Error;

/// Conditions that abort a run before the first tick.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
