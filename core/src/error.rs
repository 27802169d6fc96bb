//! Error taxonomy for the gate resolution pipeline.
//!
//! Only the config fetch and the primary request/parse stages can fail an
//! attempt. Redirect resolution and the secondary probe degrade instead of
//! erroring, so their failure modes never appear here.

use thiserror::Error;

/// Terminal outcome of a failed resolution attempt.
#[derive(Debug, Error)]
pub enum GateError {
    /// The remote config read returned nothing.
    #[error("remote config read returned no data")]
    NoData,

    /// A document, response body, or assembled URL was structurally wrong.
    #[error("invalid gate configuration or response")]
    InvalidConfig,

    /// Transport-level failure, cause preserved.
    #[error("network error: {0}")]
    Network(reqwest::Error),

    /// An explicit race deadline elapsed with no usable alternative.
    #[error("gate resolution timed out")]
    Timeout,
}

/// Failure fetching the remote endpoint config.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config store read failed")]
    NoData,

    #[error("config document missing or malformed")]
    InvalidConfig,
}

impl From<ConfigError> for GateError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoData => GateError::NoData,
            ConfigError::InvalidConfig => GateError::InvalidConfig,
        }
    }
}

/// Opaque transport error from a [`crate::ConfigStore`] implementation.
#[derive(Debug, Error)]
#[error("config store read failed: {0}")]
pub struct ConfigStoreError(pub String);
