//! Error types for the exporter core.
//!
//! Refresh tasks swallow [`Error::FetchFailed`] and [`Error::DecodeFailed`]
//! at their boundary and try again on the next tick. Discovery treats
//! [`Error::ProviderFailed`] as "no target from this provider", while
//! [`Error::ProviderLoadFailed`] and [`Error::Config`] abort startup.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// Request could not be issued, timed out, or returned a non-2xx status.
    #[error("fetch {url} failed: {cause}")]
    FetchFailed { url: String, cause: String },

    /// Response body did not match the expected shape (including bad dates).
    #[error("decode {url} failed: {cause}")]
    DecodeFailed { url: String, cause: String },

    /// A discovery provider ran but could not determine a product/version.
    #[error("provider '{provider}' failed: {reason}")]
    ProviderFailed { provider: String, reason: String },

    /// A configured provider name is unknown or its definition is invalid.
    #[error("provider '{provider}' could not be loaded: {reason}")]
    ProviderLoadFailed { provider: String, reason: String },

    /// Invalid configuration file or values.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Gauge definition or registration rejected by the metrics registry.
    #[error("metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::FetchFailed { .. } => "fetch_failed",
            Error::DecodeFailed { .. } => "decode_failed",
            Error::ProviderFailed { .. } => "provider_failed",
            Error::ProviderLoadFailed { .. } => "provider_load_failed",
            Error::Config { .. } => "config",
            Error::Metrics(_) => "metrics",
        }
    }

    pub(crate) fn provider_failed(provider: &str, reason: impl ToString) -> Self {
        Error::ProviderFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn provider_load_failed(provider: &str, reason: impl ToString) -> Self {
        Error::ProviderLoadFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn config(reason: impl ToString) -> Self {
        Error::Config {
            reason: reason.to_string(),
        }
    }
}
