use thiserror::Error;

use crate::refresh::metadata::UrlMetadata;

/// Errors surfaced by the URL refresh manager
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Refresh failed: {0}")]
    Failed(String),

    #[error("URL manager has been disposed")]
    Disposed,

    #[error("No tokio runtime available to drive refresh timers")]
    NoRuntime,
}

impl RefreshError {
    pub(crate) fn from_callback(err: &anyhow::Error) -> Self {
        RefreshError::Failed(format!("{:#}", err))
    }
}

/// How a single refresh attempt ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New metadata was committed
    Refreshed(UrlMetadata),
    /// No callback configured; nothing happened
    NoCallback,
    /// The result arrived after dispose or a source reset and was dropped
    Discarded,
}
