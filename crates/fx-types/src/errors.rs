//! Failure taxonomy for the listing and realtime API collaborators.

use thiserror::Error;

/// Error returned by a page fetch, a realtime fetch, or a cache refresh.
///
/// `Cancelled` is deliberately separate from the transport variants so a
/// driver shutting down does not report it as an upstream failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("api responded with status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short label for metrics and logs.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
        }
    }
}
