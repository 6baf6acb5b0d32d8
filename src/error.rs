//! Error types shared by the sync pipeline

use thiserror::Error;

/// A task source could not provide its current snapshot
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                SourceError::AuthFailure(err.to_string())
            },
            _ => SourceError::Unavailable(err.to_string()),
        }
    }
}


/// An operation against the calendar failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WriteError {
    /// Timeouts, connection resets, 5xx... Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("permanent failure: {0}")]
    Permanent(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),
}

impl WriteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, WriteError::Transient(_))
    }

    /// Classify an HTTP status that is not a success
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        let code = status.as_u16();
        let msg = format!("{}: unexpected HTTP status {}", context, status);
        match code {
            401 | 403 => WriteError::AuthFailure(msg),
            408 | 429 => WriteError::Transient(msg),
            c if c >= 500 => WriteError::Transient(msg),
            _ => WriteError::Permanent(msg),
        }
    }
}

impl From<reqwest::Error> for WriteError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return WriteError::from_status(status, "request failed");
        }
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            WriteError::Transient(err.to_string())
        } else {
            WriteError::Permanent(err.to_string())
        }
    }
}


/// Invalid or missing configuration
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing configuration variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("no task source is enabled")]
    NoSourceEnabled,
}


/// Failures that stop a sync run before anything is written
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unable to list the calendar: {0}")]
    Calendar(#[from] WriteError),
}
