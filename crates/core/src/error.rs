use std::time::Duration;

use thiserror::Error;

/// Failures of the rule store and the live value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Failures while handing an action to the notification sink.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Notification API rejected the action ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Submission timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}
