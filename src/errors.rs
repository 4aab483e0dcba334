//! Typed error hierarchy for the issue panel.
//!
//! Only the primary issue lookup is fatal to a view-model assembly; every
//! secondary lookup degrades to an absent field instead of an error. The
//! variants here are the failures that do reach the request boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Issue {key} not found")]
    IssueNotFound { key: String },

    #[error("Comment {key} not found")]
    CommentNotFound { key: String },

    #[error("Missing required parameter '{name}'")]
    MissingParameter { name: String },

    /// A backing mutation rejected its input. Carries the service-supplied
    /// HTTP status code and error list, surfaced verbatim in the error
    /// fragment.
    #[error("Operation rejected with status {status}")]
    Validation { status: u16, errors: Vec<String> },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
