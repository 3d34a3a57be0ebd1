//! Error types for GradeMate.
//!
//! Domain errors are typed here; the binary's orchestration layer wraps
//! them in `anyhow` with context.

use thiserror::Error;

/// Errors raised while validating and aggregating plagiarism match records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    /// A pairwise record is missing a required field or carries a bad value.
    #[error("invalid match record at index {index}: field `{field}` {reason}")]
    InvalidRecord {
        /// Position of the offending record in the input list.
        index: usize,
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors raised while validating a grading request before upload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("quiz name is required")]
    EmptyQuizName,

    #[error("{field} must be between 0 and 1 (got {value})")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("total marks must be positive (got {0})")]
    NonPositiveTotal(f64),

    #[error("at least one student submission is required")]
    NoSubmissions,

    #[error("student name is required for submission {0}")]
    MissingStudentName(usize),

    #[error("image file not found: {0}")]
    MissingImage(String),
}

/// Errors raised by the backend HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to GradeMate backend at {0}. Is the server running?")]
    Connect(String),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("failed to decode backend response: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
