use thiserror::Error;

/// Error types that can occur in the alerting core
#[derive(Error, Debug)]
pub enum AlertError {
    /// Rule failed validation and cannot be admitted
    #[error("Validation error: {message}")]
    Validation {
        /// Error message
        message: String,
    },

    /// Error during expression or condition evaluation
    #[error("Evaluation error: {message}")]
    Evaluation {
        /// Error message
        message: String,
    },

    /// Notification admission denied by the rate limiter
    #[error("Rate limit exceeded")]
    RateLimited,

    /// One or more sinks failed to deliver an alert
    #[error("Dispatch failed: {}", failures.join("; "))]
    Dispatch {
        /// Per-sink failure descriptions, `sink: error` form
        failures: Vec<String>,
    },

    /// A single sink's terminal delivery failure
    #[error("Sink error: {message}")]
    Sink {
        /// Error message
        message: String,
    },

    /// IO error for file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AlertError {
    /// Shorthand for a validation error with a formatted message.
    pub fn validation(message: impl Into<String>) -> Self {
        AlertError::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for an evaluation error with a formatted message.
    pub fn evaluation(message: impl Into<String>) -> Self {
        AlertError::Evaluation {
            message: message.into(),
        }
    }

    /// Shorthand for a sink delivery error.
    pub fn sink(message: impl Into<String>) -> Self {
        AlertError::Sink {
            message: message.into(),
        }
    }
}

/// Convenient Result type alias for alerting operations
pub type Result<T> = std::result::Result<T, AlertError>;
