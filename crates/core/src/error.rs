// Central Error Types for the Job Engine

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed cause carried by processing failures
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Application-level error type
#[derive(Error, Debug)]
pub enum JobError {
    /// Job input rejected at submission, before any thread is dispatched
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Job cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using JobError
pub type Result<T> = std::result::Result<T, JobError>;

impl JobError {
    /// Translate into the canonical processing failure.
    ///
    /// Idempotent: a `Processing` error is returned untouched, every other kind
    /// is wrapped with the original error as its cause.
    pub fn into_processing(self) -> JobError {
        match self {
            JobError::Processing(e) => JobError::Processing(e),
            JobError::Cancelled(msg) => JobError::Processing(ProcessingError::cancelled(msg)),
            other => {
                let message = other.to_string();
                JobError::Processing(ProcessingError::with_cause(message, other))
            }
        }
    }

    /// Translate an error returned by a unit of work.
    ///
    /// Engine errors travelling through the work (e.g. a messaging failure
    /// propagated with `?`) keep their kind; anything else becomes a
    /// processing failure wrapping it.
    pub fn from_work_error(err: BoxError) -> JobError {
        match err.downcast::<JobError>() {
            Ok(e) => *e,
            Err(err) => match err.downcast::<ProcessingError>() {
                Ok(e) => JobError::Processing(*e),
                Err(err) => JobError::Processing(ProcessingError::wrap(err)),
            },
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            JobError::Cancelled(_) => true,
            JobError::Processing(e) => e.is_cancellation(),
            _ => false,
        }
    }
}

/// Canonical wrapped failure carrying the original cause.
///
/// Used for transport errors, serialization errors and anything escaping a
/// unit of work.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ProcessingError {
    message: String,
    context: Vec<String>,
    cancellation: bool,
    #[source]
    cause: Option<BoxError>,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            cancellation: false,
            cause: None,
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            cause: Some(cause.into()),
            ..Self::new(message)
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            cancellation: true,
            ..Self::new(message)
        }
    }

    /// Wrap an arbitrary error, keeping it as the cause
    pub fn wrap(cause: impl Into<BoxError>) -> Self {
        let cause = cause.into();
        Self::new(cause.to_string()).caused_by(cause)
    }

    fn caused_by(mut self, cause: BoxError) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Append a context message (e.g. which operation was running)
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn is_cancellation(&self) -> bool {
        self.cancellation
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl From<serde_json::Error> for ProcessingError {
    fn from(err: serde_json::Error) -> Self {
        ProcessingError::with_cause(format!("Serialization error: {}", err), err)
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        JobError::Processing(err.into())
    }
}
