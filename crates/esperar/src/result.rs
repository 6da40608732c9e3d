//! Result and error types for esperar.
//!
//! Every fallible operation in the crate returns [`EsperarResult`]. Resolver
//! errors surfaced by the wait engine keep their identity: the
//! [`EsperarError::Query`] variant carries the exact [`QueryError`] value the
//! resolver produced, so callers can compare it by reference.

use thiserror::Error;

use crate::query::QueryError;

/// Result type alias for esperar operations
pub type EsperarResult<T> = Result<T, EsperarError>;

/// Error type for esperar operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EsperarError {
    /// The wait target was already absent when the wait began
    #[error("The element(s) given to waitForElementToBeRemoved are already removed. waitForElementToBeRemoved requires that the element(s) exist(s) before waiting for removal.")]
    AlreadyRemoved,

    /// The deadline elapsed while the target was still present
    #[error("Timed out in waitForElementToBeRemoved.")]
    Timeout,

    /// A resolver error surfaced unmodified by the wait engine
    #[error("{0}")]
    Query(#[from] QueryError),

    /// A structural operation on the document fixture failed
    #[error("Document error: {message}")]
    Dom {
        /// What went wrong
        message: String,
    },
}

impl EsperarError {
    /// Structural fixture error with the given message.
    pub(crate) fn dom(message: impl Into<String>) -> Self {
        Self::Dom {
            message: message.into(),
        }
    }
}
