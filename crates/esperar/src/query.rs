//! Element lookup by test id.
//!
//! Queries walk an element's descendants in document order and match on the
//! `data-testid` attribute. The `query_*` forms report absence through their
//! return value; the `get_*` forms turn absence into [`QueryError::NotFound`],
//! which the wait engine recognizes as a removal signal.

use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::dom::Element;

/// Attribute the queries match on.
pub const TEST_ID_ATTRIBUTE: &str = "data-testid";

/// Error raised by the `get_*` lookups, and the currency of resolver
/// failures during a wait.
///
/// [`QueryError::Other`] carries an arbitrary application error behind an
/// `Arc`, so equality of that variant is reference identity: a clone of the
/// error compares equal to the original, a different allocation does not.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// No element matched the test id
    #[error("Unable to find an element by: [data-testid=\"{test_id}\"]")]
    NotFound {
        /// Test id that had no match
        test_id: String,
    },

    /// More than one element matched a single-element lookup
    #[error("Found multiple elements by: [data-testid=\"{test_id}\"]")]
    MultipleMatches {
        /// Test id that was ambiguous
        test_id: String,
    },

    /// An application error raised inside a resolver
    #[error("{0}")]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl QueryError {
    /// Wrap an arbitrary application error.
    #[must_use]
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Arc::new(error))
    }

    /// Whether this is the "zero matches" signal, which a wait re-check
    /// treats as proof of removal.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl PartialEq for QueryError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound { test_id: a }, Self::NotFound { test_id: b })
            | (Self::MultipleMatches { test_id: a }, Self::MultipleMatches { test_id: b }) => {
                a == b
            }
            (Self::Other(a), Self::Other(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Every descendant of `scope` carrying the test id, in document order.
///
/// The scope element itself is never a match.
#[must_use]
pub fn query_all_by_test_id(scope: &Element, test_id: &str) -> Vec<Element> {
    let matches: Vec<Element> = scope
        .descendants()
        .into_iter()
        .filter(|element| element.attribute(TEST_ID_ATTRIBUTE).as_deref() == Some(test_id))
        .collect();
    trace!(test_id, matches = matches.len(), "test id query");
    matches
}

/// At most one descendant of `scope` carrying the test id.
///
/// # Errors
///
/// [`QueryError::MultipleMatches`] when more than one element matches.
pub fn query_by_test_id(scope: &Element, test_id: &str) -> Result<Option<Element>, QueryError> {
    let mut matches = query_all_by_test_id(scope, test_id);
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(QueryError::MultipleMatches {
            test_id: test_id.to_string(),
        }),
    }
}

/// Exactly one descendant of `scope` carrying the test id.
///
/// # Errors
///
/// [`QueryError::NotFound`] when nothing matches,
/// [`QueryError::MultipleMatches`] when more than one element does.
pub fn get_by_test_id(scope: &Element, test_id: &str) -> Result<Element, QueryError> {
    query_by_test_id(scope, test_id)?.ok_or_else(|| QueryError::NotFound {
        test_id: test_id.to_string(),
    })
}

/// At least one descendant of `scope` carrying the test id.
///
/// # Errors
///
/// [`QueryError::NotFound`] when nothing matches.
pub fn get_all_by_test_id(scope: &Element, test_id: &str) -> Result<Vec<Element>, QueryError> {
    let matches = query_all_by_test_id(scope, test_id);
    if matches.is_empty() {
        return Err(QueryError::NotFound {
            test_id: test_id.to_string(),
        });
    }
    Ok(matches)
}
