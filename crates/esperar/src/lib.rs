//! Esperar: Async Waiting for DOM Element Removal
//!
//! Esperar (Spanish: "to wait") resolves once every element it watches has
//! left its document, driven by mutation notifications rather than sleep
//! loops. Targets can be held directly or re-resolved through a query on
//! every change, a single deadline bounds the whole wait, and hosts without
//! mutation observers fall back to interval polling with identical
//! semantics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    ESPERAR Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ WaitTarget │    │ Mutation   │    │ Deadline   │            │
//! │   │ (element / │───►│ Observers  │───►│ Race +     │            │
//! │   │  resolver) │    │ or Polling │    │ Teardown   │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use jugar_esperar::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> EsperarResult<()> {
//! let document = Document::new();
//! let spinner = document.root().append_new("div")?;
//! spinner.set_attribute(TEST_ID_ATTRIBUTE, "spinner");
//!
//! let handle = spinner.clone();
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_millis(10)).await;
//!     handle.remove();
//! });
//!
//! let options = RemovalOptions::new().with_timeout(Duration::from_millis(500));
//! wait_for_element_to_be_removed(&spinner, &options).await?;
//! assert!(!spinner.is_connected());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]
// Allow large stack arrays/frames in tests (e.g., test data generation)
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

mod dom;
mod observer;
mod query;
mod result;
mod wait;

pub use dom::{Document, DocumentCapabilities, Element, NodeId};
pub use observer::{
    MutationBatch, MutationKind, MutationRecord, MutationSubscription, ObserveMutations,
    ObserverOptions,
};
pub use query::{
    get_all_by_test_id, get_by_test_id, query_all_by_test_id, query_by_test_id, QueryError,
    TEST_ID_ATTRIBUTE,
};
pub use result::{EsperarError, EsperarResult};
pub use wait::{
    wait_for_element_to_be_removed, RemovalOptions, Resolution, WaitTarget,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::dom::*;
    pub use super::observer::*;
    pub use super::query::*;
    pub use super::result::*;
    pub use super::wait::*;
}
