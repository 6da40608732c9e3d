//! Structural change notification for the document fixture.
//!
//! [`ObserverOptions`] selects which mutation kinds a subscription reports,
//! a [`MutationRecord`] describes one observed change, and a
//! [`MutationSubscription`] delivers records in batches as a
//! [`futures::Stream`]. Hosts hand out subscriptions through the
//! [`ObserveMutations`] capability; a host that cannot notify returns `None`
//! and callers fall back to interval polling.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::dom::{Document, Element, NodeId};

/// Which structural changes a subscription reports.
///
/// Defaults to reporting everything. Subtree observation is independent of
/// the record kinds: with `subtree` disabled, only changes targeting the
/// observed root itself are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverOptions {
    /// Deliver changes occurring anywhere under the observed root
    pub subtree: bool,
    /// Report child additions and removals
    pub child_list: bool,
    /// Report attribute changes
    pub attributes: bool,
    /// Report text content changes
    pub character_data: bool,
}

impl ObserverOptions {
    /// Observe every mutation kind across the whole subtree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            subtree: true,
            child_list: true,
            attributes: true,
            character_data: true,
        }
    }

    /// Observe only child additions and removals (still subtree-wide).
    #[must_use]
    pub const fn child_list_only() -> Self {
        Self {
            subtree: true,
            child_list: true,
            attributes: false,
            character_data: false,
        }
    }

    /// Set whether changes below the observed root are delivered.
    #[must_use]
    pub const fn with_subtree(mut self, subtree: bool) -> Self {
        self.subtree = subtree;
        self
    }

    /// Set whether child additions and removals are reported.
    #[must_use]
    pub const fn with_child_list(mut self, child_list: bool) -> Self {
        self.child_list = child_list;
        self
    }

    /// Set whether attribute changes are reported.
    #[must_use]
    pub const fn with_attributes(mut self, attributes: bool) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set whether text content changes are reported.
    #[must_use]
    pub const fn with_character_data(mut self, character_data: bool) -> Self {
        self.character_data = character_data;
        self
    }

    /// Whether records of `kind` are reported at all.
    #[must_use]
    pub const fn allows(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::ChildList => self.child_list,
            MutationKind::Attributes => self.attributes,
            MutationKind::CharacterData => self.character_data,
        }
    }
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of change a [`MutationRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were added to or removed from the target
    ChildList,
    /// An attribute on the target changed
    Attributes,
    /// The text content of the target changed
    CharacterData,
}

/// A single observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Kind of change
    pub kind: MutationKind,
    /// Node the change occurred on (the parent for child-list changes)
    pub target: NodeId,
    /// Children added to the target
    pub added: Vec<NodeId>,
    /// Children removed from the target
    pub removed: Vec<NodeId>,
    /// Attribute name, for [`MutationKind::Attributes`] records
    pub attribute: Option<String>,
    /// Previous attribute or text value, when one existed
    pub old_value: Option<String>,
}

impl MutationRecord {
    /// Record for children added to or removed from `target`.
    #[must_use]
    pub fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added,
            removed,
            attribute: None,
            old_value: None,
        }
    }

    /// Record for an attribute change on `target`.
    #[must_use]
    pub fn attributes(
        target: NodeId,
        attribute: impl Into<String>,
        old_value: Option<String>,
    ) -> Self {
        Self {
            kind: MutationKind::Attributes,
            target,
            added: Vec::new(),
            removed: Vec::new(),
            attribute: Some(attribute.into()),
            old_value,
        }
    }

    /// Record for a text content change on `target`.
    #[must_use]
    pub fn character_data(target: NodeId, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            target,
            added: Vec::new(),
            removed: Vec::new(),
            attribute: None,
            old_value,
        }
    }
}

/// Records delivered together, one batch per structural operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationBatch {
    /// Records in delivery order
    pub records: Vec<MutationRecord>,
}

impl MutationBatch {
    /// Wrap records into a batch.
    #[must_use]
    pub fn new(records: Vec<MutationRecord>) -> Self {
        Self { records }
    }
}

/// Unregisters the backing observer when dropped.
struct ObserverGuard {
    document: Document,
    id: u64,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        self.document.unregister_observer(self.id);
    }
}

/// A live mutation subscription.
///
/// Yields [`MutationBatch`]es as a [`futures::Stream`]; the backing
/// registration is released when the subscription is dropped, so holding
/// one is what keeps delivery alive.
pub struct MutationSubscription {
    receiver: mpsc::UnboundedReceiver<MutationBatch>,
    guard: ObserverGuard,
}

impl MutationSubscription {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<MutationBatch>,
        document: Document,
        id: u64,
    ) -> Self {
        Self {
            receiver,
            guard: ObserverGuard { document, id },
        }
    }

    /// Identifier of the backing observer registration.
    #[must_use]
    pub const fn observer_id(&self) -> u64 {
        self.guard.id
    }
}

impl fmt::Debug for MutationSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationSubscription")
            .field("observer", &self.guard.id)
            .finish_non_exhaustive()
    }
}

impl Stream for MutationSubscription {
    type Item = MutationBatch;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

/// Capability interface for hosts that can deliver mutation batches.
///
/// Returning `None` means the host cannot notify for this root; callers are
/// expected to fall back to interval polling with unchanged semantics.
pub trait ObserveMutations {
    /// Subscribe to changes under `root`, filtered by `options`.
    fn observe(&self, root: &Element, options: ObserverOptions) -> Option<MutationSubscription>;
}
