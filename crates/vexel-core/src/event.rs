//! Change notifications emitted by the scene tree.
//!
//! Every mutation is bracketed by a `Before*`/`After*` pair delivered
//! synchronously and depth-first: nested mutations triggered while handling
//! a change complete their own pairs before the outer `After*` is dispatched.

use kurbo::Rect;

use crate::node::{Flag, NodeId};
use crate::shapes::ImageStatus;

/// Phase of a geometry update bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryPhase {
    /// Fired before a geometry-affecting mutation; cached bounding boxes
    /// still describe the pre-mutation state.
    Before,
    /// Fired after the mutation; caches have been invalidated and the
    /// repaint region has been requested.
    After,
    /// A descendant's geometry changed; this ancestor's caches were dropped.
    Child,
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    BeforeChildInsert { parent: NodeId, child: NodeId },
    AfterChildInsert { parent: NodeId, child: NodeId },
    BeforeChildRemove { parent: NodeId, child: NodeId },
    AfterChildRemove { parent: NodeId, child: NodeId },

    BeforeFlagChange { node: NodeId, flag: Flag, set: bool },
    AfterFlagChange { node: NodeId, flag: Flag, set: bool },

    BeforePropertiesChange { node: NodeId, properties: Vec<String> },
    /// One event per batched property-set call (or per update bracket),
    /// carrying every changed property name so listeners can test
    /// membership instead of reacting per field.
    AfterPropertiesChange { node: NodeId, properties: Vec<String> },

    GeometryChange { node: NodeId, phase: GeometryPhase },

    /// A region of the scene needs repainting.
    InvalidationRequest { area: Rect },

    /// An image shape entered `Loaded` or `Error`.
    ImageStatusChange { node: NodeId, status: ImageStatus },

    /// Document lifecycle: the node was serialized into a blob.
    Store { node: NodeId },
    /// Document lifecycle: the node was rebuilt from a blob.
    Restore { node: NodeId },
}

/// Handle for a registered observer, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);
