//! Structural-constraint errors for scene tree mutation.

use thiserror::Error;

/// Rejection of a tree mutation at the validation step.
///
/// Every variant is raised synchronously before any notification fires or
/// any structure changes, so a caller receiving one of these can rely on the
/// tree being exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The target node cannot hold children at all.
    #[error("node kind `{0}` is not a container")]
    NotAContainer(&'static str),

    /// The child refused to become a child of this parent kind.
    #[error("a `{child}` node cannot be inserted under a `{parent}` node")]
    InvalidParent {
        child: &'static str,
        parent: &'static str,
    },

    /// The node refused removal (e.g. a compound path's anchor container).
    #[error("node kind `{0}` is protected and cannot be removed")]
    RemovalForbidden(&'static str),

    /// The node already has a parent and must be detached first.
    #[error("node is already attached to a parent")]
    AlreadyAttached,

    /// Inserting the node would make it its own ancestor.
    #[error("insertion would create a cycle in the tree")]
    WouldCreateCycle,

    /// The handle refers to a node that no longer exists.
    #[error("stale node handle")]
    StaleNode,

    /// The node has no property of that name.
    #[error("unknown property `{0}` for this node kind")]
    UnknownProperty(String),

    /// A property value of the wrong type was supplied.
    #[error("property `{0}` was given a value of the wrong type")]
    PropertyType(String),

    /// `set_properties` was called with mismatched name/value lists.
    #[error("property name and value counts differ ({names} vs {values})")]
    PropertyCountMismatch { names: usize, values: usize },

    /// A restore blob did not match the expected document format.
    #[error("malformed restore blob: {0}")]
    RestoreFormat(String),
}
