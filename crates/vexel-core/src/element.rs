//! Element capability: transform plus cached geometry/paint bounding boxes.

use std::cell::Cell;

use kurbo::{Affine, Rect};

/// State of a lazily-computed bounding box.
///
/// `Clean(None)` means "computed, and the element has no bounds" (e.g. an
/// empty compound path), which is distinct from `Dirty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BoundsCache {
    Dirty,
    Clean(Option<Rect>),
}

/// Per-element data for nodes that participate in geometry.
///
/// Bounding-box caches live in `Cell`s so reads through a shared scene
/// reference can still fill them; they are marked dirty (never recomputed
/// in place) whenever geometry-affecting state changes.
#[derive(Debug)]
pub struct ElementData {
    /// Local-to-scene affine transform, if any.
    pub transform: Option<Affine>,
    pub(crate) geometry_bbox: Cell<BoundsCache>,
    pub(crate) paint_bbox: Cell<BoundsCache>,
    /// Nesting depth of open `begin_update` brackets on this element.
    pub(crate) update_depth: u32,
    /// Paint bbox captured when the outermost bracket opened.
    pub(crate) saved_paint_bbox: Option<Rect>,
    /// Property names changed inside the open bracket, reported as one
    /// batched `AfterPropertiesChange` when the bracket closes.
    pub(crate) pending_properties: Vec<String>,
}

impl Default for ElementData {
    fn default() -> Self {
        ElementData {
            transform: None,
            geometry_bbox: Cell::new(BoundsCache::Dirty),
            paint_bbox: Cell::new(BoundsCache::Dirty),
            update_depth: 0,
            saved_paint_bbox: None,
            pending_properties: Vec::new(),
        }
    }
}

impl ElementData {
    pub(crate) fn invalidate_bounds(&self) {
        self.geometry_bbox.set(BoundsCache::Dirty);
        self.paint_bbox.set(BoundsCache::Dirty);
    }
}

/// Union of two optional rects.
pub(crate) fn union_bounds(a: Option<Rect>, b: Option<Rect>) -> Option<Rect> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}
