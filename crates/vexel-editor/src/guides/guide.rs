//! The guide interface shared by all snapping providers.

use kurbo::Point;
use vexel_core::Scene;

/// Keyboard modifier state during an interaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputModifiers {
    /// Constrain proportions.
    pub shift: bool,
    /// Resize from the center.
    pub option: bool,
    /// Suppress element snapping.
    pub snap_disabled: bool,
}

/// Feedback drawn for a snapped axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GuideVisual {
    /// A guide line along the snapped axis.
    Line([Point; 2]),
    /// A reference point; the mapper connects it to the result when the two
    /// are far enough apart to be worth showing.
    Reference(Point),
}

/// One axis of a guide's answer: the snapped coordinate, how far the input
/// was from it, and optional visual feedback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCandidate {
    pub value: f64,
    pub delta: f64,
    pub visual: Option<GuideVisual>,
}

/// A guide's mapping of one point, per axis. `None` on an axis means the
/// guide has no opinion there and the next guide in priority gets a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GuideMapping {
    pub x: Option<AxisCandidate>,
    pub y: Option<AxisCandidate>,
}

/// A snapping provider consulted by the guide manager.
pub trait Guide {
    /// Maps `point` against this guide. `use_margin` selects the scene's
    /// snap distance as tolerance; without it only exact matches map.
    fn map(&self, scene: &Scene, point: Point, use_margin: bool) -> GuideMapping;

    /// Whether this guide participates under the given modifiers.
    fn mapping_allowed(&self, _modifiers: &InputModifiers) -> bool {
        true
    }
}
