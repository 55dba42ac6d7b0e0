//! Interactive editing layer for vexel scenes.
//!
//! Builds on `vexel-core`: guides snap pointer input to scene features
//! inside ref-counted mapping sessions, and block editors turn part drags
//! into previewed transforms that commit to the scene in one step.

pub mod editor;
pub mod guides;
pub mod resize;

pub use editor::{BlockEditor, EditorError, EditorPart};
pub use guides::{
    AxisCandidate, GridGuide, Guide, GuideMapping, GuideVisual, Guides, InputModifiers, PageGuide,
    ShapeBoxGuide, UnitGuide, GUIDE_MARGIN,
};
pub use resize::{rect_side, resize_transform, Side};
