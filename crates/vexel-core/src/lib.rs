//! Scene-graph core for the vexel vector editor.
//!
//! The document is a validated tree of pages, layers and shapes held in a
//! generational arena. Mutations announce themselves through paired change
//! notifications, geometry flows out through a pull-based vertex protocol,
//! and repaint regions are collapsed across nested update brackets.

pub mod element;
pub mod error;
pub mod event;
pub mod node;
pub mod scene;
pub mod shapes;
pub mod style;
pub mod vertex;

pub use element::ElementData;
pub use error::TreeError;
pub use event::{ChangeEvent, GeometryPhase, ObserverId};
pub use node::{Flag, Flags, NodeId, NodeKind, PageData, PropertyValue};
pub use scene::{ResourceRequest, Scene, SceneOptions, ShapeVertices, UnitSnap};
pub use shapes::{
    ArcKind, CompoundPath, Ellipse, ImageShape, ImageStatus, PathShape, Polygon, ShapeData,
    ShapeKind, NO_IMAGE_HEIGHT, NO_IMAGE_WIDTH,
};
pub use style::{SerializableColor, ShapeStyle};
pub use vertex::{stream_bbox, stream_hit_test, Transformed, Vertex, VertexCommand, VertexSource};
