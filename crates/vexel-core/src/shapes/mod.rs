//! Shape geometry kinds and their local vertex streams.
//!
//! Every shape's own coordinate space is local (a unit square, a unit
//! circle, or explicit anchor points); the element transform maps it into
//! scene space.

mod ellipse;
mod image;
mod path;
mod polygon;

pub use ellipse::{ArcKind, Ellipse};
pub use image::{ImageShape, ImageStatus, NO_IMAGE_HEIGHT, NO_IMAGE_WIDTH};
pub use path::PathShape;
pub use polygon::Polygon;

use crate::node::{arc_kind_from_tag, PropertyValue};
use crate::style::ShapeStyle;
use crate::vertex::{Vertex, VertexCommand};

/// A compound path's own data; its sub-paths live in the owned
/// anchor-paths container node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CompoundPath {
    /// Even-odd fill rule.
    pub evenodd: bool,
}

/// Shape payload: geometry kind plus paint style.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeData {
    pub kind: ShapeKind,
    pub style: ShapeStyle,
}

impl ShapeData {
    pub fn new(kind: ShapeKind) -> Self {
        ShapeData {
            kind,
            style: ShapeStyle::default(),
        }
    }
}

/// Closed set of shape geometries.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// Unit square (0,0)-(1,1).
    Rectangle,
    Ellipse(Ellipse),
    Polygon(Polygon),
    Path(PathShape),
    CompoundPath(CompoundPath),
    Image(ImageShape),
}

impl ShapeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Ellipse(_) => "ellipse",
            ShapeKind::Polygon(_) => "polygon",
            ShapeKind::Path(_) => "path",
            ShapeKind::CompoundPath(_) => "compound-path",
            ShapeKind::Image(_) => "image",
        }
    }

    /// Whether the shape's stream supports rewinding to `index`.
    ///
    /// Most shapes only stream from the start; the image outline is a fixed
    /// five-vertex sequence addressable at any ordinal.
    pub fn supports_rewind(&self, index: usize) -> bool {
        match self {
            ShapeKind::Image(_) => true,
            _ => index == 0,
        }
    }

    /// The vertex at `step` of the local-space stream, or `None` when the
    /// stream is exhausted. Compound paths have no local stream of their
    /// own; theirs is the concatenation of their children's streams.
    pub fn local_vertex(&self, step: usize) -> Option<Vertex> {
        match self {
            ShapeKind::Rectangle => match step {
                0 => Some(Vertex::new(VertexCommand::Move, 0.0, 0.0)),
                1 => Some(Vertex::new(VertexCommand::Line, 1.0, 0.0)),
                2 => Some(Vertex::new(VertexCommand::Line, 1.0, 1.0)),
                3 => Some(Vertex::new(VertexCommand::Line, 0.0, 1.0)),
                4 => Some(Vertex::close()),
                _ => None,
            },
            ShapeKind::Ellipse(ellipse) => ellipse.local_vertex(step),
            ShapeKind::Polygon(polygon) => polygon.local_vertex(step),
            ShapeKind::Path(path) => path.local_vertex(step),
            ShapeKind::CompoundPath(_) => None,
            ShapeKind::Image(image) => image.local_vertex(step),
        }
    }

    pub(crate) fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match self {
            ShapeKind::Ellipse(e) => match name {
                "sa" => Some(PropertyValue::Float(e.start_angle)),
                "ea" => Some(PropertyValue::Float(e.end_angle)),
                "etp" => Some(PropertyValue::Str(e.arc_kind.tag().to_string())),
                _ => None,
            },
            ShapeKind::Polygon(p) => match name {
                "pts" => Some(PropertyValue::Int(p.points as i64)),
                "or" => Some(PropertyValue::Float(p.outer_radius)),
                "ir" => Some(PropertyValue::Float(p.inner_radius)),
                "oa" => Some(PropertyValue::Float(p.outer_angle)),
                "ia" => Some(PropertyValue::Float(p.inner_angle)),
                _ => None,
            },
            ShapeKind::Path(p) => match name {
                "points" => Some(PropertyValue::from_points(&p.points)),
                "closed" => Some(PropertyValue::Bool(p.closed)),
                _ => None,
            },
            ShapeKind::CompoundPath(c) => match name {
                "evenodd" => Some(PropertyValue::Bool(c.evenodd)),
                _ => None,
            },
            ShapeKind::Image(i) => match name {
                "src" => Some(PropertyValue::Str(i.src.clone())),
                _ => None,
            },
            ShapeKind::Rectangle => None,
        }
    }

    pub(crate) fn apply_property(&mut self, name: &str, value: &PropertyValue) {
        match self {
            ShapeKind::Ellipse(e) => match name {
                "sa" => e.start_angle = value.as_f64().unwrap_or_default(),
                "ea" => e.end_angle = value.as_f64().unwrap_or_default(),
                "etp" => e.arc_kind = arc_kind_from_tag(value.as_str().unwrap_or_default()),
                _ => {}
            },
            ShapeKind::Polygon(p) => match name {
                "pts" => p.points = value.as_f64().unwrap_or_default().max(3.0) as u32,
                "or" => p.outer_radius = value.as_f64().unwrap_or_default(),
                "ir" => p.inner_radius = value.as_f64().unwrap_or_default(),
                "oa" => p.outer_angle = value.as_f64().unwrap_or_default(),
                "ia" => p.inner_angle = value.as_f64().unwrap_or_default(),
                _ => {}
            },
            ShapeKind::Path(p) => match name {
                "points" => p.points = value.as_points().unwrap_or_default(),
                "closed" => p.closed = value.as_bool().unwrap_or_default(),
                _ => {}
            },
            ShapeKind::CompoundPath(c) => {
                if name == "evenodd" {
                    c.evenodd = value.as_bool().unwrap_or_default();
                }
            }
            ShapeKind::Image(i) => {
                if name == "src" {
                    i.src = value.as_str().unwrap_or_default().to_string();
                }
            }
            ShapeKind::Rectangle => {}
        }
    }
}
