//! Node storage: kinds, flags and the property schema.

use kurbo::{Affine, Point};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::ElementData;
use crate::error::TreeError;
use crate::shapes::{ArcKind, ShapeData, ShapeKind};

/// Stable handle into the scene arena.
///
/// Handles carry a generation counter so a handle to a destroyed node is
/// detected as stale instead of silently aliasing a reused slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Editor-visible node state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Flag {
    Selected = 1,
    Highlighted = 1 << 1,
    Active = 1 << 2,
    Hidden = 1 << 3,
    Locked = 1 << 4,
}

/// Bitset of [`Flag`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u32);

impl Flags {
    pub fn has(self, flag: Flag) -> bool {
        self.0 & flag as u32 != 0
    }

    pub fn with(self, flag: Flag, set: bool) -> Self {
        if set {
            Flags(self.0 | flag as u32)
        } else {
            Flags(self.0 & !(flag as u32))
        }
    }
}

/// A dynamically-typed property value.
///
/// Properties are addressed by short names (`"x"`, `"trf"`, `"sa"`, ...) so
/// change listeners can test membership in a batched change notification and
/// the store/restore codec can round-trip a node schema generically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Affine transform as kurbo coefficients.
    Transform([f64; 6]),
    /// Anchor point list for path shapes.
    Points(Vec<[f64; 2]>),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_affine(&self) -> Option<Affine> {
        match self {
            PropertyValue::Transform(c) => Some(Affine::new(*c)),
            _ => None,
        }
    }

    pub fn as_points(&self) -> Option<Vec<Point>> {
        match self {
            PropertyValue::Points(pts) => {
                Some(pts.iter().map(|p| Point::new(p[0], p[1])).collect())
            }
            _ => None,
        }
    }

    pub fn from_affine(affine: Affine) -> Self {
        PropertyValue::Transform(affine.as_coeffs())
    }

    pub fn from_points(points: &[Point]) -> Self {
        PropertyValue::Points(points.iter().map(|p| [p.x, p.y]).collect())
    }
}

/// Page placement within the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageData {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Closed set of node kinds.
///
/// Capabilities (container, transform, geometry) are decided by kind via
/// pattern matching rather than runtime mixin queries.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Document root.
    Scene,
    Page(PageData),
    Layer,
    /// The protected sub-path container owned by a compound path.
    AnchorPaths,
    Shape(ShapeData),
}

impl NodeKind {
    /// Short tag used by the store/restore codec and error messages.
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Scene => "scene",
            NodeKind::Page(_) => "page",
            NodeKind::Layer => "layer",
            NodeKind::AnchorPaths => "anchor-paths",
            NodeKind::Shape(shape) => shape.kind.tag(),
        }
    }

    /// Whether nodes of this kind may hold children.
    pub fn is_container(&self) -> bool {
        match self {
            NodeKind::Scene | NodeKind::Page(_) | NodeKind::Layer | NodeKind::AnchorPaths => true,
            NodeKind::Shape(shape) => matches!(shape.kind, ShapeKind::CompoundPath(_)),
        }
    }

    /// Whether nodes of this kind carry element data (transform + bboxes).
    pub fn is_element(&self) -> bool {
        !matches!(self, NodeKind::AnchorPaths)
    }
}

/// One node of the scene tree.
#[derive(Debug)]
pub struct NodeData {
    /// Durable identity, preserved across store/restore.
    pub uuid: Uuid,
    pub kind: NodeKind,
    pub name: Option<String>,
    pub flags: Flags,
    /// Non-owning back-reference; ownership runs parent -> children.
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub element: Option<ElementData>,
}

impl NodeData {
    pub fn new(kind: NodeKind) -> Self {
        let element = kind.is_element().then(ElementData::default);
        NodeData {
            uuid: Uuid::new_v4(),
            kind,
            name: None,
            flags: Flags::default(),
            parent: None,
            children: Vec::new(),
            element,
        }
    }

    pub fn shape(&self) -> Option<&ShapeData> {
        match &self.kind {
            NodeKind::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn shape_mut(&mut self) -> Option<&mut ShapeData> {
        match &mut self.kind {
            NodeKind::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    /// The property schema of this node kind, in storage order.
    pub fn property_names(&self) -> &'static [&'static str] {
        match &self.kind {
            NodeKind::Scene | NodeKind::Layer | NodeKind::AnchorPaths => &["name"],
            NodeKind::Page(_) => &["name", "x", "y", "w", "h"],
            NodeKind::Shape(shape) => match &shape.kind {
                ShapeKind::Rectangle => &["name", "trf"],
                ShapeKind::Ellipse(_) => &["name", "trf", "sa", "ea", "etp"],
                ShapeKind::Polygon(_) => &["name", "trf", "pts", "or", "ir", "oa", "ia"],
                ShapeKind::Path(_) => &["name", "trf", "points", "closed"],
                ShapeKind::CompoundPath(_) => &["name", "trf", "evenodd"],
                ShapeKind::Image(_) => &["name", "trf", "src"],
            },
        }
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property_names().contains(&name)
    }

    /// Whether changing `name` affects this node's geometry.
    pub fn is_geometry_property(&self, name: &str) -> bool {
        match name {
            "name" | "evenodd" => false,
            _ => self.has_property(name),
        }
    }

    pub fn get_property(&self, name: &str) -> Option<PropertyValue> {
        if name == "name" {
            return Some(PropertyValue::Str(self.name.clone().unwrap_or_default()));
        }
        if name == "trf" {
            let transform = self.element.as_ref()?.transform?;
            return Some(PropertyValue::from_affine(transform));
        }
        match &self.kind {
            NodeKind::Page(page) => match name {
                "x" => Some(PropertyValue::Float(page.x)),
                "y" => Some(PropertyValue::Float(page.y)),
                "w" => Some(PropertyValue::Float(page.w)),
                "h" => Some(PropertyValue::Float(page.h)),
                _ => None,
            },
            NodeKind::Shape(shape) => shape.kind.get_property(name),
            _ => None,
        }
    }

    /// Validates name and value type without mutating anything, so a batched
    /// set can be checked completely before the first field is written.
    pub fn validate_property(&self, name: &str, value: &PropertyValue) -> Result<(), TreeError> {
        if !self.has_property(name) {
            return Err(TreeError::UnknownProperty(name.to_string()));
        }
        let ok = match name {
            "name" | "etp" | "src" => value.as_str().is_some(),
            "trf" => value.as_affine().is_some(),
            "points" => value.as_points().is_some(),
            "closed" | "evenodd" => value.as_bool().is_some(),
            _ => value.as_f64().is_some(),
        };
        if ok {
            Ok(())
        } else {
            Err(TreeError::PropertyType(name.to_string()))
        }
    }

    /// Applies a pre-validated property value.
    pub fn apply_property(&mut self, name: &str, value: &PropertyValue) {
        match name {
            "name" => {
                let s = value.as_str().unwrap_or_default();
                self.name = (!s.is_empty()).then(|| s.to_string());
                return;
            }
            "trf" => {
                if let Some(element) = self.element.as_mut() {
                    element.transform = value.as_affine();
                }
                return;
            }
            _ => {}
        }
        match &mut self.kind {
            NodeKind::Page(page) => {
                let v = value.as_f64().unwrap_or_default();
                match name {
                    "x" => page.x = v,
                    "y" => page.y = v,
                    "w" => page.w = v,
                    "h" => page.h = v,
                    _ => {}
                }
            }
            NodeKind::Shape(shape) => shape.kind.apply_property(name, value),
            _ => {}
        }
    }
}

/// Parses the `etp` property string into an [`ArcKind`].
pub(crate) fn arc_kind_from_tag(tag: &str) -> ArcKind {
    match tag {
        "chord" => ArcKind::Chord,
        "pie" => ArcKind::Pie,
        _ => ArcKind::Arc,
    }
}
