//! Fill and stroke style carried by shapes.

use peniko::Color;
use serde::{Deserialize, Serialize};

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Style properties of a shape.
///
/// The style determines the paint-bbox margin: a stroked shape paints half
/// its stroke width outside the geometry bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub stroke_color: Option<SerializableColor>,
    pub stroke_width: f64,
    pub fill_color: Option<SerializableColor>,
}

impl ShapeStyle {
    pub fn stroke(&self) -> Option<Color> {
        self.stroke_color.map(|c| c.into())
    }

    pub fn fill(&self) -> Option<Color> {
        self.fill_color.map(|c| c.into())
    }

    /// Margin added to the geometry bbox to obtain the paint bbox.
    pub fn paint_margin(&self) -> f64 {
        if self.stroke_color.is_some() {
            self.stroke_width / 2.0
        } else {
            0.0
        }
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: Some(SerializableColor::black()),
            stroke_width: 2.0,
            fill_color: None,
        }
    }
}
