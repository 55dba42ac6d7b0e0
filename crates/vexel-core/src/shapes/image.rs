//! Image shape: an async-loaded bitmap with a rectangular outline.
//!
//! Loading is host-driven. The scene queues resolve/decode requests and the
//! host reports completion back; until a bitmap is available the shape
//! presents a fixed placeholder extent.

use crate::vertex::{Vertex, VertexCommand};

/// Placeholder extent used while no bitmap is available.
pub const NO_IMAGE_WIDTH: f64 = 100.0;
pub const NO_IMAGE_HEIGHT: f64 = 100.0;

/// Loading state machine of an image shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageStatus {
    /// Not attached to a scene yet; loading has not started.
    #[default]
    Delayed,
    /// The source reference is being resolved to a fetchable location.
    Resolving,
    /// The resolved data is being fetched and decoded.
    Loading,
    Loaded,
    Error,
}

impl ImageStatus {
    pub fn tag(self) -> &'static str {
        match self {
            ImageStatus::Delayed => "delayed",
            ImageStatus::Resolving => "resolving",
            ImageStatus::Loading => "loading",
            ImageStatus::Loaded => "loaded",
            ImageStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageShape {
    /// Source reference, resolved by the host.
    pub src: String,
    pub status: ImageStatus,
    /// Pixel size of the decoded bitmap, known once loaded.
    pub natural_size: Option<(u32, u32)>,
}

impl ImageShape {
    pub fn new(src: impl Into<String>) -> Self {
        ImageShape {
            src: src.into(),
            status: ImageStatus::Delayed,
            natural_size: None,
        }
    }

    /// Local width: natural bitmap width, or the placeholder extent.
    pub fn width(&self) -> f64 {
        match (self.status, self.natural_size) {
            (ImageStatus::Loaded, Some((w, _))) => w as f64,
            _ => NO_IMAGE_WIDTH,
        }
    }

    pub fn height(&self) -> f64 {
        match (self.status, self.natural_size) {
            (ImageStatus::Loaded, Some((_, h))) => h as f64,
            _ => NO_IMAGE_HEIGHT,
        }
    }

    /// Fixed five-vertex rectangular outline.
    pub fn local_vertex(&self, step: usize) -> Option<Vertex> {
        let (w, h) = (self.width(), self.height());
        match step {
            0 => Some(Vertex::new(VertexCommand::Move, 0.0, 0.0)),
            1 => Some(Vertex::new(VertexCommand::Line, w, 0.0)),
            2 => Some(Vertex::new(VertexCommand::Line, w, h)),
            3 => Some(Vertex::new(VertexCommand::Line, 0.0, h)),
            4 => Some(Vertex::close()),
            _ => None,
        }
    }
}
