//! Free-form path: an explicit list of anchor points.

use kurbo::Point;

use crate::vertex::{Vertex, VertexCommand};

/// Polyline path over explicit anchors, optionally closed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathShape {
    pub points: Vec<Point>,
    pub closed: bool,
}

impl PathShape {
    pub fn new(points: Vec<Point>, closed: bool) -> Self {
        PathShape { points, closed }
    }

    pub fn local_vertex(&self, step: usize) -> Option<Vertex> {
        if self.points.is_empty() {
            return None;
        }
        if let Some(p) = self.points.get(step) {
            let command = if step == 0 {
                VertexCommand::Move
            } else {
                VertexCommand::Line
            };
            return Some(Vertex::new(command, p.x, p.y));
        }
        (self.closed && step == self.points.len()).then(Vertex::close)
    }
}
