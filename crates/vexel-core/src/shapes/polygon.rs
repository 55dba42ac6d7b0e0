//! Star polygon: alternating outer and inner anchor points around the origin.

use std::f64::consts::TAU;

use crate::vertex::{Vertex, VertexCommand};

/// A closed star polygon with `points` spikes. A regular convex polygon is
/// the degenerate case where inner radius/angle mirror the outer ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Polygon {
    pub points: u32,
    pub outer_radius: f64,
    pub inner_radius: f64,
    /// Angle of the first outer point, radians.
    pub outer_angle: f64,
    /// Angle of the first inner point, radians.
    pub inner_angle: f64,
}

impl Default for Polygon {
    fn default() -> Self {
        Polygon {
            points: 5,
            outer_radius: 1.0,
            inner_radius: 0.5,
            outer_angle: -TAU / 4.0,
            inner_angle: -TAU / 4.0 + TAU / 10.0,
        }
    }
}

impl Polygon {
    pub fn local_vertex(&self, step: usize) -> Option<Vertex> {
        let spikes = self.points.max(3) as usize;
        let total = spikes * 2;
        if step < total {
            let spike = (step / 2) as f64;
            let turn = spike * TAU / spikes as f64;
            let (angle, radius) = if step % 2 == 0 {
                (self.outer_angle + turn, self.outer_radius)
            } else {
                (self.inner_angle + turn, self.inner_radius)
            };
            let command = if step == 0 {
                VertexCommand::Move
            } else {
                VertexCommand::Line
            };
            return Some(Vertex::new(command, angle.cos() * radius, angle.sin() * radius));
        }
        (step == total).then(Vertex::close)
    }
}
