//! Ellipse geometry: unit circle, optionally restricted to an arc.

use std::f64::consts::TAU;

use crate::vertex::{Vertex, VertexCommand};

const FULL_CIRCLE_SEGMENTS: usize = 64;
const MIN_SEGMENTS: usize = 8;
const ANGLE_EPSILON: f64 = 1e-9;

/// How a partial ellipse closes its outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArcKind {
    /// Open arc, no closing edge.
    #[default]
    Arc,
    /// Straight edge from end back to start.
    Chord,
    /// Two edges through the center.
    Pie,
}

impl ArcKind {
    pub fn tag(self) -> &'static str {
        match self {
            ArcKind::Arc => "arc",
            ArcKind::Chord => "chord",
            ArcKind::Pie => "pie",
        }
    }
}

/// Unit-circle ellipse. Angles are radians measured counter-clockwise from
/// the positive x axis; the swept span runs from `start_angle` to
/// `end_angle`, and equal angles mean a full circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub start_angle: f64,
    pub end_angle: f64,
    pub arc_kind: ArcKind,
}

impl Default for Ellipse {
    fn default() -> Self {
        Ellipse {
            start_angle: 0.0,
            end_angle: 0.0,
            arc_kind: ArcKind::Arc,
        }
    }
}

impl Ellipse {
    /// Swept angle in (0, TAU]; coincident angles sweep the full circle.
    pub fn span(&self) -> f64 {
        let span = (self.end_angle - self.start_angle).rem_euclid(TAU);
        if span < ANGLE_EPSILON { TAU } else { span }
    }

    pub fn is_full(&self) -> bool {
        (TAU - self.span()).abs() < ANGLE_EPSILON
    }

    fn segments(&self) -> usize {
        let n = (self.span() / TAU * FULL_CIRCLE_SEGMENTS as f64).ceil() as usize;
        n.max(MIN_SEGMENTS)
    }

    /// Polyline approximation of the arc: `segments + 1` on-curve points
    /// followed by the closing commands the arc kind calls for.
    pub fn local_vertex(&self, step: usize) -> Option<Vertex> {
        let n = self.segments();
        if step <= n {
            let angle = self.start_angle + self.span() * step as f64 / n as f64;
            let command = if step == 0 {
                VertexCommand::Move
            } else {
                VertexCommand::Line
            };
            return Some(Vertex::new(command, angle.cos(), angle.sin()));
        }
        if self.is_full() {
            return (step == n + 1).then(Vertex::close);
        }
        match self.arc_kind {
            ArcKind::Arc => None,
            ArcKind::Chord => (step == n + 1).then(Vertex::close),
            ArcKind::Pie => match step {
                s if s == n + 1 => Some(Vertex::new(VertexCommand::Line, 0.0, 0.0)),
                s if s == n + 2 => Some(Vertex::close()),
                _ => None,
            },
        }
    }
}
