//! Pull-based vertex protocol.
//!
//! Consumers drive iteration: a source hands out one vertex per call and
//! reports exhaustion, so rasterizers, bbox computation and hit testing all
//! share one streaming interface without intermediate buffers.

use kurbo::{Affine, Point, Rect};

/// Path-building command of a single vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VertexCommand {
    /// Start a new sub-path.
    #[default]
    Move,
    /// Straight edge to this vertex.
    Line,
    /// Close the current sub-path; coordinates are unused.
    Close,
}

/// One vertex of a streamed outline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub command: VertexCommand,
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub fn new(command: VertexCommand, x: f64, y: f64) -> Self {
        Vertex { command, x, y }
    }

    pub fn close() -> Self {
        Vertex::new(VertexCommand::Close, 0.0, 0.0)
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A restartable stream of vertices.
pub trait VertexSource {
    /// Positions the stream at vertex `index`. Returns `false` when the
    /// source cannot seek there; sources must at least support index 0.
    fn rewind(&mut self, index: usize) -> bool;

    /// Writes the next vertex into `vertex` and advances. Returns `false`
    /// when the stream is exhausted, leaving `vertex` untouched.
    fn read_next(&mut self, vertex: &mut Vertex) -> bool;
}

/// Adapter applying an affine transform to every non-`Close` vertex of an
/// inner source.
pub struct Transformed<S> {
    inner: S,
    transform: Affine,
}

impl<S: VertexSource> Transformed<S> {
    pub fn new(inner: S, transform: Affine) -> Self {
        Transformed { inner, transform }
    }
}

impl<S: VertexSource> VertexSource for Transformed<S> {
    fn rewind(&mut self, index: usize) -> bool {
        self.inner.rewind(index)
    }

    fn read_next(&mut self, vertex: &mut Vertex) -> bool {
        if !self.inner.read_next(vertex) {
            return false;
        }
        if vertex.command != VertexCommand::Close {
            let p = self.transform * vertex.point();
            vertex.x = p.x;
            vertex.y = p.y;
        }
        true
    }
}

/// Bounding box of every on-curve point of `source`, streaming from the
/// start. `None` for an empty stream.
pub fn stream_bbox(source: &mut impl VertexSource) -> Option<Rect> {
    if !source.rewind(0) {
        return None;
    }
    let mut vertex = Vertex::default();
    let mut bounds: Option<Rect> = None;
    while source.read_next(&mut vertex) {
        if vertex.command == VertexCommand::Close {
            continue;
        }
        let r = Rect::from_points(vertex.point(), vertex.point());
        bounds = Some(match bounds {
            Some(b) => b.union(r),
            None => r,
        });
    }
    bounds
}

/// Whether `point` lies within `tolerance` of any edge of the streamed
/// outline, counting the implicit closing edge of `Close`d sub-paths.
pub fn stream_hit_test(source: &mut impl VertexSource, point: Point, tolerance: f64) -> bool {
    if !source.rewind(0) {
        return false;
    }
    let mut vertex = Vertex::default();
    let mut subpath_start: Option<Point> = None;
    let mut previous: Option<Point> = None;
    while source.read_next(&mut vertex) {
        match vertex.command {
            VertexCommand::Move => {
                subpath_start = Some(vertex.point());
                previous = Some(vertex.point());
            }
            VertexCommand::Line => {
                if let Some(prev) = previous {
                    if point_to_segment_dist(point, prev, vertex.point()) <= tolerance {
                        return true;
                    }
                }
                previous = Some(vertex.point());
            }
            VertexCommand::Close => {
                if let (Some(prev), Some(start)) = (previous, subpath_start) {
                    if point_to_segment_dist(point, prev, start) <= tolerance {
                        return true;
                    }
                }
                previous = subpath_start;
            }
        }
    }
    false
}

fn point_to_segment_dist(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.x * ab.x + ab.y * ab.y;
    if len_sq < f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SliceSource {
        vertices: Vec<Vertex>,
        cursor: usize,
    }

    impl SliceSource {
        fn new(vertices: Vec<Vertex>) -> Self {
            SliceSource { vertices, cursor: 0 }
        }
    }

    impl VertexSource for SliceSource {
        fn rewind(&mut self, index: usize) -> bool {
            if index <= self.vertices.len() {
                self.cursor = index;
                true
            } else {
                false
            }
        }

        fn read_next(&mut self, vertex: &mut Vertex) -> bool {
            match self.vertices.get(self.cursor) {
                Some(v) => {
                    *vertex = *v;
                    self.cursor += 1;
                    true
                }
                None => false,
            }
        }
    }

    fn unit_square() -> SliceSource {
        SliceSource::new(vec![
            Vertex::new(VertexCommand::Move, 0.0, 0.0),
            Vertex::new(VertexCommand::Line, 1.0, 0.0),
            Vertex::new(VertexCommand::Line, 1.0, 1.0),
            Vertex::new(VertexCommand::Line, 0.0, 1.0),
            Vertex::close(),
        ])
    }

    #[test]
    fn transform_skips_close_vertices() {
        let mut source = Transformed::new(unit_square(), Affine::translate((10.0, 0.0)));
        let mut vertex = Vertex::default();
        let mut last = Vertex::default();
        source.rewind(0);
        while source.read_next(&mut vertex) {
            last = vertex;
        }
        assert_eq!(last.command, VertexCommand::Close);
        assert_eq!((last.x, last.y), (0.0, 0.0));

        source.rewind(0);
        source.read_next(&mut vertex);
        assert_eq!((vertex.x, vertex.y), (10.0, 0.0));
    }

    #[test]
    fn bbox_of_square() {
        let bounds = stream_bbox(&mut unit_square()).unwrap();
        assert_eq!(bounds, Rect::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn hit_test_counts_closing_edge() {
        // Left edge of the square only exists through the Close command.
        let mut source = unit_square();
        assert!(stream_hit_test(&mut source, Point::new(0.0, 0.5), 0.1));
        assert!(!stream_hit_test(&mut source, Point::new(0.5, 0.5), 0.1));
    }

    #[test]
    fn stream_restarts_cleanly() {
        let mut source = unit_square();
        let first = stream_bbox(&mut source);
        let second = stream_bbox(&mut source);
        assert_eq!(first, second);
    }
}
