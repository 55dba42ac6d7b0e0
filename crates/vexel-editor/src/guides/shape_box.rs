//! Snapping against the bounding boxes of other shapes.

use kurbo::Point;
use vexel_core::{Flag, NodeId, NodeKind, Scene};

use super::guide::{AxisCandidate, Guide, GuideMapping, GuideVisual, InputModifiers};

/// Guide lines are drawn extended past the snapped span by this much.
pub const GUIDE_MARGIN: f64 = 20.0;

const TIE_EPSILON: f64 = 1e-9;

/// Snaps a point to the corner and center pivots of the active page's
/// shapes.
///
/// Corner pivots produce a guide line spanning the shape and the input
/// point; center pivots produce a reference point. The dragged elements are
/// registered as exclusions so a shape never snaps against itself.
#[derive(Default)]
pub struct ShapeBoxGuide {
    exclusions: Vec<NodeId>,
}

struct AxisBest {
    value: f64,
    delta: f64,
    /// Extent of the guide line along the other axis, `None` for a
    /// center-pivot reference.
    span: Option<(f64, f64)>,
    pivot: Point,
}

impl ShapeBoxGuide {
    pub fn add_exclusion(&mut self, id: NodeId) {
        if !self.exclusions.contains(&id) {
            self.exclusions.push(id);
        }
    }

    pub fn clear_exclusions(&mut self) {
        self.exclusions.clear();
    }

    /// Shapes sitting on the active page's layers. Only pages and layers
    /// are descended, so a compound path's sub-paths never attract on
    /// their own and other pages stay out of reach.
    fn candidate_shapes(&self, scene: &Scene) -> Vec<NodeId> {
        let mut shapes = Vec::new();
        let Some(page) = scene.active_page() else {
            return shapes;
        };
        let mut stack = vec![page];
        while let Some(id) = stack.pop() {
            let Ok(flags) = scene.flags(id) else { continue };
            if flags.has(Flag::Hidden) || self.exclusions.contains(&id) {
                continue;
            }
            match scene.kind(id) {
                Ok(NodeKind::Page(_)) | Ok(NodeKind::Layer) => {
                    if let Ok(children) = scene.children(id) {
                        stack.extend(children.iter().copied());
                    }
                }
                Ok(NodeKind::Shape(_)) => shapes.push(id),
                _ => {}
            }
        }
        shapes
    }

    /// Offers `delta`-ranked pivots: a strictly smaller delta replaces the
    /// candidate, an exact tie on the same value extends the visual span to
    /// cover both shapes.
    fn offer(
        best: &mut Option<AxisBest>,
        value: f64,
        delta: f64,
        span: Option<(f64, f64)>,
        pivot: Point,
    ) {
        let replace = match best {
            None => true,
            Some(current)
                if (delta - current.delta).abs() <= TIE_EPSILON
                    && (value - current.value).abs() <= TIE_EPSILON =>
            {
                if let (Some(existing), Some(new)) = (&mut current.span, span) {
                    existing.0 = existing.0.min(new.0);
                    existing.1 = existing.1.max(new.1);
                }
                false
            }
            Some(current) => delta + TIE_EPSILON < current.delta,
        };
        if replace {
            *best = Some(AxisBest {
                value,
                delta,
                span,
                pivot,
            });
        }
    }
}

impl Guide for ShapeBoxGuide {
    fn map(&self, scene: &Scene, point: Point, use_margin: bool) -> GuideMapping {
        let tolerance = if use_margin {
            scene.options().snap_distance
        } else {
            TIE_EPSILON
        };
        let mut best_x: Option<AxisBest> = None;
        let mut best_y: Option<AxisBest> = None;
        for id in self.candidate_shapes(scene) {
            let Ok(Some(bbox)) = scene.geometry_bbox(id) else {
                continue;
            };
            let corners = [
                Point::new(bbox.x0, bbox.y0),
                Point::new(bbox.x1, bbox.y1),
            ];
            for pivot in corners {
                let dx = (point.x - pivot.x).abs();
                if dx <= tolerance {
                    let span = (bbox.y0.min(point.y), bbox.y1.max(point.y));
                    Self::offer(&mut best_x, pivot.x, dx, Some(span), pivot);
                }
                let dy = (point.y - pivot.y).abs();
                if dy <= tolerance {
                    let span = (bbox.x0.min(point.x), bbox.x1.max(point.x));
                    Self::offer(&mut best_y, pivot.y, dy, Some(span), pivot);
                }
            }
            let center = bbox.center();
            let dx = (point.x - center.x).abs();
            if dx <= tolerance {
                Self::offer(&mut best_x, center.x, dx, None, center);
            }
            let dy = (point.y - center.y).abs();
            if dy <= tolerance {
                Self::offer(&mut best_y, center.y, dy, None, center);
            }
        }
        GuideMapping {
            x: best_x.map(|best| AxisCandidate {
                value: best.value,
                delta: best.delta,
                visual: Some(match best.span {
                    Some((lo, hi)) => GuideVisual::Line([
                        Point::new(best.value, lo - GUIDE_MARGIN),
                        Point::new(best.value, hi + GUIDE_MARGIN),
                    ]),
                    None => GuideVisual::Reference(best.pivot),
                }),
            }),
            y: best_y.map(|best| AxisCandidate {
                value: best.value,
                delta: best.delta,
                visual: Some(match best.span {
                    Some((lo, hi)) => GuideVisual::Line([
                        Point::new(lo - GUIDE_MARGIN, best.value),
                        Point::new(hi + GUIDE_MARGIN, best.value),
                    ]),
                    None => GuideVisual::Reference(best.pivot),
                }),
            }),
        }
    }

    fn mapping_allowed(&self, modifiers: &InputModifiers) -> bool {
        !modifiers.snap_disabled
    }
}
