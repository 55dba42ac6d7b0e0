//! Snapping against the active page's edges and center.

use kurbo::Point;
use vexel_core::Scene;

use super::guide::{AxisCandidate, Guide, GuideMapping, GuideVisual};

/// Maps points to the active page's left/center/right and
/// top/center/bottom. Center snaps draw a line across the whole page; edge
/// snaps stay silent since the page border is visible anyway.
#[derive(Default)]
pub struct PageGuide;

fn best_pivot(value: f64, pivots: [f64; 3], tolerance: f64) -> Option<(usize, f64, f64)> {
    pivots
        .iter()
        .enumerate()
        .map(|(i, &p)| (i, p, (value - p).abs()))
        .filter(|&(_, _, delta)| delta <= tolerance)
        .min_by(|a, b| a.2.total_cmp(&b.2))
}

impl Guide for PageGuide {
    fn map(&self, scene: &Scene, point: Point, use_margin: bool) -> GuideMapping {
        let Some(page) = scene.active_page() else {
            return GuideMapping::default();
        };
        let Ok(Some(bbox)) = scene.geometry_bbox(page) else {
            return GuideMapping::default();
        };
        let tolerance = if use_margin {
            scene.options().snap_distance
        } else {
            1e-9
        };
        let center = bbox.center();
        let x = best_pivot(point.x, [bbox.x0, center.x, bbox.x1], tolerance).map(
            |(index, value, delta)| AxisCandidate {
                value,
                delta,
                visual: (index == 1).then(|| {
                    GuideVisual::Line([Point::new(value, bbox.y0), Point::new(value, bbox.y1)])
                }),
            },
        );
        let y = best_pivot(point.y, [bbox.y0, center.y, bbox.y1], tolerance).map(
            |(index, value, delta)| AxisCandidate {
                value,
                delta,
                visual: (index == 1).then(|| {
                    GuideVisual::Line([Point::new(bbox.x0, value), Point::new(bbox.x1, value)])
                }),
            },
        );
        GuideMapping { x, y }
    }
}
