//! Snapping to the document grid.

use kurbo::Point;
use vexel_core::Scene;

use super::guide::{AxisCandidate, Guide, GuideMapping};

/// Rounds to the nearest grid intersection whenever the grid is active.
/// Unlike element snapping this is unconditional: with an active grid every
/// point lands on it.
#[derive(Default)]
pub struct GridGuide;

impl Guide for GridGuide {
    fn map(&self, scene: &Scene, point: Point, _use_margin: bool) -> GuideMapping {
        let options = scene.options();
        if !options.grid_active || options.grid_size <= 0.0 {
            return GuideMapping::default();
        }
        let size = options.grid_size;
        let snap = |v: f64| {
            let value = (v / size).round() * size;
            AxisCandidate {
                value,
                delta: (v - value).abs(),
                visual: None,
            }
        };
        GuideMapping {
            x: Some(snap(point.x)),
            y: Some(snap(point.y)),
        }
    }
}
