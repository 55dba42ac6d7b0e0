//! Snapping to whole or half scene units.

use kurbo::Point;
use vexel_core::{Scene, UnitSnap};

use super::guide::{AxisCandidate, Guide, GuideMapping};

/// Lowest-priority guide: rounds to full or half units per the scene
/// options, keeping freehand coordinates tidy.
#[derive(Default)]
pub struct UnitGuide;

impl Guide for UnitGuide {
    fn map(&self, scene: &Scene, point: Point, _use_margin: bool) -> GuideMapping {
        let round: fn(f64) -> f64 = match scene.options().unit_snap {
            UnitSnap::Off => return GuideMapping::default(),
            UnitSnap::Full => |v| v.round(),
            UnitSnap::Half => |v| (v * 2.0).round() / 2.0,
        };
        let snap = |v: f64| {
            let value = round(v);
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
