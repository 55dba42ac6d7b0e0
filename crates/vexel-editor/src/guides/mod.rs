//! Guide management: prioritized snapping with ref-counted map sessions.

mod grid;
mod guide;
mod page;
mod shape_box;
mod unit;

pub use grid::GridGuide;
pub use guide::{AxisCandidate, Guide, GuideMapping, GuideVisual, InputModifiers};
pub use page::PageGuide;
pub use shape_box::{ShapeBoxGuide, GUIDE_MARGIN};
pub use unit::UnitGuide;

use kurbo::{Point, Rect};
use vexel_core::{NodeId, Scene};

/// A reference point closer to the result than this draws no connector.
const REFERENCE_VISUAL_DISTANCE: f64 = 2.0;

/// The guide manager.
///
/// Mapping happens inside ref-counted sessions: `begin_map`/`finish_map`
/// bracket an interaction, visual feedback accumulates during it, and the
/// outermost finish hands back the area those visuals covered so the caller
/// can repaint it. Exclusions registered for the dragged elements are also
/// dropped at the outermost finish.
pub struct Guides {
    shape_box: ShapeBoxGuide,
    others: Vec<Box<dyn Guide>>,
    depth: u32,
    visuals: Vec<[Point; 2]>,
}

impl Guides {
    pub fn new() -> Self {
        Guides {
            shape_box: ShapeBoxGuide::default(),
            others: vec![
                Box::new(PageGuide),
                Box::new(GridGuide),
                Box::new(UnitGuide),
            ],
            depth: 0,
            visuals: Vec::new(),
        }
    }

    /// Opens a mapping session. Sessions nest; visuals pool until the
    /// outermost [`Guides::finish_map`].
    pub fn begin_map(&mut self) {
        if self.depth == 0 {
            self.visuals.clear();
        }
        self.depth += 1;
    }

    /// Closes a mapping session. The outermost close clears exclusions and
    /// returns the region covered by the session's guide visuals, expanded
    /// by one unit, for repainting.
    pub fn finish_map(&mut self) -> Option<Rect> {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return None;
        }
        self.shape_box.clear_exclusions();
        self.visuals
            .drain(..)
            .map(|[a, b]| Rect::from_points(a, b).inflate(1.0, 1.0))
            .reduce(|acc, r| acc.union(r))
    }

    /// Guide lines accumulated in the open session, for rendering.
    pub fn visuals(&self) -> &[[Point; 2]] {
        &self.visuals
    }

    /// Excludes an element from shape-box snapping until the session ends.
    pub fn add_exclusion(&mut self, id: NodeId) {
        self.shape_box.add_exclusion(id);
    }

    /// Maps a point through the guides in priority order; the first guide
    /// with an opinion on an axis wins that axis.
    pub fn map_point(
        &mut self,
        scene: &Scene,
        point: Point,
        modifiers: &InputModifiers,
        use_margin: bool,
    ) -> Point {
        let mut result = point;
        let mut x_done = false;
        let mut y_done = false;
        let mut pending: Vec<GuideVisual> = Vec::new();

        let shape_box_allowed = self.shape_box.mapping_allowed(modifiers);
        let guides = std::iter::once(&self.shape_box as &dyn Guide)
            .filter(|_| shape_box_allowed)
            .chain(
                self.others
                    .iter()
                    .filter(|g| g.mapping_allowed(modifiers))
                    .map(|g| g.as_ref() as &dyn Guide),
            );
        for guide in guides {
            if x_done && y_done {
                break;
            }
            let mapping = guide.map(scene, point, use_margin);
            if !x_done {
                if let Some(candidate) = mapping.x {
                    result.x = candidate.value;
                    x_done = true;
                    pending.extend(candidate.visual);
                }
            }
            if !y_done {
                if let Some(candidate) = mapping.y {
                    result.y = candidate.value;
                    y_done = true;
                    pending.extend(candidate.visual);
                }
            }
        }

        if self.depth > 0 {
            for visual in pending {
                match visual {
                    GuideVisual::Line(line) => self.visuals.push(line),
                    GuideVisual::Reference(reference) => {
                        // Distant reference points get a connector so the
                        // user sees what attracted the result.
                        if reference.distance(result) >= REFERENCE_VISUAL_DISTANCE {
                            self.visuals.push([result, reference]);
                        }
                    }
                }
            }
        }
        result
    }
}

impl Default for Guides {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Affine;
    use vexel_core::{PropertyValue, UnitSnap};

    fn scene_with_square(size: f64) -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let page = scene.create_page(0.0, 0.0, 800.0, 600.0);
        let layer = scene.create_layer();
        scene.insert_child(scene.root(), page).unwrap();
        scene.insert_child(page, layer).unwrap();
        scene.set_active_page(Some(page)).unwrap();
        let rect = scene.create_rectangle();
        scene.insert_child(layer, rect).unwrap();
        scene
            .set_properties(
                rect,
                &["trf"],
                &[PropertyValue::from_affine(Affine::scale(size))],
            )
            .unwrap();
        (scene, rect)
    }

    #[test]
    fn snaps_to_shape_corner_with_one_line_per_axis() {
        let (mut scene, _) = scene_with_square(50.0);
        scene.options_mut().snap_distance = 5.0;
        let mut guides = Guides::new();

        guides.begin_map();
        let mapped = guides.map_point(
            &scene,
            Point::new(48.0, 48.0),
            &InputModifiers::default(),
            true,
        );
        assert_eq!(mapped, Point::new(50.0, 50.0));
        // One line per axis, each drawn past the snapped span by the
        // guide margin.
        assert_eq!(
            guides.visuals(),
            &[
                [Point::new(50.0, -20.0), Point::new(50.0, 70.0)],
                [Point::new(-20.0, 50.0), Point::new(70.0, 50.0)],
            ]
        );
        let area = guides.finish_map().unwrap();
        assert!(area.contains(Point::new(50.0, 25.0)));
        assert!(guides.visuals().is_empty());
    }

    #[test]
    fn mapping_is_idempotent() {
        let (mut scene, _) = scene_with_square(50.0);
        scene.options_mut().snap_distance = 5.0;
        let mut guides = Guides::new();

        guides.begin_map();
        let once = guides.map_point(
            &scene,
            Point::new(48.0, 48.0),
            &InputModifiers::default(),
            true,
        );
        let twice = guides.map_point(&scene, once, &InputModifiers::default(), true);
        guides.finish_map();
        assert_eq!(once, twice);

        // Grid rounding is a projection as well.
        let mut grid_scene = Scene::new();
        grid_scene.options_mut().grid_active = true;
        grid_scene.options_mut().grid_size = 20.0;
        guides.begin_map();
        let once = guides.map_point(
            &grid_scene,
            Point::new(28.0, 71.0),
            &InputModifiers::default(),
            true,
        );
        let twice = guides.map_point(&grid_scene, once, &InputModifiers::default(), true);
        guides.finish_map();
        assert_eq!(once, twice);
    }

    #[test]
    fn only_the_active_page_attracts() {
        let mut scene = Scene::new();
        let page1 = scene.create_page(0.0, 0.0, 800.0, 600.0);
        let page2 = scene.create_page(1000.0, 0.0, 800.0, 600.0);
        scene.insert_child(scene.root(), page1).unwrap();
        scene.insert_child(scene.root(), page2).unwrap();
        let layer = scene.create_layer();
        scene.insert_child(page2, layer).unwrap();
        let rect = scene.create_rectangle();
        scene.insert_child(layer, rect).unwrap();
        scene
            .set_properties(
                rect,
                &["trf"],
                &[PropertyValue::from_affine(
                    Affine::translate((1000.0, 0.0)) * Affine::scale(50.0),
                )],
            )
            .unwrap();
        scene.set_active_page(Some(page1)).unwrap();
        scene.options_mut().snap_distance = 5.0;
        let mut guides = Guides::new();

        // The square sits on page2; with page1 active it does not attract.
        guides.begin_map();
        let mapped = guides.map_point(
            &scene,
            Point::new(1048.0, 48.0),
            &InputModifiers::default(),
            true,
        );
        guides.finish_map();
        assert_eq!(mapped, Point::new(1048.0, 48.0));

        scene.set_active_page(Some(page2)).unwrap();
        guides.begin_map();
        let mapped = guides.map_point(
            &scene,
            Point::new(1048.0, 48.0),
            &InputModifiers::default(),
            true,
        );
        guides.finish_map();
        assert_eq!(mapped, Point::new(1050.0, 50.0));
    }

    #[test]
    fn compound_subpaths_do_not_attract_on_their_own() {
        let mut scene = Scene::new();
        let page = scene.create_page(0.0, 0.0, 800.0, 600.0);
        let layer = scene.create_layer();
        scene.insert_child(scene.root(), page).unwrap();
        scene.insert_child(page, layer).unwrap();
        scene.set_active_page(Some(page)).unwrap();
        let compound = scene.create_compound_path();
        scene.insert_child(layer, compound).unwrap();
        let anchors = scene.anchor_container(compound).unwrap();
        let a = scene.create_path(vexel_core::PathShape::new(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            false,
        ));
        let b = scene.create_path(vexel_core::PathShape::new(
            vec![Point::new(30.0, 30.0), Point::new(40.0, 40.0)],
            false,
        ));
        scene.insert_child(anchors, a).unwrap();
        scene.insert_child(anchors, b).unwrap();
        scene.options_mut().snap_distance = 5.0;
        let mut guides = Guides::new();

        // The inner sub-path corner at (30, 30) is not a pivot; only the
        // compound's own bbox corners and center are.
        guides.begin_map();
        let mapped = guides.map_point(
            &scene,
            Point::new(32.0, 32.0),
            &InputModifiers::default(),
            true,
        );
        guides.finish_map();
        assert_eq!(mapped, Point::new(32.0, 32.0));

        guides.begin_map();
        let mapped = guides.map_point(
            &scene,
            Point::new(38.0, 38.0),
            &InputModifiers::default(),
            true,
        );
        guides.finish_map();
        assert_eq!(mapped, Point::new(40.0, 40.0));
    }

    #[test]
    fn point_outside_all_tolerances_is_untouched() {
        let (mut scene, _) = scene_with_square(50.0);
        scene.options_mut().snap_distance = 5.0;
        let mut guides = Guides::new();

        guides.begin_map();
        let point = Point::new(300.0, 400.0);
        let mapped = guides.map_point(&scene, point, &InputModifiers::default(), true);
        assert_eq!(mapped, point);
        assert!(guides.visuals().is_empty());
        assert_eq!(guides.finish_map(), None);
    }

    #[test]
    fn modifier_disables_shape_snapping() {
        let (mut scene, _) = scene_with_square(50.0);
        scene.options_mut().snap_distance = 5.0;
        let mut guides = Guides::new();
        let modifiers = InputModifiers {
            snap_disabled: true,
            ..InputModifiers::default()
        };

        guides.begin_map();
        let mapped = guides.map_point(&scene, Point::new(48.0, 48.0), &modifiers, true);
        guides.finish_map();
        assert_eq!(mapped, Point::new(48.0, 48.0));
    }

    #[test]
    fn excluded_shape_does_not_attract() {
        let (mut scene, rect) = scene_with_square(50.0);
        scene.options_mut().snap_distance = 5.0;
        let mut guides = Guides::new();

        guides.begin_map();
        guides.add_exclusion(rect);
        let mapped = guides.map_point(
            &scene,
            Point::new(48.0, 48.0),
            &InputModifiers::default(),
            true,
        );
        guides.finish_map();
        assert_eq!(mapped, Point::new(48.0, 48.0));

        // Exclusions die with the session.
        guides.begin_map();
        let mapped = guides.map_point(
            &scene,
            Point::new(48.0, 48.0),
            &InputModifiers::default(),
            true,
        );
        guides.finish_map();
        assert_eq!(mapped, Point::new(50.0, 50.0));
    }

    #[test]
    fn grid_rounds_when_active() {
        let mut scene = Scene::new();
        scene.options_mut().grid_active = true;
        scene.options_mut().grid_size = 20.0;
        let mut guides = Guides::new();

        guides.begin_map();
        let mapped = guides.map_point(
            &scene,
            Point::new(28.0, 71.0),
            &InputModifiers::default(),
            true,
        );
        guides.finish_map();
        assert_eq!(mapped, Point::new(20.0, 80.0));
    }

    #[test]
    fn unit_snap_half_units() {
        let mut scene = Scene::new();
        scene.options_mut().unit_snap = UnitSnap::Half;
        let mut guides = Guides::new();

        guides.begin_map();
        let mapped = guides.map_point(
            &scene,
            Point::new(10.3, 7.76),
            &InputModifiers::default(),
            true,
        );
        guides.finish_map();
        assert_eq!(mapped, Point::new(10.5, 8.0));
    }

    #[test]
    fn page_center_snap_draws_full_extent_line() {
        let mut scene = Scene::new();
        let page = scene.create_page(0.0, 0.0, 100.0, 80.0);
        scene.insert_child(scene.root(), page).unwrap();
        scene.set_active_page(Some(page)).unwrap();
        scene.options_mut().snap_distance = 5.0;
        let mut guides = Guides::new();

        guides.begin_map();
        let mapped = guides.map_point(
            &scene,
            Point::new(52.0, 10.0),
            &InputModifiers::default(),
            true,
        );
        assert_eq!(mapped.x, 50.0);
        assert_eq!(
            guides.visuals(),
            &[[Point::new(50.0, 0.0), Point::new(50.0, 80.0)]]
        );
        guides.finish_map();
    }
}
