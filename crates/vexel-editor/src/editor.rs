//! Interactive element editing: previewed part moves over live scene nodes.
//!
//! An editor never mutates the scene while a drag is in flight. Part moves
//! accumulate into a preview (a pending transform, or a cloned shape for
//! property-level parts) and the preview is written back in one step when
//! the interaction commits.

use kurbo::{Affine, Point, Rect};
use log::debug;
use thiserror::Error;
use vexel_core::{Flag, NodeId, PropertyValue, Scene, ShapeData, ShapeKind, TreeError, VertexCommand};

use crate::guides::{Guides, InputModifiers};
use crate::resize::{resize_transform, Side};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The part does not apply to the edited element kind.
    #[error("element cannot be edited this way: {0}")]
    NotEditable(&'static str),
}

/// A draggable part of an edited element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorPart {
    /// The element body; dragging translates it.
    Move,
    /// A resize handle of the selection box.
    Side(Side),
    /// An ellipse's start-angle handle.
    StartAngle,
    /// An ellipse's end-angle handle.
    EndAngle,
    /// A polygon's outer-radius handle.
    OuterRadius,
    /// A polygon's inner-radius handle.
    InnerRadius,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorState {
    Idle,
    Previewing,
}

/// Editor over one scene element.
///
/// Compound paths get a child editor per sub-path so parts of individual
/// sub-paths stay addressable during the interaction.
pub struct BlockEditor {
    element: NodeId,
    state: EditorState,
    /// Pending whole-element transform (move/resize preview).
    transform: Option<Affine>,
    /// Cloned shape for property-level previews (angle handles).
    preview: Option<ShapeData>,
    part_selection: Vec<EditorPart>,
    children: Vec<BlockEditor>,
}

impl BlockEditor {
    pub fn new(scene: &Scene, element: NodeId) -> Result<Self, EditorError> {
        scene.shape(element)?;
        let children = match scene.anchor_container(element) {
            Ok(anchors) => scene
                .children(anchors)?
                .iter()
                .map(|&subpath| BlockEditor::new(scene, subpath))
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => Vec::new(),
        };
        Ok(BlockEditor {
            element,
            state: EditorState::Idle,
            transform: None,
            preview: None,
            part_selection: Vec::new(),
            children,
        })
    }

    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn child_editors(&mut self) -> &mut [BlockEditor] {
        &mut self.children
    }

    pub fn for_subpath(&mut self, id: NodeId) -> Option<&mut BlockEditor> {
        self.children.iter_mut().find(|c| c.element == id)
    }

    /// Whether this editor or any sub-path editor holds an uncommitted
    /// preview.
    pub fn is_previewing(&self) -> bool {
        self.state == EditorState::Previewing || self.children.iter().any(|c| c.is_previewing())
    }

    // ---- part selection ----

    pub fn select_part(&mut self, part: EditorPart) {
        if !self.part_selection.contains(&part) {
            self.part_selection.push(part);
        }
        for child in &mut self.children {
            child.select_part(part);
        }
    }

    pub fn deselect_part(&mut self, part: EditorPart) {
        self.part_selection.retain(|&p| p != part);
        for child in &mut self.children {
            child.deselect_part(part);
        }
    }

    pub fn selected_parts(&self) -> &[EditorPart] {
        &self.part_selection
    }

    // ---- part moves ----

    /// Drags `part` from `start` to `current`, routing the pointer through
    /// the guides first. The result lands in the preview only.
    pub fn move_part(
        &mut self,
        scene: &Scene,
        guides: &mut Guides,
        part: EditorPart,
        start: Point,
        current: Point,
        modifiers: &InputModifiers,
    ) -> Result<(), EditorError> {
        guides.begin_map();
        guides.add_exclusion(self.element);
        let mapped = guides.map_point(scene, current, modifiers, true);
        guides.finish_map();
        let delta = mapped - start;

        match part {
            EditorPart::Move => {
                self.transform = Some(Affine::translate(delta));
                self.state = EditorState::Previewing;
            }
            EditorPart::Side(side) => {
                let bbox = scene
                    .geometry_bbox(self.element)?
                    .ok_or(EditorError::NotEditable("element has no bounds"))?;
                match resize_transform(
                    bbox,
                    side,
                    delta.x,
                    delta.y,
                    modifiers.shift,
                    modifiers.option,
                ) {
                    Some(transform) => {
                        self.transform = Some(transform);
                        self.state = EditorState::Previewing;
                    }
                    // A collapse is rejected; whatever preview the drag had
                    // built so far stays in place.
                    None => debug!("degenerate resize on {} rejected", self.element),
                }
            }
            EditorPart::StartAngle | EditorPart::EndAngle => {
                self.move_angle_part(scene, part, mapped)?;
            }
            EditorPart::OuterRadius | EditorPart::InnerRadius => {
                self.move_radius_part(scene, part, mapped, modifiers)?;
            }
        }
        Ok(())
    }

    /// Maps the pointer into element-local space and steers the ellipse's
    /// angle properties. With both angle handles selected the swept span is
    /// preserved and rotated as one.
    fn move_angle_part(
        &mut self,
        scene: &Scene,
        part: EditorPart,
        mapped: Point,
    ) -> Result<(), EditorError> {
        let shape = scene.shape(self.element)?;
        let ShapeKind::Ellipse(_) = shape.kind else {
            return Err(EditorError::NotEditable("angle handles require an ellipse"));
        };
        let world = scene.transform_of(self.element)?.unwrap_or_default();
        let local = world.inverse() * mapped;
        let angle = local.y.atan2(local.x);

        let preview = self.preview.get_or_insert_with(|| shape.clone());
        let ShapeKind::Ellipse(ellipse) = &mut preview.kind else {
            return Err(EditorError::NotEditable("angle handles require an ellipse"));
        };
        let both = self.part_selection.contains(&EditorPart::StartAngle)
            && self.part_selection.contains(&EditorPart::EndAngle);
        match part {
            EditorPart::StartAngle => {
                if both {
                    let delta = angle - ellipse.start_angle;
                    ellipse.start_angle = angle;
                    ellipse.end_angle += delta;
                } else {
                    ellipse.start_angle = angle;
                }
            }
            EditorPart::EndAngle => {
                if both {
                    let delta = angle - ellipse.end_angle;
                    ellipse.end_angle = angle;
                    ellipse.start_angle += delta;
                } else {
                    ellipse.end_angle = angle;
                }
            }
            _ => unreachable!(),
        }
        self.state = EditorState::Previewing;
        Ok(())
    }

    /// Steers a polygon's radius/angle pair from the pointer position in
    /// element-local space. Shift pins the spike angle, option pins the
    /// radius.
    fn move_radius_part(
        &mut self,
        scene: &Scene,
        part: EditorPart,
        mapped: Point,
        modifiers: &InputModifiers,
    ) -> Result<(), EditorError> {
        let shape = scene.shape(self.element)?;
        let ShapeKind::Polygon(_) = shape.kind else {
            return Err(EditorError::NotEditable("radius handles require a polygon"));
        };
        let world = scene.transform_of(self.element)?.unwrap_or_default();
        let local = world.inverse() * mapped;
        let radius = local.to_vec2().hypot();
        let angle = local.y.atan2(local.x);

        let preview = self.preview.get_or_insert_with(|| shape.clone());
        let ShapeKind::Polygon(polygon) = &mut preview.kind else {
            return Err(EditorError::NotEditable("radius handles require a polygon"));
        };
        let (part_radius, part_angle) = match part {
            EditorPart::OuterRadius => (&mut polygon.outer_radius, &mut polygon.outer_angle),
            EditorPart::InnerRadius => (&mut polygon.inner_radius, &mut polygon.inner_angle),
            _ => unreachable!(),
        };
        if !modifiers.option {
            *part_radius = radius;
        }
        if !modifiers.shift {
            *part_angle = angle;
        }
        self.state = EditorState::Previewing;
        Ok(())
    }

    // ---- preview ----

    /// The element's bounds with the preview applied; falls back to the
    /// live bounds when no preview is pending.
    pub fn preview_bbox(&self, scene: &Scene) -> Result<Option<Rect>, EditorError> {
        if let Some(preview) = &self.preview {
            let world = scene.transform_of(self.element)?.unwrap_or_default();
            return Ok(shape_local_bbox(&preview.kind).map(|b| world.transform_rect_bbox(b)));
        }
        let bbox = scene.geometry_bbox(self.element)?;
        match (self.transform, bbox) {
            (Some(transform), Some(bbox)) => Ok(Some(transform.transform_rect_bbox(bbox))),
            (_, bbox) => Ok(bbox),
        }
    }

    /// Whether this editor or any sub-path editor holds a transform worth
    /// applying.
    pub fn can_apply_transform(&self, scene: &Scene) -> Result<bool, EditorError> {
        if self.own_transform_applies(scene)? {
            return Ok(true);
        }
        for child in &self.children {
            if child.can_apply_transform(scene)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The pending transform exists, is not the identity, and the element
    /// is not locked.
    fn own_transform_applies(&self, scene: &Scene) -> Result<bool, EditorError> {
        let Some(transform) = self.transform else {
            return Ok(false);
        };
        if transform == Affine::IDENTITY {
            return Ok(false);
        }
        Ok(!scene.has_flag(self.element, Flag::Locked)?)
    }

    /// Commits the preview to the scene and resets the editor. A transform
    /// that cannot be applied is discarded silently (the preview is still
    /// cleared).
    pub fn apply_part_move(&mut self, scene: &mut Scene) -> Result<(), EditorError> {
        if self.own_transform_applies(scene)? {
            if let Some(transform) = self.transform {
                scene.transform(self.element, transform)?;
            }
        }
        if let Some(preview) = self.preview.take() {
            match preview.kind {
                ShapeKind::Ellipse(ellipse) => {
                    scene.set_properties(
                        self.element,
                        &["sa", "ea"],
                        &[
                            PropertyValue::Float(ellipse.start_angle),
                            PropertyValue::Float(ellipse.end_angle),
                        ],
                    )?;
                }
                ShapeKind::Polygon(polygon) => {
                    scene.set_properties(
                        self.element,
                        &["or", "oa", "ir", "ia"],
                        &[
                            PropertyValue::Float(polygon.outer_radius),
                            PropertyValue::Float(polygon.outer_angle),
                            PropertyValue::Float(polygon.inner_radius),
                            PropertyValue::Float(polygon.inner_angle),
                        ],
                    )?;
                }
                _ => {}
            }
        }
        for child in &mut self.children {
            child.apply_part_move(scene)?;
        }
        self.reset_part_move();
        Ok(())
    }

    /// Drops the preview without touching the scene.
    pub fn reset_part_move(&mut self) {
        self.transform = None;
        self.preview = None;
        self.state = EditorState::Idle;
        for child in &mut self.children {
            child.reset_part_move();
        }
    }
}

/// Local-space bounds of a shape kind's outline.
fn shape_local_bbox(kind: &ShapeKind) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    let mut step = 0;
    while let Some(vertex) = kind.local_vertex(step) {
        step += 1;
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
