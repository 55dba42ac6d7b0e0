//! The scene tree: arena storage, validated mutation and change propagation.
//!
//! Nodes live in a generational arena and are addressed by [`NodeId`].
//! Every structural or property mutation is validated up front, then
//! announced through `Before*`/`After*` observer notifications; geometry
//! consequences (cache invalidation, repaint requests) ride along inside
//! update brackets so nested mutations collapse into one repaint region.

use kurbo::{Affine, Point, Rect};
use log::{debug, warn};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::element::{union_bounds, BoundsCache};
use crate::error::TreeError;
use crate::event::{ChangeEvent, GeometryPhase, ObserverId};
use crate::node::{Flag, Flags, NodeData, NodeId, NodeKind, PageData, PropertyValue};
use crate::shapes::{
    CompoundPath, Ellipse, ImageShape, ImageStatus, PathShape, Polygon, ShapeData, ShapeKind,
};
use crate::vertex::{stream_bbox, stream_hit_test, Vertex, VertexCommand, VertexSource};

/// Rounding applied by unit snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSnap {
    #[default]
    Off,
    /// Round to whole units.
    Full,
    /// Round to half units.
    Half,
}

/// Tunables shared by the scene and its editors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneOptions {
    /// Distance within which guides attract a mapped point.
    pub snap_distance: f64,
    /// Distance within which hit testing matches an outline.
    pub pick_distance: f64,
    pub grid_size: f64,
    pub grid_active: bool,
    pub unit_snap: UnitSnap,
}

impl Default for SceneOptions {
    fn default() -> Self {
        SceneOptions {
            snap_distance: 3.0,
            pick_distance: 3.0,
            grid_size: 20.0,
            grid_active: false,
            unit_snap: UnitSnap::Off,
        }
    }
}

/// Work the host must perform to advance an image shape's loading.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceRequest {
    /// Resolve the shape's source reference to a fetchable location.
    Resolve { node: NodeId, src: String },
    /// Fetch and decode the resolved location into a bitmap.
    Decode { node: NodeId, location: String },
}

struct Slot {
    generation: u32,
    data: Option<NodeData>,
}

type ObserverFn = Box<dyn FnMut(&ChangeEvent)>;

/// The scene document.
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    options: SceneOptions,
    observers: Vec<(ObserverId, ObserverFn)>,
    next_observer: u64,
    /// Open update brackets across the whole scene; repaint requests are
    /// pooled until the outermost one closes.
    update_depth: u32,
    pending_invalidation: Option<Rect>,
    resource_requests: Vec<ResourceRequest>,
    active_page: Option<NodeId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::with_options(SceneOptions::default())
    }

    pub fn with_options(options: SceneOptions) -> Self {
        let mut scene = Scene {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            options,
            observers: Vec::new(),
            next_observer: 0,
            update_depth: 0,
            pending_invalidation: None,
            resource_requests: Vec::new(),
            active_page: None,
        };
        scene.root = scene.alloc(NodeData::new(NodeKind::Scene));
        scene
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut SceneOptions {
        &mut self.options
    }

    // ---- arena ----

    fn alloc(&mut self, data: NodeData) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.data = Some(data);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    data: Some(data),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation && s.data.is_some())
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&NodeData, TreeError> {
        self.slot(id)
            .and_then(|s| s.data.as_ref())
            .ok_or(TreeError::StaleNode)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, TreeError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.data.as_mut())
            .ok_or(TreeError::StaleNode)
    }

    // ---- accessors ----

    pub fn kind(&self, id: NodeId) -> Result<&NodeKind, TreeError> {
        Ok(&self.node(id)?.kind)
    }

    pub fn uuid(&self, id: NodeId) -> Result<Uuid, TreeError> {
        Ok(self.node(id)?.uuid)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], TreeError> {
        Ok(&self.node(id)?.children)
    }

    pub fn flags(&self, id: NodeId) -> Result<Flags, TreeError> {
        Ok(self.node(id)?.flags)
    }

    pub fn has_flag(&self, id: NodeId, flag: Flag) -> Result<bool, TreeError> {
        Ok(self.node(id)?.flags.has(flag))
    }

    pub fn shape(&self, id: NodeId) -> Result<&ShapeData, TreeError> {
        self.node(id)?
            .shape()
            .ok_or(TreeError::NotAContainer("shape access on non-shape"))
    }

    pub fn transform_of(&self, id: NodeId) -> Result<Option<Affine>, TreeError> {
        Ok(self.node(id)?.element.as_ref().and_then(|e| e.transform))
    }

    /// Whether the node is reachable from the scene root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = id;
        loop {
            if cursor == self.root {
                return true;
            }
            match self.node(cursor).ok().and_then(|n| n.parent) {
                Some(parent) => cursor = parent,
                None => return false,
            }
        }
    }

    /// The protected sub-path container of a compound path.
    pub fn anchor_container(&self, compound: NodeId) -> Result<NodeId, TreeError> {
        let node = self.node(compound)?;
        node.children
            .iter()
            .copied()
            .find(|&c| {
                self.node(c)
                    .map(|n| matches!(n.kind, NodeKind::AnchorPaths))
                    .unwrap_or(false)
            })
            .ok_or(TreeError::NotAContainer(
                "node has no anchor-paths container",
            ))
    }

    // ---- construction ----

    fn create(&mut self, kind: NodeKind) -> NodeId {
        self.alloc(NodeData::new(kind))
    }

    pub fn create_page(&mut self, x: f64, y: f64, w: f64, h: f64) -> NodeId {
        self.create(NodeKind::Page(PageData { x, y, w, h }))
    }

    pub fn create_layer(&mut self) -> NodeId {
        self.create(NodeKind::Layer)
    }

    pub fn create_rectangle(&mut self) -> NodeId {
        self.create(NodeKind::Shape(ShapeData::new(ShapeKind::Rectangle)))
    }

    pub fn create_ellipse(&mut self, ellipse: Ellipse) -> NodeId {
        self.create(NodeKind::Shape(ShapeData::new(ShapeKind::Ellipse(ellipse))))
    }

    pub fn create_polygon(&mut self, polygon: Polygon) -> NodeId {
        self.create(NodeKind::Shape(ShapeData::new(ShapeKind::Polygon(polygon))))
    }

    pub fn create_path(&mut self, path: PathShape) -> NodeId {
        self.create(NodeKind::Shape(ShapeData::new(ShapeKind::Path(path))))
    }

    pub fn create_image(&mut self, src: impl Into<String>) -> NodeId {
        self.create(NodeKind::Shape(ShapeData::new(ShapeKind::Image(
            ImageShape::new(src),
        ))))
    }

    /// Creates a compound path together with its anchor-paths container.
    pub fn create_compound_path(&mut self) -> NodeId {
        let compound = self.create(NodeKind::Shape(ShapeData::new(ShapeKind::CompoundPath(
            CompoundPath::default(),
        ))));
        let anchors = self.create(NodeKind::AnchorPaths);
        // Structural wiring of a detached node pair; no notifications.
        if let Ok(node) = self.node_mut(anchors) {
            node.parent = Some(compound);
        }
        if let Ok(node) = self.node_mut(compound) {
            node.children.push(anchors);
        }
        compound
    }

    // ---- observers ----

    pub fn add_observer(&mut self, observer: impl FnMut(&ChangeEvent) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    fn emit(&mut self, event: ChangeEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    // ---- validation ----

    /// Checks whether `child` may become a child of `parent`, without
    /// mutating anything.
    pub fn validate_insertion(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        if !parent_node.kind.is_container() {
            return Err(TreeError::NotAContainer(parent_node.kind.tag()));
        }
        if child_node.parent.is_some() {
            return Err(TreeError::AlreadyAttached);
        }
        // Walking up from the parent must never reach the child.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(TreeError::WouldCreateCycle);
            }
            cursor = self.node(id)?.parent;
        }
        let invalid = || TreeError::InvalidParent {
            child: child_node.kind.tag(),
            parent: parent_node.kind.tag(),
        };
        match &child_node.kind {
            NodeKind::Scene => Err(invalid()),
            NodeKind::Page(_) => match parent_node.kind {
                NodeKind::Scene => Ok(()),
                _ => Err(invalid()),
            },
            NodeKind::Layer => match parent_node.kind {
                NodeKind::Page(_) | NodeKind::Layer => Ok(()),
                _ => Err(invalid()),
            },
            NodeKind::AnchorPaths => {
                let is_compound = matches!(
                    parent_node.shape().map(|s| &s.kind),
                    Some(ShapeKind::CompoundPath(_))
                );
                let has_one = parent_node.children.iter().any(|&c| {
                    self.node(c)
                        .map(|n| matches!(n.kind, NodeKind::AnchorPaths))
                        .unwrap_or(false)
                });
                if is_compound && !has_one {
                    Ok(())
                } else {
                    Err(invalid())
                }
            }
            NodeKind::Shape(shape) => match &parent_node.kind {
                NodeKind::Layer => Ok(()),
                NodeKind::AnchorPaths => match shape.kind {
                    ShapeKind::Path(_) => Ok(()),
                    _ => Err(invalid()),
                },
                _ => Err(invalid()),
            },
        }
    }

    /// Checks whether `node` may be detached from its parent.
    pub fn validate_removal(&self, node: NodeId) -> Result<(), TreeError> {
        let data = self.node(node)?;
        if matches!(data.kind, NodeKind::AnchorPaths) {
            return Err(TreeError::RemovalForbidden("anchor-paths"));
        }
        Ok(())
    }

    // ---- structure ----

    /// Appends `child` to `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.insert_child_before(parent, child, None)
    }

    /// Inserts `child` before `reference` (or appends when `reference` is
    /// `None`). On rejection the tree is untouched and nothing is emitted.
    pub fn insert_child_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), TreeError> {
        self.validate_insertion(parent, child)?;
        let position = match reference {
            Some(marker) => self
                .node(parent)?
                .children
                .iter()
                .position(|&c| c == marker)
                .ok_or(TreeError::StaleNode)?,
            None => self.node(parent)?.children.len(),
        };
        self.emit(ChangeEvent::BeforeChildInsert { parent, child });
        let owner = self.geometry_owner(parent)?;
        self.begin_update(owner)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.insert(position, child);
        self.start_loading_subtree(child)?;
        self.end_update(owner)?;
        self.emit(ChangeEvent::AfterChildInsert { parent, child });
        Ok(())
    }

    /// Detaches `child` from `parent`. The node stays alive and can be
    /// re-inserted elsewhere.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if self.node(child)?.parent != Some(parent) {
            return Err(TreeError::StaleNode);
        }
        self.validate_removal(child)?;
        self.emit(ChangeEvent::BeforeChildRemove { parent, child });
        let owner = self.geometry_owner(parent)?;
        self.begin_update(owner)?;
        self.node_mut(parent)?.children.retain(|&c| c != child);
        self.node_mut(child)?.parent = None;
        self.end_update(owner)?;
        self.emit(ChangeEvent::AfterChildRemove { parent, child });
        if self.active_page == Some(child) {
            self.active_page = None;
        }
        Ok(())
    }

    /// Detaches (when attached) and frees `id` and its whole subtree.
    /// Handles into the subtree become stale.
    pub fn destroy(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == self.root {
            return Err(TreeError::RemovalForbidden("scene"));
        }
        if let Some(parent) = self.node(id)?.parent {
            self.remove_child(parent, id)?;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Ok(node) = self.node(current) {
                stack.extend(node.children.iter().copied());
            }
            let slot = &mut self.slots[current.index as usize];
            slot.data = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
        }
        Ok(())
    }

    /// The element whose geometry bracket covers mutations under `parent`.
    /// Mutating a compound path's anchor container is the compound's own
    /// geometry change.
    fn geometry_owner(&self, parent: NodeId) -> Result<NodeId, TreeError> {
        let node = self.node(parent)?;
        if matches!(node.kind, NodeKind::AnchorPaths) {
            node.parent.ok_or(TreeError::StaleNode)
        } else {
            Ok(parent)
        }
    }

    // ---- flags ----

    /// Sets or clears an editor flag. Compound paths forward flag changes to
    /// their sub-paths, each with its own notification pair, before the
    /// compound's own `AfterFlagChange` fires.
    pub fn set_flag(&mut self, id: NodeId, flag: Flag, set: bool) -> Result<(), TreeError> {
        let node = self.node(id)?;
        if node.flags.has(flag) == set {
            return Ok(());
        }
        self.emit(ChangeEvent::BeforeFlagChange { node: id, flag, set });
        {
            let node = self.node_mut(id)?;
            node.flags = node.flags.with(flag, set);
        }
        if let Ok(anchors) = self.anchor_container(id) {
            let subpaths: Vec<NodeId> = self.node(anchors)?.children.clone();
            for subpath in subpaths {
                self.set_flag(subpath, flag, set)?;
            }
        }
        if flag == Flag::Hidden {
            if let Some(area) = self.paint_bbox(id)? {
                self.request_invalidation(area);
            }
        }
        self.emit(ChangeEvent::AfterFlagChange { node: id, flag, set });
        Ok(())
    }

    /// Marks a page as the active one, clearing the previous active page.
    pub fn set_active_page(&mut self, page: Option<NodeId>) -> Result<(), TreeError> {
        if let Some(previous) = self.active_page.take() {
            if self.is_live(previous) {
                self.set_flag(previous, Flag::Active, false)?;
            }
        }
        if let Some(next) = page {
            if !matches!(self.node(next)?.kind, NodeKind::Page(_)) {
                return Err(TreeError::NotAContainer("active page must be a page"));
            }
            self.set_flag(next, Flag::Active, true)?;
            self.active_page = Some(next);
        }
        Ok(())
    }

    pub fn active_page(&self) -> Option<NodeId> {
        self.active_page
    }

    // ---- properties ----

    /// Sets a batch of properties atomically.
    ///
    /// The whole batch is validated before anything is written; on error no
    /// field changes and no notification fires. Returns `false` when every
    /// value equals the current one (nothing changed, nothing emitted).
    pub fn set_properties(
        &mut self,
        id: NodeId,
        names: &[&str],
        values: &[PropertyValue],
    ) -> Result<bool, TreeError> {
        if names.len() != values.len() {
            return Err(TreeError::PropertyCountMismatch {
                names: names.len(),
                values: values.len(),
            });
        }
        {
            let node = self.node(id)?;
            for (name, value) in names.iter().zip(values) {
                node.validate_property(name, value)?;
            }
        }
        let mut changed: Vec<usize> = Vec::new();
        {
            let node = self.node(id)?;
            for (i, (name, value)) in names.iter().zip(values).enumerate() {
                if node.get_property(name).as_ref() != Some(value) {
                    changed.push(i);
                }
            }
        }
        if changed.is_empty() {
            return Ok(false);
        }
        let changed_names: Vec<String> = changed.iter().map(|&i| names[i].to_string()).collect();
        let geometry = {
            let node = self.node(id)?;
            changed
                .iter()
                .any(|&i| node.is_geometry_property(names[i]))
        };
        let in_bracket = self
            .node(id)?
            .element
            .as_ref()
            .map(|e| e.update_depth > 0)
            .unwrap_or(false);

        if !in_bracket {
            self.emit(ChangeEvent::BeforePropertiesChange {
                node: id,
                properties: changed_names.clone(),
            });
        }
        let bracket = geometry && !in_bracket;
        if bracket {
            self.begin_update(id)?;
        }
        {
            let node = self.node_mut(id)?;
            for &i in &changed {
                node.apply_property(names[i], &values[i]);
            }
            if geometry {
                if let Some(element) = node.element.as_ref() {
                    element.invalidate_bounds();
                }
            }
        }
        let src_changed = changed.iter().any(|&i| names[i] == "src");
        if src_changed {
            self.restart_image_loading(id)?;
        }
        if in_bracket {
            // Batched: names pool up and one merged notification fires when
            // the bracket closes.
            if let Some(element) = self.node_mut(id)?.element.as_mut() {
                for name in changed_names {
                    if !element.pending_properties.contains(&name) {
                        element.pending_properties.push(name);
                    }
                }
            }
        } else {
            if bracket {
                self.end_update(id)?;
            }
            self.emit(ChangeEvent::AfterPropertiesChange {
                node: id,
                properties: changed_names,
            });
        }
        Ok(true)
    }

    pub fn get_property(&self, id: NodeId, name: &str) -> Result<Option<PropertyValue>, TreeError> {
        Ok(self.node(id)?.get_property(name))
    }

    /// Post-multiplies `affine` onto the element's transform. Compound paths
    /// forward the transform to their sub-paths inside one geometry bracket.
    pub fn transform(&mut self, id: NodeId, affine: Affine) -> Result<(), TreeError> {
        if affine == Affine::IDENTITY {
            return Ok(());
        }
        if let Ok(anchors) = self.anchor_container(id) {
            let subpaths: Vec<NodeId> = self.node(anchors)?.children.clone();
            self.begin_update(id)?;
            for subpath in subpaths {
                self.transform(subpath, affine)?;
            }
            self.end_update(id)?;
            return Ok(());
        }
        let current = self.transform_of(id)?.unwrap_or_default();
        self.set_properties(id, &["trf"], &[PropertyValue::from_affine(affine * current)])?;
        Ok(())
    }

    // ---- geometry update brackets ----

    /// Opens a geometry update bracket on an element. The first (outermost)
    /// open captures the paint bbox and announces the upcoming change; all
    /// consequences are deferred to the matching [`Scene::end_update`].
    pub fn begin_update(&mut self, id: NodeId) -> Result<(), TreeError> {
        let outermost = {
            let element = self
                .node_mut(id)?
                .element
                .as_mut()
                .ok_or(TreeError::NotAContainer("geometry update on non-element"))?;
            element.update_depth += 1;
            element.update_depth == 1
        };
        self.update_depth += 1;
        if outermost {
            // Bounds are only read before any mutation; a nested open must
            // not recompute them mid-change.
            let saved = self.paint_bbox(id)?;
            if let Some(element) = self.node_mut(id)?.element.as_mut() {
                element.saved_paint_bbox = saved;
            }
            self.emit(ChangeEvent::GeometryChange {
                node: id,
                phase: GeometryPhase::Before,
            });
        }
        Ok(())
    }

    /// Closes a geometry update bracket. The outermost close drops the
    /// element's and its ancestors' bbox caches, fires the merged property
    /// notification, announces the finished change and requests one repaint
    /// over the union of the old and new paint extents.
    pub fn end_update(&mut self, id: NodeId) -> Result<(), TreeError> {
        let outermost = {
            let element = self
                .node_mut(id)?
                .element
                .as_mut()
                .ok_or(TreeError::NotAContainer("geometry update on non-element"))?;
            element.update_depth = element.update_depth.saturating_sub(1);
            element.update_depth == 0
        };
        if outermost {
            let (saved, pending) = {
                let element = self.node_mut(id)?.element.as_mut().ok_or(
                    TreeError::NotAContainer("geometry update on non-element"),
                )?;
                element.invalidate_bounds();
                (
                    element.saved_paint_bbox.take(),
                    std::mem::take(&mut element.pending_properties),
                )
            };
            if !pending.is_empty() {
                self.emit(ChangeEvent::AfterPropertiesChange {
                    node: id,
                    properties: pending,
                });
            }
            // Ancestors aggregate descendant bounds; their caches go stale
            // with ours.
            let mut cursor = self.node(id)?.parent;
            while let Some(ancestor) = cursor {
                let notify = {
                    let node = self.node(ancestor)?;
                    cursor = node.parent;
                    match node.element.as_ref() {
                        Some(element) => {
                            element.invalidate_bounds();
                            true
                        }
                        None => false,
                    }
                };
                if notify {
                    self.emit(ChangeEvent::GeometryChange {
                        node: ancestor,
                        phase: GeometryPhase::Child,
                    });
                }
            }
            self.emit(ChangeEvent::GeometryChange {
                node: id,
                phase: GeometryPhase::After,
            });
            let fresh = self.paint_bbox(id)?;
            if let Some(area) = union_bounds(saved, fresh) {
                self.request_invalidation(area);
            }
        }
        self.update_depth = self.update_depth.saturating_sub(1);
        if self.update_depth == 0 {
            if let Some(area) = self.pending_invalidation.take() {
                self.emit(ChangeEvent::InvalidationRequest { area });
            }
        }
        Ok(())
    }

    fn request_invalidation(&mut self, area: Rect) {
        if self.update_depth > 0 {
            self.pending_invalidation = Some(match self.pending_invalidation {
                Some(pending) => pending.union(area),
                None => area,
            });
        } else {
            self.emit(ChangeEvent::InvalidationRequest { area });
        }
    }

    // ---- bounding boxes ----

    /// Geometry bounding box in scene coordinates, `None` for empty
    /// geometry. Cached until the next geometry change.
    pub fn geometry_bbox(&self, id: NodeId) -> Result<Option<Rect>, TreeError> {
        let node = self.node(id)?;
        let Some(element) = node.element.as_ref() else {
            return Ok(None);
        };
        if let BoundsCache::Clean(bounds) = element.geometry_bbox.get() {
            return Ok(bounds);
        }
        let bounds = self.compute_geometry_bbox(id)?;
        // Cells allow the lazy fill through a shared scene reference.
        if let Ok(node) = self.node(id) {
            if let Some(element) = node.element.as_ref() {
                element.geometry_bbox.set(BoundsCache::Clean(bounds));
            }
        }
        Ok(bounds)
    }

    /// Paint bounding box: geometry extended by style margins (stroke).
    pub fn paint_bbox(&self, id: NodeId) -> Result<Option<Rect>, TreeError> {
        let node = self.node(id)?;
        let Some(element) = node.element.as_ref() else {
            return Ok(None);
        };
        if let BoundsCache::Clean(bounds) = element.paint_bbox.get() {
            return Ok(bounds);
        }
        let bounds = self.compute_paint_bbox(id)?;
        if let Ok(node) = self.node(id) {
            if let Some(element) = node.element.as_ref() {
                element.paint_bbox.set(BoundsCache::Clean(bounds));
            }
        }
        Ok(bounds)
    }

    fn compute_geometry_bbox(&self, id: NodeId) -> Result<Option<Rect>, TreeError> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Page(page) => {
                Ok(Some(Rect::new(page.x, page.y, page.x + page.w, page.y + page.h)))
            }
            NodeKind::Scene | NodeKind::Layer => {
                let mut bounds = None;
                for &child in &node.children {
                    bounds = union_bounds(bounds, self.geometry_bbox(child)?);
                }
                Ok(bounds)
            }
            NodeKind::Shape(_) => {
                let mut source = self.world_vertices(id)?;
                Ok(stream_bbox(&mut source))
            }
            NodeKind::AnchorPaths => Ok(None),
        }
    }

    fn compute_paint_bbox(&self, id: NodeId) -> Result<Option<Rect>, TreeError> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Page(page) => {
                Ok(Some(Rect::new(page.x, page.y, page.x + page.w, page.y + page.h)))
            }
            NodeKind::Scene | NodeKind::Layer => {
                let mut bounds = None;
                for &child in &node.children {
                    bounds = union_bounds(bounds, self.paint_bbox(child)?);
                }
                Ok(bounds)
            }
            NodeKind::Shape(shape) => {
                let margin = shape.style.paint_margin();
                Ok(self
                    .geometry_bbox(id)?
                    .map(|bounds| bounds.inflate(margin, margin)))
            }
            NodeKind::AnchorPaths => Ok(None),
        }
    }

    // ---- vertex streams ----

    /// The shape's outline stream in scene coordinates.
    pub fn world_vertices(&self, id: NodeId) -> Result<ShapeVertices<'_>, TreeError> {
        self.vertices(id, true)
    }

    /// The shape's outline stream in its local coordinate space.
    pub fn local_vertices(&self, id: NodeId) -> Result<ShapeVertices<'_>, TreeError> {
        self.vertices(id, false)
    }

    fn vertices(&self, id: NodeId, world: bool) -> Result<ShapeVertices<'_>, TreeError> {
        self.shape(id)?;
        Ok(ShapeVertices {
            scene: self,
            id,
            world,
            step: 0,
            child: 0,
        })
    }

    /// Whether `point` lies on the shape's outline, within the pick
    /// distance extended by the stroke margin.
    pub fn hit_test(&self, id: NodeId, point: Point) -> Result<bool, TreeError> {
        let margin = self.shape(id)?.style.paint_margin();
        let tolerance = self.options.pick_distance + margin;
        let mut source = self.world_vertices(id)?;
        Ok(stream_hit_test(&mut source, point, tolerance))
    }

    // ---- image loading ----

    /// Drains the queued host work for image loading.
    pub fn take_resource_requests(&mut self) -> Vec<ResourceRequest> {
        std::mem::take(&mut self.resource_requests)
    }

    fn restart_image_loading(&mut self, id: NodeId) -> Result<(), TreeError> {
        if let Some(ShapeKind::Image(image)) = self.node_mut(id)?.shape_mut().map(|s| &mut s.kind) {
            image.status = ImageStatus::Delayed;
            image.natural_size = None;
        }
        if self.is_attached(id) {
            self.start_loading_subtree(id)?;
        }
        Ok(())
    }

    /// Kicks off loading for every delayed image in the freshly attached
    /// subtree.
    fn start_loading_subtree(&mut self, id: NodeId) -> Result<(), TreeError> {
        if !self.is_attached(id) {
            return Ok(());
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            stack.extend(node.children.iter().copied());
            let Some(ShapeKind::Image(image)) = node.shape().map(|s| &s.kind) else {
                continue;
            };
            if image.status != ImageStatus::Delayed {
                continue;
            }
            let src = image.src.clone();
            if src.is_empty() {
                self.set_image_status(current, ImageStatus::Error)?;
                continue;
            }
            if let Some(ShapeKind::Image(image)) =
                self.node_mut(current)?.shape_mut().map(|s| &mut s.kind)
            {
                image.status = ImageStatus::Resolving;
            }
            self.resource_requests.push(ResourceRequest::Resolve {
                node: current,
                src,
            });
        }
        Ok(())
    }

    /// Host callback: the source reference resolved to a fetchable location
    /// (or failed).
    pub fn complete_resolve(
        &mut self,
        id: NodeId,
        location: Result<String, String>,
    ) -> Result<(), TreeError> {
        match location {
            Ok(location) => {
                if let Some(ShapeKind::Image(image)) =
                    self.node_mut(id)?.shape_mut().map(|s| &mut s.kind)
                {
                    image.status = ImageStatus::Loading;
                }
                self.resource_requests
                    .push(ResourceRequest::Decode { node: id, location });
            }
            Err(reason) => {
                warn!("image {id} failed to resolve: {reason}");
                self.set_image_status(id, ImageStatus::Error)?;
            }
        }
        Ok(())
    }

    /// Host callback: the bitmap decoded to the given pixel size (or
    /// failed).
    pub fn complete_decode(
        &mut self,
        id: NodeId,
        bitmap: Result<(u32, u32), String>,
    ) -> Result<(), TreeError> {
        match bitmap {
            Ok(size) => {
                self.begin_update(id)?;
                if let Some(ShapeKind::Image(image)) =
                    self.node_mut(id)?.shape_mut().map(|s| &mut s.kind)
                {
                    image.status = ImageStatus::Loaded;
                    image.natural_size = Some(size);
                }
                self.end_update(id)?;
                self.emit(ChangeEvent::ImageStatusChange {
                    node: id,
                    status: ImageStatus::Loaded,
                });
            }
            Err(reason) => {
                warn!("image {id} failed to decode: {reason}");
                self.set_image_status(id, ImageStatus::Error)?;
            }
        }
        Ok(())
    }

    /// Moves an image into a terminal status with the geometry bracket and
    /// the status notification that entails.
    fn set_image_status(&mut self, id: NodeId, status: ImageStatus) -> Result<(), TreeError> {
        self.begin_update(id)?;
        if let Some(ShapeKind::Image(image)) = self.node_mut(id)?.shape_mut().map(|s| &mut s.kind) {
            image.status = status;
            if status != ImageStatus::Loaded {
                image.natural_size = None;
            }
        }
        self.end_update(id)?;
        self.emit(ChangeEvent::ImageStatusChange { node: id, status });
        Ok(())
    }

    pub fn image_status(&self, id: NodeId) -> Result<ImageStatus, TreeError> {
        match self.shape(id)?.kind {
            ShapeKind::Image(ref image) => Ok(image.status),
            _ => Err(TreeError::NotAContainer("image status on non-image")),
        }
    }

    // ---- store / restore ----

    /// Serializes the node and its subtree into a JSON blob. Flags and image
    /// loading state are editor/session state and are not persisted.
    pub fn store(&mut self, id: NodeId) -> Result<Value, TreeError> {
        let blob = self.store_node(id)?;
        debug!("stored subtree at {id}");
        self.emit(ChangeEvent::Store { node: id });
        Ok(blob)
    }

    fn store_node(&self, id: NodeId) -> Result<Value, TreeError> {
        let node = self.node(id)?;
        let mut properties = Map::new();
        for &name in node.property_names() {
            if let Some(value) = node.get_property(name) {
                let encoded = serde_json::to_value(&value)
                    .map_err(|e| TreeError::RestoreFormat(e.to_string()))?;
                properties.insert(name.to_string(), encoded);
            }
        }
        let mut blob = Map::new();
        blob.insert("tag".into(), json!(node.kind.tag()));
        blob.insert("uuid".into(), json!(node.uuid.to_string()));
        blob.insert("properties".into(), Value::Object(properties));
        if let Some(shape) = node.shape() {
            let style = serde_json::to_value(&shape.style)
                .map_err(|e| TreeError::RestoreFormat(e.to_string()))?;
            blob.insert("style".into(), style);
        }
        let children = node
            .children
            .iter()
            .map(|&child| self.store_node(child))
            .collect::<Result<Vec<_>, _>>()?;
        blob.insert("children".into(), Value::Array(children));
        Ok(Value::Object(blob))
    }

    /// Rebuilds a detached subtree from a blob produced by
    /// [`Scene::store`]. The caller inserts the returned node wherever it
    /// belongs.
    pub fn restore(&mut self, blob: &Value) -> Result<NodeId, TreeError> {
        let id = self.restore_node(blob)?;
        debug!("restored subtree at {id}");
        self.emit(ChangeEvent::Restore { node: id });
        Ok(id)
    }

    fn restore_node(&mut self, blob: &Value) -> Result<NodeId, TreeError> {
        let object = blob
            .as_object()
            .ok_or_else(|| TreeError::RestoreFormat("node blob is not an object".into()))?;
        let tag = object
            .get("tag")
            .and_then(Value::as_str)
            .ok_or_else(|| TreeError::RestoreFormat("missing node tag".into()))?;
        let kind = match tag {
            "scene" => NodeKind::Scene,
            "page" => NodeKind::Page(PageData {
                x: 0.0,
                y: 0.0,
                w: 0.0,
                h: 0.0,
            }),
            "layer" => NodeKind::Layer,
            "anchor-paths" => NodeKind::AnchorPaths,
            "rectangle" => NodeKind::Shape(ShapeData::new(ShapeKind::Rectangle)),
            "ellipse" => NodeKind::Shape(ShapeData::new(ShapeKind::Ellipse(Ellipse::default()))),
            "polygon" => NodeKind::Shape(ShapeData::new(ShapeKind::Polygon(Polygon::default()))),
            "path" => NodeKind::Shape(ShapeData::new(ShapeKind::Path(PathShape::default()))),
            "compound-path" => NodeKind::Shape(ShapeData::new(ShapeKind::CompoundPath(
                CompoundPath::default(),
            ))),
            "image" => NodeKind::Shape(ShapeData::new(ShapeKind::Image(ImageShape::new("")))),
            other => {
                return Err(TreeError::RestoreFormat(format!("unknown node tag `{other}`")));
            }
        };
        let mut data = NodeData::new(kind);
        if let Some(uuid) = object.get("uuid").and_then(Value::as_str) {
            data.uuid = Uuid::parse_str(uuid)
                .map_err(|_| TreeError::RestoreFormat("malformed uuid".into()))?;
        }
        if let Some(properties) = object.get("properties").and_then(Value::as_object) {
            for (name, encoded) in properties {
                let value: PropertyValue = serde_json::from_value(encoded.clone())
                    .map_err(|e| TreeError::RestoreFormat(e.to_string()))?;
                data.validate_property(name, &value)?;
                data.apply_property(name, &value);
            }
        }
        if let Some(style) = object.get("style") {
            if let Some(shape) = data.shape_mut() {
                shape.style = serde_json::from_value(style.clone())
                    .map_err(|e| TreeError::RestoreFormat(e.to_string()))?;
            }
        }
        let id = self.alloc(data);
        if let Some(children) = object.get("children").and_then(Value::as_array) {
            for child_blob in children {
                let child = self.restore_node(child_blob)?;
                // Structural wiring of the detached subtree; the usual
                // validation still applies so a tampered blob cannot build
                // an invalid tree.
                self.validate_insertion(id, child)
                    .map_err(|e| TreeError::RestoreFormat(e.to_string()))?;
                self.node_mut(child)?.parent = Some(id);
                self.node_mut(id)?.children.push(child);
            }
        }
        // A compound path always owns its anchor container, even when the
        // blob predates it.
        if matches!(
            self.node(id)?.shape().map(|s| &s.kind),
            Some(ShapeKind::CompoundPath(_))
        ) && self.anchor_container(id).is_err()
        {
            let anchors = self.create(NodeKind::AnchorPaths);
            self.node_mut(anchors)?.parent = Some(id);
            self.node_mut(id)?.children.push(anchors);
        }
        Ok(id)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull-based outline stream of one shape node.
///
/// Plain shapes stream their local geometry through their own transform;
/// compound paths concatenate their sub-paths' streams (sub-path transforms
/// applied) and then apply their own transform on top.
pub struct ShapeVertices<'a> {
    scene: &'a Scene,
    id: NodeId,
    world: bool,
    step: usize,
    child: usize,
}

impl ShapeVertices<'_> {
    fn own_transform(&self) -> Affine {
        if !self.world {
            return Affine::IDENTITY;
        }
        self.scene
            .transform_of(self.id)
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}

impl VertexSource for ShapeVertices<'_> {
    fn rewind(&mut self, index: usize) -> bool {
        let Ok(shape) = self.scene.shape(self.id) else {
            return false;
        };
        if !shape.kind.supports_rewind(index) {
            return false;
        }
        self.step = index;
        self.child = 0;
        true
    }

    fn read_next(&mut self, vertex: &mut Vertex) -> bool {
        let Ok(shape) = self.scene.shape(self.id) else {
            return false;
        };
        if let ShapeKind::CompoundPath(_) = shape.kind {
            let Ok(anchors) = self.scene.anchor_container(self.id) else {
                return false;
            };
            let Ok(subpaths) = self.scene.children(anchors) else {
                return false;
            };
            let own = self.own_transform();
            while let Some(&subpath) = subpaths.get(self.child) {
                let Ok(child_shape) = self.scene.shape(subpath) else {
                    self.child += 1;
                    self.step = 0;
                    continue;
                };
                if let Some(v) = child_shape.kind.local_vertex(self.step) {
                    self.step += 1;
                    *vertex = v;
                    if vertex.command != VertexCommand::Close {
                        let child_transform = self
                            .scene
                            .transform_of(subpath)
                            .ok()
                            .flatten()
                            .unwrap_or_default();
                        let p = own * child_transform * vertex.point();
                        vertex.x = p.x;
                        vertex.y = p.y;
                    }
                    return true;
                }
                self.child += 1;
                self.step = 0;
            }
            return false;
        }
        match shape.kind.local_vertex(self.step) {
            Some(v) => {
                self.step += 1;
                *vertex = v;
                if self.world && vertex.command != VertexCommand::Close {
                    let p = self.own_transform() * vertex.point();
                    vertex.x = p.x;
                    vertex.y = p.y;
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record_events(scene: &mut Scene) -> Rc<RefCell<Vec<ChangeEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        scene.add_observer(move |event| sink.borrow_mut().push(event.clone()));
        log
    }

    fn scene_with_layer() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let page = scene.create_page(0.0, 0.0, 800.0, 600.0);
        let layer = scene.create_layer();
        scene.insert_child(scene.root(), page).unwrap();
        scene.insert_child(page, layer).unwrap();
        (scene, layer)
    }

    fn compound_with_two_subpaths(scene: &mut Scene, layer: NodeId) -> (NodeId, NodeId, NodeId) {
        let compound = scene.create_compound_path();
        scene.insert_child(layer, compound).unwrap();
        let anchors = scene.anchor_container(compound).unwrap();
        let a = scene.create_path(PathShape::new(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
            true,
        ));
        let b = scene.create_path(PathShape::new(
            vec![Point::new(20.0, 20.0), Point::new(30.0, 25.0)],
            false,
        ));
        scene.insert_child(anchors, a).unwrap();
        scene.insert_child(anchors, b).unwrap();
        (compound, a, b)
    }

    #[test]
    fn rejected_insertion_leaves_tree_unchanged() {
        let (mut scene, layer) = scene_with_layer();
        let page = scene.create_page(0.0, 0.0, 100.0, 100.0);
        let events = record_events(&mut scene);

        let err = scene.insert_child(layer, page).unwrap_err();
        assert!(matches!(err, TreeError::InvalidParent { .. }));
        assert!(scene.children(layer).unwrap().is_empty());
        assert_eq!(scene.parent(page).unwrap(), None);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn nested_container_rules() {
        let mut scene = Scene::new();
        let rect = scene.create_rectangle();
        let layer = scene.create_layer();
        assert!(matches!(
            scene.insert_child(rect, layer).unwrap_err(),
            TreeError::NotAContainer(_)
        ));

        let page = scene.create_page(0.0, 0.0, 10.0, 10.0);
        scene.insert_child(scene.root(), page).unwrap();
        scene.insert_child(page, layer).unwrap();
        assert!(matches!(
            scene.insert_child(page, layer).unwrap_err(),
            TreeError::AlreadyAttached
        ));

        let sublayer = scene.create_layer();
        scene.insert_child(layer, sublayer).unwrap();
        assert!(matches!(
            scene.insert_child(sublayer, layer).unwrap_err(),
            TreeError::AlreadyAttached
        ));
    }

    #[test]
    fn anchor_container_is_protected() {
        let (mut scene, layer) = scene_with_layer();
        let compound = scene.create_compound_path();
        scene.insert_child(layer, compound).unwrap();
        let anchors = scene.anchor_container(compound).unwrap();
        assert!(matches!(
            scene.remove_child(compound, anchors).unwrap_err(),
            TreeError::RemovalForbidden(_)
        ));

        // Only path shapes may live inside it.
        let rect = scene.create_rectangle();
        assert!(matches!(
            scene.insert_child(anchors, rect).unwrap_err(),
            TreeError::InvalidParent { .. }
        ));
    }

    #[test]
    fn compound_bbox_is_union_of_subpaths() {
        let (mut scene, layer) = scene_with_layer();
        let (compound, a, b) = compound_with_two_subpaths(&mut scene, layer);
        let union = union_bounds(
            scene.geometry_bbox(a).unwrap(),
            scene.geometry_bbox(b).unwrap(),
        );
        assert_eq!(scene.geometry_bbox(compound).unwrap(), union);
        assert_eq!(
            scene.geometry_bbox(compound).unwrap(),
            Some(Rect::new(0.0, 0.0, 30.0, 25.0))
        );
    }

    #[test]
    fn compound_stream_restarts_identically() {
        let (mut scene, layer) = scene_with_layer();
        let (compound, _, _) = compound_with_two_subpaths(&mut scene, layer);
        let mut source = scene.world_vertices(compound).unwrap();
        let drain = |source: &mut ShapeVertices<'_>| {
            assert!(source.rewind(0));
            let mut vertex = Vertex::default();
            let mut out = Vec::new();
            while source.read_next(&mut vertex) {
                out.push(vertex);
            }
            out
        };
        let first = drain(&mut source);
        let second = drain(&mut source);
        assert_eq!(first, second);
        // Two sub-paths: 3 points + close, then 2 points.
        assert_eq!(first.len(), 6);
        assert_eq!(
            first.iter().filter(|v| v.command == VertexCommand::Move).count(),
            2
        );
    }

    #[test]
    fn subpath_removal_is_one_geometry_bracket() {
        let (mut scene, layer) = scene_with_layer();
        let (compound, a, _) = compound_with_two_subpaths(&mut scene, layer);
        let anchors = scene.anchor_container(compound).unwrap();
        let events = record_events(&mut scene);

        scene.remove_child(anchors, a).unwrap();

        let log = events.borrow();
        let phase_count = |phase: GeometryPhase| {
            log.iter()
                .filter(|e| {
                    matches!(e, ChangeEvent::GeometryChange { node, phase: p }
                        if *node == compound && *p == phase)
                })
                .count()
        };
        assert_eq!(phase_count(GeometryPhase::Before), 1);
        assert_eq!(phase_count(GeometryPhase::After), 1);
        assert!(log.iter().any(|e| matches!(
            e,
            ChangeEvent::AfterChildRemove { child, .. } if *child == a
        )));
    }

    #[test]
    fn image_error_path_keeps_placeholder_extent() {
        let (mut scene, layer) = scene_with_layer();
        let image = scene.create_image("ref://missing");
        scene.insert_child(layer, image).unwrap();
        assert_eq!(scene.image_status(image).unwrap(), ImageStatus::Resolving);

        let requests = scene.take_resource_requests();
        assert_eq!(
            requests,
            vec![ResourceRequest::Resolve {
                node: image,
                src: "ref://missing".into()
            }]
        );

        let events = record_events(&mut scene);
        scene
            .complete_resolve(image, Err("no such resource".into()))
            .unwrap();
        assert_eq!(scene.image_status(image).unwrap(), ImageStatus::Error);
        let status_events: Vec<_> = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, ChangeEvent::ImageStatusChange { .. }))
            .cloned()
            .collect();
        assert_eq!(
            status_events,
            vec![ChangeEvent::ImageStatusChange {
                node: image,
                status: ImageStatus::Error
            }]
        );
        assert_eq!(
            scene.geometry_bbox(image).unwrap(),
            Some(Rect::new(0.0, 0.0, 100.0, 100.0))
        );
    }

    #[test]
    fn image_load_updates_extent() {
        let (mut scene, layer) = scene_with_layer();
        let image = scene.create_image("ref://photo");
        scene.insert_child(layer, image).unwrap();
        scene.take_resource_requests();

        scene
            .complete_resolve(image, Ok("https://host/photo.png".into()))
            .unwrap();
        assert_eq!(scene.image_status(image).unwrap(), ImageStatus::Loading);
        let requests = scene.take_resource_requests();
        assert!(matches!(requests.as_slice(), [ResourceRequest::Decode { .. }]));

        scene.complete_decode(image, Ok((200, 50))).unwrap();
        assert_eq!(scene.image_status(image).unwrap(), ImageStatus::Loaded);
        assert_eq!(
            scene.geometry_bbox(image).unwrap(),
            Some(Rect::new(0.0, 0.0, 200.0, 50.0))
        );
    }

    #[test]
    fn image_decode_failure_walks_the_full_chain() {
        let (mut scene, layer) = scene_with_layer();
        let image = scene.create_image("ref://logo");
        assert_eq!(scene.image_status(image).unwrap(), ImageStatus::Delayed);

        scene.insert_child(layer, image).unwrap();
        assert_eq!(scene.image_status(image).unwrap(), ImageStatus::Resolving);
        assert_eq!(
            scene.geometry_bbox(image).unwrap(),
            Some(Rect::new(0.0, 0.0, 100.0, 100.0))
        );

        let requests = scene.take_resource_requests();
        assert_eq!(
            requests,
            vec![ResourceRequest::Resolve {
                node: image,
                src: "ref://logo".into()
            }]
        );
        scene
            .complete_resolve(image, Ok("https://host/logo.png".into()))
            .unwrap();
        assert_eq!(scene.image_status(image).unwrap(), ImageStatus::Loading);
        assert_eq!(
            scene.geometry_bbox(image).unwrap(),
            Some(Rect::new(0.0, 0.0, 100.0, 100.0))
        );
        let requests = scene.take_resource_requests();
        assert_eq!(
            requests,
            vec![ResourceRequest::Decode {
                node: image,
                location: "https://host/logo.png".into()
            }]
        );

        let events = record_events(&mut scene);
        scene
            .complete_decode(image, Err("corrupt stream".into()))
            .unwrap();
        assert_eq!(scene.image_status(image).unwrap(), ImageStatus::Error);
        assert_eq!(
            scene.geometry_bbox(image).unwrap(),
            Some(Rect::new(0.0, 0.0, 100.0, 100.0))
        );
        let status_events: Vec<_> = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, ChangeEvent::ImageStatusChange { .. }))
            .cloned()
            .collect();
        assert_eq!(
            status_events,
            vec![ChangeEvent::ImageStatusChange {
                node: image,
                status: ImageStatus::Error
            }]
        );
    }

    #[test]
    fn src_change_restarts_loading() {
        let (mut scene, layer) = scene_with_layer();
        let image = scene.create_image("ref://a");
        scene.insert_child(layer, image).unwrap();
        scene.take_resource_requests();
        scene.complete_resolve(image, Ok("a".into())).unwrap();
        scene.complete_decode(image, Ok((64, 64))).unwrap();
        scene.take_resource_requests();

        scene
            .set_properties(image, &["src"], &[PropertyValue::Str("ref://b".into())])
            .unwrap();
        assert_eq!(scene.image_status(image).unwrap(), ImageStatus::Resolving);
        assert!(matches!(
            scene.take_resource_requests().as_slice(),
            [ResourceRequest::Resolve { src, .. }] if src == "ref://b"
        ));
    }

    #[test]
    fn bracketed_property_sets_merge_into_one_notification() {
        let (mut scene, layer) = scene_with_layer();
        let ellipse = scene.create_ellipse(Ellipse::default());
        scene.insert_child(layer, ellipse).unwrap();
        let events = record_events(&mut scene);

        scene.begin_update(ellipse).unwrap();
        scene
            .set_properties(ellipse, &["sa"], &[PropertyValue::Float(0.5)])
            .unwrap();
        scene
            .set_properties(ellipse, &["ea"], &[PropertyValue::Float(2.5)])
            .unwrap();
        scene
            .set_properties(ellipse, &["etp"], &[PropertyValue::Str("pie".into())])
            .unwrap();
        scene.end_update(ellipse).unwrap();

        let log = events.borrow();
        let property_events: Vec<_> = log
            .iter()
            .filter_map(|e| match e {
                ChangeEvent::AfterPropertiesChange { properties, .. } => Some(properties.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(property_events, vec![vec!["sa", "ea", "etp"]]);
        let invalidations = log
            .iter()
            .filter(|e| matches!(e, ChangeEvent::InvalidationRequest { .. }))
            .count();
        assert_eq!(invalidations, 1);
    }

    #[test]
    fn nested_update_keeps_premutation_bounds_in_the_repaint() {
        let (mut scene, layer) = scene_with_layer();
        let rect = scene.create_rectangle();
        scene.insert_child(layer, rect).unwrap();
        scene
            .set_properties(
                rect,
                &["trf"],
                &[PropertyValue::from_affine(Affine::scale(10.0))],
            )
            .unwrap();
        let events = record_events(&mut scene);

        scene.begin_update(rect).unwrap();
        scene
            .set_properties(
                rect,
                &["trf"],
                &[PropertyValue::from_affine(Affine::scale(40.0))],
            )
            .unwrap();
        // A bracket opened mid-mutation must not resample the bounds.
        scene.begin_update(rect).unwrap();
        scene.end_update(rect).unwrap();
        scene.end_update(rect).unwrap();

        let areas: Vec<_> = events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ChangeEvent::InvalidationRequest { area } => Some(*area),
                _ => None,
            })
            .collect();
        assert_eq!(areas.len(), 1);
        // The repaint covers the 10-unit extent from before the bracket as
        // well as the 40-unit result.
        assert!(areas[0].x0 <= 0.0 && areas[0].y0 <= 0.0);
        assert!(areas[0].x1 >= 40.0 && areas[0].y1 >= 40.0);
    }

    #[test]
    fn property_batch_is_atomic_on_validation_error() {
        let (mut scene, layer) = scene_with_layer();
        let ellipse = scene.create_ellipse(Ellipse::default());
        scene.insert_child(layer, ellipse).unwrap();
        let events = record_events(&mut scene);

        let err = scene
            .set_properties(
                ellipse,
                &["sa", "bogus"],
                &[PropertyValue::Float(1.0), PropertyValue::Float(2.0)],
            )
            .unwrap_err();
        assert!(matches!(err, TreeError::UnknownProperty(_)));
        assert_eq!(
            scene.get_property(ellipse, "sa").unwrap(),
            Some(PropertyValue::Float(0.0))
        );
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn unchanged_property_set_is_silent() {
        let (mut scene, layer) = scene_with_layer();
        let ellipse = scene.create_ellipse(Ellipse::default());
        scene.insert_child(layer, ellipse).unwrap();
        let events = record_events(&mut scene);

        let changed = scene
            .set_properties(ellipse, &["sa"], &[PropertyValue::Float(0.0)])
            .unwrap();
        assert!(!changed);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn flags_forward_to_subpaths() {
        let (mut scene, layer) = scene_with_layer();
        let (compound, a, b) = compound_with_two_subpaths(&mut scene, layer);
        scene.set_flag(compound, Flag::Selected, true).unwrap();
        assert!(scene.has_flag(a, Flag::Selected).unwrap());
        assert!(scene.has_flag(b, Flag::Selected).unwrap());
        scene.set_flag(compound, Flag::Selected, false).unwrap();
        assert!(!scene.has_flag(a, Flag::Selected).unwrap());
    }

    #[test]
    fn transform_forwards_to_subpaths() {
        let (mut scene, layer) = scene_with_layer();
        let (compound, a, _) = compound_with_two_subpaths(&mut scene, layer);
        let before = scene.geometry_bbox(compound).unwrap().unwrap();

        scene.transform(compound, Affine::translate((5.0, 7.0))).unwrap();

        assert_eq!(scene.transform_of(compound).unwrap(), None);
        assert_eq!(
            scene.transform_of(a).unwrap(),
            Some(Affine::translate((5.0, 7.0)))
        );
        let after = scene.geometry_bbox(compound).unwrap().unwrap();
        assert_eq!(after, before + kurbo::Vec2::new(5.0, 7.0));
    }

    #[test]
    fn store_restore_round_trip() {
        let (mut scene, layer) = scene_with_layer();
        let rect = scene.create_rectangle();
        scene.insert_child(layer, rect).unwrap();
        scene
            .set_properties(
                rect,
                &["name", "trf"],
                &[
                    PropertyValue::Str("hero".into()),
                    PropertyValue::from_affine(Affine::scale(40.0)),
                ],
            )
            .unwrap();
        let uuid = scene.uuid(rect).unwrap();

        let blob = scene.store(rect).unwrap();
        let restored = scene.restore(&blob).unwrap();

        assert_ne!(restored, rect);
        assert_eq!(scene.uuid(restored).unwrap(), uuid);
        assert_eq!(
            scene.get_property(restored, "name").unwrap(),
            Some(PropertyValue::Str("hero".into()))
        );
        assert_eq!(
            scene.transform_of(restored).unwrap(),
            Some(Affine::scale(40.0))
        );
        assert_eq!(scene.parent(restored).unwrap(), None);
    }

    #[test]
    fn restored_compound_keeps_subpaths() {
        let (mut scene, layer) = scene_with_layer();
        let (compound, _, _) = compound_with_two_subpaths(&mut scene, layer);
        let bbox = scene.geometry_bbox(compound).unwrap();

        let blob = scene.store(compound).unwrap();
        let restored = scene.restore(&blob).unwrap();
        let anchors = scene.anchor_container(restored).unwrap();
        assert_eq!(scene.children(anchors).unwrap().len(), 2);
        assert_eq!(scene.geometry_bbox(restored).unwrap(), bbox);
    }

    #[test]
    fn destroy_invalidates_handles() {
        let (mut scene, layer) = scene_with_layer();
        let (compound, a, _) = compound_with_two_subpaths(&mut scene, layer);
        scene.destroy(compound).unwrap();
        assert!(!scene.is_live(compound));
        assert!(!scene.is_live(a));
        assert!(matches!(scene.geometry_bbox(a).unwrap_err(), TreeError::StaleNode));
        assert!(scene.children(layer).unwrap().is_empty());
    }

    #[test]
    fn hit_test_honors_stroke_margin() {
        let (mut scene, layer) = scene_with_layer();
        let rect = scene.create_rectangle();
        scene.insert_child(layer, rect).unwrap();
        scene
            .set_properties(
                rect,
                &["trf"],
                &[PropertyValue::from_affine(Affine::scale(100.0))],
            )
            .unwrap();
        // Default pick distance 3 plus stroke margin 1.
        assert!(scene.hit_test(rect, Point::new(103.5, 50.0)).unwrap());
        assert!(!scene.hit_test(rect, Point::new(110.0, 50.0)).unwrap());
        assert!(scene.hit_test(rect, Point::new(0.0, 50.0)).unwrap());
    }

    #[test]
    fn active_page_moves_the_flag() {
        let mut scene = Scene::new();
        let p1 = scene.create_page(0.0, 0.0, 10.0, 10.0);
        let p2 = scene.create_page(20.0, 0.0, 10.0, 10.0);
        scene.insert_child(scene.root(), p1).unwrap();
        scene.insert_child(scene.root(), p2).unwrap();

        scene.set_active_page(Some(p1)).unwrap();
        assert!(scene.has_flag(p1, Flag::Active).unwrap());
        scene.set_active_page(Some(p2)).unwrap();
        assert!(!scene.has_flag(p1, Flag::Active).unwrap());
        assert!(scene.has_flag(p2, Flag::Active).unwrap());
        assert_eq!(scene.active_page(), Some(p2));
    }
}
