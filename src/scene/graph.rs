//! The scene: arenas, hierarchy, and transform resolution
//!
//! All nodes and meshes live in slotmap arenas owned by the [`Scene`].
//! Hierarchy links between nodes are arena keys, so parent references
//! and transform-listener references are non-owning by construction;
//! only the child lists express ownership, and destroying a node tears
//! down its whole subtree.
//!
//! Global transforms resolve lazily. A local mutation marks its node
//! dirty; reading any global property walks up to the highest dirty
//! ancestor and rebuilds that subtree top-down, so every descendant
//! composes against an already-clean parent. Listener notification
//! happens during that rebuild and nowhere else.

use slotmap::{new_key_type, SlotMap};

use crate::foundation::math::{Mat3, Quat, TransformMatrix, Vec3};
use crate::mesh::Mesh;
use crate::settings::SceneSettings;
use crate::texture::TextureCache;

use super::bounding::BoundingVolume;
use super::node::Node;
use super::rotator::{TargettingConstraint, TrackingState};

new_key_type! {
    /// Arena key for a node in a [`Scene`].
    pub struct NodeId;
    /// Arena key for a mesh in a [`Scene`].
    pub struct MeshId;
}

/// Errors from scene-graph operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The node key does not resolve in this scene's arena.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    /// The mesh key does not resolve in this scene's arena.
    #[error("unknown mesh {0:?}")]
    UnknownMesh(MeshId),
    /// Attaching the child would make it its own ancestor.
    #[error("adding {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle {
        /// The prospective parent
        parent: NodeId,
        /// The node being attached
        child: NodeId,
    },
    /// The scene root cannot be re-parented, removed, or destroyed.
    #[error("the scene root cannot be removed or re-parented")]
    RootImmovable,
    /// A camera operation ran without an active camera.
    #[error("no active camera is set")]
    NoActiveCamera,
    /// The node exists but does not carry camera content.
    #[error("node {0:?} is not a camera")]
    NotACamera(NodeId),
}

/// A scene graph: the node and mesh arenas, the root, the texture
/// cache, and the shared settings.
#[derive(Debug)]
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    meshes: SlotMap<MeshId, Mesh>,
    root: NodeId,
    settings: SceneSettings,
    textures: TextureCache,
    active_camera: Option<NodeId>,
    deferred_removals: Vec<NodeId>,
    viewport: (u32, u32),
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(SceneSettings::default())
    }
}

impl Scene {
    /// Create a scene containing only the root node.
    pub fn new(settings: SceneSettings) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::named("root"));
        Self {
            nodes,
            meshes: SlotMap::with_key(),
            root,
            settings,
            textures: TextureCache::new(),
            active_camera: None,
            deferred_removals: Vec::new(),
            viewport: (0, 0),
        }
    }

    /// The root node's key.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The scene settings.
    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    /// Mutable scene settings.
    pub fn settings_mut(&mut self) -> &mut SceneSettings {
        &mut self.settings
    }

    /// The scene's texture cache.
    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Mutable access to the texture cache.
    pub fn textures_mut(&mut self) -> &mut TextureCache {
        &mut self.textures
    }

    /// The viewport in pixels, used for picking and aspect ratio.
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Set the viewport in pixels.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    // --- arenas ---

    /// Insert a detached node, returning its key. The scene-wide
    /// action-removal default applies to the new node.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        node.should_stop_actions_when_removed = self.settings.stop_actions_when_removed;
        self.nodes.insert(node)
    }

    /// Insert a node and attach it under `parent` in one step.
    pub fn spawn_child(&mut self, parent: NodeId, node: Node) -> Result<NodeId, NodeError> {
        let id = self.add_node(node);
        self.add_child(parent, id)?;
        Ok(id)
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> Result<&Node, NodeError> {
        self.nodes.get(id).ok_or(NodeError::UnknownNode(id))
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, NodeError> {
        self.nodes.get_mut(id).ok_or(NodeError::UnknownNode(id))
    }

    /// Whether `id` still resolves in this scene.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes, including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Insert a mesh, returning its key.
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshId {
        self.meshes.insert(mesh)
    }

    /// Borrow a mesh.
    pub fn mesh(&self, id: MeshId) -> Result<&Mesh, NodeError> {
        self.meshes.get(id).ok_or(NodeError::UnknownMesh(id))
    }

    /// Mutably borrow a mesh.
    pub fn mesh_mut(&mut self, id: MeshId) -> Result<&mut Mesh, NodeError> {
        self.meshes.get_mut(id).ok_or(NodeError::UnknownMesh(id))
    }

    /// Find the first node with the given name, in arena order.
    pub fn find_node_named(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.identity.name.as_deref() == Some(name))
            .map(|(id, _)| id)
    }

    // --- hierarchy ---

    /// Attach `child` under `parent`, detaching it from any prior
    /// parent first. A no-op when the child is already under `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), NodeError> {
        if !self.nodes.contains_key(parent) {
            return Err(NodeError::UnknownNode(parent));
        }
        if child == self.root {
            return Err(NodeError::RootImmovable);
        }
        if self.node(child)?.parent == Some(parent) {
            return Ok(());
        }
        // Walking up from the prospective parent must never reach the child.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(NodeError::WouldCreateCycle { parent, child });
            }
            cursor = self.nodes[id].parent;
        }
        self.detach(child);
        self.nodes[parent].children.push(child);
        let node = &mut self.nodes[child];
        node.parent = Some(parent);
        node.mark_transform_dirty();
        Ok(())
    }

    /// Attach `child` under `parent`, first rewriting the child's local
    /// location, rotation, and scale so its global pose is preserved.
    pub fn add_and_localize_child(
        &mut self,
        parent: NodeId,
        child: NodeId,
    ) -> Result<(), NodeError> {
        let child_global = self.global_transform(child)?;
        let parent_global = self.global_transform(parent)?;
        let local = parent_global.inverted().concat(&child_global);

        let m = local.matrix();
        let columns = [
            Vec3::new(m.m11, m.m21, m.m31),
            Vec3::new(m.m12, m.m22, m.m32),
            Vec3::new(m.m13, m.m23, m.m33),
        ];
        let scale = Vec3::new(columns[0].norm(), columns[1].norm(), columns[2].norm());
        let safe = |s: f32| if s.abs() < f32::EPSILON { 1.0 } else { s };
        let rotation = Mat3::from_columns(&[
            columns[0] / safe(scale.x),
            columns[1] / safe(scale.y),
            columns[2] / safe(scale.z),
        ]);
        let quat: Quat = nalgebra::UnitQuaternion::from_rotation_matrix(
            &nalgebra::Rotation3::from_matrix_unchecked(rotation),
        );

        let node = self.node_mut(child)?;
        node.set_location(local.translation());
        node.set_scale(scale);
        node.rotator_mut().set_quaternion(quat);
        self.add_child(parent, child)
    }

    /// Detach `id` from its parent. Actions stop when the node's
    /// removal flag says so; an emptied parent with
    /// `should_autoremove_when_empty` removes itself in turn.
    pub fn remove_from_parent(&mut self, id: NodeId) -> Result<(), NodeError> {
        if id == self.root {
            return Err(NodeError::RootImmovable);
        }
        let parent = self.node(id)?.parent;
        self.detach(id);
        let node = &mut self.nodes[id];
        if node.should_stop_actions_when_removed {
            node.stop_all_actions();
        }
        if let Some(parent) = parent {
            let emptied = self
                .nodes
                .get(parent)
                .is_some_and(|p| p.should_autoremove_when_empty && p.children.is_empty());
            if emptied && parent != self.root {
                self.remove_from_parent(parent)?;
            }
        }
        Ok(())
    }

    /// Destroy `id` and its whole subtree. Every listener of a dying
    /// node is told its target is gone before the node leaves the
    /// arena.
    pub fn destroy(&mut self, id: NodeId) -> Result<(), NodeError> {
        if id == self.root {
            return Err(NodeError::RootImmovable);
        }
        if !self.nodes.contains_key(id) {
            return Err(NodeError::UnknownNode(id));
        }
        self.detach(id);

        let mut doomed = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            stack.extend(self.nodes[n].children.iter().copied());
            doomed.push(n);
        }
        for &n in &doomed {
            let listeners = std::mem::take(&mut self.nodes[n].listeners);
            for listener in listeners {
                if let Some(node) = self.nodes.get_mut(listener) {
                    node.observed.retain(|&o| o != n);
                    let rotator = node.rotator_mut();
                    if rotator.target() == Some(n) {
                        let d = rotator.directional_mut();
                        d.target = None;
                        d.state = TrackingState::Untargeted;
                    }
                    node.global_light_location = None;
                }
            }
            let observed = std::mem::take(&mut self.nodes[n].observed);
            for o in observed {
                if let Some(node) = self.nodes.get_mut(o) {
                    node.listeners.retain(|&l| l != n);
                }
            }
        }
        for n in doomed {
            if self.active_camera == Some(n) {
                self.active_camera = None;
            }
            self.deferred_removals.retain(|&d| d != n);
            self.nodes.remove(n);
        }
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }
    }

    /// Queue `id` for destruction at the end of the enclosing
    /// visitation. Removal during child-list iteration goes through
    /// this queue, never directly.
    pub fn defer_removal(&mut self, id: NodeId) {
        if !self.deferred_removals.contains(&id) {
            self.deferred_removals.push(id);
        }
    }

    /// Destroy every queued node. Called by the update visitation after
    /// traversal; safe to call directly between frames.
    pub fn process_deferred_removals(&mut self) {
        let queue = std::mem::take(&mut self.deferred_removals);
        for id in queue {
            if self.nodes.contains_key(id) && id != self.root {
                // Destruction failures here would mean arena corruption.
                let _ = self.destroy(id);
            }
        }
    }

    // --- transform resolution ---

    /// The node's global transform, resolving any dirty ancestors
    /// first.
    pub fn global_transform(&mut self, id: NodeId) -> Result<TransformMatrix, NodeError> {
        let mut path = vec![id];
        let mut cursor = id;
        while let Some(parent) = self.node(cursor)?.parent {
            path.push(parent);
            cursor = parent;
        }
        // Highest dirty ancestor; its subtree rebuilds top-down.
        let start = path
            .iter()
            .rev()
            .copied()
            .find(|&n| self.nodes[n].is_transform_dirty());
        if let Some(start) = start {
            self.resolve_subtree(start, true);
        }
        Ok(self.nodes[id].global_transform)
    }

    /// The node's location in the global frame.
    pub fn global_location(&mut self, id: NodeId) -> Result<Vec3, NodeError> {
        Ok(self.global_transform(id)?.translation())
    }

    /// The node's forward direction in the global frame.
    pub fn global_forward_direction(&mut self, id: NodeId) -> Result<Vec3, NodeError> {
        let global = self.global_transform(id)?;
        let forward = self.nodes[id].forward_direction();
        Ok(global.transform_direction(forward).normalize())
    }

    /// The node's bounding volume in the global frame, padded by the
    /// node's padding. Cached until the transform or volume changes.
    pub fn global_bounding_volume(&mut self, id: NodeId) -> Result<BoundingVolume, NodeError> {
        let global = self.global_transform(id)?;
        let node = &mut self.nodes[id];
        if let Some(cached) = &node.global_bounding {
            return Ok(cached.clone());
        }
        let volume = node
            .bounding_volume()
            .transformed_by(&global, node.bounding_volume_padding);
        node.global_bounding = Some(volume.clone());
        Ok(volume)
    }

    /// Rebuild every dirty global matrix in the scene, notifying
    /// listeners along the way. The per-frame resolve phase.
    pub fn update_transform_matrices(&mut self) {
        let root = self.root;
        self.resolve_subtree(root, false);
    }

    /// Rebuild `start`'s subtree. `force` rebuilds unconditionally;
    /// otherwise a node rebuilds when dirty or when an ancestor in this
    /// pass was rebuilt. The dirty bit coalesces repeated mutations
    /// into one rebuild.
    fn resolve_subtree(&mut self, start: NodeId, force: bool) {
        let parent_global = match self.nodes[start].parent {
            Some(p) => self.nodes[p].global_transform,
            None => TransformMatrix::identity(),
        };
        let mut notifications: Vec<(NodeId, NodeId)> = Vec::new();
        let mut stack = vec![(start, parent_global, force)];
        while let Some((id, parent_global, force)) = stack.pop() {
            let node = &mut self.nodes[id];
            let rebuilt = force || node.is_transform_dirty();
            let global = if rebuilt {
                let global = parent_global.concat(&node.local_transform());
                node.set_global_transform(global);
                for &listener in &node.listeners {
                    notifications.push((listener, id));
                }
                if node.rotator().is_tracking() && !node.is_tracking_for_bump_mapping {
                    // Self-movement re-faces the target too.
                    notifications.push((id, id));
                }
                global
            } else {
                node.global_transform
            };
            for &child in self.nodes[id].children.clone().iter() {
                stack.push((child, global, rebuilt));
            }
        }
        // Notification runs after the rebuild so listener reorientation
        // never mutates mid-traversal.
        for (listener, target) in notifications {
            self.notify_transformed(listener, target);
        }
    }

    fn notify_transformed(&mut self, listener: NodeId, target: NodeId) {
        let Some(node) = self.nodes.get(listener) else {
            return;
        };
        let tracks_target = listener == target || node.rotator().target() == Some(target);
        if !tracks_target {
            return;
        }
        if node.is_tracking_for_bump_mapping {
            let is_light = self.nodes.get(target).is_some_and(|t| t.light().is_some());
            if is_light {
                if let Ok(location) = self.global_location(target) {
                    self.nodes[listener].global_light_location = Some(location);
                }
            }
        } else if node.rotator().is_tracking() {
            self.reorient_to_target(listener);
        }
    }

    // --- targeting ---

    /// Target `node` at another node, registering it as a transform
    /// listener of the target and reorienting immediately. The
    /// tracking state becomes targeted-once unless already tracking.
    pub fn set_target(&mut self, node: NodeId, target: NodeId) -> Result<(), NodeError> {
        if !self.nodes.contains_key(target) {
            return Err(NodeError::UnknownNode(target));
        }
        self.clear_target_registration(node)?;
        let directional = self.nodes[node].rotator_mut().directional_mut();
        directional.target = Some(target);
        directional.target_location = None;
        if directional.state == TrackingState::Untargeted {
            directional.state = TrackingState::TargetedOnce;
        }
        self.nodes[target].listeners.push(node);
        self.nodes[node].observed.push(target);
        self.reorient_to_target(node);
        Ok(())
    }

    /// Target `node` at a fixed global location, dropping any node
    /// target, and reorient immediately.
    pub fn set_target_location(&mut self, node: NodeId, location: Vec3) -> Result<(), NodeError> {
        self.clear_target_registration(node)?;
        let directional = self.nodes[node].rotator_mut().directional_mut();
        directional.target = None;
        directional.target_location = Some(location);
        if directional.state == TrackingState::Untargeted {
            directional.state = TrackingState::TargetedOnce;
        }
        self.reorient_to_target(node);
        Ok(())
    }

    fn clear_target_registration(&mut self, node: NodeId) -> Result<(), NodeError> {
        let previous = self.node(node)?.rotator().target();
        if let Some(previous) = previous {
            if let Some(t) = self.nodes.get_mut(previous) {
                t.listeners.retain(|&l| l != node);
            }
            self.nodes[node].observed.retain(|&o| o != previous);
        }
        Ok(())
    }

    /// Switch continuous tracking on or off. Turning it on with no
    /// target set is ignored with a warning.
    pub fn set_should_track_target(&mut self, node: NodeId, track: bool) -> Result<(), NodeError> {
        let rotator = self.node_mut(node)?.rotator_mut();
        let directional = rotator.directional_mut();
        if track {
            if directional.target.is_none() && directional.target_location.is_none() {
                log::warn!("cannot track: node has no target");
                return Ok(());
            }
            directional.state = TrackingState::Tracking;
        } else if directional.state == TrackingState::Tracking {
            directional.state = TrackingState::TargetedOnce;
        }
        Ok(())
    }

    /// Restrict how the node may rotate to face its target.
    pub fn set_targetting_constraint(
        &mut self,
        node: NodeId,
        constraint: TargettingConstraint,
    ) -> Result<(), NodeError> {
        self.node_mut(node)?.rotator_mut().directional_mut().constraint = constraint;
        Ok(())
    }

    /// Reorient `node` to face its target now, honoring the targeting
    /// constraint. A no-op for untargeted nodes.
    pub fn face_target(&mut self, node: NodeId) -> Result<(), NodeError> {
        if !self.nodes.contains_key(node) {
            return Err(NodeError::UnknownNode(node));
        }
        self.reorient_to_target(node);
        Ok(())
    }

    fn reorient_to_target(&mut self, id: NodeId) {
        let Some((target, target_location, constraint)) = self
            .nodes
            .get(id)
            .and_then(|n| n.rotator().directional())
            .map(|d| (d.target, d.target_location, d.constraint))
        else {
            return;
        };
        let target_global = match target {
            Some(t) => match self.global_location(t) {
                Ok(location) => location,
                Err(_) => return,
            },
            None => match target_location {
                Some(location) => location,
                None => return,
            },
        };
        let Ok(own_global) = self.global_location(id) else {
            return;
        };
        let direction = target_global - own_global;
        if direction.norm_squared() < f32::EPSILON {
            return;
        }
        let parent_inverse = match self.nodes[id].parent {
            Some(p) => match self.global_transform(p) {
                Ok(global) => global.inverted(),
                Err(_) => return,
            },
            None => TransformMatrix::identity(),
        };
        // Local constraints apply in the parent frame the forward
        // direction lives in; global constraints apply before the
        // change of frame.
        let direction = if constraint.is_local() {
            constraint.restrict(parent_inverse.transform_direction(direction))
        } else {
            parent_inverse.transform_direction(constraint.restrict(direction))
        };
        if direction.norm_squared() < f32::EPSILON {
            return;
        }
        self.nodes[id].rotator_mut().set_forward_direction(direction);
    }

    // --- touch selection ---

    /// Whether `id` responds to touch selection: an invisible node is
    /// untouchable unless it allows touch while invisible; an enabled
    /// node is touchable; otherwise touchability is inherited when the
    /// node opts in.
    pub fn is_touchable(&self, id: NodeId) -> Result<bool, NodeError> {
        let node = self.node(id)?;
        if !node.visible && !node.should_allow_touchable_when_invisible {
            return Ok(false);
        }
        if node.is_touch_enabled {
            return Ok(true);
        }
        match (node.should_inherit_touchability, node.parent) {
            (true, Some(parent)) => self.is_touchable(parent),
            _ => Ok(false),
        }
    }

    // --- camera ---

    /// Make `id` the active camera. The node must carry camera content.
    pub fn set_active_camera(&mut self, id: NodeId) -> Result<(), NodeError> {
        if self.node(id)?.camera().is_none() {
            return Err(NodeError::NotACamera(id));
        }
        self.active_camera = Some(id);
        Ok(())
    }

    /// The active camera node.
    pub fn active_camera(&self) -> Result<NodeId, NodeError> {
        self.active_camera.ok_or(NodeError::NoActiveCamera)
    }

    /// The viewport aspect ratio, 1.0 before the viewport is set.
    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.viewport;
        if h == 0 {
            1.0
        } else {
            w as f32 / h as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::camera::Camera;
    use crate::scene::light::Light;
    use approx::assert_relative_eq;

    fn scene_with_chain() -> (Scene, NodeId, NodeId) {
        let mut scene = Scene::default();
        let root = scene.root();
        let mut parent = Node::named("parent");
        parent.set_location(Vec3::new(10.0, 0.0, 0.0));
        let parent = scene.spawn_child(root, parent).unwrap();
        let mut child = Node::named("child");
        child.set_location(Vec3::new(5.0, 0.0, 0.0));
        let child = scene.spawn_child(parent, child).unwrap();
        (scene, parent, child)
    }

    #[test]
    fn child_global_location_composes_through_parent() {
        let (mut scene, _, child) = scene_with_chain();
        let location = scene.global_location(child).unwrap();
        assert_relative_eq!(location.x, 15.0);
        assert_relative_eq!(location.y, 0.0);
    }

    #[test]
    fn moving_the_parent_dirties_the_child() {
        let (mut scene, parent, child) = scene_with_chain();
        scene.update_transform_matrices();
        scene
            .node_mut(parent)
            .unwrap()
            .set_location(Vec3::new(20.0, 0.0, 0.0));
        let location = scene.global_location(child).unwrap();
        assert_relative_eq!(location.x, 25.0);
    }

    #[test]
    fn repeated_mutations_coalesce_into_one_rebuild() {
        let (mut scene, parent, child) = scene_with_chain();
        let n = scene.node_mut(parent).unwrap();
        n.set_location(Vec3::new(1.0, 0.0, 0.0));
        n.set_location(Vec3::new(2.0, 0.0, 0.0));
        n.set_location(Vec3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(scene.global_location(child).unwrap().x, 8.0);
        assert!(!scene.node(child).unwrap().is_transform_dirty());
    }

    #[test]
    fn add_child_rejects_cycles() {
        let (mut scene, parent, child) = scene_with_chain();
        let err = scene.add_child(child, parent).unwrap_err();
        assert!(matches!(err, NodeError::WouldCreateCycle { .. }));
    }

    #[test]
    fn add_child_is_idempotent() {
        let (mut scene, parent, child) = scene_with_chain();
        scene.add_child(parent, child).unwrap();
        assert_eq!(scene.node(parent).unwrap().children().len(), 1);
    }

    #[test]
    fn localize_preserves_global_pose() {
        let mut scene = Scene::default();
        let root = scene.root();
        let mut anchor = Node::new();
        anchor.set_location(Vec3::new(4.0, 0.0, 0.0));
        let anchor = scene.spawn_child(root, anchor).unwrap();
        let mut free = Node::new();
        free.set_location(Vec3::new(10.0, 2.0, 0.0));
        let free = scene.spawn_child(root, free).unwrap();

        scene.add_and_localize_child(anchor, free).unwrap();
        assert_eq!(scene.node(free).unwrap().parent(), Some(anchor));
        let global = scene.global_location(free).unwrap();
        assert_relative_eq!(global.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(global.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(scene.node(free).unwrap().location().x, 6.0, epsilon = 1e-5);
    }

    #[test]
    fn set_target_reorients_once() {
        let mut scene = Scene::default();
        let root = scene.root();
        let tracker = scene.spawn_child(root, Node::new()).unwrap();
        let mut target = Node::new();
        target.set_location(Vec3::new(0.0, 0.0, -10.0));
        let target = scene.spawn_child(root, target).unwrap();

        scene.set_target(tracker, target).unwrap();
        let forward = scene.node(tracker).unwrap().forward_direction();
        assert_relative_eq!(forward.z, -1.0, epsilon = 1e-5);

        // Targeted-once: the target moving does not re-face.
        scene
            .node_mut(target)
            .unwrap()
            .set_location(Vec3::new(10.0, 0.0, 0.0));
        scene.update_transform_matrices();
        let forward = scene.node(tracker).unwrap().forward_direction();
        assert_relative_eq!(forward.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn tracking_refaces_when_the_target_moves() {
        let mut scene = Scene::default();
        let root = scene.root();
        let tracker = scene.spawn_child(root, Node::new()).unwrap();
        let mut target = Node::new();
        target.set_location(Vec3::new(0.0, 0.0, -10.0));
        let target = scene.spawn_child(root, target).unwrap();

        scene.set_target(tracker, target).unwrap();
        scene.set_should_track_target(tracker, true).unwrap();
        scene
            .node_mut(target)
            .unwrap()
            .set_location(Vec3::new(10.0, 0.0, 0.0));
        scene.update_transform_matrices();
        let forward = scene.node(tracker).unwrap().forward_direction();
        assert_relative_eq!(forward.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(forward.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn destroying_the_target_untargets_its_trackers() {
        let mut scene = Scene::default();
        let root = scene.root();
        let tracker = scene.spawn_child(root, Node::new()).unwrap();
        let mut target = Node::new();
        target.set_location(Vec3::new(0.0, 0.0, -10.0));
        let target = scene.spawn_child(root, target).unwrap();
        scene.set_target(tracker, target).unwrap();
        scene.set_should_track_target(tracker, true).unwrap();

        scene.destroy(target).unwrap();
        assert!(!scene.contains(target));
        let rotator = scene.node(tracker).unwrap().rotator();
        assert!(rotator.target().is_none());
        assert!(!rotator.is_tracking());
    }

    #[test]
    fn bump_map_tracking_records_light_location_without_turning() {
        let mut scene = Scene::default();
        let root = scene.root();
        let mut tracker = Node::new();
        tracker.is_tracking_for_bump_mapping = true;
        let tracker = scene.spawn_child(root, tracker).unwrap();
        let mut lamp = Node::new();
        lamp.set_light(Light::default());
        lamp.set_location(Vec3::new(3.0, 4.0, 0.0));
        let lamp = scene.spawn_child(root, lamp).unwrap();

        scene.set_target(tracker, lamp).unwrap();
        scene.set_should_track_target(tracker, true).unwrap();
        scene
            .node_mut(lamp)
            .unwrap()
            .set_location(Vec3::new(6.0, 8.0, 0.0));
        scene.update_transform_matrices();
        let node = scene.node(tracker).unwrap();
        let light_location = node.global_light_location.unwrap();
        assert_relative_eq!(light_location.x, 6.0);
        assert_relative_eq!(light_location.y, 8.0);
        // Orientation untouched.
        assert_relative_eq!(node.forward_direction().z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn autoremove_when_empty_cascades() {
        let mut scene = Scene::default();
        let root = scene.root();
        let mut holder = Node::new();
        holder.should_autoremove_when_empty = true;
        let holder = scene.spawn_child(root, holder).unwrap();
        let leaf = scene.spawn_child(holder, Node::new()).unwrap();

        scene.remove_from_parent(leaf).unwrap();
        assert_eq!(scene.node(holder).unwrap().parent(), None);
        assert!(scene.node(root).unwrap().children().is_empty());
    }

    #[test]
    fn touchability_inherits_and_respects_visibility() {
        let (mut scene, parent, child) = scene_with_chain();
        assert!(!scene.is_touchable(child).unwrap());
        scene.node_mut(parent).unwrap().is_touch_enabled = true;
        assert!(scene.is_touchable(child).unwrap());
        scene.node_mut(child).unwrap().visible = false;
        assert!(!scene.is_touchable(child).unwrap());
        scene
            .node_mut(child)
            .unwrap()
            .should_allow_touchable_when_invisible = true;
        assert!(scene.is_touchable(child).unwrap());
    }

    #[test]
    fn deferred_removal_destroys_after_processing() {
        let (mut scene, parent, child) = scene_with_chain();
        scene.defer_removal(parent);
        assert!(scene.contains(parent));
        scene.process_deferred_removals();
        assert!(!scene.contains(parent));
        assert!(!scene.contains(child));
    }

    #[test]
    fn active_camera_must_be_a_camera() {
        let mut scene = Scene::default();
        let root = scene.root();
        let plain = scene.spawn_child(root, Node::new()).unwrap();
        assert!(matches!(
            scene.set_active_camera(plain),
            Err(NodeError::NotACamera(_))
        ));
        let mut cam = Node::new();
        cam.set_camera(Camera::default());
        let cam = scene.spawn_child(root, cam).unwrap();
        scene.set_active_camera(cam).unwrap();
        assert_eq!(scene.active_camera().unwrap(), cam);
    }
}
