//! Scene-graph nodes
//!
//! A node carries identity, flags, a local transform (location, rotator,
//! scale), optional content (mesh, camera, or light), a bounding volume,
//! actions, an optional animation binding, and its hierarchy links.
//! Hierarchy links are arena keys; the [`Scene`](super::graph::Scene)
//! owns every node and performs all cross-node operations (re-parenting,
//! transform resolution, listener notification).

use crate::foundation::ident::Identity;
use crate::foundation::math::{
    quat_from_euler_degrees, quat_to_euler_degrees, Quat, TransformMatrix, Vec3,
};

use super::action::{Action, ActionSlot};
use super::bounding::BoundingVolume;
use super::camera::Camera;
use super::graph::{MeshId, NodeId};
use super::light::Light;
use super::material::{ColorOverride, Material};
use super::rotator::Rotator;

/// What a node contributes to the scene beyond its transform.
#[derive(Debug, Default)]
pub enum NodeContent {
    /// Pure structure: transform and children only
    #[default]
    Empty,
    /// Drawable geometry with its material
    Mesh {
        /// The mesh, owned by the scene's mesh arena
        mesh: MeshId,
        /// Surface appearance
        material: Material,
    },
    /// A viewpoint
    Camera(Camera),
    /// A light source
    Light(Light),
}

/// Per-frame hooks invoked by the update visitation.
pub trait NodeBehavior {
    /// Called before the frame's transform resolution.
    fn update_before_transform(&mut self, node: &mut Node, dt: f32) {
        let _ = (node, dt);
    }

    /// Called after the frame's transform resolution. Transform
    /// mutations made here resolve on the next global-property read.
    fn update_after_transform(&mut self, node: &mut Node, dt: f32) {
        let _ = (node, dt);
    }
}

/// Keyframe tracks sampled by frame index, bound from imported scenes.
#[derive(Debug, Clone, Default)]
pub struct Animation {
    /// Number of frames in the track arrays
    pub frame_count: u32,
    /// Per-frame locations, or empty when location is not animated
    pub locations: Vec<Vec3>,
    /// Per-frame rotations, or empty
    pub quaternions: Vec<Quat>,
    /// Per-frame scales, or empty
    pub scales: Vec<Vec3>,
}

impl Animation {
    /// Whether any track carries frames.
    pub fn is_animating(&self) -> bool {
        !self.locations.is_empty() || !self.quaternions.is_empty() || !self.scales.is_empty()
    }
}

/// One node of the scene graph.
pub struct Node {
    /// Tag and optional name
    pub identity: Identity,
    location: Vec3,
    rotator: Rotator,
    scale: Vec3,
    is_transform_dirty: bool,

    pub(super) parent: Option<NodeId>,
    pub(super) children: Vec<NodeId>,
    pub(super) global_transform: TransformMatrix,
    pub(super) global_bounding: Option<BoundingVolume>,
    pub(super) listeners: Vec<NodeId>,
    pub(super) observed: Vec<NodeId>,

    /// Whether updates and actions run on this node
    pub is_running: bool,
    /// Whether the drawing visitor draws this node
    pub visible: bool,
    /// Whether this node responds to touch selection
    pub is_touch_enabled: bool,
    /// Whether touchability is inherited from the parent
    pub should_inherit_touchability: bool,
    /// Allow touch selection even while invisible
    pub should_allow_touchable_when_invisible: bool,
    /// Remove this node when its last child is removed
    pub should_autoremove_when_empty: bool,
    /// Stop and drop actions when the node is removed from its parent
    pub should_stop_actions_when_removed: bool,
    /// Feed a tracked light's global location to bump-mapped meshes
    /// instead of re-orienting
    pub is_tracking_for_bump_mapping: bool,
    /// Set false after a GL failure so draws skip this node
    pub has_valid_gpu_state: bool,

    /// Explicit drawing-order override; primary sort key
    pub z_order: i32,
    /// Scalar inflate applied when deriving the global bounding volume
    pub bounding_volume_padding: f32,
    bounding_volume: BoundingVolume,
    content: NodeContent,
    color_override: ColorOverride,
    pub(super) actions: Vec<ActionSlot>,
    /// Per-frame update hooks
    pub behavior: Option<Box<dyn NodeBehavior>>,
    /// Bound keyframe animation, if imported
    pub animation: Option<Animation>,
    /// The tracked light's global location, maintained while
    /// bump-map tracking
    pub global_light_location: Option<Vec3>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("identity", &self.identity)
            .field("location", &self.location)
            .field("children", &self.children.len())
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    /// Create a detached, empty, visible, running node at the origin.
    pub fn new() -> Self {
        Self {
            identity: Identity::new(),
            location: Vec3::zeros(),
            rotator: Rotator::default(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            is_transform_dirty: true,
            parent: None,
            children: Vec::new(),
            global_transform: TransformMatrix::identity(),
            global_bounding: None,
            listeners: Vec::new(),
            observed: Vec::new(),
            is_running: true,
            visible: true,
            is_touch_enabled: false,
            should_inherit_touchability: true,
            should_allow_touchable_when_invisible: false,
            should_autoremove_when_empty: false,
            should_stop_actions_when_removed: true,
            is_tracking_for_bump_mapping: false,
            has_valid_gpu_state: true,
            z_order: 0,
            bounding_volume_padding: 0.0,
            bounding_volume: BoundingVolume::Null,
            content: NodeContent::Empty,
            color_override: ColorOverride::default(),
            actions: Vec::new(),
            behavior: None,
            animation: None,
            global_light_location: None,
        }
    }

    /// Create a detached named node.
    pub fn named(name: impl Into<String>) -> Self {
        let mut node = Self::new();
        node.identity = Identity::named(name);
        node
    }

    // --- local transform ---

    /// The local location.
    pub fn location(&self) -> Vec3 {
        self.location
    }

    /// Set the local location.
    pub fn set_location(&mut self, location: Vec3) {
        self.location = location;
        self.mark_transform_dirty();
    }

    /// Translate the local location.
    pub fn translate_by(&mut self, delta: Vec3) {
        self.set_location(self.location + delta);
    }

    /// The local scale.
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Set the local scale.
    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.mark_transform_dirty();
    }

    /// Set all three scale components to `s`.
    pub fn set_uniform_scale(&mut self, s: f32) {
        self.set_scale(Vec3::new(s, s, s));
    }

    /// The scale as a scalar when uniform, or the average otherwise.
    pub fn uniform_scale(&self) -> f32 {
        if self.is_uniformly_scaled() {
            self.scale.x
        } else {
            (self.scale.x + self.scale.y + self.scale.z) / 3.0
        }
    }

    /// Whether all three scale components are equal.
    pub fn is_uniformly_scaled(&self) -> bool {
        self.scale.x == self.scale.y && self.scale.y == self.scale.z
    }

    /// The node's rotator.
    pub fn rotator(&self) -> &Rotator {
        &self.rotator
    }

    /// Mutable rotator access for scene-level targeting operations.
    pub(super) fn rotator_mut(&mut self) -> &mut Rotator {
        self.mark_transform_dirty();
        &mut self.rotator
    }

    /// The local rotation.
    pub fn quaternion(&self) -> Quat {
        self.rotator.quaternion()
    }

    /// Set the local rotation. Ignored with a warning while the node is
    /// tracking a target.
    pub fn set_quaternion(&mut self, q: Quat) {
        if self.reject_rotation_while_tracking() {
            return;
        }
        self.rotator.set_quaternion(q);
        self.mark_transform_dirty();
    }

    /// The local rotation as Euler angles in degrees.
    pub fn rotation(&self) -> Vec3 {
        quat_to_euler_degrees(&self.quaternion())
    }

    /// Set the local rotation from Euler angles in degrees.
    pub fn set_rotation(&mut self, degrees: Vec3) {
        self.set_quaternion(quat_from_euler_degrees(degrees));
    }

    /// Compose an additional rotation onto the local rotation. Ignored
    /// with a warning while tracking.
    pub fn rotate_by(&mut self, q: Quat) {
        if self.reject_rotation_while_tracking() {
            return;
        }
        self.rotator.rotate_by(q);
        self.mark_transform_dirty();
    }

    /// The local forward direction.
    pub fn forward_direction(&self) -> Vec3 {
        self.rotator.forward_direction()
    }

    /// Orient the node along `direction`. Ignored with a warning while
    /// tracking.
    pub fn set_forward_direction(&mut self, direction: Vec3) {
        if self.reject_rotation_while_tracking() {
            return;
        }
        self.rotator.set_forward_direction(direction);
        self.mark_transform_dirty();
    }

    fn reject_rotation_while_tracking(&self) -> bool {
        if self.rotator.is_tracking() {
            log::warn!(
                "node {} ({:?}) is tracking a target; rotation change ignored",
                self.identity.tag,
                self.identity.name
            );
            true
        } else {
            false
        }
    }

    /// The local transform composed from location, rotator, and scale.
    /// Rigid iff the scale is (1,1,1).
    pub fn local_transform(&self) -> TransformMatrix {
        TransformMatrix::from_trs(self.location, self.quaternion(), self.scale)
    }

    /// Whether the global transform needs rebuilding.
    pub fn is_transform_dirty(&self) -> bool {
        self.is_transform_dirty
    }

    pub(super) fn mark_transform_dirty(&mut self) {
        self.is_transform_dirty = true;
        self.global_bounding = None;
    }

    pub(super) fn set_global_transform(&mut self, transform: TransformMatrix) {
        self.global_transform = transform;
        self.is_transform_dirty = false;
        self.global_bounding = None;
    }

    // --- hierarchy (read-only; mutation goes through the scene) ---

    /// The parent node, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The ordered children.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    // --- content ---

    /// The node's content.
    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    /// Mutable access to the node's content.
    pub fn content_mut(&mut self) -> &mut NodeContent {
        &mut self.content
    }

    /// Attach drawable mesh content.
    pub fn set_mesh(&mut self, mesh: MeshId, material: Material) {
        self.content = NodeContent::Mesh { mesh, material };
    }

    /// Attach camera content.
    pub fn set_camera(&mut self, camera: Camera) {
        self.content = NodeContent::Camera(camera);
    }

    /// Attach light content.
    pub fn set_light(&mut self, light: Light) {
        self.content = NodeContent::Light(light);
    }

    /// The mesh id, when the node has mesh content.
    pub fn mesh(&self) -> Option<MeshId> {
        match &self.content {
            NodeContent::Mesh { mesh, .. } => Some(*mesh),
            _ => None,
        }
    }

    /// The material, when the node has mesh content.
    pub fn material(&self) -> Option<&Material> {
        match &self.content {
            NodeContent::Mesh { material, .. } => Some(material),
            _ => None,
        }
    }

    /// The light parameters, when the node is a light.
    pub fn light(&self) -> Option<&Light> {
        match &self.content {
            NodeContent::Light(light) => Some(light),
            _ => None,
        }
    }

    /// The camera parameters, when the node is a camera.
    pub fn camera(&self) -> Option<&Camera> {
        match &self.content {
            NodeContent::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    // --- bounding ---

    /// The local-frame bounding volume.
    pub fn bounding_volume(&self) -> &BoundingVolume {
        &self.bounding_volume
    }

    /// Set the local-frame bounding volume.
    pub fn set_bounding_volume(&mut self, volume: BoundingVolume) {
        self.bounding_volume = volume;
        self.global_bounding = None;
    }

    // --- color overrides ---

    /// Subtree color overrides applied at draw time.
    pub fn color_override(&self) -> ColorOverride {
        self.color_override
    }

    /// Override the diffuse color for this node's subtree.
    pub fn set_diffuse_override(&mut self, diffuse: Option<crate::foundation::math::Vec4>) {
        self.color_override.diffuse = diffuse;
    }

    /// Override the opacity multiplier for this node's subtree.
    pub fn set_opacity_override(&mut self, opacity: Option<f32>) {
        self.color_override.opacity = opacity;
    }

    // --- actions ---

    /// Start an action under `tag`, replacing any action already
    /// running under the same tag.
    pub fn run_action(&mut self, tag: u32, action: Box<dyn Action>) {
        self.stop_action_with_tag(tag);
        self.actions.push(ActionSlot { tag, action });
    }

    /// Stop and drop the action under `tag`, if any.
    pub fn stop_action_with_tag(&mut self, tag: u32) {
        self.actions.retain(|slot| slot.tag != tag);
    }

    /// Stop and drop every action.
    pub fn stop_all_actions(&mut self) {
        self.actions.clear();
    }

    /// Number of actions currently attached (paused or running).
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Tick all actions by `dt`, removing those that finish.
    ///
    /// The actions are detached during the tick so they can mutate the
    /// node freely.
    pub(crate) fn tick_actions(&mut self, dt: f32) {
        let mut actions = std::mem::take(&mut self.actions);
        actions.retain_mut(|slot| !slot.action.tick(self, dt));
        // Actions started by actions land after the survivors.
        actions.append(&mut self.actions);
        self.actions = actions;
    }

    // --- animation ---

    /// Apply animation frame `frame` to the local transform. Frames
    /// beyond the track length clamp to the last frame.
    pub fn establish_animation_frame(&mut self, frame: u32) {
        let Some(animation) = self.animation.take() else {
            return;
        };
        let sample = |len: usize| (frame as usize).min(len.saturating_sub(1));
        if !animation.locations.is_empty() {
            self.set_location(animation.locations[sample(animation.locations.len())]);
        }
        if !animation.quaternions.is_empty() {
            let q = animation.quaternions[sample(animation.quaternions.len())];
            self.rotator.set_quaternion(q);
            self.mark_transform_dirty();
        }
        if !animation.scales.is_empty() {
            self.set_scale(animation.scales[sample(animation.scales.len())]);
        }
        self.animation = Some(animation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::action::MoveBy;
    use approx::assert_relative_eq;

    #[test]
    fn new_node_is_dirty_running_and_visible() {
        let node = Node::new();
        assert!(node.is_transform_dirty());
        assert!(node.is_running);
        assert!(node.visible);
        assert_eq!(node.scale(), Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn quaternion_round_trips() {
        let mut node = Node::new();
        let q = quat_from_euler_degrees(Vec3::new(10.0, 20.0, 30.0));
        node.set_quaternion(q);
        let back = node.quaternion();
        // Equivalent modulo sign.
        assert!(q.dot(&back).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn rotation_is_ignored_while_tracking() {
        let mut node = Node::new();
        node.set_forward_direction(Vec3::new(0.0, 0.0, -1.0));
        node.rotator_mut().directional_mut().state =
            crate::scene::rotator::TrackingState::Tracking;
        let before = node.quaternion();
        node.set_rotation(Vec3::new(0.0, 90.0, 0.0));
        assert_eq!(node.quaternion(), before);
    }

    #[test]
    fn local_transform_rigidity_follows_scale() {
        let mut node = Node::new();
        assert!(node.local_transform().is_rigid());
        node.set_scale(Vec3::new(2.0, 1.0, 1.0));
        assert!(!node.local_transform().is_rigid());
    }

    #[test]
    fn run_action_replaces_same_tag() {
        let mut node = Node::new();
        node.run_action(7, Box::new(MoveBy::new(Vec3::new(1.0, 0.0, 0.0), 1.0)));
        node.run_action(7, Box::new(MoveBy::new(Vec3::new(0.0, 1.0, 0.0), 1.0)));
        assert_eq!(node.action_count(), 1);
        node.tick_actions(1.0);
        assert_relative_eq!(node.location().x, 0.0);
        assert_relative_eq!(node.location().y, 1.0);
        assert_eq!(node.action_count(), 0);
    }

    #[test]
    fn animation_frame_clamps_to_track_end() {
        let mut node = Node::new();
        node.animation = Some(Animation {
            frame_count: 2,
            locations: vec![Vec3::zeros(), Vec3::new(5.0, 0.0, 0.0)],
            quaternions: vec![],
            scales: vec![],
        });
        node.establish_animation_frame(10);
        assert_relative_eq!(node.location().x, 5.0);
    }
}
