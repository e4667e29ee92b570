//! The drawing visitation
//!
//! The visitor is a persistent object: it owns the drawing sequence,
//! the sorted order in which mesh nodes are drawn. Opaque nodes draw
//! front to back and translucent nodes back to front, both keyed by
//! `(z_order, camera distance)`. With `allow_sequence_updates` on in
//! the scene settings the sequence rebuilds every frame; with it off
//! the cached order is reused and the application reports mutated
//! nodes through [`DrawVisitor::check_drawing_order`].
//!
//! Culling is per node: a node whose global bounding volume falls
//! outside the camera frustum skips its own draw only. A mesh whose
//! draw reports a GL failure is flagged and skipped on later frames.

use crate::foundation::math::Vec3;
use crate::render::{GlContext, GlStateCache};
use crate::scene::{NodeError, NodeId, Scene};

use super::collect_preorder;

/// Counters from one drawing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Mesh nodes whose draw call was issued
    pub drawn: usize,
    /// Mesh nodes skipped by frustum culling
    pub culled: usize,
}

/// Sequences and draws the scene's mesh nodes.
#[derive(Debug, Default)]
pub struct DrawVisitor {
    sequence: Vec<NodeId>,
    sequence_stale: bool,
}

impl DrawVisitor {
    /// Create a drawing visitor with an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current drawing sequence, opaque nodes first.
    pub fn sequence(&self) -> &[NodeId] {
        &self.sequence
    }

    /// Report that `node`'s sort keys changed. With per-frame sequence
    /// updates disabled this is the only way the order is refreshed.
    pub fn check_drawing_order(&mut self, node: NodeId) {
        if self.sequence.contains(&node) {
            self.sequence_stale = true;
        }
    }

    /// Draw the scene through the active camera.
    pub fn draw(
        &mut self,
        scene: &mut Scene,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
    ) -> Result<DrawStats, NodeError> {
        let camera_id = scene.active_camera()?;
        scene.update_transform_matrices();
        let camera_global = scene.global_transform(camera_id)?;
        let camera = scene
            .node(camera_id)?
            .camera()
            .ok_or(NodeError::NotACamera(camera_id))?
            .clone();
        let frustum = camera.frustum(&camera_global, scene.aspect_ratio());
        let eye = camera_global.translation();

        if scene.settings().allow_sequence_updates || self.sequence_stale || self.sequence.is_empty()
        {
            self.rebuild_sequence(scene, eye)?;
            self.sequence_stale = false;
        }

        let mut stats = DrawStats::default();
        for id in self.sequence.clone() {
            if !scene.contains(id) {
                continue;
            }
            let node = scene.node(id)?;
            if !node.visible || !node.has_valid_gpu_state {
                continue;
            }
            let Some(mesh_id) = node.mesh() else {
                continue;
            };
            let bounds = scene.global_bounding_volume(id)?;
            if !bounds.intersects_frustum(&frustum) {
                stats.culled += 1;
                continue;
            }
            if let Some(material) = scene.node(id)?.material() {
                material.bind_textures(ctx, state);
            }
            let outcome = scene.mesh(mesh_id)?.draw(ctx, state);
            match outcome {
                Ok(()) => stats.drawn += 1,
                Err(err) => {
                    let node = scene.node_mut(id)?;
                    log::warn!(
                        "draw failed for node {} ({:?}): {err}; node flagged invalid",
                        node.identity.tag,
                        node.identity.name
                    );
                    node.has_valid_gpu_state = false;
                    state.invalidate_last_drawn_mesh();
                }
            }
        }
        Ok(stats)
    }

    fn rebuild_sequence(&mut self, scene: &mut Scene, eye: Vec3) -> Result<(), NodeError> {
        let mut opaque: Vec<(i32, f32, NodeId)> = Vec::new();
        let mut translucent: Vec<(i32, f32, NodeId)> = Vec::new();
        for id in collect_preorder(scene, |_| true) {
            let node = scene.node(id)?;
            let Some(material) = node.material() else {
                continue;
            };
            let is_opaque = node.color_override().applied_to(material).is_opaque();
            let z_order = node.z_order;
            let distance = (scene.global_location(id)? - eye).norm();
            let entry = (z_order, distance, id);
            if is_opaque {
                opaque.push(entry);
            } else {
                translucent.push(entry);
            }
        }
        opaque.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        translucent.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.total_cmp(&a.1)));
        self.sequence = opaque
            .into_iter()
            .chain(translucent)
            .map(|(_, _, id)| id)
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::geometry::Sphere;
    use crate::mesh::{Mesh, VertexContent};
    use crate::render::RecordingContext;
    use crate::scene::{BoundingVolume, Camera, Material, Node};

    fn triangle_mesh(ctx: &mut RecordingContext, state: &mut GlStateCache) -> Mesh {
        let mut mesh = Mesh::new();
        mesh.set_vertex_content(VertexContent::LOCATION);
        mesh.set_allocated_vertex_capacity(3).unwrap();
        mesh.set_vertex_count(3);
        mesh.set_vertex_location(0, Vec3::new(-1.0, 0.0, 0.0)).unwrap();
        mesh.set_vertex_location(1, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        mesh.set_vertex_location(2, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        mesh.create_gl_buffers(ctx, state).unwrap();
        mesh
    }

    fn scene_with_camera() -> (Scene, NodeId) {
        let mut scene = Scene::default();
        scene.set_viewport(640, 480);
        let root = scene.root();
        let mut camera = Node::named("camera");
        camera.set_camera(Camera {
            field_of_view: 60.0,
            near_clip: 1.0,
            far_clip: 50.0,
        });
        let camera = scene.spawn_child(root, camera).unwrap();
        scene.set_active_camera(camera).unwrap();
        (scene, camera)
    }

    fn add_mesh_node(
        scene: &mut Scene,
        ctx: &mut RecordingContext,
        state: &mut GlStateCache,
        location: Vec3,
    ) -> NodeId {
        let mesh = triangle_mesh(ctx, state);
        let mesh = scene.add_mesh(mesh);
        let mut node = Node::new();
        node.set_mesh(mesh, Material::default());
        node.set_location(location);
        node.set_bounding_volume(BoundingVolume::Sphere(Sphere {
            center: Vec3::zeros(),
            radius: 1.0,
        }));
        let root = scene.root();
        scene.spawn_child(root, node).unwrap()
    }

    #[test]
    fn draws_nodes_inside_the_frustum() {
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        let (mut scene, _) = scene_with_camera();
        add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -10.0));

        let mut visitor = DrawVisitor::new();
        let stats = visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(stats, DrawStats { drawn: 1, culled: 0 });
        assert_eq!(ctx.draw_call_count(), 1);
    }

    #[test]
    fn culls_nodes_beyond_the_far_plane() {
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        let (mut scene, _) = scene_with_camera();
        add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -100.0));

        let mut visitor = DrawVisitor::new();
        let stats = visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(stats, DrawStats { drawn: 0, culled: 1 });
        assert_eq!(ctx.draw_call_count(), 0);
    }

    #[test]
    fn opaque_nodes_draw_front_to_back() {
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        let (mut scene, _) = scene_with_camera();
        let far = add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -30.0));
        let near = add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -5.0));

        let mut visitor = DrawVisitor::new();
        visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(visitor.sequence(), &[near, far]);
    }

    #[test]
    fn translucent_nodes_draw_back_to_front_after_opaque() {
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        let (mut scene, _) = scene_with_camera();
        let solid = add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -5.0));
        let glass_near = add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -8.0));
        let glass_far = add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -20.0));
        for id in [glass_near, glass_far] {
            let node = scene.node_mut(id).unwrap();
            match node.content_mut() {
                crate::scene::NodeContent::Mesh { material, .. } => material.set_opacity(0.5),
                _ => unreachable!(),
            }
        }

        let mut visitor = DrawVisitor::new();
        visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(visitor.sequence(), &[solid, glass_far, glass_near]);
    }

    #[test]
    fn sequence_is_reused_when_updates_are_disabled() {
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        let (mut scene, _) = scene_with_camera();
        let far = add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -30.0));
        let near = add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -5.0));
        scene.settings_mut().allow_sequence_updates = false;

        let mut visitor = DrawVisitor::new();
        visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(visitor.sequence(), &[near, far]);

        // Swap depths; the cached order stays until the app reports it.
        scene
            .node_mut(near)
            .unwrap()
            .set_location(Vec3::new(0.0, 0.0, -40.0));
        visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(visitor.sequence(), &[near, far]);

        visitor.check_drawing_order(near);
        visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(visitor.sequence(), &[far, near]);
    }

    #[test]
    fn draw_failure_flags_the_node_and_skips_it_afterwards() {
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        let (mut scene, _) = scene_with_camera();

        // A mesh that never went to the GPU fails its first draw.
        let mut mesh = Mesh::new();
        mesh.set_vertex_content(VertexContent::LOCATION);
        mesh.set_allocated_vertex_capacity(3).unwrap();
        mesh.set_vertex_count(3);
        let mesh = scene.add_mesh(mesh);
        let mut node = Node::new();
        node.set_mesh(mesh, Material::default());
        node.set_location(Vec3::new(0.0, 0.0, -10.0));
        let root = scene.root();
        let id = scene.spawn_child(root, node).unwrap();

        let mut visitor = DrawVisitor::new();
        let stats = visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(stats.drawn, 0);
        assert!(!scene.node(id).unwrap().has_valid_gpu_state);

        ctx.clear_log();
        visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(ctx.draw_call_count(), 0);
    }

    #[test]
    fn invisible_nodes_are_skipped_but_children_still_draw() {
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        let (mut scene, _) = scene_with_camera();
        let parent = add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -10.0));
        let child = add_mesh_node(&mut scene, &mut ctx, &mut state, Vec3::new(0.0, 0.0, -12.0));
        scene.add_child(parent, child).unwrap();
        scene.node_mut(parent).unwrap().visible = false;

        let mut visitor = DrawVisitor::new();
        let stats = visitor.draw(&mut scene, &mut ctx, &mut state).unwrap();
        assert_eq!(stats.drawn, 1);
    }
}
