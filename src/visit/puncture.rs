//! The puncturing visitation
//!
//! Casts a global ray through the tree and records every node whose
//! global bounding volume the ray punctures, sorted nearest first.
//! Used for touch selection and collision probes.

use crate::foundation::geometry::Ray;
use crate::foundation::math::Vec3;
use crate::scene::{NodeError, NodeId, Scene};

use super::collect_preorder;

/// One recorded ray puncture.
#[derive(Debug, Clone, PartialEq)]
pub struct Puncture {
    /// The punctured node
    pub node: NodeId,
    /// The hit point in the node's local frame
    pub local_location: Vec3,
    /// The hit point in the global frame
    pub global_location: Vec3,
    /// Distance from the ray origin; negative for hits behind the ray
    pub distance: f32,
    /// Whether the ray started inside the volume
    pub was_back_face: bool,
}

/// Collects ray punctures over a scene.
#[derive(Debug)]
pub struct PunctureVisitor {
    /// Record punctures whose ray origin lies inside the volume
    pub accept_back_faces: bool,
    /// Also probe backwards along the ray, recording negative distances
    pub accept_behind_ray: bool,
    /// Skip invisible nodes
    pub visible_only: bool,
    punctures: Vec<Puncture>,
}

impl Default for PunctureVisitor {
    fn default() -> Self {
        Self {
            accept_back_faces: false,
            accept_behind_ray: false,
            visible_only: true,
            punctures: Vec::new(),
        }
    }
}

impl PunctureVisitor {
    /// Create a visitor that accepts only forward, front-face hits on
    /// visible nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cast `ray` through the scene, replacing any previous punctures.
    pub fn visit(&mut self, scene: &mut Scene, ray: &Ray) -> Result<(), NodeError> {
        self.punctures.clear();
        scene.update_transform_matrices();
        for id in collect_preorder(scene, |node| node.visible || !self.visible_only) {
            let volume = scene.global_bounding_volume(id)?;
            if volume.is_null() {
                continue;
            }
            let hit = match volume.intersect_ray(ray) {
                Some(distance) => Some(distance),
                None if self.accept_behind_ray => {
                    let reversed = Ray::new(ray.origin, -ray.direction);
                    volume.intersect_ray(&reversed).map(|d| -d)
                }
                None => None,
            };
            let Some(distance) = hit else {
                continue;
            };
            let was_back_face = volume.contains_point(ray.origin);
            if was_back_face && !self.accept_back_faces {
                continue;
            }
            let global_location = ray.point_at(distance);
            let local_location = scene
                .global_transform(id)?
                .inverted()
                .transform_point(global_location);
            self.punctures.push(Puncture {
                node: id,
                local_location,
                global_location,
                distance,
                was_back_face,
            });
        }
        self.punctures
            .sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(())
    }

    /// Punctures from the last visit, nearest first.
    pub fn punctures(&self) -> &[Puncture] {
        &self.punctures
    }

    /// The nearest punctured node, if any.
    pub fn closest_punctured_node(&self) -> Option<NodeId> {
        self.punctures.first().map(|p| p.node)
    }

    /// Number of punctures recorded by the last visit.
    pub fn puncture_count(&self) -> usize {
        self.punctures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::geometry::Sphere;
    use crate::scene::{BoundingVolume, Node};
    use approx::assert_relative_eq;

    fn sphere_node(scene: &mut Scene, location: Vec3, radius: f32) -> NodeId {
        let mut node = Node::new();
        node.set_location(location);
        node.set_bounding_volume(BoundingVolume::Sphere(Sphere {
            center: Vec3::zeros(),
            radius,
        }));
        let root = scene.root();
        scene.spawn_child(root, node).unwrap()
    }

    #[test]
    fn closest_puncture_comes_first() {
        let mut scene = Scene::default();
        let near = sphere_node(&mut scene, Vec3::new(0.0, 0.0, -5.0), 1.0);
        let far = sphere_node(&mut scene, Vec3::new(0.0, 0.0, -20.0), 1.0);

        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        let mut visitor = PunctureVisitor::new();
        visitor.visit(&mut scene, &ray).unwrap();
        assert_eq!(visitor.puncture_count(), 2);
        assert_eq!(visitor.closest_punctured_node(), Some(near));
        assert_eq!(visitor.punctures()[1].node, far);
        assert_relative_eq!(visitor.punctures()[0].distance, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn local_hit_point_is_in_the_node_frame() {
        let mut scene = Scene::default();
        let node = sphere_node(&mut scene, Vec3::new(0.0, 0.0, -5.0), 1.0);

        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        let mut visitor = PunctureVisitor::new();
        visitor.visit(&mut scene, &ray).unwrap();
        let puncture = &visitor.punctures()[0];
        assert_eq!(puncture.node, node);
        assert_relative_eq!(puncture.global_location.z, -4.0, epsilon = 1e-5);
        assert_relative_eq!(puncture.local_location.z, 1.0, epsilon = 1e-5);
        assert!(!puncture.was_back_face);
    }

    #[test]
    fn invisible_nodes_are_skipped_unless_allowed() {
        let mut scene = Scene::default();
        let hidden = sphere_node(&mut scene, Vec3::new(0.0, 0.0, -5.0), 1.0);
        scene.node_mut(hidden).unwrap().visible = false;

        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        let mut visitor = PunctureVisitor::new();
        visitor.visit(&mut scene, &ray).unwrap();
        assert_eq!(visitor.puncture_count(), 0);

        visitor.visible_only = false;
        visitor.visit(&mut scene, &ray).unwrap();
        assert_eq!(visitor.puncture_count(), 1);
    }

    #[test]
    fn origin_inside_the_volume_needs_back_face_acceptance() {
        let mut scene = Scene::default();
        sphere_node(&mut scene, Vec3::zeros(), 2.0);

        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        let mut visitor = PunctureVisitor::new();
        visitor.visit(&mut scene, &ray).unwrap();
        assert_eq!(visitor.puncture_count(), 0);

        visitor.accept_back_faces = true;
        visitor.visit(&mut scene, &ray).unwrap();
        assert_eq!(visitor.puncture_count(), 1);
        assert!(visitor.punctures()[0].was_back_face);
    }

    #[test]
    fn behind_ray_hits_report_negative_distance() {
        let mut scene = Scene::default();
        let behind = sphere_node(&mut scene, Vec3::new(0.0, 0.0, 5.0), 1.0);

        let ray = Ray::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        let mut visitor = PunctureVisitor::new();
        visitor.visit(&mut scene, &ray).unwrap();
        assert_eq!(visitor.puncture_count(), 0);

        visitor.accept_behind_ray = true;
        visitor.visit(&mut scene, &ray).unwrap();
        assert_eq!(visitor.closest_punctured_node(), Some(behind));
        assert_relative_eq!(visitor.punctures()[0].distance, -4.0, epsilon = 1e-5);
    }
}
