//! The updating visitation
//!
//! One visit is one frame of scene logic, in four phases: the
//! before-transform hooks and actions run first, then every dirty
//! global matrix is rebuilt (notifying transform listeners), then the
//! after-transform hooks run, and finally any deferred removals are
//! processed. A node whose `is_running` flag is false is skipped along
//! with its whole subtree, which is what pauses its actions.

use crate::scene::{NodeId, Scene};

use super::collect_preorder;

/// Runs the per-frame update phases over a scene.
#[derive(Debug, Default)]
pub struct UpdateVisitor {
    visited: usize,
}

impl UpdateVisitor {
    /// Create an update visitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes visited by the most recent `visit`.
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Run one frame of updates with time step `dt` seconds.
    pub fn visit(&mut self, scene: &mut Scene, dt: f32) {
        let running = running_nodes(scene);
        self.visited = running.len();
        for &id in &running {
            Self::before_transform(scene, id, dt);
        }
        scene.update_transform_matrices();
        // Hooks may toggle is_running; the after phase honors the new state.
        for id in running_nodes(scene) {
            Self::after_transform(scene, id, dt);
        }
        scene.process_deferred_removals();
    }

    fn before_transform(scene: &mut Scene, id: NodeId, dt: f32) {
        let Ok(node) = scene.node_mut(id) else {
            return;
        };
        if let Some(mut behavior) = node.behavior.take() {
            behavior.update_before_transform(node, dt);
            if node.behavior.is_none() {
                node.behavior = Some(behavior);
            }
        }
        node.tick_actions(dt);
    }

    fn after_transform(scene: &mut Scene, id: NodeId, dt: f32) {
        let Ok(node) = scene.node_mut(id) else {
            return;
        };
        if let Some(mut behavior) = node.behavior.take() {
            behavior.update_after_transform(node, dt);
            if node.behavior.is_none() {
                node.behavior = Some(behavior);
            }
        }
    }
}

fn running_nodes(scene: &Scene) -> Vec<NodeId> {
    collect_preorder(scene, |node| node.is_running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::{MoveBy, Node, NodeBehavior};
    use approx::assert_relative_eq;

    struct Drift(Vec3);

    impl NodeBehavior for Drift {
        fn update_before_transform(&mut self, node: &mut Node, dt: f32) {
            node.translate_by(self.0 * dt);
        }
    }

    #[test]
    fn before_hook_moves_resolve_within_the_same_visit() {
        let mut scene = Scene::default();
        let root = scene.root();
        let mut node = Node::new();
        node.behavior = Some(Box::new(Drift(Vec3::new(2.0, 0.0, 0.0))));
        let id = scene.spawn_child(root, node).unwrap();

        let mut visitor = UpdateVisitor::new();
        visitor.visit(&mut scene, 0.5);
        assert!(!scene.node(id).unwrap().is_transform_dirty());
        assert_relative_eq!(scene.global_location(id).unwrap().x, 1.0);
    }

    #[test]
    fn actions_pause_under_a_stopped_ancestor() {
        let mut scene = Scene::default();
        let root = scene.root();
        let holder = scene.spawn_child(root, Node::new()).unwrap();
        let mover = scene.spawn_child(holder, Node::new()).unwrap();
        scene
            .node_mut(mover)
            .unwrap()
            .run_action(1, Box::new(MoveBy::new(Vec3::new(4.0, 0.0, 0.0), 2.0)));

        let mut visitor = UpdateVisitor::new();
        scene.node_mut(holder).unwrap().is_running = false;
        visitor.visit(&mut scene, 1.0);
        assert_relative_eq!(scene.node(mover).unwrap().location().x, 0.0);

        scene.node_mut(holder).unwrap().is_running = true;
        visitor.visit(&mut scene, 1.0);
        assert_relative_eq!(scene.node(mover).unwrap().location().x, 2.0);
    }

    #[test]
    fn deferred_removals_run_at_the_end_of_the_visit() {
        let mut scene = Scene::default();
        let root = scene.root();
        let doomed = scene.spawn_child(root, Node::new()).unwrap();
        scene.defer_removal(doomed);

        let mut visitor = UpdateVisitor::new();
        visitor.visit(&mut scene, 0.016);
        assert!(!scene.contains(doomed));
    }

    #[test]
    fn visit_counts_only_running_nodes() {
        let mut scene = Scene::default();
        let root = scene.root();
        scene.spawn_child(root, Node::new()).unwrap();
        let paused = scene.spawn_child(root, Node::new()).unwrap();
        scene.node_mut(paused).unwrap().is_running = false;

        let mut visitor = UpdateVisitor::new();
        visitor.visit(&mut scene, 0.016);
        // Root plus the one running child.
        assert_eq!(visitor.visited(), 2);
    }
}
