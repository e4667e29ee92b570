//! Time-based node actions
//!
//! An action mutates its node a little each frame until it reports
//! completion. Actions are stored on the node, identified by an integer
//! tag, and ticked during the update visitation while the node is
//! running. Starting an action under a tag that is already in use
//! replaces the existing action first.

use super::node::Node;

/// A time-based mutation of a node.
pub trait Action {
    /// Advance the action by `dt` seconds. Returns true when the action
    /// has finished and should be removed from the node.
    fn tick(&mut self, node: &mut Node, dt: f32) -> bool;
}

/// An action paired with its identifying tag.
pub struct ActionSlot {
    /// Caller-assigned identifier, unique per node
    pub tag: u32,
    /// The action itself
    pub action: Box<dyn Action>,
}

impl std::fmt::Debug for ActionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSlot").field("tag", &self.tag).finish()
    }
}

/// Translate the node at a constant velocity for a fixed duration.
#[derive(Debug, Clone)]
pub struct MoveBy {
    /// Total displacement over the full duration
    pub displacement: crate::foundation::math::Vec3,
    /// Duration in seconds
    pub duration: f32,
    elapsed: f32,
}

impl MoveBy {
    /// Move by `displacement` over `duration` seconds.
    pub fn new(displacement: crate::foundation::math::Vec3, duration: f32) -> Self {
        Self {
            displacement,
            duration,
            elapsed: 0.0,
        }
    }
}

impl Action for MoveBy {
    fn tick(&mut self, node: &mut Node, dt: f32) -> bool {
        let step = dt.min(self.duration - self.elapsed);
        if step > 0.0 && self.duration > 0.0 {
            let delta = self.displacement * (step / self.duration);
            node.set_location(node.location() + delta);
        }
        self.elapsed += dt;
        self.elapsed >= self.duration
    }
}

/// Spin the node about an axis at a constant angular rate, forever.
#[derive(Debug, Clone)]
pub struct SpinBy {
    /// Rotation axis, in the node's local frame
    pub axis: crate::foundation::math::Vec3,
    /// Degrees per second
    pub degrees_per_second: f32,
}

impl Action for SpinBy {
    fn tick(&mut self, node: &mut Node, dt: f32) -> bool {
        use crate::foundation::math::{deg_to_rad, Quat};
        if let Some(axis) = nalgebra::Unit::try_new(self.axis, 1e-6) {
            let q = Quat::from_axis_angle(&axis, deg_to_rad(self.degrees_per_second * dt));
            node.rotate_by(q);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn move_by_finishes_after_its_duration() {
        let mut node = Node::new();
        let mut action = MoveBy::new(Vec3::new(10.0, 0.0, 0.0), 2.0);
        assert!(!action.tick(&mut node, 1.0));
        assert_relative_eq!(node.location().x, 5.0, epsilon = 1e-5);
        assert!(action.tick(&mut node, 1.0));
        assert_relative_eq!(node.location().x, 10.0, epsilon = 1e-5);
        // Ticking past the end moves no further.
        action.tick(&mut node, 1.0);
        assert_relative_eq!(node.location().x, 10.0, epsilon = 1e-5);
    }

    #[test]
    fn spin_by_never_finishes() {
        let mut node = Node::new();
        let mut action = SpinBy {
            axis: Vec3::y(),
            degrees_per_second: 90.0,
        };
        assert!(!action.tick(&mut node, 1.0));
        let f = node.rotator().forward_direction();
        // After 90 degrees about Y, -Z has rotated to -X.
        assert_relative_eq!(f.x, -1.0, epsilon = 1e-4);
    }
}
