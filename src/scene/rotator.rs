//! Node rotators
//!
//! A rotator holds a node's rotational state. It starts as the identity
//! and is upgraded in place when a richer operation is requested:
//! setting a quaternion upgrades `Basic` to `Quat`, and setting a
//! forward direction or a target upgrades further to `Directional`,
//! which adds a reference up direction and the target-tracking state
//! machine.

use crate::foundation::math::{quat_looking_along, Quat, Vec3};

use super::graph::NodeId;

/// The target-tracking state machine of a directional rotator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// No target has ever been set
    Untargeted,
    /// A target was set; the node oriented to it once
    TargetedOnce,
    /// The node re-orients whenever it or its target moves
    Tracking,
}

/// Axis restriction applied while orienting towards a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargettingConstraint {
    /// Rotate freely in the global frame
    #[default]
    Unconstrained,
    /// Rotate only about the node's local X axis
    LocalX,
    /// Rotate only about the node's local Y axis
    LocalY,
    /// Rotate only about the node's local Z axis
    LocalZ,
    /// Rotate only about the global X axis
    GlobalX,
    /// Rotate only about the global Y axis
    GlobalY,
    /// Rotate only about the global Z axis
    GlobalZ,
}

impl TargettingConstraint {
    /// Project a desired forward direction onto the plane this
    /// constraint allows rotation within. Local and global variants
    /// differ in which frame the caller supplies the direction in.
    pub fn restrict(self, direction: Vec3) -> Vec3 {
        let mut d = direction;
        match self {
            TargettingConstraint::Unconstrained => {}
            TargettingConstraint::LocalX | TargettingConstraint::GlobalX => d.x = 0.0,
            TargettingConstraint::LocalY | TargettingConstraint::GlobalY => d.y = 0.0,
            TargettingConstraint::LocalZ | TargettingConstraint::GlobalZ => d.z = 0.0,
        }
        d
    }

    /// Whether the restriction is expressed in the node's local frame.
    pub fn is_local(self) -> bool {
        matches!(
            self,
            TargettingConstraint::LocalX | TargettingConstraint::LocalY | TargettingConstraint::LocalZ
        )
    }
}

/// Directional state carried by the richest rotator variant.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalState {
    /// Current rotation
    pub quat: Quat,
    /// The up direction used to resolve roll when orienting
    pub reference_up: Vec3,
    /// The tracked node, if targeting a node
    pub target: Option<NodeId>,
    /// The tracked location, if targeting a fixed point
    pub target_location: Option<Vec3>,
    /// Where the tracking state machine stands
    pub state: TrackingState,
    /// Axis restriction applied when orienting
    pub constraint: TargettingConstraint,
}

impl Default for DirectionalState {
    fn default() -> Self {
        Self {
            quat: Quat::identity(),
            reference_up: Vec3::y(),
            target: None,
            target_location: None,
            state: TrackingState::Untargeted,
            constraint: TargettingConstraint::default(),
        }
    }
}

/// A node's rotational state, upgraded in place as needed.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Rotator {
    /// Identity rotation only
    #[default]
    Basic,
    /// Quaternion-backed rotation
    Quat(Quat),
    /// Rotation plus forward direction and target tracking
    Directional(DirectionalState),
}

impl Rotator {
    /// The current rotation.
    pub fn quaternion(&self) -> Quat {
        match self {
            Rotator::Basic => Quat::identity(),
            Rotator::Quat(q) => *q,
            Rotator::Directional(d) => d.quat,
        }
    }

    /// Whether the rotator is actively tracking a target.
    pub fn is_tracking(&self) -> bool {
        matches!(
            self,
            Rotator::Directional(DirectionalState {
                state: TrackingState::Tracking,
                ..
            })
        )
    }

    /// The tracked node, if any.
    pub fn target(&self) -> Option<NodeId> {
        match self {
            Rotator::Directional(d) => d.target,
            _ => None,
        }
    }

    /// The tracked location (a fixed point or unset).
    pub fn target_location(&self) -> Option<Vec3> {
        match self {
            Rotator::Directional(d) => d.target_location,
            _ => None,
        }
    }

    /// Set the rotation, upgrading `Basic` to `Quat`.
    ///
    /// The caller is responsible for rejecting this while tracking; the
    /// rotator itself stores whatever it is given.
    pub fn set_quaternion(&mut self, q: Quat) {
        match self {
            Rotator::Directional(d) => d.quat = q,
            _ => *self = Rotator::Quat(q),
        }
    }

    /// Compose an additional rotation onto the current one.
    pub fn rotate_by(&mut self, q: Quat) {
        self.set_quaternion(q * self.quaternion());
    }

    /// The direction the rotator faces (the rotated -Z axis, GL
    /// convention).
    pub fn forward_direction(&self) -> Vec3 {
        self.quaternion() * -Vec3::z()
    }

    /// The rotated +Y axis.
    pub fn up_direction(&self) -> Vec3 {
        self.quaternion() * Vec3::y()
    }

    /// The rotated +X axis.
    pub fn right_direction(&self) -> Vec3 {
        self.quaternion() * Vec3::x()
    }

    /// Upgrade to `Directional`, preserving the current rotation, and
    /// return the directional state.
    pub fn directional_mut(&mut self) -> &mut DirectionalState {
        if !matches!(self, Rotator::Directional(_)) {
            *self = Rotator::Directional(DirectionalState {
                quat: self.quaternion(),
                ..DirectionalState::default()
            });
        }
        match self {
            Rotator::Directional(d) => d,
            _ => unreachable!("just upgraded"),
        }
    }

    /// The directional state, if the rotator has been upgraded.
    pub fn directional(&self) -> Option<&DirectionalState> {
        match self {
            Rotator::Directional(d) => Some(d),
            _ => None,
        }
    }

    /// Point the rotator along `direction`, resolving roll against the
    /// reference up. Zero-length directions are ignored. Upgrades to
    /// `Directional`.
    pub fn set_forward_direction(&mut self, direction: Vec3) {
        if direction.norm_squared() == 0.0 {
            log::warn!("ignoring zero-length forward direction");
            return;
        }
        let d = self.directional_mut();
        d.quat = quat_looking_along(direction.normalize(), d.reference_up);
    }

    /// Set the up direction used to resolve roll. Upgrades to
    /// `Directional` and re-derives the rotation from the current
    /// forward direction.
    pub fn set_reference_up(&mut self, up: Vec3) {
        if up.norm_squared() == 0.0 {
            log::warn!("ignoring zero-length reference up direction");
            return;
        }
        let forward = self.forward_direction();
        let d = self.directional_mut();
        d.reference_up = up.normalize();
        d.quat = quat_looking_along(forward, d.reference_up);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn basic_upgrades_to_quat_then_directional() {
        let mut r = Rotator::Basic;
        assert_eq!(r.quaternion(), Quat::identity());
        let q = Quat::from_axis_angle(&nalgebra::Unit::new_normalize(Vec3::y()), 1.0);
        r.set_quaternion(q);
        assert!(matches!(r, Rotator::Quat(_)));
        r.set_forward_direction(Vec3::new(1.0, 0.0, 0.0));
        assert!(matches!(r, Rotator::Directional(_)));
    }

    #[test]
    fn forward_direction_round_trips_normalized() {
        let mut r = Rotator::Basic;
        r.set_forward_direction(Vec3::new(2.0, 0.0, 0.0));
        let f = r.forward_direction();
        assert_relative_eq!(f.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(f.norm(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn directions_stay_orthonormal_after_orienting() {
        let mut r = Rotator::Basic;
        r.set_forward_direction(Vec3::new(1.0, 0.5, -0.3));
        let (f, u, right) = (r.forward_direction(), r.up_direction(), r.right_direction());
        assert_relative_eq!(f.dot(&u), 0.0, epsilon = 1e-5);
        assert_relative_eq!(f.dot(&right), 0.0, epsilon = 1e-5);
        assert_relative_eq!(u.dot(&right), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn zero_direction_is_ignored() {
        let mut r = Rotator::Basic;
        r.set_forward_direction(Vec3::new(0.0, 1.0, 0.0));
        let before = r.quaternion();
        r.set_forward_direction(Vec3::zeros());
        assert_eq!(r.quaternion(), before);
    }

    #[test]
    fn constraint_projects_out_the_restricted_axis() {
        let d = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(TargettingConstraint::GlobalY.restrict(d).y, 0.0);
        assert_eq!(TargettingConstraint::LocalX.restrict(d).x, 0.0);
        assert_eq!(TargettingConstraint::Unconstrained.restrict(d), d);
    }
}
