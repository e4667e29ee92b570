//! The scene graph
//!
//! Nodes form a tree rooted in a [`Scene`], which owns every node and
//! mesh in slotmap arenas and mediates all cross-node operations:
//! hierarchy changes, lazy global-transform resolution, transform
//! listeners, target tracking, touch selection, and deferred removal.
//! Node-local state (transform components, content, flags, actions)
//! lives on [`Node`]; anything involving two nodes goes through the
//! scene.

pub mod action;
pub mod bounding;
pub mod camera;
pub mod graph;
pub mod light;
pub mod material;
pub mod node;
pub mod rotator;

pub use action::{Action, MoveBy, SpinBy};
pub use bounding::BoundingVolume;
pub use camera::Camera;
pub use graph::{MeshId, NodeId, NodeError, Scene};
pub use light::{Light, LightKind};
pub use material::{BlendFactor, ColorOverride, Material};
pub use node::{Animation, Node, NodeBehavior, NodeContent};
pub use rotator::{Rotator, TargettingConstraint, TrackingState};
