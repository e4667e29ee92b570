//! Foundation utilities shared by every subsystem
//!
//! Math types, geometric primitives, and logging support. Nothing in this
//! module knows about nodes, meshes, or GL.

pub mod geometry;
pub mod ident;
pub mod logging;
pub mod math;
