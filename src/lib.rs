//! # arbor3d
//!
//! A 3D scene-graph and rendering toolkit over OpenGL ES.
//!
//! ## Features
//!
//! - **Scene Graph**: Hierarchical nodes with lazy transform resolution,
//!   transform listeners, and target tracking
//! - **Mesh Engine**: Typed vertex streams, optional interleaving, and
//!   managed GPU buffer lifecycle
//! - **Textures**: PNG/JPEG and legacy PVR loading (PVRTC, cube maps,
//!   embedded mipmaps) with a weak/strong name cache
//! - **Visitors**: Per-frame update, sequenced drawing with frustum
//!   culling, and ray-puncture picking
//! - **Backend Agnostic**: All GL goes through the [`render::GlContext`]
//!   trait; tests record the command stream, production uses `glow`
//!
//! ## Quick Start
//!
//! ```rust
//! use arbor3d::prelude::*;
//!
//! let mut scene = Scene::default();
//! let root = scene.root();
//!
//! let mut body = Node::named("body");
//! body.set_location(Vec3::new(10.0, 0.0, 0.0));
//! let body = scene.spawn_child(root, body)?;
//!
//! let mut eye = Node::named("eye");
//! eye.set_camera(Camera::default());
//! let eye = scene.spawn_child(body, eye)?;
//! scene.set_active_camera(eye)?;
//!
//! let mut updater = UpdateVisitor::new();
//! updater.visit(&mut scene, 1.0 / 60.0);
//! assert_eq!(scene.global_location(eye)?.x, 10.0);
//! # Ok::<(), arbor3d::scene::NodeError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod mesh;
pub mod pod;
pub mod render;
pub mod scene;
pub mod settings;
pub mod texture;
pub mod visit;

/// Common imports for toolkit users
pub mod prelude {
    pub use crate::{
        foundation::geometry::{Aabb, Face, Frustum, Ray, Sphere},
        foundation::math::{Mat4, Quat, TransformMatrix, Vec2, Vec3, Vec4},
        mesh::{Mesh, MeshError, VertexContent, VertexSemantic},
        pod::{build_scene, PodScene},
        render::{DrawMode, GlContext, GlStateCache},
        scene::{
            BoundingVolume, Camera, Light, Material, Node, NodeError, NodeId, Rotator, Scene,
        },
        settings::SceneSettings,
        texture::{Texture, TextureCache, TextureError},
        visit::{DrawVisitor, PunctureVisitor, UpdateVisitor},
    };
}
