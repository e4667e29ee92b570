//! GL ES backend abstraction
//!
//! The core never links against GL directly. Every GL command is issued
//! through the [`GlContext`] trait, which a production backend implements
//! over real bindings (see the `glow-backend` feature) and tests implement
//! with [`RecordingContext`] to capture the command stream.

mod context;
mod recording;
mod state;

#[cfg(feature = "glow-backend")]
mod glow_backend;

pub use context::{
    AttributeType, BufferTarget, BufferUsage, CompressedFormat, CubeFace, DrawMode, GlContext,
    GlError, GlId, ImageTarget, IndexType, MagFilter, MinFilter, PixelFormat, PixelType,
    SamplerParams, TextureTarget, WrapMode,
};
pub use recording::{GlCommand, RecordingContext};
pub use state::GlStateCache;

#[cfg(feature = "glow-backend")]
pub use glow_backend::GlowContext;
