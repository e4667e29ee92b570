//! Materials and per-node color overrides
//!
//! A material carries the lighting colors, shininess, blend factors,
//! and up to two texture bindings (base color plus an optional bump or
//! overlay map). Nodes may override the diffuse color and opacity of
//! their subtree's materials at draw time without mutating the shared
//! material.

use crate::foundation::ident::Identity;
use crate::foundation::math::Vec4;
use crate::render::{GlContext, GlStateCache};
use crate::texture::TextureRef;

/// GL blend factors used by material blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    /// `GL_ZERO`
    Zero,
    /// `GL_ONE`
    One,
    /// `GL_SRC_ALPHA`
    SrcAlpha,
    /// `GL_ONE_MINUS_SRC_ALPHA`
    OneMinusSrcAlpha,
    /// `GL_DST_ALPHA`
    DstAlpha,
    /// `GL_ONE_MINUS_DST_ALPHA`
    OneMinusDstAlpha,
}

/// Surface appearance shared between nodes.
#[derive(Debug, Clone)]
pub struct Material {
    /// Tag and optional name
    pub identity: Identity,
    /// Ambient reflectance
    pub ambient: Vec4,
    /// Diffuse reflectance; its alpha is the material's opacity
    pub diffuse: Vec4,
    /// Specular reflectance
    pub specular: Vec4,
    /// Emitted color
    pub emissive: Vec4,
    /// Specular exponent
    pub shininess: f32,
    /// Source blend factor
    pub src_blend: BlendFactor,
    /// Destination blend factor
    pub dst_blend: BlendFactor,
    /// Texture bindings: base color first, bump/overlay second
    pub textures: Vec<TextureRef>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            identity: Identity::new(),
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec4::new(0.0, 0.0, 0.0, 1.0),
            emissive: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 0.0,
            src_blend: BlendFactor::One,
            dst_blend: BlendFactor::Zero,
            textures: Vec::new(),
        }
    }
}

impl Material {
    /// Create a default material with a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            identity: Identity::named(name),
            ..Self::default()
        }
    }

    /// The material's opacity, read from the diffuse alpha.
    pub fn opacity(&self) -> f32 {
        self.diffuse.w
    }

    /// Set the opacity on every lighting color, switching to alpha
    /// blending when translucent and back to opaque blending at 1.
    pub fn set_opacity(&mut self, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        self.ambient.w = opacity;
        self.diffuse.w = opacity;
        self.specular.w = opacity;
        self.emissive.w = opacity;
        if opacity < 1.0 {
            self.src_blend = BlendFactor::SrcAlpha;
            self.dst_blend = BlendFactor::OneMinusSrcAlpha;
        } else {
            self.src_blend = BlendFactor::One;
            self.dst_blend = BlendFactor::Zero;
        }
    }

    /// Whether the material draws in the opaque pass.
    pub fn is_opaque(&self) -> bool {
        self.src_blend == BlendFactor::One && self.dst_blend == BlendFactor::Zero
    }

    /// Bind the material's textures for drawing, flushing any dirty
    /// sampler parameters.
    pub fn bind_textures(&self, ctx: &mut dyn GlContext, state: &mut GlStateCache) {
        for texture in &self.textures {
            texture.borrow_mut().bind(ctx, state);
        }
    }
}

/// Per-node overrides applied to the subtree's materials at draw time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColorOverride {
    /// Replacement diffuse color, if set
    pub diffuse: Option<Vec4>,
    /// Opacity multiplier, if set
    pub opacity: Option<f32>,
}

impl ColorOverride {
    /// Whether any override is active.
    pub fn is_active(&self) -> bool {
        self.diffuse.is_some() || self.opacity.is_some()
    }

    /// The material as it should be drawn under this override.
    pub fn applied_to(&self, material: &Material) -> Material {
        let mut out = material.clone();
        if let Some(diffuse) = self.diffuse {
            out.diffuse = diffuse;
        }
        if let Some(opacity) = self.opacity {
            out.set_opacity(material.opacity() * opacity);
        }
        out
    }
}
