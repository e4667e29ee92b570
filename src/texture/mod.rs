//! 2D and cube-map textures
//!
//! Textures are loaded from PNG/JPEG files through the `image` crate or
//! from legacy PVR containers (uncompressed or PVRTC, optionally with
//! embedded mipmaps and cube layout), allocated empty for render-target
//! use, and shared through a name-keyed [`TextureCache`]. Sampler
//! parameters are held CPU-side and flushed to GL at the next bind.

mod cache;
pub mod pvr;

pub use cache::TextureCache;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

use crate::foundation::ident::Identity;
use crate::foundation::math::Vec2;
use crate::render::{
    CubeFace, GlContext, GlError, GlId, GlStateCache, ImageTarget, MinFilter, PixelFormat,
    PixelType, SamplerParams, TextureTarget, WrapMode,
};
use crate::settings::SceneSettings;

use pvr::{PvrFormat, PvrTexture};

/// Shared handle to a texture, as stored in the cache and in materials.
pub type TextureRef = Rc<RefCell<Texture>>;

/// Texture subsystem errors.
#[derive(Debug, Error)]
pub enum TextureError {
    /// Reading the texture file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Image decoding failed
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// The PVR container is malformed
    #[error("invalid PVR file: {0}")]
    InvalidPvr(String),

    /// The device lacks a required extension
    #[error("device does not support {0}")]
    UnsupportedOnDevice(&'static str),

    /// A texture with this name is already cached
    #[error("texture named {0:?} is already cached")]
    DuplicateName(String),

    /// The supplied rectangle does not lie within the texture
    #[error("rect {x},{y} {w}x{h} exceeds texture {width}x{height}")]
    RectOutOfBounds {
        /// Rectangle origin x
        x: u32,
        /// Rectangle origin y
        y: u32,
        /// Rectangle width
        w: u32,
        /// Rectangle height
        h: u32,
        /// Texture width
        width: u32,
        /// Texture height
        height: u32,
    },

    /// A cube file pattern does not contain the face placeholder
    #[error("cube pattern {0:?} does not contain {{face}}")]
    PatternMissingToken(String),

    /// A GL call failed during upload
    #[error(transparent)]
    Gl(#[from] GlError),
}

/// Whether a texture is 2D or a six-faced cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// An ordinary 2D texture
    TwoD,
    /// A cube map with six faces
    Cube,
}

impl TextureKind {
    /// The GL bind target for this kind.
    pub fn target(self) -> TextureTarget {
        match self {
            TextureKind::TwoD => TextureTarget::TwoD,
            TextureKind::Cube => TextureTarget::CubeMap,
        }
    }
}

/// The six face tokens substituted into cube file patterns, in GL face
/// order.
pub const CUBE_FACE_TOKENS: [&str; 6] = ["PosX", "NegX", "PosY", "NegY", "PosZ", "NegZ"];

fn is_pot(n: u32) -> bool {
    n != 0 && n & (n - 1) == 0
}

/// A GL texture with its CPU-side sampler state.
#[derive(Debug)]
pub struct Texture {
    /// Tag and name (the cache key)
    pub identity: Identity,
    kind: TextureKind,
    gl_texture: GlId,
    width: u32,
    height: u32,
    coverage: Vec2,
    pixel_format: PixelFormat,
    pixel_type: PixelType,
    sampler: SamplerParams,
    params_dirty: bool,
    has_mipmap: bool,
    is_upside_down: bool,
    has_premultiplied_alpha: bool,
    has_alpha: bool,
}

impl Texture {
    fn new_allocated(
        ctx: &mut dyn GlContext,
        name: impl Into<String>,
        kind: TextureKind,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        pixel_type: PixelType,
    ) -> Result<Self, TextureError> {
        let gl_texture = ctx.create_texture()?;
        Ok(Self {
            identity: Identity::named(name),
            kind,
            gl_texture,
            width,
            height,
            coverage: Vec2::new(1.0, 1.0),
            pixel_format,
            pixel_type,
            sampler: SamplerParams::default(),
            params_dirty: true,
            has_mipmap: false,
            is_upside_down: false,
            has_premultiplied_alpha: false,
            has_alpha: matches!(
                pixel_format,
                PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::LuminanceAlpha | PixelFormat::Alpha
            ),
        })
    }

    // --- loading ---

    /// Load a 2D (or, for a cube-layout PVR file, cube) texture from a
    /// file, dispatching on the extension. The texture's name is the
    /// file's basename.
    pub fn from_file(
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        settings: &SceneSettings,
        path: impl AsRef<Path>,
    ) -> Result<Self, TextureError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(path)?;
        let is_pvr = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("pvr"));
        if is_pvr {
            Self::from_pvr_bytes(ctx, state, settings, name, &bytes)
        } else {
            let image = image::load_from_memory(&bytes)?.into_rgba8();
            Self::from_rgba8(
                ctx,
                state,
                settings,
                name,
                image.width(),
                image.height(),
                image.into_raw(),
            )
        }
    }

    /// Create a 2D texture from decoded RGBA8 pixels, applying the
    /// configured orientation flips and mipmap policy.
    pub fn from_rgba8(
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        settings: &SceneSettings,
        name: impl Into<String>,
        width: u32,
        height: u32,
        mut rgba: Vec<u8>,
    ) -> Result<Self, TextureError> {
        if settings.flip_2d_vertically_on_load {
            flip_vertically(&mut rgba, width, height);
        }
        if settings.flip_2d_horizontally_on_load {
            flip_horizontally(&mut rgba, width);
        }
        let mut texture = Self::new_allocated(
            ctx,
            name,
            TextureKind::TwoD,
            width,
            height,
            PixelFormat::Rgba,
            PixelType::UnsignedByte,
        )?;
        state.bind_texture(ctx, TextureTarget::TwoD, texture.gl_texture);
        ctx.tex_image_2d(
            ImageTarget::TwoD,
            0,
            width,
            height,
            PixelFormat::Rgba,
            PixelType::UnsignedByte,
            Some(&rgba),
        )?;
        texture.apply_mipmap_policy(ctx, settings)?;
        texture.clamp_if_non_pot();
        Ok(texture)
    }

    /// Create a texture from a parsed legacy PVR container.
    ///
    /// Cube-layout files produce cube textures. PVRTC data requires the
    /// device extension; BGRA pixel data likewise.
    pub fn from_pvr_bytes(
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        settings: &SceneSettings,
        name: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, TextureError> {
        let parsed = pvr::parse(bytes)?;
        Self::from_pvr(ctx, state, settings, name, &parsed)
    }

    /// Upload an already-parsed PVR container.
    pub fn from_pvr(
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        settings: &SceneSettings,
        name: impl Into<String>,
        parsed: &PvrTexture,
    ) -> Result<Self, TextureError> {
        if parsed.is_compressed() && !ctx.supports_pvrtc() {
            return Err(TextureError::UnsupportedOnDevice("PVRTC compression"));
        }
        let (pixel_format, pixel_type) = match parsed.format {
            PvrFormat::Uncompressed(f, t) => {
                if f == PixelFormat::Bgra && !ctx.supports_bgra() {
                    return Err(TextureError::UnsupportedOnDevice("BGRA pixel data"));
                }
                (f, t)
            }
            PvrFormat::Compressed(_) => (PixelFormat::Rgba, PixelType::UnsignedByte),
        };
        let kind = if parsed.surfaces == 6 {
            TextureKind::Cube
        } else {
            TextureKind::TwoD
        };
        let mut texture = Self::new_allocated(
            ctx,
            name,
            kind,
            parsed.width,
            parsed.height,
            pixel_format,
            pixel_type,
        )?;
        texture.has_alpha = parsed.has_alpha;
        texture.is_upside_down = parsed.is_flipped_vertically;
        state.bind_texture(ctx, kind.target(), texture.gl_texture);
        for level in &parsed.levels {
            let target = match kind {
                TextureKind::TwoD => ImageTarget::TwoD,
                TextureKind::Cube => ImageTarget::CubeFace(CubeFace::ALL[level.surface as usize]),
            };
            match parsed.format {
                PvrFormat::Compressed(cf) => {
                    ctx.compressed_tex_image_2d(
                        target,
                        level.level,
                        cf,
                        level.width,
                        level.height,
                        &level.data,
                    )?;
                }
                PvrFormat::Uncompressed(f, t) => {
                    ctx.tex_image_2d(
                        target,
                        level.level,
                        level.width,
                        level.height,
                        f,
                        t,
                        Some(&level.data),
                    )?;
                }
            }
        }
        if parsed.has_mipmaps() {
            texture.has_mipmap = true;
        } else if !parsed.is_compressed() {
            texture.apply_mipmap_policy(ctx, settings)?;
        }
        texture.clamp_if_non_pot();
        Ok(texture)
    }

    /// Load the six faces of a cube texture by expanding `{face}` in the
    /// pattern to `PosX`, `NegX`, `PosY`, `NegY`, `PosZ`, `NegZ`. The
    /// texture's name is the pattern with an empty substitution.
    pub fn cube_from_file_pattern(
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        settings: &SceneSettings,
        pattern: &str,
    ) -> Result<Self, TextureError> {
        if !pattern.contains("{face}") {
            return Err(TextureError::PatternMissingToken(pattern.to_string()));
        }
        let name = Path::new(&pattern.replace("{face}", ""))
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Decode all six faces before touching GL so a missing file
        // leaves no partially-built texture behind.
        let mut faces = Vec::with_capacity(6);
        for token in CUBE_FACE_TOKENS {
            let path = pattern.replace("{face}", token);
            let bytes = std::fs::read(&path)?;
            let image = image::load_from_memory(&bytes)?.into_rgba8();
            let (width, height) = (image.width(), image.height());
            let mut rgba = image.into_raw();
            if settings.flip_cube_vertically_on_load {
                flip_vertically(&mut rgba, width, height);
            }
            if settings.flip_cube_horizontally_on_load {
                flip_horizontally(&mut rgba, width);
            }
            faces.push((width, height, rgba));
        }

        let (width, height, _) = faces[0];
        let mut texture = Self::new_allocated(
            ctx,
            name,
            TextureKind::Cube,
            width,
            height,
            PixelFormat::Rgba,
            PixelType::UnsignedByte,
        )?;
        state.bind_texture(ctx, TextureTarget::CubeMap, texture.gl_texture);
        for (face, (width, height, rgba)) in CubeFace::ALL.iter().zip(&faces) {
            ctx.tex_image_2d(
                ImageTarget::CubeFace(*face),
                0,
                *width,
                *height,
                PixelFormat::Rgba,
                PixelType::UnsignedByte,
                Some(rgba),
            )?;
        }
        texture.apply_mipmap_policy(ctx, settings)?;
        texture.clamp_if_non_pot();
        Ok(texture)
    }

    /// Allocate an empty 2D texture for render-target attachment.
    /// Wrapping is forced to clamp-to-edge and no mipmap is generated.
    pub fn with_size(
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Result<Self, TextureError> {
        let mut texture = Self::new_allocated(
            ctx,
            name,
            TextureKind::TwoD,
            width,
            height,
            PixelFormat::Rgba,
            PixelType::UnsignedByte,
        )?;
        state.bind_texture(ctx, TextureTarget::TwoD, texture.gl_texture);
        ctx.tex_image_2d(
            ImageTarget::TwoD,
            0,
            width,
            height,
            PixelFormat::Rgba,
            PixelType::UnsignedByte,
            None,
        )?;
        texture.sampler.wrap_s = WrapMode::ClampToEdge;
        texture.sampler.wrap_t = WrapMode::ClampToEdge;
        texture.sampler.min_filter = MinFilter::Linear;
        Ok(texture)
    }

    fn apply_mipmap_policy(
        &mut self,
        ctx: &mut dyn GlContext,
        settings: &SceneSettings,
    ) -> Result<(), TextureError> {
        if settings.generate_mipmaps && self.is_pot() {
            ctx.generate_mipmap(self.kind.target())?;
            self.has_mipmap = true;
        }
        Ok(())
    }

    fn clamp_if_non_pot(&mut self) {
        if !self.is_pot() {
            self.sampler.wrap_s = WrapMode::ClampToEdge;
            self.sampler.wrap_t = WrapMode::ClampToEdge;
        }
    }

    // --- attributes ---

    /// 2D or cube.
    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    /// The GL texture object (0 after deletion).
    pub fn gl_texture(&self) -> GlId {
        self.gl_texture
    }

    /// Base level width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Base level height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The usable fraction of the backing store.
    pub fn coverage(&self) -> Vec2 {
        self.coverage
    }

    /// Whether both dimensions are powers of two.
    pub fn is_pot(&self) -> bool {
        is_pot(self.width) && is_pot(self.height)
    }

    /// Whether a mipmap is present (embedded or generated).
    pub fn has_mipmap(&self) -> bool {
        self.has_mipmap
    }

    /// Whether the image rows are stored bottom-up.
    pub fn is_upside_down(&self) -> bool {
        self.is_upside_down
    }

    /// Whether the pixel format carries alpha.
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Whether color channels are premultiplied by alpha.
    pub fn has_premultiplied_alpha(&self) -> bool {
        self.has_premultiplied_alpha
    }

    /// The native pixel format.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// The native pixel packing.
    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    // --- sampler parameters ---

    /// The current sampler state (flushed at next bind).
    pub fn sampler(&self) -> SamplerParams {
        self.sampler
    }

    /// Set the minification filter.
    pub fn set_min_filter(&mut self, filter: MinFilter) {
        self.sampler.min_filter = filter;
        self.params_dirty = true;
    }

    /// Set the magnification filter.
    pub fn set_mag_filter(&mut self, filter: crate::render::MagFilter) {
        self.sampler.mag_filter = filter;
        self.params_dirty = true;
    }

    /// Set the horizontal (S) wrap mode. Non-clamp modes are promoted to
    /// clamp-to-edge on non-POT textures.
    pub fn set_wrap_s(&mut self, wrap: WrapMode) {
        self.sampler.wrap_s = self.admissible_wrap(wrap);
        self.params_dirty = true;
    }

    /// Set the vertical (T) wrap mode. Non-clamp modes are promoted to
    /// clamp-to-edge on non-POT textures.
    pub fn set_wrap_t(&mut self, wrap: WrapMode) {
        self.sampler.wrap_t = self.admissible_wrap(wrap);
        self.params_dirty = true;
    }

    fn admissible_wrap(&self, wrap: WrapMode) -> WrapMode {
        if wrap != WrapMode::ClampToEdge && !self.is_pot() {
            log::warn!(
                "texture {:?} is not power-of-two; wrap mode {wrap:?} promoted to clamp-to-edge",
                self.identity.name
            );
            WrapMode::ClampToEdge
        } else {
            wrap
        }
    }

    /// Bind this texture, flushing dirty sampler parameters.
    ///
    /// The flushed minification filter falls back to its non-mipmapped
    /// equivalent when no mipmap is present.
    pub fn bind(&mut self, ctx: &mut dyn GlContext, state: &mut GlStateCache) {
        let target = self.kind.target();
        state.bind_texture(ctx, target, self.gl_texture);
        if self.params_dirty {
            let mut params = self.sampler;
            if !self.has_mipmap {
                params.min_filter = params.min_filter.without_mipmap();
            }
            ctx.tex_parameters(target, &params);
            self.params_dirty = false;
        }
    }

    // --- content updates ---

    /// Replace a rectangle of pixels, given as RGBA8, converting to the
    /// texture's native format before upload. Mipmaps are not
    /// regenerated; call [`Texture::generate_mipmap`] afterwards if
    /// needed.
    pub fn replace_pixels(
        &mut self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        target: ImageTarget,
        (x, y, w, h): (u32, u32, u32, u32),
        rgba: &[u8],
    ) -> Result<(), TextureError> {
        let out_x = x.checked_add(w).map_or(true, |end| end > self.width);
        let out_y = y.checked_add(h).map_or(true, |end| end > self.height);
        if out_x || out_y {
            return Err(TextureError::RectOutOfBounds {
                x,
                y,
                w,
                h,
                width: self.width,
                height: self.height,
            });
        }
        let native = convert_from_rgba8(self.pixel_format, self.pixel_type, rgba);
        state.bind_texture(ctx, self.kind.target(), self.gl_texture);
        ctx.tex_sub_image_2d(
            target,
            0,
            x,
            y,
            w,
            h,
            self.pixel_format,
            self.pixel_type,
            &native,
        )?;
        Ok(())
    }

    /// Generate a mipmap for the current contents.
    pub fn generate_mipmap(
        &mut self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
    ) -> Result<(), TextureError> {
        state.bind_texture(ctx, self.kind.target(), self.gl_texture);
        ctx.generate_mipmap(self.kind.target())?;
        self.has_mipmap = true;
        self.params_dirty = true;
        Ok(())
    }

    /// Release the GL texture object.
    pub fn delete_gl_texture(&mut self, ctx: &mut dyn GlContext, state: &mut GlStateCache) {
        if self.gl_texture != 0 {
            ctx.delete_texture(self.gl_texture);
            state.forget_texture(self.gl_texture);
            self.gl_texture = 0;
        }
    }
}

/// Swap pixel rows top-to-bottom.
pub(crate) fn flip_vertically(rgba: &mut [u8], width: u32, height: u32) {
    let row = width as usize * 4;
    if row == 0 {
        return;
    }
    let (mut top, mut bottom) = (0, (height as usize).saturating_sub(1));
    while top < bottom {
        let (a, b) = rgba.split_at_mut(bottom * row);
        a[top * row..top * row + row].swap_with_slice(&mut b[..row]);
        top += 1;
        bottom -= 1;
    }
}

/// Swap pixels within each row, left-to-right.
pub(crate) fn flip_horizontally(rgba: &mut [u8], width: u32) {
    let w = width as usize;
    if w == 0 {
        return;
    }
    for row in rgba.chunks_exact_mut(w * 4) {
        let (mut left, mut right) = (0, w.saturating_sub(1));
        while left < right {
            for c in 0..4 {
                row.swap(left * 4 + c, right * 4 + c);
            }
            left += 1;
            right -= 1;
        }
    }
}

/// Convert RGBA8 pixels to a native format and packing.
pub(crate) fn convert_from_rgba8(
    format: PixelFormat,
    pixel_type: PixelType,
    rgba: &[u8],
) -> Vec<u8> {
    let pixels = rgba.chunks_exact(4);
    match (format, pixel_type) {
        (PixelFormat::Rgba, PixelType::UnsignedByte) => rgba.to_vec(),
        (PixelFormat::Bgra, PixelType::UnsignedByte) => pixels
            .flat_map(|p| [p[2], p[1], p[0], p[3]])
            .collect(),
        (PixelFormat::Rgb, PixelType::UnsignedByte) => {
            pixels.flat_map(|p| [p[0], p[1], p[2]]).collect()
        }
        (PixelFormat::Rgba, PixelType::UnsignedShort4444) => pixels
            .flat_map(|p| {
                let v = (u16::from(p[0] >> 4) << 12)
                    | (u16::from(p[1] >> 4) << 8)
                    | (u16::from(p[2] >> 4) << 4)
                    | u16::from(p[3] >> 4);
                v.to_ne_bytes()
            })
            .collect(),
        (PixelFormat::Rgba, PixelType::UnsignedShort5551) => pixels
            .flat_map(|p| {
                let v = (u16::from(p[0] >> 3) << 11)
                    | (u16::from(p[1] >> 3) << 6)
                    | (u16::from(p[2] >> 3) << 1)
                    | u16::from(p[3] >> 7);
                v.to_ne_bytes()
            })
            .collect(),
        (PixelFormat::Rgb, PixelType::UnsignedShort565) => pixels
            .flat_map(|p| {
                let v = (u16::from(p[0] >> 3) << 11)
                    | (u16::from(p[1] >> 2) << 5)
                    | u16::from(p[2] >> 3);
                v.to_ne_bytes()
            })
            .collect(),
        (PixelFormat::Luminance, _) => pixels.map(|p| p[0]).collect(),
        (PixelFormat::LuminanceAlpha, _) => pixels.flat_map(|p| [p[0], p[3]]).collect(),
        (PixelFormat::Alpha, _) => pixels.map(|p| p[3]).collect(),
        // Remaining combinations are never produced by the loaders.
        _ => rgba.to_vec(),
    }
}
