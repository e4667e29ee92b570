//! The GL ES command contract
//!
//! Defines the [`GlContext`] trait that rendering backends implement, and
//! the enums describing the subset of GL ES state the scene-graph core
//! drives. All GL access is thread-confined to the scene thread, so the
//! trait takes `&mut self` and implementations need no internal locking.

use thiserror::Error;

/// A GL object name. Zero means "no object".
pub type GlId = u32;

/// A failed GL operation, as reported by `glGetError` after the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("GL call {call} failed with error 0x{code:04x}")]
pub struct GlError {
    /// The logical GL call that failed
    pub call: &'static str,
    /// The GL error code
    pub code: u32,
}

/// Buffer binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex attribute data (`GL_ARRAY_BUFFER`)
    Array,
    /// Vertex index data (`GL_ELEMENT_ARRAY_BUFFER`)
    ElementArray,
}

/// Buffer usage hints passed at allocation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    /// Written once, drawn many times
    #[default]
    StaticDraw,
    /// Rewritten frequently (particle systems, skinning caches)
    DynamicDraw,
    /// Rewritten every frame
    StreamDraw,
}

/// Primitive assembly modes for draw calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// Individual points
    Points,
    /// Individual line segments
    Lines,
    /// Connected line strip
    LineStrip,
    /// Closed line loop
    LineLoop,
    /// Individual triangles
    #[default]
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Triangle fan
    TriangleFan,
}

/// Index element types for indexed draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// 8-bit indices
    UnsignedByte,
    /// 16-bit indices
    UnsignedShort,
}

/// Vertex attribute component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// 32-bit float components
    Float,
    /// 16.16 fixed-point components
    Fixed,
    /// Signed 8-bit components
    Byte,
    /// Unsigned 8-bit components
    UnsignedByte,
    /// Signed 16-bit components
    Short,
    /// Unsigned 16-bit components
    UnsignedShort,
}

/// Texture binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// `GL_TEXTURE_2D`
    TwoD,
    /// `GL_TEXTURE_CUBE_MAP`
    CubeMap,
}

/// The six cube-map faces, in GL face-target order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// `GL_TEXTURE_CUBE_MAP_POSITIVE_X`
    PositiveX,
    /// `GL_TEXTURE_CUBE_MAP_NEGATIVE_X`
    NegativeX,
    /// `GL_TEXTURE_CUBE_MAP_POSITIVE_Y`
    PositiveY,
    /// `GL_TEXTURE_CUBE_MAP_NEGATIVE_Y`
    NegativeY,
    /// `GL_TEXTURE_CUBE_MAP_POSITIVE_Z`
    PositiveZ,
    /// `GL_TEXTURE_CUBE_MAP_NEGATIVE_Z`
    NegativeZ,
}

impl CubeFace {
    /// All six faces in GL order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];
}

/// The target of an image upload: the 2D target or one cube face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageTarget {
    /// `GL_TEXTURE_2D`
    TwoD,
    /// One face of the bound cube map
    CubeFace(CubeFace),
}

/// Uncompressed pixel data formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Four-channel RGBA
    Rgba,
    /// Three-channel RGB
    Rgb,
    /// Single luminance channel
    Luminance,
    /// Luminance plus alpha
    LuminanceAlpha,
    /// Alpha only
    Alpha,
    /// BGRA byte order (requires the BGRA extension)
    Bgra,
}

/// Pixel component packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// One byte per component
    UnsignedByte,
    /// Packed 4/4/4/4
    UnsignedShort4444,
    /// Packed 5/5/5/1
    UnsignedShort5551,
    /// Packed 5/6/5
    UnsignedShort565,
}

impl PixelType {
    /// Bytes occupied by one pixel of `format` at this packing.
    pub fn bytes_per_pixel(self, format: PixelFormat) -> usize {
        match self {
            PixelType::UnsignedByte => match format {
                PixelFormat::Rgba | PixelFormat::Bgra => 4,
                PixelFormat::Rgb => 3,
                PixelFormat::LuminanceAlpha => 2,
                PixelFormat::Luminance | PixelFormat::Alpha => 1,
            },
            _ => 2,
        }
    }
}

/// PVRTC compressed texture formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressedFormat {
    /// PVRTC 2 bits per pixel, RGB
    PvrtcRgb2,
    /// PVRTC 2 bits per pixel, RGBA
    PvrtcRgba2,
    /// PVRTC 4 bits per pixel, RGB
    PvrtcRgb4,
    /// PVRTC 4 bits per pixel, RGBA
    PvrtcRgba4,
}

impl CompressedFormat {
    /// Bits per pixel of this format.
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            CompressedFormat::PvrtcRgb2 | CompressedFormat::PvrtcRgba2 => 2,
            CompressedFormat::PvrtcRgb4 | CompressedFormat::PvrtcRgba4 => 4,
        }
    }
}

/// Minification filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinFilter {
    /// Nearest texel
    Nearest,
    /// Bilinear
    Linear,
    /// Nearest texel in nearest mip level
    NearestMipmapNearest,
    /// Bilinear in nearest mip level
    LinearMipmapNearest,
    /// Nearest texel blended across mip levels
    NearestMipmapLinear,
    /// Trilinear
    LinearMipmapLinear,
}

impl MinFilter {
    /// Whether this filter samples mipmap levels.
    pub fn uses_mipmap(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::Linear)
    }

    /// The nearest non-mipmapped equivalent of this filter.
    pub fn without_mipmap(self) -> Self {
        match self {
            MinFilter::Nearest | MinFilter::NearestMipmapNearest | MinFilter::NearestMipmapLinear => {
                MinFilter::Nearest
            }
            _ => MinFilter::Linear,
        }
    }
}

/// Magnification filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagFilter {
    /// Nearest texel
    Nearest,
    /// Bilinear
    Linear,
}

/// Texture coordinate wrap modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    /// Repeat (legal only on power-of-two textures)
    Repeat,
    /// Mirrored repeat (legal only on power-of-two textures)
    MirroredRepeat,
    /// Clamp to edge
    ClampToEdge,
}

/// The full sampler state flushed to GL at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerParams {
    /// Minification filter
    pub min_filter: MinFilter,
    /// Magnification filter
    pub mag_filter: MagFilter,
    /// Horizontal (S) wrap mode
    pub wrap_s: WrapMode,
    /// Vertical (T) wrap mode
    pub wrap_t: WrapMode,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            min_filter: MinFilter::LinearMipmapNearest,
            mag_filter: MagFilter::Linear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
        }
    }
}

/// The GL ES commands the scene-graph core issues.
///
/// This is the narrow seam between the core and a concrete GL binding,
/// in the same spirit as a render-backend trait in front of Vulkan: the
/// core stays testable and the binding stays swappable. Implementations
/// report failures from `poll_error` style checks as [`GlError`] so the
/// caller can flag the offending resource and skip it on later draws.
pub trait GlContext {
    // --- buffers ---

    /// Generate a buffer object.
    fn create_buffer(&mut self) -> Result<GlId, GlError>;

    /// Delete a buffer object.
    fn delete_buffer(&mut self, id: GlId);

    /// Bind a buffer to a target.
    fn bind_buffer(&mut self, target: BufferTarget, id: GlId);

    /// Allocate and fill the bound buffer's data store.
    fn buffer_data(
        &mut self,
        target: BufferTarget,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<(), GlError>;

    /// Update a sub-range of the bound buffer's data store.
    fn buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> Result<(), GlError>;

    // --- textures ---

    /// Generate a texture object.
    fn create_texture(&mut self) -> Result<GlId, GlError>;

    /// Delete a texture object.
    fn delete_texture(&mut self, id: GlId);

    /// Bind a texture to a target.
    fn bind_texture(&mut self, target: TextureTarget, id: GlId);

    /// Upload one uncompressed image level; `None` data allocates storage
    /// without filling it (render targets).
    fn tex_image_2d(
        &mut self,
        target: ImageTarget,
        level: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel_type: PixelType,
        data: Option<&[u8]>,
    ) -> Result<(), GlError>;

    /// Upload one compressed image level.
    fn compressed_tex_image_2d(
        &mut self,
        target: ImageTarget,
        level: u32,
        format: CompressedFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<(), GlError>;

    /// Replace a rectangle of an existing image level.
    fn tex_sub_image_2d(
        &mut self,
        target: ImageTarget,
        level: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel_type: PixelType,
        data: &[u8],
    ) -> Result<(), GlError>;

    /// Flush sampler parameters for the bound texture.
    fn tex_parameters(&mut self, target: TextureTarget, params: &SamplerParams);

    /// Generate mipmaps for the bound texture.
    fn generate_mipmap(&mut self, target: TextureTarget) -> Result<(), GlError>;

    // --- vertex attributes ---

    /// Enable a vertex attribute slot.
    fn enable_vertex_attribute(&mut self, slot: u32);

    /// Disable a vertex attribute slot.
    fn disable_vertex_attribute(&mut self, slot: u32);

    /// Point an attribute slot at the bound array buffer (or client
    /// memory when no buffer is bound).
    fn vertex_attribute_pointer(
        &mut self,
        slot: u32,
        components: u32,
        attribute_type: AttributeType,
        normalized: bool,
        stride: usize,
        offset: usize,
    );

    // --- draws ---

    /// Non-indexed range draw.
    fn draw_arrays(&mut self, mode: DrawMode, first: usize, count: usize);

    /// Indexed draw from the bound element buffer.
    fn draw_elements(&mut self, mode: DrawMode, count: usize, index_type: IndexType, offset: usize);

    // --- capabilities ---

    /// Whether the device supports PVRTC compressed textures.
    fn supports_pvrtc(&self) -> bool;

    /// Whether the device supports the BGRA texture format extension.
    fn supports_bgra(&self) -> bool;
}
