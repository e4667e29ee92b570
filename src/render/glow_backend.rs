//! Production [`GlContext`] backend over the `glow` GL ES bindings
//!
//! Only compiled with the `glow-backend` feature. The host creates the
//! `glow::Context` from its windowing layer and hands it in; the core
//! stays unaware of surfaces. Each fallible call polls `glGetError` and
//! surfaces failures as [`GlError`].

#![allow(unsafe_code)]

use std::num::NonZeroU32;

use glow::HasContext;

use super::context::{
    AttributeType, BufferTarget, BufferUsage, CompressedFormat, DrawMode, GlContext, GlError, GlId,
    ImageTarget, IndexType, MagFilter, MinFilter, PixelFormat, PixelType, SamplerParams,
    TextureTarget, WrapMode,
};

// PVRTC and BGRA enums come from extensions and are absent from glow.
const COMPRESSED_RGB_PVRTC_4BPPV1_IMG: u32 = 0x8C00;
const COMPRESSED_RGB_PVRTC_2BPPV1_IMG: u32 = 0x8C01;
const COMPRESSED_RGBA_PVRTC_4BPPV1_IMG: u32 = 0x8C02;
const COMPRESSED_RGBA_PVRTC_2BPPV1_IMG: u32 = 0x8C03;
const BGRA_EXT: u32 = 0x80E1;

/// [`GlContext`] implementation backed by a live `glow::Context`.
pub struct GlowContext {
    gl: glow::Context,
    supports_pvrtc: bool,
    supports_bgra: bool,
}

impl GlowContext {
    /// Wrap a context created by the host windowing layer.
    pub fn new(gl: glow::Context) -> Self {
        let extensions = gl.supported_extensions();
        let supports_pvrtc = extensions.contains("GL_IMG_texture_compression_pvrtc");
        let supports_bgra = extensions.contains("GL_IMG_texture_format_BGRA8888")
            || extensions.contains("GL_APPLE_texture_format_BGRA8888")
            || extensions.contains("GL_EXT_texture_format_BGRA8888");
        Self {
            gl,
            supports_pvrtc,
            supports_bgra,
        }
    }

    /// The wrapped glow context.
    pub fn raw(&self) -> &glow::Context {
        &self.gl
    }

    fn check(&self, call: &'static str) -> Result<(), GlError> {
        let code = unsafe { self.gl.get_error() };
        if code == glow::NO_ERROR {
            Ok(())
        } else {
            Err(GlError { call, code })
        }
    }
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn buffer_usage(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::StaticDraw => glow::STATIC_DRAW,
        BufferUsage::DynamicDraw => glow::DYNAMIC_DRAW,
        BufferUsage::StreamDraw => glow::STREAM_DRAW,
    }
}

fn texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::TwoD => glow::TEXTURE_2D,
        TextureTarget::CubeMap => glow::TEXTURE_CUBE_MAP,
    }
}

fn image_target(target: ImageTarget) -> u32 {
    match target {
        ImageTarget::TwoD => glow::TEXTURE_2D,
        ImageTarget::CubeFace(face) => match face {
            super::context::CubeFace::PositiveX => glow::TEXTURE_CUBE_MAP_POSITIVE_X,
            super::context::CubeFace::NegativeX => glow::TEXTURE_CUBE_MAP_NEGATIVE_X,
            super::context::CubeFace::PositiveY => glow::TEXTURE_CUBE_MAP_POSITIVE_Y,
            super::context::CubeFace::NegativeY => glow::TEXTURE_CUBE_MAP_NEGATIVE_Y,
            super::context::CubeFace::PositiveZ => glow::TEXTURE_CUBE_MAP_POSITIVE_Z,
            super::context::CubeFace::NegativeZ => glow::TEXTURE_CUBE_MAP_NEGATIVE_Z,
        },
    }
}

fn pixel_format(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Rgba => glow::RGBA,
        PixelFormat::Rgb => glow::RGB,
        PixelFormat::Luminance => glow::LUMINANCE,
        PixelFormat::LuminanceAlpha => glow::LUMINANCE_ALPHA,
        PixelFormat::Alpha => glow::ALPHA,
        PixelFormat::Bgra => BGRA_EXT,
    }
}

fn pixel_type(ty: PixelType) -> u32 {
    match ty {
        PixelType::UnsignedByte => glow::UNSIGNED_BYTE,
        PixelType::UnsignedShort4444 => glow::UNSIGNED_SHORT_4_4_4_4,
        PixelType::UnsignedShort5551 => glow::UNSIGNED_SHORT_5_5_5_1,
        PixelType::UnsignedShort565 => glow::UNSIGNED_SHORT_5_6_5,
    }
}

fn compressed_format(format: CompressedFormat) -> u32 {
    match format {
        CompressedFormat::PvrtcRgb2 => COMPRESSED_RGB_PVRTC_2BPPV1_IMG,
        CompressedFormat::PvrtcRgba2 => COMPRESSED_RGBA_PVRTC_2BPPV1_IMG,
        CompressedFormat::PvrtcRgb4 => COMPRESSED_RGB_PVRTC_4BPPV1_IMG,
        CompressedFormat::PvrtcRgba4 => COMPRESSED_RGBA_PVRTC_4BPPV1_IMG,
    }
}

fn draw_mode(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Points => glow::POINTS,
        DrawMode::Lines => glow::LINES,
        DrawMode::LineStrip => glow::LINE_STRIP,
        DrawMode::LineLoop => glow::LINE_LOOP,
        DrawMode::Triangles => glow::TRIANGLES,
        DrawMode::TriangleStrip => glow::TRIANGLE_STRIP,
        DrawMode::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn attribute_type(ty: AttributeType) -> u32 {
    match ty {
        AttributeType::Float => glow::FLOAT,
        AttributeType::Fixed => 0x140C, // GL_FIXED
        AttributeType::Byte => glow::BYTE,
        AttributeType::UnsignedByte => glow::UNSIGNED_BYTE,
        AttributeType::Short => glow::SHORT,
        AttributeType::UnsignedShort => glow::UNSIGNED_SHORT,
    }
}

fn min_filter(filter: MinFilter) -> i32 {
    (match filter {
        MinFilter::Nearest => glow::NEAREST,
        MinFilter::Linear => glow::LINEAR,
        MinFilter::NearestMipmapNearest => glow::NEAREST_MIPMAP_NEAREST,
        MinFilter::LinearMipmapNearest => glow::LINEAR_MIPMAP_NEAREST,
        MinFilter::NearestMipmapLinear => glow::NEAREST_MIPMAP_LINEAR,
        MinFilter::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

fn mag_filter(filter: MagFilter) -> i32 {
    (match filter {
        MagFilter::Nearest => glow::NEAREST,
        MagFilter::Linear => glow::LINEAR,
    }) as i32
}

fn wrap_mode(mode: WrapMode) -> i32 {
    (match mode {
        WrapMode::Repeat => glow::REPEAT,
        WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT,
        WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
    }) as i32
}

fn buffer_id(id: GlId) -> Option<glow::NativeBuffer> {
    NonZeroU32::new(id).map(glow::NativeBuffer)
}

fn texture_id(id: GlId) -> Option<glow::NativeTexture> {
    NonZeroU32::new(id).map(glow::NativeTexture)
}

impl GlContext for GlowContext {
    fn create_buffer(&mut self) -> Result<GlId, GlError> {
        let buffer = unsafe { self.gl.create_buffer() }.map_err(|msg| {
            log::error!("glGenBuffers failed: {msg}");
            GlError {
                call: "glGenBuffers",
                code: glow::OUT_OF_MEMORY,
            }
        })?;
        Ok(buffer.0.get())
    }

    fn delete_buffer(&mut self, id: GlId) {
        if let Some(buffer) = buffer_id(id) {
            unsafe { self.gl.delete_buffer(buffer) };
        }
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: GlId) {
        unsafe { self.gl.bind_buffer(buffer_target(target), buffer_id(id)) };
    }

    fn buffer_data(
        &mut self,
        target: BufferTarget,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<(), GlError> {
        unsafe {
            self.gl
                .buffer_data_u8_slice(buffer_target(target), data, buffer_usage(usage));
        }
        self.check("glBufferData")
    }

    fn buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> Result<(), GlError> {
        unsafe {
            self.gl
                .buffer_sub_data_u8_slice(buffer_target(target), offset as i32, data);
        }
        self.check("glBufferSubData")
    }

    fn create_texture(&mut self) -> Result<GlId, GlError> {
        let texture = unsafe { self.gl.create_texture() }.map_err(|msg| {
            log::error!("glGenTextures failed: {msg}");
            GlError {
                call: "glGenTextures",
                code: glow::OUT_OF_MEMORY,
            }
        })?;
        Ok(texture.0.get())
    }

    fn delete_texture(&mut self, id: GlId) {
        if let Some(texture) = texture_id(id) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn bind_texture(&mut self, target: TextureTarget, id: GlId) {
        unsafe { self.gl.bind_texture(texture_target(target), texture_id(id)) };
    }

    fn tex_image_2d(
        &mut self,
        target: ImageTarget,
        level: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        data: Option<&[u8]>,
    ) -> Result<(), GlError> {
        let gl_format = pixel_format(format);
        unsafe {
            self.gl.tex_image_2d(
                image_target(target),
                level as i32,
                gl_format as i32,
                width as i32,
                height as i32,
                0,
                gl_format,
                pixel_type(ty),
                data,
            );
        }
        self.check("glTexImage2D")
    }

    fn compressed_tex_image_2d(
        &mut self,
        target: ImageTarget,
        level: u32,
        format: CompressedFormat,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<(), GlError> {
        unsafe {
            self.gl.compressed_tex_image_2d(
                image_target(target),
                level as i32,
                compressed_format(format) as i32,
                width as i32,
                height as i32,
                0,
                data.len() as i32,
                data,
            );
        }
        self.check("glCompressedTexImage2D")
    }

    fn tex_sub_image_2d(
        &mut self,
        target: ImageTarget,
        level: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        data: &[u8],
    ) -> Result<(), GlError> {
        unsafe {
            self.gl.tex_sub_image_2d(
                image_target(target),
                level as i32,
                x as i32,
                y as i32,
                width as i32,
                height as i32,
                pixel_format(format),
                pixel_type(ty),
                glow::PixelUnpackData::Slice(data),
            );
        }
        self.check("glTexSubImage2D")
    }

    fn tex_parameters(&mut self, target: TextureTarget, params: &SamplerParams) {
        let target = texture_target(target);
        unsafe {
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, min_filter(params.min_filter));
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, mag_filter(params.mag_filter));
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap_mode(params.wrap_s));
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap_mode(params.wrap_t));
        }
    }

    fn generate_mipmap(&mut self, target: TextureTarget) -> Result<(), GlError> {
        unsafe { self.gl.generate_mipmap(texture_target(target)) };
        self.check("glGenerateMipmap")
    }

    fn enable_vertex_attribute(&mut self, slot: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(slot) };
    }

    fn disable_vertex_attribute(&mut self, slot: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(slot) };
    }

    fn vertex_attribute_pointer(
        &mut self,
        slot: u32,
        components: u32,
        ty: AttributeType,
        normalized: bool,
        stride: usize,
        offset: usize,
    ) {
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                slot,
                components as i32,
                attribute_type(ty),
                normalized,
                stride as i32,
                offset as i32,
            );
        }
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: usize, count: usize) {
        unsafe {
            self.gl
                .draw_arrays(draw_mode(mode), first as i32, count as i32);
        }
    }

    fn draw_elements(&mut self, mode: DrawMode, count: usize, index_type: IndexType, offset: usize) {
        let ty = match index_type {
            IndexType::UnsignedByte => glow::UNSIGNED_BYTE,
            IndexType::UnsignedShort => glow::UNSIGNED_SHORT,
        };
        unsafe {
            self.gl
                .draw_elements(draw_mode(mode), count as i32, ty, offset as i32);
        }
    }

    fn supports_pvrtc(&self) -> bool {
        self.supports_pvrtc
    }

    fn supports_bgra(&self) -> bool {
        self.supports_bgra
    }
}
