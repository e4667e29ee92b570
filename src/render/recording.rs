//! Recording backend for tests
//!
//! Implements [`GlContext`] by appending every command to a log. Tests
//! assert on the log instead of needing a live GL context; the
//! "release redundant content then draw" law, for example, compares two
//! command streams for equality.

use super::context::{
    AttributeType, BufferTarget, BufferUsage, CompressedFormat, DrawMode, GlContext, GlError, GlId,
    ImageTarget, IndexType, PixelFormat, PixelType, SamplerParams, TextureTarget,
};

/// One recorded GL command.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCommand {
    /// A buffer was created
    CreateBuffer(GlId),
    /// A buffer was deleted
    DeleteBuffer(GlId),
    /// A buffer was bound
    BindBuffer(BufferTarget, GlId),
    /// A buffer store was allocated and filled
    BufferData(BufferTarget, Vec<u8>, BufferUsage),
    /// A buffer sub-range was updated
    BufferSubData(BufferTarget, usize, Vec<u8>),
    /// A texture was created
    CreateTexture(GlId),
    /// A texture was deleted
    DeleteTexture(GlId),
    /// A texture was bound
    BindTexture(TextureTarget, GlId),
    /// An uncompressed image level was uploaded
    TexImage2d {
        /// Upload target
        target: ImageTarget,
        /// Mip level
        level: u32,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Pixel format
        format: PixelFormat,
        /// Pixel packing
        pixel_type: PixelType,
        /// Pixel bytes, absent for storage-only allocation
        data: Option<Vec<u8>>,
    },
    /// A compressed image level was uploaded
    CompressedTexImage2d {
        /// Upload target
        target: ImageTarget,
        /// Mip level
        level: u32,
        /// Compressed format
        format: CompressedFormat,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Compressed byte count
        data_len: usize,
    },
    /// A rectangle of an image level was replaced
    TexSubImage2d {
        /// Upload target
        target: ImageTarget,
        /// Mip level
        level: u32,
        /// Rectangle origin x
        x: u32,
        /// Rectangle origin y
        y: u32,
        /// Rectangle width
        width: u32,
        /// Rectangle height
        height: u32,
        /// Pixel format
        format: PixelFormat,
        /// Pixel packing
        pixel_type: PixelType,
        /// Pixel bytes
        data: Vec<u8>,
    },
    /// Sampler parameters were flushed
    TexParameters(TextureTarget, SamplerParams),
    /// Mipmaps were generated
    GenerateMipmap(TextureTarget),
    /// An attribute slot was enabled
    EnableAttribute(u32),
    /// An attribute slot was disabled
    DisableAttribute(u32),
    /// An attribute pointer was set
    AttributePointer {
        /// Attribute slot
        slot: u32,
        /// Components per vertex
        components: u32,
        /// Component type
        attribute_type: AttributeType,
        /// Whether integer data is normalized
        normalized: bool,
        /// Byte stride between vertices
        stride: usize,
        /// Byte offset of the first component
        offset: usize,
    },
    /// A non-indexed draw was issued
    DrawArrays(DrawMode, usize, usize),
    /// An indexed draw was issued
    DrawElements(DrawMode, usize, IndexType, usize),
}

/// A [`GlContext`] that records commands instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct RecordingContext {
    /// The recorded command log, in issue order.
    pub commands: Vec<GlCommand>,
    next_id: GlId,
    /// Report PVRTC support (default true).
    pub pvrtc_supported: bool,
    /// Report BGRA support (default true).
    pub bgra_supported: bool,
    /// When set, the next create/upload call fails with this error.
    pub inject_failure: Option<GlError>,
}

impl RecordingContext {
    /// Create a recording context reporting full capability support.
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            next_id: 0,
            pvrtc_supported: true,
            bgra_supported: true,
            inject_failure: None,
        }
    }

    /// Drop the recorded log, keeping id allocation state.
    pub fn clear_log(&mut self) {
        self.commands.clear();
    }

    /// Count recorded draw calls.
    pub fn draw_call_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GlCommand::DrawArrays(..) | GlCommand::DrawElements(..)))
            .count()
    }

    fn take_failure(&mut self) -> Result<(), GlError> {
        match self.inject_failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl GlContext for RecordingContext {
    fn create_buffer(&mut self) -> Result<GlId, GlError> {
        self.take_failure()?;
        self.next_id += 1;
        self.commands.push(GlCommand::CreateBuffer(self.next_id));
        Ok(self.next_id)
    }

    fn delete_buffer(&mut self, id: GlId) {
        self.commands.push(GlCommand::DeleteBuffer(id));
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: GlId) {
        self.commands.push(GlCommand::BindBuffer(target, id));
    }

    fn buffer_data(
        &mut self,
        target: BufferTarget,
        data: &[u8],
        usage: BufferUsage,
    ) -> Result<(), GlError> {
        self.take_failure()?;
        self.commands
            .push(GlCommand::BufferData(target, data.to_vec(), usage));
        Ok(())
    }

    fn buffer_sub_data(
        &mut self,
        target: BufferTarget,
        offset: usize,
        data: &[u8],
    ) -> Result<(), GlError> {
        self.take_failure()?;
        self.commands
            .push(GlCommand::BufferSubData(target, offset, data.to_vec()));
        Ok(())
    }

    fn create_texture(&mut self) -> Result<GlId, GlError> {
        self.take_failure()?;
        self.next_id += 1;
        self.commands.push(GlCommand::CreateTexture(self.next_id));
        Ok(self.next_id)
    }

    fn delete_texture(&mut self, id: GlId) {
        self.commands.push(GlCommand::DeleteTexture(id));
    }

    fn bind_texture(&mut self, target: TextureTarget, id: GlId) {
        self.commands.push(GlCommand::BindTexture(target, id));
    }

    fn tex_image_2d(
        &mut self,
        target: ImageTarget,
        level: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixel_type: PixelType,
        data: Option<&[u8]>,
    ) -> Result<(), GlError> {
        self.take_failure()?;
        self.commands.push(GlCommand::TexImage2d {
            target,
            level,
            width,
            height,
            format,
            pixel_type,
            data: data.map(<[u8]>::to_vec),
        });
        Ok(())
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
        self.take_failure()?;
        self.commands.push(GlCommand::CompressedTexImage2d {
            target,
            level,
            format,
            width,
            height,
            data_len: data.len(),
        });
        Ok(())
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
        pixel_type: PixelType,
        data: &[u8],
    ) -> Result<(), GlError> {
        self.take_failure()?;
        self.commands.push(GlCommand::TexSubImage2d {
            target,
            level,
            x,
            y,
            width,
            height,
            format,
            pixel_type,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn tex_parameters(&mut self, target: TextureTarget, params: &SamplerParams) {
        self.commands.push(GlCommand::TexParameters(target, *params));
    }

    fn generate_mipmap(&mut self, target: TextureTarget) -> Result<(), GlError> {
        self.take_failure()?;
        self.commands.push(GlCommand::GenerateMipmap(target));
        Ok(())
    }

    fn enable_vertex_attribute(&mut self, slot: u32) {
        self.commands.push(GlCommand::EnableAttribute(slot));
    }

    fn disable_vertex_attribute(&mut self, slot: u32) {
        self.commands.push(GlCommand::DisableAttribute(slot));
    }

    fn vertex_attribute_pointer(
        &mut self,
        slot: u32,
        components: u32,
        attribute_type: AttributeType,
        normalized: bool,
        stride: usize,
        offset: usize,
    ) {
        self.commands.push(GlCommand::AttributePointer {
            slot,
            components,
            attribute_type,
            normalized,
            stride,
            offset,
        });
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: usize, count: usize) {
        self.commands.push(GlCommand::DrawArrays(mode, first, count));
    }

    fn draw_elements(
        &mut self,
        mode: DrawMode,
        count: usize,
        index_type: IndexType,
        offset: usize,
    ) {
        self.commands
            .push(GlCommand::DrawElements(mode, count, index_type, offset));
    }

    fn supports_pvrtc(&self) -> bool {
        self.pvrtc_supported
    }

    fn supports_bgra(&self) -> bool {
        self.bgra_supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_commands_in_issue_order() {
        let mut ctx = RecordingContext::new();
        let id = ctx.create_buffer().unwrap();
        ctx.bind_buffer(BufferTarget::Array, id);
        ctx.buffer_data(BufferTarget::Array, &[1, 2, 3], BufferUsage::StaticDraw)
            .unwrap();
        assert_eq!(ctx.commands.len(), 3);
        assert_eq!(ctx.commands[0], GlCommand::CreateBuffer(id));
        assert_eq!(ctx.draw_call_count(), 0);
    }

    #[test]
    fn injected_failure_fails_next_call_only() {
        let mut ctx = RecordingContext::new();
        ctx.inject_failure = Some(GlError {
            call: "glBufferData",
            code: 0x0505,
        });
        assert!(ctx
            .buffer_data(BufferTarget::Array, &[0], BufferUsage::StaticDraw)
            .is_err());
        assert!(ctx
            .buffer_data(BufferTarget::Array, &[0], BufferUsage::StaticDraw)
            .is_ok());
    }
}
