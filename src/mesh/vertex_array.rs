//! Typed vertex attribute streams
//!
//! A [`VertexArray`] describes one attribute stream of a mesh: what it
//! represents, how its components are typed and packed, and where its
//! bytes live. When a mesh interleaves its vertices, every stream shares
//! the mesh's single backing buffer and differs only in byte offset; a
//! non-interleaved stream owns its bytes directly.

use bitflags::bitflags;

use crate::render::{AttributeType, BufferTarget, BufferUsage, GlContext, GlId, GlStateCache};

use super::MeshError;

bitflags! {
    /// The vertex streams a mesh carries, used by content declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VertexContent: u32 {
        /// Vertex locations (always required)
        const LOCATION = 1 << 0;
        /// Vertex normals
        const NORMAL = 1 << 1;
        /// Vertex tangents
        const TANGENT = 1 << 2;
        /// Vertex bitangents
        const BITANGENT = 1 << 3;
        /// Per-vertex colors
        const COLOR = 1 << 4;
        /// First texture coordinate set
        const TEXCOORD = 1 << 5;
        /// Per-vertex point sizes
        const POINT_SIZE = 1 << 6;
        /// Bone weights for skinning
        const BONE_WEIGHTS = 1 << 7;
        /// Bone indices for skinning
        const BONE_INDICES = 1 << 8;
    }
}

/// Component types a vertex stream may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// 32-bit float
    Float,
    /// 16.16 fixed point
    Fixed,
    /// Signed byte
    Byte,
    /// Unsigned byte
    UnsignedByte,
    /// Signed 16-bit
    Short,
    /// Unsigned 16-bit
    UnsignedShort,
}

impl ElementType {
    /// Bytes per component.
    pub fn size_bytes(self) -> usize {
        match self {
            ElementType::Byte | ElementType::UnsignedByte => 1,
            ElementType::Short | ElementType::UnsignedShort => 2,
            ElementType::Float | ElementType::Fixed => 4,
        }
    }

    /// The GL attribute type for this element type.
    pub fn attribute_type(self) -> AttributeType {
        match self {
            ElementType::Float => AttributeType::Float,
            ElementType::Fixed => AttributeType::Fixed,
            ElementType::Byte => AttributeType::Byte,
            ElementType::UnsignedByte => AttributeType::UnsignedByte,
            ElementType::Short => AttributeType::Short,
            ElementType::UnsignedShort => AttributeType::UnsignedShort,
        }
    }
}

/// What a vertex stream represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSemantic {
    /// Vertex locations
    Location,
    /// Vertex normals
    Normal,
    /// Vertex tangents
    Tangent,
    /// Vertex bitangents
    Bitangent,
    /// Per-vertex colors
    Color,
    /// Texture coordinates, by set index
    TexCoord(u32),
    /// Per-vertex point size
    PointSize,
    /// Bone weights
    BoneWeights,
    /// Bone indices
    BoneIndices,
    /// Drawing indices (element array)
    Index,
}

impl VertexSemantic {
    /// The vertex attribute slot this semantic binds to.
    ///
    /// Texture coordinate sets occupy slots 8 and up, so the fixed
    /// semantics keep stable slots regardless of how many sets exist.
    pub fn attribute_slot(self) -> u32 {
        match self {
            VertexSemantic::Location => 0,
            VertexSemantic::Normal => 1,
            VertexSemantic::Tangent => 2,
            VertexSemantic::Bitangent => 3,
            VertexSemantic::Color => 4,
            VertexSemantic::PointSize => 5,
            VertexSemantic::BoneWeights => 6,
            VertexSemantic::BoneIndices => 7,
            VertexSemantic::TexCoord(set) => 8 + set,
            VertexSemantic::Index => u32::MAX, // Never bound as an attribute.
        }
    }

    /// Whether integer components are normalized when bound (colors map
    /// 0..255 to 0..1; bone indices do not).
    pub fn is_normalized(self) -> bool {
        matches!(self, VertexSemantic::Color)
    }

    /// The GL buffer target for this stream.
    pub fn buffer_target(self) -> BufferTarget {
        if self == VertexSemantic::Index {
            BufferTarget::ElementArray
        } else {
            BufferTarget::Array
        }
    }
}

/// Where a stream's CPU-side bytes live.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexStorage {
    /// The stream owns its bytes.
    Owned(Vec<u8>),
    /// The bytes live in the mesh's shared interleaved buffer.
    Interleaved,
    /// CPU bytes were released after a successful GPU upload.
    Released,
}

/// One typed vertex attribute stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexArray {
    /// What the stream represents
    pub semantic: VertexSemantic,
    /// Component type
    pub element_type: ElementType,
    /// Components per vertex
    pub element_size: usize,
    /// Bytes between consecutive vertices in the backing buffer
    pub stride: usize,
    /// Byte offset of this stream's first component within a vertex
    pub offset: usize,
    storage: VertexStorage,
    gl_buffer: GlId,
    /// Keep CPU bytes after a GPU upload. Default false.
    pub retain_contents: bool,
    /// GL usage hint for buffer allocation.
    pub buffer_usage: BufferUsage,
}

impl VertexArray {
    /// Create a stream that owns its storage, tightly packed.
    pub fn new(semantic: VertexSemantic, element_type: ElementType, element_size: usize) -> Self {
        let stride = element_type.size_bytes() * element_size;
        Self {
            semantic,
            element_type,
            element_size,
            stride,
            offset: 0,
            storage: VertexStorage::Owned(Vec::new()),
            gl_buffer: 0,
            retain_contents: false,
            buffer_usage: BufferUsage::default(),
        }
    }

    /// Create a stream that views the mesh's interleaved buffer at
    /// `offset` with the mesh-wide `stride`.
    pub fn new_interleaved(
        semantic: VertexSemantic,
        element_type: ElementType,
        element_size: usize,
        stride: usize,
        offset: usize,
    ) -> Self {
        Self {
            semantic,
            element_type,
            element_size,
            stride,
            offset,
            storage: VertexStorage::Interleaved,
            gl_buffer: 0,
            retain_contents: false,
            buffer_usage: BufferUsage::default(),
        }
    }

    /// Bytes of one packed element (components only, no padding).
    pub fn element_bytes(&self) -> usize {
        self.element_type.size_bytes() * self.element_size
    }

    /// Whether this stream shares the mesh's interleaved buffer.
    pub fn is_interleaved(&self) -> bool {
        matches!(self.storage, VertexStorage::Interleaved)
    }

    /// Whether CPU-side bytes are still available.
    pub fn has_cpu_content(&self) -> bool {
        !matches!(self.storage, VertexStorage::Released)
    }

    /// The GPU buffer backing this stream (0 when unbuffered).
    pub fn gl_buffer(&self) -> GlId {
        self.gl_buffer
    }

    /// Resize owned storage to hold `capacity` vertices, preserving
    /// existing bytes up to the smaller size. No-op for interleaved
    /// streams (the mesh resizes the shared buffer).
    pub fn allocate(&mut self, capacity: usize) -> Result<(), MeshError> {
        if let VertexStorage::Owned(bytes) = &mut self.storage {
            let new_len = capacity * self.stride;
            if new_len > bytes.len() {
                bytes
                    .try_reserve_exact(new_len - bytes.len())
                    .map_err(|_| MeshError::CapacityExhausted {
                        requested: new_len,
                    })?;
            }
            bytes.resize(new_len, 0);
        }
        Ok(())
    }

    /// Byte range of vertex `index` within the given backing slice.
    fn element_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = index * self.stride + self.offset;
        start..start + self.element_bytes()
    }

    /// Read the packed bytes of vertex `index`.
    ///
    /// `shared` is the mesh's interleaved buffer, ignored for owned
    /// storage. Returns `None` once CPU content has been released.
    pub fn element<'a>(&'a self, shared: Option<&'a [u8]>, index: usize) -> Option<&'a [u8]> {
        let buf: &[u8] = match &self.storage {
            VertexStorage::Owned(bytes) => bytes,
            VertexStorage::Interleaved => shared?,
            VertexStorage::Released => return None,
        };
        buf.get(self.element_range(index))
    }

    /// Write the packed bytes of vertex `index`.
    pub fn set_element(
        &mut self,
        shared: Option<&mut Vec<u8>>,
        index: usize,
        bytes: &[u8],
    ) -> Result<(), MeshError> {
        debug_assert_eq!(bytes.len(), self.element_bytes());
        let range = self.element_range(index);
        let buf: &mut Vec<u8> = match &mut self.storage {
            VertexStorage::Owned(owned) => owned,
            VertexStorage::Interleaved => shared.ok_or(MeshError::ContentReleased)?,
            VertexStorage::Released => return Err(MeshError::ContentReleased),
        };
        let count = if self.stride == 0 { 0 } else { buf.len() / self.stride };
        let slot = buf
            .get_mut(range)
            .ok_or(MeshError::IndexOutOfRange { index, count })?;
        slot.copy_from_slice(bytes);
        Ok(())
    }

    /// The full owned byte buffer, when present.
    pub fn owned_bytes(&self) -> Option<&[u8]> {
        match &self.storage {
            VertexStorage::Owned(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Mutable access to the full owned byte buffer, when present.
    pub fn owned_bytes_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.storage {
            VertexStorage::Owned(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Upload owned content to a new GPU buffer. Interleaved streams are
    /// uploaded by the mesh instead; they only adopt the shared id here.
    pub fn create_gl_buffer(
        &mut self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        vertex_count: usize,
    ) -> Result<(), MeshError> {
        let VertexStorage::Owned(bytes) = &self.storage else {
            return Ok(());
        };
        let upload_len = (vertex_count * self.stride).min(bytes.len());
        let id = ctx.create_buffer()?;
        let target = self.semantic.buffer_target();
        state.bind_buffer(ctx, target, id);
        if let Err(err) = ctx.buffer_data(target, &bytes[..upload_len], self.buffer_usage) {
            ctx.delete_buffer(id);
            state.forget_buffer(id);
            return Err(err.into());
        }
        self.gl_buffer = id;
        Ok(())
    }

    /// Adopt a GPU buffer created by the mesh (interleaved upload).
    pub fn adopt_gl_buffer(&mut self, id: GlId) {
        self.gl_buffer = id;
    }

    /// Release the GPU buffer, keeping CPU content.
    pub fn delete_gl_buffer(&mut self, ctx: &mut dyn GlContext, state: &mut GlStateCache) {
        if self.gl_buffer != 0 {
            // Interleaved streams share one buffer; the mesh deletes it once.
            if !self.is_interleaved() {
                ctx.delete_buffer(self.gl_buffer);
            }
            state.forget_buffer(self.gl_buffer);
            self.gl_buffer = 0;
        }
    }

    /// Re-upload a vertex sub-range of owned content to the GPU buffer.
    pub fn update_gl_buffer_range(
        &mut self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        first_vertex: usize,
        vertex_count: usize,
    ) -> Result<(), MeshError> {
        if self.gl_buffer == 0 {
            return Err(MeshError::NotBuffered);
        }
        let VertexStorage::Owned(bytes) = &self.storage else {
            return Err(MeshError::ContentReleased);
        };
        let start = first_vertex * self.stride;
        let end = (start + vertex_count * self.stride).min(bytes.len());
        if start >= end {
            return Ok(());
        }
        let target = self.semantic.buffer_target();
        state.bind_buffer(ctx, target, self.gl_buffer);
        ctx.buffer_sub_data(target, start, &bytes[start..end])?;
        Ok(())
    }

    /// Drop CPU bytes if this stream was uploaded and retention is off.
    pub fn release_redundant_content(&mut self) {
        if self.gl_buffer != 0 && !self.retain_contents {
            if let VertexStorage::Owned(bytes) = &mut self.storage {
                log::trace!(
                    "releasing {} CPU bytes of {:?} stream after GPU upload",
                    bytes.len(),
                    self.semantic
                );
            }
            if !self.is_interleaved() {
                self.storage = VertexStorage::Released;
            }
        }
    }

    /// Mark interleaved content released (driven by the mesh, which owns
    /// the shared buffer).
    pub fn mark_released(&mut self) {
        self.storage = VertexStorage::Released;
    }

    /// Bind this stream's attribute pointer for drawing.
    pub fn bind_attribute(
        &self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
    ) -> Result<(), MeshError> {
        if self.gl_buffer == 0 {
            return Err(MeshError::NotBuffered);
        }
        state.bind_buffer(ctx, BufferTarget::Array, self.gl_buffer);
        ctx.vertex_attribute_pointer(
            self.semantic.attribute_slot(),
            self.element_size as u32,
            self.element_type.attribute_type(),
            self.semantic.is_normalized(),
            self.stride,
            self.offset,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingContext;

    #[test]
    fn packed_stride_matches_element_bytes() {
        let va = VertexArray::new(VertexSemantic::Location, ElementType::Float, 3);
        assert_eq!(va.stride, 12);
        assert_eq!(va.element_bytes(), 12);
    }

    #[test]
    fn allocate_preserves_existing_bytes() {
        let mut va = VertexArray::new(VertexSemantic::Location, ElementType::UnsignedByte, 4);
        va.allocate(2).unwrap();
        va.set_element(None, 0, &[1, 2, 3, 4]).unwrap();
        va.allocate(8).unwrap();
        assert_eq!(va.element(None, 0).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn released_stream_yields_no_elements() {
        let mut va = VertexArray::new(VertexSemantic::Normal, ElementType::Float, 3);
        va.allocate(1).unwrap();
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        va.create_gl_buffer(&mut ctx, &mut state, 1).unwrap();
        va.release_redundant_content();
        assert!(va.element(None, 0).is_none());
        assert!(!va.has_cpu_content());
    }

    #[test]
    fn retained_stream_survives_release() {
        let mut va = VertexArray::new(VertexSemantic::Normal, ElementType::Float, 3);
        va.retain_contents = true;
        va.allocate(1).unwrap();
        let mut ctx = RecordingContext::new();
        let mut state = GlStateCache::new();
        va.create_gl_buffer(&mut ctx, &mut state, 1).unwrap();
        va.release_redundant_content();
        assert!(va.has_cpu_content());
    }

    #[test]
    fn interleaved_reads_go_through_shared_buffer() {
        let va = VertexArray::new_interleaved(VertexSemantic::Normal, ElementType::Float, 3, 24, 12);
        let mut shared = vec![0u8; 48];
        shared[12..24].copy_from_slice(&[1.0f32, 2.0, 3.0].map(f32::to_le_bytes).concat());
        let bytes = va.element(Some(&shared), 0).unwrap();
        assert_eq!(bytes.len(), 12);
        assert_eq!(f32::from_le_bytes(bytes[0..4].try_into().unwrap()), 1.0);
    }
}
