//! Mesh aggregate
//!
//! A mesh owns a set of typed vertex streams (locations required, all
//! others optional), optional drawing indices, and the CPU/GPU storage
//! behind them. Vertex capacity grows by a configurable factor; GPU
//! buffers are created on request and CPU copies may be released per
//! stream afterwards. Per-vertex accessors work transparently across
//! interleaved and separate storage.

use crate::foundation::ident::Identity;
use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::render::{BufferTarget, BufferUsage, DrawMode, GlContext, GlId, GlStateCache, IndexType};

use super::faces::FaceArray;
use super::vertex_array::{ElementType, VertexArray, VertexContent, VertexSemantic};
use super::MeshError;

/// Read component `k` of a packed element as f32, converting from the
/// stream's element type.
pub(super) fn read_component(bytes: &[u8], ty: ElementType, k: usize) -> f32 {
    // Element slices into the interleaved buffer carry no alignment
    // guarantee, hence the unaligned reads.
    match ty {
        ElementType::Float => bytemuck::pod_read_unaligned(&bytes[k * 4..k * 4 + 4]),
        ElementType::Fixed => {
            bytemuck::pod_read_unaligned::<i32>(&bytes[k * 4..k * 4 + 4]) as f32 / 65536.0
        }
        ElementType::Byte => bytes[k] as i8 as f32,
        ElementType::UnsignedByte => bytes[k] as f32,
        ElementType::Short => {
            bytemuck::pod_read_unaligned::<i16>(&bytes[k * 2..k * 2 + 2]) as f32
        }
        ElementType::UnsignedShort => {
            bytemuck::pod_read_unaligned::<u16>(&bytes[k * 2..k * 2 + 2]) as f32
        }
    }
}

/// Write component `k` of a packed element from f32, converting to the
/// stream's element type.
pub(super) fn write_component(bytes: &mut [u8], ty: ElementType, k: usize, value: f32) {
    match ty {
        ElementType::Float => {
            bytes[k * 4..k * 4 + 4].copy_from_slice(bytemuck::bytes_of(&value));
        }
        ElementType::Fixed => {
            bytes[k * 4..k * 4 + 4].copy_from_slice(bytemuck::bytes_of(&((value * 65536.0) as i32)));
        }
        ElementType::Byte => bytes[k] = value as i8 as u8,
        ElementType::UnsignedByte => bytes[k] = value as u8,
        ElementType::Short => {
            bytes[k * 2..k * 2 + 2].copy_from_slice(bytemuck::bytes_of(&(value as i16)));
        }
        ElementType::UnsignedShort => {
            bytes[k * 2..k * 2 + 2].copy_from_slice(bytemuck::bytes_of(&(value as u16)));
        }
    }
}

/// The canonical stream order for content declaration and interleaving.
const CANONICAL_ORDER: [VertexSemantic; 9] = [
    VertexSemantic::Location,
    VertexSemantic::Normal,
    VertexSemantic::Tangent,
    VertexSemantic::Bitangent,
    VertexSemantic::Color,
    VertexSemantic::TexCoord(0),
    VertexSemantic::PointSize,
    VertexSemantic::BoneWeights,
    VertexSemantic::BoneIndices,
];

fn default_stream(semantic: VertexSemantic) -> VertexArray {
    let (ty, size) = match semantic {
        VertexSemantic::Location
        | VertexSemantic::Normal
        | VertexSemantic::Tangent
        | VertexSemantic::Bitangent => (ElementType::Float, 3),
        VertexSemantic::Color => (ElementType::UnsignedByte, 4),
        VertexSemantic::TexCoord(_) => (ElementType::Float, 2),
        VertexSemantic::PointSize => (ElementType::Float, 1),
        // Bone streams start with no influences; the loader declares the
        // per-vertex bone count before capacity is allocated.
        VertexSemantic::BoneWeights => (ElementType::Float, 0),
        VertexSemantic::BoneIndices => (ElementType::UnsignedByte, 0),
        VertexSemantic::Index => (ElementType::UnsignedShort, 1),
    };
    VertexArray::new(semantic, ty, size)
}

/// A mesh: named vertex streams, optional indices, and face queries.
#[derive(Debug)]
pub struct Mesh {
    /// Tag and optional name
    pub identity: Identity,
    /// Primitive assembly mode
    pub drawing_mode: DrawMode,
    /// Interleave all attribute streams into one backing buffer
    pub should_interleave_vertices: bool,
    /// Cache face centers/normals/planes/neighbours on first access
    pub should_cache_faces: bool,
    /// Growth factor applied by `ensure_vertex_capacity`
    pub capacity_expansion_factor: f32,

    streams: Vec<VertexArray>,
    indices: Option<VertexArray>,
    interleaved: Option<Vec<u8>>,
    interleaved_gl_buffer: GlId,
    allocated_vertex_capacity: usize,
    vertex_count: usize,
    allocated_vertex_index_capacity: usize,
    vertex_index_count: usize,
    pub(super) faces: FaceArray,
    gpu_state_valid: bool,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

impl Mesh {
    /// Create an empty, anonymous mesh.
    pub fn new() -> Self {
        Self {
            identity: Identity::new(),
            drawing_mode: DrawMode::Triangles,
            should_interleave_vertices: false,
            should_cache_faces: false,
            capacity_expansion_factor: 1.25,
            streams: Vec::new(),
            indices: None,
            interleaved: None,
            interleaved_gl_buffer: 0,
            allocated_vertex_capacity: 0,
            vertex_count: 0,
            allocated_vertex_index_capacity: 0,
            vertex_index_count: 0,
            faces: FaceArray::default(),
            gpu_state_valid: true,
        }
    }

    /// Create an empty named mesh.
    pub fn named(name: impl Into<String>) -> Self {
        let mut mesh = Self::new();
        mesh.identity = Identity::named(name);
        mesh
    }

    // --- content declaration ---

    /// Declare which vertex streams this mesh carries.
    ///
    /// Allocates zero-length streams in the canonical order (location,
    /// normal, tangent, bitangent, color, texture coordinates, point
    /// size, bone weights, bone indices) and, when interleaving, computes
    /// the shared stride and per-stream offsets. Replaces any existing
    /// streams and invalidates face caches.
    pub fn set_vertex_content(&mut self, content: VertexContent) {
        self.streams.clear();
        self.interleaved = None;
        self.allocated_vertex_capacity = 0;
        self.vertex_count = 0;
        self.faces.invalidate();
        for semantic in CANONICAL_ORDER {
            let flag = match semantic {
                VertexSemantic::Location => VertexContent::LOCATION,
                VertexSemantic::Normal => VertexContent::NORMAL,
                VertexSemantic::Tangent => VertexContent::TANGENT,
                VertexSemantic::Bitangent => VertexContent::BITANGENT,
                VertexSemantic::Color => VertexContent::COLOR,
                VertexSemantic::TexCoord(_) => VertexContent::TEXCOORD,
                VertexSemantic::PointSize => VertexContent::POINT_SIZE,
                VertexSemantic::BoneWeights => VertexContent::BONE_WEIGHTS,
                VertexSemantic::BoneIndices => VertexContent::BONE_INDICES,
                VertexSemantic::Index => continue,
            };
            if content.contains(flag) {
                self.streams.push(default_stream(semantic));
            }
        }
        if self.should_interleave_vertices {
            self.recompute_interleaved_layout();
        }
    }

    /// The declared content as a bitmask.
    pub fn vertex_content(&self) -> VertexContent {
        let mut content = VertexContent::empty();
        for s in &self.streams {
            content |= match s.semantic {
                VertexSemantic::Location => VertexContent::LOCATION,
                VertexSemantic::Normal => VertexContent::NORMAL,
                VertexSemantic::Tangent => VertexContent::TANGENT,
                VertexSemantic::Bitangent => VertexContent::BITANGENT,
                VertexSemantic::Color => VertexContent::COLOR,
                VertexSemantic::TexCoord(_) => VertexContent::TEXCOORD,
                VertexSemantic::PointSize => VertexContent::POINT_SIZE,
                VertexSemantic::BoneWeights => VertexContent::BONE_WEIGHTS,
                VertexSemantic::BoneIndices => VertexContent::BONE_INDICES,
                VertexSemantic::Index => VertexContent::empty(),
            };
        }
        content
    }

    /// Add another texture coordinate set beyond the first.
    pub fn add_texture_coordinate_set(&mut self) -> u32 {
        let set = self
            .streams
            .iter()
            .filter(|s| matches!(s.semantic, VertexSemantic::TexCoord(_)))
            .count() as u32;
        self.streams
            .push(default_stream(VertexSemantic::TexCoord(set)));
        if self.should_interleave_vertices {
            self.recompute_interleaved_layout();
        }
        set
    }

    /// Declare the number of bone influences per vertex.
    ///
    /// Both the weight and index streams must exist and always share the
    /// same element size. Call before allocating vertex capacity.
    pub fn set_vertex_bone_count(&mut self, influences: usize) -> Result<(), MeshError> {
        let has_weights = self.stream(VertexSemantic::BoneWeights).is_some();
        let has_indices = self.stream(VertexSemantic::BoneIndices).is_some();
        if !has_weights {
            return Err(MeshError::MissingStream(VertexSemantic::BoneWeights));
        }
        if !has_indices {
            return Err(MeshError::MissingStream(VertexSemantic::BoneIndices));
        }
        for s in &mut self.streams {
            if matches!(
                s.semantic,
                VertexSemantic::BoneWeights | VertexSemantic::BoneIndices
            ) {
                s.element_size = influences;
                if !s.is_interleaved() {
                    s.stride = s.element_bytes();
                }
            }
        }
        if self.should_interleave_vertices {
            self.recompute_interleaved_layout();
        }
        Ok(())
    }

    /// Bone influences per vertex (0 when the mesh is not skinned).
    pub fn vertex_bone_count(&self) -> usize {
        self.stream(VertexSemantic::BoneWeights)
            .map_or(0, |s| s.element_size)
    }

    /// Validate the bone-stream invariant.
    pub fn check_bone_streams(&self) -> Result<(), MeshError> {
        if let (Some(w), Some(i)) = (
            self.stream(VertexSemantic::BoneWeights),
            self.stream(VertexSemantic::BoneIndices),
        ) {
            if w.element_size != i.element_size {
                return Err(MeshError::BoneInfluenceMismatch {
                    weights: w.element_size,
                    indices: i.element_size,
                });
            }
        }
        Ok(())
    }

    fn recompute_interleaved_layout(&mut self) {
        let stride: usize = self.streams.iter().map(VertexArray::element_bytes).sum();
        let mut offset = 0;
        for s in &mut self.streams {
            let (semantic, ty, size) = (s.semantic, s.element_type, s.element_size);
            *s = VertexArray::new_interleaved(semantic, ty, size, stride, offset);
            offset += s.element_bytes();
        }
    }

    /// The stream for a semantic, if declared.
    pub fn stream(&self, semantic: VertexSemantic) -> Option<&VertexArray> {
        self.streams.iter().find(|s| s.semantic == semantic)
    }

    /// Mutable access to the stream for a semantic, if declared.
    pub fn stream_mut(&mut self, semantic: VertexSemantic) -> Option<&mut VertexArray> {
        self.streams.iter_mut().find(|s| s.semantic == semantic)
    }

    /// All attribute streams in canonical order.
    pub fn streams(&self) -> &[VertexArray] {
        &self.streams
    }

    /// The index stream, if any.
    pub fn index_stream(&self) -> Option<&VertexArray> {
        self.indices.as_ref()
    }

    /// The shared interleaved stride, when interleaving (0 otherwise).
    pub fn interleaved_stride(&self) -> usize {
        if self.should_interleave_vertices {
            self.streams.first().map_or(0, |s| s.stride)
        } else {
            0
        }
    }

    /// Raw bytes of the interleaved backing buffer, when present.
    pub fn interleaved_content(&self) -> Option<&[u8]> {
        self.interleaved.as_deref()
    }

    // --- capacity management ---

    /// Allocated vertex capacity.
    pub fn allocated_vertex_capacity(&self) -> usize {
        self.allocated_vertex_capacity
    }

    /// The number of vertices the mesh currently uses.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Set the in-use vertex count, clamped to the allocated capacity.
    pub fn set_vertex_count(&mut self, count: usize) {
        self.vertex_count = count.min(self.allocated_vertex_capacity);
        self.faces.invalidate();
    }

    /// Grow or shrink CPU storage to hold `capacity` vertices.
    ///
    /// Existing contents up to the smaller of old and new capacity are
    /// preserved; the new region is undefined. `vertex_count` is clamped
    /// to the new capacity. Fails with `CapacityExhausted` without
    /// mutating anything when the allocation cannot be made.
    pub fn set_allocated_vertex_capacity(&mut self, capacity: usize) -> Result<(), MeshError> {
        if self.should_interleave_vertices {
            let stride = self.interleaved_stride();
            let new_len = capacity * stride;
            let buf = self.interleaved.get_or_insert_with(Vec::new);
            if new_len > buf.len() {
                buf.try_reserve_exact(new_len - buf.len()).map_err(|_| {
                    MeshError::CapacityExhausted { requested: new_len }
                })?;
            }
            buf.resize(new_len, 0);
        } else {
            for s in &mut self.streams {
                s.allocate(capacity)?;
            }
        }
        self.allocated_vertex_capacity = capacity;
        self.vertex_count = self.vertex_count.min(capacity);
        Ok(())
    }

    /// Expand capacity to at least `needed` vertices, applying the
    /// expansion factor on growth. Returns whether a reallocation
    /// occurred, so callers know to rebuild GPU buffers.
    pub fn ensure_vertex_capacity(&mut self, needed: usize) -> Result<bool, MeshError> {
        if needed <= self.allocated_vertex_capacity {
            return Ok(false);
        }
        let grown = (needed as f32 * self.capacity_expansion_factor).ceil() as usize;
        self.set_allocated_vertex_capacity(grown.max(needed))?;
        log::debug!(
            "mesh {} expanded vertex capacity to {}",
            self.identity.tag,
            self.allocated_vertex_capacity
        );
        Ok(true)
    }

    /// Allocated index capacity.
    pub fn allocated_vertex_index_capacity(&self) -> usize {
        self.allocated_vertex_index_capacity
    }

    /// The number of drawing indices currently in use.
    pub fn vertex_index_count(&self) -> usize {
        self.vertex_index_count
    }

    /// Set the in-use index count, clamped to the allocated capacity.
    pub fn set_vertex_index_count(&mut self, count: usize) {
        self.vertex_index_count = count.min(self.allocated_vertex_index_capacity);
        self.faces.invalidate();
    }

    /// Allocate storage for drawing indices of the given width
    /// (`UnsignedByte` or `UnsignedShort`).
    pub fn set_allocated_vertex_index_capacity(
        &mut self,
        capacity: usize,
        element_type: ElementType,
    ) -> Result<(), MeshError> {
        let mut stream = match self.indices.take() {
            Some(existing) if existing.element_type == element_type => existing,
            _ => VertexArray::new(VertexSemantic::Index, element_type, 1),
        };
        stream.allocate(capacity)?;
        self.indices = Some(stream);
        self.allocated_vertex_index_capacity = capacity;
        self.vertex_index_count = self.vertex_index_count.min(capacity);
        Ok(())
    }

    pub(super) fn check_vertex(&self, index: usize) -> Result<(), MeshError> {
        if index >= self.vertex_count {
            Err(MeshError::IndexOutOfRange {
                index,
                count: self.vertex_count,
            })
        } else {
            Ok(())
        }
    }

    // --- generic component access ---

    fn read_components(
        &self,
        semantic: VertexSemantic,
        index: usize,
        out: &mut [f32],
    ) -> Result<usize, MeshError> {
        self.check_vertex(index)?;
        let stream = self
            .stream(semantic)
            .ok_or(MeshError::MissingStream(semantic))?;
        let bytes = stream
            .element(self.interleaved.as_deref(), index)
            .ok_or(MeshError::ContentReleased)?;
        let n = stream.element_size.min(out.len());
        for (k, slot) in out.iter_mut().take(n).enumerate() {
            *slot = read_component(bytes, stream.element_type, k);
        }
        Ok(n)
    }

    fn write_components(
        &mut self,
        semantic: VertexSemantic,
        index: usize,
        values: &[f32],
    ) -> Result<(), MeshError> {
        self.check_vertex(index)?;
        let shared = self.interleaved.as_deref();
        let stream = self
            .stream(semantic)
            .ok_or(MeshError::MissingStream(semantic))?;
        let ty = stream.element_type;
        let size = stream.element_size;
        let mut bytes = stream
            .element(shared, index)
            .ok_or(MeshError::ContentReleased)?
            .to_vec();
        for (k, v) in values.iter().take(size).enumerate() {
            write_component(&mut bytes, ty, k, *v);
        }
        let shared = self.interleaved.as_mut();
        let stream = self
            .streams
            .iter_mut()
            .find(|s| s.semantic == semantic)
            .ok_or(MeshError::MissingStream(semantic))?;
        stream.set_element(shared, index, &bytes)?;
        self.faces.invalidate();
        Ok(())
    }

    // --- per-vertex accessors ---

    /// The location of vertex `index`.
    pub fn vertex_location(&self, index: usize) -> Result<Vec3, MeshError> {
        let mut c = [0.0f32; 3];
        self.read_components(VertexSemantic::Location, index, &mut c)?;
        Ok(Vec3::new(c[0], c[1], c[2]))
    }

    /// Set the location of vertex `index`.
    pub fn set_vertex_location(&mut self, index: usize, v: Vec3) -> Result<(), MeshError> {
        self.write_components(VertexSemantic::Location, index, &[v.x, v.y, v.z])
    }

    /// The homogeneous location of vertex `index`.
    ///
    /// W defaults to 1 for 3-component streams; 2-component streams are
    /// zero-padded in Z with W = 1.
    pub fn vertex_homogeneous_location(&self, index: usize) -> Result<Vec4, MeshError> {
        let mut c = [0.0f32, 0.0, 0.0, 1.0];
        let n = self.read_components(VertexSemantic::Location, index, &mut c)?;
        if n < 4 {
            c[3] = 1.0;
        }
        Ok(Vec4::new(c[0], c[1], c[2], c[3]))
    }

    /// Set the homogeneous location of vertex `index`.
    pub fn set_vertex_homogeneous_location(
        &mut self,
        index: usize,
        v: Vec4,
    ) -> Result<(), MeshError> {
        self.write_components(VertexSemantic::Location, index, &[v.x, v.y, v.z, v.w])
    }

    /// The normal of vertex `index`.
    pub fn vertex_normal(&self, index: usize) -> Result<Vec3, MeshError> {
        let mut c = [0.0f32; 3];
        self.read_components(VertexSemantic::Normal, index, &mut c)?;
        Ok(Vec3::new(c[0], c[1], c[2]))
    }

    /// Set the normal of vertex `index`.
    pub fn set_vertex_normal(&mut self, index: usize, v: Vec3) -> Result<(), MeshError> {
        self.write_components(VertexSemantic::Normal, index, &[v.x, v.y, v.z])
    }

    /// The tangent of vertex `index`.
    pub fn vertex_tangent(&self, index: usize) -> Result<Vec3, MeshError> {
        let mut c = [0.0f32; 3];
        self.read_components(VertexSemantic::Tangent, index, &mut c)?;
        Ok(Vec3::new(c[0], c[1], c[2]))
    }

    /// Set the tangent of vertex `index`.
    pub fn set_vertex_tangent(&mut self, index: usize, v: Vec3) -> Result<(), MeshError> {
        self.write_components(VertexSemantic::Tangent, index, &[v.x, v.y, v.z])
    }

    /// The bitangent of vertex `index`.
    pub fn vertex_bitangent(&self, index: usize) -> Result<Vec3, MeshError> {
        let mut c = [0.0f32; 3];
        self.read_components(VertexSemantic::Bitangent, index, &mut c)?;
        Ok(Vec3::new(c[0], c[1], c[2]))
    }

    /// Set the bitangent of vertex `index`.
    pub fn set_vertex_bitangent(&mut self, index: usize, v: Vec3) -> Result<(), MeshError> {
        self.write_components(VertexSemantic::Bitangent, index, &[v.x, v.y, v.z])
    }

    /// The color of vertex `index` as RGBA bytes.
    pub fn vertex_color(&self, index: usize) -> Result<[u8; 4], MeshError> {
        let stream = self
            .stream(VertexSemantic::Color)
            .ok_or(MeshError::MissingStream(VertexSemantic::Color))?;
        let scale = if stream.element_type == ElementType::UnsignedByte {
            1.0
        } else {
            255.0
        };
        let mut c = [0.0f32; 4];
        self.read_components(VertexSemantic::Color, index, &mut c)?;
        Ok(c.map(|v| (v * scale).clamp(0.0, 255.0) as u8))
    }

    /// Set the color of vertex `index` from RGBA bytes.
    pub fn set_vertex_color(&mut self, index: usize, color: [u8; 4]) -> Result<(), MeshError> {
        let stream = self
            .stream(VertexSemantic::Color)
            .ok_or(MeshError::MissingStream(VertexSemantic::Color))?;
        let scale = if stream.element_type == ElementType::UnsignedByte {
            1.0
        } else {
            1.0 / 255.0
        };
        let values = color.map(|v| v as f32 * scale);
        self.write_components(VertexSemantic::Color, index, &values)
    }

    /// The texture coordinate of vertex `index` in set `set`.
    pub fn vertex_tex_coord(&self, set: u32, index: usize) -> Result<Vec2, MeshError> {
        let mut c = [0.0f32; 2];
        self.read_components(VertexSemantic::TexCoord(set), index, &mut c)?;
        Ok(Vec2::new(c[0], c[1]))
    }

    /// Set the texture coordinate of vertex `index` in set `set`.
    pub fn set_vertex_tex_coord(
        &mut self,
        set: u32,
        index: usize,
        uv: Vec2,
    ) -> Result<(), MeshError> {
        self.write_components(VertexSemantic::TexCoord(set), index, &[uv.x, uv.y])
    }

    /// The point size of vertex `index`.
    pub fn vertex_point_size(&self, index: usize) -> Result<f32, MeshError> {
        let mut c = [0.0f32; 1];
        self.read_components(VertexSemantic::PointSize, index, &mut c)?;
        Ok(c[0])
    }

    /// Set the point size of vertex `index`.
    pub fn set_vertex_point_size(&mut self, index: usize, size: f32) -> Result<(), MeshError> {
        self.write_components(VertexSemantic::PointSize, index, &[size])
    }

    /// Bone weight `influence` of vertex `index`.
    pub fn vertex_bone_weight(&self, influence: usize, index: usize) -> Result<f32, MeshError> {
        let row = self.vertex_bone_weights(index)?;
        row.get(influence).copied().ok_or(MeshError::IndexOutOfRange {
            index: influence,
            count: row.len(),
        })
    }

    /// All bone weights of vertex `index`.
    pub fn vertex_bone_weights(&self, index: usize) -> Result<Vec<f32>, MeshError> {
        let count = self.vertex_bone_count();
        let mut row = vec![0.0f32; count];
        self.read_components(VertexSemantic::BoneWeights, index, &mut row)?;
        Ok(row)
    }

    /// Set all bone weights of vertex `index`.
    pub fn set_vertex_bone_weights(
        &mut self,
        index: usize,
        weights: &[f32],
    ) -> Result<(), MeshError> {
        self.write_components(VertexSemantic::BoneWeights, index, weights)
    }

    /// Bone index `influence` of vertex `index`.
    pub fn vertex_bone_index(&self, influence: usize, index: usize) -> Result<u16, MeshError> {
        let row = self.vertex_bone_indices(index)?;
        row.get(influence).copied().ok_or(MeshError::IndexOutOfRange {
            index: influence,
            count: row.len(),
        })
    }

    /// All bone indices of vertex `index`, widened to 16 bits.
    pub fn vertex_bone_indices(&self, index: usize) -> Result<Vec<u16>, MeshError> {
        let count = self.vertex_bone_count();
        let mut row = vec![0.0f32; count];
        self.read_components(VertexSemantic::BoneIndices, index, &mut row)?;
        Ok(row.into_iter().map(|v| v as u16).collect())
    }

    /// Set all bone indices of vertex `index`. Values are narrowed or
    /// widened to the stream's element type as needed.
    pub fn set_vertex_bone_indices(
        &mut self,
        index: usize,
        indices: &[u16],
    ) -> Result<(), MeshError> {
        let values: Vec<f32> = indices.iter().map(|v| f32::from(*v)).collect();
        self.write_components(VertexSemantic::BoneIndices, index, &values)
    }

    /// Drawing index `index`.
    pub fn vertex_index(&self, index: usize) -> Result<u32, MeshError> {
        if index >= self.vertex_index_count {
            return Err(MeshError::IndexOutOfRange {
                index,
                count: self.vertex_index_count,
            });
        }
        let stream = self.indices.as_ref().ok_or(MeshError::MissingStream(
            VertexSemantic::Index,
        ))?;
        let bytes = stream
            .element(None, index)
            .ok_or(MeshError::ContentReleased)?;
        Ok(read_component(bytes, stream.element_type, 0) as u32)
    }

    /// Set drawing index `index`.
    pub fn set_vertex_index(&mut self, index: usize, value: u32) -> Result<(), MeshError> {
        if index >= self.vertex_index_count {
            return Err(MeshError::IndexOutOfRange {
                index,
                count: self.vertex_index_count,
            });
        }
        let stream = self.indices.as_mut().ok_or(MeshError::MissingStream(
            VertexSemantic::Index,
        ))?;
        let ty = stream.element_type;
        let mut bytes = vec![0u8; stream.element_bytes()];
        write_component(&mut bytes, ty, 0, value as f32);
        stream.set_element(None, index, &bytes)?;
        self.faces.invalidate();
        Ok(())
    }

    // --- vertex copying ---

    /// Copy `count` vertices from `src_index` to `dst_index` within this
    /// mesh, across every stream. Ranges must lie within the allocated
    /// capacity. Overlapping ranges are handled.
    pub fn copy_vertices(
        &mut self,
        count: usize,
        src_index: usize,
        dst_index: usize,
    ) -> Result<(), MeshError> {
        let cap = self.allocated_vertex_capacity;
        let end = src_index.max(dst_index) + count;
        if end > cap {
            return Err(MeshError::IndexOutOfRange {
                index: end.saturating_sub(1),
                count: cap,
            });
        }
        if let Some(buf) = self.interleaved.as_mut() {
            let stride = self.streams.first().map_or(0, |s| s.stride);
            buf.copy_within(
                src_index * stride..(src_index + count) * stride,
                dst_index * stride,
            );
        } else {
            for s in &mut self.streams {
                let stride = s.stride;
                if let Some(bytes) = s.owned_bytes_mut() {
                    bytes.copy_within(
                        src_index * stride..(src_index + count) * stride,
                        dst_index * stride,
                    );
                }
            }
        }
        self.faces.invalidate();
        Ok(())
    }

    /// Copy `count` vertices from another mesh.
    ///
    /// Only streams present in this mesh are copied; streams missing in
    /// the source are filled with per-semantic defaults (opaque white
    /// color, unit point size, W = 1 locations, zeros elsewhere). Bone
    /// indices are converted between 8-bit and 16-bit widths as needed.
    pub fn copy_vertices_from(
        &mut self,
        count: usize,
        src_index: usize,
        src: &Mesh,
        dst_index: usize,
    ) -> Result<(), MeshError> {
        if dst_index + count > self.allocated_vertex_capacity {
            return Err(MeshError::IndexOutOfRange {
                index: dst_index + count - 1,
                count: self.allocated_vertex_capacity,
            });
        }
        let layout: Vec<(VertexSemantic, usize, ElementType)> = self
            .streams
            .iter()
            .map(|s| (s.semantic, s.element_size, s.element_type))
            .collect();
        for (semantic, components, element_type) in layout {
            for v in 0..count {
                let mut values = vec![0.0f32; components];
                if src.stream(semantic).is_some() {
                    src.read_components(semantic, src_index + v, &mut values)?;
                } else {
                    fill_default_components(semantic, element_type, &mut values);
                }
                // Bypass the vertex_count check; capacity was validated.
                self.write_components_unchecked(semantic, dst_index + v, &values)?;
            }
        }
        self.faces.invalidate();
        Ok(())
    }

    fn write_components_unchecked(
        &mut self,
        semantic: VertexSemantic,
        index: usize,
        values: &[f32],
    ) -> Result<(), MeshError> {
        let shared = self.interleaved.as_deref();
        let stream = self
            .stream(semantic)
            .ok_or(MeshError::MissingStream(semantic))?;
        let ty = stream.element_type;
        let size = stream.element_size;
        let mut bytes = stream
            .element(shared, index)
            .ok_or(MeshError::ContentReleased)?
            .to_vec();
        for (k, v) in values.iter().take(size).enumerate() {
            write_component(&mut bytes, ty, k, *v);
        }
        let shared = self.interleaved.as_mut();
        let stream = self
            .streams
            .iter_mut()
            .find(|s| s.semantic == semantic)
            .ok_or(MeshError::MissingStream(semantic))?;
        stream.set_element(shared, index, &bytes)
    }

    // --- GPU buffer lifecycle ---

    /// Whether GPU state is valid (set false after a GL failure; such a
    /// mesh is skipped by subsequent draws until buffers are recreated).
    pub fn has_valid_gpu_state(&self) -> bool {
        self.gpu_state_valid
    }

    /// Upload vertex content to GPU buffers.
    ///
    /// Interleaved meshes share a single buffer across all attribute
    /// streams; otherwise each stream gets its own. Indices always get
    /// their own element buffer. Transactional: on failure all buffers
    /// created by this call are deleted and the mesh is flagged as
    /// having invalid GPU state.
    pub fn create_gl_buffers(
        &mut self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
    ) -> Result<(), MeshError> {
        let result = self.create_gl_buffers_inner(ctx, state);
        if let Err(err) = &result {
            log::warn!(
                "mesh {} GPU buffer creation failed: {err}; mesh will be skipped",
                self.identity.tag
            );
            self.delete_gl_buffers(ctx, state);
            self.gpu_state_valid = false;
        } else {
            self.gpu_state_valid = true;
            state.invalidate_last_drawn_mesh();
        }
        result
    }

    fn create_gl_buffers_inner(
        &mut self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
    ) -> Result<(), MeshError> {
        if self.interleaved.is_some() {
            let id = ctx.create_buffer()?;
            // Record the id first so a failed upload is still cleaned up.
            self.interleaved_gl_buffer = id;
            state.bind_buffer(ctx, BufferTarget::Array, id);
            let usage = self
                .streams
                .first()
                .map_or(BufferUsage::StaticDraw, |s| s.buffer_usage);
            let buf = self.interleaved.as_deref().unwrap_or(&[]);
            ctx.buffer_data(BufferTarget::Array, buf, usage)?;
            for s in &mut self.streams {
                s.adopt_gl_buffer(id);
            }
        } else {
            let capacity = self.allocated_vertex_capacity;
            for s in &mut self.streams {
                s.create_gl_buffer(ctx, state, capacity)?;
            }
        }
        if let Some(indices) = &mut self.indices {
            indices.create_gl_buffer(ctx, state, self.allocated_vertex_index_capacity)?;
        }
        Ok(())
    }

    /// Release all GPU buffers, keeping CPU content.
    pub fn delete_gl_buffers(&mut self, ctx: &mut dyn GlContext, state: &mut GlStateCache) {
        if self.interleaved_gl_buffer != 0 {
            ctx.delete_buffer(self.interleaved_gl_buffer);
            state.forget_buffer(self.interleaved_gl_buffer);
            self.interleaved_gl_buffer = 0;
        }
        for s in &mut self.streams {
            s.delete_gl_buffer(ctx, state);
        }
        if let Some(indices) = &mut self.indices {
            indices.delete_gl_buffer(ctx, state);
        }
        state.invalidate_last_drawn_mesh();
    }

    /// Free CPU copies of streams whose retention flag is off, once they
    /// have been uploaded. The shared interleaved buffer is freed only
    /// when no stream retains its contents.
    pub fn release_redundant_content(&mut self) {
        if self.interleaved.is_some() {
            if self.interleaved_gl_buffer != 0
                && self.streams.iter().all(|s| !s.retain_contents)
            {
                self.interleaved = None;
                for s in &mut self.streams {
                    s.mark_released();
                }
            }
        } else {
            for s in &mut self.streams {
                s.release_redundant_content();
            }
        }
        if let Some(indices) = &mut self.indices {
            indices.release_redundant_content();
        }
    }

    /// Re-upload a vertex range to the GPU (dynamic meshes).
    pub fn update_gl_buffer_range(
        &mut self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
        first_vertex: usize,
        vertex_count: usize,
    ) -> Result<(), MeshError> {
        if let Some(buf) = &self.interleaved {
            if self.interleaved_gl_buffer == 0 {
                return Err(MeshError::NotBuffered);
            }
            let stride = self.interleaved_stride();
            let start = first_vertex * stride;
            let end = (start + vertex_count * stride).min(buf.len());
            if start >= end {
                return Ok(());
            }
            state.bind_buffer(ctx, BufferTarget::Array, self.interleaved_gl_buffer);
            ctx.buffer_sub_data(BufferTarget::Array, start, &buf[start..end])?;
            Ok(())
        } else {
            for s in &mut self.streams {
                s.update_gl_buffer_range(ctx, state, first_vertex, vertex_count)?;
            }
            Ok(())
        }
    }

    /// Re-upload the whole in-use vertex range.
    pub fn update_gl_buffers(
        &mut self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
    ) -> Result<(), MeshError> {
        let count = self.vertex_count;
        self.update_gl_buffer_range(ctx, state, 0, count)
    }

    // --- drawing ---

    fn index_type(&self) -> Option<IndexType> {
        self.indices.as_ref().map(|s| match s.element_type {
            ElementType::UnsignedByte => IndexType::UnsignedByte,
            _ => IndexType::UnsignedShort,
        })
    }

    fn bind_streams(
        &self,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
    ) -> Result<(), MeshError> {
        let mut wanted = 0u32;
        for s in &self.streams {
            let slot = s.semantic.attribute_slot();
            if slot < 32 {
                wanted |= 1 << slot;
            }
        }
        state.set_enabled_attributes(ctx, wanted);
        for s in &self.streams {
            s.bind_attribute(ctx, state)?;
        }
        if let Some(indices) = &self.indices {
            if indices.gl_buffer() == 0 {
                return Err(MeshError::NotBuffered);
            }
            state.bind_buffer(ctx, BufferTarget::ElementArray, indices.gl_buffer());
        }
        Ok(())
    }

    /// Draw the full mesh.
    ///
    /// Binding is skipped when this mesh was the last one drawn through
    /// the same state cache. Meshes flagged with invalid GPU state are
    /// skipped silently.
    pub fn draw(&self, ctx: &mut dyn GlContext, state: &mut GlStateCache) -> Result<(), MeshError> {
        let count = if self.indices.is_some() {
            self.vertex_index_count
        } else {
            self.vertex_count
        };
        self.draw_from(0, count, ctx, state)
    }

    /// Draw a sub-range of vertices (or indices, when indexed).
    pub fn draw_from(
        &self,
        first: usize,
        count: usize,
        ctx: &mut dyn GlContext,
        state: &mut GlStateCache,
    ) -> Result<(), MeshError> {
        if !self.gpu_state_valid {
            log::trace!("skipping draw of mesh {} with invalid GPU state", self.identity.tag);
            return Ok(());
        }
        if state.last_drawn_mesh() != Some(self.identity.tag) {
            self.bind_streams(ctx, state)?;
            state.set_last_drawn_mesh(self.identity.tag);
        }
        match self.index_type() {
            Some(ty) => {
                let index_bytes = match ty {
                    IndexType::UnsignedByte => 1,
                    IndexType::UnsignedShort => 2,
                };
                ctx.draw_elements(self.drawing_mode, count, ty, first * index_bytes);
            }
            None => ctx.draw_arrays(self.drawing_mode, first, count),
        }
        Ok(())
    }
}

fn fill_default_components(semantic: VertexSemantic, ty: ElementType, values: &mut [f32]) {
    match semantic {
        VertexSemantic::Location => {
            values.fill(0.0);
            if values.len() == 4 {
                values[3] = 1.0;
            }
        }
        VertexSemantic::Color => {
            let one = if ty == ElementType::UnsignedByte { 255.0 } else { 1.0 };
            values.fill(one);
        }
        VertexSemantic::PointSize => values.fill(1.0),
        _ => values.fill(0.0),
    }
}
