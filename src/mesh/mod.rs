//! Vertex arrays, meshes, and face queries
//!
//! The mesh engine: typed attribute streams with optional interleaving,
//! CPU capacity management with a growth factor, GPU buffer lifecycle,
//! per-vertex accessors, and the lazy face cache used for picking.

mod faces;
#[allow(clippy::module_inception)]
mod mesh;
mod vertex_array;

pub use faces::{FaceArray, MeshIntersection};
pub use mesh::Mesh;
pub use vertex_array::{ElementType, VertexArray, VertexContent, VertexSemantic, VertexStorage};

use thiserror::Error;

use crate::render::GlError;

/// Mesh subsystem errors.
#[derive(Debug, Error)]
pub enum MeshError {
    /// A vertex index exceeded the mesh's vertex count
    #[error("vertex index {index} out of range (count {count})")]
    IndexOutOfRange {
        /// The offending index
        index: usize,
        /// The valid count at the time of access
        count: usize,
    },

    /// Storage allocation failed; the mesh keeps its prior state
    #[error("vertex storage allocation of {requested} bytes failed")]
    CapacityExhausted {
        /// The byte size that could not be allocated
        requested: usize,
    },

    /// The requested stream is not part of this mesh's content
    #[error("mesh has no {0:?} stream")]
    MissingStream(VertexSemantic),

    /// CPU-side content was released after GPU upload
    #[error("vertex content has been released from CPU memory")]
    ContentReleased,

    /// The operation requires GPU buffers that have not been created
    #[error("mesh has no GPU buffers")]
    NotBuffered,

    /// Bone weight and bone index streams disagree on influences per vertex
    #[error("bone weight element size {weights} != bone index element size {indices}")]
    BoneInfluenceMismatch {
        /// Influences per vertex in the weights stream
        weights: usize,
        /// Influences per vertex in the index stream
        indices: usize,
    },

    /// A GL call failed during an upload or bind
    #[error(transparent)]
    Gl(#[from] GlError),
}
