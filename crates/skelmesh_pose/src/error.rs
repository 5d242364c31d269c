//! Errors raised while assembling or mutating a posed skeleton.

/// Error type for skeleton construction and mutation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoseError {
    /// A slot or vertex influence names a bone index outside the skeleton.
    #[error("bone index {index} is out of range, skeleton has {count} bones")]
    MissingBone {
        /// The offending index.
        index: usize,
        /// Number of bones in the skeleton.
        count: usize,
    },
    /// A slot index is outside the skeleton.
    #[error("slot index {index} is out of range, skeleton has {count} slots")]
    MissingSlot {
        /// The offending index.
        index: usize,
        /// Number of slots in the skeleton.
        count: usize,
    },
    /// The draw order is not a permutation of the slot indices.
    #[error("draw order must be a permutation of {slot_count} slot indices")]
    InvalidDrawOrder {
        /// Number of slots in the skeleton.
        slot_count: usize,
    },
    /// A deform override has the wrong number of vertices for its attachment.
    #[error("deform has {found} vertices but the attachment has {expected}")]
    DeformLength {
        /// Vertex count of the attachment.
        expected: usize,
        /// Vertex count of the deform.
        found: usize,
    },
    /// A mesh attachment has a different number of UVs than vertices.
    #[error("mesh attachment `{name}` has {vertices} vertices but {uvs} uvs")]
    UvCount {
        /// Name of the attachment.
        name: String,
        /// Number of vertices.
        vertices: usize,
        /// Number of UVs.
        uvs: usize,
    },
    /// A clipping polygon has fewer than three vertices.
    #[error("clipping attachment `{name}` needs at least 3 vertices, found {vertices}")]
    ClippingPolygon {
        /// Name of the attachment.
        name: String,
        /// Number of vertices.
        vertices: usize,
    },
    /// Mesh attachment indices refer past the end of its vertices, or do not form triangles.
    #[error("mesh attachment `{name}` has invalid triangles")]
    InvalidTriangles {
        /// Name of the attachment.
        name: String,
    },
}
