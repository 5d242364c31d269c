//! Finished vertex and index data handed to the host renderer.

use glam::{Vec2, Vec3, Vec4};

use crate::buffer::GrowBuffer;

/// Normal written for every vertex when normals are enabled. Meshes face the viewer along -z.
pub const MESH_NORMAL: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Axis aligned bounds of the emitted vertices.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeshBounds {
    /// Minimum corner.
    pub min: Vec2,
    /// Maximum corner.
    pub max: Vec2,
    /// Depth covered by z spacing.
    pub thickness: f32,
}

impl MeshBounds {
    /// Center of the bounds.
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Width and height.
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }
}

/// Vertex attribute arrays and one index array per submesh.
///
/// Arrays keep their high water mark between frames. The `*_bytes` views cover the used length
/// and are ready for upload.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffers {
    pub(crate) positions: GrowBuffer<Vec3>,
    pub(crate) uvs: GrowBuffer<Vec2>,
    pub(crate) colors: GrowBuffer<[u8; 4]>,
    pub(crate) uv2: GrowBuffer<Vec2>,
    pub(crate) uv3: GrowBuffer<Vec2>,
    pub(crate) normals: GrowBuffer<Vec3>,
    pub(crate) tangents: GrowBuffer<Vec4>,
    pub(crate) submeshes: Vec<GrowBuffer<u32>>,
    pub(crate) submesh_count: usize,
    pub(crate) bounds: MeshBounds,
}

impl MeshBuffers {
    /// Create empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Vertex positions. Z carries the draw order spacing.
    pub fn positions(&self) -> &[Vec3] {
        self.positions.as_slice()
    }

    /// Texture coordinates.
    pub fn uvs(&self) -> &[Vec2] {
        self.uvs.as_slice()
    }

    /// Vertex colors as RGBA bytes.
    pub fn colors(&self) -> &[[u8; 4]] {
        self.colors.as_slice()
    }

    /// Tint-black red and green, empty unless tint black is enabled.
    pub fn uv2(&self) -> &[Vec2] {
        self.uv2.as_slice()
    }

    /// Tint-black blue and a constant 1, empty unless tint black is enabled.
    pub fn uv3(&self) -> &[Vec2] {
        self.uv3.as_slice()
    }

    /// Normals, empty unless enabled.
    pub fn normals(&self) -> &[Vec3] {
        self.normals.as_slice()
    }

    /// Tangents with handedness in `w`, empty unless enabled.
    pub fn tangents(&self) -> &[Vec4] {
        self.tangents.as_slice()
    }

    /// Number of submeshes.
    pub fn submesh_count(&self) -> usize {
        self.submesh_count
    }

    /// Triangle indices of a submesh, empty if out of range.
    pub fn submesh(&self, index: usize) -> &[u32] {
        if index >= self.submesh_count {
            return &[];
        }
        self.submeshes
            .get(index)
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate over the index arrays of every submesh.
    pub fn submeshes(&self) -> impl Iterator<Item = &[u32]> + '_ {
        (0..self.submesh_count).map(|i| self.submesh(i))
    }

    /// Bounds of the emitted vertices. A zero rectangle when nothing was emitted.
    pub fn bounds(&self) -> MeshBounds {
        self.bounds
    }

    /// Position data as bytes.
    pub fn positions_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.positions())
    }

    /// UV data as bytes.
    pub fn uvs_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.uvs())
    }

    /// Color data as bytes.
    pub fn colors_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.colors())
    }

    /// Index data of a submesh as bytes.
    pub fn submesh_bytes(&self, index: usize) -> &[u8] {
        bytemuck::cast_slice(self.submesh(index))
    }

    /// Scale positions and bounds, e.g. to convert skeleton units to world units.
    pub fn scale_vertex_data(&mut self, scale: f32) {
        for position in self.positions.as_mut_slice() {
            *position *= scale;
        }
        self.bounds.min *= scale;
        self.bounds.max *= scale;
        self.bounds.thickness *= scale;
    }

    /// Grow storage ahead of time so at least `vertex_count` vertices fit without reallocating.
    pub fn ensure_vertex_capacity(&mut self, vertex_count: usize, tint_black: bool, tangents: bool, normals: bool) {
        self.positions.reserve_total(vertex_count);
        self.uvs.reserve_total(vertex_count);
        self.colors.reserve_total(vertex_count);
        if tint_black {
            self.uv2.reserve_total(vertex_count);
            self.uv3.reserve_total(vertex_count);
        }
        if tangents {
            self.tangents.reserve_total(vertex_count);
        }
        if normals {
            self.normals.reserve_total(vertex_count);
        }
    }

    /// Physical capacity of the vertex arrays.
    pub fn vertex_capacity(&self) -> usize {
        self.positions.capacity()
    }

    /// Position storage including the zeroed tail past the used length.
    pub fn positions_capacity_slice(&self) -> &[Vec3] {
        self.positions.as_capacity_slice()
    }

    /// Reset lengths, keeping storage.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.uvs.clear();
        self.colors.clear();
        self.uv2.clear();
        self.uv3.clear();
        self.normals.clear();
        self.tangents.clear();
        for submesh in &mut self.submeshes {
            submesh.clear();
        }
        self.submesh_count = 0;
        self.bounds = MeshBounds::default();
    }

    /// Make room for `count` submeshes and mark them used.
    pub(crate) fn set_submesh_count(&mut self, count: usize) {
        if self.submeshes.len() < count {
            self.submeshes.resize_with(count, GrowBuffer::new);
        }
        self.submesh_count = count;
    }

    /// Zero everything past the used length of every array.
    pub(crate) fn zero_tails(&mut self) {
        self.positions.zero_tail();
        self.uvs.zero_tail();
        self.colors.zero_tail();
        self.uv2.zero_tail();
        self.uv3.zero_tail();
        self.normals.zero_tail();
        self.tangents.zero_tail();
        for submesh in &mut self.submeshes[..self.submesh_count] {
            submesh.zero_tail();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_and_byte_views() {
        let mut mesh = MeshBuffers::new();
        mesh.positions.extend_from_slice(&[Vec3::new(1.0, 2.0, 0.5), Vec3::new(-1.0, 0.0, 0.5)]);
        mesh.bounds = MeshBounds {
            min: Vec2::new(-1.0, 0.0),
            max: Vec2::new(1.0, 2.0),
            thickness: 0.5,
        };
        mesh.scale_vertex_data(2.0);

        assert_eq!(mesh.positions()[0], Vec3::new(2.0, 4.0, 1.0));
        assert_eq!(mesh.bounds().size(), Vec2::new(4.0, 4.0));
        assert_eq!(mesh.bounds().thickness, 1.0);
        assert_eq!(mesh.positions_bytes().len(), 2 * 12);
    }

    #[test]
    fn submesh_access_respects_count() {
        let mut mesh = MeshBuffers::new();
        mesh.set_submesh_count(2);
        mesh.submeshes[1].extend_from_slice(&[0, 1, 2]);
        assert_eq!(mesh.submesh(1), &[0, 1, 2]);
        assert_eq!(mesh.submesh_bytes(1).len(), 12);

        mesh.set_submesh_count(1);
        assert!(mesh.submesh(1).is_empty());
        assert_eq!(mesh.submeshes().count(), 1);
    }

    #[test]
    fn ensure_capacity() {
        let mut mesh = MeshBuffers::new();
        mesh.ensure_vertex_capacity(64, true, false, false);
        assert_eq!(mesh.vertex_capacity(), 64);
        assert_eq!(mesh.uv2.capacity(), 64);
        assert_eq!(mesh.tangents.capacity(), 0);
        assert_eq!(mesh.vertex_count(), 0);
    }
}
