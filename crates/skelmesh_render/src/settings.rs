//! Mesh generation settings and renderer options.

use fxhash::FxHashMap;
use skelmesh_pose::handle::{Handle, Material};

/// Settings that control what vertex data is generated.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MeshSettings {
    /// Apply clipping attachments.
    pub use_clipping: bool,
    /// Depth offset per draw order position. Vertex z is `z_spacing * draw order index`.
    pub z_spacing: f32,
    /// Premultiply vertex colors by alpha. Additive slots then get an alpha of zero.
    pub pma_vertex_colors: bool,
    /// Emit the tint-black color in the second and third UV channels.
    pub tint_black: bool,
    /// Solve per vertex 2D tangents.
    pub calculate_tangents: bool,
    /// Emit a constant normal per vertex.
    pub add_normals: bool,
    /// Promise that triangles never change, carried into renderer instructions.
    pub immutable_triangles: bool,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            use_clipping: true,
            z_spacing: 0.0,
            pma_vertex_colors: true,
            tint_black: false,
            calculate_tangents: false,
            add_normals: false,
            immutable_triangles: false,
        }
    }
}

/// Options that shape how a skeleton is split into submeshes.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RendererOptions {
    /// Names of slots that always start a new submesh.
    pub separator_slot_names: Vec<String>,
    /// Materials that replace the attachment material of the named slots.
    pub custom_slot_materials: FxHashMap<String, Handle<Material>>,
    /// Materials swapped per submesh after partitioning.
    pub custom_material_overrides: FxHashMap<Handle<Material>, Handle<Material>>,
    /// Render everything as one submesh.
    pub single_submesh: bool,
    /// Material for single submesh mode. Defaults to the last drawn attachment's material.
    pub single_submesh_material: Option<Handle<Material>>,
}
