//! Attachments: the geometry sources a slot can display.

use glam::{Mat2, Vec2};
use smallvec::SmallVec;
use ulid::Ulid;

use crate::{
    color::Color,
    error::PoseError,
    handle::{Handle, Material},
    skeleton::Bone,
};

/// Stable identity of an attachment.
///
/// Two frames that reference the same attachment ids in the same places have the same triangle
/// topology, which is what mesh change detection relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttachmentId(pub Ulid);

impl AttachmentId {
    /// Generate a new unique id.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AttachmentId {
    fn default() -> Self {
        Self::new()
    }
}

/// Index list used by every region attachment: two triangles over its four corners.
pub const REGION_TRIANGLES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Something a slot can show. Only regions and meshes produce triangles.
#[derive(Clone, Debug)]
pub enum Attachment {
    /// A textured quad.
    Region(RegionAttachment),
    /// A textured triangle mesh.
    Mesh(MeshAttachment),
    /// A polygon that clips the slots drawn after it.
    Clipping(ClippingAttachment),
    /// A polygon used for hit testing only.
    BoundingBox(BoundingBoxAttachment),
    /// A single located point, e.g. a spawn point.
    Point(PointAttachment),
}

impl Attachment {
    /// The attachment's id.
    pub fn id(&self) -> AttachmentId {
        match self {
            Attachment::Region(a) => a.id,
            Attachment::Mesh(a) => a.id,
            Attachment::Clipping(a) => a.id,
            Attachment::BoundingBox(a) => a.id,
            Attachment::Point(a) => a.id,
        }
    }

    /// The attachment's name.
    pub fn name(&self) -> &str {
        match self {
            Attachment::Region(a) => &a.name,
            Attachment::Mesh(a) => &a.name,
            Attachment::Clipping(a) => &a.name,
            Attachment::BoundingBox(a) => &a.name,
            Attachment::Point(a) => &a.name,
        }
    }

    /// Whether this attachment produces triangles.
    pub fn is_renderable(&self) -> bool {
        matches!(self, Attachment::Region(_) | Attachment::Mesh(_))
    }

    /// Material of a renderable attachment.
    pub fn material(&self) -> Option<Handle<Material>> {
        match self {
            Attachment::Region(a) => Some(a.material),
            Attachment::Mesh(a) => Some(a.material),
            _ => None,
        }
    }

    /// Tint of a renderable attachment.
    pub fn color(&self) -> Color {
        match self {
            Attachment::Region(a) => a.color,
            Attachment::Mesh(a) => a.color,
            _ => Color::WHITE,
        }
    }

    /// The clipping attachment, if this is one.
    pub fn as_clipping(&self) -> Option<&ClippingAttachment> {
        match self {
            Attachment::Clipping(a) => Some(a),
            _ => None,
        }
    }

    /// Vertex count before any clipping. Zero for non renderable attachments.
    pub fn raw_vertex_count(&self) -> usize {
        match self {
            Attachment::Region(_) => 4,
            Attachment::Mesh(a) => a.vertices.len(),
            _ => 0,
        }
    }

    /// Index count before any clipping. Zero for non renderable attachments.
    pub fn raw_index_count(&self) -> usize {
        match self {
            Attachment::Region(_) => REGION_TRIANGLES.len(),
            Attachment::Mesh(a) => a.triangles.len(),
            _ => 0,
        }
    }

    /// Texture coordinates of a renderable attachment.
    pub fn uvs(&self) -> &[Vec2] {
        match self {
            Attachment::Region(a) => &a.uvs,
            Attachment::Mesh(a) => &a.uvs,
            _ => &[],
        }
    }

    /// Triangle indices of a renderable attachment.
    pub fn triangles(&self) -> &[u32] {
        match self {
            Attachment::Region(_) => &REGION_TRIANGLES,
            Attachment::Mesh(a) => &a.triangles,
            _ => &[],
        }
    }

    /// Number of vertices a deform override must supply, if the attachment accepts one.
    pub fn deformable_vertex_count(&self) -> Option<usize> {
        match self {
            Attachment::Mesh(a) => Some(a.vertices.len()),
            Attachment::Clipping(a) => Some(a.vertices.len()),
            Attachment::BoundingBox(a) => Some(a.vertices.len()),
            _ => None,
        }
    }

    /// Highest bone index referenced by vertex weights.
    pub fn max_weighted_bone(&self) -> Option<usize> {
        match self {
            Attachment::Mesh(a) => a.vertices.max_bone(),
            Attachment::Clipping(a) => a.vertices.max_bone(),
            Attachment::BoundingBox(a) => a.vertices.max_bone(),
            _ => None,
        }
    }

    /// Write the attachment's world space vertices into `out`, replacing its contents.
    ///
    /// `slot_bone` places rigid vertices, `bones` resolves weighted influences. `deform` is the
    /// slot's vertex override and is ignored when empty.
    pub fn compute_world_vertices(
        &self,
        bones: &[Bone],
        slot_bone: &Bone,
        deform: &[Vec2],
        out: &mut Vec<Vec2>,
    ) {
        out.clear();
        match self {
            Attachment::Region(a) => {
                out.extend(a.offsets.iter().map(|p| slot_bone.transform_point(*p)));
            }
            Attachment::Mesh(a) => a.vertices.compute_world(bones, slot_bone, deform, out),
            Attachment::Clipping(a) => a.vertices.compute_world(bones, slot_bone, deform, out),
            Attachment::BoundingBox(a) => a.vertices.compute_world(bones, slot_bone, deform, out),
            Attachment::Point(a) => out.push(a.world_position(slot_bone)),
        }
    }
}

/// Placement of a region within its bone's space.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionLayout {
    /// Center of the region.
    pub position: Vec2,
    /// Rotation in degrees, counter clockwise.
    pub rotation: f32,
    /// Scale applied before rotation.
    pub scale: Vec2,
    /// Unscaled size.
    pub size: Vec2,
    /// Whitespace stripped from the image when it was packed, if any.
    pub trim: Option<AtlasTrim>,
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            size: Vec2::ONE,
            trim: None,
        }
    }
}

/// How a packed atlas image relates to the original image, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AtlasTrim {
    /// Pixels stripped from the bottom left, unrotated.
    pub offset: Vec2,
    /// Size of the packed image, unrotated.
    pub packed_size: Vec2,
    /// Size of the image before whitespace was stripped.
    pub original_size: Vec2,
}

/// A textured quad.
///
/// Corners are stored bottom left, top left, top right, bottom right.
#[derive(Clone, Debug)]
pub struct RegionAttachment {
    /// Unique id.
    pub id: AttachmentId,
    /// Name, for lookup and debugging.
    pub name: String,
    /// Material the quad is drawn with.
    pub material: Handle<Material>,
    /// Tint.
    pub color: Color,
    /// Corner positions in bone space.
    pub offsets: [Vec2; 4],
    /// Corner texture coordinates.
    pub uvs: [Vec2; 4],
}

impl RegionAttachment {
    /// Create a region covering the whole texture with the given placement.
    pub fn new(name: impl Into<String>, material: Handle<Material>, layout: &RegionLayout) -> Self {
        let mut region = Self {
            id: AttachmentId::new(),
            name: name.into(),
            material,
            color: Color::WHITE,
            offsets: Self::corner_offsets(layout),
            uvs: [Vec2::ZERO; 4],
        };
        region.set_uvs(Vec2::ZERO, Vec2::ONE, false);
        region
    }

    /// Set the tint.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Map the corners onto the texture rectangle `min..max`.
    ///
    /// `rotated` is set when the atlas packer stored the image turned by 90 degrees.
    pub fn set_uvs(&mut self, min: Vec2, max: Vec2, rotated: bool) {
        let (u, v, u2, v2) = (min.x, min.y, max.x, max.y);
        self.uvs = if rotated {
            [
                Vec2::new(u2, v2),
                Vec2::new(u, v2),
                Vec2::new(u, v),
                Vec2::new(u2, v),
            ]
        } else {
            [
                Vec2::new(u, v2),
                Vec2::new(u, v),
                Vec2::new(u2, v),
                Vec2::new(u2, v2),
            ]
        };
    }

    fn corner_offsets(layout: &RegionLayout) -> [Vec2; 4] {
        let half = layout.size * 0.5;
        let mut min = -half;
        let mut max = half;
        if let Some(trim) = layout.trim.filter(|t| t.original_size.x != 0.0) {
            let original = trim.original_size;
            min += trim.offset / original * layout.size;
            max -= (original - trim.offset - trim.packed_size) / original * layout.size;
        }
        min *= layout.scale;
        max *= layout.scale;

        let rotation = Mat2::from_angle(layout.rotation.to_radians());
        [
            Vec2::new(min.x, min.y),
            Vec2::new(min.x, max.y),
            Vec2::new(max.x, max.y),
            Vec2::new(max.x, min.y),
        ]
        .map(|corner| rotation * corner + layout.position)
    }
}

/// One bone's contribution to a weighted vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoneInfluence {
    /// Index of the bone in the skeleton.
    pub bone: usize,
    /// Vertex position in that bone's space.
    pub position: Vec2,
    /// Blend weight. The weights of a vertex should sum to one.
    pub weight: f32,
}

/// A vertex placed by a blend of bones.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightedVertex {
    /// The influencing bones.
    pub influences: SmallVec<[BoneInfluence; 4]>,
}

/// Vertex positions of a mesh or polygon attachment.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeshVertices {
    /// Positions in the slot bone's space.
    Rigid(Vec<Vec2>),
    /// Positions blended from several bones.
    Weighted(Vec<WeightedVertex>),
}

impl MeshVertices {
    /// Number of vertices.
    pub fn len(&self) -> usize {
        match self {
            MeshVertices::Rigid(v) => v.len(),
            MeshVertices::Weighted(v) => v.len(),
        }
    }

    /// Whether there are no vertices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest bone index referenced by an influence.
    pub fn max_bone(&self) -> Option<usize> {
        match self {
            MeshVertices::Rigid(_) => None,
            MeshVertices::Weighted(v) => v
                .iter()
                .flat_map(|v| v.influences.iter().map(|i| i.bone))
                .max(),
        }
    }

    /// Write world positions into `out`.
    ///
    /// For rigid vertices a non empty `deform` replaces the local positions. For weighted vertices
    /// each deform entry is added to every influence position of its vertex.
    fn compute_world(&self, bones: &[Bone], slot_bone: &Bone, deform: &[Vec2], out: &mut Vec<Vec2>) {
        match self {
            MeshVertices::Rigid(local) => {
                let local = if deform.len() == local.len() {
                    deform
                } else {
                    local
                };
                out.extend(local.iter().map(|p| slot_bone.transform_point(*p)));
            }
            MeshVertices::Weighted(vertices) => {
                for (i, vertex) in vertices.iter().enumerate() {
                    let offset = deform.get(i).copied().unwrap_or(Vec2::ZERO);
                    let world: Vec2 = vertex
                        .influences
                        .iter()
                        .filter_map(|inf| {
                            let bone = bones.get(inf.bone)?;
                            Some(bone.transform_point(inf.position + offset) * inf.weight)
                        })
                        .sum();
                    out.push(world);
                }
            }
        }
    }
}

/// A textured triangle mesh.
#[derive(Clone, Debug)]
pub struct MeshAttachment {
    /// Unique id.
    pub id: AttachmentId,
    /// Name, for lookup and debugging.
    pub name: String,
    /// Material the mesh is drawn with.
    pub material: Handle<Material>,
    /// Tint.
    pub color: Color,
    /// Vertex positions.
    pub vertices: MeshVertices,
    /// One texture coordinate per vertex.
    pub uvs: Vec<Vec2>,
    /// Triangle list indices into `vertices`.
    pub triangles: Vec<u32>,
    /// Number of leading vertices that form the outer hull.
    pub hull_length: usize,
}

impl MeshAttachment {
    /// Create a mesh, checking that the triangles and UVs match the vertices.
    pub fn new(
        name: impl Into<String>,
        material: Handle<Material>,
        vertices: MeshVertices,
        uvs: Vec<Vec2>,
        triangles: Vec<u32>,
    ) -> Result<Self, PoseError> {
        let name = name.into();
        if uvs.len() != vertices.len() {
            return Err(PoseError::UvCount {
                name,
                vertices: vertices.len(),
                uvs: uvs.len(),
            });
        }
        let vertex_count = vertices.len();
        if triangles.len() % 3 != 0 || triangles.iter().any(|&i| i as usize >= vertex_count) {
            return Err(PoseError::InvalidTriangles { name });
        }
        Ok(Self {
            id: AttachmentId::new(),
            name,
            material,
            color: Color::WHITE,
            vertices,
            uvs,
            hull_length: vertex_count,
            triangles,
        })
    }

    /// Mark the first `hull_length` vertices as the outer hull.
    pub fn with_hull_length(mut self, hull_length: usize) -> Self {
        self.hull_length = hull_length.min(self.vertices.len());
        self
    }

    /// Set the tint.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// A polygon that clips every slot drawn after it, up to and including its end slot.
#[derive(Clone, Debug)]
pub struct ClippingAttachment {
    /// Unique id.
    pub id: AttachmentId,
    /// Name, for lookup and debugging.
    pub name: String,
    /// Polygon vertices, in order. Either winding is accepted.
    pub vertices: MeshVertices,
    /// Slot index after which clipping stops. `None` clips to the end of the draw order.
    pub end_slot: Option<usize>,
}

impl ClippingAttachment {
    /// Create a clipping polygon.
    pub fn new(name: impl Into<String>, vertices: MeshVertices, end_slot: Option<usize>) -> Self {
        Self {
            id: AttachmentId::new(),
            name: name.into(),
            vertices,
            end_slot,
        }
    }
}

/// A polygon for hit testing. Never rendered.
#[derive(Clone, Debug)]
pub struct BoundingBoxAttachment {
    /// Unique id.
    pub id: AttachmentId,
    /// Name, for lookup and debugging.
    pub name: String,
    /// Polygon vertices.
    pub vertices: MeshVertices,
}

impl BoundingBoxAttachment {
    /// Create a bounding polygon.
    pub fn new(name: impl Into<String>, vertices: MeshVertices) -> Self {
        Self {
            id: AttachmentId::new(),
            name: name.into(),
            vertices,
        }
    }
}

/// A named point in bone space. Never rendered.
#[derive(Clone, Debug)]
pub struct PointAttachment {
    /// Unique id.
    pub id: AttachmentId,
    /// Name, for lookup and debugging.
    pub name: String,
    /// Position in bone space.
    pub position: Vec2,
    /// Rotation in degrees, in bone space.
    pub rotation: f32,
}

impl PointAttachment {
    /// Create a point.
    pub fn new(name: impl Into<String>, position: Vec2, rotation: f32) -> Self {
        Self {
            id: AttachmentId::new(),
            name: name.into(),
            position,
            rotation,
        }
    }

    /// World position of the point.
    pub fn world_position(&self, bone: &Bone) -> Vec2 {
        bone.transform_point(self.position)
    }

    /// World rotation of the point in degrees.
    pub fn world_rotation(&self, bone: &Bone) -> f32 {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let local = Vec2::new(cos, sin);
        let world = bone.world.transform_vector2(local);
        world.y.atan2(world.x).to_degrees()
    }
}
