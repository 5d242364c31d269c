//! Fills [`MeshBuffers`] from a skeleton and its renderer instruction.

use glam::{Vec2, Vec3};
use skelmesh_clipping::clipper::SkeletonClipper;
use skelmesh_pose::skeleton::Skeleton;

use crate::{
    extract::{ColorMode, GeometryExtractor, RenderAttachmentCache},
    instruction::{RendererInstruction, SubmeshInstruction},
    mesh::{MeshBounds, MeshBuffers, MESH_NORMAL},
    settings::MeshSettings,
    tangents::{solve_tangents_2d, TangentScratch},
};

/// Running min and max of emitted positions.
#[derive(Debug, Clone, Copy)]
struct BoundsAccumulator {
    min: Vec2,
    max: Vec2,
}

impl Default for BoundsAccumulator {
    fn default() -> Self {
        Self {
            min: Vec2::splat(f32::INFINITY),
            max: Vec2::splat(f32::NEG_INFINITY),
        }
    }
}

impl BoundsAccumulator {
    fn add(&mut self, points: &[Vec2]) {
        for &p in points {
            self.min = self.min.min(p);
            self.max = self.max.max(p);
        }
    }

    fn finish(&self, thickness: f32) -> MeshBounds {
        if self.min.x > self.max.x {
            return MeshBounds::default();
        }
        MeshBounds {
            min: self.min,
            max: self.max,
            thickness,
        }
    }
}

/// Generates mesh data for one skeleton.
///
/// A frame is built with [`MeshGenerator::begin`] followed by either
/// [`MeshGenerator::build_mesh`], which walks every slot and applies clipping, or
/// [`MeshGenerator::build_mesh_with_arrays`], which fills preallocated arrays and may only be used
/// when the instruction has no clipping. Both produce the same output for unclipped skeletons.
#[derive(Debug, Clone, Default)]
pub struct MeshGenerator {
    settings: MeshSettings,
    extractor: GeometryExtractor,
    clipper: SkeletonClipper,
    clip_polygon: Vec<Vec2>,
    tangent_scratch: TangentScratch,
    bounds: BoundsAccumulator,
    thickness: f32,
    submesh_index: usize,
}

impl MeshGenerator {
    /// Create a generator.
    pub fn new(settings: MeshSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// The settings.
    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    /// The settings, mutably. Changes apply from the next [`MeshGenerator::begin`].
    pub fn settings_mut(&mut self) -> &mut MeshSettings {
        &mut self.settings
    }

    /// The per attachment geometry cache.
    pub fn extractor(&self) -> &GeometryExtractor {
        &self.extractor
    }

    /// The clipper, for diagnostics.
    pub fn clipper(&self) -> &SkeletonClipper {
        &self.clipper
    }

    /// Drop cached geometry and any clip state.
    pub fn clear(&mut self) {
        self.extractor.clear();
        self.clipper.reset();
        self.clip_polygon.clear();
    }

    /// Drop cached geometry of attachments no longer shown by `skeleton`.
    pub fn prune_cache(&mut self, skeleton: &Skeleton) {
        self.extractor.retain_attached(skeleton);
    }

    fn color_mode(&self) -> ColorMode {
        ColorMode {
            pma: self.settings.pma_vertex_colors,
            tint_black: self.settings.tint_black,
        }
    }

    /// Start a new frame in `mesh`.
    pub fn begin(&mut self, mesh: &mut MeshBuffers) {
        mesh.positions.clear();
        mesh.uvs.clear();
        mesh.colors.clear();
        mesh.uv2.clear();
        mesh.uv3.clear();
        mesh.normals.clear();
        mesh.tangents.clear();
        mesh.set_submesh_count(0);
        mesh.bounds = MeshBounds::default();
        self.clipper.reset();
        self.bounds = BoundsAccumulator::default();
        self.thickness = 0.0;
        self.submesh_index = 0;
    }

    /// Append one submesh, clipping where the instruction asks for it.
    ///
    /// When `update_triangles` is false the submesh's index array is left as it was.
    pub fn add_submesh(
        &mut self,
        skeleton: &Skeleton,
        instruction: &SubmeshInstruction,
        mesh: &mut MeshBuffers,
        update_triangles: bool,
    ) {
        let submesh = self.submesh_index;
        mesh.set_submesh_count(submesh + 1);
        if update_triangles {
            mesh.submeshes[submesh].clear();
        }

        let use_clipping = self.settings.use_clipping && instruction.has_clipping;
        if use_clipping {
            if let Some(source) = instruction.pre_active_clipping {
                self.start_clip(skeleton, source);
            }
        }

        let mode = self.color_mode();
        let tint_black = self.settings.tint_black;
        let draw_order = skeleton.draw_order();
        let end = instruction.end_slot.min(draw_order.len());
        for (draw_index, &slot_index) in draw_order
            .iter()
            .enumerate()
            .take(end)
            .skip(instruction.start_slot)
        {
            let Some(slot) = skeleton.slot(slot_index) else {
                continue;
            };
            if !skeleton.slot_bone(slot).map_or(false, |b| b.active) {
                continue;
            }
            let attachment = slot.attachment();
            if !attachment.map_or(false, |a| a.is_renderable()) {
                if use_clipping && attachment.and_then(|a| a.as_clipping()).is_some() {
                    self.start_clip(skeleton, draw_index);
                    continue;
                }
                self.clipper.clip_end_with_slot(slot_index);
                continue;
            }

            if let Some(cache) = self.extractor.extract(skeleton, slot_index, mode) {
                if use_clipping && self.clipper.is_clipping() {
                    cache.clip(&mut self.clipper);
                }
                let z = self.settings.z_spacing * draw_index as f32;
                append_attachment(
                    mesh,
                    submesh,
                    cache,
                    z,
                    tint_black,
                    update_triangles,
                    &mut self.bounds,
                );
            }
            self.clipper.clip_end_with_slot(slot_index);
        }

        if end >= draw_order.len() {
            self.clipper.clip_end();
        } else {
            // The region may continue in the next submesh, which restarts it.
            self.clipper.reset();
        }

        self.thickness = instruction.end_slot as f32 * self.settings.z_spacing;
        mesh.bounds = self.bounds.finish(self.thickness);
        self.submesh_index += 1;
    }

    /// Build every submesh of `instruction` through [`MeshGenerator::add_submesh`].
    pub fn build_mesh(
        &mut self,
        skeleton: &Skeleton,
        instruction: &RendererInstruction,
        mesh: &mut MeshBuffers,
        update_triangles: bool,
    ) {
        for submesh in &instruction.submeshes {
            self.add_submesh(skeleton, submesh, mesh, update_triangles);
        }
        self.finish(mesh);
    }

    /// Build the mesh by filling arrays sized from the instruction's raw counts.
    ///
    /// Clipping attachments are ignored, so only use this when the instruction has no clipping.
    pub fn build_mesh_with_arrays(
        &mut self,
        skeleton: &Skeleton,
        instruction: &RendererInstruction,
        mesh: &mut MeshBuffers,
        update_triangles: bool,
    ) {
        let total = instruction.raw_vertex_count;
        let tint_black = self.settings.tint_black;
        mesh.positions.set_len(total);
        mesh.uvs.set_len(total);
        mesh.colors.set_len(total);
        if tint_black {
            mesh.uv2.set_len(total);
            mesh.uv3.set_len(total);
        }
        mesh.set_submesh_count(instruction.submeshes.len());

        let mode = self.color_mode();
        let draw_order = skeleton.draw_order();
        let mut vertex_index = 0;
        let mut last_end_slot = 0;

        'submeshes: for (si, submesh) in instruction.submeshes.iter().enumerate() {
            last_end_slot = submesh.end_slot;
            if update_triangles {
                mesh.submeshes[si].set_len(submesh.raw_triangle_count);
            }
            let mut triangle_index = 0;

            let end = submesh.end_slot.min(draw_order.len());
            for (draw_index, &slot_index) in draw_order
                .iter()
                .enumerate()
                .take(end)
                .skip(submesh.start_slot)
            {
                let Some(cache) = self.extractor.extract(skeleton, slot_index, mode) else {
                    continue;
                };
                let count = cache.vertices.len();
                let vertex_end = vertex_index + count;
                let triangle_end = triangle_index + cache.indices.len();
                if vertex_end > total
                    || cache.uvs.len() != count
                    || (update_triangles && triangle_end > submesh.raw_triangle_count)
                {
                    tracing::warn!(
                        draw_index,
                        "Renderer instruction does not match the skeleton, stopping mesh fill."
                    );
                    break 'submeshes;
                }

                let z = self.settings.z_spacing * draw_index as f32;
                let range = vertex_index..vertex_end;
                for (dst, p) in mesh.positions.as_mut_slice()[range.clone()]
                    .iter_mut()
                    .zip(&cache.vertices)
                {
                    *dst = p.extend(z);
                }
                mesh.uvs.as_mut_slice()[range.clone()].copy_from_slice(&cache.uvs);
                mesh.colors.as_mut_slice()[range.clone()].fill(cache.color.to_rgba8());
                if tint_black {
                    let (uv2, uv3) = tint_black_uvs(cache);
                    mesh.uv2.as_mut_slice()[range.clone()].fill(uv2);
                    mesh.uv3.as_mut_slice()[range].fill(uv3);
                }
                self.bounds.add(&cache.vertices);

                if update_triangles {
                    let first = vertex_index as u32;
                    for (dst, i) in mesh.submeshes[si].as_mut_slice()[triangle_index..triangle_end]
                        .iter_mut()
                        .zip(&cache.indices)
                    {
                        *dst = i + first;
                    }
                }
                triangle_index = triangle_end;
                vertex_index = vertex_end;
            }
        }

        self.thickness = last_end_slot as f32 * self.settings.z_spacing;
        mesh.bounds = self.bounds.finish(self.thickness);
        self.finish(mesh);
    }

    /// Fill normals and tangents and zero stale storage. Called by both build methods.
    pub fn finish(&mut self, mesh: &mut MeshBuffers) {
        let vertex_count = mesh.positions.len();
        if self.settings.add_normals {
            mesh.normals.clear();
            mesh.normals.extend_repeat(MESH_NORMAL, vertex_count);
        }
        if self.settings.calculate_tangents {
            let count = mesh.submesh_count;
            solve_tangents_2d(
                mesh.positions.as_slice(),
                mesh.uvs.as_slice(),
                mesh.submeshes[..count].iter().map(|s| s.as_slice()),
                &mut self.tangent_scratch,
                &mut mesh.tangents,
            );
        }
        mesh.zero_tails();
    }

    fn start_clip(&mut self, skeleton: &Skeleton, draw_index: usize) {
        let Some(&slot_index) = skeleton.draw_order().get(draw_index) else {
            return;
        };
        let Some(slot) = skeleton.slot(slot_index) else {
            return;
        };
        let (Some(bone), Some(attachment)) = (skeleton.slot_bone(slot), slot.attachment()) else {
            return;
        };
        let Some(clip) = attachment.as_clipping() else {
            return;
        };
        attachment.compute_world_vertices(skeleton.bones(), bone, &slot.deform, &mut self.clip_polygon);
        self.clipper
            .clip_start(slot_index, clip.end_slot, &self.clip_polygon);
    }
}

fn tint_black_uvs(cache: &RenderAttachmentCache) -> (Vec2, Vec2) {
    let dark = cache.dark_color;
    (Vec2::new(dark.r, dark.g), Vec2::new(dark.b, 1.0))
}

fn append_attachment(
    mesh: &mut MeshBuffers,
    submesh: usize,
    cache: &RenderAttachmentCache,
    z: f32,
    tint_black: bool,
    update_triangles: bool,
    bounds: &mut BoundsAccumulator,
) {
    let positions = cache.positions();
    if cache.skip_render || positions.is_empty() {
        return;
    }
    let count = positions.len();
    let first = mesh.positions.len() as u32;

    mesh.positions
        .extend(positions.iter().map(|p| Vec3::new(p.x, p.y, z)));
    mesh.uvs.extend_from_slice(cache.render_uvs());
    mesh.colors.extend_repeat(cache.color.to_rgba8(), count);
    if tint_black {
        let (uv2, uv3) = tint_black_uvs(cache);
        mesh.uv2.extend_repeat(uv2, count);
        mesh.uv3.extend_repeat(uv3, count);
    }
    bounds.add(positions);

    if update_triangles {
        mesh.submeshes[submesh].extend(cache.render_indices().iter().map(|i| i + first));
    }
}

#[cfg(test)]
mod tests {
    use skelmesh_pose::prelude::*;

    use super::*;
    use crate::instruction::generate_instruction;

    fn quad_skeleton() -> Skeleton {
        let material = Handle::new();
        let layout = RegionLayout {
            size: Vec2::new(2.0, 2.0),
            ..Default::default()
        };
        Skeleton::new(
            vec![Bone::new("root")],
            vec![Slot::new("quad", 0).with_attachment(Attachment::Region(RegionAttachment::new(
                "quad", material, &layout,
            )))],
        )
        .unwrap()
    }

    fn instruction(skeleton: &Skeleton) -> RendererInstruction {
        let mut instruction = RendererInstruction::default();
        generate_instruction(&mut instruction, skeleton, &Default::default(), &[], false);
        instruction
    }

    #[test]
    fn region_becomes_two_triangles() {
        let skeleton = quad_skeleton();
        let instruction = instruction(&skeleton);
        let mut generator = MeshGenerator::new(MeshSettings::default());
        let mut mesh = MeshBuffers::new();
        generator.begin(&mut mesh);
        generator.build_mesh(&skeleton, &instruction, &mut mesh, true);

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.submesh_count(), 1);
        assert_eq!(mesh.submesh(0), &[0, 1, 2, 2, 3, 0]);
        assert_eq!(mesh.colors()[0], [255, 255, 255, 255]);
        assert_eq!(mesh.bounds().min, Vec2::new(-1.0, -1.0));
        assert_eq!(mesh.bounds().max, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn empty_skeleton_has_zero_bounds() {
        let skeleton = Skeleton::new(vec![Bone::new("root")], vec![Slot::new("s", 0)]).unwrap();
        let instruction = instruction(&skeleton);
        let mut generator = MeshGenerator::new(MeshSettings::default());
        let mut mesh = MeshBuffers::new();
        generator.begin(&mut mesh);
        generator.build_mesh_with_arrays(&skeleton, &instruction, &mut mesh, true);

        assert_eq!(mesh.vertex_count(), 0);
        assert_eq!(mesh.submesh_count(), 0);
        assert_eq!(mesh.bounds(), MeshBounds::default());
    }

    #[test]
    fn extras_follow_settings() {
        let skeleton = quad_skeleton();
        let instruction = instruction(&skeleton);
        let mut generator = MeshGenerator::new(MeshSettings {
            tint_black: true,
            add_normals: true,
            calculate_tangents: true,
            z_spacing: 0.5,
            ..Default::default()
        });
        let mut mesh = MeshBuffers::new();
        generator.begin(&mut mesh);
        generator.build_mesh(&skeleton, &instruction, &mut mesh, true);

        assert_eq!(mesh.uv2(), &[Vec2::ZERO; 4]);
        assert_eq!(mesh.uv3(), &[Vec2::new(0.0, 1.0); 4]);
        assert_eq!(mesh.normals(), &[MESH_NORMAL; 4]);
        assert_eq!(mesh.tangents().len(), 4);
        assert_eq!(mesh.bounds().thickness, 0.5);

        generator.settings_mut().tint_black = false;
        generator.begin(&mut mesh);
        generator.build_mesh(&skeleton, &instruction, &mut mesh, true);
        assert!(mesh.uv2().is_empty());
    }
}
