//! Submesh partitioning of the draw order and topology change detection.

use fxhash::FxHashMap;
use skelmesh_pose::prelude::*;

/// A contiguous run of draw order slots rendered with one material.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubmeshInstruction {
    /// First draw order index covered.
    pub start_slot: usize,
    /// Draw order index one past the last covered.
    pub end_slot: usize,
    /// Material shared by every attachment in the range.
    pub material: Handle<Material>,
    /// Vertices before clipping.
    pub raw_vertex_count: usize,
    /// Triangle indices before clipping.
    pub raw_triangle_count: usize,
    /// Index of the submesh's first vertex in the whole mesh, before clipping.
    pub raw_first_vertex: usize,
    /// The range contains a clipping attachment or starts inside a clip region.
    pub has_clipping: bool,
    /// A separator slot split this submesh from the previous one.
    pub force_separate: bool,
    /// Draw order index of the clipping attachment already open at `start_slot`.
    pub pre_active_clipping: Option<usize>,
}

impl SubmeshInstruction {
    fn new(start_slot: usize, material: Handle<Material>, raw_first_vertex: usize) -> Self {
        Self {
            start_slot,
            end_slot: start_slot,
            material,
            raw_vertex_count: 0,
            raw_triangle_count: 0,
            raw_first_vertex,
            has_clipping: false,
            force_separate: false,
            pre_active_clipping: None,
        }
    }

    /// Number of draw order slots covered.
    pub fn slot_count(&self) -> usize {
        self.end_slot - self.start_slot
    }
}

/// The full partition of one frame's draw order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RendererInstruction {
    /// Submeshes in draw order.
    pub submeshes: Vec<SubmeshInstruction>,
    /// Attachment shown at each draw order index, `None` for empty or hidden slots.
    pub attachments: Vec<Option<AttachmentId>>,
    /// Total vertices before clipping.
    pub raw_vertex_count: usize,
    /// Some clipping attachment is drawn this frame.
    pub has_active_clipping: bool,
    /// Triangles are promised never to change.
    pub immutable_triangles: bool,
}

impl RendererInstruction {
    /// Reset to an empty partition, keeping allocations.
    pub fn clear(&mut self) {
        self.submeshes.clear();
        self.attachments.clear();
        self.raw_vertex_count = 0;
        self.has_active_clipping = false;
        self.immutable_triangles = false;
    }

    /// Copy another instruction into this one, reusing allocations.
    pub fn set(&mut self, other: &RendererInstruction) {
        self.clone_from(other);
    }

    /// Set this instruction to the submeshes `start..end` of `source`.
    ///
    /// First vertex offsets are recomputed from zero. Out of range bounds are clamped.
    pub fn set_with_subset(&mut self, source: &RendererInstruction, start: usize, end: usize) {
        self.clear();
        self.immutable_triangles = source.immutable_triangles;
        let end = end.min(source.submeshes.len());
        let start = start.min(end);
        let subset = &source.submeshes[start..end];

        let mut first_vertex = 0;
        for submesh in subset {
            let mut submesh = *submesh;
            submesh.raw_first_vertex = first_vertex;
            first_vertex += submesh.raw_vertex_count;
            self.has_active_clipping |= submesh.has_clipping;
            self.submeshes.push(submesh);
        }
        self.raw_vertex_count = first_vertex;

        if let (Some(first), Some(last)) = (subset.first(), subset.last()) {
            let end = last.end_slot.min(source.attachments.len());
            let start = first.start_slot.min(end);
            self.attachments.resize(start, None);
            self.attachments
                .extend_from_slice(&source.attachments[start..end]);
        }
    }
}

/// Renderable material and raw sizes of an attachment.
fn renderable(attachment: &Attachment) -> Option<(Handle<Material>, usize, usize)> {
    let material = attachment.material()?;
    Some((
        material,
        attachment.raw_vertex_count(),
        attachment.raw_index_count(),
    ))
}

/// Partition the draw order into submeshes.
///
/// A new submesh starts when a renderable slot's material differs from the current one, when the
/// slot is a separator, or when a non renderable separator slot was passed since the last
/// renderable one. `separators` and `custom_slot_materials` are keyed by slot index.
pub fn generate_instruction(
    output: &mut RendererInstruction,
    skeleton: &Skeleton,
    custom_slot_materials: &FxHashMap<usize, Handle<Material>>,
    separators: &[usize],
    immutable_triangles: bool,
) {
    output.clear();
    output.immutable_triangles = immutable_triangles;
    let draw_order = skeleton.draw_order();
    output.attachments.resize(draw_order.len(), None);

    let mut current: Option<SubmeshInstruction> = None;
    let mut pending_separate = false;
    let mut clipping_before_start = false;
    let mut clip_source: Option<usize> = None;
    let mut clip_end_slot: Option<usize> = None;
    let mut total_raw_vertices = 0;

    for (i, &slot_index) in draw_order.iter().enumerate() {
        let Some(slot) = skeleton.slot(slot_index) else {
            continue;
        };
        if !skeleton.slot_bone(slot).map_or(false, |b| b.active) {
            continue;
        }
        let attachment = slot.attachment();
        output.attachments[i] = attachment.map(|a| a.id());
        let is_separator = separators.contains(&slot_index);

        match attachment.and_then(|a| renderable(a)) {
            Some((material, vertex_count, index_count)) => {
                let material = custom_slot_materials
                    .get(&slot_index)
                    .copied()
                    .unwrap_or(material);
                let separate = is_separator || pending_separate;
                let split = current
                    .as_ref()
                    .map_or(false, |c| separate || c.material != material);
                if split {
                    if let Some(mut done) = current.take() {
                        done.end_slot = i;
                        output.submeshes.push(done);
                    }
                }
                let submesh = current.get_or_insert_with(|| {
                    if output.submeshes.is_empty() {
                        // The first submesh also owns any leading empty slots.
                        let mut submesh = SubmeshInstruction::new(0, material, 0);
                        submesh.has_clipping = clipping_before_start;
                        submesh
                    } else {
                        let mut submesh = SubmeshInstruction::new(i, material, total_raw_vertices);
                        submesh.pre_active_clipping = clip_source;
                        submesh.has_clipping = clip_source.is_some();
                        submesh.force_separate = separate;
                        submesh
                    }
                });
                submesh.raw_vertex_count += vertex_count;
                submesh.raw_triangle_count += index_count;
                total_raw_vertices += vertex_count;
                pending_separate = false;
            }
            None => {
                if is_separator && current.is_some() {
                    pending_separate = true;
                }
                if let Some(clip) = attachment.and_then(|a| a.as_clipping()) {
                    clip_source = Some(i);
                    clip_end_slot = clip.end_slot;
                    output.has_active_clipping = true;
                    match current.as_mut() {
                        Some(submesh) => submesh.has_clipping = true,
                        None => clipping_before_start = true,
                    }
                }
            }
        }

        if clip_end_slot == Some(slot_index) && clip_source != Some(i) {
            clip_source = None;
            clip_end_slot = None;
        }
    }

    if let Some(mut last) = current {
        last.end_slot = draw_order.len();
        output.submeshes.push(last);
    }
    output.raw_vertex_count = total_raw_vertices;
}

/// Cover the whole draw order with one submesh.
///
/// With no `material` the last renderable attachment's material is used. Produces no submesh when
/// nothing is renderable.
pub fn generate_single_submesh_instruction(
    output: &mut RendererInstruction,
    skeleton: &Skeleton,
    material: Option<Handle<Material>>,
    immutable_triangles: bool,
) {
    output.clear();
    output.immutable_triangles = immutable_triangles;
    let draw_order = skeleton.draw_order();
    output.attachments.resize(draw_order.len(), None);

    let mut submesh = SubmeshInstruction::new(0, material.unwrap_or_default(), 0);
    submesh.end_slot = draw_order.len();
    let mut last_material = None;
    let mut any_renderable = false;

    for (i, (_, slot)) in skeleton.drawn_slots().enumerate() {
        if !skeleton.slot_bone(slot).map_or(false, |b| b.active) {
            continue;
        }
        let Some(attachment) = slot.attachment() else {
            continue;
        };
        output.attachments[i] = Some(attachment.id());
        if let Some((attachment_material, vertex_count, index_count)) = renderable(attachment) {
            any_renderable = true;
            last_material = Some(attachment_material);
            submesh.raw_vertex_count += vertex_count;
            submesh.raw_triangle_count += index_count;
        } else if attachment.as_clipping().is_some() {
            submesh.has_clipping = true;
            output.has_active_clipping = true;
        }
    }

    if let Some(material) = material.or(last_material) {
        submesh.material = material;
    }
    output.raw_vertex_count = submesh.raw_vertex_count;
    if any_renderable {
        output.submeshes.push(submesh);
    }
}

/// Swap submesh materials according to `overrides`.
pub fn replace_materials(
    submeshes: &mut [SubmeshInstruction],
    overrides: &FxHashMap<Handle<Material>, Handle<Material>>,
) {
    for submesh in submeshes {
        if let Some(replacement) = overrides.get(&submesh.material) {
            submesh.material = *replacement;
        }
    }
}

/// Whether the triangle topology of `current` may differ from `previous`.
///
/// Clipped frames always count as changed since their vertex and triangle counts are not known
/// before clipping.
pub fn geometry_changed(current: &RendererInstruction, previous: &RendererInstruction) -> bool {
    if current.has_active_clipping || previous.has_active_clipping {
        return true;
    }
    if current.raw_vertex_count != previous.raw_vertex_count
        || current.immutable_triangles != previous.immutable_triangles
        || current.attachments.len() != previous.attachments.len()
        || current.submeshes.len() != previous.submeshes.len()
    {
        return true;
    }
    if current.attachments != previous.attachments {
        return true;
    }
    current
        .submeshes
        .iter()
        .zip(&previous.submeshes)
        .any(|(a, b)| {
            a.start_slot != b.start_slot
                || a.end_slot != b.end_slot
                || a.raw_vertex_count != b.raw_vertex_count
                || a.raw_triangle_count != b.raw_triangle_count
                || a.raw_first_vertex != b.raw_first_vertex
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(name: &str, material: Handle<Material>) -> Attachment {
        Attachment::Region(RegionAttachment::new(
            name,
            material,
            &RegionLayout::default(),
        ))
    }

    fn clip(end_slot: Option<usize>) -> Attachment {
        Attachment::Clipping(ClippingAttachment::new(
            "clip",
            MeshVertices::Rigid(vec![Vec2::ZERO, Vec2::Y, Vec2::ONE]),
            end_slot,
        ))
    }

    fn skeleton(slots: Vec<Slot>) -> Skeleton {
        Skeleton::new(vec![Bone::new("root")], slots).unwrap()
    }

    fn partition(skeleton: &Skeleton, separators: &[usize]) -> RendererInstruction {
        let mut output = RendererInstruction::default();
        generate_instruction(&mut output, skeleton, &FxHashMap::default(), separators, false);
        output
    }

    #[test]
    fn leading_empty_slots_belong_to_first_submesh() {
        let a = Handle::new();
        let skeleton = skeleton(vec![
            Slot::new("empty", 0),
            Slot::new("a", 0).with_attachment(region("a", a)),
        ]);
        let output = partition(&skeleton, &[]);
        assert_eq!(output.submeshes.len(), 1);
        assert_eq!(output.submeshes[0].start_slot, 0);
        assert_eq!(output.submeshes[0].end_slot, 2);
        assert_eq!(output.attachments[0], None);
    }

    #[test]
    fn empty_separator_splits_next_renderable() {
        let a = Handle::new();
        let skeleton = skeleton(vec![
            Slot::new("a", 0).with_attachment(region("a", a)),
            Slot::new("sep", 0),
            Slot::new("b", 0).with_attachment(region("b", a)),
        ]);
        let output = partition(&skeleton, &[1]);
        let ranges: Vec<_> = output
            .submeshes
            .iter()
            .map(|s| (s.start_slot, s.end_slot, s.force_separate))
            .collect();
        assert_eq!(ranges, [(0, 2, false), (2, 3, true)]);
        assert_eq!(output.submeshes[1].raw_first_vertex, 4);
    }

    #[test]
    fn clip_region_spanning_submeshes_is_pre_active() {
        let (a, b) = (Handle::new(), Handle::new());
        let skeleton = skeleton(vec![
            Slot::new("a", 0).with_attachment(region("a", a)),
            Slot::new("clip", 0).with_attachment(clip(Some(3))),
            Slot::new("a2", 0).with_attachment(region("a2", a)),
            Slot::new("b", 0).with_attachment(region("b", b)),
            Slot::new("b2", 0).with_attachment(region("b2", b)),
        ]);
        let output = partition(&skeleton, &[]);
        assert!(output.has_active_clipping);
        assert_eq!(output.submeshes.len(), 2);

        let first = output.submeshes[0];
        assert_eq!((first.start_slot, first.end_slot), (0, 3));
        assert!(first.has_clipping);
        assert_eq!(first.pre_active_clipping, None);

        let second = output.submeshes[1];
        assert_eq!((second.start_slot, second.end_slot), (3, 5));
        assert!(second.has_clipping);
        assert_eq!(second.pre_active_clipping, Some(1));
    }

    #[test]
    fn ended_clip_region_is_not_carried() {
        let (a, b) = (Handle::new(), Handle::new());
        let skeleton = skeleton(vec![
            Slot::new("clip", 0).with_attachment(clip(Some(1))),
            Slot::new("a", 0).with_attachment(region("a", a)),
            Slot::new("b", 0).with_attachment(region("b", b)),
        ]);
        let output = partition(&skeleton, &[]);
        assert_eq!(output.submeshes.len(), 2);
        assert!(output.submeshes[0].has_clipping);
        assert!(!output.submeshes[1].has_clipping);
        assert_eq!(output.submeshes[1].pre_active_clipping, None);
    }

    #[test]
    fn custom_slot_material_and_overrides() {
        let (a, custom, replaced) = (Handle::new(), Handle::new(), Handle::new());
        let skeleton = skeleton(vec![
            Slot::new("a", 0).with_attachment(region("a", a)),
            Slot::new("b", 0).with_attachment(region("b", a)),
        ]);
        let mut custom_slots = FxHashMap::default();
        custom_slots.insert(1, custom);
        let mut output = RendererInstruction::default();
        generate_instruction(&mut output, &skeleton, &custom_slots, &[], false);
        assert_eq!(output.submeshes.len(), 2);
        assert_eq!(output.submeshes[1].material, custom);

        let mut overrides = FxHashMap::default();
        overrides.insert(custom, replaced);
        replace_materials(&mut output.submeshes, &overrides);
        assert_eq!(output.submeshes[0].material, a);
        assert_eq!(output.submeshes[1].material, replaced);
    }

    #[test]
    fn single_submesh() {
        let (a, b, fixed) = (Handle::new(), Handle::new(), Handle::new());
        let skeleton = skeleton(vec![
            Slot::new("a", 0).with_attachment(region("a", a)),
            Slot::new("b", 0).with_attachment(region("b", b)),
        ]);
        let mut output = RendererInstruction::default();
        generate_single_submesh_instruction(&mut output, &skeleton, None, false);
        assert_eq!(output.submeshes.len(), 1);
        assert_eq!(output.submeshes[0].material, b);
        assert_eq!(output.submeshes[0].raw_vertex_count, 8);
        assert_eq!(output.submeshes[0].raw_triangle_count, 12);

        generate_single_submesh_instruction(&mut output, &skeleton, Some(fixed), false);
        assert_eq!(output.submeshes[0].material, fixed);

        let empty = self::skeleton(vec![Slot::new("e", 0)]);
        generate_single_submesh_instruction(&mut output, &empty, Some(fixed), false);
        assert!(output.submeshes.is_empty());
    }

    #[test]
    fn subset_recomputes_offsets() {
        let (a, b, c) = (Handle::new(), Handle::new(), Handle::new());
        let skeleton = skeleton(vec![
            Slot::new("a", 0).with_attachment(region("a", a)),
            Slot::new("b", 0).with_attachment(region("b", b)),
            Slot::new("c", 0).with_attachment(region("c", c)),
        ]);
        let source = partition(&skeleton, &[]);
        let mut subset = RendererInstruction::default();
        subset.set_with_subset(&source, 1, 3);
        assert_eq!(subset.submeshes.len(), 2);
        assert_eq!(subset.submeshes[0].raw_first_vertex, 0);
        assert_eq!(subset.submeshes[1].raw_first_vertex, 4);
        assert_eq!(subset.raw_vertex_count, 8);
        assert_eq!(subset.attachments.len(), 3);
        assert_eq!(subset.attachments[0], None);
    }
}
