//! World space geometry and color extraction, cached per slot and attachment.

use fxhash::FxHashMap;
use glam::Vec2;
use skelmesh_clipping::clipper::SkeletonClipper;
use skelmesh_pose::prelude::*;

/// Geometry left after clipping an attachment.
///
/// Buffers are reused between frames and only grow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClippedGeometry {
    /// World positions.
    pub vertices: Vec<Vec2>,
    /// Texture coordinates.
    pub uvs: Vec<Vec2>,
    /// Triangle indices into `vertices`.
    pub indices: Vec<u32>,
}

/// Per slot and attachment render data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderAttachmentCache {
    /// World positions.
    pub vertices: Vec<Vec2>,
    /// Texture coordinates.
    pub uvs: Vec<Vec2>,
    /// Triangle indices into `vertices`.
    pub indices: Vec<u32>,
    /// Resolved vertex color.
    pub color: Color,
    /// Resolved tint-black color.
    pub dark_color: Color,
    /// Whether `clipped_geometry` holds this frame's output.
    pub clipped: bool,
    /// Output of the last clip.
    pub clipped_geometry: ClippedGeometry,
    /// Clipping removed the whole attachment this frame.
    pub skip_render: bool,
    /// Material the attachment renders with.
    pub material: Option<Handle<Material>>,
}

impl RenderAttachmentCache {
    /// Positions to render, clipped or not.
    pub fn positions(&self) -> &[Vec2] {
        if self.clipped {
            &self.clipped_geometry.vertices
        } else {
            &self.vertices
        }
    }

    /// Texture coordinates to render.
    pub fn render_uvs(&self) -> &[Vec2] {
        if self.clipped {
            &self.clipped_geometry.uvs
        } else {
            &self.uvs
        }
    }

    /// Triangle indices to render.
    pub fn render_indices(&self) -> &[u32] {
        if self.clipped {
            &self.clipped_geometry.indices
        } else {
            &self.indices
        }
    }

    /// Clip the raw geometry against the clipper's active region.
    pub fn clip(&mut self, clipper: &mut SkeletonClipper) {
        clipper.clip_triangles(&self.vertices, &self.indices, &self.uvs, None);
        let clipped = &mut self.clipped_geometry;
        clipped.vertices.clear();
        clipped.vertices.extend_from_slice(clipper.clipped_vertices());
        clipped.uvs.clear();
        clipped.uvs.extend_from_slice(clipper.clipped_uvs());
        clipped.indices.clear();
        clipped.indices.extend_from_slice(clipper.clipped_triangles());
        self.clipped = true;
        self.skip_render = clipped.indices.is_empty();
    }

    /// Drop the effect of a previous clip.
    pub fn clear_clip(&mut self) {
        self.clipped = false;
        self.skip_render = false;
    }
}

/// Color flags used when resolving vertex colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorMode {
    /// Premultiply by alpha, zeroing alpha for additive slots.
    pub pma: bool,
    /// Resolve the tint-black color.
    pub tint_black: bool,
}

/// Resolve the vertex color of an attachment on a slot.
///
/// The skeleton, slot and attachment tints are multiplied together. With premultiplied alpha the
/// RGB channels are scaled by the resulting alpha and additive slots end with an alpha of zero.
pub fn resolve_color(skeleton: Color, slot: &Slot, attachment: Color, pma: bool) -> Color {
    let color = skeleton * slot.color * attachment;
    if !pma {
        return color;
    }
    let color = color.premultiplied();
    if slot.blend_mode == BlendMode::Additive {
        color.with_a(0.0)
    } else {
        color
    }
}

/// Resolve the tint-black color of an attachment on a slot.
///
/// Slots without a dark color use black. With premultiplied alpha the color is scaled by the alpha
/// of the resolved primary color.
pub fn resolve_dark_color(skeleton: Color, slot: &Slot, attachment: Color, pma: bool) -> Color {
    let dark = slot.dark_color.unwrap_or(Color::BLACK).with_a(1.0);
    if pma {
        dark * (skeleton.a * slot.color.a * attachment.a)
    } else {
        dark
    }
}

/// Computes world geometry for renderable attachments and keeps it cached.
///
/// Entries are keyed by slot index and attachment id, so swapping the attachment on a slot gets
/// a separate entry instead of overwriting the old one.
#[derive(Debug, Default, Clone)]
pub struct GeometryExtractor {
    cache: FxHashMap<(usize, AttachmentId), RenderAttachmentCache>,
}

impl GeometryExtractor {
    /// Create an empty extractor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the cache entry for a slot's current attachment.
    ///
    /// Returns `None` for slots that produce no geometry: missing slot, inactive bone, empty slot
    /// or non renderable attachment. A previous clip on the entry is cleared.
    pub fn extract(
        &mut self,
        skeleton: &Skeleton,
        slot_index: usize,
        mode: ColorMode,
    ) -> Option<&mut RenderAttachmentCache> {
        let slot = skeleton.slot(slot_index)?;
        let bone = skeleton.slot_bone(slot)?;
        let attachment = slot.attachment()?;
        if !bone.active || !attachment.is_renderable() {
            return None;
        }

        let entry = self.cache.entry((slot_index, attachment.id())).or_default();
        attachment.compute_world_vertices(skeleton.bones(), bone, &slot.deform, &mut entry.vertices);
        entry.uvs.clear();
        entry.uvs.extend_from_slice(attachment.uvs());
        if entry.indices.as_slice() != attachment.triangles() {
            entry.indices.clear();
            entry.indices.extend_from_slice(attachment.triangles());
        }

        let attachment_color = attachment.color();
        entry.color = resolve_color(skeleton.color, slot, attachment_color, mode.pma);
        entry.dark_color = if mode.tint_black {
            resolve_dark_color(skeleton.color, slot, attachment_color, mode.pma)
        } else {
            Color::BLACK
        };
        entry.material = attachment.material();
        entry.clear_clip();
        Some(entry)
    }

    /// The cache entry for a slot and attachment, if one was extracted.
    pub fn get(&self, slot_index: usize, attachment: AttachmentId) -> Option<&RenderAttachmentCache> {
        self.cache.get(&(slot_index, attachment))
    }

    /// Number of cache entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drop entries for attachments no longer shown by their slot.
    pub fn retain_attached(&mut self, skeleton: &Skeleton) {
        self.cache.retain(|(slot, id), _| {
            skeleton
                .slot(*slot)
                .and_then(|s| s.attachment())
                .map_or(false, |a| a.id() == *id)
        });
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn region(material: Handle<Material>) -> Attachment {
        Attachment::Region(RegionAttachment::new(
            "region",
            material,
            &RegionLayout::default(),
        ))
    }

    #[test]
    fn additive_pma_zeroes_alpha() {
        let slot = Slot::new("s", 0)
            .with_color(Color::rgba(1.0, 1.0, 1.0, 0.5))
            .with_blend_mode(BlendMode::Additive);
        let color = resolve_color(Color::WHITE, &slot, Color::WHITE, true);
        assert_eq!(color, Color::rgba(0.5, 0.5, 0.5, 0.0));
        assert_eq!(color.to_rgba8()[3], 0);

        let straight = resolve_color(Color::WHITE, &slot, Color::WHITE, false);
        assert_eq!(straight.a, 0.5);
    }

    #[test]
    fn tints_multiply() {
        let slot = Slot::new("s", 0).with_color(Color::rgba(0.5, 1.0, 1.0, 1.0));
        let color = resolve_color(
            Color::rgba(1.0, 0.5, 1.0, 1.0),
            &slot,
            Color::rgba(1.0, 1.0, 0.5, 0.5),
            true,
        );
        assert_eq!(color, Color::rgba(0.25, 0.25, 0.25, 0.5));

        let mut slot = slot;
        slot.dark_color = Some(Color::rgb(1.0, 0.5, 0.0));
        let dark = resolve_dark_color(Color::WHITE, &slot, Color::rgba(1.0, 1.0, 1.0, 0.5), true);
        assert_eq!(dark, Color::rgba(0.5, 0.25, 0.0, 1.0));
    }

    #[test]
    fn extraction_is_idempotent() {
        let material = Handle::new();
        let skeleton = Skeleton::new(
            vec![Bone::new("root")],
            vec![Slot::new("s", 0).with_attachment(region(material))],
        )
        .unwrap();
        let mut extractor = GeometryExtractor::new();
        let first = extractor
            .extract(&skeleton, 0, ColorMode::default())
            .cloned()
            .unwrap();
        let second = extractor
            .extract(&skeleton, 0, ColorMode::default())
            .cloned()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.vertices.len(), 4);
        assert_eq!(first.material, Some(material));
        assert_eq!(extractor.len(), 1);
    }

    #[test]
    fn skips_what_does_not_render() {
        let mut skeleton = Skeleton::new(
            vec![Bone::new("root"), Bone::new("hidden")],
            vec![
                Slot::new("empty", 0),
                Slot::new("point", 0).with_attachment(Attachment::Point(PointAttachment::new(
                    "p",
                    Vec2::ZERO,
                    0.0,
                ))),
                Slot::new("inactive", 1).with_attachment(region(Handle::new())),
            ],
        )
        .unwrap();
        skeleton.bones_mut()[1].active = false;

        let mut extractor = GeometryExtractor::new();
        for slot in 0..4 {
            assert!(extractor.extract(&skeleton, slot, ColorMode::default()).is_none());
        }
        assert!(extractor.is_empty());
    }

    #[test]
    fn swapped_attachments_get_their_own_entry() {
        let mut skeleton = Skeleton::new(
            vec![Bone::new("root")],
            vec![Slot::new("s", 0).with_attachment(region(Handle::new()))],
        )
        .unwrap();
        let mut extractor = GeometryExtractor::new();
        extractor.extract(&skeleton, 0, ColorMode::default());

        skeleton
            .set_attachment(0, Some(Arc::new(region(Handle::new()))))
            .unwrap();
        extractor.extract(&skeleton, 0, ColorMode::default());
        assert_eq!(extractor.len(), 2);

        extractor.retain_attached(&skeleton);
        assert_eq!(extractor.len(), 1);
    }
}
