//! Bones, slots and the draw order of a posed skeleton.

use std::sync::Arc;

use glam::{Affine2, Vec2};

use crate::{attachment::Attachment, color::Color, error::PoseError};

/// A bone with its solved world transform.
#[derive(Clone, Debug)]
pub struct Bone {
    /// Bone name.
    pub name: String,
    /// World transform, written by the pose solver.
    pub world: Affine2,
    /// Inactive bones hide every slot attached to them.
    pub active: bool,
}

impl Bone {
    /// Create an active bone at the origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world: Affine2::IDENTITY,
            active: true,
        }
    }

    /// Set the world transform.
    pub fn with_world(mut self, world: Affine2) -> Self {
        self.world = world;
        self
    }

    /// Transform a point from bone space to world space.
    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.world.transform_point2(point)
    }
}

/// How a slot's pixels combine with what is behind them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlendMode {
    /// Source over.
    #[default]
    Normal,
    /// Additive.
    Additive,
    /// Multiply.
    Multiply,
    /// Screen.
    Screen,
}

/// A named attachment point on a bone.
#[derive(Clone, Debug)]
pub struct Slot {
    /// Slot name.
    pub name: String,
    /// Index of the owning bone.
    pub bone: usize,
    /// Tint.
    pub color: Color,
    /// Tint-black color, when the slot uses two color tinting.
    pub dark_color: Option<Color>,
    /// Blend mode.
    pub blend_mode: BlendMode,
    /// Vertex override for the current attachment. Empty when unused.
    pub deform: Vec<Vec2>,
    attachment: Option<Arc<Attachment>>,
}

impl Slot {
    /// Create an empty slot on a bone.
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            color: Color::WHITE,
            dark_color: None,
            blend_mode: BlendMode::Normal,
            deform: Vec::new(),
            attachment: None,
        }
    }

    /// Set the attachment.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(Arc::new(attachment));
        self
    }

    /// Set the tint.
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    /// Set the blend mode.
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// The current attachment.
    pub fn attachment(&self) -> Option<&Arc<Attachment>> {
        self.attachment.as_ref()
    }
}

/// A posed skeleton: bones, slots and the order slots are drawn in.
#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<Bone>,
    slots: Vec<Slot>,
    draw_order: Vec<usize>,
    /// Tint applied to every slot.
    pub color: Color,
}

impl Skeleton {
    /// Build a skeleton, drawing slots in creation order.
    pub fn new(bones: Vec<Bone>, slots: Vec<Slot>) -> Result<Self, PoseError> {
        let skeleton = Self {
            draw_order: (0..slots.len()).collect(),
            bones,
            slots,
            color: Color::WHITE,
        };
        for slot in &skeleton.slots {
            skeleton.check_bone(slot.bone)?;
            if let Some(attachment) = &slot.attachment {
                skeleton.check_attachment(attachment)?;
                skeleton.check_deform(attachment, &slot.deform)?;
            }
        }
        Ok(skeleton)
    }

    /// All bones.
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Bones, for the pose solver to write world transforms into.
    pub fn bones_mut(&mut self) -> &mut [Bone] {
        &mut self.bones
    }

    /// All slots, in creation order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Get a slot by creation index.
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Find a slot's creation index by name.
    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    /// The bone a slot is attached to.
    pub fn slot_bone(&self, slot: &Slot) -> Option<&Bone> {
        self.bones.get(slot.bone)
    }

    /// Slot creation indices in the order they are drawn.
    pub fn draw_order(&self) -> &[usize] {
        &self.draw_order
    }

    /// Iterate `(slot index, slot)` in draw order.
    pub fn drawn_slots(&self) -> impl Iterator<Item = (usize, &Slot)> + '_ {
        self.draw_order
            .iter()
            .filter_map(|&i| self.slots.get(i).map(|s| (i, s)))
    }

    /// Replace the draw order. It must be a permutation of the slot indices.
    pub fn set_draw_order(&mut self, draw_order: Vec<usize>) -> Result<(), PoseError> {
        let mut seen = vec![false; self.slots.len()];
        let valid = draw_order.len() == self.slots.len()
            && draw_order
                .iter()
                .all(|&i| i < seen.len() && !std::mem::replace(&mut seen[i], true));
        if !valid {
            return Err(PoseError::InvalidDrawOrder {
                slot_count: self.slots.len(),
            });
        }
        self.draw_order = draw_order;
        Ok(())
    }

    /// Restore creation order.
    pub fn reset_draw_order(&mut self) {
        self.draw_order = (0..self.slots.len()).collect();
    }

    /// Change the attachment shown by a slot. The slot's deform is cleared.
    pub fn set_attachment(
        &mut self,
        slot: usize,
        attachment: Option<Arc<Attachment>>,
    ) -> Result<(), PoseError> {
        if let Some(attachment) = &attachment {
            self.check_attachment(attachment)?;
        }
        let count = self.slots.len();
        let slot = self
            .slots
            .get_mut(slot)
            .ok_or(PoseError::MissingSlot { index: slot, count })?;
        slot.attachment = attachment;
        slot.deform.clear();
        Ok(())
    }

    /// Set a slot's vertex override. Pass an empty vector to remove it.
    pub fn set_deform(&mut self, slot: usize, deform: Vec<Vec2>) -> Result<(), PoseError> {
        let count = self.slots.len();
        let target = self
            .slots
            .get(slot)
            .ok_or(PoseError::MissingSlot { index: slot, count })?;
        if let Some(attachment) = &target.attachment {
            self.check_deform(attachment, &deform)?;
        }
        self.slots[slot].deform = deform;
        Ok(())
    }

    /// Set a slot's tint.
    pub fn set_slot_color(&mut self, slot: usize, color: Color) -> Result<(), PoseError> {
        let count = self.slots.len();
        self.slots
            .get_mut(slot)
            .ok_or(PoseError::MissingSlot { index: slot, count })?
            .color = color;
        Ok(())
    }

    fn check_bone(&self, index: usize) -> Result<(), PoseError> {
        if index < self.bones.len() {
            Ok(())
        } else {
            Err(PoseError::MissingBone {
                index,
                count: self.bones.len(),
            })
        }
    }

    fn check_attachment(&self, attachment: &Attachment) -> Result<(), PoseError> {
        if let Some(bone) = attachment.max_weighted_bone() {
            self.check_bone(bone)?;
        }
        if let Attachment::Clipping(clip) = attachment {
            if clip.vertices.len() < 3 {
                return Err(PoseError::ClippingPolygon {
                    name: clip.name.clone(),
                    vertices: clip.vertices.len(),
                });
            }
            if let Some(end) = clip.end_slot.filter(|&end| end >= self.slots.len()) {
                return Err(PoseError::MissingSlot {
                    index: end,
                    count: self.slots.len(),
                });
            }
        }
        Ok(())
    }

    fn check_deform(&self, attachment: &Attachment, deform: &[Vec2]) -> Result<(), PoseError> {
        if deform.is_empty() {
            return Ok(());
        }
        match attachment.deformable_vertex_count() {
            Some(expected) if expected == deform.len() => Ok(()),
            expected => Err(PoseError::DeformLength {
                expected: expected.unwrap_or(0),
                found: deform.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{ClippingAttachment, MeshVertices};

    fn skeleton(slots: usize) -> Skeleton {
        Skeleton::new(
            vec![Bone::new("root")],
            (0..slots).map(|i| Slot::new(format!("s{i}"), 0)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn draw_order_must_be_a_permutation() {
        let mut skeleton = skeleton(3);
        assert_eq!(skeleton.draw_order(), &[0, 1, 2]);

        skeleton.set_draw_order(vec![2, 0, 1]).unwrap();
        let names: Vec<_> = skeleton.drawn_slots().map(|(_, s)| s.name.as_str()).collect();
        assert_eq!(names, ["s2", "s0", "s1"]);

        for bad in [vec![0, 1], vec![0, 1, 1], vec![0, 1, 3]] {
            assert_eq!(
                skeleton.set_draw_order(bad),
                Err(PoseError::InvalidDrawOrder { slot_count: 3 })
            );
        }
        assert_eq!(skeleton.draw_order(), &[2, 0, 1]);

        skeleton.reset_draw_order();
        assert_eq!(skeleton.draw_order(), &[0, 1, 2]);
    }

    #[test]
    fn slots_must_reference_bones() {
        let result = Skeleton::new(vec![Bone::new("root")], vec![Slot::new("s", 1)]);
        assert_eq!(
            result.unwrap_err(),
            PoseError::MissingBone { index: 1, count: 1 }
        );
    }

    #[test]
    fn clipping_attachments_are_validated() {
        let mut skeleton = skeleton(2);
        let too_small = ClippingAttachment::new(
            "clip",
            MeshVertices::Rigid(vec![Vec2::ZERO, Vec2::X]),
            None,
        );
        assert!(matches!(
            skeleton.set_attachment(0, Some(Arc::new(Attachment::Clipping(too_small)))),
            Err(PoseError::ClippingPolygon { vertices: 2, .. })
        ));

        let bad_end = ClippingAttachment::new(
            "clip",
            MeshVertices::Rigid(vec![Vec2::ZERO, Vec2::X, Vec2::Y]),
            Some(5),
        );
        assert!(matches!(
            skeleton.set_attachment(0, Some(Arc::new(Attachment::Clipping(bad_end)))),
            Err(PoseError::MissingSlot { index: 5, .. })
        ));
    }

    #[test]
    fn deform_length_is_checked() {
        let mut skeleton = skeleton(1);
        let clip = ClippingAttachment::new(
            "clip",
            MeshVertices::Rigid(vec![Vec2::ZERO, Vec2::X, Vec2::Y]),
            None,
        );
        skeleton
            .set_attachment(0, Some(Arc::new(Attachment::Clipping(clip))))
            .unwrap();
        assert_eq!(
            skeleton.set_deform(0, vec![Vec2::ZERO]),
            Err(PoseError::DeformLength {
                expected: 3,
                found: 1
            })
        );
        skeleton.set_deform(0, vec![Vec2::ONE; 3]).unwrap();
        assert_eq!(skeleton.slots()[0].deform.len(), 3);

        skeleton.set_attachment(0, None).unwrap();
        assert!(skeleton.slots()[0].deform.is_empty());
    }
}
