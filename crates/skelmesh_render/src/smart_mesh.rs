//! Double buffered meshes that remember the instruction they were built from.

use skelmesh_pose::handle::{Handle, Material};

use crate::{instruction::RendererInstruction, mesh::MeshBuffers};

/// Two values used alternately, so the one handed out last frame is never written this frame.
#[derive(Debug, Clone, Default)]
pub struct DoubleBuffered<T> {
    items: [T; 2],
    using_first: bool,
}

impl<T> DoubleBuffered<T> {
    /// Create from two values.
    pub fn new(first: T, second: T) -> Self {
        Self {
            items: [first, second],
            using_first: false,
        }
    }

    /// Flip to the other value and return it.
    pub fn next(&mut self) -> &mut T {
        self.using_first = !self.using_first;
        self.current_mut()
    }

    /// The value returned by the last [`DoubleBuffered::next`].
    pub fn current(&self) -> &T {
        &self.items[self.index()]
    }

    /// The value returned by the last [`DoubleBuffered::next`], mutably.
    pub fn current_mut(&mut self) -> &mut T {
        let index = self.index();
        &mut self.items[index]
    }

    /// Both values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    fn index(&self) -> usize {
        if self.using_first {
            0
        } else {
            1
        }
    }
}

/// A mesh plus the instruction that last filled it.
#[derive(Debug, Clone, Default)]
pub struct SmartMesh {
    /// The mesh data.
    pub mesh: MeshBuffers,
    /// Instruction the mesh was last built from, compared against to skip index rebuilds.
    pub instruction_used: RendererInstruction,
}

impl SmartMesh {
    /// Forget the mesh data and instruction.
    pub fn clear(&mut self) {
        self.mesh.clear();
        self.instruction_used.clear();
    }
}

/// Per renderer mesh storage and the material list handed to the host.
#[derive(Debug, Clone, Default)]
pub struct MeshRendererBuffers {
    meshes: DoubleBuffered<SmartMesh>,
    shared_materials: Vec<Handle<Material>>,
}

impl MeshRendererBuffers {
    /// Create empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to the mesh not shown last frame.
    pub fn next(&mut self) -> &mut SmartMesh {
        self.meshes.next()
    }

    /// The mesh built most recently.
    pub fn current(&self) -> &SmartMesh {
        self.meshes.current()
    }

    /// One material per submesh, as of the last [`MeshRendererBuffers::update_shared_materials`].
    pub fn shared_materials(&self) -> &[Handle<Material>] {
        &self.shared_materials
    }

    /// Store the submesh materials of `instruction`. Returns whether the list changed.
    pub fn update_shared_materials(&mut self, instruction: &RendererInstruction) -> bool {
        let materials = instruction.submeshes.iter().map(|s| s.material);
        if self.shared_materials.iter().copied().eq(materials.clone()) {
            return false;
        }
        self.shared_materials.clear();
        self.shared_materials.extend(materials);
        true
    }

    /// Forget both meshes and the material list.
    pub fn clear(&mut self) {
        for mesh in self.meshes.iter_mut() {
            mesh.clear();
        }
        self.shared_materials.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_between_two_values() {
        let mut buffers = DoubleBuffered::new(1, 2);
        assert_eq!(*buffers.next(), 1);
        assert_eq!(*buffers.current(), 1);
        *buffers.next() += 10;
        assert_eq!(*buffers.current(), 12);
        assert_eq!(*buffers.next(), 1);
    }

    #[test]
    fn material_changes_are_reported_once() {
        use skelmesh_pose::prelude::*;

        let material = Handle::new();
        let skeleton = Skeleton::new(
            vec![Bone::new("root")],
            vec![Slot::new("a", 0).with_attachment(Attachment::Region(RegionAttachment::new(
                "a",
                material,
                &RegionLayout::default(),
            )))],
        )
        .unwrap();
        let mut instruction = RendererInstruction::default();
        let mut buffers = MeshRendererBuffers::new();
        assert!(!buffers.update_shared_materials(&instruction));

        crate::instruction::generate_single_submesh_instruction(&mut instruction, &skeleton, None, false);
        assert!(buffers.update_shared_materials(&instruction));
        assert!(!buffers.update_shared_materials(&instruction));
        assert_eq!(buffers.shared_materials(), &[material]);
    }
}
