//! The per skeleton renderer: partition, change detection and mesh generation for each frame.

use fxhash::FxHashMap;
use skelmesh_pose::{
    handle::{Handle, Material},
    skeleton::Skeleton,
};

use crate::{
    error::RenderError,
    generator::MeshGenerator,
    instruction::{
        generate_instruction, generate_single_submesh_instruction, geometry_changed,
        replace_materials, RendererInstruction,
    },
    mesh::MeshBuffers,
    settings::{MeshSettings, RendererOptions},
    smart_mesh::MeshRendererBuffers,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RendererState {
    #[default]
    Uninitialized,
    Ready,
    Disposed,
}

/// The result of [`SkeletonMeshRenderer::update`].
#[derive(Debug, Clone, Copy)]
pub struct MeshUpdate<'a> {
    /// The freshly built mesh.
    pub mesh: &'a MeshBuffers,
    /// One material per submesh.
    pub materials: &'a [Handle<Material>],
    /// Index arrays were rebuilt and must be re-uploaded.
    pub triangles_changed: bool,
    /// The material list differs from the previous frame.
    pub materials_changed: bool,
}

/// Turns one skeleton's pose into a mesh every frame.
///
/// Call [`SkeletonMeshRenderer::initialize`] once the skeleton is known, then
/// [`SkeletonMeshRenderer::update`] each frame after posing it.
#[derive(Debug, Clone)]
pub struct SkeletonMeshRenderer {
    options: RendererOptions,
    generator: MeshGenerator,
    buffers: MeshRendererBuffers,
    current_instruction: RendererInstruction,
    separator_slots: Vec<usize>,
    custom_slot_materials: FxHashMap<usize, Handle<Material>>,
    state: RendererState,
}

impl SkeletonMeshRenderer {
    /// Create an uninitialized renderer.
    pub fn new(settings: MeshSettings, options: RendererOptions) -> Self {
        Self {
            options,
            generator: MeshGenerator::new(settings),
            buffers: MeshRendererBuffers::new(),
            current_instruction: RendererInstruction::default(),
            separator_slots: Vec::new(),
            custom_slot_materials: FxHashMap::default(),
            state: RendererState::Uninitialized,
        }
    }

    /// The mesh settings.
    pub fn settings(&self) -> &MeshSettings {
        self.generator.settings()
    }

    /// The mesh settings, mutably.
    pub fn settings_mut(&mut self) -> &mut MeshSettings {
        self.generator.settings_mut()
    }

    /// The renderer options. Call [`SkeletonMeshRenderer::initialize`] again after changing slot
    /// names.
    pub fn options_mut(&mut self) -> &mut RendererOptions {
        &mut self.options
    }

    /// The generator, for diagnostics.
    pub fn generator(&self) -> &MeshGenerator {
        &self.generator
    }

    /// The instruction of the last update.
    pub fn current_instruction(&self) -> &RendererInstruction {
        &self.current_instruction
    }

    /// Slot indices of the separator slots resolved at initialization.
    pub fn separator_slots(&self) -> &[usize] {
        &self.separator_slots
    }

    /// Whether [`SkeletonMeshRenderer::initialize`] has succeeded and the renderer is not disposed.
    pub fn is_ready(&self) -> bool {
        self.state == RendererState::Ready
    }

    /// Bind to `skeleton`: resolve slot names from the options and drop all previous state.
    pub fn initialize(&mut self, skeleton: &Skeleton) -> Result<(), RenderError> {
        if self.state == RendererState::Disposed {
            return Err(RenderError::Disposed);
        }
        self.clear_state();
        self.state = RendererState::Uninitialized;

        let find = |name: &str| {
            skeleton
                .find_slot(name)
                .ok_or_else(|| RenderError::UnknownSlot(name.to_string()))
        };
        let mut separators = Vec::with_capacity(self.options.separator_slot_names.len());
        for name in &self.options.separator_slot_names {
            separators.push(find(name)?);
        }
        let mut custom_slot_materials = FxHashMap::default();
        for (name, material) in &self.options.custom_slot_materials {
            custom_slot_materials.insert(find(name)?, *material);
        }

        self.separator_slots = separators;
        self.custom_slot_materials = custom_slot_materials;
        self.state = RendererState::Ready;
        tracing::debug!(
            separators = self.separator_slots.len(),
            custom_materials = self.custom_slot_materials.len(),
            "Initialized skeleton renderer"
        );
        Ok(())
    }

    /// Build this frame's mesh from the posed `skeleton`.
    pub fn update(&mut self, skeleton: &Skeleton) -> Result<MeshUpdate<'_>, RenderError> {
        match self.state {
            RendererState::Uninitialized => return Err(RenderError::NotInitialized),
            RendererState::Disposed => return Err(RenderError::Disposed),
            RendererState::Ready => (),
        }

        let immutable_triangles = self.generator.settings().immutable_triangles;
        if self.options.single_submesh {
            generate_single_submesh_instruction(
                &mut self.current_instruction,
                skeleton,
                self.options.single_submesh_material,
                immutable_triangles,
            );
        } else {
            generate_instruction(
                &mut self.current_instruction,
                skeleton,
                &self.custom_slot_materials,
                &self.separator_slots,
                immutable_triangles,
            );
        }
        if !self.options.custom_material_overrides.is_empty() {
            replace_materials(
                &mut self.current_instruction.submeshes,
                &self.options.custom_material_overrides,
            );
        }

        let smart = self.buffers.next();
        let update_triangles = geometry_changed(&self.current_instruction, &smart.instruction_used);
        tracing::trace!(
            update_triangles,
            submeshes = self.current_instruction.submeshes.len(),
            "Updating skeleton mesh"
        );

        self.generator.begin(&mut smart.mesh);
        let use_clipping =
            self.current_instruction.has_active_clipping && self.generator.settings().use_clipping;
        if use_clipping {
            self.generator
                .build_mesh(skeleton, &self.current_instruction, &mut smart.mesh, update_triangles);
        } else {
            self.generator.build_mesh_with_arrays(
                skeleton,
                &self.current_instruction,
                &mut smart.mesh,
                update_triangles,
            );
        }
        smart.instruction_used.set(&self.current_instruction);
        if update_triangles {
            self.generator.prune_cache(skeleton);
        }

        let materials_changed = self.buffers.update_shared_materials(&self.current_instruction);
        Ok(MeshUpdate {
            mesh: &self.buffers.current().mesh,
            materials: self.buffers.shared_materials(),
            triangles_changed: update_triangles,
            materials_changed,
        })
    }

    /// Drop cached geometry, meshes and instructions. Resolved slot names are kept.
    pub fn clear_state(&mut self) {
        self.generator.clear();
        self.buffers.clear();
        self.current_instruction.clear();
    }

    /// Release everything. Every later call fails with [`RenderError::Disposed`].
    pub fn dispose(&mut self) {
        self.clear_state();
        self.separator_slots.clear();
        self.custom_slot_materials.clear();
        self.state = RendererState::Disposed;
    }
}
