//! Turns posed 2D skeletons into batched, clipped triangle meshes.

#![warn(missing_docs)]
// This cfg_attr is needed because `rustdoc::all` includes lints not supported on stable
#![cfg_attr(doc, allow(unknown_lints))]
#![deny(rustdoc::all)]

/// Posed skeleton data: bones, slots, the draw order and attachments.
pub mod pose {
    pub use skelmesh_pose::*;
}

/// Clipping of attachment triangles against concave clip polygons.
pub mod clipping {
    pub use skelmesh_clipping::*;
}

/// Submesh partitioning, mesh generation and change detection.
pub mod render {
    pub use skelmesh_render::*;
}

/// The prelude
pub mod prelude {
    pub use skelmesh_render::prelude::*;
}
