//! Submesh partitioning, mesh generation and change detection for posed skeletons.
//!
//! Each frame the draw order is split into submeshes that share a material, each attachment's
//! geometry is extracted and optionally clipped, and the result is written into reusable,
//! double buffered vertex and index arrays. Index arrays are only rebuilt when the set of drawn
//! attachments changes.

#![warn(missing_docs)]
// This cfg_attr is needed because `rustdoc::all` includes lints not supported on stable
#![cfg_attr(doc, allow(unknown_lints))]
#![deny(rustdoc::all)]

pub mod buffer;
pub mod error;
pub mod extract;
pub mod generator;
pub mod instruction;
pub mod mesh;
pub mod renderer;
pub mod settings;
pub mod smart_mesh;
pub mod tangents;

/// The prelude
pub mod prelude {
    pub use skelmesh_clipping::prelude::*;
    pub use skelmesh_pose::prelude::*;

    pub use crate::{
        buffer::*, error::*, extract::*, generator::*, instruction::*, mesh::*, renderer::*,
        settings::*, smart_mesh::*, tangents::*,
    };
}
