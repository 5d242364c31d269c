//! Posed skeleton data consumed by the skelmesh mesh pipeline.
//!
//! The pose solver owns bone math. This crate only describes the result of a solve: world bone
//! transforms, slot state, the draw order and the attachments that produce geometry.

#![warn(missing_docs)]
// This cfg_attr is needed because `rustdoc::all` includes lints not supported on stable
#![cfg_attr(doc, allow(unknown_lints))]
#![deny(rustdoc::all)]

pub mod attachment;
pub mod color;
pub mod error;
pub mod handle;
pub mod skeleton;

/// The prelude
pub mod prelude {
    pub use glam::*;

    pub use crate::{attachment::*, color::*, error::*, handle::*, skeleton::*};
}
