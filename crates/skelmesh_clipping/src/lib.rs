//! Clip-region triangle clipping for skeleton meshes.
//!
//! A clipping attachment opens a polygonal clip region in draw order. The polygon may be concave:
//! it is triangulated and merged into convex pieces, then every triangle drawn while the region is
//! open is clipped against each piece.

#![warn(missing_docs)]
// This cfg_attr is needed because `rustdoc::all` includes lints not supported on stable
#![cfg_attr(doc, allow(unknown_lints))]
#![deny(rustdoc::all)]

pub mod clipper;
pub mod triangulator;

/// The prelude
pub mod prelude {
    pub use crate::{clipper::*, triangulator::*};
}
