//! Half-acquisition blending of two opposite projections.
//!
//! Purpose
//! - Two frames captured 180° apart each see a bit more than half of the
//!   sample. Blending them around the rotation-axis column yields one
//!   projection of the full field of view.
//!
//! Design
//! - The axis decides which image plays the left ("first") role: an axis in
//!   the right half keeps the given order, an axis in the left half swaps.
//! - The overlap band is `dx = round(2 * distance from axis to the near
//!   edge)` columns wide.
//! - The second image is rescaled so both sides of the band have the same
//!   mean, then a linear ramp cross-fades across the band.
//! - `crop` columns are removed from both ends of the result.
//!
//! Callers mirror the second frame horizontally before calling; the blend
//! itself never flips.
mod blend;

pub use self::blend::{overlap_width, stitch, stitched_width, Side};
