//! Axis/overlap auto-search.
//!
//! For each CT-set a single detector row is taken from every frame and
//! flat-field corrected. The corrected row stack is stitched once per
//! candidate axis into a row-sinogram, all candidates are reconstructed in
//! one [`Reconstructor`] call, and the candidate whose slice scores highest
//! under the configured sharpness [`Metric`] is the estimate.
//!
//! Candidates are cropped so that every sinogram has the same width, which
//! keeps the reconstructed slices comparable. Scores can be linearly
//! detrended first; a slow drift in sharpness across the range otherwise
//! pulls the maximum towards one end.
mod driver;
pub mod metrics;
pub mod reconstructor;
pub mod rows;

pub use self::driver::{
    candidate_crop, candidate_sinograms, ctset_label, estimate_overlap, find_overlaps,
    OverlapEstimate, ReferenceDirs, SearchFailure, SearchReport,
};
pub use self::metrics::{Metric, MetricKind};
pub use self::reconstructor::{CandidateStack, ExternalReconstructor, Reconstructor};
