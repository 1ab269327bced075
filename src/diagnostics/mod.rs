//! Run reports shared by the stitching and search tools.
//!
//! Reports are plain serializable structs, written as pretty JSON next to
//! the outputs when a report path is configured.

pub mod timing;

pub use timing::{elapsed_ms, StageTiming, TimingBreakdown};
