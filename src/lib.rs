#![doc = include_str!("../README.md")]

// Core building blocks.
pub mod acquisition;
pub mod axis;
pub mod error;
pub mod image;
pub mod stitch;

// Batch tools built on top of them.
pub mod config;
pub mod diagnostics;
pub mod orchestrator;
pub mod search;

// --- High-level re-exports -------------------------------------------------

pub use crate::acquisition::{scan, Acquisition, CtSet, FrameLayout, OuterScan, References};
pub use crate::axis::{AxisSpecification, AxisTable, CropPolicy};
pub use crate::error::{
    AxisError, ConfigError, ImageError, ScanError, SearchError, StitchError,
};
pub use crate::image::ImageF32;
pub use crate::orchestrator::{run_stitch, StitchReport};
pub use crate::search::{find_overlaps, OverlapEstimate, Reconstructor, SearchReport};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use halfacq::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config: StitchConfig = halfacq::config::load_config("stitch.json".as_ref())?;
/// let report = run_stitch(&config)?;
/// println!("wrote {} of {} pairs", report.pairs_written, report.pairs_planned);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::config::{SearchConfig, StitchConfig};
    pub use crate::image::{FrameSequence, ImageF32, SampleFormat};
    pub use crate::stitch::stitch;
    pub use crate::{
        find_overlaps, run_stitch, AxisSpecification, AxisTable, CropPolicy, Reconstructor,
    };
}
