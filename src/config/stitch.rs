use crate::acquisition::FrameLayout;
use crate::axis::{AxisSource, CropPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parameters of one batch stitching run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StitchConfig {
    /// A CT-set or a tree of outer-loop scans holding CT-sets.
    pub input: PathBuf,
    /// Root of the mirrored output tree.
    pub output: PathBuf,
    #[serde(default)]
    pub layout: FrameLayout,
    pub axis: AxisSource,
    #[serde(default)]
    pub crop: CropPolicy,
    /// Worker threads; 0 uses every logical CPU.
    #[serde(default)]
    pub threads: usize,
    /// Where to write the JSON run report, if anywhere.
    #[serde(default)]
    pub report: Option<PathBuf>,
}

impl StitchConfig {
    pub fn load(path: &Path) -> Result<Self, crate::error::ConfigError> {
        super::load_config(path)
    }
}
