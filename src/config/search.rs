use crate::acquisition::FrameLayout;
use crate::error::SearchError;
use crate::search::Metric;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Candidate axis columns `start..=stop` by `step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: i64,
    pub stop: i64,
    #[serde(default = "default_step")]
    pub step: i64,
}

fn default_step() -> i64 {
    1
}

impl AxisRange {
    pub fn candidates(&self) -> Result<Vec<i64>, SearchError> {
        if self.step <= 0 || self.stop < self.start || self.start < 0 {
            return Err(SearchError::InvalidRange {
                start: self.start,
                stop: self.stop,
                step: self.step,
            });
        }
        Ok((self.start..=self.stop).step_by(self.step as usize).collect())
    }
}

/// Reference directories shared by every CT-set instead of per-set ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedReferences {
    pub darks: PathBuf,
    pub flats: PathBuf,
    #[serde(default)]
    pub flats2: Option<PathBuf>,
}

/// External reconstruction command line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructorConfig {
    pub program: String,
    /// Edge of the square region reconstructed around the center.
    pub patch_size: usize,
    /// Appended to the reconstruction call.
    pub extra_args: Vec<String>,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            program: "tofu".to_string(),
            patch_size: 256,
            extra_args: Vec::new(),
        }
    }
}

/// Parameters of one overlap search run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    pub input: PathBuf,
    /// Slices and score files go under this directory.
    pub output: PathBuf,
    /// Scratch space for candidate sinograms; defaults to `<output>/tmp`.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub layout: FrameLayout,
    #[serde(default)]
    pub shared_references: Option<SharedReferences>,
    /// Detector row used for the sinogram; out of range selects the middle row.
    #[serde(default = "default_row")]
    pub row: i64,
    pub range: AxisRange,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_detrend")]
    pub detrend: bool,
    #[serde(default)]
    pub reconstructor: ReconstructorConfig,
    /// Where to write the estimated axes as an axis table.
    #[serde(default)]
    pub table_out: Option<PathBuf>,
    #[serde(default)]
    pub report: Option<PathBuf>,
}

fn default_row() -> i64 {
    -1
}

fn default_detrend() -> bool {
    true
}

impl SearchConfig {
    pub fn load(path: &Path) -> Result<Self, crate::error::ConfigError> {
        super::load_config(path)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| self.output.join("tmp"))
    }
}
