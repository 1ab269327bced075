//! Error types, one enum per concern.
//!
//! Unit-level failures (a single projection pair, a single CT-set) are
//! reported through these types and then logged by the batch drivers, which
//! keep going. Only failures that make the whole invocation meaningless
//! (unreadable root, broken configuration, nothing succeeded) reach the
//! caller of a batch entry point.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },
    #[error("unsupported pixel layout in {path}: {layout}")]
    Unsupported { path: PathBuf, layout: String },
    #[error("buffer of {actual} samples does not match {width}x{height}")]
    SizeMismatch {
        width: usize,
        height: usize,
        actual: usize,
    },
    #[error("no frames found in {0}")]
    EmptySequence(PathBuf),
    #[error("frame index {index} out of range for a sequence of {len} frames")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid index pattern `{0}` (expected one `%d` or `%0Nd` field)")]
    Pattern(String),
}

impl ImageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum StitchError {
    #[error("shape mismatch: first is {first:?}, second is {second:?} (width, height)")]
    ShapeMismatch {
        first: (usize, usize),
        second: (usize, usize),
    },
    #[error("axis {axis} lies outside the {cols} detector columns")]
    AxisOutOfRange { axis: f64, cols: usize },
    #[error("overlap of {dx} columns exceeds image width {cols} (axis {axis})")]
    OverlapTooWide { dx: usize, cols: usize, axis: f64 },
    #[error("crop of {crop} columns per side leaves nothing of a {width}-column result")]
    CropTooLarge { crop: usize, width: usize },
    #[error("frame pair ({first}, {second}) mixes sample formats")]
    FormatMismatch { first: usize, second: usize },
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Axis(#[from] AxisError),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("cannot list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum AxisError {
    #[error("cannot parse axis list `{input}`: {message}")]
    Parse { input: String, message: String },
    #[error("axis table {path}: {message}")]
    Table { path: PathBuf, message: String },
    #[error("i/o error on axis table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid axis range start={start} stop={stop} step={step}")]
    InvalidRange { start: i64, stop: i64, step: i64 },
    #[error("cannot load {kind} rows from {path}: {source}")]
    Rows {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("{kind} rows in {path} have width {actual}, expected {expected}")]
    RowWidth {
        kind: &'static str,
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
    #[error("{path} has no {kind} directory and no shared references are configured")]
    MissingReferences { kind: &'static str, path: PathBuf },
    #[error("need at least two projections, found {0}")]
    TooFewProjections(usize),
    #[error("reconstruction failed: {0}")]
    Reconstruction(String),
    #[error("reconstructor returned {actual} slices for {expected} candidates")]
    CandidateCount { expected: usize, actual: usize },
    #[error("no CT-sets found under {0}")]
    NoCtSets(PathBuf),
    #[error("overlap search failed for all {0} CT-sets")]
    NoEstimates(usize),
    #[error(transparent)]
    Stitch(#[from] StitchError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Axis(#[from] AxisError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
