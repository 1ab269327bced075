use super::metrics::{argmax, detrend, write_scores};
use super::reconstructor::{clear_slices, CandidateStack, Reconstructor};
use super::rows::{extract_row, flat_field_correct, mean_row};
use crate::acquisition::{scan, CtSet};
use crate::axis::AxisTable;
use crate::config::{AxisRange, SearchConfig};
use crate::diagnostics::{elapsed_ms, TimingBreakdown};
use crate::error::{ImageError, SearchError};
use crate::image::io::{write_frame, write_json_file};
use crate::image::{ImageF32, SampleFormat};
use crate::stitch::stitch;
use log::{debug, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Estimated axis of one CT-set together with the scores behind it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapEstimate {
    pub ctset: PathBuf,
    pub outer: PathBuf,
    pub slice: String,
    pub axis: i64,
    pub candidates: Vec<i64>,
    /// Scores the maximum was taken over (after detrending, if enabled).
    pub scores: Vec<f64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFailure {
    pub ctset: PathBuf,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub ctsets: usize,
    pub estimates: Vec<OverlapEstimate>,
    pub failures: Vec<SearchFailure>,
    /// Outer-loop scan → {slice → axis}, ready for table-mode stitching.
    pub table: AxisTable,
    pub timing: TimingBreakdown,
}

/// Reference directories used for one CT-set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceDirs {
    pub darks: PathBuf,
    pub flats: PathBuf,
    pub flats2: Option<PathBuf>,
}

impl ReferenceDirs {
    /// Shared references, when configured, replace the CT-set's own for
    /// every CT-set. Otherwise darks and flats must be present in the CT-set.
    pub fn for_ctset(ctset: &CtSet, config: &SearchConfig) -> Result<Self, SearchError> {
        if let Some(shared) = &config.shared_references {
            return Ok(Self {
                darks: shared.darks.clone(),
                flats: shared.flats.clone(),
                flats2: shared.flats2.clone().filter(|p| p.is_dir()),
            });
        }
        let layout = &config.layout;
        let present = ctset.references(layout);
        let missing = |kind| SearchError::MissingReferences {
            kind,
            path: ctset.path.clone(),
        };
        if !present.darks {
            return Err(missing("dark"));
        }
        if !present.flats {
            return Err(missing("flat"));
        }
        Ok(Self {
            darks: ctset.subdir(&layout.darks),
            flats: ctset.subdir(&layout.flats),
            flats2: present.flats2.then(|| ctset.subdir(&layout.flats2)),
        })
    }
}

/// Crop that gives every candidate in `range` the same stitched width.
pub fn candidate_crop(axis: i64, cols: usize, range: &AxisRange) -> usize {
    let crop = if axis > (cols / 2) as i64 {
        axis - range.start
    } else {
        range.stop - axis
    };
    crop.max(0) as usize
}

/// Stitch the first half of a corrected row stack against the mirrored
/// second half once per candidate axis.
pub fn candidate_sinograms(
    ffc: &ImageF32,
    axes: &[i64],
    range: &AxisRange,
) -> Result<Vec<ImageF32>, SearchError> {
    let half = ffc.h / 2;
    if half == 0 {
        return Err(SearchError::TooFewProjections(ffc.h));
    }
    let first = ffc.row_range(0, half);
    let second = ffc.row_range(half, 2 * half).mirrored();
    let unclipped = SampleFormat::F32.valid_range();
    axes.iter()
        .map(|&axis| {
            let crop = candidate_crop(axis, ffc.w, range);
            Ok(stitch(&first, &second, axis as f64, crop, unclipped)?)
        })
        .collect()
}

/// Directory used for a CT-set's outputs: its path below the input root, or
/// its name when the root is the CT-set.
pub fn ctset_label(ctset: &CtSet, root: &Path) -> PathBuf {
    let rel = ctset.relative_to(root);
    if rel.as_os_str().is_empty() {
        PathBuf::from(ctset.name())
    } else {
        rel.to_path_buf()
    }
}

fn load_rows(
    kind: &'static str,
    dir: &Path,
    row: i64,
    even: bool,
) -> Result<ImageF32, SearchError> {
    extract_row(dir, row, even).map_err(|source| SearchError::Rows {
        kind,
        path: dir.to_path_buf(),
        source,
    })
}

fn load_reference(
    kind: &'static str,
    dir: &Path,
    row: i64,
    cols: usize,
) -> Result<Vec<f32>, SearchError> {
    let mean = mean_row(&load_rows(kind, dir, row, false)?);
    if mean.len() != cols {
        return Err(SearchError::RowWidth {
            kind,
            path: dir.to_path_buf(),
            expected: cols,
            actual: mean.len(),
        });
    }
    Ok(mean)
}

fn write_sinograms(dir: &Path, axes: &[i64], sinograms: &[ImageF32]) -> Result<(), ImageError> {
    if dir.is_dir() {
        fs::remove_dir_all(dir).map_err(|e| ImageError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| ImageError::io(dir, e))?;
    for (axis, sino) in axes.iter().zip(sinograms) {
        let path = dir.join(format!("sin-axis-{axis:04}.tif"));
        write_frame(&path, sino, SampleFormat::F32)?;
    }
    Ok(())
}

/// Run the full search for one CT-set.
pub fn estimate_overlap(
    ctset: &CtSet,
    config: &SearchConfig,
    reconstructor: &dyn Reconstructor,
) -> Result<OverlapEstimate, SearchError> {
    let axes = config.range.candidates()?;
    let label = ctset_label(ctset, &config.input);
    let refs = ReferenceDirs::for_ctset(ctset, config)?;

    let tomo = load_rows("projection", &ctset.subdir(&config.layout.tomo), config.row, true)?;
    if tomo.h < 2 {
        return Err(SearchError::TooFewProjections(tomo.h));
    }
    let cols = tomo.w;
    let dark = load_reference("dark", &refs.darks, config.row, cols)?;
    let flat = load_reference("flat", &refs.flats, config.row, cols)?;
    let flat2 = match &refs.flats2 {
        Some(dir) => match load_reference("flat2", dir, config.row, cols) {
            Ok(row) => Some(row),
            Err(err) => {
                warn!("{err}; continuing without the second flat series");
                None
            }
        },
        None => None,
    };

    let ffc = flat_field_correct(&tomo, &dark, &flat, flat2.as_deref());
    let sinograms = candidate_sinograms(&ffc, &axes, &config.range)?;

    let work_dir = config.work_dir().join(&label);
    let sinogram_dir = work_dir.join("sinos");
    write_sinograms(&sinogram_dir, &axes, &sinograms)?;

    let name = ctset.name();
    let output_prefix = config.output.join(&label).join(format!("{name}-sli"));
    let stale = clear_slices(&output_prefix)?;
    if stale > 0 {
        debug!(
            "removed {stale} slices of an earlier run under {}",
            output_prefix.display()
        );
    }
    let stack = CandidateStack {
        axes: &axes,
        sinograms: &sinograms,
        sinogram_dir: &sinogram_dir,
        work_dir: &work_dir,
        output_prefix: &output_prefix,
    };
    let slices = reconstructor.reconstruct(&stack)?;
    if slices.len() != axes.len() {
        return Err(SearchError::CandidateCount {
            expected: axes.len(),
            actual: slices.len(),
        });
    }

    let raw: Vec<f64> = slices.iter().map(|s| config.metric.evaluate(s)).collect();
    let scores = if config.detrend { detrend(&raw) } else { raw };
    let mut score_file = config.output.join(&label).into_os_string();
    score_file.push(format!("_{}.txt", config.metric));
    write_scores(Path::new(&score_file), &scores)?;

    let best = argmax(&scores).unwrap_or(0);
    let axis = config.range.start + config.range.step * best as i64;
    Ok(OverlapEstimate {
        ctset: ctset.path.clone(),
        outer: outer_of(ctset),
        slice: name,
        axis,
        candidates: axes,
        scores,
    })
}

fn outer_of(ctset: &CtSet) -> PathBuf {
    ctset
        .outer
        .clone()
        .or_else(|| ctset.path.parent().map(Path::to_path_buf))
        .unwrap_or_default()
}

/// Search every CT-set under `config.input`. CT-sets that fail are
/// reported and skipped; the call fails only when none succeeds.
pub fn find_overlaps(
    config: &SearchConfig,
    reconstructor: &dyn Reconstructor,
) -> Result<SearchReport, SearchError> {
    let total_start = Instant::now();
    config.range.candidates()?;
    let acquisition = scan(&config.input, &config.layout.tomo)?;
    let ctsets = acquisition.ctsets();
    if ctsets.is_empty() {
        return Err(SearchError::NoCtSets(config.input.clone()));
    }

    let mut report = SearchReport {
        ctsets: ctsets.len(),
        ..SearchReport::default()
    };
    for ctset in ctsets {
        let start = Instant::now();
        info!("searching overlap for {}", ctset.path.display());
        match estimate_overlap(ctset, config, reconstructor) {
            Ok(est) => {
                info!("{}: estimated axis {}", ctset.path.display(), est.axis);
                report.table.insert(&est.outer, &est.slice, est.axis);
                report.estimates.push(est);
            }
            Err(err) => {
                warn!("{}: overlap search failed: {err}", ctset.path.display());
                report.failures.push(SearchFailure {
                    ctset: ctset.path.clone(),
                    error: err.to_string(),
                });
            }
        }
        report
            .timing
            .push(ctset_label(ctset, &config.input).display().to_string(), elapsed_ms(start));
    }
    report.timing.total_ms = elapsed_ms(total_start);

    if report.estimates.is_empty() {
        return Err(SearchError::NoEstimates(report.ctsets));
    }
    if let Some(path) = &config.table_out {
        report.table.save(path)?;
    }
    if let Some(path) = &config.report {
        write_json_file(path, &report)?;
    }
    Ok(report)
}
