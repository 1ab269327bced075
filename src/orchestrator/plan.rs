use crate::acquisition::{scan, Acquisition, CtSet, FrameLayout};
use crate::axis::{AxisSpecification, CropPolicy};
use crate::error::StitchError;
use crate::image::{FrameSequence, SequenceNaming};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Output name of stitched pair `index`.
pub fn output_name(index: usize) -> String {
    format!("sti-{index:04}.tif")
}

/// One frame directory of one CT-set, with everything a pair job needs.
#[derive(Clone, Debug)]
pub struct SeriesPlan {
    pub ctset: PathBuf,
    pub subdir: String,
    pub frames: FrameSequence,
    pub out_dir: PathBuf,
    pub axis: i64,
    pub crop: usize,
    /// `N / 2`; pair `i` joins frame `i` and mirrored frame `i + pairs`.
    pub pairs: usize,
    /// Expected naming of single-page sequences, checked per pair.
    pub naming: Option<SequenceNaming>,
}

impl SeriesPlan {
    pub fn output_path(&self, index: usize) -> PathBuf {
        self.out_dir.join(output_name(index))
    }

    /// Whether both files of pair `index` carry the names the sequence
    /// convention predicts.
    pub fn names_match(&self, index: usize) -> bool {
        let Some(naming) = &self.naming else {
            return true;
        };
        let files = self.frames.files();
        [index, index + self.pairs]
            .into_iter()
            .all(|i| files.get(i).is_some_and(|f| naming.matches(f, i)))
    }
}

/// A single projection pair, addressed by series and pair index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairJob {
    pub series: usize,
    pub index: usize,
}

#[derive(Clone, Debug, Default)]
pub struct StitchPlan {
    pub ctsets: usize,
    pub series: Vec<SeriesPlan>,
    pub jobs: Vec<PairJob>,
    /// CT-sets left out because no axis was assigned to them.
    pub skipped_ctsets: usize,
    pub warnings: Vec<String>,
}

impl StitchPlan {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

/// Slices of one outer-loop scan, in the order axes are assigned.
struct SliceGroup<'a> {
    outer: PathBuf,
    slices: Vec<&'a CtSet>,
}

fn slice_groups(acquisition: &Acquisition) -> Vec<SliceGroup<'_>> {
    match acquisition {
        Acquisition::Flat(set) => vec![SliceGroup {
            outer: set.path.parent().map(Path::to_path_buf).unwrap_or_default(),
            slices: vec![set],
        }],
        Acquisition::Nested(scans) => scans
            .iter()
            .map(|s| SliceGroup {
                outer: s.path.clone(),
                slices: s.slices.iter().collect(),
            })
            .collect(),
    }
}

/// Detector width of a slice group, probed from the first readable
/// projection sequence.
fn probe_columns(slices: &[&CtSet], layout: &FrameLayout) -> Option<usize> {
    slices.iter().find_map(|set| {
        let seq = FrameSequence::open(&set.subdir(&layout.tomo)).ok()?;
        seq.dimensions().ok().map(|(w, _)| w)
    })
}

/// Resolve axes and crops for every CT-set under `input` and enumerate the
/// projection pairs to stitch.
pub fn plan_stitch(
    input: &Path,
    output: &Path,
    layout: &FrameLayout,
    spec: &AxisSpecification,
    crop: CropPolicy,
) -> Result<StitchPlan, StitchError> {
    let acquisition = scan(input, &layout.tomo)?;
    let mut plan = StitchPlan {
        ctsets: acquisition.len(),
        ..StitchPlan::default()
    };
    if acquisition.is_empty() {
        plan.warn(format!("no CT-sets found under {}", input.display()));
        return Ok(plan);
    }

    for group in slice_groups(&acquisition) {
        let names: Vec<String> = group.slices.iter().map(|s| s.name()).collect();
        let axes = spec.resolve(&group.outer, &names);
        let cols = probe_columns(&group.slices, layout).unwrap_or(0);
        let crops = crop.crops(spec, cols, &axes);
        debug!(
            "plan: {} slices in {}, axes {:?}, crops {:?}",
            names.len(),
            group.outer.display(),
            axes,
            crops
        );

        for ((set, axis), crop) in group.slices.iter().zip(axes).zip(crops) {
            let Some(axis) = axis else {
                plan.skipped_ctsets += 1;
                plan.warn(format!("{}: no axis assigned, skipped", set.path.display()));
                continue;
            };
            for subdir in set.references(layout).stitched_subdirs(layout) {
                add_series(&mut plan, set, subdir, input, output, axis, crop);
            }
        }
    }
    Ok(plan)
}

fn add_series(
    plan: &mut StitchPlan,
    set: &CtSet,
    subdir: &str,
    input: &Path,
    output: &Path,
    axis: i64,
    crop: usize,
) {
    let dir = set.subdir(subdir);
    let frames = match FrameSequence::open(&dir) {
        Ok(frames) => frames,
        Err(err) => {
            plan.warn(format!("{}: {err}", dir.display()));
            return;
        }
    };
    let n = frames.len();
    if n == 0 {
        plan.warn(format!("{}: no frames", dir.display()));
        return;
    }
    if n % 2 == 1 {
        plan.warn(format!(
            "{}: odd number of frames ({n}), the last one is not stitched",
            dir.display()
        ));
    }
    let naming = if frames.is_single_page() {
        frames.files().first().and_then(|f| SequenceNaming::infer(f))
    } else {
        None
    };
    let series = plan.series.len();
    let pairs = n / 2;
    plan.jobs.extend((0..pairs).map(|index| PairJob { series, index }));
    plan.series.push(SeriesPlan {
        ctset: set.path.clone(),
        subdir: subdir.to_string(),
        frames,
        out_dir: output.join(set.relative_to(input)).join(subdir),
        axis,
        crop,
        pairs,
        naming,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::io::write_frame;
    use crate::image::{ImageF32, SampleFormat};
    use std::fs;

    fn frames(dir: &Path, prefix: &str, n: usize) {
        fs::create_dir_all(dir).unwrap();
        for i in 0..n {
            write_frame(
                &dir.join(format!("{prefix}{i:04}.tif")),
                &ImageF32::new(8, 2),
                SampleFormat::U16,
            )
            .unwrap();
        }
    }

    #[test]
    fn every_frame_directory_becomes_a_series() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("raw");
        frames(&root.join("tomo"), "p_", 6);
        frames(&root.join("flats"), "f_", 4);
        frames(&root.join("darks"), "d_", 3);
        let spec = AxisSpecification::List(vec![6]);
        let out = dir.path().join("out");
        let plan =
            plan_stitch(&root, &out, &FrameLayout::default(), &spec, CropPolicy::Auto).unwrap();
        assert_eq!(plan.ctsets, 1);
        let subdirs: Vec<_> = plan.series.iter().map(|s| s.subdir.as_str()).collect();
        assert_eq!(subdirs, vec!["tomo", "flats", "darks"]);
        assert_eq!(plan.jobs.len(), 3 + 2 + 1);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("odd number of frames"));
        assert_eq!(plan.series[0].out_dir, out.join("tomo"));
        assert_eq!(plan.series[0].output_path(2), out.join("tomo/sti-0002.tif"));
    }

    #[test]
    fn naming_gaps_are_detected_per_pair() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("raw");
        frames(&root.join("tomo"), "p_", 4);
        // renumber the last frame so the sequence has a gap
        fs::rename(root.join("tomo/p_0003.tif"), root.join("tomo/p_0009.tif")).unwrap();
        let spec = AxisSpecification::List(vec![6]);
        let layout = FrameLayout::default();
        let plan = plan_stitch(&root, dir.path(), &layout, &spec, CropPolicy::None).unwrap();
        let series = &plan.series[0];
        assert!(series.names_match(0));
        assert!(!series.names_match(1));
    }

    #[test]
    fn slices_without_an_axis_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("raw");
        for z in ["z00", "z01", "z02"] {
            frames(&root.join("scan").join(z).join("tomo"), "p_", 2);
        }
        let spec = AxisSpecification::List(vec![6, 6]);
        let layout = FrameLayout::default();
        let plan = plan_stitch(&root, dir.path(), &layout, &spec, CropPolicy::None).unwrap();
        assert_eq!(plan.ctsets, 3);
        assert_eq!(plan.skipped_ctsets, 1);
        assert_eq!(plan.series.len(), 2);
        assert_eq!(plan.jobs.len(), 2);
    }
}
