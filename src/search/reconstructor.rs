//! Slice reconstruction as an exchangeable capability.
//!
//! The search driver only needs "one slice per candidate sinogram, in
//! candidate order". [`ExternalReconstructor`] provides that by converting the
//! sinogram directory into projections and running a reconstruction program;
//! tests substitute an in-process implementation.
use crate::config::ReconstructorConfig;
use crate::error::{ImageError, SearchError};
use crate::image::io::{is_frame_file, read_page};
use crate::image::ImageF32;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Candidate sinograms of one CT-set, all of equal shape.
#[derive(Debug)]
pub struct CandidateStack<'a> {
    /// Axis column each sinogram was stitched with.
    pub axes: &'a [i64],
    /// One row-sinogram per candidate, rows spanning 180 degrees.
    pub sinograms: &'a [ImageF32],
    /// Directory holding the same sinograms as `sin-axis-%04d.tif`.
    pub sinogram_dir: &'a Path,
    /// Scratch directory for intermediate files.
    pub work_dir: &'a Path,
    /// Slices are written as `<output_prefix>%04d.tif` style names.
    pub output_prefix: &'a Path,
}

pub trait Reconstructor: Send + Sync {
    /// One slice per candidate, `result[k]` belonging to `stack.axes[k]`.
    fn reconstruct(&self, stack: &CandidateStack<'_>) -> Result<Vec<ImageF32>, SearchError>;
}

/// Runs `<program> sinos` then `<program> reco` and reads the slices back.
#[derive(Clone, Debug)]
pub struct ExternalReconstructor {
    config: ReconstructorConfig,
}

impl ExternalReconstructor {
    pub fn new(config: ReconstructorConfig) -> Self {
        Self { config }
    }

    /// Argument vectors of the two calls, in order.
    pub fn commands(&self, stack: &CandidateStack<'_>) -> Vec<Vec<String>> {
        let n = stack.axes.len() as i64;
        let (width, height) = stack.sinograms.first().map_or((0, 0), ImageF32::shape);
        let projections = stack.work_dir.join("proj.tif");
        let half_patch = (self.config.patch_size / 2) as i64;

        let sinos = vec![
            "sinos".to_string(),
            "--number".to_string(),
            n.to_string(),
            "--projections".to_string(),
            stack.sinogram_dir.display().to_string(),
            "--output".to_string(),
            projections.display().to_string(),
        ];
        let mut reco = vec![
            "reco".to_string(),
            "--projections".to_string(),
            projections.display().to_string(),
            "--output".to_string(),
            stack.output_prefix.display().to_string(),
            "--overall-angle".to_string(),
            "180".to_string(),
            "--center-position-x".to_string(),
            (width / 2).to_string(),
            "--number".to_string(),
            height.to_string(),
            format!("--region={},{},1", -(n / 2), n - n / 2),
            format!("--x-region={},{},1", -half_patch, half_patch),
            format!("--y-region={},{},1", -half_patch, half_patch),
        ];
        reco.extend(self.config.extra_args.iter().cloned());
        vec![sinos, reco]
    }

    fn run(&self, args: &[String]) -> Result<(), SearchError> {
        info!("{} {}", self.config.program, args.join(" "));
        let status = Command::new(&self.config.program)
            .args(args)
            .status()
            .map_err(|e| {
                SearchError::Reconstruction(format!("cannot start {}: {e}", self.config.program))
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(SearchError::Reconstruction(format!(
                "{} {} exited with {status}",
                self.config.program,
                args.first().map(String::as_str).unwrap_or_default()
            )))
        }
    }
}

impl Reconstructor for ExternalReconstructor {
    fn reconstruct(&self, stack: &CandidateStack<'_>) -> Result<Vec<ImageF32>, SearchError> {
        if let Some(parent) = stack.output_prefix.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SearchError::Reconstruction(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        for args in self.commands(stack) {
            self.run(&args)?;
        }
        let files = slice_files(stack.output_prefix)?;
        debug!("reconstructor produced {} slices", files.len());
        files
            .iter()
            .map(|path| Ok(read_page(path, 0)?.image))
            .collect()
    }
}

/// Frame files next to `prefix` whose names start with its file name, sorted.
pub fn slice_files(prefix: &Path) -> Result<Vec<PathBuf>, SearchError> {
    let dir = prefix.parent().unwrap_or(Path::new("."));
    let stem = prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let entries = fs::read_dir(dir).map_err(|e| {
        SearchError::Reconstruction(format!("cannot list {}: {e}", dir.display()))
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            is_frame_file(p)
                && p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(&stem))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Remove slices an earlier run left under `prefix`. Returns how many were
/// removed; a missing output directory removes nothing.
pub fn clear_slices(prefix: &Path) -> Result<usize, SearchError> {
    if !prefix.parent().unwrap_or(Path::new(".")).is_dir() {
        return Ok(0);
    }
    let stale = slice_files(prefix)?;
    for path in &stale {
        fs::remove_file(path).map_err(|e| ImageError::io(path, e))?;
    }
    Ok(stale.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines_follow_the_stack_geometry() {
        let sinos = vec![ImageF32::new(100, 36); 5];
        let axes = [10, 11, 12, 13, 14];
        let stack = CandidateStack {
            axes: &axes,
            sinograms: &sinos,
            sinogram_dir: Path::new("/tmp/w/sinos"),
            work_dir: Path::new("/tmp/w"),
            output_prefix: Path::new("/out/z00/z00-sli"),
        };
        let rec = ExternalReconstructor::new(ReconstructorConfig {
            patch_size: 64,
            extra_args: vec!["--verbose".to_string()],
            ..ReconstructorConfig::default()
        });
        let cmds = rec.commands(&stack);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0][..3], ["sinos", "--number", "5"]);
        let reco = cmds[1].join(" ");
        assert!(reco.contains("--center-position-x 50"));
        assert!(reco.contains("--number 36"));
        assert!(reco.contains("--region=-2,3,1"));
        assert!(reco.contains("--x-region=-32,32,1"));
        assert!(reco.ends_with("--verbose"));
    }

    #[test]
    fn slices_are_matched_by_prefix_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["z-sli-0001.tif", "z-sli-0000.tif", "other-0000.tif", "z-sli.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = slice_files(&dir.path().join("z-sli")).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["z-sli-0000.tif", "z-sli-0001.tif"]);
    }

    #[test]
    fn clearing_removes_only_matching_slices() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["z-sli-0000.tif", "z-sli-0001.tif", "other-0000.tif"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        assert_eq!(clear_slices(&dir.path().join("z-sli")).unwrap(), 2);
        assert!(slice_files(&dir.path().join("z-sli")).unwrap().is_empty());
        assert!(dir.path().join("other-0000.tif").is_file());
        assert_eq!(clear_slices(&dir.path().join("missing/z-sli")).unwrap(), 0);
    }

    #[test]
    fn missing_program_is_a_reconstruction_error() {
        let rec = ExternalReconstructor::new(ReconstructorConfig {
            program: "halfacq-no-such-program".to_string(),
            ..ReconstructorConfig::default()
        });
        assert!(matches!(
            rec.run(&["reco".to_string()]),
            Err(SearchError::Reconstruction(_))
        ));
    }
}
