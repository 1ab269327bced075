//! Per-slice rotation-axis assignment.
//!
//! An [`AxisSpecification`] maps the sorted slices of one outer-loop scan to
//! axis columns in one of three ways: linear interpolation between the first
//! and last slice, an explicit table keyed by slice name, or a list matched
//! by position. [`CropPolicy`] decides how much to trim from each stitched
//! slice so that a stack of slices can share one width.
use crate::error::AxisError;
use crate::stitch::overlap_width;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Estimated or prescribed axes, outer-loop scan path → {slice name → axis}.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AxisTable(pub BTreeMap<String, BTreeMap<String, i64>>);

impl AxisTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, outer: &Path, slice: &str, axis: i64) {
        self.0
            .entry(outer.to_string_lossy().into_owned())
            .or_default()
            .insert(slice.to_string(), axis);
    }

    /// Slice axes for an outer-loop scan. Keys are compared as full paths
    /// first, then by final directory name, so a table written on one machine
    /// can be applied to a copy of the data elsewhere.
    pub fn scan(&self, outer: &Path) -> Option<&BTreeMap<String, i64>> {
        let full = outer.to_string_lossy();
        if let Some(entry) = self.0.get(full.as_ref()) {
            return Some(entry);
        }
        let name = outer.file_name()?;
        self.0
            .iter()
            .find(|(key, _)| Path::new(key.as_str()).file_name() == Some(name))
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self, AxisError> {
        let data = fs::read_to_string(path).map_err(|source| AxisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|e| AxisError::Table {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), AxisError> {
        crate::image::io::write_json_file(path, self).map_err(|e| AxisError::Table {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// How axis columns are assigned to the slices of an outer-loop scan.
#[derive(Clone, Debug, PartialEq)]
pub enum AxisSpecification {
    /// Linear between the first and the last slice, rounded half to even.
    Interpolated { first: f64, last: f64 },
    /// Looked up by outer-loop scan and slice name.
    Table(AxisTable),
    /// Matched by position to the sorted slices. Slices beyond the end of
    /// the list get no axis.
    List(Vec<i64>),
}

impl AxisSpecification {
    /// Axis for each slice in `slice_names` (sorted) of the outer-loop scan
    /// at `outer`. `None` marks a slice without an assignment.
    pub fn resolve(&self, outer: &Path, slice_names: &[String]) -> Vec<Option<i64>> {
        let n = slice_names.len();
        match self {
            AxisSpecification::Interpolated { first, last } => (0..n)
                .map(|i| {
                    let t = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
                    Some((first + (last - first) * t).round_ties_even() as i64)
                })
                .collect(),
            AxisSpecification::Table(table) => {
                let Some(entries) = table.scan(outer) else {
                    warn!("axis table has no entry for {}", outer.display());
                    return vec![None; n];
                };
                slice_names
                    .iter()
                    .map(|name| {
                        let axis = entries.get(name).copied();
                        if axis.is_none() {
                            warn!("axis table has no value for {}/{name}", outer.display());
                        }
                        axis
                    })
                    .collect()
            }
            AxisSpecification::List(values) => {
                if values.len() < n {
                    warn!(
                        "axis list has {} values for {} slices in {}; the remaining slices are skipped",
                        values.len(),
                        n,
                        outer.display()
                    );
                }
                (0..n).map(|i| values.get(i).copied()).collect()
            }
        }
    }

    pub fn is_interpolated(&self) -> bool {
        matches!(self, AxisSpecification::Interpolated { .. })
    }
}

/// Parse a comma-separated list of integer axes, e.g. `"1190, 1192,1195"`.
pub fn parse_axis_list(input: &str) -> Result<Vec<i64>, AxisError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|e| AxisError::Parse {
                input: input.to_string(),
                message: format!("`{s}`: {e}"),
            })
        })
        .collect()
}

/// Where an axis specification comes from in a configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AxisSource {
    Interpolated { first: f64, last: f64 },
    /// Comma-separated integers.
    List { values: String },
    /// JSON file holding an [`AxisTable`].
    Table { path: PathBuf },
}

impl AxisSource {
    pub fn load(&self) -> Result<AxisSpecification, AxisError> {
        Ok(match self {
            AxisSource::Interpolated { first, last } => AxisSpecification::Interpolated {
                first: *first,
                last: *last,
            },
            AxisSource::List { values } => AxisSpecification::List(parse_axis_list(values)?),
            AxisSource::Table { path } => AxisSpecification::Table(AxisTable::load(path)?),
        })
    }
}

/// Columns trimmed from each end of every stitched slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropPolicy {
    /// Equalize for interpolated axes, no crop for table and list axes.
    #[default]
    Auto,
    None,
    /// Trim every slice down to the narrowest stitched width in its scan.
    Equalize,
    Fixed(usize),
}

impl CropPolicy {
    /// Crop per slice. `cols` is the detector width, `axes` the resolved
    /// axes of one outer-loop scan; slices without an axis get 0.
    pub fn crops(
        self,
        spec: &AxisSpecification,
        cols: usize,
        axes: &[Option<i64>],
    ) -> Vec<usize> {
        match self {
            CropPolicy::Auto if spec.is_interpolated() => equalizing_crops(cols, axes),
            CropPolicy::Auto | CropPolicy::None => vec![0; axes.len()],
            CropPolicy::Equalize => equalizing_crops(cols, axes),
            CropPolicy::Fixed(c) => vec![c; axes.len()],
        }
    }
}

/// Crops that bring every slice to the narrowest stitched width.
///
/// The stitched width is `2*cols - dx`, so the crop per side is half the
/// difference to the widest overlap. For integer axes on the same detector
/// half that is `|axis - extreme axis|`.
pub fn equalizing_crops(cols: usize, axes: &[Option<i64>]) -> Vec<usize> {
    let dx: Vec<Option<usize>> = axes
        .iter()
        .map(|a| a.map(|a| overlap_width(cols, a as f64)))
        .collect();
    let widest = dx.iter().flatten().copied().max().unwrap_or(0);
    dx.into_iter()
        .map(|d| d.map_or(0, |d| (widest - d) / 2))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("z{i:02}")).collect()
    }

    #[test]
    fn interpolation_spans_first_to_last() {
        let spec = AxisSpecification::Interpolated {
            first: 100.0,
            last: 104.0,
        };
        let axes = spec.resolve(Path::new("/scan"), &names(5));
        assert_eq!(axes, vec![Some(100), Some(101), Some(102), Some(103), Some(104)]);
        // a single slice takes the first endpoint
        assert_eq!(spec.resolve(Path::new("/scan"), &names(1)), vec![Some(100)]);
    }

    #[test]
    fn interpolation_rounds_half_to_even() {
        let spec = AxisSpecification::Interpolated {
            first: 0.0,
            last: 5.0,
        };
        // 0, 2.5, 5
        assert_eq!(
            spec.resolve(Path::new("/s"), &names(3)),
            vec![Some(0), Some(2), Some(5)]
        );
    }

    #[test]
    fn short_list_truncates_instead_of_failing() {
        let spec = AxisSpecification::List(vec![7, 8]);
        assert_eq!(
            spec.resolve(Path::new("/s"), &names(4)),
            vec![Some(7), Some(8), None, None]
        );
    }

    #[test]
    fn table_matches_full_path_then_directory_name() {
        let mut table = AxisTable::new();
        table.insert(Path::new("/old/place/scanA"), "z00", 1200);
        table.insert(Path::new("/old/place/scanA"), "z01", 1201);
        let spec = AxisSpecification::Table(table);

        let here = spec.resolve(Path::new("/old/place/scanA"), &names(3));
        assert_eq!(here, vec![Some(1200), Some(1201), None]);
        let moved = spec.resolve(Path::new("/new/scanA"), &names(2));
        assert_eq!(moved, vec![Some(1200), Some(1201)]);
        assert_eq!(spec.resolve(Path::new("/new/scanB"), &names(1)), vec![None]);
    }

    #[test]
    fn list_parsing_accepts_spaces_and_rejects_garbage() {
        assert_eq!(parse_axis_list(" 1, 2 ,3,").unwrap(), vec![1, 2, 3]);
        assert!(parse_axis_list("1,x").is_err());
    }

    #[test]
    fn equalizing_crops_follow_the_extreme_axis() {
        // left half: larger axis -> wider overlap -> narrower result
        let left = equalizing_crops(100, &[Some(20), Some(22), Some(25)]);
        assert_eq!(left, vec![5, 3, 0]);
        // right half: smaller axis -> wider overlap
        let right = equalizing_crops(100, &[Some(80), Some(78), None]);
        assert_eq!(right, vec![2, 0, 0]);
    }

    #[test]
    fn crop_policy_defaults_depend_on_the_mode() {
        let axes = [Some(20), Some(22)];
        let interp = AxisSpecification::Interpolated {
            first: 20.0,
            last: 22.0,
        };
        let list = AxisSpecification::List(vec![20, 22]);
        assert_eq!(CropPolicy::Auto.crops(&interp, 100, &axes), vec![2, 0]);
        assert_eq!(CropPolicy::Auto.crops(&list, 100, &axes), vec![0, 0]);
        assert_eq!(CropPolicy::Equalize.crops(&list, 100, &axes), vec![2, 0]);
        assert_eq!(CropPolicy::Fixed(3).crops(&list, 100, &axes), vec![3, 3]);
    }

    #[test]
    fn table_survives_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("axes.json");
        let mut table = AxisTable::new();
        table.insert(Path::new("/data/scan1"), "z00", 1187);
        table.save(&path).unwrap();
        assert_eq!(AxisTable::load(&path).unwrap(), table);

        let source: AxisSource =
            serde_json::from_str(&format!(r#"{{"mode":"table","path":{:?}}}"#, path)).unwrap();
        assert_eq!(source.load().unwrap(), AxisSpecification::Table(table));
    }
}
