//! Acquisition tree model and discovery.
//!
//! A CT-set is a directory holding `darks/`, `flats/`, `tomo/` and optionally
//! `flats2/` for one acquisition. An input root is either one CT-set itself
//! ([`Acquisition::Flat`]) or a tree whose CT-set leaves are grouped by their
//! parent directory, the outer-loop scan ([`Acquisition::Nested`]).
mod scan;

pub use self::scan::scan;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Subdirectory names of a CT-set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLayout {
    pub tomo: String,
    pub darks: String,
    pub flats: String,
    pub flats2: String,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            tomo: "tomo".to_string(),
            darks: "darks".to_string(),
            flats: "flats".to_string(),
            flats2: "flats2".to_string(),
        }
    }
}

/// One discovered acquisition directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtSet {
    pub path: PathBuf,
    /// Outer-loop scan directory, `None` when the CT-set is the input root.
    pub outer: Option<PathBuf>,
    /// Position within the sorted slices of its outer-loop scan.
    pub slice_index: Option<usize>,
}

impl CtSet {
    /// Final path component, used as the slice name in axis tables.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn subdir(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn has_subdir(&self, name: &str) -> bool {
        self.subdir(name).is_dir()
    }

    /// Location relative to the scanned root; empty for a flat acquisition.
    pub fn relative_to<'a>(&'a self, root: &Path) -> &'a Path {
        self.path.strip_prefix(root).unwrap_or(Path::new(""))
    }

    /// Which reference directories this CT-set carries.
    pub fn references(&self, layout: &FrameLayout) -> References {
        References {
            darks: self.has_subdir(&layout.darks),
            flats: self.has_subdir(&layout.flats),
            flats2: self.has_subdir(&layout.flats2),
        }
    }
}

/// Reference directories present in a CT-set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct References {
    pub darks: bool,
    pub flats: bool,
    pub flats2: bool,
}

impl References {
    /// Frame subdirectories to stitch alongside the projections, in order.
    pub fn stitched_subdirs<'a>(&self, layout: &'a FrameLayout) -> Vec<&'a str> {
        let mut dirs = vec![layout.tomo.as_str()];
        for (present, name) in [
            (self.flats, &layout.flats),
            (self.darks, &layout.darks),
            (self.flats2, &layout.flats2),
        ] {
            if present {
                dirs.push(name.as_str());
            }
        }
        dirs
    }
}

/// All slices (CT-sets) found directly below one outer-loop directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OuterScan {
    pub path: PathBuf,
    /// Sorted by path; `slice_index` matches the position here.
    pub slices: Vec<CtSet>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// The scanned root is itself a CT-set.
    Flat(CtSet),
    /// CT-sets grouped by outer-loop scan; may be empty.
    Nested(Vec<OuterScan>),
}

impl Acquisition {
    pub fn ctsets(&self) -> Vec<&CtSet> {
        match self {
            Acquisition::Flat(set) => vec![set],
            Acquisition::Nested(groups) => groups.iter().flat_map(|g| g.slices.iter()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Acquisition::Flat(_) => 1,
            Acquisition::Nested(groups) => groups.iter().map(|g| g.slices.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Acquisition::Nested(_))
    }
}
