use super::{Acquisition, CtSet, OuterScan};
use crate::error::ScanError;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Find every directory under `root` that directly contains a subdirectory
/// named `marker` (usually the projection directory name).
///
/// If `root` is such a directory the result is [`Acquisition::Flat`].
/// Otherwise leaves are grouped by parent directory; groups and their slices
/// are sorted by path here, discovery order carries no meaning. Unreadable
/// subdirectories are logged and skipped; only an unreadable root is an
/// error.
pub fn scan(root: &Path, marker: &str) -> Result<Acquisition, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    if root.join(marker).is_dir() {
        debug!("scan: {} is a single CT-set", root.display());
        return Ok(Acquisition::Flat(CtSet {
            path: root.to_path_buf(),
            outer: None,
            slice_index: None,
        }));
    }

    let mut leaves = Vec::new();
    let children = list_subdirs(root)?;
    for child in children {
        collect_leaves(&child, marker, &mut leaves);
    }

    let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for leaf in leaves {
        let parent = leaf.parent().unwrap_or(root).to_path_buf();
        groups.entry(parent).or_default().push(leaf);
    }

    let scans = groups
        .into_iter()
        .map(|(outer, mut paths)| {
            paths.sort();
            let slices = paths
                .into_iter()
                .enumerate()
                .map(|(i, path)| CtSet {
                    path,
                    outer: Some(outer.clone()),
                    slice_index: Some(i),
                })
                .collect();
            OuterScan {
                path: outer,
                slices,
            }
        })
        .collect::<Vec<_>>();
    debug!(
        "scan: {} outer-loop scans, {} CT-sets under {}",
        scans.len(),
        scans.iter().map(|s| s.slices.len()).sum::<usize>(),
        root.display()
    );
    Ok(Acquisition::Nested(scans))
}

fn collect_leaves(dir: &Path, marker: &str, leaves: &mut Vec<PathBuf>) {
    if dir.join(marker).is_dir() {
        leaves.push(dir.to_path_buf());
        return;
    }
    match list_subdirs(dir) {
        Ok(children) => {
            for child in children {
                collect_leaves(&child, marker, leaves);
            }
        }
        Err(err) => warn!("scan: skipping {err}"),
    }
}

fn list_subdirs(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let io_err = |source| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_dir() {
            out.push(entry.path());
        }
    }
    Ok(out)
}
