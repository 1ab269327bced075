//! Ordered frame sequences and index-based file naming.
//!
//! A [`FrameSequence`] addresses every page of a sorted list of files with
//! one global index, so a directory of single-page TIFFs and one multi-page
//! container are read the same way. [`SequenceNaming`] recovers the
//! `prefix + zero-padded index + extension` convention of a single-page
//! sequence so each projection pair can be checked against it, and
//! [`IndexPattern`] renders printf-style `%04d` output names.
use super::io::{self, Frame};
use crate::error::ImageError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct FrameSequence {
    files: Vec<PathBuf>,
    /// Cumulative page offsets, `offsets[i]` is the global index of the
    /// first page of `files[i]`; one trailing entry holds the total.
    offsets: Vec<usize>,
}

impl FrameSequence {
    /// Sorted frame files directly inside `dir`. An empty directory gives an
    /// empty sequence.
    pub fn open(dir: &Path) -> Result<Self, ImageError> {
        Self::from_files(list_frame_files(dir)?)
    }

    /// A single (possibly multi-page) container file.
    pub fn from_file(path: &Path) -> Result<Self, ImageError> {
        Self::from_files(vec![path.to_path_buf()])
    }

    fn from_files(files: Vec<PathBuf>) -> Result<Self, ImageError> {
        let mut offsets = Vec::with_capacity(files.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for file in &files {
            total += io::count_pages(file)?;
            offsets.push(total);
        }
        Ok(Self { files, offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// True when every file holds exactly one page.
    pub fn is_single_page(&self) -> bool {
        self.len() == self.files.len()
    }

    /// `(width, height)` of the first frame.
    pub fn dimensions(&self) -> Result<(usize, usize), ImageError> {
        let first = self.files.first().ok_or_else(|| {
            ImageError::EmptySequence(PathBuf::from("<empty frame sequence>"))
        })?;
        io::frame_dimensions(first)
    }

    /// File and page holding global frame `index`.
    pub fn locate(&self, index: usize) -> Result<(&Path, usize), ImageError> {
        if index >= self.len() {
            return Err(ImageError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        // offsets is sorted; the owning file is the last one starting at or before index
        let file_idx = self.offsets.partition_point(|&start| start <= index) - 1;
        Ok((&self.files[file_idx], index - self.offsets[file_idx]))
    }

    pub fn read(&self, index: usize) -> Result<Frame, ImageError> {
        let (path, page) = self.locate(index)?;
        io::read_page(path, page)
    }
}

/// Frame files directly inside `dir`, sorted by file name.
pub fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>, ImageError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ImageError::io(dir, e))? {
        let entry = entry.map_err(|e| ImageError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && io::is_frame_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Naming convention of a numbered single-page sequence, e.g.
/// `frame_000012.tif` → prefix `frame_`, 6 digits, extension `tif`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceNaming {
    pub prefix: String,
    pub digits: usize,
    pub first_index: u64,
    pub extension: String,
}

impl SequenceNaming {
    /// Infer the convention from the first file of a sequence. Returns `None`
    /// when the file stem does not end in digits.
    pub fn infer(first: &Path) -> Option<Self> {
        let stem = first.file_stem()?.to_str()?;
        let extension = first.extension()?.to_str()?.to_string();
        let digit_start = stem
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)?;
        let digits = &stem[digit_start..];
        Some(Self {
            prefix: stem[..digit_start].to_string(),
            digits: digits.len(),
            first_index: digits.parse().ok()?,
            extension,
        })
    }

    /// Expected file name of the `offset`-th frame of the sequence.
    pub fn file_name(&self, offset: usize) -> String {
        format!(
            "{}{:0width$}.{}",
            self.prefix,
            self.first_index + offset as u64,
            self.extension,
            width = self.digits
        )
    }

    /// Whether `path` carries the expected name for `offset`.
    pub fn matches(&self, path: &Path, offset: usize) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name == self.file_name(offset))
    }
}

/// printf-style output naming with exactly one integer field, `%d` or
/// `%0Nd`, e.g. `sli-%04d.tif`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexPattern {
    prefix: String,
    width: usize,
    suffix: String,
}

impl IndexPattern {
    pub fn parse(pattern: &str) -> Result<Self, ImageError> {
        let bad = || ImageError::Pattern(pattern.to_string());
        let start = pattern.find('%').ok_or_else(bad)?;
        let rest = &pattern[start + 1..];
        let end = rest.find('d').ok_or_else(bad)?;
        let spec = &rest[..end];
        let width = if spec.is_empty() {
            0
        } else if spec.starts_with('0') && spec.len() > 1 {
            spec[1..].parse().map_err(|_| bad())?
        } else {
            return Err(bad());
        };
        let suffix = &rest[end + 1..];
        if suffix.contains('%') {
            return Err(bad());
        }
        Ok(Self {
            prefix: pattern[..start].to_string(),
            width,
            suffix: suffix.to_string(),
        })
    }

    pub fn format(&self, index: usize) -> String {
        format!(
            "{}{:0width$}{}",
            self.prefix,
            index,
            self.suffix,
            width = self.width
        )
    }

    pub fn path(&self, index: usize) -> PathBuf {
        PathBuf::from(self.format(index))
    }
}

impl std::fmt::Display for IndexPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.width == 0 {
            write!(f, "{}%d{}", self.prefix, self.suffix)
        } else {
            write!(f, "{}%0{}d{}", self.prefix, self.width, self.suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageF32, SampleFormat};

    #[test]
    fn naming_is_inferred_from_trailing_digits() {
        let naming = SequenceNaming::infer(Path::new("/data/tomo/frame_000012.tif")).unwrap();
        assert_eq!(naming.prefix, "frame_");
        assert_eq!(naming.digits, 6);
        assert_eq!(naming.first_index, 12);
        assert_eq!(naming.file_name(3), "frame_000015.tif");
        assert!(naming.matches(Path::new("x/frame_000013.tif"), 1));
        assert!(!naming.matches(Path::new("x/frame_000014.tif"), 1));
        assert!(SequenceNaming::infer(Path::new("flat.tif")).is_none());
    }

    #[test]
    fn index_pattern_renders_printf_fields() {
        let p = IndexPattern::parse("out/sli-%04d.tif").unwrap();
        assert_eq!(p.format(7), "out/sli-0007.tif");
        assert_eq!(p.to_string(), "out/sli-%04d.tif");
        assert_eq!(IndexPattern::parse("a%db").unwrap().format(12), "a12b");
        assert!(IndexPattern::parse("no-field.tif").is_err());
        assert!(IndexPattern::parse("%4d").is_err());
        assert!(IndexPattern::parse("%04d-%04d").is_err());
    }

    #[test]
    fn global_index_spans_files_and_pages() {
        let dir = tempfile::tempdir().unwrap();
        let page = |v: f32| ImageF32::from_vec(2, 1, vec![v, v]).unwrap();
        io::write_tiff_pages(
            &dir.path().join("a.tif"),
            &[page(0.0), page(1.0), page(2.0)],
            SampleFormat::U16,
        )
        .unwrap();
        io::write_frame(&dir.path().join("b.tif"), &page(3.0), SampleFormat::U16).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let seq = FrameSequence::open(dir.path()).unwrap();
        assert_eq!(seq.len(), 4);
        assert!(!seq.is_single_page());
        assert_eq!(seq.locate(2).unwrap().1, 2);
        assert_eq!(seq.locate(3).unwrap().1, 0);
        assert_eq!(seq.read(3).unwrap().image.data, vec![3.0, 3.0]);
        assert!(seq.read(4).is_err());
    }

    #[test]
    fn empty_directory_is_an_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let seq = FrameSequence::open(dir.path()).unwrap();
        assert!(seq.is_empty());
        assert!(seq.dimensions().is_err());
    }
}
