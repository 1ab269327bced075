//! Single-row sinograms and flat-field correction.
use crate::error::ImageError;
use crate::image::{FrameSequence, ImageF32};
use std::path::Path;

/// Stack row `row` of every frame in `dir` into an image with one line per
/// frame. A row outside the frame selects the middle row. With `even` set an
/// odd frame count drops the last frame.
pub fn extract_row(dir: &Path, row: i64, even: bool) -> Result<ImageF32, ImageError> {
    let seq = FrameSequence::open(dir)?;
    if seq.is_empty() {
        return Err(ImageError::EmptySequence(dir.to_path_buf()));
    }
    let (cols, rows) = seq.dimensions()?;
    let r = select_row(row, rows);
    let mut count = seq.len();
    if even && count % 2 == 1 {
        count -= 1;
    }
    let mut out = ImageF32::new(cols, count);
    for i in 0..count {
        let frame = seq.read(i)?;
        if frame.image.shape() != (cols, rows) {
            return Err(ImageError::SizeMismatch {
                width: cols,
                height: rows,
                actual: frame.image.data.len(),
            });
        }
        out.row_mut(i).copy_from_slice(frame.image.row(r));
    }
    Ok(out)
}

/// `row` if it addresses one of `rows` lines, else the middle line.
pub fn select_row(row: i64, rows: usize) -> usize {
    match usize::try_from(row) {
        Ok(r) if r < rows => r,
        _ => rows / 2,
    }
}

/// Per-column mean over all lines of a row stack.
pub fn mean_row(stack: &ImageF32) -> Vec<f32> {
    let mut acc = vec![0f64; stack.w];
    for line in stack.rows() {
        for (a, &v) in acc.iter_mut().zip(line) {
            *a += v as f64;
        }
    }
    let n = stack.h.max(1) as f64;
    acc.into_iter().map(|a| (a / n) as f32).collect()
}

/// `-ln((tomo - dark) / (flat - dark))` per sample, non-finite results set
/// to 0. With `flat2` the flat moves linearly from `flat` at the first
/// projection to `flat2` at the last.
pub fn flat_field_correct(
    tomo: &ImageF32,
    dark: &[f32],
    flat: &[f32],
    flat2: Option<&[f32]>,
) -> ImageF32 {
    let n = tomo.h;
    let mut out = ImageF32::new(tomo.w, n);
    for y in 0..n {
        let r = if n > 1 { y as f64 / (n - 1) as f64 } else { 0.0 };
        let line = tomo.row(y);
        for (x, px) in out.row_mut(y).iter_mut().enumerate() {
            let d = dark[x] as f64;
            let f = match flat2 {
                Some(f2) => flat[x] as f64 * (1.0 - r) + f2[x] as f64 * r,
                None => flat[x] as f64,
            };
            let v = -((line[x] as f64 - d) / (f - d)).ln();
            *px = if v.is_finite() { v as f32 } else { 0.0 };
        }
    }
    out
}
