use crate::error::StitchError;
use crate::image::ImageF32;
use log::debug;

/// Half of the detector the rotation axis projects onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// `axis > cols / 2`: the given order is kept.
    Right,
    /// `axis <= cols / 2`: first and second swap roles.
    Left,
}

impl Side {
    pub fn of(cols: usize, axis: f64) -> Side {
        if axis > cols as f64 / 2.0 {
            Side::Right
        } else {
            Side::Left
        }
    }
}

/// Width of the overlap band in columns, `round(2 * (cols - axis))` on the
/// right side and `round(2 * axis)` on the left side (halves round up).
pub fn overlap_width(cols: usize, axis: f64) -> usize {
    let margin = match Side::of(cols, axis) {
        Side::Right => cols as f64 - axis,
        Side::Left => axis,
    };
    (2.0 * margin + 0.5).floor().max(0.0) as usize
}

/// Width of the stitched and cropped result, `None` if nothing would remain.
pub fn stitched_width(cols: usize, axis: f64, crop: usize) -> Option<usize> {
    let width = (2 * cols).checked_sub(overlap_width(cols, axis))?;
    width
        .checked_sub(2 * crop)
        .filter(|&w| w > 0)
}

/// Blend two equal-shape frames into one wide frame.
///
/// `second` must already be mirrored. Rescaled samples of `second` are
/// clipped to `range` (the valid range of the input sample format). A
/// non-finite intensity scale, e.g. from an all-zero overlap band, falls back
/// to 1.
pub fn stitch(
    first: &ImageF32,
    second: &ImageF32,
    axis: f64,
    crop: usize,
    range: (f32, f32),
) -> Result<ImageF32, StitchError> {
    if first.shape() != second.shape() {
        return Err(StitchError::ShapeMismatch {
            first: first.shape(),
            second: second.shape(),
        });
    }
    let (cols, rows) = first.shape();
    if !(0.0..=cols as f64).contains(&axis) {
        return Err(StitchError::AxisOutOfRange { axis, cols });
    }
    let dx = overlap_width(cols, axis);
    if dx > cols {
        return Err(StitchError::OverlapTooWide { dx, cols, axis });
    }
    let width = 2 * cols - dx;
    if 2 * crop >= width {
        return Err(StitchError::CropTooLarge { crop, width });
    }

    let (first, second) = match Side::of(cols, axis) {
        Side::Right => (first, second),
        Side::Left => (second, first),
    };

    let k = intensity_scale(first, second, dx);
    let (lo, hi) = range;
    let scaled = |v: f32| ((v as f64 * k) as f32).clamp(lo, hi);
    let ramp = linear_ramp(dx);
    let band_start = cols - dx;

    let mut out = ImageF32::new(width - 2 * crop, rows);
    for y in 0..rows {
        let a = first.row(y);
        let b = second.row(y);
        for (x, px) in out.row_mut(y).iter_mut().enumerate() {
            let xs = x + crop;
            *px = if xs < band_start {
                a[xs]
            } else if xs < cols {
                let j = xs - band_start;
                let r = ramp[j];
                (a[xs] as f64 * (1.0 - r) + scaled(b[j]) as f64 * r) as f32
            } else {
                scaled(b[xs - band_start])
            };
        }
    }
    Ok(out)
}

/// `mean(first's trailing dx columns) / mean(second's leading dx columns)`.
fn intensity_scale(first: &ImageF32, second: &ImageF32, dx: usize) -> f64 {
    let cols = first.w;
    let k = first.column_block_mean(cols - dx, cols) / second.column_block_mean(0, dx);
    if k.is_finite() {
        k
    } else {
        debug!("stitch: degenerate overlap statistics (dx={dx}), using unit scale");
        1.0
    }
}

/// `n` evenly spaced values from 0 to 1 inclusive; a single sample is 0.
fn linear_ramp(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n).map(|i| i as f64 / (n - 1) as f64).collect(),
    }
}
