//! Owned single-channel f32 image in row-major layout.
//!
//! Every frame is widened to `f32` on load regardless of its on-disk sample
//! format; the format travels separately in [`Frame`](super::Frame) so the
//! stitched result can be written back the way it came in.
use crate::error::ImageError;

#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    /// Image width in pixels (detector columns)
    pub w: usize,
    /// Image height in pixels (detector rows)
    pub h: usize,
    /// Backing storage in row-major order, `w * h` samples
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Construct a zero-initialized buffer of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0.0; w * h],
        }
    }

    /// Wrap an existing row-major buffer.
    pub fn from_vec(w: usize, h: usize, data: Vec<f32>) -> Result<Self, ImageError> {
        if w.checked_mul(h) != Some(data.len()) {
            return Err(ImageError::SizeMismatch {
                width: w,
                height: h,
                actual: data.len(),
            });
        }
        Ok(Self { w, h, data })
    }

    /// Stack equally long rows into an image, one row per entry.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, ImageError> {
        let w = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(w * rows.len());
        for row in rows {
            if row.len() != w {
                return Err(ImageError::SizeMismatch {
                    width: w,
                    height: rows.len(),
                    actual: row.len() * rows.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            w,
            h: rows.len(),
            data,
        })
    }

    /// `(width, height)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.w;
        &mut self.data[start..start + self.w]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks_exact(0) panics, and a zero-width image has no samples anyway
        self.data.chunks_exact(self.w.max(1)).take(self.h)
    }

    /// Copy of rows `y0..y1`.
    pub fn row_range(&self, y0: usize, y1: usize) -> ImageF32 {
        let y1 = y1.min(self.h);
        let y0 = y0.min(y1);
        ImageF32 {
            w: self.w,
            h: y1 - y0,
            data: self.data[y0 * self.w..y1 * self.w].to_vec(),
        }
    }

    /// Copy of columns `x0..x1` of every row.
    pub fn column_range(&self, x0: usize, x1: usize) -> ImageF32 {
        let x1 = x1.min(self.w);
        let x0 = x0.min(x1);
        let w = x1 - x0;
        let mut data = Vec::with_capacity(w * self.h);
        for row in self.rows() {
            data.extend_from_slice(&row[x0..x1]);
        }
        ImageF32 { w, h: self.h, data }
    }

    /// Left-right mirrored copy.
    pub fn mirrored(&self) -> ImageF32 {
        let mut out = self.clone();
        for y in 0..out.h {
            out.row_mut(y).reverse();
        }
        out
    }

    /// Mean over columns `x0..x1` of all rows, accumulated in f64.
    ///
    /// An empty block yields NaN, which callers neutralize.
    pub fn column_block_mean(&self, x0: usize, x1: usize) -> f64 {
        let x1 = x1.min(self.w);
        let x0 = x0.min(x1);
        let count = (x1 - x0) * self.h;
        if count == 0 {
            return f64::NAN;
        }
        let sum: f64 = self
            .rows()
            .map(|row| row[x0..x1].iter().map(|&v| v as f64).sum::<f64>())
            .sum();
        sum / count as f64
    }
}
