use halfacq::image::io::write_frame;
use halfacq::image::{ImageF32, SampleFormat};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

/// Frame whose sample at `(x, y)` is `f(x, y)`.
pub fn frame(w: usize, h: usize, f: impl Fn(usize, usize) -> f32) -> ImageF32 {
    let mut img = ImageF32::new(w, h);
    for y in 0..h {
        for x in 0..w {
            img.set(x, y, f(x, y));
        }
    }
    img
}

/// Write `frames` as `<prefix>0000.tif`, `<prefix>0001.tif`, ... into `dir`.
pub fn write_series(dir: &Path, prefix: &str, frames: &[ImageF32], format: SampleFormat) {
    fs::create_dir_all(dir).expect("create frame directory");
    for (i, f) in frames.iter().enumerate() {
        write_frame(&dir.join(format!("{prefix}{i:04}.tif")), f, format).expect("write frame");
    }
}

/// `n` distinct, slowly varying u16-range frames.
pub fn ramp_frames(n: usize, w: usize, h: usize) -> Vec<ImageF32> {
    (0..n)
        .map(|i| frame(w, h, |x, y| (1000 + 50 * i + 7 * x + 3 * y) as f32))
        .collect()
}

/// Gaussian blobs `(x0, y0, sigma, amplitude)` of the test phantom, in pixels.
pub const BLOBS: [(f64, f64, f64, f64); 3] = [
    (12.0, 5.0, 2.5, 0.08),
    (-18.0, -9.0, 3.5, 0.05),
    (3.0, -20.0, 2.0, 0.1),
];

/// Parallel-beam line integral of the phantom at angle `theta`, signed
/// distance `s` from the rotation axis.
pub fn phantom_projection(theta: f64, s: f64) -> f64 {
    BLOBS
        .iter()
        .map(|&(x0, y0, sigma, amp)| {
            let s0 = x0 * theta.cos() + y0 * theta.sin();
            amp * sigma * (2.0 * PI).sqrt() * (-(s - s0).powi(2) / (2.0 * sigma * sigma)).exp()
        })
        .sum()
}

pub const DARK: f32 = 100.0;
pub const FLAT: f32 = 1100.0;

/// Projections of the phantom over 360 degrees with the axis between
/// detector columns `axis - 1` and `axis`, lit by `beam(i)` at projection `i`.
fn projections_360(
    cols: usize,
    rows: usize,
    axis: usize,
    projections: usize,
    beam: impl Fn(usize) -> f32,
) -> Vec<ImageF32> {
    (0..projections)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / projections as f64;
            let flat = beam(i);
            frame(cols, rows, |x, _| {
                let s = x as f64 + 0.5 - axis as f64;
                let transmission = (-phantom_projection(theta, s)).exp();
                DARK + (flat - DARK) * transmission as f32
            })
        })
        .collect()
}

/// Constant dark and flat series, as a CT-set or a shared reference tree
/// carries them.
pub fn write_references(dir: &Path, cols: usize, rows: usize) {
    let dark = vec![frame(cols, rows, |_, _| DARK); 3];
    write_series(&dir.join("darks"), "dark_", &dark, SampleFormat::F32);
    let flat = vec![frame(cols, rows, |_, _| FLAT); 4];
    write_series(&dir.join("flats"), "flat_", &flat, SampleFormat::F32);
}

/// A CT-set scanned over 360 degrees in `projections` steps. Frames are
/// stored as f32 so the flat-field corrected values equal the phantom
/// projections.
pub fn half_acquisition_ctset(
    dir: &Path,
    cols: usize,
    rows: usize,
    axis: usize,
    projections: usize,
    with_flats: bool,
) {
    let tomo = projections_360(cols, rows, axis, projections, |_| FLAT);
    write_series(&dir.join("tomo"), "proj_", &tomo, SampleFormat::F32);
    let dark = vec![frame(cols, rows, |_, _| DARK); 3];
    write_series(&dir.join("darks"), "dark_", &dark, SampleFormat::F32);
    if with_flats {
        let flat = vec![frame(cols, rows, |_, _| FLAT); 4];
        write_series(&dir.join("flats"), "flat_", &flat, SampleFormat::F32);
    }
}

/// Like [`half_acquisition_ctset`], but the beam drifts linearly from
/// `FLAT` at the first projection to `flat2` at the last one. The flats
/// before and after the scan land in `flats/` and `flats2/`.
pub fn drifting_beam_ctset(
    dir: &Path,
    cols: usize,
    rows: usize,
    axis: usize,
    projections: usize,
    flat2: f32,
) {
    let last = (projections - 1) as f32;
    let tomo = projections_360(cols, rows, axis, projections, |i| {
        FLAT + (flat2 - FLAT) * i as f32 / last
    });
    write_series(&dir.join("tomo"), "proj_", &tomo, SampleFormat::F32);
    write_references(dir, cols, rows);
    let after = vec![frame(cols, rows, |_, _| flat2); 4];
    write_series(&dir.join("flats2"), "flat_", &after, SampleFormat::F32);
}

/// Full-field 180 degree row-sinogram of the phantom, `2 * half_width`
/// columns centred on the axis.
pub fn ideal_sinogram(projections_180: usize, half_width: usize) -> ImageF32 {
    frame(2 * half_width, projections_180, |x, i| {
        let theta = PI * i as f64 / projections_180 as f64;
        phantom_projection(theta, x as f64 + 0.5 - half_width as f64) as f32
    })
}
