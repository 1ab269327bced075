//! Sharpness metrics for reconstructed candidate slices.
use crate::error::ImageError;
use crate::image::ImageF32;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Mean,
    Std,
    Skew,
    Kurtosis,
    /// Median absolute deviation.
    Mad,
    /// Sum of absolute values.
    Asum,
    Min,
    Max,
    /// Shannon entropy of a 256-bin histogram, in bits.
    Entropy,
    /// Sum of absolute gradients over both image axes.
    Sag,
}

impl MetricKind {
    const ALL: [MetricKind; 10] = [
        MetricKind::Mean,
        MetricKind::Std,
        MetricKind::Skew,
        MetricKind::Kurtosis,
        MetricKind::Mad,
        MetricKind::Asum,
        MetricKind::Min,
        MetricKind::Max,
        MetricKind::Entropy,
        MetricKind::Sag,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Mean => "mean",
            MetricKind::Std => "std",
            MetricKind::Skew => "skew",
            MetricKind::Kurtosis => "kurtosis",
            MetricKind::Mad => "mad",
            MetricKind::Asum => "asum",
            MetricKind::Min => "min",
            MetricKind::Max => "max",
            MetricKind::Entropy => "entropy",
            MetricKind::Sag => "sag",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

/// A metric, optionally negated. Written as its name, with an `m` prefix for
/// the negated form (`std`, `mstd`, `sag`, `msag`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Metric {
    pub kind: MetricKind,
    pub inverted: bool,
}

impl Default for Metric {
    fn default() -> Self {
        Self {
            kind: MetricKind::Std,
            inverted: false,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverted {
            f.write_str("m")?;
        }
        f.write_str(self.kind.name())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(kind) = MetricKind::from_name(s) {
            return Ok(Self {
                kind,
                inverted: false,
            });
        }
        s.strip_prefix('m')
            .and_then(MetricKind::from_name)
            .map(|kind| Self {
                kind,
                inverted: true,
            })
            .ok_or_else(|| format!("unknown metric `{s}`"))
    }
}

impl TryFrom<String> for Metric {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Metric> for String {
    fn from(m: Metric) -> Self {
        m.to_string()
    }
}

impl Metric {
    pub fn evaluate(&self, image: &ImageF32) -> f64 {
        let data = &image.data;
        let value = match self.kind {
            MetricKind::Mean => mean(data),
            MetricKind::Std => central_moment(data, 2).sqrt(),
            MetricKind::Skew => standardized_moment(data, 3),
            MetricKind::Kurtosis => standardized_moment(data, 4) - 3.0,
            MetricKind::Mad => median_abs_deviation(data),
            MetricKind::Asum => data.iter().map(|v| v.abs() as f64).sum(),
            MetricKind::Min => data.iter().fold(f64::INFINITY, |m, &v| m.min(v as f64)),
            MetricKind::Max => data.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v as f64)),
            MetricKind::Entropy => entropy(data, 256),
            MetricKind::Sag => sum_abs_gradient(image),
        };
        if self.inverted {
            -value
        } else {
            value
        }
    }
}

fn mean(data: &[f32]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64
}

fn central_moment(data: &[f32], order: i32) -> f64 {
    let mu = mean(data);
    data.iter().map(|&v| (v as f64 - mu).powi(order)).sum::<f64>() / data.len() as f64
}

/// Biased standardized moment; 0 for constant data.
fn standardized_moment(data: &[f32], order: i32) -> f64 {
    let m2 = central_moment(data, 2);
    if m2 <= 0.0 {
        return if order == 4 { 3.0 } else { 0.0 };
    }
    central_moment(data, order) / m2.powf(order as f64 / 2.0)
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

fn median_abs_deviation(data: &[f32]) -> f64 {
    let med = median(data.iter().map(|&v| v as f64).collect());
    median(data.iter().map(|&v| (v as f64 - med).abs()).collect())
}

fn entropy(data: &[f32], bins: usize) -> f64 {
    let (lo, hi) = data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v as f64), hi.max(v as f64))
    });
    if data.is_empty() || hi <= lo {
        return 0.0;
    }
    let mut hist = vec![0usize; bins];
    let scale = bins as f64 / (hi - lo);
    for &v in data {
        let b = (((v as f64 - lo) * scale) as usize).min(bins - 1);
        hist[b] += 1;
    }
    let total = data.len() as f64;
    -hist
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

/// Central differences inside, one-sided at the borders; an axis shorter
/// than two samples contributes nothing.
fn sum_abs_gradient(image: &ImageF32) -> f64 {
    let (w, h) = image.shape();
    let grad = |a: f32, b: f32, span: f32| ((b - a) / span).abs() as f64;
    let mut total = 0.0;
    for y in 0..h {
        for x in 0..w {
            if w >= 2 {
                let (x0, x1) = (x.saturating_sub(1), (x + 1).min(w - 1));
                total += grad(image.get(x0, y), image.get(x1, y), (x1 - x0) as f32);
            }
            if h >= 2 {
                let (y0, y1) = (y.saturating_sub(1), (y + 1).min(h - 1));
                total += grad(image.get(x, y0), image.get(x, y1), (y1 - y0) as f32);
            }
        }
    }
    total
}

/// Subtract the least-squares line through `(i, scores[i])`.
pub fn detrend(scores: &[f64]) -> Vec<f64> {
    let n = scores.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let nf = n as f64;
    let mx = (nf - 1.0) / 2.0;
    let my = scores.iter().sum::<f64>() / nf;
    let (sxy, sxx) = scores
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxy, sxx), (i, &y)| {
            let dx = i as f64 - mx;
            (sxy + dx * (y - my), sxx + dx * dx)
        });
    let slope = sxy / sxx;
    scores
        .iter()
        .enumerate()
        .map(|(i, &y)| y - (my + slope * (i as f64 - mx)))
        .collect()
}

/// Index of the largest score; the first one wins ties, NaN never wins.
pub fn argmax(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((i, s));
        }
    }
    best.map(|(i, _)| i)
}

/// One score per line in C `%g` notation.
pub fn write_scores(path: &Path, scores: &[f64]) -> Result<(), ImageError> {
    crate::image::io::ensure_parent_dir(path)?;
    let mut text = String::new();
    for &s in scores {
        text.push_str(&format_g(s));
        text.push('\n');
    }
    fs::write(path, text).map_err(|e| ImageError::io(path, e))
}

/// C `%g`: six significant digits, trailing zeros removed, exponent form
/// below 1e-4 and from 1e6 on.
pub fn format_g(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }
    let sci = format!("{v:.5e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_zeros(mantissa), exp.abs())
    } else {
        let decimals = (5 - exp) as usize;
        trim_zeros(&format!("{v:.decimals$}")).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
