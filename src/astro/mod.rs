//! Default domain collaborators
//!
//! Simple, dependency-free implementations of frame loading, object detection
//! and spectrum extraction. They make the binary usable on real FITS files but
//! are intentionally basic; swap them through the traits in
//! [`crate::processing`] for production reductions.

pub mod detect;
pub mod extract;
pub mod fits;

pub use detect::ThresholdDetector;
pub use extract::ApertureExtractor;
pub use fits::FitsPreprocessor;

use crate::processing::Image;

/// Median of the finite values, `None` when there are none
pub(crate) fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let len = finite.len();
    let mid = len / 2;
    let (lower, upper, _) = finite.select_nth_unstable_by(mid, f64::total_cmp);
    let upper = *upper;
    if len % 2 == 1 {
        Some(upper)
    } else {
        let below = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((below + upper) / 2.0)
    }
}

/// Render Gaussian point sources on a flat background.
///
/// Handy for demos and tests; each source is `(x, y, amplitude)`.
pub fn synthetic_frame(
    width: usize,
    height: usize,
    background: f64,
    sources: &[(f64, f64, f64)],
) -> Image {
    const SIGMA: f64 = 1.0;
    const RADIUS: i64 = 3;

    let mut pixels = vec![background; width * height];
    for &(sx, sy, amplitude) in sources {
        let (cx, cy) = (sx.round() as i64, sy.round() as i64);
        for y in (cy - RADIUS).max(0)..=(cy + RADIUS).min(height as i64 - 1) {
            for x in (cx - RADIUS).max(0)..=(cx + RADIUS).min(width as i64 - 1) {
                let r2 = (x as f64 - sx).powi(2) + (y as f64 - sy).powi(2);
                pixels[y as usize * width + x as usize] +=
                    amplitude * (-r2 / (2.0 * SIGMA * SIGMA)).exp();
            }
        }
    }

    Image {
        width,
        height,
        pixels,
    }
}
