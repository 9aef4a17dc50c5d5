//! Threshold detection with connected-component grouping

use anyhow::{Result, ensure};
use std::collections::VecDeque;

use super::median;
use crate::processing::{Detection, Image, ObjectDetector};

/// Scale factor from median absolute deviation to a Gaussian sigma
const MAD_TO_SIGMA: f64 = 1.4826;

/// Detects objects as 8-connected groups of pixels above
/// `median + sigma * robust_sigma`.
///
/// Object ids are assigned from 1 in raster order of each group's first pixel.
#[derive(Debug, Clone)]
pub struct ThresholdDetector {
    pub sigma: f64,
    pub min_pixels: usize,
}

impl Default for ThresholdDetector {
    fn default() -> Self {
        Self {
            sigma: 5.0,
            min_pixels: 3,
        }
    }
}

impl ThresholdDetector {
    pub fn threshold(&self, image: &Image) -> Option<(f64, f64)> {
        let background = median(image.pixels.iter().copied())?;
        let mad = median(image.pixels.iter().map(|v| (v - background).abs()))?;
        Some((background, background + self.sigma * MAD_TO_SIGMA * mad))
    }
}

impl ObjectDetector for ThresholdDetector {
    fn detect(&self, image: &Image) -> Result<Vec<Detection>> {
        ensure!(self.sigma.is_finite(), "detection sigma must be finite");

        let Some((background, threshold)) = self.threshold(image) else {
            // nothing finite to detect on
            return Ok(Vec::new());
        };

        let (width, height) = (image.width, image.height);
        let mut visited = vec![false; width * height];
        let mut queue = VecDeque::new();
        let mut detections = Vec::new();

        for start in 0..width * height {
            if visited[start] || !(image.pixels[start] > threshold) {
                continue;
            }

            visited[start] = true;
            queue.push_back(start);

            let (mut flux, mut sum_x, mut sum_y, mut npix) = (0.0, 0.0, 0.0, 0usize);
            while let Some(index) = queue.pop_front() {
                let (x, y) = (index % width, index / width);
                let weight = image.pixels[index] - background;
                flux += weight;
                sum_x += weight * x as f64;
                sum_y += weight * y as f64;
                npix += 1;

                for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                        let neighbour = ny * width + nx;
                        if !visited[neighbour] && image.pixels[neighbour] > threshold {
                            visited[neighbour] = true;
                            queue.push_back(neighbour);
                        }
                    }
                }
            }

            if npix < self.min_pixels || flux <= 0.0 {
                continue;
            }

            detections.push(Detection {
                object_id: detections.len() as u64 + 1,
                x: sum_x / flux,
                y: sum_y / flux,
                flux,
                npix,
            });
        }

        tracing::trace!(objects = detections.len(), threshold, "Detection finished");
        Ok(detections)
    }
}
