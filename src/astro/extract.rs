use anyhow::{Result, ensure};

use crate::processing::{Image, Spectrum, SpectrumExtractor};

/// Collapses a band of rows around the object into one sample per column.
///
/// The X axis is treated as the dispersion axis, so the spectrum has one
/// sample per image column.
#[derive(Debug, Clone)]
pub struct ApertureExtractor {
    pub half_width: usize,
}

impl Default for ApertureExtractor {
    fn default() -> Self {
        Self { half_width: 2 }
    }
}

impl SpectrumExtractor for ApertureExtractor {
    fn extract(&self, image: &Image, x: f64, y: f64) -> Result<Spectrum> {
        ensure!(
            x.is_finite() && y.is_finite(),
            "object position ({x}, {y}) is not finite"
        );
        ensure!(
            x >= 0.0 && y >= 0.0 && x < image.width as f64 && y < image.height as f64,
            "object position ({x:.2}, {y:.2}) outside {}x{} frame",
            image.width,
            image.height
        );

        let row = (y.round() as usize).min(image.height - 1);
        let rows = row.saturating_sub(self.half_width)..=(row + self.half_width).min(image.height - 1);

        Ok((0..image.width)
            .map(|column| rows.clone().map(|r| image.get(column, r)).sum())
            .collect())
    }
}
