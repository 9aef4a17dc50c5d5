//! Configuration management for fitsweep
//!
//! Settings are layered with figment (see [`core::ConfigLoader`]) and extracted
//! into the typed structures below. Every section has defaults matching the
//! embedded `default-config.toml`, so a partial config file is always valid.

use serde::{Deserialize, Serialize};

pub mod core;

pub use core::ConfigLoader;

/// Which execution backend runs the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Fixed-size local worker pool, one task per frame
    #[default]
    Pool,
    /// Message-passing ranks with a static partition
    Ranks,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Pool => write!(f, "pool"),
            BackendKind::Ranks => write!(f, "ranks"),
        }
    }
}

/// Main configuration structure for fitsweep
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FitsweepConfig {
    pub backend: BackendKind,
    pub pool: PoolConfig,
    pub ranks: RanksConfig,
    pub frames: FramesConfig,
    pub calibration: CalibrationConfig,
    pub detection: DetectionConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
}

/// Local worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker threads (0 = auto-detect)
    pub workers: usize,

    /// Percentage of CPU cores used when auto-detecting (1-100)
    pub thread_percentage: u8,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            thread_percentage: 75,
        }
    }
}

/// Rank world settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RanksConfig {
    /// Number of ranks (0 = one per CPU core)
    pub size: usize,
}

impl RanksConfig {
    pub fn effective_size(&self) -> usize {
        if self.size > 0 {
            self.size
        } else {
            num_cpus::get().max(1)
        }
    }
}

/// Input frame discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramesConfig {
    pub pattern: String,
    pub origin_delimiter: String,
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            pattern: "*.fits".to_string(),
            origin_delimiter: "_cor".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub subtract_background: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            subtract_background: true,
        }
    }
}

/// Object detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Threshold in robust standard deviations above the background
    pub sigma: f64,

    /// Smallest connected component reported as an object
    pub min_pixels: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sigma: 5.0,
            min_pixels: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub half_width: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { half_width: 2 }
    }
}

/// Output tree and catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub spectrum_extension: String,
    pub catalog_name: String,

    /// Remove a frame's subdirectory when the frame fails after writing into it
    pub cleanup_failed: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            spectrum_extension: "csv".to_string(),
            catalog_name: "objects.csv".to_string(),
            cleanup_failed: true,
        }
    }
}
