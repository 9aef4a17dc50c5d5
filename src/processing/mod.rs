//! Per-frame unit of work and the collaborator seams it drives
//!
//! [`FileProcessor`] turns one frame into a list of [`ObjectRecord`]s. The
//! domain steps (loading, detection, extraction, persistence) are reached
//! through the traits below so that backends and tests can swap them out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod processor;

pub use processor::FileProcessor;

/// Calibrated 2-D image, row-major (`y * width + x`)
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<f64>,
}

impl Image {
    pub fn new(width: usize, height: usize, pixels: Vec<f64>) -> anyhow::Result<Self> {
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| anyhow::anyhow!("image size {width}x{height} overflows"))?;
        anyhow::ensure!(
            pixels.len() == expected,
            "image buffer holds {} pixels, expected {width}x{height}",
            pixels.len()
        );
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.pixels[y * self.width + x]
    }
}

/// A loaded frame: header cards plus calibrated pixel data
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: BTreeMap<String, String>,
    pub image: Image,
}

/// Object as reported by a detector, before it is tied to a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub object_id: u64,
    pub x: f64,
    pub y: f64,
    pub flux: f64,
    pub npix: usize,
}

/// One catalog row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    #[serde(rename = "Object_ID")]
    pub object_id: u64,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    pub origin: String,
    #[serde(rename = "Flux")]
    pub flux: f64,
    #[serde(rename = "Npix")]
    pub npix: usize,
}

impl ObjectRecord {
    /// Catalog header, in serialization order
    pub const HEADERS: [&'static str; 6] = ["Object_ID", "X", "Y", "origin", "Flux", "Npix"];

    pub fn from_detection(detection: Detection, origin: &str) -> Self {
        Self {
            object_id: detection.object_id,
            x: detection.x,
            y: detection.y,
            origin: origin.to_string(),
            flux: detection.flux,
            npix: detection.npix,
        }
    }
}

/// Ordered samples extracted for one object
pub type Spectrum = Vec<f64>;

/// Loads and calibrates a raw frame
pub trait FramePreprocessor: Send + Sync {
    fn preprocess(&self, path: &Path) -> anyhow::Result<Frame>;
}

/// Finds objects in a calibrated image
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, image: &Image) -> anyhow::Result<Vec<Detection>>;
}

/// Derives a spectrum at an object position
pub trait SpectrumExtractor: Send + Sync {
    fn extract(&self, image: &Image, x: f64, y: f64) -> anyhow::Result<Spectrum>;
}

/// Persists one spectrum under a frame's output subdirectory
pub trait SpectrumStore: Send + Sync {
    fn persist(&self, spectrum: &Spectrum, object_id: u64, subdir: &Path)
    -> anyhow::Result<PathBuf>;
}

/// Why a single frame produced no records.
///
/// Recoverable: the frame is skipped and the batch continues.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("preprocessing failed: {0:#}")]
    Preprocess(anyhow::Error),

    #[error("object detection failed: {0:#}")]
    Detect(anyhow::Error),

    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("spectrum extraction failed for object {object_id}: {cause:#}")]
    Extract {
        object_id: u64,
        cause: anyhow::Error,
    },

    #[error("cannot persist spectrum for object {object_id}: {cause:#}")]
    Persist {
        object_id: u64,
        cause: anyhow::Error,
    },

    #[error("collaborator panicked: {0}")]
    Panicked(String),
}

/// Explicit per-frame result inspected by the backends
pub type FileOutcome = Result<Vec<ObjectRecord>, FileError>;
