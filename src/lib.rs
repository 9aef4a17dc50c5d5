//! # fitsweep - batch spectrum extraction for astronomical frames
//!
//! fitsweep walks a directory of FITS detector frames, detects objects in each
//! frame, extracts a one-dimensional spectrum per object and consolidates every
//! object record into a single CSV catalog.
//!
//! ## Features
//!
//! - **Two execution backends**: a local crossbeam worker pool and a
//!   rank-based message-passing world, producing the same catalog
//! - **Fault isolation**: a broken frame is logged and skipped, the batch keeps going
//! - **Deterministic output tree**: `output_dir/<origin>/<object_id>.csv`
//! - **Pluggable collaborators**: frame loading, detection and extraction are traits
//!
//! ## Quick Start
//!
//! ```bash
//! fitsweep --input_dir frames/ --output_dir out/spectra
//! fitsweep --input_dir frames/ --output_dir out/spectra --backend ranks --ranks 8
//! ```

pub mod astro;
pub mod batch;
pub mod cli;
pub mod config;
pub mod frames;
pub mod parallel;
pub mod processing;
pub mod storage;

pub use batch::{RunSummary, run_batch};
pub use cli::{Cli, Output};
pub use config::FitsweepConfig;

/// Result type alias for fitsweep operations
pub type Result<T> = anyhow::Result<T>;
