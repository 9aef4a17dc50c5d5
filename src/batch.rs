//! Batch driver: enumerate frames, run a backend, write the catalog
//!
//! Fatal errors (unreadable input directory, origin collisions, failed reset,
//! failed collective operations, catalog I/O) propagate to the caller.
//! Per-frame failures never do; they only show up in the reporter and in the
//! `failed` count of the [`RunSummary`].

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::astro::{ApertureExtractor, FitsPreprocessor, ThresholdDetector};
use crate::config::{BackendKind, FitsweepConfig};
use crate::frames::FrameScanner;
use crate::parallel::{BatchJob, ExecutionBackend, LocalPool, RankWorld, Reporter, StatsReporter};
use crate::processing::FileProcessor;
use crate::storage::{CsvSpectrumStore, aggregate, catalog_path};

/// What a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub backend: String,
    pub workers: usize,
    pub files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub objects: usize,
    pub output_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub elapsed_secs: f64,
}

/// Backend selected by the configuration, with its worker/rank count
pub fn build_backend(config: &FitsweepConfig) -> (Box<dyn ExecutionBackend>, usize) {
    match config.backend {
        BackendKind::Pool => {
            let pool = LocalPool::from_config(&config.pool);
            let workers = pool.workers();
            (Box::new(pool), workers)
        }
        BackendKind::Ranks => {
            let world = RankWorld::new(config.ranks.effective_size());
            let size = world.size();
            (Box::new(world), size)
        }
    }
}

/// FileProcessor wired to the built-in FITS collaborators
pub fn build_processor(config: &FitsweepConfig) -> FileProcessor {
    FileProcessor::new(
        Box::new(FitsPreprocessor {
            subtract_background: config.calibration.subtract_background,
        }),
        Box::new(ThresholdDetector {
            sigma: config.detection.sigma,
            min_pixels: config.detection.min_pixels,
        }),
        Box::new(ApertureExtractor {
            half_width: config.extraction.half_width,
        }),
        Box::new(CsvSpectrumStore::new(&config.output.spectrum_extension)),
    )
    .with_cleanup(config.output.cleanup_failed)
}

/// Run a full batch with the configured backend and built-in collaborators
pub fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    config: &FitsweepConfig,
    reporter: Arc<dyn Reporter>,
) -> Result<RunSummary> {
    let (backend, workers) = build_backend(config);
    run_with(
        backend.as_ref(),
        workers,
        build_processor(config),
        input_dir,
        output_dir,
        config,
        reporter,
    )
}

/// Run a batch on an explicit backend and processor
pub fn run_with(
    backend: &dyn ExecutionBackend,
    workers: usize,
    processor: FileProcessor,
    input_dir: &Path,
    output_dir: &Path,
    config: &FitsweepConfig,
    reporter: Arc<dyn Reporter>,
) -> Result<RunSummary> {
    let started = Instant::now();

    let scanner = FrameScanner::new(&config.frames.pattern, &config.frames.origin_delimiter)?;
    let files = scanner
        .scan(input_dir)
        .context("Failed to enumerate input frames")?;
    let total = files.len();

    tracing::info!(
        backend = backend.name(),
        workers,
        "Processing {total} frames from {}",
        input_dir.display()
    );

    let stats_reporter = Arc::new(StatsReporter::new(reporter));
    let stats = stats_reporter.stats();
    stats_reporter.start(total);

    let job = BatchJob {
        files,
        output_dir: output_dir.to_path_buf(),
        processor,
        reporter: stats_reporter.clone(),
    };

    let lists = backend.run(&job);
    stats_reporter.finish();
    let lists = lists?;

    let catalog = catalog_path(output_dir, &config.output.catalog_name);
    let rows = aggregate(lists, &catalog)?;

    let (succeeded, failed, objects) = stats.get_counts();
    debug_assert_eq!(rows, objects);
    if failed > 0 {
        tracing::warn!("{failed} of {total} frames failed and were skipped");
    }

    Ok(RunSummary {
        backend: backend.name().to_string(),
        workers,
        files: total,
        succeeded,
        failed,
        objects: rows,
        output_dir: output_dir.to_path_buf(),
        catalog_path: catalog,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}
