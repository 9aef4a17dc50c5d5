//! Execution backends
//!
//! Both backends consume the same [`BatchJob`] and return one record list per
//! processed frame. They differ only in how frames reach workers:
//!
//! ```text
//! LocalPool:  driver ──reset──▶ fan out every frame ──▶ N worker threads
//!                     ◀── outcomes in completion order ──┘
//!
//! RankWorld:  rank 0 ──reset──▶ barrier ──▶ each rank: own contiguous slice
//!                                           ──▶ gather to rank 0
//! ```
//!
//! The output tree reset is part of every backend run so that it always
//! happens before the first frame is written.
//!
//! # Example
//!
//! ```rust,no_run
//! use fitsweep::parallel::{ExecutionBackend, LocalPool, RankWorld};
//!
//! let pool = LocalPool::new(4);
//! let ranks = RankWorld::new(8);
//! assert_eq!(pool.name(), "pool");
//! assert_eq!(ranks.name(), "ranks");
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::frames::InputFile;
use crate::processing::{FileOutcome, FileProcessor, ObjectRecord};

pub mod pool;
pub mod progress;
pub mod ranks;

pub use pool::LocalPool;
pub use progress::ProgressReporter;
pub use ranks::{Communicator, RankWorld, ThreadComm};

/// Everything a backend needs to run one batch
pub struct BatchJob {
    pub files: Vec<InputFile>,
    pub output_dir: PathBuf,
    pub processor: FileProcessor,
    pub reporter: Arc<dyn Reporter>,
}

/// Runs a batch on some concurrency substrate
pub trait ExecutionBackend {
    fn name(&self) -> &'static str;

    /// Reset the output tree, process every frame exactly once and return
    /// one record list per frame (failed frames yield an empty list).
    fn run(&self, job: &BatchJob) -> anyhow::Result<Vec<Vec<ObjectRecord>>>;
}

/// Receives one signal per finished frame, from whichever thread finished it
pub trait Reporter: Send + Sync {
    /// Called once with the number of frames, before the backend starts
    fn start(&self, _total_files: usize) {}

    fn file_finished(&self, worker: usize, file: &InputFile, outcome: &FileOutcome);

    /// Called once after the backend returns
    fn finish(&self) {}
}

/// Log a frame failure with its file name and cause
pub fn log_outcome(worker: usize, file: &InputFile, outcome: &FileOutcome) {
    match outcome {
        Ok(records) => {
            tracing::debug!(worker, file = %file.name, objects = records.len(), "Frame done")
        }
        Err(e) => tracing::error!(worker, file = %file.name, "Error processing file {}: {}", file.name, e),
    }
}

/// Reporter that only logs, used when progress bars are off
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn file_finished(&self, worker: usize, file: &InputFile, outcome: &FileOutcome) {
        log_outcome(worker, file, outcome);
    }
}

/// Per-run counters tracked atomically across workers
#[derive(Debug, Default)]
pub struct RunStats {
    pub succeeded: AtomicUsize,
    pub failed: AtomicUsize,
    pub objects: AtomicUsize,
}

impl RunStats {
    pub fn record(&self, outcome: &FileOutcome) {
        match outcome {
            Ok(records) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                self.objects.fetch_add(records.len(), Ordering::Relaxed);
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// (succeeded, failed, objects)
    pub fn get_counts(&self) -> (usize, usize, usize) {
        (
            self.succeeded.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.objects.load(Ordering::Relaxed),
        )
    }
}

/// Counts outcomes and forwards them to another reporter
pub struct StatsReporter {
    inner: Arc<dyn Reporter>,
    stats: Arc<RunStats>,
}

impl StatsReporter {
    pub fn new(inner: Arc<dyn Reporter>) -> Self {
        Self {
            inner,
            stats: Arc::new(RunStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<RunStats> {
        self.stats.clone()
    }
}

impl Reporter for StatsReporter {
    fn start(&self, total_files: usize) {
        self.inner.start(total_files);
    }

    fn file_finished(&self, worker: usize, file: &InputFile, outcome: &FileOutcome) {
        self.stats.record(outcome);
        self.inner.file_finished(worker, file, outcome);
    }

    fn finish(&self) {
        self.inner.finish();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Remembers every signal so tests can assert on them
    #[derive(Default)]
    pub struct RecordingReporter {
        pub finished: Mutex<Vec<(usize, String)>>,
        pub errors: Mutex<Vec<(String, String)>>,
    }

    impl Reporter for RecordingReporter {
        fn file_finished(&self, worker: usize, file: &InputFile, outcome: &FileOutcome) {
            self.finished.lock().unwrap().push((worker, file.name.clone()));
            if let Err(e) = outcome {
                self.errors
                    .lock()
                    .unwrap()
                    .push((file.name.clone(), e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::FileError;
    use std::path::Path;

    fn frame(name: &str) -> InputFile {
        InputFile::new(Path::new("/in").join(name), "_cor")
    }

    #[test]
    fn test_stats_reporter_counts_and_forwards() {
        let recording = Arc::new(testing::RecordingReporter::default());
        let reporter = StatsReporter::new(recording.clone());

        let ok: FileOutcome = Ok(vec![ObjectRecord {
            object_id: 1,
            x: 0.0,
            y: 0.0,
            origin: "A".to_string(),
            flux: 1.0,
            npix: 3,
        }]);
        let failed: FileOutcome = Err(FileError::Panicked("boom".to_string()));

        reporter.file_finished(0, &frame("A_cor1.fits"), &ok);
        reporter.file_finished(1, &frame("B_cor1.fits"), &failed);

        assert_eq!(reporter.stats().get_counts(), (1, 1, 1));
        assert_eq!(recording.finished.lock().unwrap().len(), 2);
        assert_eq!(recording.errors.lock().unwrap()[0].0, "B_cor1.fits");
    }
}
