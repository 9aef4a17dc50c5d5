use anyhow::{Context, Result, anyhow, ensure};
use crossbeam::channel::{Receiver, Sender, unbounded};

use super::{BatchJob, ExecutionBackend};
use crate::config::PoolConfig;
use crate::frames::InputFile;
use crate::processing::{FileOutcome, ObjectRecord};
use crate::storage::reset_directory;

/// Fixed-size local worker pool, one task per frame.
///
/// Every frame is queued before the driver starts collecting, and outcomes are
/// collected in completion order. Workers share no mutable state; the only
/// shared resource is the output tree, which is partitioned by origin.
#[derive(Debug, Clone)]
pub struct LocalPool {
    workers: usize,
}

/// What each worker thread owns
struct WorkerContext<'a> {
    worker_id: usize,
    work_rx: Receiver<&'a InputFile>,
    result_tx: Sender<(usize, &'a InputFile, FileOutcome)>,
    job: &'a BatchJob,
}

impl LocalPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        let workers = if config.workers > 0 {
            config.workers
        } else {
            calculate_optimal_workers(config.thread_percentage)
        };
        Self::new(workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    fn worker_thread(ctx: WorkerContext<'_>) {
        while let Ok(file) = ctx.work_rx.recv() {
            let outcome = ctx.job.processor.process(file, &ctx.job.output_dir);
            if ctx.result_tx.send((ctx.worker_id, file, outcome)).is_err() {
                break; // Collector dropped
            }
        }
    }
}

impl ExecutionBackend for LocalPool {
    fn name(&self) -> &'static str {
        "pool"
    }

    fn run(&self, job: &BatchJob) -> Result<Vec<Vec<ObjectRecord>>> {
        // Must complete before any task exists
        reset_directory(&job.output_dir).with_context(|| {
            format!("Failed to reset output directory {}", job.output_dir.display())
        })?;

        let total = job.files.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let actual_workers = self.workers.min(total);
        tracing::debug!(workers = actual_workers, files = total, "Starting worker pool");

        let (work_tx, work_rx) = unbounded::<&InputFile>();
        let (result_tx, result_rx) = unbounded();

        let lists = crossbeam::thread::scope(|s| {
            for worker_id in 0..actual_workers {
                let ctx = WorkerContext {
                    worker_id,
                    work_rx: work_rx.clone(),
                    result_tx: result_tx.clone(),
                    job,
                };
                s.spawn(move |_| Self::worker_thread(ctx));
            }

            // Drop our copies so the channels close once workers are done
            drop(work_rx);
            drop(result_tx);

            // Full fan-out before waiting on any result
            for file in &job.files {
                if work_tx.send(file).is_err() {
                    break; // Workers dropped
                }
            }
            drop(work_tx);

            let mut lists = Vec::with_capacity(total);
            for (worker_id, file, outcome) in result_rx.iter() {
                job.reporter.file_finished(worker_id, file, &outcome);
                lists.push(outcome.unwrap_or_default());
            }
            lists
        })
        .map_err(|_| anyhow!("Worker thread panicked during pool execution"))?;

        ensure!(
            lists.len() == total,
            "Worker pool finished {} of {total} frames",
            lists.len()
        );
        Ok(lists)
    }
}

/// Worker count as a percentage of the available cores, always at least 1
pub fn calculate_optimal_workers(thread_percentage: u8) -> usize {
    let available_cores = num_cpus::get();
    std::cmp::max(1, (available_cores * thread_percentage.min(100) as usize) / 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::testing::RecordingReporter;
    use crate::processing::processor::testing::{named_frames, stub_processor};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn job(output_dir: &std::path::Path, names: &[&str], fail_on: Option<&str>) -> (BatchJob, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::default());
        let job = BatchJob {
            files: named_frames(names),
            output_dir: output_dir.to_path_buf(),
            processor: stub_processor(2, fail_on),
            reporter: reporter.clone(),
        };
        (job, reporter)
    }

    fn origins(lists: &[Vec<ObjectRecord>]) -> BTreeSet<(String, u64)> {
        lists
            .iter()
            .flatten()
            .map(|r| (r.origin.clone(), r.object_id))
            .collect()
    }

    #[test]
    fn test_pool_processes_every_frame_once() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let names = ["A_cor1.fits", "B_cor1.fits", "C_cor1.fits", "D_cor1.fits", "E_cor1.fits"];
        let (job, reporter) = job(&out, &names, None);

        let lists = LocalPool::new(3).run(&job).unwrap();

        assert_eq!(lists.len(), 5);
        assert_eq!(origins(&lists).len(), 10);

        let finished = reporter.finished.lock().unwrap();
        let seen: BTreeSet<_> = finished.iter().map(|(_, name)| name.clone()).collect();
        assert_eq!(finished.len(), 5);
        assert_eq!(seen.len(), 5);
        assert!(finished.iter().all(|(worker, _)| *worker < 3));
    }

    #[test]
    fn test_pool_resets_output_before_work() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        std::fs::create_dir_all(out.join("stale")).unwrap();
        let (job, _) = job(&out, &["A_cor1.fits"], None);

        LocalPool::new(2).run(&job).unwrap();

        assert!(!out.join("stale").exists());
        assert!(out.join("A/1.csv").is_file());
    }

    #[test]
    fn test_pool_isolates_failing_frame() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let (job, reporter) = job(&out, &["A_cor1.fits", "bad_cor1.fits", "C_cor1.fits"], Some("bad"));

        let lists = LocalPool::new(2).run(&job).unwrap();

        assert_eq!(lists.len(), 3);
        let records = origins(&lists);
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|(origin, _)| origin != "bad"));

        let errors = reporter.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "bad_cor1.fits");
    }

    #[test]
    fn test_worker_count_does_not_change_results() {
        let names = ["A_cor1.fits", "B_cor1.fits", "C_cor1.fits", "D_cor1.fits"];
        let mut results = Vec::new();
        for workers in [1, 2, 4] {
            let temp = TempDir::new().unwrap();
            let (job, _) = job(&temp.path().join("out"), &names, None);
            results.push(origins(&LocalPool::new(workers).run(&job).unwrap()));
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }

    #[test]
    fn test_empty_batch_still_resets() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let (job, _) = job(&out, &[], None);

        assert!(LocalPool::new(4).run(&job).unwrap().is_empty());
        assert!(out.is_dir());
    }

    #[test]
    fn test_optimal_workers_calculation() {
        assert_eq!(calculate_optimal_workers(100), num_cpus::get());
        assert!(calculate_optimal_workers(75) <= num_cpus::get());
        assert_eq!(calculate_optimal_workers(0), 1);
        assert_eq!(calculate_optimal_workers(250), num_cpus::get());
    }

    #[test]
    fn test_from_config() {
        let fixed = LocalPool::from_config(&PoolConfig {
            workers: 3,
            thread_percentage: 75,
        });
        assert_eq!(fixed.workers(), 3);

        let auto = LocalPool::from_config(&PoolConfig {
            workers: 0,
            thread_percentage: 50,
        });
        assert!(auto.workers() >= 1);
    }
}
