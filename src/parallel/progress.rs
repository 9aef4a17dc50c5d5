use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Reporter, log_outcome};
use crate::frames::InputFile;
use crate::processing::FileOutcome;

/// Progress bar over frames, with a live failure count in the message.
///
/// Every outcome is also logged, so failures stay visible when the bar is
/// hidden.
pub struct ProgressReporter {
    bar: ProgressBar,
    failed: AtomicUsize,
    objects: AtomicUsize,
}

impl ProgressReporter {
    pub fn new(label: &str) -> Self {
        let style = ProgressStyle::with_template(
            "{prefix:.bold} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} frames {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        bar.set_style(style);
        bar.set_prefix(label.to_string());

        Self {
            bar,
            failed: AtomicUsize::new(0),
            objects: AtomicUsize::new(0),
        }
    }

    /// A reporter that tracks counts but never draws
    pub fn hidden() -> Self {
        let reporter = Self::new("");
        reporter.bar.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Reporter for ProgressReporter {
    fn start(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.enable_steady_tick(std::time::Duration::from_millis(120));
    }

    fn file_finished(&self, worker: usize, file: &InputFile, outcome: &FileOutcome) {
        // Write log lines above the bar instead of through it
        self.bar.suspend(|| log_outcome(worker, file, outcome));

        match outcome {
            Ok(records) => {
                self.objects.fetch_add(records.len(), Ordering::Relaxed);
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.bar.set_message(format!(
            "objects: {} | failed: {}",
            self.objects.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        ));
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
