//! Styled terminal output for run summaries

use console::style;

use crate::batch::RunSummary;

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    /// Print a verbose message (only if verbose mode is enabled)
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            println!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    /// Print a labelled count
    pub fn breakdown(&self, label: &str, value: impl std::fmt::Display) {
        if !self.quiet {
            println!(
                "  {} {} {}",
                style("•").cyan(),
                style(value.to_string()).yellow().bold(),
                style(label).dim()
            );
        }
    }

    /// End-of-run report
    pub fn summary(&self, summary: &RunSummary) {
        if summary.failed == 0 {
            self.success(&format!(
                "Processed {} frames in {:.2}s ({} backend, {} workers)",
                summary.files, summary.elapsed_secs, summary.backend, summary.workers
            ));
        } else {
            self.warning(&format!(
                "Processed {} frames in {:.2}s, {} failed ({} backend, {} workers)",
                summary.files, summary.elapsed_secs, summary.failed, summary.backend, summary.workers
            ));
        }
        self.breakdown("objects cataloged", summary.objects);
        self.breakdown("frames succeeded", summary.succeeded);
        self.breakdown("catalog", summary.catalog_path.display());
        self.breakdown("spectra", summary.output_dir.display());
    }
}
