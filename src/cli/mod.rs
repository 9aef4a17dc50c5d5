//! Command-line interface for fitsweep
//!
//! One flat command: `--input_dir` and `--output_dir` are required, everything
//! else overrides the layered configuration.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

mod output;

pub use output::Output;

use crate::batch::run_batch;
use crate::config::{BackendKind, ConfigLoader, FitsweepConfig};
use crate::parallel::{LogReporter, ProgressReporter, Reporter};

/// fitsweep - extract object spectra from a directory of FITS frames
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory containing the FITS frames
    #[arg(long = "input_dir", value_name = "PATH")]
    pub input_dir: PathBuf,

    /// Directory receiving one subdirectory of spectra per frame
    #[arg(long = "output_dir", value_name = "PATH")]
    pub output_dir: PathBuf,

    /// Configuration file (toml, json or yaml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Execution backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Worker threads for the pool backend
    #[arg(long)]
    pub workers: Option<usize>,

    /// Number of ranks for the ranks backend
    #[arg(long)]
    pub ranks: Option<usize>,

    /// Summary format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Execute the batch described by the arguments
    pub fn run(self) -> Result<()> {
        let output = Output::new(self.verbose, self.quiet);

        let config = self.resolve_config()?;
        output.verbose(&format!(
            "backend: {}, frame pattern: {}",
            config.backend, config.frames.pattern
        ));

        let reporter: Arc<dyn Reporter> = if self.quiet || !console::Term::stderr().is_term() {
            Arc::new(LogReporter)
        } else {
            Arc::new(ProgressReporter::new(&config.backend.to_string()))
        };

        let summary = run_batch(&self.input_dir, &self.output_dir, &config, reporter)?;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            OutputFormat::Text => output.summary(&summary),
        }
        Ok(())
    }

    /// Config file and environment, then command-line overrides
    fn resolve_config(&self) -> Result<FitsweepConfig> {
        let mut config = ConfigLoader::load_with_custom_config(self.config.as_deref())?.extract()?;

        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(workers) = self.workers {
            config.pool.workers = workers;
        }
        if let Some(ranks) = self.ranks {
            config.ranks.size = ranks;
        }
        Ok(config)
    }
}
