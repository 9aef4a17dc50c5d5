use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fitsweep::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    cli.run()
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "fitsweep=debug"
    } else if quiet {
        "fitsweep=warn"
    } else {
        "fitsweep=info"
    };

    // RUST_LOG always wins over the flags
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
