use std::process;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use patchsynth::config::Cli;
use patchsynth::{Controller, MirrorSink, SynthError};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("fatal: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), SynthError> {
    let cfg = cli.into_config()?;
    cfg.log();
    let sink = MirrorSink::new(&cfg.input_root, &cfg.output_root);
    let dry_run = cfg.dry_run;
    let summary = Controller::new(cfg, sink)?.run_all()?;
    summary.log(dry_run);
    info!("done");
    Ok(())
}
