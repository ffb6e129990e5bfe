use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use fieldmap::{runner, Command, PipelineConfig};
use tracing::{debug, error};

/// Similarity graphs and specialization rankings from a bibliometric snapshot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(value_enum)]
    command: Command,

    /// Directory holding `snapshot/`; artifacts go to `artifacts/`
    root: PathBuf,

    /// JSON config file (overrides FIELDMAP_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = match PipelineConfig::resolve(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    debug!("config: {:?}", config);

    match runner(args.command, &args.root, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
