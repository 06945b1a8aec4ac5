mod cli;
mod config;
mod run;

use anyhow::Result;
use clap::Parser;
use engine_logging::{engine_error, engine_info, LogDestination};
use log::LevelFilter;

use crate::cli::Args;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (mut config, loaded_from) = Config::load(args.config.as_deref())?;
    config.apply_overrides(&args);

    let destination = match &config.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, level_for(args.verbose));
    if let Some(path) = &loaded_from {
        engine_info!("Loaded configuration from {:?}", path);
    }

    match run::run(&args.input, args.base_url.as_deref(), &config).await {
        Ok(summary) => {
            engine_info!(
                "Saved {:?} ({} media files)",
                summary.markdown_path,
                summary.media_written
            );
            Ok(())
        }
        Err(err) => {
            engine_error!("Conversion failed: {:#}", err);
            Err(err)
        }
    }
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
