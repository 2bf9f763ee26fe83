//! Binary entrypoint for frameshow.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "frameshow", about = "Digital picture frame slideshow player")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the media library root
    #[arg(long, value_name = "DIR")]
    library: Option<PathBuf>,

    /// Override per-slide display time (seconds)
    #[arg(long, value_name = "SECONDS")]
    time_delay: Option<u64>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("frameshow={level}").parse()?)
        .add_directive("wgpu=warn".parse()?)
        .add_directive("winit=warn".parse()?)
        .add_directive("notify=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut config = frameshow::Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(library) = cli.library {
        config.library_path = library;
    }
    if let Some(seconds) = cli.time_delay {
        config.playlist.time_delay = Duration::from_secs(seconds);
    }
    let config = config.validated().context("validating configuration")?;
    info!(library = %config.library_path.display(), "starting frameshow");

    let app = frameshow::App::new(config)?;
    app.run()?;
    Ok(())
}
