//! Command-line entry point.
//!
//! ```text
//! spoutfill [CONFIG.json] [--window] [--write-config PATH]
//! ```
//!
//! Without a config file the defaults are used. Log verbosity follows
//! `RUST_LOG` (default `info`).

use spoutfill::{Pipeline, RunError, SceneConfig};
use std::path::PathBuf;
use std::process::ExitCode;

struct Args {
    config: Option<PathBuf>,
    window: bool,
    write_config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        window: false,
        write_config: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--window" => args.window = true,
            "--write-config" => {
                let path = iter.next().ok_or("--write-config needs a path")?;
                args.write_config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                return Err("usage: spoutfill [CONFIG.json] [--window] [--write-config PATH]".into())
            }
            other if other.starts_with('-') => return Err(format!("unknown option {}", other)),
            other => args.config = Some(PathBuf::from(other)),
        }
    }
    Ok(args)
}

fn run(args: Args) -> Result<(), RunError> {
    let config = match &args.config {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            SceneConfig::load(path)?
        }
        None => SceneConfig::default(),
    };

    if let Some(path) = &args.write_config {
        config.save(path)?;
        log::info!("Wrote config to {}", path.display());
        return Ok(());
    }

    let pipeline = Pipeline::from_config(config)?;
    let summary = if args.window {
        run_windowed(pipeline)?
    } else {
        pipeline.run_headless()?
    };

    if let Some(stats) = summary.recording {
        log::info!("{} frames written, {} dropped", stats.written, stats.dropped);
    }
    Ok(())
}

#[cfg(feature = "viewer")]
fn run_windowed(pipeline: Pipeline) -> Result<spoutfill::RunSummary, RunError> {
    pipeline.run_windowed()
}

#[cfg(not(feature = "viewer"))]
fn run_windowed(pipeline: Pipeline) -> Result<spoutfill::RunSummary, RunError> {
    log::warn!("Built without the `viewer` feature, running headless");
    pipeline.run_headless()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
