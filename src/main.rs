//! CLI entry point for tikfetch.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tikfetch_core::config::load_config_file;
use tikfetch_core::{
    NoProgress, PipelineSummary, ProgressSink, RunConfig, Settings, collect_links,
    load_default_config, pipeline,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;
mod progress;
mod terminal;

use cli::Args;
use progress::BarProgress;

/// Process exit outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    Failure,
    Interrupted,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
            ProcessExit::Interrupted => ExitCode::from(130),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let no_color = terminal::should_disable_color(
        args.no_color,
        terminal::no_color_env_requested(),
        terminal::is_dumb_terminal(),
    );
    terminal::init_tracing(terminal::default_level(args.quiet, args.verbose), no_color);
    debug!(?args, "CLI arguments parsed");

    match run(args).await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    if args.has_no_input() {
        Args::command().print_help()?;
        return Ok(ProcessExit::Success);
    }

    let file_settings = load_file_settings(&args)?;
    let config = RunConfig::from_settings(&args.settings().merged_over(file_settings))
        .context("Invalid configuration")?;
    debug!(?config, "configuration resolved");

    let links = collect_links(args.file.as_deref(), &args.links)?;
    if links.is_empty() {
        info!("No links provided");
        return Ok(ProcessExit::Success);
    }

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping");
            cancel_on_signal.cancel();
        }
    });

    let progress: Arc<dyn ProgressSink> = if terminal::should_show_progress(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    ) {
        Arc::new(BarProgress::new())
    } else {
        Arc::new(NoProgress)
    };

    let summary = pipeline::run(&config, &links, progress, &cancel).await?;
    print_summary(&summary);
    Ok(exit_outcome(&summary))
}

fn load_file_settings(args: &Args) -> Result<Settings> {
    if args.no_config {
        return Ok(Settings::default());
    }
    if let Some(path) = &args.config {
        return Ok(load_config_file(path)?);
    }
    let loaded = load_default_config()?;
    if loaded.loaded_from_file
        && let Some(path) = &loaded.path
    {
        debug!(path = %path.display(), "loaded config file");
    }
    Ok(loaded.settings)
}

fn exit_outcome(summary: &PipelineSummary) -> ProcessExit {
    if summary.cancelled {
        ProcessExit::Interrupted
    } else if summary.has_failures() {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}

fn print_summary(summary: &PipelineSummary) {
    let skipped = summary.already_downloaded();
    let rejected = summary.rejected.len() - skipped;
    if skipped > 0 {
        println!("Skipped {skipped} already downloaded video(s)");
    }
    if rejected > 0 {
        println!("Ignored {rejected} invalid link(s)");
    }
    if !summary.extraction_failures.is_empty() {
        println!(
            "Could not retrieve {} download link(s)",
            summary.extraction_failures.len()
        );
    }
    if summary.report.total() > 0 || summary.cancelled {
        println!("Downloads: {}", summary.report);
    }
}
