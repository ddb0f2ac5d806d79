//! webexport - export the trained detector to ONNX for the web app.
//!
//! With no arguments this exports the `browser` preset checkpoint from the
//! training project into `public/models/best.onnx` under the current
//! directory, prints a summary and exits. Any failure exits non-zero with a
//! status that identifies the failing stage.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;
use webexport_core::{ExportError, ExportPreset, ProjectLayout};

#[derive(Parser, Debug)]
#[command(name = "webexport")]
#[command(about = "Export a trained YOLO checkpoint to ONNX for browser inference")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Web project root containing public/models (defaults to the current directory)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Python interpreter with ultralytics installed
    #[arg(long, global = true)]
    python: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export the checkpoint to public/models/best.onnx (default)
    Export {
        /// Source checkpoint and export configuration (browser, simplified)
        #[arg(long, default_value_t = ExportPreset::Browser)]
        preset: ExportPreset,
    },
    /// Create the project venv and install ultralytics
    Setup,
    /// Describe an ONNX file (defaults to the exported artifact)
    Inspect {
        path: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the report.
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let export_err = err.downcast_ref::<ExportError>();
            eprintln!("✗ {err}");
            if let Some(hint) = export_err.and_then(ExportError::remedy) {
                eprintln!("{hint}");
            }
            ExitCode::from(export_err.map_or(1, ExportError::exit_code))
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let layout = match args.project_root {
        Some(root) => ProjectLayout::new(root),
        None => ProjectLayout::discover()?,
    };
    debug!("Project root: {}", layout.root().display());

    let command = args.command.unwrap_or(Command::Export {
        preset: ExportPreset::default(),
    });
    match command {
        Command::Export { preset } => {
            commands::export(&layout, preset, args.python, args.debug).await
        }
        Command::Setup => commands::setup(&layout, args.python).await,
        Command::Inspect { path } => commands::inspect(&layout, path, args.python).await,
    }
}
