//! Subcommand handlers.

use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::info;
use webexport_core::export::ultralytics::DEFAULT_PYTHON;
use webexport_core::{
    ExportBackend, ExportPreset, ExportRequest, ModelExporter, ProjectLayout, UltralyticsBackend,
};

/// Export the preset's checkpoint and print the summary.
///
/// `verbose` forwards Ultralytics' own export logging.
pub async fn export(
    layout: &ProjectLayout,
    preset: ExportPreset,
    python: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let request = ExportRequest::for_preset(layout, preset);
    let backend = UltralyticsBackend::for_layout(layout, python).with_verbose(verbose);
    info!(
        "Preset {} using Python interpreter {}",
        preset,
        backend.python().display()
    );

    let exporter = ModelExporter::new(backend);
    let report = exporter.run(&request).await?;

    println!("{report}");
    Ok(())
}

/// Create the project venv, install requirements and confirm the import works.
pub async fn setup(layout: &ProjectLayout, python: Option<PathBuf>) -> Result<()> {
    let base_python = python.unwrap_or_else(|| PathBuf::from(DEFAULT_PYTHON));

    let venv_python = UltralyticsBackend::ensure_environment(layout, &base_python).await?;
    UltralyticsBackend::for_layout(layout, Some(venv_python.clone()))
        .probe()
        .await?;

    println!("✓ Export environment ready: {}", venv_python.display());
    Ok(())
}

/// Print the interface of an ONNX file.
pub async fn inspect(
    layout: &ProjectLayout,
    path: Option<PathBuf>,
    python: Option<PathBuf>,
) -> Result<()> {
    let path = path.unwrap_or_else(|| layout.artifact_path());
    if !path.is_file() {
        bail!("No ONNX file at {}", path.display());
    }

    let backend = UltralyticsBackend::for_layout(layout, python);
    let described = backend.inspect(&path).await?;

    println!("{}", path.display());
    if let Some(size) = described.output_size {
        println!("- Size: {:.2} MB", size as f64 / (1024.0 * 1024.0));
    }
    match &described.graph {
        Some(graph) => println!("{graph}"),
        None => println!("- Graph details unavailable (onnx is not installed)"),
    }
    Ok(())
}
