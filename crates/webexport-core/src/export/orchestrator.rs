//! Export orchestrator.
//!
//! Runs one export from start to finish: validate the fixed settings, check
//! the checkpoint, probe the backend, create the output directory, export,
//! verify the produced graph, relocate it and build the report. The first
//! failure ends the run.

use std::path::Path;

use tracing::{info, warn};

use super::backend::ExportBackend;
use super::relocate;
use super::types::{ExportRequest, ExportedModel};
use crate::config::ExportSettings;
use crate::error::IoResultExt;
use crate::report::ExportReport;
use crate::{ExportError, Result};

/// Orchestrates a checkpoint-to-ONNX export through an `ExportBackend`.
pub struct ModelExporter {
    backend: Box<dyn ExportBackend>,
}

impl ModelExporter {
    pub fn new(backend: impl ExportBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Run a single export.
    ///
    /// # Postconditions
    /// - On `Err(CheckpointNotFound)` nothing on disk was created or changed.
    /// - On `Ok`, `request.destination()` holds the new artifact; other files
    ///   in the output directory are untouched.
    pub async fn run(&self, request: &ExportRequest) -> Result<ExportReport> {
        // -- PHASE 1: VALIDATE (read-only, fail early) --
        request.settings.validate()?;

        info!("Model path: {}", request.checkpoint.display());
        info!("Output directory: {}", request.output_dir.display());

        if !request.checkpoint.is_file() {
            return Err(ExportError::CheckpointNotFound(request.checkpoint.clone()));
        }

        self.backend.probe().await?;

        // -- PHASE 2: EXPORT --
        std::fs::create_dir_all(&request.output_dir).with_path(&request.output_dir)?;

        info!(
            "Exporting with {} (imgsz={}, opset={}, simplify={})",
            self.backend.name(),
            request.settings.image_size,
            request.settings.opset,
            request.settings.simplify
        );
        let exported = self.backend.export(request).await?;
        verify_exported(&exported, &request.settings)?;

        // -- PHASE 3: RELOCATE --
        let destination = request.destination();
        let final_path = relocate::move_artifact(&exported.output_path, &destination)?;
        let final_path = absolute(&final_path);

        let size_bytes = std::fs::metadata(&final_path)
            .with_path(&final_path)?
            .len();

        Ok(ExportReport {
            artifact_path: final_path,
            size_bytes,
            input_size: request.settings.image_size,
            class_names: exported.class_names,
            graph: exported.graph,
        })
    }
}

/// Check the produced file against the fixed configuration before it
/// replaces the current artifact.
pub fn verify_exported(exported: &ExportedModel, settings: &ExportSettings) -> Result<()> {
    let size = std::fs::metadata(&exported.output_path)
        .map(|m| m.len())
        .map_err(|e| ExportError::ExportFailed {
            message: format!(
                "Exported file {} is not readable: {e}",
                exported.output_path.display()
            ),
        })?;
    if size == 0 {
        return Err(ExportError::ExportFailed {
            message: format!("Exported file {} is empty", exported.output_path.display()),
        });
    }

    let Some(graph) = &exported.graph else {
        warn!("Exported graph was not introspected; skipping shape check");
        return Ok(());
    };

    let expected = settings.expected_input_shape();
    match graph.primary_input() {
        Some(input) if input.shape == expected => {}
        Some(input) => {
            return Err(ExportError::GraphMismatch {
                expected,
                actual: input.shape.clone(),
            });
        }
        None => {
            return Err(ExportError::GraphMismatch {
                expected,
                actual: Vec::new(),
            });
        }
    }

    if let Some(opset) = graph.opset {
        if opset != i64::from(settings.opset) {
            warn!(
                "Exported opset {} differs from requested opset {}",
                opset, settings.opset
            );
        }
    }
    Ok(())
}

fn absolute(path: &Path) -> std::path::PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
