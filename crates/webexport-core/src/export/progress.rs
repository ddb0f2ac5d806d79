//! Progress state for a single export script run.

use std::path::PathBuf;

use tracing::{info, warn};

use super::types::{ExportStage, ExportedModel, ScriptErrorKind, ScriptProgressLine};

/// Folds the script's JSON progress lines into the latest known state.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    pub stage: ExportStage,
    pub message: Option<String>,
    pub error_kind: Option<ScriptErrorKind>,
    pub error: Option<String>,
    /// Filled in by the `complete` line
    pub exported: Option<ExportedModel>,
}

impl Default for ExportProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportProgress {
    pub fn new() -> Self {
        Self {
            stage: ExportStage::Starting,
            message: None,
            error_kind: None,
            error: None,
            exported: None,
        }
    }

    /// Update from a script stdout JSON line.
    pub fn update_from_script(&mut self, line: &ScriptProgressLine) {
        match line.stage.as_str() {
            "ready" => {
                self.stage = ExportStage::Ready;
                self.message = line.message.clone();
            }
            "loading" => {
                self.stage = ExportStage::Loading;
                self.message = line.message.clone();
                info!("Loading YOLO model...");
            }
            "exporting" => {
                self.stage = ExportStage::Exporting;
                self.message = line.message.clone();
                info!("Exporting model to ONNX format...");
            }
            "complete" => {
                self.stage = ExportStage::Complete;
                self.exported = line.output_path.as_ref().map(|path| ExportedModel {
                    output_path: PathBuf::from(path),
                    output_size: line.output_size,
                    class_names: line.names.clone().unwrap_or_default(),
                    graph: line.graph(),
                });
            }
            "error" => {
                self.stage = ExportStage::Error;
                self.error_kind = line.kind;
                self.error = line.message.clone();
            }
            other => {
                warn!("Unknown export stage '{}'", other);
            }
        }
    }

    pub fn is_dependency_error(&self) -> bool {
        self.error_kind == Some(ScriptErrorKind::Dependency)
    }
}
