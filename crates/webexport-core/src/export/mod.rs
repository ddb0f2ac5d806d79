//! Checkpoint-to-ONNX export.
//!
//! This module provides the `ModelExporter` that turns a trained YOLO
//! checkpoint into the fixed ONNX artifact served to the browser.
//!
//! The conversion itself is performed by an `ExportBackend`. The production
//! backend, `UltralyticsBackend`, runs an embedded Python script that drives
//! the Ultralytics exporter and reports progress as JSON lines.

mod backend;
mod orchestrator;
pub(crate) mod pipeline;
mod progress;
pub mod relocate;
pub mod scripts;
mod types;
pub mod ultralytics;

pub use backend::ExportBackend;
pub use orchestrator::{verify_exported, ModelExporter};
pub use progress::ExportProgress;
pub use types::{
    ExportRequest, ExportStage, ExportedModel, GraphSummary, GraphTensor, ScriptErrorKind,
    ScriptProgressLine,
};
pub use ultralytics::UltralyticsBackend;
