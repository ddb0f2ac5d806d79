//! Types for model export operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{ExportPreset, ExportSettings, PathsConfig};
use crate::layout::ProjectLayout;

/// A single export: where to read, where to write, and how to export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExportRequest {
    /// Source checkpoint (`best.pt`)
    pub checkpoint: PathBuf,
    /// Directory the artifact is relocated into
    pub output_dir: PathBuf,
    /// Fixed artifact file name inside `output_dir`
    pub artifact_name: String,
    pub settings: ExportSettings,
}

impl ExportRequest {
    /// Build the request for a preset from the fixed project layout.
    pub fn for_preset(layout: &ProjectLayout, preset: ExportPreset) -> Self {
        Self {
            checkpoint: layout.checkpoint_path(preset),
            output_dir: layout.output_dir(),
            artifact_name: PathsConfig::ARTIFACT_NAME.to_string(),
            settings: preset.settings(),
        }
    }

    /// Final artifact path.
    pub fn destination(&self) -> PathBuf {
        self.output_dir.join(&self.artifact_name)
    }
}

/// Stage of an export as reported by the export script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    /// Script started, nothing reported yet
    Starting,
    /// Dependencies imported (probe mode)
    Ready,
    /// Reading the checkpoint
    Loading,
    /// Tracing and writing the ONNX graph
    Exporting,
    Complete,
    Error,
}

/// Failure category reported on an `error` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptErrorKind {
    /// `ultralytics` (or `onnx`) could not be imported
    Dependency,
    /// The export call raised
    Export,
    /// Bad arguments passed to the script
    Usage,
}

/// A named graph input or output with its shape (`-1` for symbolic dims).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphTensor {
    pub name: String,
    pub shape: Vec<i64>,
    /// ONNX `TensorProto.DataType` code (1 = float32)
    #[serde(default)]
    pub elem_type: Option<i32>,
}

/// Introspected interface of an ONNX graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphSummary {
    pub inputs: Vec<GraphTensor>,
    pub outputs: Vec<GraphTensor>,
    pub opset: Option<i64>,
}

impl GraphSummary {
    pub fn primary_input(&self) -> Option<&GraphTensor> {
        self.inputs.first()
    }
}

/// What the export capability hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedModel {
    /// Library-chosen location of the produced file
    pub output_path: PathBuf,
    pub output_size: Option<u64>,
    /// Class labels ordered by class index
    pub class_names: Vec<String>,
    /// `None` when the graph could not be introspected
    pub graph: Option<GraphSummary>,
}

/// JSON progress line emitted by the export script on stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptProgressLine {
    pub stage: String,
    #[serde(default)]
    pub kind: Option<ScriptErrorKind>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub output_size: Option<u64>,
    #[serde(default)]
    pub names: Option<Vec<String>>,
    #[serde(default)]
    pub inputs: Option<Vec<GraphTensor>>,
    #[serde(default)]
    pub outputs: Option<Vec<GraphTensor>>,
    #[serde(default)]
    pub opset: Option<i64>,
}

impl ScriptProgressLine {
    /// Graph summary carried by a `complete` line, if the script introspected one.
    pub fn graph(&self) -> Option<GraphSummary> {
        let inputs = self.inputs.clone()?;
        Some(GraphSummary {
            inputs,
            outputs: self.outputs.clone().unwrap_or_default(),
            opset: self.opset,
        })
    }
}
