//! Fixed export configuration for webexport.
//!
//! Nothing here is read from disk or the environment. The two presets are the
//! only supported combinations of source checkpoint and export settings.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ExportError, Result};

/// Shared directory and file names.
pub struct PathsConfig;

impl PathsConfig {
    /// Output directory, relative to the project root (served as `/models`).
    pub const OUTPUT_DIR: &'static str = "public/models";
    /// Fixed artifact name, overwritten on every run.
    pub const ARTIFACT_NAME: &'static str = "best.onnx";
    /// Training project, next to the directory that holds the project root.
    pub const TRAINING_PROJECT_DIR_NAME: &'static str = "yolo_v1";
    /// Levels above the project root where the training project lives.
    pub const TRAINING_PROJECT_DEPTH: usize = 2;
    /// Per-project scratch directory for deployed scripts and the venv.
    pub const TOOLS_DIR_NAME: &'static str = ".webexport";
    pub const SCRIPTS_DIR_NAME: &'static str = "scripts";
    pub const VENV_DIR_NAME: &'static str = "venv";
}

/// Numeric precision of the exported graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Fp32,
    Fp16,
    Int8,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Precision::Fp32 => "fp32",
            Precision::Fp16 => "fp16",
            Precision::Int8 => "int8",
        };
        f.write_str(name)
    }
}

/// Settings handed to the export capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Square input resolution in pixels.
    pub image_size: u32,
    pub precision: Precision,
    pub batch: u32,
    /// Variable-size inputs.
    pub dynamic: bool,
    /// Run onnx-simplifier over the traced graph.
    pub simplify: bool,
    /// TorchScript mobile optimization pass.
    pub optimize: bool,
    /// ONNX operator-set version.
    pub opset: u32,
}

impl ExportSettings {
    /// YOLO feature-map stride; input sizes must be a multiple of it.
    pub const STRIDE: u32 = 32;

    /// Reject settings the browser runtime cannot consume.
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 || self.image_size % Self::STRIDE != 0 {
            return Err(invalid(
                "image_size",
                format!(
                    "{} is not a positive multiple of {}",
                    self.image_size,
                    Self::STRIDE
                ),
            ));
        }
        if self.precision != Precision::Fp32 {
            return Err(invalid(
                "precision",
                format!("{} export is not supported, use fp32", self.precision),
            ));
        }
        if self.batch != 1 {
            return Err(invalid("batch", format!("must be 1, got {}", self.batch)));
        }
        if self.dynamic {
            return Err(invalid("dynamic", "dynamic input shapes are not supported"));
        }
        Ok(())
    }

    /// Input shape the exported graph must report: `[batch, 3, size, size]`.
    pub fn expected_input_shape(&self) -> Vec<i64> {
        let size = i64::from(self.image_size);
        vec![i64::from(self.batch), 3, size, size]
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ExportError {
    ExportError::InvalidSettings {
        field: field.to_string(),
        message: message.into(),
    }
}

/// The two supported source/configuration variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPreset {
    /// Maximum compatibility: opset 11, no simplification.
    #[default]
    Browser,
    /// Simplified graph at opset 12, quantization explicitly off.
    Simplified,
}

impl ExportPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportPreset::Browser => "browser",
            ExportPreset::Simplified => "simplified",
        }
    }

    pub fn settings(&self) -> ExportSettings {
        match self {
            ExportPreset::Browser => ExportSettings {
                image_size: 640,
                precision: Precision::Fp32,
                batch: 1,
                dynamic: false,
                simplify: false,
                optimize: false,
                opset: 11,
            },
            ExportPreset::Simplified => ExportSettings {
                image_size: 640,
                precision: Precision::Fp32,
                batch: 1,
                dynamic: false,
                simplify: true,
                optimize: false,
                opset: 12,
            },
        }
    }

    /// Checkpoint location relative to the training project directory.
    pub fn checkpoint_relative_path(&self) -> &'static Path {
        match self {
            ExportPreset::Browser => {
                Path::new("combine/out/runs/detect/l1_l5_combined/weights/best.pt")
            }
            ExportPreset::Simplified => Path::new("runs/detect/train/weights/best.pt"),
        }
    }
}

impl fmt::Display for ExportPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "browser" => Ok(ExportPreset::Browser),
            "simplified" => Ok(ExportPreset::Simplified),
            other => Err(format!(
                "unknown preset '{other}' (expected 'browser' or 'simplified')"
            )),
        }
    }
}
