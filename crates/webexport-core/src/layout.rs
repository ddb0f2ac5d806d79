//! Project layout resolution.
//!
//! Every path the exporter touches is derived from a single project root:
//! - checkpoint: `{root}/../../yolo_v1/<preset checkpoint>`
//! - artifact: `{root}/public/models/best.onnx`
//! - tooling: `{root}/.webexport/{scripts,venv}`

use std::path::{Path, PathBuf};

use crate::config::{ExportPreset, PathsConfig};
use crate::error::IoResultExt;
use crate::Result;

/// Fixed on-disk layout of the web project and the training project above it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    /// Relative roots are resolved against the current directory so parent
    /// lookups see real directories rather than `.` or an empty path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::fs::canonicalize(&root)
            .or_else(|_| std::path::absolute(&root))
            .unwrap_or(root);
        Self { root }
    }

    /// Use the current working directory as the project root.
    pub fn discover() -> Result<Self> {
        let cwd = std::env::current_dir().with_path(".")?;
        Ok(Self::new(cwd))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Training project directory (`yolo_v1`), two levels above the project root.
    pub fn training_project_dir(&self) -> PathBuf {
        self.root
            .ancestors()
            .take(PathsConfig::TRAINING_PROJECT_DEPTH + 1)
            .last()
            .unwrap_or(&self.root)
            .join(PathsConfig::TRAINING_PROJECT_DIR_NAME)
    }

    /// Source checkpoint for a preset.
    pub fn checkpoint_path(&self, preset: ExportPreset) -> PathBuf {
        self.training_project_dir()
            .join(preset.checkpoint_relative_path())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::OUTPUT_DIR)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir().join(PathsConfig::ARTIFACT_NAME)
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.root.join(PathsConfig::TOOLS_DIR_NAME)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.tools_dir().join(PathsConfig::SCRIPTS_DIR_NAME)
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.tools_dir().join(PathsConfig::VENV_DIR_NAME)
    }

    /// Get the path to the Python executable within the project venv.
    ///
    /// # Platform Behavior
    /// - **Linux/macOS**: `{venv}/bin/python`
    /// - **Windows**: `{venv}/Scripts/python.exe`
    pub fn venv_python(&self) -> PathBuf {
        #[cfg(windows)]
        {
            self.venv_dir().join("Scripts").join("python.exe")
        }
        #[cfg(not(windows))]
        {
            self.venv_dir().join("bin").join("python")
        }
    }
}
