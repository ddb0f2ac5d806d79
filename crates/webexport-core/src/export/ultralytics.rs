//! Ultralytics export backend.
//!
//! Runs the embedded export script with a Python interpreter that has the
//! `ultralytics` package available, and implements `ExportBackend` on top of
//! the script's JSON progress protocol.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::backend::ExportBackend;
use super::pipeline::{self, ScriptRun};
use super::scripts;
use super::types::{ExportRequest, ExportStage, ExportedModel};
use crate::config::{ExportSettings, Precision};
use crate::layout::ProjectLayout;
use crate::{ExportError, Result};

/// Interpreter used when no override and no project venv exist.
#[cfg(windows)]
pub const DEFAULT_PYTHON: &str = "python";
#[cfg(not(windows))]
pub const DEFAULT_PYTHON: &str = "python3";

const PROCESS_NAME: &str = "Export script";

/// Export backend that drives Ultralytics through a Python subprocess.
#[derive(Debug, Clone)]
pub struct UltralyticsBackend {
    python: PathBuf,
    scripts_dir: PathBuf,
    /// Extra `PYTHONPATH` entry (a vendored ultralytics checkout)
    python_path: Option<PathBuf>,
    verbose: bool,
}

impl UltralyticsBackend {
    pub fn new(python: impl Into<PathBuf>, scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            scripts_dir: scripts_dir.into(),
            python_path: None,
            verbose: false,
        }
    }

    /// Backend for a project layout.
    ///
    /// Interpreter order: explicit override, project venv, `python3` on PATH.
    /// The training project directory is added to `PYTHONPATH` when present.
    pub fn for_layout(layout: &ProjectLayout, python_override: Option<PathBuf>) -> Self {
        let python = python_override.unwrap_or_else(|| {
            let venv_python = layout.venv_python();
            if venv_python.exists() {
                venv_python
            } else {
                PathBuf::from(DEFAULT_PYTHON)
            }
        });
        let training_dir = layout.training_project_dir();

        let mut backend = Self::new(python, layout.scripts_dir());
        if training_dir.is_dir() {
            backend.python_path = Some(training_dir);
        }
        backend
    }

    /// Forward Ultralytics' own verbose export logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    /// Describe an existing ONNX file (size, inputs, outputs, opset).
    pub async fn inspect(&self, path: &Path) -> Result<ExportedModel> {
        let args = vec![OsString::from("--inspect"), path.as_os_str().to_owned()];
        let run = self.run_script(&args).await?;
        check_run(&run)?;

        run.progress.exported.ok_or_else(|| ExportError::ExportFailed {
            message: format!("No description reported for {}", path.display()),
        })
    }

    /// Create the project venv and install the export requirements.
    ///
    /// Returns the path of the venv interpreter. An existing venv is reused.
    pub async fn ensure_environment(layout: &ProjectLayout, base_python: &Path) -> Result<PathBuf> {
        scripts::ensure_scripts_deployed(&layout.scripts_dir())?;

        let venv_path = layout.venv_dir();
        let python_path = layout.venv_python();

        if python_path.exists() {
            debug!("Export venv already exists at {}", venv_path.display());
            return Ok(python_path);
        }

        info!("Creating export virtual environment at {}", venv_path.display());

        let output = Command::new(base_python)
            .arg("-m")
            .arg("venv")
            .arg(&venv_path)
            .output()
            .await
            .map_err(|e| ExportError::DependencyUnavailable {
                message: format!("Failed to run {}: {e}", base_python.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::DependencyUnavailable {
                message: format!(
                    "Failed to create Python venv. Ensure {} is installed. Error: {stderr}",
                    base_python.display()
                ),
            });
        }

        let output = Command::new(&python_path)
            .args(["-m", "pip", "install", "--upgrade", "pip"])
            .output()
            .await
            .ok();
        if let Some(o) = output {
            if !o.status.success() {
                warn!(
                    "pip upgrade failed (non-fatal): {}",
                    String::from_utf8_lossy(&o.stderr)
                );
            }
        }

        let requirements_path = layout.scripts_dir().join(scripts::REQUIREMENTS_NAME);
        info!("Installing export dependencies...");

        let output = Command::new(&python_path)
            .args(["-m", "pip", "install", "-r"])
            .arg(&requirements_path)
            .output()
            .await
            .map_err(|e| ExportError::DependencyUnavailable {
                message: format!("Failed to install dependencies: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExportError::DependencyUnavailable {
                message: format!("Failed to install export dependencies: {stderr}"),
            });
        }

        info!("Export environment ready");
        Ok(python_path)
    }

    /// Deploy the script, spawn it with `args` and collect its output.
    async fn run_script(&self, args: &[OsString]) -> Result<ScriptRun> {
        let script = scripts::ensure_scripts_deployed(&self.scripts_dir)?;

        let mut command = Command::new(&self.python);
        command
            .arg(&script)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(extra) = &self.python_path {
            match extended_python_path(std::env::var_os("PYTHONPATH"), extra) {
                Ok(joined) => {
                    command.env("PYTHONPATH", joined);
                }
                Err(e) => warn!("Not extending PYTHONPATH with {}: {}", extra.display(), e),
            }
        }

        debug!("Running {} {}", self.python.display(), script.display());

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExportError::DependencyUnavailable {
                    message: format!("Python interpreter {} not found", self.python.display()),
                }
            } else {
                ExportError::ExportFailed {
                    message: format!("Failed to spawn export process: {e}"),
                }
            }
        })?;

        pipeline::run_to_completion(child, PROCESS_NAME).await
    }
}

/// Append `extra` to an inherited `PYTHONPATH`, keeping the caller's entries first.
fn extended_python_path(
    inherited: Option<OsString>,
    extra: &Path,
) -> std::result::Result<OsString, std::env::JoinPathsError> {
    let mut paths: Vec<PathBuf> = inherited
        .map(|v| std::env::split_paths(&v).collect())
        .unwrap_or_default();
    paths.push(extra.to_path_buf());
    std::env::join_paths(paths)
}

/// Command-line arguments for the export script.
pub fn export_args(checkpoint: &Path, settings: &ExportSettings, verbose: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--checkpoint".into(),
        checkpoint.as_os_str().to_owned(),
        "--imgsz".into(),
        settings.image_size.to_string().into(),
        "--batch".into(),
        settings.batch.to_string().into(),
        "--opset".into(),
        settings.opset.to_string().into(),
    ];

    let flags = [
        ("--simplify", settings.simplify),
        ("--dynamic", settings.dynamic),
        ("--optimize", settings.optimize),
        ("--half", settings.precision == Precision::Fp16),
        ("--int8", settings.precision == Precision::Int8),
        ("--verbose", verbose),
    ];
    args.extend(
        flags
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(flag, _)| OsString::from(flag)),
    );
    args
}

/// Map a finished script run to the error taxonomy.
fn check_run(run: &ScriptRun) -> Result<()> {
    if run.progress.is_dependency_error()
        || run.status.code() == Some(scripts::EXIT_MISSING_DEPENDENCY)
    {
        return Err(ExportError::DependencyUnavailable {
            message: run.failure_message(PROCESS_NAME),
        });
    }
    if !run.status.success() || run.progress.stage == ExportStage::Error {
        return Err(ExportError::ExportFailed {
            message: run.failure_message(PROCESS_NAME),
        });
    }
    Ok(())
}

#[async_trait]
impl ExportBackend for UltralyticsBackend {
    fn name(&self) -> &str {
        "ultralytics"
    }

    async fn probe(&self) -> Result<()> {
        let run = self.run_script(&[OsString::from("--check")]).await?;
        check_run(&run)?;

        match run.progress.message.as_deref() {
            Some(version) => info!("✓ {} imported successfully", version),
            None => info!("✓ Ultralytics imported successfully"),
        }
        Ok(())
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportedModel> {
        let args = export_args(&request.checkpoint, &request.settings, self.verbose);
        let run = self.run_script(&args).await?;
        check_run(&run)?;

        run.progress.exported.ok_or_else(|| ExportError::ExportFailed {
            message: "Export finished without reporting an output file".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportPreset;

    fn as_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_export_args_browser_preset() {
        let args = export_args(
            Path::new("/w/best.pt"),
            &ExportPreset::Browser.settings(),
            true,
        );
        assert_eq!(
            as_strings(&args),
            vec![
                "--checkpoint", "/w/best.pt", "--imgsz", "640", "--batch", "1", "--opset", "11",
                "--verbose",
            ]
        );
    }

    #[test]
    fn test_export_args_simplified_preset() {
        let args = as_strings(&export_args(
            Path::new("/w/best.pt"),
            &ExportPreset::Simplified.settings(),
            false,
        ));
        assert!(args.contains(&"--simplify".to_string()));
        assert!(args.contains(&"12".to_string()));
        assert!(!args.contains(&"--int8".to_string()));
        assert!(!args.contains(&"--half".to_string()));
        assert!(!args.contains(&"--dynamic".to_string()));
    }

    #[test]
    fn test_for_layout_prefers_override() {
        let temp = tempfile::TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path().join("web").join("site"));

        let backend = UltralyticsBackend::for_layout(&layout, Some(PathBuf::from("/opt/py")));
        assert_eq!(backend.python(), Path::new("/opt/py"));

        let backend = UltralyticsBackend::for_layout(&layout, None);
        assert_eq!(backend.python(), Path::new(DEFAULT_PYTHON));
        assert!(backend.python_path.is_none());
    }

    #[test]
    fn test_for_layout_uses_venv_and_training_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path().join("web").join("site"));
        let venv_python = layout.venv_python();
        std::fs::create_dir_all(venv_python.parent().unwrap()).unwrap();
        std::fs::write(&venv_python, "").unwrap();
        std::fs::create_dir_all(layout.training_project_dir()).unwrap();

        let backend = UltralyticsBackend::for_layout(&layout, None);
        assert_eq!(backend.python(), venv_python.as_path());
        assert_eq!(backend.python_path, Some(layout.training_project_dir()));
    }

    #[test]
    fn test_verbose_is_opt_in() {
        let layout = ProjectLayout::new("/work/web/site");
        assert!(!UltralyticsBackend::for_layout(&layout, None).verbose);
        assert!(
            UltralyticsBackend::for_layout(&layout, None)
                .with_verbose(true)
                .verbose
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_extended_python_path_keeps_inherited_entries() {
        let joined = extended_python_path(
            Some(OsString::from("/opt/site-packages:/home/me/lib")),
            Path::new("/work/yolo_v1"),
        )
        .unwrap();
        assert_eq!(
            joined,
            OsString::from("/opt/site-packages:/home/me/lib:/work/yolo_v1")
        );

        let joined = extended_python_path(None, Path::new("/work/yolo_v1")).unwrap();
        assert_eq!(joined, OsString::from("/work/yolo_v1"));
    }

    #[test]
    #[cfg(unix)]
    fn test_extended_python_path_rejects_separator_in_entry() {
        assert!(extended_python_path(None, Path::new("/work/a:b")).is_err());
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_dependency_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let backend = UltralyticsBackend::new(
            temp.path().join("no-such-python"),
            temp.path().join("scripts"),
        );
        let err = backend.probe().await.unwrap_err();
        assert!(matches!(err, ExportError::DependencyUnavailable { .. }));
    }
}
