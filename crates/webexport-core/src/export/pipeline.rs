//! Shared subprocess utilities for the export script.
//!
//! stdout carries JSON progress lines; stderr carries library logging and
//! tracebacks. Both pipes are drained concurrently so a chatty exporter can
//! never block on a full pipe.

use std::collections::VecDeque;
use std::process::ExitStatus;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tracing::{debug, warn};

use super::progress::ExportProgress;
use super::types::ScriptProgressLine;
use crate::{ExportError, Result};

/// Number of trailing stderr lines kept for diagnostics.
pub const STDERR_TAIL_LINES: usize = 20;

/// Outcome of a finished script process.
#[derive(Debug)]
pub struct ScriptRun {
    pub progress: ExportProgress,
    pub status: ExitStatus,
    pub stderr_tail: Vec<String>,
}

impl ScriptRun {
    /// Best available description of why the run failed.
    pub fn failure_message(&self, process_name: &str) -> String {
        if let Some(error) = &self.progress.error {
            return error.clone();
        }
        if let Some(last) = self.stderr_tail.iter().rev().find(|l| !l.trim().is_empty()) {
            return format!("{process_name} failed: {}", last.trim());
        }
        format!(
            "{process_name} exited with status: {}",
            self.status.code().unwrap_or(-1)
        )
    }
}

// ---------------------------------------------------------------------------
// Output streaming
// ---------------------------------------------------------------------------

/// Read one line, replacing invalid UTF-8 instead of failing on it.
///
/// Library logging in a non-UTF-8 locale must not end the stream early.
async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Stream JSON progress lines from a script's stdout into `progress`.
///
/// Non-JSON lines are logged at debug level.
pub async fn stream_json_progress<R>(stdout: R, progress: &mut ExportProgress)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        match next_line_lossy(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                if let Ok(script_progress) = serde_json::from_str::<ScriptProgressLine>(&line) {
                    progress.update_from_script(&script_progress);
                } else {
                    debug!("Non-JSON export output: {}", line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading export stdout: {}", e);
                break;
            }
        }
    }
}

/// Drain stderr, logging each line at debug level and keeping the last `keep`.
pub async fn collect_stderr_tail<R>(stderr: R, keep: usize) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut tail = VecDeque::with_capacity(keep);

    loop {
        match next_line_lossy(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                debug!("stderr: {}", line);
                if tail.len() == keep {
                    tail.pop_front();
                }
                if keep > 0 {
                    tail.push_back(line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading export stderr: {}", e);
                break;
            }
        }
    }
    tail.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Process exit handling
// ---------------------------------------------------------------------------

/// Drain both pipes of a spawned script, then wait for it to exit.
///
/// The child must have been spawned with piped stdout and stderr. A non-zero
/// exit is not an error here; callers interpret `ScriptRun::status`.
pub async fn run_to_completion(mut child: Child, process_name: &str) -> Result<ScriptRun> {
    let stdout = child.stdout.take().ok_or_else(|| ExportError::ExportFailed {
        message: format!("{process_name} stdout was not captured"),
    })?;
    let stderr = child.stderr.take().ok_or_else(|| ExportError::ExportFailed {
        message: format!("{process_name} stderr was not captured"),
    })?;

    let mut progress = ExportProgress::new();
    let ((), stderr_tail) = tokio::join!(
        stream_json_progress(stdout, &mut progress),
        collect_stderr_tail(stderr, STDERR_TAIL_LINES),
    );

    let status = child.wait().await.map_err(|e| ExportError::ExportFailed {
        message: format!("{process_name} process error: {e}"),
    })?;
    debug!("{} exited with {}", process_name, status);

    Ok(ScriptRun {
        progress,
        status,
        stderr_tail,
    })
}
