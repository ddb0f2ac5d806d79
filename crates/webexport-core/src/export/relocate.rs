//! Moving the produced artifact to its fixed destination.
//!
//! The destination is replaced as a whole:
//! 1. Try a plain rename (same filesystem, atomic)
//! 2. Otherwise copy into a temp file next to the destination, fsync it,
//!    and rename that over the destination
//! 3. Remove the source
//!
//! A reader of the destination never observes a half-written artifact and a
//! shorter artifact never keeps stale trailing bytes of a longer one.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{ExportError, Result};

/// Move `src` to `dest`, overwriting any existing file at `dest`.
///
/// Returns the destination path. The destination's parent directory must
/// already exist.
pub fn move_artifact(src: &Path, dest: &Path) -> Result<PathBuf> {
    let relocation_failed = |source: io::Error| ExportError::RelocationFailed {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source,
    };

    if src == dest {
        return Ok(dest.to_path_buf());
    }
    if dest.is_dir() {
        return Err(relocation_failed(io::Error::other("destination is a directory")));
    }

    match fs::rename(src, dest) {
        Ok(()) => {
            debug!("Renamed {} to {}", src.display(), dest.display());
        }
        Err(rename_err) => {
            if !src.exists() {
                return Err(relocation_failed(rename_err));
            }
            // Typically EXDEV: the exporter wrote onto another filesystem.
            debug!(
                "Rename failed ({}), copying {} instead",
                rename_err,
                src.display()
            );
            copy_then_replace(src, dest).map_err(relocation_failed)?;
            if let Err(e) = fs::remove_file(src) {
                warn!("Failed to remove exported file {}: {}", src.display(), e);
            }
        }
    }

    Ok(dest.to_path_buf())
}

/// Copy `src` into a temp file in `dest`'s directory and persist it over `dest`.
fn copy_then_replace(src: &Path, dest: &Path) -> io::Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir)?;
    {
        let mut input = File::open(src)?;
        io::copy(&mut input, temp.as_file_mut())?;
    }
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
