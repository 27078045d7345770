//! Crash-safe file helpers.
//!
//! Every file the core writes goes through [`write_atomic`]: a temp file in
//! the destination directory, fsync, then rename over the target.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::ChromaError;
use crate::error::Result;

/// Atomically replace `path` with `data`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ChromaError::io(dir, e))?;
    tmp.write_all(data)
        .map_err(|e| ChromaError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ChromaError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| ChromaError::io(path, e.error))?;
    Ok(())
}

/// Remove `path`, treating an already-missing file as success.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ChromaError::io(path, e)),
    }
}
