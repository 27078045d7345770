//! Byte-level asset backups.
//!
//! A backup is a verbatim copy of the binary asset with no header. Restoring
//! never looks at JSON or session state.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;

use crate::error::ChromaError;
use crate::error::Result;
use crate::fs_util::write_atomic;

/// Snapshot of one binary asset.
#[derive(Clone, PartialEq, Eq)]
pub struct AssetBackup {
    asset_path: PathBuf,
    bytes: Vec<u8>,
}

impl fmt::Debug for AssetBackup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetBackup")
            .field("asset_path", &self.asset_path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AssetBackup {
    /// Asset the snapshot was taken from.
    pub fn asset_path(&self) -> &Path {
        &self.asset_path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the raw snapshot to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.bytes)
    }

    /// Read a snapshot previously written by [`AssetBackup::save_to`].
    pub fn load_from(asset_path: impl Into<PathBuf>, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| ChromaError::io(path, e))?;
        Ok(Self {
            asset_path: asset_path.into(),
            bytes,
        })
    }
}

/// Snapshot `asset_path`.
pub fn backup(asset_path: &Path) -> Result<AssetBackup> {
    let bytes = std::fs::read(asset_path).map_err(|e| ChromaError::io(asset_path, e))?;
    Ok(AssetBackup {
        asset_path: asset_path.to_path_buf(),
        bytes,
    })
}

/// Overwrite `asset_path` with the snapshot, byte for byte.
pub fn restore(asset_path: &Path, snapshot: &AssetBackup) -> Result<()> {
    write_atomic(asset_path, &snapshot.bytes)?;
    info!(asset = %asset_path.display(), bytes = snapshot.len(), "asset restored");
    Ok(())
}
