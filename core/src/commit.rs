//! Writing edited documents back and rebuilding their assets.
//!
//! Each document is its own failure domain. For one document the steps are:
//! write the JSON atomically, snapshot the binary and move it aside, run the
//! converter import, check that it rebuilt the asset in place, then drop the
//! JSON. A failed import puts the original back and leaves the JSON on disk
//! so the commit can be retried.

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use futures::StreamExt;
use futures::stream;
use serde::Deserialize;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::backup;
use crate::backup::AssetBackup;
use crate::converter::Converter;
use crate::document::DocumentId;
use crate::document::DocumentStore;
use crate::entry::EntryTable;
use crate::error::ChromaError;
use crate::error::FailedDocument;
use crate::error::Result;
use crate::fs_util::remove_if_exists;
use crate::fs_util::write_atomic;

/// Which documents a commit rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitScope {
    /// Documents with at least one entry whose color changed since it was
    /// last persisted.
    #[default]
    Touched,
    /// Every loaded document that has entries, edited or not.
    AllLoaded,
}

/// Documents a commit under `scope` would rewrite.
pub fn touched_documents(entries: &EntryTable, scope: CommitScope) -> BTreeSet<DocumentId> {
    entries
        .iter()
        .filter(|(_, entry)| match scope {
            CommitScope::Touched => entry.is_dirty(),
            CommitScope::AllLoaded => true,
        })
        .map(|(_, entry)| entry.document())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOptions {
    pub json_indent: usize,
    pub keep_json: bool,
    pub concurrency: usize,
}

/// Outcome for one document.
#[derive(Debug)]
pub struct DocumentReport {
    pub document: DocumentId,
    pub json_path: PathBuf,
    pub asset_path: PathBuf,
    pub result: Result<()>,
}

impl DocumentReport {
    pub fn is_committed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-document outcomes, in document order.
#[derive(Debug, Default)]
pub struct CommitReport {
    pub documents: Vec<DocumentReport>,
}

impl CommitReport {
    pub fn committed(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(|d| d.is_committed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(|d| !d.is_committed())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    /// JSON paths of committed documents, or [`ChromaError::PartialCommitFailure`]
    /// when any document failed.
    pub fn into_result(self) -> Result<Vec<PathBuf>> {
        let mut committed = Vec::new();
        let mut failed = Vec::new();
        for doc in self.documents {
            match doc.result {
                Ok(()) => committed.push(doc.json_path),
                Err(err) => failed.push(FailedDocument {
                    json_path: doc.json_path,
                    reason: err.to_string(),
                }),
            }
        }
        if failed.is_empty() {
            Ok(committed)
        } else {
            Err(ChromaError::PartialCommitFailure { committed, failed })
        }
    }
}

struct CommitJob {
    document: DocumentId,
    json_path: PathBuf,
    asset_path: PathBuf,
    bytes: Vec<u8>,
}

/// Commit `documents` from `store`.
///
/// Documents are serialized up front, so the parallel section never touches
/// the store.
pub async fn run_commit(
    store: &DocumentStore,
    documents: &BTreeSet<DocumentId>,
    converter: &dyn Converter,
    options: CommitOptions,
    cancel: &CancellationToken,
) -> CommitReport {
    let start = Instant::now();
    let mut prepared = Vec::with_capacity(documents.len());
    for &id in documents {
        let Some(doc) = store.get(id) else {
            continue;
        };
        let json_path = doc.json_path().to_path_buf();
        let asset_path = doc.asset_path().to_path_buf();
        prepared.push(match doc.to_json_bytes(options.json_indent) {
            Ok(bytes) => Ok(CommitJob {
                document: id,
                json_path,
                asset_path,
                bytes,
            }),
            Err(err) => Err(DocumentReport {
                document: id,
                json_path,
                asset_path,
                result: Err(err),
            }),
        });
    }

    let keep_json = options.keep_json;
    let documents: Vec<DocumentReport> = stream::iter(prepared)
        .map(move |job| async move {
            match job {
                Ok(job) => {
                    let result = commit_one(&job, converter, keep_json, cancel).await;
                    if let Err(err) = &result {
                        warn!(
                            json = %job.json_path.display(),
                            kind = err.kind().as_str(),
                            error = %err,
                            "document commit failed"
                        );
                    }
                    DocumentReport {
                        document: job.document,
                        json_path: job.json_path,
                        asset_path: job.asset_path,
                        result,
                    }
                }
                Err(report) => report,
            }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await;

    let report = CommitReport { documents };
    info!(
        committed = report.committed().count(),
        failed = report.failed().count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "commit finished"
    );
    report
}

async fn commit_one(
    job: &CommitJob,
    converter: &dyn Converter,
    keep_json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    write_atomic(&job.json_path, &job.bytes)?;
    let snapshot = backup::backup(&job.asset_path)?;

    // The import must produce the asset afresh, so a converter that exits
    // zero without writing it is caught by the presence check.
    let parked = parked_asset_path(&job.asset_path);
    std::fs::rename(&job.asset_path, &parked).map_err(|e| ChromaError::io(&job.asset_path, e))?;

    let imported = match converter.import_json(&job.json_path, cancel).await {
        Ok(rebuilt) if rebuilt != job.asset_path => Err(ChromaError::conversion_failed(
            &job.json_path,
            format!(
                "converter rebuilt {} instead of {}",
                rebuilt.display(),
                job.asset_path.display()
            ),
        )),
        Ok(_) if !job.asset_path.exists() => Err(ChromaError::conversion_failed(
            &job.json_path,
            format!("converter did not rebuild {}", job.asset_path.display()),
        )),
        other => other.map(|_| ()),
    };

    if let Err(err) = imported {
        put_back(&job.asset_path, &parked, &snapshot);
        return Err(err);
    }

    if let Err(err) = remove_if_exists(&parked) {
        warn!(asset = %parked.display(), error = %err, "could not remove parked asset");
    }
    if !keep_json {
        remove_if_exists(&job.json_path)?;
    }
    Ok(())
}

/// Where the original asset waits while the converter rebuilds it.
fn parked_asset_path(asset: &Path) -> PathBuf {
    let mut name = asset.as_os_str().to_owned();
    name.push(".orig");
    PathBuf::from(name)
}

/// Bring the original asset back after a failed import, over whatever the
/// converter left behind.
fn put_back(asset: &Path, parked: &Path, snapshot: &AssetBackup) {
    if std::fs::rename(parked, asset).is_ok() {
        return;
    }
    match backup::restore(asset, snapshot) {
        Ok(()) => {
            if let Err(err) = remove_if_exists(parked) {
                warn!(asset = %parked.display(), error = %err, "could not remove parked asset");
            }
        }
        Err(err) => {
            warn!(
                asset = %asset.display(),
                parked = %parked.display(),
                error = %err,
                "could not restore asset after failed import"
            );
        }
    }
}
