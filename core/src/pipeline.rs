//! Asset discovery, exclusion and bulk export.

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use walkdir::WalkDir;

use crate::converter::Converter;
use crate::converter::exported_json_path;
use crate::document::JsonDocument;
use crate::error::ChromaError;
use crate::error::Result;
use crate::fs_util::remove_if_exists;

const ASSET_EXTENSION: &str = "uasset";

/// Case-insensitive file-name substring denylist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionFilter {
    needles: Vec<String>,
}

impl ExclusionFilter {
    pub fn new(substrings: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            needles: substrings
                .into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Whether the file name of `asset` contains any denied substring.
    pub fn is_excluded(&self, asset: &Path) -> bool {
        let Some(name) = asset.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.needles.iter().any(|needle| name.contains(needle.as_str()))
    }

    /// Split `assets` into `(included, excluded)`, keeping input order.
    pub fn partition(&self, assets: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
        assets.into_iter().partition(|asset| !self.is_excluded(asset))
    }
}

/// Expand directories to the `.uasset` files below them, sorted by path.
/// Plain file inputs are kept as given, in input order. An asset reached
/// more than once (the same file twice, or a file inside a listed
/// directory) is kept at its first occurrence only.
///
/// The extension must be exactly `uasset`: the converter rebuilds
/// `<stem>.uasset`, so any other spelling would be written to a different
/// file than the one loaded.
pub fn discover_assets(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut assets = Vec::new();
    let mut seen = HashSet::new();
    for input in inputs {
        let found = if input.is_dir() {
            walk_assets(input)?
        } else if input.is_file() {
            if !has_asset_extension(input) {
                return Err(ChromaError::UnsupportedAsset {
                    path: input.clone(),
                });
            }
            vec![input.clone()]
        } else {
            return Err(ChromaError::NotFound {
                path: input.clone(),
            });
        };

        for asset in found {
            let canonical = asset
                .canonicalize()
                .map_err(|e| ChromaError::io(&asset, e))?;
            if seen.insert(canonical) {
                assets.push(asset);
            } else {
                debug!(asset = %asset.display(), "duplicate input skipped");
            }
        }
    }
    Ok(assets)
}

fn walk_assets(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(io) => ChromaError::io(path, io),
                None => ChromaError::NotFound { path },
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if has_asset_extension(entry.path()) {
            found.push(entry.into_path());
        } else if entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ASSET_EXTENSION))
        {
            warn!(asset = %entry.path().display(), "skipping asset with a non-lowercase extension");
        }
    }
    found.sort();
    Ok(found)
}

fn has_asset_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ASSET_EXTENSION)
}

/// Fail with [`ChromaError::LeftoverJson`] when any asset already has
/// intermediate JSON next to it. Exporting would overwrite it, and it may be
/// the only copy of an edit whose commit failed.
pub fn ensure_no_leftover_json(assets: &[PathBuf]) -> Result<()> {
    for asset in assets {
        let json = exported_json_path(asset);
        if json.try_exists().map_err(|e| ChromaError::io(&json, e))? {
            return Err(ChromaError::LeftoverJson { path: json });
        }
    }
    Ok(())
}

/// Load progress, reported once per asset in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// 1-based position of the asset that just finished.
    pub index: usize,
    pub total: usize,
    pub asset: PathBuf,
}

/// Export every asset and parse the resulting JSON.
///
/// Up to `concurrency` converter calls run at once; results and progress
/// come back in input order. The first failure cancels the calls still in
/// flight, removes every JSON file this call produced and is returned.
/// Nothing is exported when any asset already has intermediate JSON.
pub async fn export_all<F>(
    converter: &dyn Converter,
    assets: &[PathBuf],
    concurrency: usize,
    cancel: &CancellationToken,
    mut progress: F,
) -> Result<Vec<JsonDocument>>
where
    F: FnMut(Progress),
{
    ensure_no_leftover_json(assets)?;
    let total = assets.len();
    let start = Instant::now();
    let batch = cancel.child_token();

    let task_token = batch.clone();
    let mut results = stream::iter(assets.iter().cloned())
        .map(move |asset| {
            let cancel = task_token.clone();
            async move {
                let json = match converter.export_json(&asset, &cancel).await {
                    Ok(json) => json,
                    Err(err) => return Err((None, err)),
                };
                let parsed = match tokio::fs::read(&json).await {
                    Ok(bytes) => JsonDocument::from_slice(&json, &asset, &bytes),
                    Err(e) => Err(ChromaError::io(&json, e)),
                };
                parsed.map_err(|err| (Some(json), err))
            }
        })
        .buffered(concurrency.max(1));

    let mut documents = Vec::with_capacity(total);
    while let Some(result) = results.next().await {
        match result {
            Ok(document) => {
                debug!(asset = %document.asset_path().display(), "asset exported");
                progress(Progress {
                    index: documents.len() + 1,
                    total,
                    asset: document.asset_path().to_path_buf(),
                });
                documents.push(document);
            }
            Err((json, err)) => {
                batch.cancel();
                let mut produced: Vec<PathBuf> =
                    documents.iter().map(|d| d.json_path().to_path_buf()).collect();
                produced.extend(json);
                while let Some(rest) = results.next().await {
                    match rest {
                        Ok(document) => produced.push(document.json_path().to_path_buf()),
                        Err((json, _)) => produced.extend(json),
                    }
                }
                for path in &produced {
                    if let Err(e) = remove_if_exists(path) {
                        warn!(json = %path.display(), error = %e, "could not remove intermediate JSON");
                    }
                }
                warn!(error = %err, kind = err.kind().as_str(), "load aborted");
                return Err(err);
            }
        }
    }

    info!(
        count = documents.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "assets exported"
    );
    Ok(documents)
}
