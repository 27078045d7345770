#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Shared fixtures for chromaflux-core integration tests.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chromaflux_core::ChromaError;
use chromaflux_core::Converter;
use chromaflux_core::Result;
use chromaflux_core::converter::exported_json_path;
use chromaflux_core::converter::imported_asset_path;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Bytes the fake import writes over an asset before failing, so tests can
/// see whether the original was restored.
pub const CORRUPTED_ASSET: &[u8] = b"half-written asset";

/// In-process converter driven by fixtures.
///
/// Export writes the fixture registered for the asset (or an empty export
/// list) next to it. Import copies the JSON text into the `.uasset`, which
/// lets tests read back exactly what was committed.
#[derive(Default)]
pub struct FakeConverter {
    fixtures: Mutex<HashMap<PathBuf, Value>>,
    failing_exports: Mutex<HashSet<PathBuf>>,
    failing_imports: Mutex<HashSet<PathBuf>>,
    silent_imports: Mutex<HashSet<PathBuf>>,
    export_delay: Mutex<HashMap<PathBuf, Duration>>,
    exports: AtomicUsize,
    imports: AtomicUsize,
}

impl FakeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fixture(self, asset: &Path, root: Value) -> Self {
        self.fixtures.lock().unwrap().insert(asset.to_path_buf(), root);
        self
    }

    pub fn fail_export(self, asset: &Path) -> Self {
        self.failing_exports
            .lock()
            .unwrap()
            .insert(asset.to_path_buf());
        self
    }

    /// Fail the import of the JSON exported for `asset`.
    pub fn fail_import(&self, asset: &Path) {
        self.failing_imports
            .lock()
            .unwrap()
            .insert(exported_json_path(asset));
    }

    /// Report success for the import of `asset`'s JSON without writing the
    /// asset.
    pub fn silent_import(&self, asset: &Path) {
        self.silent_imports
            .lock()
            .unwrap()
            .insert(exported_json_path(asset));
    }

    pub fn clear_failures(&self) {
        self.failing_imports.lock().unwrap().clear();
        self.failing_exports.lock().unwrap().clear();
        self.silent_imports.lock().unwrap().clear();
    }

    pub fn delay_export(self, asset: &Path, delay: Duration) -> Self {
        self.export_delay
            .lock()
            .unwrap()
            .insert(asset.to_path_buf(), delay);
        self
    }

    pub fn export_calls(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    pub fn import_calls(&self) -> usize {
        self.imports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Converter for FakeConverter {
    async fn export_json(&self, asset: &Path, cancel: &CancellationToken) -> Result<PathBuf> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        if !asset.exists() {
            return Err(ChromaError::NotFound {
                path: asset.to_path_buf(),
            });
        }

        let delay = self.export_delay.lock().unwrap().get(asset).copied();
        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(ChromaError::conversion_failed(asset, "cancelled"));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if self.failing_exports.lock().unwrap().contains(asset) {
            return Err(ChromaError::conversion_failed(asset, "converter exited with exit status: 1"));
        }

        let root = self
            .fixtures
            .lock()
            .unwrap()
            .get(asset)
            .cloned()
            .unwrap_or_else(|| json!({ "Exports": [] }));
        let json_path = exported_json_path(asset);
        let text = serde_json::to_vec_pretty(&root).expect("fixture serializes");
        std::fs::write(&json_path, text).map_err(|e| ChromaError::io(&json_path, e))?;
        Ok(json_path)
    }

    async fn import_json(&self, json: &Path, _cancel: &CancellationToken) -> Result<PathBuf> {
        self.imports.fetch_add(1, Ordering::SeqCst);
        let asset = imported_asset_path(json);
        if self.failing_imports.lock().unwrap().contains(json) {
            std::fs::write(&asset, CORRUPTED_ASSET).map_err(|e| ChromaError::io(&asset, e))?;
            return Err(ChromaError::conversion_failed(json, "converter exited with exit status: 2"));
        }
        if self.silent_imports.lock().unwrap().contains(json) {
            return Ok(asset);
        }
        let bytes = std::fs::read(json).map_err(|e| ChromaError::io(json, e))?;
        std::fs::write(&asset, bytes).map_err(|e| ChromaError::io(&asset, e))?;
        Ok(asset)
    }
}

/// UAssetAPI-style struct property holding one vector.
pub fn vector_prop(field: &str, [x, y, z]: [f64; 3]) -> Value {
    json!({
        "$type": "UAssetAPI.PropertyTypes.Structs.StructPropertyData, UAssetAPI",
        "StructType": "Vector",
        "Name": field,
        "Value": [{
            "$type": "UAssetAPI.PropertyTypes.Structs.VectorPropertyData, UAssetAPI",
            "Name": field,
            "Value": { "$type": "UAssetAPI.UnrealTypes.FVector, UAssetAPI", "X": x, "Y": y, "Z": z }
        }]
    })
}

/// Export of a color-over-life module with both vectors.
pub fn color_over_life(object_name: &str, min: [f64; 3], max: [f64; 3]) -> Value {
    module(object_name, "ColorOverLife", vec![vector_prop("MinValueVec", min), vector_prop("MaxValueVec", max)])
}

/// Export of a start-color module with only the minimum vector.
pub fn start_color(object_name: &str, min: [f64; 3]) -> Value {
    module(object_name, "StartColor", vec![vector_prop("MinValueVec", min)])
}

fn module(object_name: &str, property: &str, vectors: Vec<Value>) -> Value {
    json!({
        "$type": "UAssetAPI.ExportTypes.NormalExport, UAssetAPI",
        "ObjectName": object_name,
        "Data": [
            { "Name": "bEnabled", "Value": true },
            { "Name": property, "Value": vectors }
        ],
        "SerialOffset": 1024
    })
}

/// Full document around `exports`, with unrelated top-level content.
pub fn asset_document(exports: Vec<Value>) -> Value {
    json!({
        "Info": "Serialized with UAssetAPI",
        "NameMap": ["/Script/Engine", "ParticleModuleColorOverLife"],
        "Exports": exports,
        "PackageGuid": "{00000000-0000-0000-0000-000000000000}"
    })
}

/// Temporary directory with fake binary assets in it.
pub struct AssetDir {
    pub dir: TempDir,
}

impl AssetDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create `name` with some recognizable binary content.
    pub fn asset(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, original_bytes(name)).expect("write asset");
        path
    }
}

impl Default for AssetDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Content written by [`AssetDir::asset`].
pub fn original_bytes(name: &str) -> Vec<u8> {
    let mut bytes = vec![0xC1, 0x83, 0x2A, 0x9E];
    bytes.extend_from_slice(name.as_bytes());
    bytes
}
