//! Parsed export documents and the store that owns them.
//!
//! Color entries never hold references into a document. They hold a
//! [`NodeRef`]: a document id plus a JSON Pointer, resolved through the
//! [`DocumentStore`] on every read and write. Mutable resolution needs
//! `&mut DocumentStore`, so writes to one session's documents are
//! single-writer by construction.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::error::ChromaError;
use crate::error::Result;

/// Default indentation for re-serialized documents.
pub const DEFAULT_JSON_INDENT: usize = 4;

/// Index of a document inside its [`DocumentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DocumentId(usize);

impl DocumentId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Address of one node inside one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeRef {
    pub document: DocumentId,
    /// RFC 6901 JSON Pointer from the document root.
    pub pointer: String,
}

/// One parsed export tree.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    json_path: PathBuf,
    asset_path: PathBuf,
    root: Value,
}

impl JsonDocument {
    pub fn new(json_path: impl Into<PathBuf>, asset_path: impl Into<PathBuf>, root: Value) -> Self {
        Self {
            json_path: json_path.into(),
            asset_path: asset_path.into(),
            root,
        }
    }

    /// Read and parse the JSON file the converter produced for `asset_path`.
    pub fn load(json_path: &Path, asset_path: &Path) -> Result<Self> {
        let bytes = std::fs::read(json_path).map_err(|e| ChromaError::io(json_path, e))?;
        Self::from_slice(json_path, asset_path, &bytes)
    }

    pub fn from_slice(json_path: &Path, asset_path: &Path, bytes: &[u8]) -> Result<Self> {
        let root = serde_json::from_slice(bytes).map_err(|source| ChromaError::Json {
            path: json_path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(json_path, asset_path, root))
    }

    /// Path of the intermediate JSON file; also the document's identity.
    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    /// Binary asset the document was exported from.
    pub fn asset_path(&self) -> &Path {
        &self.asset_path
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Serialize with `indent` spaces per level. Key order and unknown
    /// content are preserved.
    pub fn to_json_bytes(&self, indent: usize) -> Result<Vec<u8>> {
        let indent = vec![b' '; indent];
        let mut out = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
        self.root
            .serialize(&mut ser)
            .map_err(|source| ChromaError::Json {
                path: self.json_path.clone(),
                source,
            })?;
        Ok(out)
    }
}

/// Owns every document loaded by a session.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<JsonDocument>,
    by_path: HashMap<PathBuf, DocumentId>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. A document already stored under the same JSON path
    /// is replaced and keeps its id.
    pub fn insert(&mut self, document: JsonDocument) -> DocumentId {
        if let Some(&id) = self.by_path.get(document.json_path()) {
            self.documents[id.0] = document;
            return id;
        }
        let id = DocumentId(self.documents.len());
        self.by_path.insert(document.json_path().to_path_buf(), id);
        self.documents.push(document);
        id
    }

    pub fn get(&self, id: DocumentId) -> Option<&JsonDocument> {
        self.documents.get(id.0)
    }

    pub fn id_for_path(&self, json_path: &Path) -> Option<DocumentId> {
        self.by_path.get(json_path).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocumentId, &JsonDocument)> {
        self.documents
            .iter()
            .enumerate()
            .map(|(idx, doc)| (DocumentId(idx), doc))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
        self.by_path.clear();
    }

    pub fn resolve(&self, node: &NodeRef) -> Option<&Value> {
        self.documents.get(node.document.0)?.root.pointer(&node.pointer)
    }

    pub fn resolve_mut(&mut self, node: &NodeRef) -> Option<&mut Value> {
        self.documents
            .get_mut(node.document.0)?
            .root
            .pointer_mut(&node.pointer)
    }

    /// JSON path of the document a node lives in, for error reporting.
    pub fn json_path_of(&self, node: &NodeRef) -> PathBuf {
        self.get(node.document)
            .map(|doc| doc.json_path.clone())
            .unwrap_or_else(|| PathBuf::from(node.document.to_string()))
    }
}

/// Append one reference token to a JSON Pointer, escaping `~` and `/`.
pub fn pointer_push(base: &str, token: &str) -> String {
    let escaped = token.replace('~', "~0").replace('/', "~1");
    format!("{base}/{escaped}")
}
