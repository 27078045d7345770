//! Color entries: one color-bearing occurrence inside one document.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::color::ColorVector;
use crate::document::DocumentId;
use crate::document::NodeRef;

/// Which vector of a module an entry was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorMode {
    Min,
    Max,
    /// Initial color of a start-color module. Counts as the minimum side.
    Start,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Start => "START",
        }
    }

    pub fn is_min_side(&self) -> bool {
        matches!(self, Self::Min | Self::Start)
    }

    pub fn is_max_side(&self) -> bool {
        matches!(self, Self::Max)
    }

    /// Whether `other` is the opposite half of a MIN/MAX pair.
    pub fn pairs_with(&self, other: ColorMode) -> bool {
        self.is_min_side() != other.is_min_side()
    }
}

/// Which side of the MIN/MAX split an edit reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeSelection {
    #[default]
    All,
    /// `MIN` and `START` entries.
    Min,
    Max,
}

impl ModeSelection {
    pub fn matches(&self, mode: ColorMode) -> bool {
        match self {
            Self::All => true,
            Self::Min => mode.is_min_side(),
            Self::Max => mode.is_max_side(),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of an entry inside its session's [`EntryTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntryId(pub(crate) usize);

impl EntryId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One color occurrence. The cached color always equals the node it
/// points at; only the mutation engine changes either.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorEntry {
    /// Owning document's JSON path.
    pub asset: PathBuf,
    /// `ObjectName` of the owning export.
    pub module: String,
    pub mode: ColorMode,
    pub node: NodeRef,
    color: ColorVector,
    persisted: ColorVector,
}

impl ColorEntry {
    pub fn new(
        asset: impl Into<PathBuf>,
        module: impl Into<String>,
        mode: ColorMode,
        color: ColorVector,
        node: NodeRef,
    ) -> Self {
        Self {
            asset: asset.into(),
            module: module.into(),
            mode,
            node,
            color,
            persisted: color,
        }
    }

    pub fn color(&self) -> ColorVector {
        self.color
    }

    pub fn document(&self) -> DocumentId {
        self.node.document
    }

    /// Color last written to disk (or read at load time).
    pub fn persisted_color(&self) -> ColorVector {
        self.persisted
    }

    /// Whether the cached color differs from what was last persisted.
    pub fn is_dirty(&self) -> bool {
        self.color != self.persisted
    }

    /// Same asset and module, opposite side of the MIN/MAX pair.
    pub fn is_sibling_of(&self, other: &ColorEntry) -> bool {
        self.asset == other.asset && self.module == other.module && self.mode.pairs_with(other.mode)
    }

    pub(crate) fn set_cached_color(&mut self, color: ColorVector) {
        self.color = color;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = self.color;
    }
}

/// Every entry of a session, addressed by [`EntryId`].
#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    entries: Vec<ColorEntry>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ColorEntry) -> EntryId {
        self.entries.push(entry);
        EntryId(self.entries.len() - 1)
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = ColorEntry>) {
        self.entries.extend(entries);
    }

    pub fn get(&self, id: EntryId) -> Option<&ColorEntry> {
        self.entries.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> Option<&mut ColorEntry> {
        self.entries.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &ColorEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (EntryId(idx), entry))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (EntryId, &mut ColorEntry)> {
        self.entries
            .iter_mut()
            .enumerate()
            .map(|(idx, entry)| (EntryId(idx), entry))
    }

    /// Entries on the minimum side (`MIN` and `START`), in load order.
    pub fn min_entries(&self) -> impl Iterator<Item = (EntryId, &ColorEntry)> {
        self.iter().filter(|(_, e)| e.mode.is_min_side())
    }

    /// Entries on the maximum side, in load order.
    pub fn max_entries(&self) -> impl Iterator<Item = (EntryId, &ColorEntry)> {
        self.iter().filter(|(_, e)| e.mode.is_max_side())
    }

    /// Opposite-side entries of the same asset and module.
    pub fn siblings_of(&self, id: EntryId) -> Vec<EntryId> {
        let Some(target) = self.get(id) else {
            return Vec::new();
        };
        self.iter()
            .filter(|(other_id, other)| *other_id != id && other.is_sibling_of(target))
            .map(|(other_id, _)| other_id)
            .collect()
    }
}
