//! Quantization and grouping.
//!
//! Groups are a derived snapshot of an [`EntryTable`]. They are computed
//! explicitly and stamped with the session generation they were computed
//! for; nothing keeps them in sync with later edits.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::color::ColorKey;
use crate::color::ColorVector;
use crate::color::DEFAULT_KEY_DECIMALS;
use crate::entry::EntryId;
use crate::entry::EntryTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingOptions {
    /// Decimal digits kept per channel when building the key.
    pub decimals: u32,
}

impl Default for GroupingOptions {
    fn default() -> Self {
        Self {
            decimals: DEFAULT_KEY_DECIMALS,
        }
    }
}

/// Entries sharing one quantized key.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGroup {
    pub(crate) key: ColorKey,
    pub(crate) color: ColorVector,
    pub(crate) assets: BTreeSet<PathBuf>,
    pub(crate) members: Vec<EntryId>,
    pub(crate) affects_min: bool,
    pub(crate) affects_max: bool,
    pub(crate) generation: u64,
}

impl ColorGroup {
    pub fn key(&self) -> ColorKey {
        self.key
    }

    /// Representative color: the first member's color at grouping time, or
    /// the last color applied to the whole group.
    pub fn color(&self) -> ColorVector {
        self.color
    }

    pub fn assets(&self) -> &BTreeSet<PathBuf> {
        &self.assets
    }

    pub fn members(&self) -> &[EntryId] {
        &self.members
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }

    pub fn affects_min(&self) -> bool {
        self.affects_min
    }

    pub fn affects_max(&self) -> bool {
        self.affects_max
    }

    /// Session generation the group was computed for.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Group every entry of `entries` by quantized color.
///
/// Output is ordered by descending member count. Ties keep the order in
/// which their keys were first observed.
pub fn group_entries(entries: &EntryTable, options: GroupingOptions, generation: u64) -> Vec<ColorGroup> {
    let mut index: HashMap<ColorKey, usize> = HashMap::new();
    let mut groups: Vec<ColorGroup> = Vec::new();

    for (id, entry) in entries.iter() {
        let color = entry.color();
        let key = color.quantize(options.decimals);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(ColorGroup {
                key,
                color,
                assets: BTreeSet::new(),
                members: Vec::new(),
                affects_min: false,
                affects_max: false,
                generation,
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        group.members.push(id);
        group.assets.insert(entry.asset.clone());
        group.affects_min |= entry.mode.is_min_side();
        group.affects_max |= entry.mode.is_max_side();
    }

    // Stable: equal counts stay in first-observed order.
    groups.sort_by(|a, b| b.count().cmp(&a.count()));
    groups
}
