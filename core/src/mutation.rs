//! In-place recoloring.
//!
//! A recolor writes the referenced `{X, Y, Z}` node first and only then
//! updates the entry's cached color. Every target of one call (the entry
//! and, under [`SyncPolicy::Enabled`], its MIN/MAX siblings) is resolved
//! before anything is written, so a call either changes all of them or
//! none.

use std::collections::BTreeSet;

use tracing::debug;

use crate::color::ColorVector;
use crate::document::DocumentStore;
use crate::entry::ColorEntry;
use crate::entry::EntryId;
use crate::entry::EntryTable;
use crate::entry::ModeSelection;
use crate::error::ChromaError;
use crate::error::Result;
use crate::grouping::ColorGroup;

/// Whether a recolor propagates to the opposite MIN/MAX entry of the same
/// asset and module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    #[default]
    Disabled,
    Enabled,
}

impl SyncPolicy {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl From<bool> for SyncPolicy {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }
}

/// Recolor one entry. Returns every entry that now carries `color`, the
/// target first.
pub fn recolor_entry(
    store: &mut DocumentStore,
    entries: &mut EntryTable,
    id: EntryId,
    color: ColorVector,
    sync: SyncPolicy,
) -> Result<Vec<EntryId>> {
    if entries.get(id).is_none() {
        return Err(ChromaError::UnknownEntry(id.index()));
    }

    let mut targets = vec![id];
    if sync.is_enabled() {
        targets.extend(entries.siblings_of(id));
    }

    for target in &targets {
        let entry = entries
            .get(*target)
            .ok_or(ChromaError::UnknownEntry(target.index()))?;
        match store.resolve(&entry.node) {
            Some(node) if node.is_object() => {}
            Some(_) => {
                return Err(ChromaError::malformed(
                    store.json_path_of(&entry.node),
                    entry.node.pointer.clone(),
                    "vector node is not an object",
                ));
            }
            None => {
                return Err(ChromaError::malformed(
                    store.json_path_of(&entry.node),
                    entry.node.pointer.clone(),
                    "back-reference no longer resolves",
                ));
            }
        }
    }

    for target in &targets {
        let Some(entry) = entries.get_mut(*target) else {
            continue;
        };
        if let Some(node) = store.resolve_mut(&entry.node) {
            color
                .write_json(node)
                .map_err(|reason| ChromaError::malformed(entry.asset.clone(), entry.node.pointer.clone(), reason))?;
        }
        entry.set_cached_color(color);
    }

    debug!(entry = %id, touched = targets.len(), color = %color.to_hex(), "recolored entry");
    Ok(targets)
}

/// Result of recoloring one group member.
#[derive(Debug)]
pub struct MemberOutcome {
    pub entry: EntryId,
    /// Entries changed on behalf of this member, or why it was skipped.
    pub result: Result<Vec<EntryId>>,
}

/// Per-member report of a group recolor, in member order.
#[derive(Debug, Default)]
pub struct GroupRecolor {
    pub outcomes: Vec<MemberOutcome>,
}

impl GroupRecolor {
    pub fn failures(&self) -> impl Iterator<Item = &MemberOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Distinct entries that now carry the new color, ascending.
    pub fn touched(&self) -> BTreeSet<EntryId> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flatten()
            .copied()
            .collect()
    }
}

/// Recolor every member of `group` in member order. A failing member is
/// recorded and the rest still run.
///
/// Afterwards the group's representative color and key are `color`, and
/// its asset set holds the assets of members that now carry it. Members are
/// never moved to other groups; regroup to get a fresh view.
pub fn recolor_group(
    store: &mut DocumentStore,
    entries: &mut EntryTable,
    group: &mut ColorGroup,
    color: ColorVector,
    sync: SyncPolicy,
) -> GroupRecolor {
    recolor_group_side(store, entries, group, ModeSelection::All, color, sync)
}

/// Recolor the members of `group` on the `selection` side only.
///
/// When the selection covers every member this is [`recolor_group`].
/// Otherwise the group keeps its key and representative color, and its
/// asset set and MIN/MAX flags shrink to the members still carrying that
/// color.
pub fn recolor_group_side(
    store: &mut DocumentStore,
    entries: &mut EntryTable,
    group: &mut ColorGroup,
    selection: ModeSelection,
    color: ColorVector,
    sync: SyncPolicy,
) -> GroupRecolor {
    let selected: Vec<EntryId> = group
        .members
        .iter()
        .copied()
        .filter(|&member| entries.get(member).is_some_and(|e| selection.matches(e.mode)))
        .collect();
    let outcomes: Vec<MemberOutcome> = selected
        .iter()
        .map(|&member| MemberOutcome {
            entry: member,
            result: recolor_entry(store, entries, member, color, sync),
        })
        .collect();

    if selected.len() == group.members.len() {
        group.key = color.quantize(group.key.decimals());
        group.color = color;
    }
    let carriers: Vec<&ColorEntry> = group
        .members
        .iter()
        .filter_map(|&member| entries.get(member))
        .filter(|entry| entry.color() == group.color)
        .collect();
    group.affects_min = carriers.iter().any(|e| e.mode.is_min_side());
    group.affects_max = carriers.iter().any(|e| e.mode.is_max_side());
    group.assets = carriers.iter().map(|e| e.asset.clone()).collect();

    let report = GroupRecolor { outcomes };
    let failed = report.failures().count();
    if failed > 0 {
        debug!(failed, selected = selected.len(), "group recolor finished with failures");
    }
    report
}
