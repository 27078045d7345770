//! Editing session: load, group, recolor, commit.
//!
//! A [`Session`] owns the document store and entry table for one batch of
//! assets. Stages run one after another; only the converter calls inside
//! [`Session::load`] and [`Session::commit`] run concurrently.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::color::ColorVector;
use crate::commit::CommitOptions;
use crate::commit::CommitReport;
use crate::commit::run_commit;
use crate::commit::touched_documents;
use crate::config::ChromaConfig;
use crate::converter::Converter;
use crate::converter::ProcessConverter;
use crate::document::DocumentId;
use crate::document::DocumentStore;
use crate::entry::EntryId;
use crate::entry::EntryTable;
use crate::entry::ModeSelection;
use crate::error::ChromaError;
use crate::error::Result;
use crate::extract::extract_entries;
use crate::fs_util::remove_if_exists;
use crate::grouping::ColorGroup;
use crate::grouping::group_entries;
use crate::mutation;
use crate::mutation::GroupRecolor;
use crate::mutation::SyncPolicy;
use crate::pipeline::ExclusionFilter;
use crate::pipeline::Progress;
use crate::pipeline::discover_assets;
use crate::pipeline::export_all;

/// Summary of one [`Session::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Assets exported and parsed, in input order.
    pub loaded: Vec<PathBuf>,
    /// Assets skipped by the exclusion filter.
    pub excluded: Vec<PathBuf>,
    pub entries: usize,
    pub min_entries: usize,
    pub max_entries: usize,
}

impl LoadReport {
    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }
}

pub struct Session {
    config: ChromaConfig,
    converter: Arc<dyn Converter>,
    store: DocumentStore,
    entries: EntryTable,
    generation: u64,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(config: ChromaConfig, converter: Arc<dyn Converter>) -> Self {
        Self {
            config,
            converter,
            store: DocumentStore::new(),
            entries: EntryTable::new(),
            generation: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Session driving the converter process named in `config`.
    pub fn from_config(config: ChromaConfig) -> Self {
        let converter = Arc::new(ProcessConverter::from_config(&config.converter));
        Self::new(config, converter)
    }

    pub fn config(&self) -> &ChromaConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn entries(&self) -> &EntryTable {
        &self.entries
    }

    /// Bumped by every load and commit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token that aborts the converter calls of the running or next load or
    /// commit. Once it has been cancelled, the next load or commit starts
    /// with a fresh token; fetch it again to be able to cancel that one.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn refresh_cancellation(&mut self) {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    /// Sync policy from configuration, used when the caller has no
    /// preference.
    pub fn default_sync(&self) -> SyncPolicy {
        SyncPolicy::from(self.config.edit.sync_min_max)
    }

    /// Replace the session contents with `inputs`.
    ///
    /// Directories expand to the `.uasset` files below them and repeated
    /// assets load once. Excluded assets are listed in the report. Leftover
    /// intermediate JSON next to any asset, or any conversion failure, aborts
    /// the load and leaves the session empty.
    pub async fn load<F>(&mut self, inputs: &[PathBuf], progress: F) -> Result<LoadReport>
    where
        F: FnMut(Progress),
    {
        let start = Instant::now();
        self.refresh_cancellation();
        self.store.clear();
        self.entries.clear();
        self.generation += 1;

        let assets = discover_assets(inputs)?;
        let filter = ExclusionFilter::new(&self.config.scan.exclude_name_substrings);
        let (included, excluded) = filter.partition(assets);
        if !excluded.is_empty() {
            info!(count = excluded.len(), "assets excluded by name filter");
        }

        let documents = export_all(
            self.converter.as_ref(),
            &included,
            self.config.scan.concurrency,
            &self.cancel,
            progress,
        )
        .await?;

        let mut loaded = Vec::with_capacity(documents.len());
        for document in documents {
            loaded.push(document.asset_path().to_path_buf());
            let id = self.store.insert(document);
            if let Some(doc) = self.store.get(id) {
                self.entries.extend(extract_entries(id, doc));
            }
        }

        let report = LoadReport {
            loaded,
            excluded,
            entries: self.entries.len(),
            min_entries: self.entries.min_entries().count(),
            max_entries: self.entries.max_entries().count(),
        };
        info!(
            assets = report.loaded.len(),
            excluded = report.excluded_count(),
            entries = report.entries,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "load finished"
        );
        Ok(report)
    }

    /// Fresh groups for the current entries and generation.
    pub fn regroup(&self) -> Vec<ColorGroup> {
        group_entries(&self.entries, self.config.grouping.options(), self.generation)
    }

    pub fn recolor_entry(
        &mut self,
        id: EntryId,
        color: ColorVector,
        sync: SyncPolicy,
    ) -> Result<Vec<EntryId>> {
        mutation::recolor_entry(&mut self.store, &mut self.entries, id, color, sync)
    }

    /// Recolor every member of `group`. Fails without touching anything when
    /// the group was computed before the last load or commit.
    pub fn recolor_group(
        &mut self,
        group: &mut ColorGroup,
        color: ColorVector,
        sync: SyncPolicy,
    ) -> Result<GroupRecolor> {
        self.ensure_current(group)?;
        Ok(mutation::recolor_group(
            &mut self.store,
            &mut self.entries,
            group,
            color,
            sync,
        ))
    }

    /// Like [`Session::recolor_group`], but only members on the `selection`
    /// side are recolored.
    pub fn recolor_group_side(
        &mut self,
        group: &mut ColorGroup,
        selection: ModeSelection,
        color: ColorVector,
        sync: SyncPolicy,
    ) -> Result<GroupRecolor> {
        self.ensure_current(group)?;
        Ok(mutation::recolor_group_side(
            &mut self.store,
            &mut self.entries,
            group,
            selection,
            color,
            sync,
        ))
    }

    pub fn ensure_current(&self, group: &ColorGroup) -> Result<()> {
        if group.generation() != self.generation {
            return Err(ChromaError::StaleGroups {
                group_generation: group.generation(),
                session_generation: self.generation,
            });
        }
        Ok(())
    }

    /// Documents the next commit would rewrite.
    pub fn touched_documents(&self) -> BTreeSet<DocumentId> {
        touched_documents(&self.entries, self.config.commit.scope)
    }

    /// Write back every touched document and rebuild its asset.
    ///
    /// Committed documents have their entries marked persisted. Failed
    /// documents keep their in-memory edits so the commit can be retried.
    /// Groups computed before this call are stale afterwards.
    pub async fn commit(&mut self) -> CommitReport {
        self.refresh_cancellation();
        let documents = self.touched_documents();
        let options = CommitOptions {
            json_indent: self.config.commit.json_indent,
            keep_json: self.config.commit.keep_json,
            concurrency: self.config.scan.concurrency,
        };

        let report = run_commit(
            &self.store,
            &documents,
            self.converter.as_ref(),
            options,
            &self.cancel,
        )
        .await;

        let committed: BTreeSet<DocumentId> = report.committed().map(|d| d.document).collect();
        for (_, entry) in self.entries.iter_mut() {
            if committed.contains(&entry.document()) {
                entry.mark_persisted();
            }
        }
        self.generation += 1;
        report
    }

    /// Drop everything loaded, edits included, and delete the intermediate
    /// JSON files.
    pub fn discard(&mut self) -> Result<()> {
        let all: BTreeSet<DocumentId> = self.store.iter().map(|(id, _)| id).collect();
        self.finish(&all)
    }

    /// End the session. Documents without pending edits lose their
    /// intermediate JSON (unless `keep_json` is set); documents whose commit
    /// failed keep it so the edit is not lost.
    pub fn close(&mut self) -> Result<()> {
        let pending: BTreeSet<DocumentId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_dirty())
            .map(|(_, e)| e.document())
            .collect();
        let clean: BTreeSet<DocumentId> = if self.config.commit.keep_json {
            BTreeSet::new()
        } else {
            self.store
                .iter()
                .map(|(id, _)| id)
                .filter(|id| !pending.contains(id))
                .collect()
        };
        if !pending.is_empty() {
            info!(documents = pending.len(), "leaving JSON of uncommitted documents in place");
        }
        self.finish(&clean)
    }

    fn finish(&mut self, remove: &BTreeSet<DocumentId>) -> Result<()> {
        let mut first_error = None;
        for id in remove {
            let Some(doc) = self.store.get(*id) else {
                continue;
            };
            if let Err(err) = remove_if_exists(doc.json_path()) {
                warn!(json = %doc.json_path().display(), error = %err, "could not remove intermediate JSON");
                first_error.get_or_insert(err);
            }
        }
        self.store.clear();
        self.entries.clear();
        self.generation += 1;
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
