//! Object-graph merge driver.
//!
//! Walks any pair of [`CoverageDb`] implementations, so it works across
//! heterogeneous backends. Phases run strictly in order for each source:
//! resolve scopes, reconcile cover items (and scope properties), attribute
//! history, then check the per-kind rules on scopes the merge created.

use crate::error::MergeError;
use crate::history::{self, HistoryAnchor, HistoryMode};
use crate::invariants;
use crate::reconciler::reconcile;
use crate::resolver::resolve;
use crate::target_index::TargetIndex;
use anyhow::Result;
use covdb_ports::CoverageDb;
use covdb_schema::{MergeOptions, MergeStats};
use std::time::Instant;
use tracing::{info, warn};

/// Run `f` inside a write transaction on `db`.
///
/// When `db` is already mid-transaction, `f` joins it and the caller keeps
/// ownership of commit and rollback. Otherwise the transaction is committed
/// on success and rolled back on any error.
pub fn with_transaction<D, T>(db: &mut D, f: impl FnOnce(&mut D) -> Result<T>) -> Result<T>
where
    D: CoverageDb + ?Sized,
{
    let started = db
        .begin_transaction()
        .map_err(|e| MergeError::storage("begin transaction", e))?;
    match f(db) {
        Ok(value) => {
            if started && let Err(e) = db.commit_transaction() {
                if let Err(rb) = db.rollback_transaction() {
                    warn!(error = %rb, "rollback after failed commit also failed");
                }
                return Err(MergeError::storage("commit", e).into());
            }
            Ok(value)
        }
        Err(err) => {
            if started && let Err(rb) = db.rollback_transaction() {
                warn!(error = %rb, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Reject inputs that cannot be merged, before anything is written.
pub fn validate(target: &dyn CoverageDb, sources: &[&dyn CoverageDb]) -> Result<()> {
    target
        .root()
        .map_err(|e| MergeError::invalid(format!("target {}: {e:#}", target.identity())))?;
    for source in sources {
        source
            .root()
            .map_err(|e| MergeError::invalid(format!("source {}: {e:#}", source.identity())))?;
    }
    Ok(())
}

/// Stateful object-graph driver.
///
/// Keeps a [`TargetIndex`] across calls so an N-way merge scans each target
/// parent once. Reusing a merger against a different target requires
/// [`ObjectMerger::invalidate`].
#[derive(Debug)]
pub struct ObjectMerger {
    options: MergeOptions,
    index: TargetIndex,
}

impl ObjectMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            index: TargetIndex::new(),
        }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    pub fn history_mode(&self) -> HistoryMode {
        HistoryMode::from_options(&self.options)
    }

    /// Forget cached target structure, after the target changed elsewhere.
    pub fn invalidate(&mut self) {
        self.index.clear();
    }

    /// Merge one source into `target` as a complete operation: one
    /// transaction, one history anchor.
    pub fn merge(
        &mut self,
        target: &mut dyn CoverageDb,
        source: &dyn CoverageDb,
    ) -> Result<MergeStats> {
        self.merge_all(target, &[source])
    }

    /// Merge `sources` in order under one transaction and one history anchor.
    pub fn merge_all(
        &mut self,
        target: &mut dyn CoverageDb,
        sources: &[&dyn CoverageDb],
    ) -> Result<MergeStats> {
        validate(&*target, sources)?;
        if sources.is_empty() {
            return Ok(MergeStats::default());
        }
        let started = Instant::now();
        let identities: Vec<String> = sources.iter().map(|s| s.identity()).collect();
        let mode = self.history_mode();

        let result = with_transaction(target, |target| {
            let anchor = history::prepare(target, mode, &identities)?;
            let mut total = MergeStats::default();
            for source in sources {
                total += &self.merge_source(target, *source, anchor)?;
            }
            Ok(total)
        });

        let mut stats = match result {
            Ok(stats) => stats,
            Err(err) => {
                self.invalidate();
                return Err(err);
            }
        };
        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            sources = sources.len(),
            scopes_added = stats.scopes_added,
            items_matched = stats.cover_items_matched,
            items_added = stats.cover_items_added,
            hits = stats.total_hits_added,
            ms = stats.duration_ms,
            "object merge complete"
        );
        Ok(stats)
    }

    /// Merge one source under a caller-owned anchor, inside whatever
    /// transaction the caller holds. The caller validates inputs and rolls
    /// back (and invalidates) on error.
    pub fn merge_source(
        &mut self,
        target: &mut dyn CoverageDb,
        source: &dyn CoverageDb,
        anchor: Option<HistoryAnchor>,
    ) -> Result<MergeStats> {
        let resolution = resolve(source, target, &mut self.index)?;
        let items = reconcile(&resolution.mapping, source, target, &mut self.index)?;

        for (src_scope, tgt_scope) in resolution.mapping.iter() {
            for (key, value) in source.scope_properties(src_scope)? {
                target.set_scope_property(tgt_scope, &key, &value)?;
            }
        }

        let attribution = history::attribute(source, target, anchor)?;
        invariants::check_created(&*target, &resolution.created)?;

        Ok(MergeStats {
            scopes_matched: resolution.matched,
            scopes_added: resolution.created.len() as u64,
            cover_items_matched: items.matched,
            cover_items_added: items.added,
            cover_items_skipped: items.skipped,
            total_hits_added: items.hits_added,
            tests_merged: attribution.tests_merged,
            history_nodes_merged: attribution.nodes_copied,
            object_merges: 1,
            ..MergeStats::default()
        })
    }
}

/// Merge `source` into `target`.
pub fn merge(
    target: &mut dyn CoverageDb,
    source: &dyn CoverageDb,
    options: &MergeOptions,
) -> Result<MergeStats> {
    ObjectMerger::new(options.clone()).merge(target, source)
}

/// Merge `sources` into `target` in order, as one transaction with one
/// history anchor for the whole batch.
pub fn merge_many(
    target: &mut dyn CoverageDb,
    sources: &[&dyn CoverageDb],
    options: &MergeOptions,
) -> Result<MergeStats> {
    ObjectMerger::new(options.clone()).merge_all(target, sources)
}
