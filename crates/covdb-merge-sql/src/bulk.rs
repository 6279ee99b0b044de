//! Set-based merge of one SQLite source into a SQLite target.

use crate::attach::{DetachPolicy, with_attached};
use crate::sql::{self, SourceTables};
use crate::stage;
use anyhow::Result;
use covdb_merge::history::{self, HistoryAnchor, HistoryMode};
use covdb_merge::{MergeError, invariants, validate, with_transaction};
use covdb_ports::{Backend, CoverageDb};
use covdb_schema::{MergeOptions, MergeStats};
use covdb_sqlite::SqliteDb;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Why `source` cannot take the set-based path into `target`, if it can't.
pub fn ineligibility(target: &SqliteDb, source: &dyn CoverageDb) -> Option<String> {
    if source.backend() != Backend::Relational {
        return Some("source is not a relational database".to_string());
    }
    if target.path().is_none() {
        return Some("target has no backing file".to_string());
    }
    if source.storage_path().is_none() {
        return Some("source has no backing file".to_string());
    }
    let (tv, sv) = (target.schema_version(), source.schema_version());
    if tv != sv {
        return Some(format!(
            "schema version {} differs from target {}",
            sv.unwrap_or("unknown"),
            tv.unwrap_or("unknown")
        ));
    }
    None
}

/// Whether `source` can be merged into `target` with set-based SQL.
pub fn can_merge(target: &SqliteDb, source: &dyn CoverageDb) -> bool {
    ineligibility(target, source).is_none()
}

#[derive(Clone, Debug, Default)]
pub struct BulkMerger {
    options: MergeOptions,
}

impl BulkMerger {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    fn detach_policy(&self) -> DetachPolicy {
        DetachPolicy::new(self.options.detach_retries, self.options.detach_retry_delay_ms)
    }

    /// Merge `source` into `target` as one complete operation with its own
    /// history anchor.
    ///
    /// Attaches the source file when `target` is idle; when the caller holds
    /// a transaction the source is staged instead and the caller keeps
    /// commit and rollback.
    pub fn merge(&self, target: &mut SqliteDb, source: &dyn CoverageDb) -> Result<MergeStats> {
        validate(&*target, &[source])?;
        let path = eligible_path(target, source)?;
        let started = Instant::now();
        let mode = HistoryMode::from_options(&self.options);
        let identities = [source.identity()];

        let mut stats = if target.in_transaction() {
            with_transaction(target, |target| {
                let anchor = history::prepare(target, mode, &identities)?;
                self.merge_source(target, source, anchor)
            })?
        } else {
            let max = self.options.max_mapping_iterations;
            with_attached(target, &path, self.detach_policy(), |target| {
                with_transaction(target, |target| {
                    let anchor = history::prepare(target, mode, &identities)?;
                    merge_tables(target, SourceTables::ATTACHED, anchor, max)
                })
            })?
        };
        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            source = %source.identity(),
            scopes_added = stats.scopes_added,
            items_matched = stats.cover_items_matched,
            items_added = stats.cover_items_added,
            hits = stats.total_hits_added,
            ms = stats.duration_ms,
            "relational merge complete"
        );
        Ok(stats)
    }

    /// Merge one eligible source under a caller-owned anchor inside the
    /// caller's transaction. The source is always staged.
    pub fn merge_source(
        &self,
        target: &mut SqliteDb,
        source: &dyn CoverageDb,
        anchor: Option<HistoryAnchor>,
    ) -> Result<MergeStats> {
        let path = eligible_path(target, source)?;
        stage::stage_file(target.conn(), &path)?;
        let stats = merge_tables(
            target,
            SourceTables::STAGED,
            anchor,
            self.options.max_mapping_iterations,
        );
        let cleared = stage::clear_staged(target.conn());
        let stats = stats?;
        cleared?;
        Ok(stats)
    }
}

fn eligible_path(target: &SqliteDb, source: &dyn CoverageDb) -> Result<std::path::PathBuf> {
    if let Some(reason) = ineligibility(target, source) {
        return Err(MergeError::RelationalUnavailable {
            source_name: source.identity(),
            reason,
        }
        .into());
    }
    source
        .storage_path()
        .map(Path::to_path_buf)
        .ok_or_else(|| MergeError::invalid("source has no backing file").into())
}

/// The set-based phases over whichever source tables are in place.
pub fn merge_tables(
    target: &mut SqliteDb,
    tables: SourceTables,
    anchor: Option<HistoryAnchor>,
    max_iterations: u32,
) -> Result<MergeStats> {
    let (scopes_matched, created) = sql::resolve_scopes(target.conn(), tables, max_iterations)?;
    let (items_matched, items_added, hits) = sql::reconcile_items(target.conn(), tables)?;
    let props = sql::merge_scope_properties(target.conn(), tables)?;
    debug!(properties = props, "merged scope properties");

    let (tests_merged, nodes_copied) = match anchor {
        None => (0, 0),
        Some(HistoryAnchor::Merge(parent)) => {
            let tests = sql::count_tests(target.conn(), tables)?;
            (tests, sql::copy_tests(target.conn(), tables, parent)?)
        }
        Some(HistoryAnchor::Summary(summary)) => {
            let tests = sql::count_tests(target.conn(), tables)?;
            history::record_squash(target, summary, tests)?;
            (tests, 0)
        }
    };

    invariants::check_created(&*target, &created)?;

    Ok(MergeStats {
        scopes_matched,
        scopes_added: created.len() as u64,
        cover_items_matched: items_matched,
        cover_items_added: items_added,
        total_hits_added: hits,
        tests_merged,
        history_nodes_merged: nodes_copied,
        relational_merges: 1,
        ..MergeStats::default()
    })
}
