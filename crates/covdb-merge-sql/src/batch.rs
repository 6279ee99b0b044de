//! N-way merge into a SQLite target, choosing a driver per source.
//!
//! Sources are merged strictly in order inside one target transaction with
//! one history anchor. Each source takes the set-based path when it is
//! eligible and the relational mode allows it, and the object-graph path
//! otherwise. The object driver's target index is kept across sources and
//! invalidated whenever set-based SQL has changed the target under it.

use crate::bulk::{BulkMerger, ineligibility};
use anyhow::Result;
use covdb_merge::history::{self, HistoryMode};
use covdb_merge::{MergeError, ObjectMerger, validate, with_transaction};
use covdb_ports::CoverageDb;
use covdb_schema::{MergeOptions, MergeStats, RelationalMode};
use covdb_sqlite::SqliteDb;
use std::time::Instant;
use tracing::{info, warn};

/// Merge `sources` into `target` in order.
pub fn merge_many(
    target: &mut SqliteDb,
    sources: &[&dyn CoverageDb],
    options: &MergeOptions,
) -> Result<MergeStats> {
    validate(&*target, sources)?;
    if options.relational == RelationalMode::Required {
        for source in sources {
            if let Some(reason) = ineligibility(target, *source) {
                return Err(MergeError::RelationalUnavailable {
                    source_name: source.identity(),
                    reason,
                }
                .into());
            }
        }
    }
    if sources.is_empty() {
        return Ok(MergeStats::default());
    }

    let started = Instant::now();
    let identities: Vec<String> = sources.iter().map(|s| s.identity()).collect();
    let mode = HistoryMode::from_options(options);
    let bulk = BulkMerger::new(options.clone());
    let mut object = ObjectMerger::new(options.clone());

    let mut stats = with_transaction(target, |target| {
        let anchor = history::prepare(target, mode, &identities)?;
        let mut total = MergeStats::default();
        for source in sources {
            let blocked = match options.relational {
                RelationalMode::Disabled => Some(None),
                _ => ineligibility(target, *source).map(Some),
            };
            let step = match blocked {
                None => {
                    let step = bulk.merge_source(target, *source, anchor)?;
                    object.invalidate();
                    step
                }
                Some(reason) => {
                    if let Some(reason) = reason {
                        warn!(source = %source.identity(), %reason, "falling back to object-graph merge");
                    }
                    object.merge_source(target, *source, anchor)?
                }
            };
            total += &step;
        }
        Ok(total)
    })?;

    stats.duration_ms = started.elapsed().as_millis() as u64;
    info!(
        sources = sources.len(),
        relational = stats.relational_merges,
        object = stats.object_merges,
        scopes_added = stats.scopes_added,
        items_matched = stats.cover_items_matched,
        items_added = stats.cover_items_added,
        hits = stats.total_hits_added,
        ms = stats.duration_ms,
        "batch merge complete"
    );
    Ok(stats)
}

/// Merge one source into `target`, falling back to the object-graph driver
/// when the set-based path is unavailable or disabled.
pub fn merge(
    target: &mut SqliteDb,
    source: &dyn CoverageDb,
    options: &MergeOptions,
) -> Result<MergeStats> {
    merge_many(target, &[source], options)
}
