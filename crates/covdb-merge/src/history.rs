//! Test attribution: which tests (and merges) produced the target's counts.
//!
//! One merge entry-point call owns one anchor. In preserve mode the anchor
//! is a fresh MERGE record and every source TEST record is copied under it.
//! In squash mode the anchor is the target's running summary record, found
//! or created once, and only its test counter moves.

use anyhow::{Context, Result};
use chrono::Local;
use covdb_ids::{HistoryId, MergeFingerprint};
use covdb_ports::CoverageDb;
use covdb_schema::{
    HistoryKind, HistoryRecord, MergeOptions, SQUASH_SUMMARY_NAME, TESTS_MERGED_KEY,
};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryMode {
    Preserve,
    Squash,
    Off,
}

impl HistoryMode {
    pub fn from_options(options: &MergeOptions) -> Self {
        match (options.create_history, options.squash_history) {
            (false, _) => HistoryMode::Off,
            (true, true) => HistoryMode::Squash,
            (true, false) => HistoryMode::Preserve,
        }
    }
}

/// Where the history of one merge call is attached in the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryAnchor {
    /// New MERGE record; copied TEST records are parented under it.
    Merge(HistoryId),
    /// The squash summary record.
    Summary(HistoryId),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Attribution {
    /// TEST records found in the source.
    pub tests_merged: u64,
    /// Records written into the target.
    pub nodes_copied: u64,
}

/// MERGE record describing a merge of `sources`, in order.
pub fn merge_record(sources: &[String]) -> HistoryRecord {
    let now = Local::now();
    let mut record = HistoryRecord::merge(now.format("merge_%Y%m%d_%H%M%S").to_string())
        .with_physical_name(MergeFingerprint::from_sources(sources).to_string())
        .with_cmd(sources.join(" "))
        .with_date(now.format("%Y-%m-%d %H:%M:%S").to_string());
    if let Ok(user) = std::env::var("USER") {
        record = record.with_user(user);
    }
    record
}

/// Create the anchor for one merge call. `None` when history is off.
pub fn prepare(
    target: &mut dyn CoverageDb,
    mode: HistoryMode,
    sources: &[String],
) -> Result<Option<HistoryAnchor>> {
    match mode {
        HistoryMode::Off => Ok(None),
        HistoryMode::Preserve => {
            let id = target
                .create_history_node(&merge_record(sources))
                .context("create merge history record")?;
            Ok(Some(HistoryAnchor::Merge(id)))
        }
        HistoryMode::Squash => Ok(Some(HistoryAnchor::Summary(find_or_create_summary(
            target,
        )?))),
    }
}

/// The squash summary record, created on first use.
pub fn find_or_create_summary(target: &mut dyn CoverageDb) -> Result<HistoryId> {
    for id in target.history_nodes(Some(HistoryKind::Merge))? {
        if target.history_node(id)?.logical_name == SQUASH_SUMMARY_NAME {
            return Ok(id);
        }
    }
    let id = target
        .create_history_node(&HistoryRecord::merge(SQUASH_SUMMARY_NAME))
        .context("create squash summary record")?;
    target.set_history_int_property(id, TESTS_MERGED_KEY, 0)?;
    debug!(%id, "created squash summary record");
    Ok(id)
}

/// Add `tests` to the summary's running counter.
pub fn record_squash(target: &mut dyn CoverageDb, summary: HistoryId, tests: u64) -> Result<()> {
    let so_far = target
        .history_int_property(summary, TESTS_MERGED_KEY)?
        .unwrap_or(0);
    target
        .set_history_int_property(summary, TESTS_MERGED_KEY, so_far + tests as i64)
        .context("update squash counter")
}

/// Attribute one source's tests to the target under `anchor`.
pub fn attribute(
    source: &dyn CoverageDb,
    target: &mut dyn CoverageDb,
    anchor: Option<HistoryAnchor>,
) -> Result<Attribution> {
    let Some(anchor) = anchor else {
        return Ok(Attribution::default());
    };
    let tests = source.history_nodes(Some(HistoryKind::Test))?;
    let mut out = Attribution {
        tests_merged: tests.len() as u64,
        nodes_copied: 0,
    };
    match anchor {
        HistoryAnchor::Merge(merge_id) => {
            for id in tests {
                let record = source.history_node(id)?.with_parent(Some(merge_id));
                target
                    .create_history_node(&record)
                    .with_context(|| format!("copy test record {}", record.logical_name))?;
                out.nodes_copied += 1;
            }
        }
        HistoryAnchor::Summary(summary) => record_squash(target, summary, out.tests_merged)?,
    }
    Ok(out)
}
