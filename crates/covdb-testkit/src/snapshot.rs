//! Backend-independent view of a database's coverage content.
//!
//! Row ids and cover indexes differ between backends and drivers; paths of
//! `name:kind` segments do not, so two databases with equal snapshots hold
//! the same coverage.

use anyhow::Result;
use covdb_ids::ScopeId;
use covdb_ports::CoverageDb;
use covdb_schema::{CoverMask, HistoryKind, ScopeMask};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Scope paths below the root.
    pub scopes: BTreeSet<String>,
    /// `scope-path#bin` to hit count.
    pub hits: BTreeMap<String, u64>,
    /// Number of cover-item rows.
    pub items: usize,
    pub test_records: usize,
    pub merge_records: usize,
}

impl Snapshot {
    pub fn hit(&self, key: &str) -> Option<u64> {
        self.hits.get(key).copied()
    }

    pub fn total_hits(&self) -> u64 {
        self.hits.values().fold(0u64, |acc, h| acc.wrapping_add(*h))
    }
}

fn walk(db: &dyn CoverageDb, scope: ScopeId, path: &str, out: &mut Snapshot) -> Result<()> {
    for item in db.cover_items(scope, CoverMask::ALL)? {
        let spec = db.cover_item(item)?;
        let slot = out.hits.entry(format!("{path}#{}", spec.name)).or_insert(0);
        *slot = slot.wrapping_add(spec.hit_count);
        out.items += 1;
    }
    for child in db.child_scopes(scope, ScopeMask::ALL)? {
        let spec = db.scope(child)?;
        let child_path = format!("{path}/{}:{}", spec.name, spec.kind);
        out.scopes.insert(child_path.clone());
        walk(db, child, &child_path, out)?;
    }
    Ok(())
}

pub fn snapshot(db: &dyn CoverageDb) -> Result<Snapshot> {
    let mut out = Snapshot::default();
    walk(db, db.root()?, "", &mut out)?;
    out.test_records = db.history_nodes(Some(HistoryKind::Test))?.len();
    out.merge_records = db.history_nodes(Some(HistoryKind::Merge))?.len();
    Ok(out)
}
