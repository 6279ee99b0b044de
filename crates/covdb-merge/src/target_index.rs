//! Lazily built lookup tables over the merge target.
//!
//! The index survives across the sources of an N-way merge so each target
//! parent is scanned once, not once per source. Anything that changes the
//! target behind the index's back (a set-based merge step, a rollback) must
//! call [`TargetIndex::clear`].

use anyhow::Result;
use covdb_ids::{CoverId, ScopeId};
use covdb_ports::CoverageDb;
use covdb_schema::{CoverMask, ScopeKey, ScopeKind, ScopeMask};
use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Default)]
pub struct TargetIndex {
    children: HashMap<ScopeKey, ScopeId>,
    loaded_parents: HashSet<ScopeId>,
    items: HashMap<ScopeId, HashMap<String, CoverId>>,
}

impl TargetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.children.clear();
        self.loaded_parents.clear();
        self.items.clear();
    }

    /// Number of target parents whose children have been scanned.
    pub fn loaded_parents(&self) -> usize {
        self.loaded_parents.len()
    }

    /// Child of `key.parent` with the same name and kind.
    ///
    /// When the target already holds several such siblings the lowest id wins.
    pub fn child(&mut self, target: &dyn CoverageDb, key: &ScopeKey) -> Result<Option<ScopeId>> {
        if self.loaded_parents.insert(key.parent) {
            for id in target.child_scopes(key.parent, ScopeMask::ALL)? {
                let spec = target.scope(id)?;
                let child_key = spec.key(key.parent);
                if let Some(first) = self.children.get(&child_key) {
                    warn!(
                        parent = %key.parent,
                        name = %spec.name,
                        kind = %spec.kind,
                        kept = %first,
                        ignored = %id,
                        "duplicate sibling scope in target, keeping the first"
                    );
                    continue;
                }
                self.children.insert(child_key, id);
            }
        }
        Ok(self.children.get(key).copied())
    }

    /// Note a scope the merge just created. Unscanned parents are left alone;
    /// their first lookup reads the new child from the target.
    pub fn record_child(&mut self, parent: ScopeId, name: &str, kind: ScopeKind, id: ScopeId) {
        if !self.loaded_parents.contains(&parent) {
            return;
        }
        let key = ScopeKey {
            parent,
            name: name.to_string(),
            kind,
        };
        self.children.entry(key).or_insert(id);
    }

    /// Cover item named `name` in `scope`; the lowest id wins among duplicates.
    pub fn item(
        &mut self,
        target: &dyn CoverageDb,
        scope: ScopeId,
        name: &str,
    ) -> Result<Option<CoverId>> {
        if !self.items.contains_key(&scope) {
            let mut by_name = HashMap::new();
            for id in target.cover_items(scope, CoverMask::ALL)? {
                let spec = target.cover_item(id)?;
                if by_name.contains_key(&spec.name) {
                    warn!(%scope, name = %spec.name, ignored = %id, "duplicate cover item in target, keeping the first");
                    continue;
                }
                by_name.insert(spec.name, id);
            }
            self.items.insert(scope, by_name);
        }
        Ok(self.items.get(&scope).and_then(|m| m.get(name)).copied())
    }

    pub fn record_item(&mut self, scope: ScopeId, name: &str, id: CoverId) {
        if let Some(by_name) = self.items.get_mut(&scope) {
            by_name.entry(name.to_string()).or_insert(id);
        }
    }
}
