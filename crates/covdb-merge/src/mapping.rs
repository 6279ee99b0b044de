use covdb_ids::ScopeId;
use std::collections::HashMap;

/// Source-scope to target-scope correspondence for one merge.
///
/// Pairs are kept in resolution order (breadth-first from the roots), which
/// is also the order reconciliation visits them.
#[derive(Clone, Debug, Default)]
pub struct ScopeMapping {
    pairs: Vec<(ScopeId, ScopeId)>,
    by_source: HashMap<ScopeId, ScopeId>,
}

impl ScopeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair. A source scope is mapped at most once; later inserts
    /// for the same source are ignored and return `false`.
    pub fn insert(&mut self, source: ScopeId, target: ScopeId) -> bool {
        if self.by_source.contains_key(&source) {
            return false;
        }
        self.by_source.insert(source, target);
        self.pairs.push((source, target));
        true
    }

    pub fn get(&self, source: ScopeId) -> Option<ScopeId> {
        self.by_source.get(&source).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, ScopeId)> + '_ {
        self.pairs.iter().copied()
    }
}
