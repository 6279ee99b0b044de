//! In-memory coverage database.
//!
//! The whole object graph lives in three arenas indexed by row id, so a
//! transaction is just a saved copy of the arenas. Used for tests, for
//! transient merge targets, and as the reference backend for the
//! object-graph merge driver.

use anyhow::{Context, Result, anyhow, bail};
use covdb_ids::{CoverId, HistoryId, ScopeId};
use covdb_ports::{Backend, CoverageDb};
use covdb_schema::{
    CoverItemSpec, CoverMask, CoverType, HistoryKind, HistoryRecord, PropertyValue, ScopeKind,
    ScopeMask, ScopeSpec,
};
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
struct ScopeNode {
    spec: ScopeSpec,
    children: Vec<ScopeId>,
    items: Vec<CoverId>,
    properties: BTreeMap<String, PropertyValue>,
}

#[derive(Clone, Debug)]
struct HistoryNode {
    record: HistoryRecord,
    int_properties: BTreeMap<String, i64>,
}

#[derive(Clone, Debug)]
struct MemState {
    scopes: Vec<ScopeNode>,
    items: Vec<CoverItemSpec>,
    history: Vec<HistoryNode>,
}

impl MemState {
    fn new() -> Self {
        Self {
            scopes: vec![ScopeNode {
                spec: ScopeSpec::new("", ScopeKind::Root),
                children: Vec::new(),
                items: Vec::new(),
                properties: BTreeMap::new(),
            }],
            items: Vec::new(),
            history: Vec::new(),
        }
    }
}

/// Transient coverage database.
#[derive(Clone, Debug)]
pub struct MemoryDb {
    name: String,
    functional_only: bool,
    state: MemState,
    saved: Option<MemState>,
}

impl MemoryDb {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functional_only: false,
            state: MemState::new(),
            saved: None,
        }
    }

    /// A database that can only hold functional-coverage bins
    /// (normal, default, ignore and illegal covergroup bins).
    pub fn functional_only(name: impl Into<String>) -> Self {
        Self {
            functional_only: true,
            ..Self::new(name)
        }
    }

    pub fn scope_count(&self) -> usize {
        self.state.scopes.len()
    }

    pub fn cover_item_count(&self) -> usize {
        self.state.items.len()
    }

    pub fn in_transaction(&self) -> bool {
        self.saved.is_some()
    }

    fn scope_node(&self, id: ScopeId) -> Result<&ScopeNode> {
        usize::try_from(id.0)
            .ok()
            .and_then(|i| self.state.scopes.get(i))
            .ok_or_else(|| anyhow!("{}: no such {id}", self.name))
    }

    fn scope_node_mut(&mut self, id: ScopeId) -> Result<&mut ScopeNode> {
        let name = &self.name;
        usize::try_from(id.0)
            .ok()
            .and_then(|i| self.state.scopes.get_mut(i))
            .ok_or_else(|| anyhow!("{name}: no such {id}"))
    }

    fn item_index(&self, id: CoverId) -> Result<usize> {
        usize::try_from(id.0)
            .ok()
            .filter(|i| *i < self.state.items.len())
            .ok_or_else(|| anyhow!("{}: no such {id}", self.name))
    }

    fn history_index(&self, id: HistoryId) -> Result<usize> {
        usize::try_from(id.0)
            .ok()
            .filter(|i| *i < self.state.history.len())
            .ok_or_else(|| anyhow!("{}: no such {id}", self.name))
    }
}

impl CoverageDb for MemoryDb {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    fn identity(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn root(&self) -> Result<ScopeId> {
        Ok(ScopeId(0))
    }

    fn child_scopes(&self, parent: ScopeId, mask: ScopeMask) -> Result<Vec<ScopeId>> {
        let node = self.scope_node(parent)?;
        Ok(node
            .children
            .iter()
            .copied()
            .filter(|c| {
                self.scope_node(*c)
                    .map(|n| mask.contains(n.spec.kind))
                    .unwrap_or(false)
            })
            .collect())
    }

    fn scope(&self, id: ScopeId) -> Result<ScopeSpec> {
        Ok(self.scope_node(id)?.spec.clone())
    }

    fn create_scope(&mut self, parent: ScopeId, spec: &ScopeSpec) -> Result<ScopeId> {
        if spec.kind == ScopeKind::Root {
            bail!("{}: a database has exactly one root scope", self.name);
        }
        let id = ScopeId(self.state.scopes.len() as i64);
        self.scope_node_mut(parent)
            .context("create scope")?
            .children
            .push(id);
        self.state.scopes.push(ScopeNode {
            spec: spec.clone(),
            children: Vec::new(),
            items: Vec::new(),
            properties: BTreeMap::new(),
        });
        Ok(id)
    }

    fn cover_items(&self, scope: ScopeId, mask: CoverMask) -> Result<Vec<CoverId>> {
        let node = self.scope_node(scope)?;
        Ok(node
            .items
            .iter()
            .copied()
            .filter(|id| {
                self.item_index(*id)
                    .map(|i| mask.contains(self.state.items[i].cover_type))
                    .unwrap_or(false)
            })
            .collect())
    }

    fn cover_item(&self, id: CoverId) -> Result<CoverItemSpec> {
        let i = self.item_index(id)?;
        Ok(self.state.items[i].clone())
    }

    fn set_hit_count(&mut self, id: CoverId, hit_count: u64) -> Result<()> {
        let i = self.item_index(id)?;
        self.state.items[i].hit_count = hit_count;
        Ok(())
    }

    fn create_cover_item(&mut self, scope: ScopeId, spec: &CoverItemSpec) -> Result<CoverId> {
        if !self.supports_cover_type(spec.cover_type) {
            bail!(
                "{}: cover type {:?} is not supported by this database",
                self.name,
                spec.cover_type
            );
        }
        let id = CoverId(self.state.items.len() as i64);
        self.scope_node_mut(scope)
            .context("create cover item")?
            .items
            .push(id);
        self.state.items.push(spec.clone());
        Ok(id)
    }

    fn supports_cover_type(&self, cover_type: CoverType) -> bool {
        !self.functional_only || cover_type.is_functional()
    }

    fn scope_properties(&self, scope: ScopeId) -> Result<Vec<(String, PropertyValue)>> {
        Ok(self
            .scope_node(scope)?
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn set_scope_property(
        &mut self,
        scope: ScopeId,
        key: &str,
        value: &PropertyValue,
    ) -> Result<()> {
        self.scope_node_mut(scope)?
            .properties
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn history_nodes(&self, kind: Option<HistoryKind>) -> Result<Vec<HistoryId>> {
        Ok(self
            .state
            .history
            .iter()
            .enumerate()
            .filter(|(_, n)| kind.is_none_or(|k| n.record.kind == k))
            .map(|(i, _)| HistoryId(i as i64))
            .collect())
    }

    fn history_node(&self, id: HistoryId) -> Result<HistoryRecord> {
        let i = self.history_index(id)?;
        Ok(self.state.history[i].record.clone())
    }

    fn create_history_node(&mut self, record: &HistoryRecord) -> Result<HistoryId> {
        if let Some(parent) = record.parent {
            self.history_index(parent).context("history parent")?;
        }
        let id = HistoryId(self.state.history.len() as i64);
        self.state.history.push(HistoryNode {
            record: record.clone(),
            int_properties: BTreeMap::new(),
        });
        Ok(id)
    }

    fn history_int_property(&self, id: HistoryId, key: &str) -> Result<Option<i64>> {
        let i = self.history_index(id)?;
        Ok(self.state.history[i].int_properties.get(key).copied())
    }

    fn set_history_int_property(&mut self, id: HistoryId, key: &str, value: i64) -> Result<()> {
        let i = self.history_index(id)?;
        self.state.history[i]
            .int_properties
            .insert(key.to_string(), value);
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<bool> {
        if self.saved.is_some() {
            return Ok(false);
        }
        self.saved = Some(self.state.clone());
        Ok(true)
    }

    fn commit_transaction(&mut self) -> Result<()> {
        self.saved
            .take()
            .map(|_| ())
            .ok_or_else(|| anyhow!("{}: commit without a transaction", self.name))
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        let saved = self
            .saved
            .take()
            .ok_or_else(|| anyhow!("{}: rollback without a transaction", self.name))?;
        self.state = saved;
        Ok(())
    }
}
