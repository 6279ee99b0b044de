use anyhow::Result;
use covdb_ids::{CoverId, HistoryId, ScopeId};
use covdb_schema::{
    CoverItemSpec, CoverMask, CoverType, HistoryKind, HistoryRecord, PropertyValue, ScopeMask,
    ScopeSpec,
};
use std::path::Path;

/// Storage engine behind a database handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Transient object graph held in process memory.
    Memory,
    /// SQL tables (SQLite).
    Relational,
}

/// The coverage object model, as consumed by the merge engine.
///
/// Row ids returned by one database are only meaningful to that database.
/// Enumerations return ids in creation order, so "first encountered" means
/// "lowest id" for every backend.
///
/// Backends live in `covdb-mem` and `covdb-sqlite`.
pub trait CoverageDb {
    fn backend(&self) -> Backend;

    /// Human-readable identity, recorded in merge history.
    fn identity(&self) -> String;

    /// On-disk location, if the database is file-backed.
    fn storage_path(&self) -> Option<&Path> {
        None
    }

    /// Relational schema-version marker. `None` for non-relational backends.
    fn schema_version(&self) -> Option<&str> {
        None
    }

    /// The single root scope. Errors when the database has no usable root.
    fn root(&self) -> Result<ScopeId>;

    fn child_scopes(&self, parent: ScopeId, mask: ScopeMask) -> Result<Vec<ScopeId>>;
    fn scope(&self, id: ScopeId) -> Result<ScopeSpec>;
    fn create_scope(&mut self, parent: ScopeId, spec: &ScopeSpec) -> Result<ScopeId>;

    fn cover_items(&self, scope: ScopeId, mask: CoverMask) -> Result<Vec<CoverId>>;
    fn cover_item(&self, id: CoverId) -> Result<CoverItemSpec>;
    fn set_hit_count(&mut self, id: CoverId, hit_count: u64) -> Result<()>;
    fn create_cover_item(&mut self, scope: ScopeId, spec: &CoverItemSpec) -> Result<CoverId>;

    /// Whether `create_cover_item` can represent this type.
    fn supports_cover_type(&self, _cover_type: CoverType) -> bool {
        true
    }

    fn scope_properties(&self, scope: ScopeId) -> Result<Vec<(String, PropertyValue)>>;
    fn set_scope_property(&mut self, scope: ScopeId, key: &str, value: &PropertyValue)
    -> Result<()>;

    /// History records in creation order, optionally filtered by kind.
    fn history_nodes(&self, kind: Option<HistoryKind>) -> Result<Vec<HistoryId>>;
    fn history_node(&self, id: HistoryId) -> Result<HistoryRecord>;
    fn create_history_node(&mut self, record: &HistoryRecord) -> Result<HistoryId>;
    fn history_int_property(&self, id: HistoryId, key: &str) -> Result<Option<i64>>;
    fn set_history_int_property(&mut self, id: HistoryId, key: &str, value: i64) -> Result<()>;

    /// Start a write transaction unless one is already open.
    ///
    /// Returns `true` when this call started it; only that caller may commit
    /// or roll back.
    fn begin_transaction(&mut self) -> Result<bool>;
    fn commit_transaction(&mut self) -> Result<()>;
    fn rollback_transaction(&mut self) -> Result<()>;
}
