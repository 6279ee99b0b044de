//! Small helpers for building coverage databases in tests.
//!
//! Keeping these in a workspace crate avoids copy-paste across the backend,
//! merge, and CLI tests. Fixtures are plain data ([`DbSpec`]) so the same
//! input can be written into any backend.

pub mod cross_check;
pub mod proptest;
pub mod snapshot;

use anyhow::Result;
use covdb_ids::ScopeId;
use covdb_mem::MemoryDb;
use covdb_ports::CoverageDb;
use covdb_schema::{CoverItemSpec, CoverType, HistoryRecord, PropertyValue, ScopeKind, ScopeSpec};
use covdb_sqlite::SqliteDb;
use std::path::Path;

pub use cross_check::{
    CrossCheck, DriverRun, cross_check, run_object_driver, run_object_in_memory,
    run_relational_driver,
};
pub use snapshot::{Snapshot, snapshot};

#[derive(Clone, Debug, PartialEq)]
pub struct BinNode {
    pub name: String,
    pub cover_type: CoverType,
    pub hits: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScopeNode {
    pub spec: ScopeSpec,
    pub children: Vec<ScopeNode>,
    pub bins: Vec<BinNode>,
    pub properties: Vec<(String, PropertyValue)>,
}

impl ScopeNode {
    pub fn new(name: &str, kind: ScopeKind) -> Self {
        Self {
            spec: ScopeSpec::new(name, kind),
            children: Vec::new(),
            bins: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn weight(mut self, weight: i64) -> Self {
        self.spec.weight = weight;
        self
    }

    pub fn child(mut self, child: ScopeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn bin(self, name: &str, hits: u64) -> Self {
        self.typed_bin(name, CoverType::CvgBin, hits)
    }

    pub fn typed_bin(mut self, name: &str, cover_type: CoverType, hits: u64) -> Self {
        self.bins.push(BinNode {
            name: name.to_string(),
            cover_type,
            hits,
        });
        self
    }

    pub fn property(mut self, key: &str, value: PropertyValue) -> Self {
        self.properties.push((key.to_string(), value));
        self
    }
}

/// A whole database: top-level scopes under the root plus TEST records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DbSpec {
    pub scopes: Vec<ScopeNode>,
    pub tests: Vec<String>,
}

impl DbSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: ScopeNode) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn test(mut self, name: &str) -> Self {
        self.tests.push(name.to_string());
        self
    }

    pub fn bin_count(&self) -> usize {
        fn count(node: &ScopeNode) -> usize {
            node.bins.len() + node.children.iter().map(count).sum::<usize>()
        }
        self.scopes.iter().map(count).sum()
    }
}

/// `cg` covergroup holding one coverpoint per entry, each with its bins.
pub fn covergroup(name: &str, coverpoints: &[(&str, &[(&str, u64)])]) -> ScopeNode {
    let mut cg = ScopeNode::new(name, ScopeKind::Covergroup);
    for (cp_name, bins) in coverpoints {
        let mut cp = ScopeNode::new(cp_name, ScopeKind::Coverpoint);
        for (bin, hits) in bins.iter() {
            cp = cp.bin(bin, *hits);
        }
        cg = cg.child(cp);
    }
    cg
}

fn write_scope(db: &mut dyn CoverageDb, parent: ScopeId, node: &ScopeNode) -> Result<()> {
    let id = db.create_scope(parent, &node.spec)?;
    for bin in &node.bins {
        db.create_cover_item(id, &CoverItemSpec::new(&bin.name, bin.cover_type, bin.hits))?;
    }
    for (key, value) in &node.properties {
        db.set_scope_property(id, key, value)?;
    }
    for child in &node.children {
        write_scope(db, id, child)?;
    }
    Ok(())
}

/// Write `spec` into `db` below its root.
pub fn populate(db: &mut dyn CoverageDb, spec: &DbSpec) -> Result<()> {
    let root = db.root()?;
    for scope in &spec.scopes {
        write_scope(db, root, scope)?;
    }
    for test in &spec.tests {
        db.create_history_node(&HistoryRecord::test(test.as_str()))?;
    }
    Ok(())
}

pub fn memory_db(name: &str, spec: &DbSpec) -> Result<MemoryDb> {
    let mut db = MemoryDb::new(name);
    populate(&mut db, spec)?;
    Ok(db)
}

/// Create a database file at `path` holding `spec`.
pub fn sqlite_db(path: &Path, spec: &DbSpec) -> Result<SqliteDb> {
    let mut db = SqliteDb::open(path)?;
    populate(&mut db, spec)?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covergroup_builder_shapes_tree() {
        let cg = covergroup("cg", &[("cp", &[("a", 1), ("b", 2)]), ("cp2", &[])]);
        assert_eq!(cg.children.len(), 2);
        assert_eq!(cg.children[0].bins.len(), 2);
        let spec = DbSpec::new().scope(cg).test("t1");
        assert_eq!(spec.bin_count(), 2);
    }

    #[test]
    fn populate_writes_everything() {
        let spec = DbSpec::new()
            .scope(
                ScopeNode::new("top", ScopeKind::Instance)
                    .property("lang", PropertyValue::Str("sv".into()))
                    .child(covergroup("cg", &[("cp", &[("b0", 3)])])),
            )
            .test("t1")
            .test("t2");
        let db = memory_db("m", &spec).unwrap();
        assert_eq!(db.scope_count(), 4);
        assert_eq!(db.cover_item_count(), 1);
        assert_eq!(db.history_nodes(None).unwrap().len(), 2);
    }
}
