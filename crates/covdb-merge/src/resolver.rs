//! Scope correspondence between a source tree and a target tree.

use crate::mapping::ScopeMapping;
use crate::target_index::TargetIndex;
use anyhow::{Context, Result};
use covdb_ids::ScopeId;
use covdb_ports::CoverageDb;
use covdb_schema::ScopeMask;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub mapping: ScopeMapping,
    /// Non-root source scopes that found an existing target scope.
    pub matched: u64,
    /// Target scopes created by this resolution, in creation order.
    pub created: Vec<ScopeId>,
}

/// Map every source scope onto the target, creating missing target scopes.
///
/// Breadth-first from the roots: a scope is resolved only once its parent
/// is. Two scopes correspond when their parents correspond and their
/// (name, kind) match. Never fails for structural reasons; an unmatched
/// source scope always yields a new target scope, so the mapping is total.
///
/// Duplicate (name, kind) siblings in the source all land on one target
/// scope; the first one creates it and the rest count as matched.
pub fn resolve(
    source: &dyn CoverageDb,
    target: &mut dyn CoverageDb,
    index: &mut TargetIndex,
) -> Result<Resolution> {
    let source_root = source.root().context("source root")?;
    let target_root = target.root().context("target root")?;

    let mut out = Resolution::default();
    out.mapping.insert(source_root, target_root);

    let mut frontier = VecDeque::from([(source_root, target_root)]);
    while let Some((src_parent, tgt_parent)) = frontier.pop_front() {
        for src_child in source.child_scopes(src_parent, ScopeMask::ALL)? {
            let spec = source.scope(src_child)?;
            let key = spec.key(tgt_parent);
            let tgt_child = match index.child(&*target, &key)? {
                Some(existing) => {
                    out.matched += 1;
                    existing
                }
                None => {
                    let created = target
                        .create_scope(tgt_parent, &spec)
                        .with_context(|| format!("create scope {} ({})", spec.name, spec.kind))?;
                    index.record_child(tgt_parent, &spec.name, spec.kind, created);
                    out.created.push(created);
                    created
                }
            };
            if out.mapping.insert(src_child, tgt_child) {
                frontier.push_back((src_child, tgt_child));
            }
        }
    }

    debug!(
        mapped = out.mapping.len(),
        matched = out.matched,
        added = out.created.len(),
        "resolved scope correspondence"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use covdb_mem::MemoryDb;
    use covdb_schema::{ScopeKind, ScopeSpec};

    fn chain(db: &mut MemoryDb, names: &[(&str, ScopeKind)]) -> ScopeId {
        let mut parent = db.root().unwrap();
        for (name, kind) in names {
            parent = db.create_scope(parent, &ScopeSpec::new(*name, *kind)).unwrap();
        }
        parent
    }

    #[test]
    fn empty_target_gets_full_chain() {
        let mut src = MemoryDb::new("src");
        chain(
            &mut src,
            &[("cg", ScopeKind::Covergroup), ("cp", ScopeKind::Coverpoint)],
        );
        let mut tgt = MemoryDb::new("tgt");
        let r = resolve(&src, &mut tgt, &mut TargetIndex::new()).unwrap();
        assert_eq!(r.mapping.len(), 3);
        assert_eq!(r.matched, 0);
        assert_eq!(r.created.len(), 2);
        assert_eq!(tgt.scope_count(), 3);
    }

    #[test]
    fn identical_trees_match_everything() {
        let mut src = MemoryDb::new("src");
        let mut tgt = MemoryDb::new("tgt");
        for db in [&mut src, &mut tgt] {
            chain(db, &[("top", ScopeKind::Instance), ("cg", ScopeKind::Covergroup)]);
        }
        let r = resolve(&src, &mut tgt, &mut TargetIndex::new()).unwrap();
        assert_eq!(r.matched, 2);
        assert!(r.created.is_empty());
    }

    #[test]
    fn same_name_different_kind_is_a_new_scope() {
        let mut src = MemoryDb::new("src");
        chain(&mut src, &[("x", ScopeKind::Cross)]);
        let mut tgt = MemoryDb::new("tgt");
        chain(&mut tgt, &[("x", ScopeKind::Coverpoint)]);
        let r = resolve(&src, &mut tgt, &mut TargetIndex::new()).unwrap();
        assert_eq!(r.created.len(), 1);
        let root = tgt.root().unwrap();
        assert_eq!(tgt.child_scopes(root, ScopeMask::ALL).unwrap().len(), 2);
    }

    #[test]
    fn new_scope_copies_weight_and_goal() {
        let mut src = MemoryDb::new("src");
        let root = src.root().unwrap();
        src.create_scope(
            root,
            &ScopeSpec::new("cg", ScopeKind::Covergroup)
                .with_weight(3)
                .with_goal(90),
        )
        .unwrap();
        let mut tgt = MemoryDb::new("tgt");
        let r = resolve(&src, &mut tgt, &mut TargetIndex::new()).unwrap();
        let spec = tgt.scope(r.created[0]).unwrap();
        assert_eq!((spec.weight, spec.goal), (3, 90));
    }

    #[test]
    fn duplicate_source_siblings_share_one_target() {
        let mut src = MemoryDb::new("src");
        let root = src.root().unwrap();
        let a = src
            .create_scope(root, &ScopeSpec::new("cp", ScopeKind::Coverpoint))
            .unwrap();
        let b = src
            .create_scope(root, &ScopeSpec::new("cp", ScopeKind::Coverpoint))
            .unwrap();
        let mut tgt = MemoryDb::new("tgt");
        let r = resolve(&src, &mut tgt, &mut TargetIndex::new()).unwrap();
        assert_eq!(r.created.len(), 1);
        assert_eq!(r.matched, 1);
        assert_eq!(r.mapping.get(a), r.mapping.get(b));
    }
}
