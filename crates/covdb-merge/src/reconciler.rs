//! Cover-item reconciliation over a resolved scope mapping.

use crate::mapping::ScopeMapping;
use crate::target_index::TargetIndex;
use anyhow::{Context, Result};
use covdb_ports::CoverageDb;
use covdb_schema::CoverMask;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub matched: u64,
    pub added: u64,
    pub skipped: u64,
    pub hits_added: u64,
}

/// Sum source bins into their mapped target scopes.
///
/// A bin matches by name within its mapped scope and its hit count is added
/// (wrapping, never capped). Unmatched bins are created with the source's
/// attributes and hit count. Bins whose type the target cannot represent are
/// skipped with a warning.
pub fn reconcile(
    mapping: &ScopeMapping,
    source: &dyn CoverageDb,
    target: &mut dyn CoverageDb,
    index: &mut TargetIndex,
) -> Result<Reconciliation> {
    let mut out = Reconciliation::default();

    for (src_scope, tgt_scope) in mapping.iter() {
        for src_item in source.cover_items(src_scope, CoverMask::ALL)? {
            let spec = source.cover_item(src_item)?;
            match index.item(&*target, tgt_scope, &spec.name)? {
                Some(existing) => {
                    let current = target.cover_item(existing)?.hit_count;
                    target
                        .set_hit_count(existing, current.wrapping_add(spec.hit_count))
                        .with_context(|| format!("update {existing}"))?;
                    out.matched += 1;
                }
                None if !target.supports_cover_type(spec.cover_type) => {
                    warn!(
                        scope = %tgt_scope,
                        name = %spec.name,
                        cover_type = ?spec.cover_type,
                        "target cannot hold this cover type, skipping bin"
                    );
                    out.skipped += 1;
                    continue;
                }
                None => {
                    let created = target
                        .create_cover_item(tgt_scope, &spec)
                        .with_context(|| format!("create cover item {} in {tgt_scope}", spec.name))?;
                    index.record_item(tgt_scope, &spec.name, created);
                    out.added += 1;
                }
            }
            out.hits_added = out.hits_added.wrapping_add(spec.hit_count);
        }
    }

    debug!(
        matched = out.matched,
        added = out.added,
        skipped = out.skipped,
        hits = out.hits_added,
        "reconciled cover items"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use covdb_mem::MemoryDb;
    use covdb_schema::{CoverItemSpec, CoverType, ScopeKind, ScopeSpec};

    fn with_bins(name: &str, bins: &[(&str, u64)]) -> MemoryDb {
        let mut db = MemoryDb::new(name);
        let root = db.root().unwrap();
        let cp = db
            .create_scope(root, &ScopeSpec::new("cp", ScopeKind::Coverpoint))
            .unwrap();
        for (bin, hits) in bins {
            db.create_cover_item(cp, &CoverItemSpec::bin(*bin, *hits)).unwrap();
        }
        db
    }

    fn run(src: &MemoryDb, tgt: &mut MemoryDb) -> Reconciliation {
        let mut index = TargetIndex::new();
        let r = resolve(src, tgt, &mut index).unwrap();
        reconcile(&r.mapping, src, tgt, &mut index).unwrap()
    }

    #[test]
    fn matched_bins_accumulate() {
        let src = with_bins("src", &[("b0", 7)]);
        let mut tgt = with_bins("tgt", &[("b0", 10)]);
        let r = run(&src, &mut tgt);
        assert_eq!(
            r,
            Reconciliation {
                matched: 1,
                added: 0,
                skipped: 0,
                hits_added: 7
            }
        );
        let cp = tgt.child_scopes(tgt.root().unwrap(), covdb_schema::ScopeMask::ALL).unwrap()[0];
        let b0 = tgt.cover_items(cp, CoverMask::ALL).unwrap()[0];
        assert_eq!(tgt.cover_item(b0).unwrap().hit_count, 17);
    }

    #[test]
    fn unmatched_bins_are_created_verbatim() {
        let src = with_bins("src", &[("new", 4)]);
        let mut tgt = with_bins("tgt", &[("old", 1)]);
        let r = run(&src, &mut tgt);
        assert_eq!((r.matched, r.added, r.hits_added), (0, 1, 4));
        assert_eq!(tgt.cover_item_count(), 2);
    }

    #[test]
    fn unsupported_types_are_skipped() {
        let mut src = MemoryDb::new("src");
        let root = src.root().unwrap();
        src.create_cover_item(root, &CoverItemSpec::new("stmt", CoverType::StmtBin, 3))
            .unwrap();
        src.create_cover_item(root, &CoverItemSpec::bin("b", 2)).unwrap();
        let mut tgt = MemoryDb::functional_only("tgt");
        let r = run(&src, &mut tgt);
        assert_eq!((r.added, r.skipped, r.hits_added), (1, 1, 2));
    }

    #[test]
    fn hit_counts_wrap_instead_of_failing() {
        let src = with_bins("src", &[("b", 2)]);
        let mut tgt = with_bins("tgt", &[("b", u64::MAX)]);
        run(&src, &mut tgt);
        let cp = tgt.child_scopes(tgt.root().unwrap(), covdb_schema::ScopeMask::ALL).unwrap()[0];
        let b = tgt.cover_items(cp, CoverMask::ALL).unwrap()[0];
        assert_eq!(tgt.cover_item(b).unwrap().hit_count, 1);
    }
}
