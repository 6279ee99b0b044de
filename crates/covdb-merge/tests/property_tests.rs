//! Property tests for covdb-merge
//!
//! Algebraic behavior of hit-count accumulation over random coverage trees.

use covdb_merge::{merge, merge_many};
use covdb_ports::CoverageDb;
use covdb_schema::MergeOptions;
use covdb_testkit::proptest::strategy_db_spec;
use covdb_testkit::{memory_db, snapshot};
use proptest::prelude::*;

fn options() -> MergeOptions {
    MergeOptions::without_history()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Source order does not change the final hit counts
    #[test]
    fn prop_merge_order_is_irrelevant(
        t in strategy_db_spec(),
        a in strategy_db_spec(),
        b in strategy_db_spec(),
    ) {
        let (sa, sb) = (memory_db("a", &a).unwrap(), memory_db("b", &b).unwrap());

        let mut ab = memory_db("t", &t).unwrap();
        merge_many(&mut ab, &[&sa, &sb], &options()).unwrap();
        let mut ba = memory_db("t", &t).unwrap();
        merge_many(&mut ba, &[&sb, &sa], &options()).unwrap();

        let (x, y) = (snapshot(&ab).unwrap(), snapshot(&ba).unwrap());
        prop_assert_eq!(x.hits, y.hits);
        prop_assert_eq!(x.scopes, y.scopes);
    }

    /// Matched bins gain exactly the source count; new bins start at it
    #[test]
    fn prop_hits_are_additive(t in strategy_db_spec(), s in strategy_db_spec()) {
        let src = memory_db("s", &s).unwrap();
        let mut tgt = memory_db("t", &t).unwrap();
        let before = snapshot(&tgt).unwrap();
        let contributed = snapshot(&src).unwrap();

        let stats = merge(&mut tgt, &src, &options()).unwrap();
        let after = snapshot(&tgt).unwrap();

        for (key, hits) in &contributed.hits {
            let prior = before.hit(key).unwrap_or(0);
            prop_assert_eq!(after.hit(key), Some(prior + hits), "{}", key);
        }
        prop_assert_eq!(stats.total_hits_added, contributed.total_hits());
        prop_assert_eq!(after.total_hits(), before.total_hits() + contributed.total_hits());
    }

    /// Nothing the target held before a merge is ever removed
    #[test]
    fn prop_target_only_grows(t in strategy_db_spec(), s in strategy_db_spec()) {
        let src = memory_db("s", &s).unwrap();
        let mut tgt = memory_db("t", &t).unwrap();
        let before = snapshot(&tgt).unwrap();

        let stats = merge(&mut tgt, &src, &options()).unwrap();
        let after = snapshot(&tgt).unwrap();

        prop_assert!(after.scopes.is_superset(&before.scopes));
        for (key, hits) in &before.hits {
            prop_assert!(after.hit(key).unwrap_or(0) >= *hits);
        }
        prop_assert_eq!(after.scopes.len() as u64, before.scopes.len() as u64 + stats.scopes_added);
        prop_assert_eq!(after.items as u64, before.items as u64 + stats.cover_items_added);
    }

    /// Merging the same source twice doubles its contribution
    #[test]
    fn prop_merge_is_not_idempotent(s in strategy_db_spec()) {
        let src = memory_db("s", &s).unwrap();
        let mut tgt = memory_db("t", &Default::default()).unwrap();
        let once = {
            merge(&mut tgt, &src, &options()).unwrap();
            snapshot(&tgt).unwrap()
        };
        let second = merge(&mut tgt, &src, &options()).unwrap();
        let twice = snapshot(&tgt).unwrap();

        prop_assert_eq!(second.cover_items_added, 0);
        prop_assert_eq!(second.scopes_added, 0);
        prop_assert_eq!(twice.items, once.items);
        for (key, hits) in &once.hits {
            prop_assert_eq!(twice.hit(key), Some(hits * 2));
        }
    }

    /// Batch and one-at-a-time merging agree on coverage
    #[test]
    fn prop_batch_matches_sequential(
        t in strategy_db_spec(),
        sources in prop::collection::vec(strategy_db_spec(), 0..=3),
    ) {
        let dbs: Vec<_> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| memory_db(&format!("s{i}"), s).unwrap())
            .collect();

        let mut batch = memory_db("t", &t).unwrap();
        let refs: Vec<&dyn CoverageDb> = dbs.iter().map(|d| d as &dyn CoverageDb).collect();
        let batch_stats = merge_many(&mut batch, &refs, &options()).unwrap();

        let mut seq = memory_db("t", &t).unwrap();
        let mut seq_stats = covdb_schema::MergeStats::default();
        for db in &dbs {
            seq_stats += &merge(&mut seq, db, &options()).unwrap();
        }

        prop_assert_eq!(snapshot(&batch).unwrap(), snapshot(&seq).unwrap());
        prop_assert_eq!(batch_stats.counters(), seq_stats.counters());
    }
}
