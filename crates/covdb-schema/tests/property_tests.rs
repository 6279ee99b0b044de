//! Property tests for covdb-schema
//!
//! Code tables, masks, and config-facing serde shapes.

use covdb_schema::*;
use proptest::prelude::*;

fn any_scope_kind() -> impl Strategy<Value = ScopeKind> {
    proptest::sample::select(ScopeKind::ALL.to_vec())
}

fn any_cover_type() -> impl Strategy<Value = CoverType> {
    proptest::sample::select(CoverType::ALL.to_vec())
}

proptest! {
    /// Every scope kind except root is matched by the full mask and only by masks carrying its bit
    #[test]
    fn prop_scope_mask_membership(a in any_scope_kind(), b in any_scope_kind()) {
        prop_assume!(a != ScopeKind::Root && b != ScopeKind::Root);
        prop_assert!(ScopeMask::ALL.contains(a));
        let mask = ScopeMask::of(a);
        prop_assert_eq!(mask.contains(b), a == b);
    }

    /// Cover-type masks behave like sets of type bits
    #[test]
    fn prop_cover_mask_union(a in any_cover_type(), b in any_cover_type(), c in any_cover_type()) {
        let mask = CoverMask::of(a) | b;
        prop_assert!(mask.contains(a));
        prop_assert!(mask.contains(b));
        prop_assert_eq!(mask.contains(c), c == a || c == b);
    }

    /// Scope specs survive YAML, the config file format
    #[test]
    fn prop_scope_spec_yaml(name in "[a-z_][a-z0-9_]{0,12}", kind in any_scope_kind(), weight in 0i64..100) {
        let spec = ScopeSpec::new(name, kind).with_weight(weight);
        let yaml = serde_yaml::to_string(&spec).unwrap();
        let back: ScopeSpec = serde_yaml::from_str(&yaml).unwrap();
        prop_assert_eq!(spec, back);
    }

    /// Stats accumulation is order independent
    #[test]
    fn prop_stats_accumulate_commutes(x in 0u64..1_000_000, y in 0u64..1_000_000) {
        let a = MergeStats { total_hits_added: x, scopes_added: y, ..MergeStats::default() };
        let b = MergeStats { total_hits_added: y, cover_items_matched: x, ..MergeStats::default() };
        let mut ab = MergeStats::default();
        ab += &a;
        ab += &b;
        let mut ba = MergeStats::default();
        ba += &b;
        ba += &a;
        prop_assert_eq!(ab, ba);
    }
}

#[test]
fn merge_options_yaml_shape() {
    let yaml = serde_yaml::to_string(&MergeOptions::squashed()).unwrap();
    assert!(yaml.contains("squash_history: true"));
    assert!(yaml.contains("relational: auto"));
}
