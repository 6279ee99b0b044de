use crate::{DbSpec, ScopeNode};
use covdb_schema::{MergeOptions, ScopeKind};
use proptest::prelude::*;
use std::collections::BTreeMap;

const BIN_NAMES: &[&str] = &["b0", "b1", "b2", "b3", "lo", "hi"];
const CP_NAMES: &[&str] = &["cp_addr", "cp_data", "cp_len"];
const CG_NAMES: &[&str] = &["cg_bus", "cg_irq"];
const INST_NAMES: &[&str] = &["u_core", "u_dma"];

fn pick(pool: &'static [&'static str]) -> impl Strategy<Value = String> {
    prop::sample::select(pool).prop_map(str::to_string)
}

pub fn strategy_bin_name() -> impl Strategy<Value = String> {
    pick(BIN_NAMES)
}

/// Hit counts small enough that sums over a handful of merges never wrap.
pub fn strategy_hit_count() -> impl Strategy<Value = u64> {
    0u64..10_000
}

/// Coverpoint with distinct bin names.
pub fn strategy_coverpoint() -> impl Strategy<Value = ScopeNode> {
    (
        pick(CP_NAMES),
        prop::collection::btree_map(strategy_bin_name(), strategy_hit_count(), 0..=4),
    )
        .prop_map(|(name, bins)| {
            bins.into_iter()
                .fold(ScopeNode::new(&name, ScopeKind::Coverpoint), |cp, (bin, hits)| {
                    cp.bin(&bin, hits)
                })
        })
}

fn unique_children(children: Vec<ScopeNode>) -> Vec<ScopeNode> {
    let mut by_name: BTreeMap<String, ScopeNode> = BTreeMap::new();
    for child in children {
        by_name.entry(child.spec.name.clone()).or_insert(child);
    }
    by_name.into_values().collect()
}

pub fn strategy_covergroup() -> impl Strategy<Value = ScopeNode> {
    (
        pick(CG_NAMES),
        prop::collection::vec(strategy_coverpoint(), 0..=3),
    )
        .prop_map(|(name, cps)| {
            unique_children(cps)
                .into_iter()
                .fold(ScopeNode::new(&name, ScopeKind::Covergroup), ScopeNode::child)
        })
}

pub fn strategy_instance() -> impl Strategy<Value = ScopeNode> {
    (
        pick(INST_NAMES),
        prop::collection::vec(strategy_covergroup(), 0..=2),
    )
        .prop_map(|(name, cgs)| {
            unique_children(cgs)
                .into_iter()
                .fold(ScopeNode::new(&name, ScopeKind::Instance), ScopeNode::child)
        })
}

pub fn strategy_test_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("t_[a-z]{1,6}", 0..=3)
}

/// Whole database with unique sibling names at every level.
pub fn strategy_db_spec() -> impl Strategy<Value = DbSpec> {
    (
        prop::collection::vec(strategy_instance(), 0..=2),
        strategy_test_names(),
    )
        .prop_map(|(instances, tests)| DbSpec {
            scopes: unique_children(instances),
            tests,
        })
}

pub fn strategy_merge_options() -> impl Strategy<Value = MergeOptions> {
    prop_oneof![
        Just(MergeOptions::default()),
        Just(MergeOptions::squashed()),
        Just(MergeOptions::without_history()),
    ]
}
