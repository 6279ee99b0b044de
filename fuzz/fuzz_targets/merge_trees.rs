//! Fuzz harness for the object-graph merge
//!
//! Every three input bytes pick a covergroup, a bin and a hit count. The
//! bytes are split in half to build a target and a source; merging must
//! succeed and add exactly the source's hits.

#![no_main]

use covdb_merge::merge;
use covdb_schema::{MergeOptions, ScopeKind};
use covdb_testkit::{DbSpec, ScopeNode, memory_db, snapshot};
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;

fn decode(bytes: &[u8]) -> DbSpec {
    let mut groups: BTreeMap<u8, BTreeMap<u8, u64>> = BTreeMap::new();
    for chunk in bytes.chunks_exact(3) {
        let bins = groups.entry(chunk[0] % 4).or_default();
        bins.insert(chunk[1] % 8, u64::from(chunk[2]));
    }
    groups.into_iter().fold(DbSpec::new(), |spec, (g, bins)| {
        let cp = bins
            .into_iter()
            .fold(ScopeNode::new("cp", ScopeKind::Coverpoint), |cp, (b, hits)| {
                cp.bin(&format!("b{b}"), hits)
            });
        spec.scope(ScopeNode::new(&format!("cg{g}"), ScopeKind::Covergroup).child(cp))
    })
}

fuzz_target!(|data: &[u8]| {
    let (left, right) = data.split_at(data.len() / 2);
    let (Ok(mut target), Ok(source)) = (
        memory_db("t", &decode(left)),
        memory_db("s", &decode(right)),
    ) else {
        return;
    };
    let before = snapshot(&target).expect("snapshot target");
    let contributed = snapshot(&source).expect("snapshot source");

    let stats = merge(&mut target, &source, &MergeOptions::default()).expect("merge");
    let after = snapshot(&target).expect("snapshot merged");

    assert_eq!(stats.total_hits_added, contributed.total_hits());
    assert_eq!(after.total_hits(), before.total_hits() + contributed.total_hits());
});
