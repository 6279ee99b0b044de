//! Per-kind structural rules for scopes.
//!
//! Applied to the scopes a merge created. A violation is a data-quality
//! warning, never a merge failure.

use anyhow::Result;
use covdb_ids::ScopeId;
use covdb_ports::CoverageDb;
use covdb_schema::{CoverMask, ScopeKind, ScopeMask};
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub scope: ScopeId,
    pub kind: ScopeKind,
    pub message: String,
}

type Rule = fn(&dyn CoverageDb, ScopeId) -> Result<Option<String>>;

const RULES: &[(ScopeKind, Rule)] = &[
    (ScopeKind::Fsm, fsm_has_states_and_transitions),
    (ScopeKind::Cross, cross_has_bins),
    (ScopeKind::Covergroup, covergroup_children),
];

fn count_children(db: &dyn CoverageDb, scope: ScopeId, kind: ScopeKind) -> Result<usize> {
    Ok(db.child_scopes(scope, ScopeMask::of(kind))?.len())
}

fn fsm_has_states_and_transitions(db: &dyn CoverageDb, scope: ScopeId) -> Result<Option<String>> {
    let states = count_children(db, scope, ScopeKind::FsmStates)?;
    let trans = count_children(db, scope, ScopeKind::FsmTrans)?;
    if states == 1 && trans == 1 {
        return Ok(None);
    }
    Ok(Some(format!(
        "FSM needs one states scope and one transitions scope, found {states} and {trans}"
    )))
}

fn cross_has_bins(db: &dyn CoverageDb, scope: ScopeId) -> Result<Option<String>> {
    if db.cover_items(scope, CoverMask::ALL)?.is_empty() {
        return Ok(Some("cross has no bins".to_string()));
    }
    Ok(None)
}

fn covergroup_children(db: &dyn CoverageDb, scope: ScopeId) -> Result<Option<String>> {
    let allowed = ScopeMask::of(ScopeKind::Coverpoint) | ScopeKind::Cross | ScopeKind::CoverInstance;
    let all = db.child_scopes(scope, ScopeMask::ALL)?.len();
    let ok = db.child_scopes(scope, allowed)?.len();
    if all != ok {
        return Ok(Some(format!(
            "covergroup holds {} scopes that are not coverpoints, crosses or instances",
            all - ok
        )));
    }
    Ok(None)
}

/// Check one scope against the rule for its kind, if any.
pub fn check_scope(db: &dyn CoverageDb, scope: ScopeId) -> Result<Option<Violation>> {
    let kind = db.scope(scope)?.kind;
    for (rule_kind, rule) in RULES {
        if *rule_kind == kind {
            return Ok(rule(db, scope)?.map(|message| Violation {
                scope,
                kind,
                message,
            }));
        }
    }
    Ok(None)
}

/// Check every scope in `scopes`, logging each violation.
pub fn check_created(db: &dyn CoverageDb, scopes: &[ScopeId]) -> Result<Vec<Violation>> {
    let mut out = Vec::new();
    for &scope in scopes {
        if let Some(v) = check_scope(db, scope)? {
            warn!(scope = %v.scope, kind = %v.kind, "{}", v.message);
            out.push(v);
        }
    }
    Ok(out)
}
