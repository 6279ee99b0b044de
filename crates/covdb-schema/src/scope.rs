use crate::kind::{CoverType, ScopeKind};
use covdb_ids::ScopeId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

fn default_weight() -> i64 {
    1
}

fn default_goal() -> i64 {
    100
}

/// Attributes of one scope, as passed to `create_scope` and returned by
/// backends when a scope is read back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSpec {
    pub name: String,
    pub kind: ScopeKind,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default = "default_goal")]
    pub goal: i64,
    #[serde(default)]
    pub flags: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLoc>,
}

impl ScopeSpec {
    /// Weight 1, goal 100, no flags.
    pub fn new(name: impl Into<String>, kind: ScopeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            weight: default_weight(),
            goal: default_goal(),
            flags: 0,
            source: None,
        }
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_goal(mut self, goal: i64) -> Self {
        self.goal = goal;
        self
    }

    pub fn with_source(mut self, file: impl Into<String>, line: u32) -> Self {
        self.source = Some(SourceLoc {
            file: file.into(),
            line,
        });
        self
    }

    /// Key this scope would occupy under `parent`.
    pub fn key(&self, parent: ScopeId) -> ScopeKey {
        ScopeKey {
            parent,
            name: self.name.clone(),
            kind: self.kind,
        }
    }
}

/// Attributes of one cover item (bin).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverItemSpec {
    pub name: String,
    pub cover_type: CoverType,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default = "default_at_least")]
    pub at_least: u64,
    #[serde(default = "default_weight")]
    pub weight: i64,
    #[serde(default = "default_goal")]
    pub goal: i64,
    #[serde(default)]
    pub flags: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLoc>,
}

fn default_at_least() -> u64 {
    1
}

impl CoverItemSpec {
    pub fn new(name: impl Into<String>, cover_type: CoverType, hit_count: u64) -> Self {
        Self {
            name: name.into(),
            cover_type,
            hit_count,
            at_least: default_at_least(),
            weight: default_weight(),
            goal: default_goal(),
            flags: 0,
            source: None,
        }
    }

    /// A normal covergroup bin.
    pub fn bin(name: impl Into<String>, hit_count: u64) -> Self {
        Self::new(name, CoverType::CvgBin, hit_count)
    }

    pub fn with_at_least(mut self, at_least: u64) -> Self {
        self.at_least = at_least;
        self
    }
}

/// Sibling identity of a scope: two scopes correspond when their parents
/// correspond and their (name, kind) match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub parent: ScopeId,
    pub name: String,
    pub kind: ScopeKind,
}

/// Typed user property value attached to a scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    Int(i64),
    Real(f64),
    Str(String),
}

impl PropertyValue {
    /// Storage tag used by the relational backend.
    pub fn type_code(&self) -> i64 {
        match self {
            PropertyValue::Int(_) => 0,
            PropertyValue::Real(_) => 1,
            PropertyValue::Str(_) => 2,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}
