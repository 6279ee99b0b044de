use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Scope kind tag.
///
/// Codes are the UCIS scope-type bits, so databases written by other UCIS
/// tools decode without a translation table. `Root` is the database's own
/// top node and has no UCIS code of its own (0 is `SCOPE_ERROR` there).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Root,
    Toggle,
    Branch,
    Expr,
    Cond,
    Instance,
    Process,
    Block,
    Function,
    ForkJoin,
    Generate,
    Generic,
    Class,
    Covergroup,
    CoverInstance,
    Coverpoint,
    Cross,
    Cover,
    Assert,
    Program,
    Package,
    Task,
    Interface,
    Fsm,
    DuModule,
    DuArch,
    DuPackage,
    DuProgram,
    DuInterface,
    FsmStates,
    FsmTrans,
    CovBlock,
    CvgBinScope,
    IllegalBinScope,
    IgnoreBinScope,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 35] = [
        ScopeKind::Root,
        ScopeKind::Toggle,
        ScopeKind::Branch,
        ScopeKind::Expr,
        ScopeKind::Cond,
        ScopeKind::Instance,
        ScopeKind::Process,
        ScopeKind::Block,
        ScopeKind::Function,
        ScopeKind::ForkJoin,
        ScopeKind::Generate,
        ScopeKind::Generic,
        ScopeKind::Class,
        ScopeKind::Covergroup,
        ScopeKind::CoverInstance,
        ScopeKind::Coverpoint,
        ScopeKind::Cross,
        ScopeKind::Cover,
        ScopeKind::Assert,
        ScopeKind::Program,
        ScopeKind::Package,
        ScopeKind::Task,
        ScopeKind::Interface,
        ScopeKind::Fsm,
        ScopeKind::DuModule,
        ScopeKind::DuArch,
        ScopeKind::DuPackage,
        ScopeKind::DuProgram,
        ScopeKind::DuInterface,
        ScopeKind::FsmStates,
        ScopeKind::FsmTrans,
        ScopeKind::CovBlock,
        ScopeKind::CvgBinScope,
        ScopeKind::IllegalBinScope,
        ScopeKind::IgnoreBinScope,
    ];

    pub fn code(self) -> u64 {
        match self {
            ScopeKind::Root => 0,
            ScopeKind::Toggle => 0x0000_0001,
            ScopeKind::Branch => 0x0000_0002,
            ScopeKind::Expr => 0x0000_0004,
            ScopeKind::Cond => 0x0000_0008,
            ScopeKind::Instance => 0x0000_0010,
            ScopeKind::Process => 0x0000_0020,
            ScopeKind::Block => 0x0000_0040,
            ScopeKind::Function => 0x0000_0080,
            ScopeKind::ForkJoin => 0x0000_0100,
            ScopeKind::Generate => 0x0000_0200,
            ScopeKind::Generic => 0x0000_0400,
            ScopeKind::Class => 0x0000_0800,
            ScopeKind::Covergroup => 0x0000_1000,
            ScopeKind::CoverInstance => 0x0000_2000,
            ScopeKind::Coverpoint => 0x0000_4000,
            ScopeKind::Cross => 0x0000_8000,
            ScopeKind::Cover => 0x0001_0000,
            ScopeKind::Assert => 0x0002_0000,
            ScopeKind::Program => 0x0004_0000,
            ScopeKind::Package => 0x0008_0000,
            ScopeKind::Task => 0x0010_0000,
            ScopeKind::Interface => 0x0020_0000,
            ScopeKind::Fsm => 0x0040_0000,
            ScopeKind::DuModule => 0x0100_0000,
            ScopeKind::DuArch => 0x0200_0000,
            ScopeKind::DuPackage => 0x0400_0000,
            ScopeKind::DuProgram => 0x0800_0000,
            ScopeKind::DuInterface => 0x1000_0000,
            ScopeKind::FsmStates => 0x2000_0000,
            ScopeKind::FsmTrans => 0x4000_0000,
            ScopeKind::CovBlock => 0x8000_0000,
            ScopeKind::CvgBinScope => 0x0001_0000_0000,
            ScopeKind::IllegalBinScope => 0x0002_0000_0000,
            ScopeKind::IgnoreBinScope => 0x0004_0000_0000,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Root => "root",
            ScopeKind::Toggle => "toggle",
            ScopeKind::Branch => "branch",
            ScopeKind::Expr => "expr",
            ScopeKind::Cond => "cond",
            ScopeKind::Instance => "instance",
            ScopeKind::Process => "process",
            ScopeKind::Block => "block",
            ScopeKind::Function => "function",
            ScopeKind::ForkJoin => "fork_join",
            ScopeKind::Generate => "generate",
            ScopeKind::Generic => "generic",
            ScopeKind::Class => "class",
            ScopeKind::Covergroup => "covergroup",
            ScopeKind::CoverInstance => "cover_instance",
            ScopeKind::Coverpoint => "coverpoint",
            ScopeKind::Cross => "cross",
            ScopeKind::Cover => "cover",
            ScopeKind::Assert => "assert",
            ScopeKind::Program => "program",
            ScopeKind::Package => "package",
            ScopeKind::Task => "task",
            ScopeKind::Interface => "interface",
            ScopeKind::Fsm => "fsm",
            ScopeKind::DuModule => "du_module",
            ScopeKind::DuArch => "du_arch",
            ScopeKind::DuPackage => "du_package",
            ScopeKind::DuProgram => "du_program",
            ScopeKind::DuInterface => "du_interface",
            ScopeKind::FsmStates => "fsm_states",
            ScopeKind::FsmTrans => "fsm_trans",
            ScopeKind::CovBlock => "cov_block",
            ScopeKind::CvgBinScope => "cvg_bin_scope",
            ScopeKind::IllegalBinScope => "illegal_bin_scope",
            ScopeKind::IgnoreBinScope => "ignore_bin_scope",
        }
    }

    /// Functional-coverage constructs (covergroups and their parts).
    pub fn is_functional(self) -> bool {
        matches!(
            self,
            ScopeKind::Covergroup
                | ScopeKind::CoverInstance
                | ScopeKind::Coverpoint
                | ScopeKind::Cross
                | ScopeKind::CvgBinScope
                | ScopeKind::IllegalBinScope
                | ScopeKind::IgnoreBinScope
        )
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bit mask over scope kinds, used to filter child enumeration.
///
/// `Root` is never matched: it has no bit and is never anyone's child.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeMask(pub u64);

impl ScopeMask {
    pub const ALL: ScopeMask = ScopeMask(0x0000_FFFF_FFFF_FFFF);
    pub const NONE: ScopeMask = ScopeMask(0);

    pub fn of(kind: ScopeKind) -> Self {
        Self(kind.code())
    }

    pub fn contains(self, kind: ScopeKind) -> bool {
        self.0 & kind.code() != 0
    }
}

impl BitOr<ScopeKind> for ScopeMask {
    type Output = ScopeMask;

    fn bitor(self, rhs: ScopeKind) -> ScopeMask {
        ScopeMask(self.0 | rhs.code())
    }
}

/// Cover-item (bin) type tag, with UCIS cover-type codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverType {
    CvgBin,
    CoverBin,
    AssertBin,
    StmtBin,
    BranchBin,
    ExprBin,
    CondBin,
    ToggleBin,
    PassBin,
    FsmBin,
    UserBin,
    Count,
    FailBin,
    VacuousBin,
    DisabledBin,
    AttemptBin,
    ActiveBin,
    IgnoreBin,
    IllegalBin,
    DefaultBin,
    PeakActiveBin,
    BlockBin,
}

impl CoverType {
    pub const ALL: [CoverType; 22] = [
        CoverType::CvgBin,
        CoverType::CoverBin,
        CoverType::AssertBin,
        CoverType::StmtBin,
        CoverType::BranchBin,
        CoverType::ExprBin,
        CoverType::CondBin,
        CoverType::ToggleBin,
        CoverType::PassBin,
        CoverType::FsmBin,
        CoverType::UserBin,
        CoverType::Count,
        CoverType::FailBin,
        CoverType::VacuousBin,
        CoverType::DisabledBin,
        CoverType::AttemptBin,
        CoverType::ActiveBin,
        CoverType::IgnoreBin,
        CoverType::IllegalBin,
        CoverType::DefaultBin,
        CoverType::PeakActiveBin,
        CoverType::BlockBin,
    ];

    pub fn code(self) -> u64 {
        match self {
            CoverType::CvgBin => 0x0000_0001,
            CoverType::CoverBin => 0x0000_0002,
            CoverType::AssertBin => 0x0000_0004,
            CoverType::StmtBin => 0x0000_0020,
            CoverType::BranchBin => 0x0000_0040,
            CoverType::ExprBin => 0x0000_0080,
            CoverType::CondBin => 0x0000_0100,
            CoverType::ToggleBin => 0x0000_0200,
            CoverType::PassBin => 0x0000_0400,
            CoverType::FsmBin => 0x0000_0800,
            CoverType::UserBin => 0x0000_1000,
            CoverType::Count => 0x0000_2000,
            CoverType::FailBin => 0x0000_4000,
            CoverType::VacuousBin => 0x0000_8000,
            CoverType::DisabledBin => 0x0001_0000,
            CoverType::AttemptBin => 0x0002_0000,
            CoverType::ActiveBin => 0x0004_0000,
            CoverType::IgnoreBin => 0x0008_0000,
            CoverType::IllegalBin => 0x0010_0000,
            CoverType::DefaultBin => 0x0020_0000,
            CoverType::PeakActiveBin => 0x0040_0000,
            CoverType::BlockBin => 0x0100_0000,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Covergroup bins: normal, default, ignore and illegal.
    pub fn is_functional(self) -> bool {
        matches!(
            self,
            CoverType::CvgBin | CoverType::DefaultBin | CoverType::IgnoreBin | CoverType::IllegalBin
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverMask(pub u64);

impl CoverMask {
    pub const ALL: CoverMask = CoverMask(0x0000_0000_01FF_FFFF);

    pub fn of(cover_type: CoverType) -> Self {
        Self(cover_type.code())
    }

    pub fn contains(self, cover_type: CoverType) -> bool {
        self.0 & cover_type.code() != 0
    }
}

impl BitOr<CoverType> for CoverMask {
    type Output = CoverMask;

    fn bitor(self, rhs: CoverType) -> CoverMask {
        CoverMask(self.0 | rhs.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn scope_codes_are_unique_and_decode() {
        let codes: HashSet<u64> = ScopeKind::ALL.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), ScopeKind::ALL.len());
        for kind in ScopeKind::ALL {
            assert_eq!(ScopeKind::from_code(kind.code()), Some(kind));
        }
    }

    #[test]
    fn cover_codes_are_unique_and_decode() {
        let codes: HashSet<u64> = CoverType::ALL.iter().map(|t| t.code()).collect();
        assert_eq!(codes.len(), CoverType::ALL.len());
        for t in CoverType::ALL {
            assert_eq!(CoverType::from_code(t.code()), Some(t));
            assert!(CoverMask::ALL.contains(t));
        }
    }

    #[test]
    fn unknown_codes_do_not_decode() {
        assert_eq!(ScopeKind::from_code(0x0080_0000), None);
        assert_eq!(CoverType::from_code(0x0000_0008), None);
    }

    #[test]
    fn scope_mask_never_matches_root() {
        assert!(!ScopeMask::ALL.contains(ScopeKind::Root));
        assert!(ScopeMask::ALL.contains(ScopeKind::IgnoreBinScope));
        let mask = ScopeMask::of(ScopeKind::Covergroup) | ScopeKind::Instance;
        assert!(mask.contains(ScopeKind::Instance));
        assert!(!mask.contains(ScopeKind::Coverpoint));
    }

    #[test]
    fn functional_cover_types() {
        assert!(CoverType::CvgBin.is_functional());
        assert!(CoverType::IllegalBin.is_functional());
        assert!(!CoverType::StmtBin.is_functional());
        assert!(!CoverType::ToggleBin.is_functional());
    }

    #[test]
    fn kind_display_matches_serde_name() {
        for kind in ScopeKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }
}
