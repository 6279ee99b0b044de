//! Canonical coverage model vocabulary for the covdb crates.
//!
//! Defines scope kinds and cover-item types (with their UCIS codes), the
//! attribute records exchanged with storage backends, history records, and
//! the merge statistics/options shared by both merge drivers.
//! All other crates depend on these types.

pub mod history;
pub mod kind;
pub mod scope;
pub mod stats;

pub use history::{
    HistoryKind, HistoryRecord, SQUASH_SUMMARY_NAME, TESTS_MERGED_KEY, TestStatus,
};
pub use kind::{CoverMask, CoverType, ScopeKind, ScopeMask};
pub use scope::{CoverItemSpec, PropertyValue, ScopeKey, ScopeSpec, SourceLoc};
pub use stats::{MergeOptions, MergeStats, RelationalMode};
