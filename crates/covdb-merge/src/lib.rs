//! Coverage merge engine, backend-agnostic half.
//!
//! Combines coverage databases through the [`covdb_ports::CoverageDb`] port:
//! scope correspondence ([`resolver`]), cover-item reconciliation
//! ([`reconciler`]), test attribution ([`history`]) and the driver that
//! sequences them ([`driver`]). Hit counts are summed, never replaced, so a
//! merge is monotonic and applying the same source twice doubles its
//! contribution.
//!
//! The set-based SQLite path lives in `covdb-merge-sql` and must agree with
//! this crate on every input it accepts.

pub mod driver;
pub mod error;
pub mod history;
pub mod invariants;
pub mod mapping;
pub mod reconciler;
pub mod resolver;
pub mod target_index;

pub use driver::{ObjectMerger, merge, merge_many, validate, with_transaction};
pub use error::MergeError;
pub use history::{Attribution, HistoryAnchor, HistoryMode};
pub use mapping::ScopeMapping;
pub use target_index::TargetIndex;
