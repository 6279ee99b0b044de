//! Set-based SQLite merge driver.
//!
//! Merges a SQLite source into a SQLite target with a handful of
//! `INSERT .. SELECT` / `UPDATE` statements instead of one call per row.
//! Results are identical to `covdb-merge`'s object-graph driver; the
//! testkit's cross-check harness holds the two to that.
//!
//! [`merge_many`] is the entry point most callers want: it picks the
//! set-based path per source and falls back to the object-graph driver for
//! sources that are not eligible (in-memory, other backends, a different
//! schema version).

pub mod attach;
pub mod batch;
pub mod bulk;
pub mod sql;
pub mod stage;

pub use batch::{merge, merge_many};
pub use bulk::{BulkMerger, can_merge, ineligibility};
pub use sql::SourceTables;
