//! Copy a source database into temp tables on the target connection.
//!
//! SQLite refuses `ATTACH` while a transaction is open, so a source merged
//! inside a caller's transaction is read through a separate read-only
//! connection and its rows land in [`SourceTables::STAGED`].
//!
//! [`SourceTables::STAGED`]: crate::sql::SourceTables::STAGED

use anyhow::{Context, Result};
use covdb_sqlite::read_only_uri;
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params_from_iter};
use std::path::Path;
use tracing::debug;

const STAGED: &[(&str, &str)] = &[
    ("scopes", "src_scopes"),
    ("coveritems", "src_coveritems"),
    ("history_nodes", "src_history_nodes"),
    ("scope_properties", "src_scope_properties"),
];

const STAGED_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS temp.idx_src_scopes_id ON src_scopes(scope_id);
CREATE INDEX IF NOT EXISTS temp.idx_src_scopes_parent ON src_scopes(parent_id);
CREATE INDEX IF NOT EXISTS temp.idx_src_coveritems_id ON src_coveritems(cover_id);
CREATE INDEX IF NOT EXISTS temp.idx_src_coveritems_scope ON src_coveritems(scope_id, cover_name);
";

/// Stage every source table; returns the number of rows copied.
pub fn stage_connection(target: &Connection, source: &Connection) -> Result<u64> {
    let mut copied = 0u64;
    for (table, staged) in STAGED {
        target
            .execute_batch(&format!(
                "CREATE TEMP TABLE IF NOT EXISTS {staged} AS SELECT * FROM main.{table} WHERE 0;
                 DELETE FROM temp.{staged};"
            ))
            .with_context(|| format!("prepare staging table {staged}"))?;

        let mut read = source
            .prepare(&format!("SELECT * FROM main.{table}"))
            .with_context(|| format!("read source {table}"))?;
        let columns = read.column_count();
        let placeholders = vec!["?"; columns].join(", ");
        let mut write =
            target.prepare(&format!("INSERT INTO temp.{staged} VALUES ({placeholders})"))?;

        let mut rows = read.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..columns)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            write
                .execute(params_from_iter(values))
                .with_context(|| format!("stage {table} row"))?;
            copied += 1;
        }
    }
    target.execute_batch(STAGED_INDEXES)?;
    debug!(rows = copied, "staged source tables");
    Ok(copied)
}

/// Stage the database file at `path`, opened read-only.
pub fn stage_file(target: &Connection, path: &Path) -> Result<u64> {
    let uri = read_only_uri(path)?;
    let source = Connection::open_with_flags(
        &uri,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("open {} for staging", path.display()))?;
    stage_connection(target, &source)
}

/// Empty the staging tables once a merge is done with them.
pub fn clear_staged(target: &Connection) -> Result<()> {
    for (_, staged) in STAGED {
        target.execute_batch(&format!("DELETE FROM temp.{staged}"))?;
    }
    Ok(())
}
