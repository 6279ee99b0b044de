//! Relational layout of a coverage database.
//!
//! Tables are created on demand. `db_metadata` carries the schema-version
//! marker that the set-based merge path compares between databases.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use covdb_ids::ScopeId;
use covdb_schema::ScopeKind;
use rusqlite::{Connection, OptionalExtension, params};

pub const SCHEMA_VERSION: &str = "1.0";
pub const UCIS_VERSION: &str = "1.0";
pub const API_VERSION: &str = "1.0";
pub const PATH_SEPARATOR: &str = "/";

pub const KEY_SCHEMA_VERSION: &str = "SCHEMA_VERSION";

const DDL: &str = "
CREATE TABLE IF NOT EXISTS db_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT
);

CREATE TABLE IF NOT EXISTS scopes (
    scope_id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER,
    scope_type INTEGER NOT NULL,
    scope_name TEXT NOT NULL,
    scope_flags INTEGER NOT NULL DEFAULT 0,
    weight INTEGER NOT NULL DEFAULT 1,
    goal INTEGER NOT NULL DEFAULT 100,
    source_file TEXT,
    source_line INTEGER,
    FOREIGN KEY (parent_id) REFERENCES scopes(scope_id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_scopes_parent ON scopes(parent_id);
CREATE INDEX IF NOT EXISTS idx_scopes_parent_type_name ON scopes(parent_id, scope_type, scope_name);

CREATE TABLE IF NOT EXISTS coveritems (
    cover_id INTEGER PRIMARY KEY AUTOINCREMENT,
    scope_id INTEGER NOT NULL,
    cover_index INTEGER NOT NULL,
    cover_type INTEGER NOT NULL,
    cover_name TEXT NOT NULL,
    cover_flags INTEGER NOT NULL DEFAULT 0,
    cover_data INTEGER NOT NULL DEFAULT 0,
    at_least INTEGER NOT NULL DEFAULT 1,
    weight INTEGER NOT NULL DEFAULT 1,
    goal INTEGER NOT NULL DEFAULT 100,
    source_file TEXT,
    source_line INTEGER,
    FOREIGN KEY (scope_id) REFERENCES scopes(scope_id) ON DELETE CASCADE,
    UNIQUE(scope_id, cover_index)
);
CREATE INDEX IF NOT EXISTS idx_coveritems_scope_name ON coveritems(scope_id, cover_name);

CREATE TABLE IF NOT EXISTS history_nodes (
    history_id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER,
    history_kind INTEGER NOT NULL,
    logical_name TEXT NOT NULL,
    physical_name TEXT,
    test_status INTEGER,
    seed TEXT,
    cmd_line TEXT,
    date TEXT,
    user_name TEXT,
    FOREIGN KEY (parent_id) REFERENCES history_nodes(history_id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_history_kind ON history_nodes(history_kind);
CREATE INDEX IF NOT EXISTS idx_history_logical ON history_nodes(logical_name);

CREATE TABLE IF NOT EXISTS history_properties (
    history_id INTEGER NOT NULL,
    property_key TEXT NOT NULL,
    property_type INTEGER NOT NULL,
    int_value INTEGER,
    real_value REAL,
    string_value TEXT,
    PRIMARY KEY (history_id, property_key),
    FOREIGN KEY (history_id) REFERENCES history_nodes(history_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS scope_properties (
    scope_id INTEGER NOT NULL,
    property_key TEXT NOT NULL,
    property_type INTEGER NOT NULL,
    int_value INTEGER,
    real_value REAL,
    string_value TEXT,
    PRIMARY KEY (scope_id, property_key),
    FOREIGN KEY (scope_id) REFERENCES scopes(scope_id) ON DELETE CASCADE
);
";

/// Create any missing tables, metadata and the root scope.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(DDL).context("create coverage tables")?;

    let created = Utc::now().to_rfc3339();
    for (key, value) in [
        (KEY_SCHEMA_VERSION, SCHEMA_VERSION),
        ("UCIS_VERSION", UCIS_VERSION),
        ("API_VERSION", API_VERSION),
        ("PATH_SEPARATOR", PATH_SEPARATOR),
        ("CREATED_TIME", created.as_str()),
    ] {
        conn.execute(
            "INSERT OR IGNORE INTO db_metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .with_context(|| format!("write metadata {key}"))?;
    }

    let roots: i64 = conn.query_row(
        "SELECT COUNT(*) FROM scopes WHERE parent_id IS NULL",
        [],
        |row| row.get(0),
    )?;
    if roots == 0 {
        conn.execute(
            "INSERT INTO scopes (parent_id, scope_type, scope_name) VALUES (NULL, ?1, '')",
            params![ScopeKind::Root.code() as i64],
        )
        .context("create root scope")?;
    }
    Ok(())
}

pub fn metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> = conn
        .query_row(
            "SELECT value FROM db_metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("read metadata {key}"))?;
    Ok(value.flatten())
}

/// The single row with no parent.
pub fn find_root(conn: &Connection) -> Result<ScopeId> {
    let mut stmt = conn.prepare("SELECT scope_id FROM scopes WHERE parent_id IS NULL")?;
    let roots = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    match roots.as_slice() {
        [root] => Ok(ScopeId(*root)),
        [] => bail!("database has no root scope"),
        many => bail!("database has {} root scopes", many.len()),
    }
}
