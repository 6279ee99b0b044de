//! SQLite-backed coverage database.
//!
//! One file per database. The layout lives in [`schema`]; this module maps
//! the [`CoverageDb`] port onto it row by row. Set-based merging over the
//! same tables is in `covdb-merge-sql`.

pub mod schema;

use anyhow::{Context, Result, anyhow, bail};
use covdb_ids::{CoverId, HistoryId, ScopeId};
use covdb_ports::{Backend, CoverageDb};
use covdb_schema::{
    CoverItemSpec, CoverMask, CoverType, HistoryKind, HistoryRecord, PropertyValue, ScopeKind,
    ScopeMask, ScopeSpec, SourceLoc, TestStatus,
};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

pub use schema::SCHEMA_VERSION;

/// `file:` URI that opens `path` read-only, for `ATTACH` and read-only opens.
pub fn read_only_uri(path: &Path) -> Result<String> {
    let abs = path
        .canonicalize()
        .with_context(|| format!("resolve {}", path.display()))?;
    let mut url = Url::from_file_path(&abs)
        .map_err(|()| anyhow!("cannot express {} as a file URI", abs.display()))?;
    url.set_query(Some("mode=ro"));
    Ok(url.to_string())
}

#[derive(Debug)]
pub struct SqliteDb {
    conn: Connection,
    path: Option<PathBuf>,
    read_only: bool,
    schema_version: String,
}

impl SqliteDb {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("open coverage database {}", path.display()))?;
        Self::init(conn, Some(path.to_path_buf()), false)
    }

    /// Open an existing database without write access.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let uri = read_only_uri(path)?;
        let conn = Connection::open_with_flags(
            &uri,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open coverage database {} read-only", path.display()))?;
        Self::init(conn, Some(path.to_path_buf()), true)
    }

    /// Transient database (for testing). Never eligible for set-based merging.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory coverage database")?;
        Self::init(conn, None, false)
    }

    fn init(conn: Connection, path: Option<PathBuf>, read_only: bool) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        if !read_only {
            schema::ensure_schema(&conn)?;
        }
        let schema_version = schema::metadata(&conn, schema::KEY_SCHEMA_VERSION)
            .context("not a coverage database")?
            .ok_or_else(|| anyhow!("coverage database has no schema version"))?;
        debug!(path = ?path, read_only, schema_version = %schema_version, "opened coverage database");
        Ok(Self {
            conn,
            path,
            read_only,
            schema_version,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    pub fn scope_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM scopes", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn cover_item_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM coveritems", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

fn source_loc(file: Option<String>, line: Option<i64>) -> Option<SourceLoc> {
    file.map(|file| SourceLoc {
        file,
        line: line.unwrap_or(0) as u32,
    })
}

fn scope_from_row(row: &Row<'_>) -> rusqlite::Result<(String, i64, i64, i64, i64, Option<String>, Option<i64>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn read_property(
    property_type: i64,
    int_value: Option<i64>,
    real_value: Option<f64>,
    string_value: Option<String>,
) -> Result<PropertyValue> {
    match property_type {
        0 => Ok(PropertyValue::Int(int_value.unwrap_or(0))),
        1 => Ok(PropertyValue::Real(real_value.unwrap_or(0.0))),
        2 => Ok(PropertyValue::Str(string_value.unwrap_or_default())),
        other => bail!("unknown property type {other}"),
    }
}

fn property_columns(value: &PropertyValue) -> (Option<i64>, Option<f64>, Option<&str>) {
    match value {
        PropertyValue::Int(v) => (Some(*v), None, None),
        PropertyValue::Real(v) => (None, Some(*v), None),
        PropertyValue::Str(v) => (None, None, Some(v.as_str())),
    }
}

impl CoverageDb for SqliteDb {
    fn backend(&self) -> Backend {
        Backend::Relational
    }

    fn identity(&self) -> String {
        match &self.path {
            Some(p) => p.display().to_string(),
            None => "sqlite::memory:".to_string(),
        }
    }

    fn storage_path(&self) -> Option<&Path> {
        self.path()
    }

    fn schema_version(&self) -> Option<&str> {
        Some(&self.schema_version)
    }

    fn root(&self) -> Result<ScopeId> {
        schema::find_root(&self.conn)
    }

    fn child_scopes(&self, parent: ScopeId, mask: ScopeMask) -> Result<Vec<ScopeId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT scope_id FROM scopes
             WHERE parent_id = ?1 AND (scope_type & ?2) != 0
             ORDER BY scope_id",
        )?;
        let ids = stmt
            .query_map(params![parent.0, mask.0 as i64], |row| row.get(0))?
            .map(|r| r.map(ScopeId))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn scope(&self, id: ScopeId) -> Result<ScopeSpec> {
        let (name, kind, flags, weight, goal, file, line) = self
            .conn
            .prepare_cached(
                "SELECT scope_name, scope_type, scope_flags, weight, goal, source_file, source_line
                 FROM scopes WHERE scope_id = ?1",
            )?
            .query_row(params![id.0], scope_from_row)
            .optional()?
            .ok_or_else(|| anyhow!("no such {id}"))?;
        let kind = ScopeKind::from_code(kind as u64)
            .ok_or_else(|| anyhow!("{id} has unknown scope type {kind:#x}"))?;
        Ok(ScopeSpec {
            name,
            kind,
            weight,
            goal,
            flags: flags as u32,
            source: source_loc(file, line),
        })
    }

    fn create_scope(&mut self, parent: ScopeId, spec: &ScopeSpec) -> Result<ScopeId> {
        if spec.kind == ScopeKind::Root {
            bail!("a database has exactly one root scope");
        }
        let (file, line) = match &spec.source {
            Some(loc) => (Some(loc.file.as_str()), Some(loc.line as i64)),
            None => (None, None),
        };
        self.conn
            .prepare_cached(
                "INSERT INTO scopes
                 (parent_id, scope_type, scope_name, scope_flags, weight, goal, source_file, source_line)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?
            .execute(params![
                parent.0,
                spec.kind.code() as i64,
                spec.name,
                spec.flags as i64,
                spec.weight,
                spec.goal,
                file,
                line
            ])
            .with_context(|| format!("create scope {} under {parent}", spec.name))?;
        Ok(ScopeId(self.conn.last_insert_rowid()))
    }

    fn cover_items(&self, scope: ScopeId, mask: CoverMask) -> Result<Vec<CoverId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT cover_id FROM coveritems
             WHERE scope_id = ?1 AND (cover_type & ?2) != 0
             ORDER BY cover_id",
        )?;
        let ids = stmt
            .query_map(params![scope.0, mask.0 as i64], |row| row.get(0))?
            .map(|r| r.map(CoverId))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn cover_item(&self, id: CoverId) -> Result<CoverItemSpec> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT cover_name, cover_type, cover_data, at_least, weight, goal, cover_flags,
                    source_file, source_line
             FROM coveritems WHERE cover_id = ?1",
        )?;
        let row = stmt
            .query_row(params![id.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<i64>>(8)?,
                ))
            })
            .optional()?
            .ok_or_else(|| anyhow!("no such {id}"))?;
        let (name, cover_type, data, at_least, weight, goal, flags, file, line) = row;
        let cover_type = CoverType::from_code(cover_type as u64)
            .ok_or_else(|| anyhow!("{id} has unknown cover type {cover_type:#x}"))?;
        Ok(CoverItemSpec {
            name,
            cover_type,
            hit_count: data as u64,
            at_least: at_least as u64,
            weight,
            goal,
            flags: flags as u32,
            source: source_loc(file, line),
        })
    }

    fn set_hit_count(&mut self, id: CoverId, hit_count: u64) -> Result<()> {
        let changed = self
            .conn
            .prepare_cached("UPDATE coveritems SET cover_data = ?1 WHERE cover_id = ?2")?
            .execute(params![hit_count as i64, id.0])?;
        if changed != 1 {
            bail!("no such {id}");
        }
        Ok(())
    }

    fn create_cover_item(&mut self, scope: ScopeId, spec: &CoverItemSpec) -> Result<CoverId> {
        let (file, line) = match &spec.source {
            Some(loc) => (Some(loc.file.as_str()), Some(loc.line as i64)),
            None => (None, None),
        };
        self.conn
            .prepare_cached(
                "INSERT INTO coveritems
                 (scope_id, cover_index, cover_type, cover_name, cover_flags, cover_data,
                  at_least, weight, goal, source_file, source_line)
                 VALUES (?1,
                         (SELECT COALESCE(MAX(cover_index), -1) + 1 FROM coveritems WHERE scope_id = ?1),
                         ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?
            .execute(params![
                scope.0,
                spec.cover_type.code() as i64,
                spec.name,
                spec.flags as i64,
                spec.hit_count as i64,
                spec.at_least as i64,
                spec.weight,
                spec.goal,
                file,
                line
            ])
            .with_context(|| format!("create cover item {} in {scope}", spec.name))?;
        Ok(CoverId(self.conn.last_insert_rowid()))
    }

    fn scope_properties(&self, scope: ScopeId) -> Result<Vec<(String, PropertyValue)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT property_key, property_type, int_value, real_value, string_value
             FROM scope_properties WHERE scope_id = ?1 ORDER BY property_key",
        )?;
        let rows = stmt
            .query_map(params![scope.0], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(key, t, i, r, s)| Ok((key, read_property(t, i, r, s)?)))
            .collect()
    }

    fn set_scope_property(
        &mut self,
        scope: ScopeId,
        key: &str,
        value: &PropertyValue,
    ) -> Result<()> {
        let (int_value, real_value, string_value) = property_columns(value);
        self.conn
            .prepare_cached(
                "INSERT OR REPLACE INTO scope_properties
                 (scope_id, property_key, property_type, int_value, real_value, string_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?
            .execute(params![
                scope.0,
                key,
                value.type_code(),
                int_value,
                real_value,
                string_value
            ])
            .with_context(|| format!("set property {key} on {scope}"))?;
        Ok(())
    }

    fn history_nodes(&self, kind: Option<HistoryKind>) -> Result<Vec<HistoryId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT history_id FROM history_nodes
             WHERE ?1 IS NULL OR history_kind = ?1
             ORDER BY history_id",
        )?;
        let ids = stmt
            .query_map(params![kind.map(HistoryKind::code)], |row| row.get(0))?
            .map(|r| r.map(HistoryId))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn history_node(&self, id: HistoryId) -> Result<HistoryRecord> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT history_kind, logical_name, physical_name, parent_id, test_status,
                    seed, cmd_line, date, user_name
             FROM history_nodes WHERE history_id = ?1",
        )?;
        let row = stmt
            .query_row(params![id.0], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            })
            .optional()?
            .ok_or_else(|| anyhow!("no such {id}"))?;
        let (kind, logical_name, physical_name, parent, status, seed, cmd, date, user_name) = row;
        Ok(HistoryRecord {
            kind: HistoryKind::from_code(kind)
                .ok_or_else(|| anyhow!("{id} has unknown history kind {kind}"))?,
            logical_name,
            physical_name,
            parent: parent.map(HistoryId),
            test_status: status
                .and_then(TestStatus::from_code)
                .unwrap_or_default(),
            seed,
            cmd,
            date,
            user_name,
        })
    }

    fn create_history_node(&mut self, record: &HistoryRecord) -> Result<HistoryId> {
        self.conn
            .prepare_cached(
                "INSERT INTO history_nodes
                 (parent_id, history_kind, logical_name, physical_name, test_status,
                  seed, cmd_line, date, user_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?
            .execute(params![
                record.parent.map(|p| p.0),
                record.kind.code(),
                record.logical_name,
                record.physical_name,
                record.test_status.code(),
                record.seed,
                record.cmd,
                record.date,
                record.user_name
            ])
            .with_context(|| format!("create history record {}", record.logical_name))?;
        Ok(HistoryId(self.conn.last_insert_rowid()))
    }

    fn history_int_property(&self, id: HistoryId, key: &str) -> Result<Option<i64>> {
        let value: Option<Option<i64>> = self
            .conn
            .prepare_cached(
                "SELECT int_value FROM history_properties
                 WHERE history_id = ?1 AND property_key = ?2",
            )?
            .query_row(params![id.0, key], |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }

    fn set_history_int_property(&mut self, id: HistoryId, key: &str, value: i64) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT OR REPLACE INTO history_properties
                 (history_id, property_key, property_type, int_value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![id.0, key, PropertyValue::Int(0).type_code(), value])
            .with_context(|| format!("set property {key} on {id}"))?;
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<bool> {
        if self.in_transaction() {
            return Ok(false);
        }
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .context("begin write transaction")?;
        Ok(true)
    }

    fn commit_transaction(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").context("commit")
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK").context("rollback")
    }
}
