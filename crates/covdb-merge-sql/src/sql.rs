//! Set-based merge over the coverage tables.
//!
//! Every statement reads the source through a [`SourceTables`] naming, so
//! the same SQL runs against an attached source file or against temp tables
//! staged from one. Results must match the object-graph driver row for row:
//! duplicate target siblings resolve to the lowest id, duplicate source
//! siblings collapse onto one target scope, and duplicate target bins
//! resolve to the lowest `cover_id`.

use anyhow::{Context, Result};
use covdb_ids::{HistoryId, ScopeId};
use covdb_merge::MergeError;
use covdb_schema::HistoryKind;
use rusqlite::{Connection, params};
use tracing::debug;

/// Where the source rows live on the target connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceTables {
    pub scopes: &'static str,
    pub coveritems: &'static str,
    pub history_nodes: &'static str,
    pub scope_properties: &'static str,
}

impl SourceTables {
    /// Source file attached under the `src` schema.
    pub const ATTACHED: SourceTables = SourceTables {
        scopes: "src.scopes",
        coveritems: "src.coveritems",
        history_nodes: "src.history_nodes",
        scope_properties: "src.scope_properties",
    };

    /// Source rows copied into connection-local temp tables.
    pub const STAGED: SourceTables = SourceTables {
        scopes: "temp.src_scopes",
        coveritems: "temp.src_coveritems",
        history_nodes: "temp.src_history_nodes",
        scope_properties: "temp.src_scope_properties",
    };
}

const MAPPING_DDL: &str = "
CREATE TEMP TABLE IF NOT EXISTS scope_mapping (
    src_scope_id INTEGER PRIMARY KEY,
    tgt_scope_id INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS temp.idx_scope_mapping_tgt ON scope_mapping(tgt_scope_id);
DELETE FROM temp.scope_mapping;
";

fn root_of(conn: &Connection, scopes: &str) -> Result<ScopeId> {
    let sql = format!("SELECT scope_id FROM {scopes} WHERE parent_id IS NULL");
    let mut stmt = conn.prepare(&sql)?;
    let roots = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    match roots.as_slice() {
        [root] => Ok(ScopeId(*root)),
        other => Err(MergeError::invalid(format!(
            "{scopes} holds {} root scopes, expected one",
            other.len()
        ))
        .into()),
    }
}

/// Populate `temp.scope_mapping` level by level, creating the target scopes
/// that have no counterpart.
pub fn resolve_scopes(
    conn: &Connection,
    tables: SourceTables,
    max_iterations: u32,
) -> Result<(u64, Vec<ScopeId>)> {
    let scopes = tables.scopes;
    conn.execute_batch(MAPPING_DDL)
        .context("prepare scope mapping table")?;

    let src_root = root_of(conn, scopes)?;
    let tgt_root = root_of(conn, "main.scopes")?;
    conn.execute(
        "INSERT INTO temp.scope_mapping (src_scope_id, tgt_scope_id) VALUES (?1, ?2)",
        params![src_root.0, tgt_root.0],
    )?;

    let pre_max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(scope_id), 0) FROM main.scopes",
        [],
        |row| row.get(0),
    )?;

    let match_sql = format!(
        "INSERT INTO temp.scope_mapping (src_scope_id, tgt_scope_id)
         SELECT s.scope_id, MIN(t.scope_id)
         FROM {scopes} s
         JOIN temp.scope_mapping pm ON s.parent_id = pm.src_scope_id
         JOIN main.scopes t
           ON t.parent_id = pm.tgt_scope_id
          AND t.scope_name = s.scope_name
          AND t.scope_type = s.scope_type
         WHERE s.scope_id NOT IN (SELECT src_scope_id FROM temp.scope_mapping)
         GROUP BY s.scope_id"
    );
    let create_sql = format!(
        "INSERT INTO main.scopes
         (parent_id, scope_type, scope_name, scope_flags, weight, goal, source_file, source_line)
         SELECT rep.tgt_parent, s.scope_type, s.scope_name, s.scope_flags, s.weight, s.goal,
                s.source_file, s.source_line
         FROM (
             SELECT pm.tgt_scope_id AS tgt_parent, MIN(s.scope_id) AS rep_id
             FROM {scopes} s
             JOIN temp.scope_mapping pm ON s.parent_id = pm.src_scope_id
             WHERE s.scope_id NOT IN (SELECT src_scope_id FROM temp.scope_mapping)
               AND NOT EXISTS (
                   SELECT 1 FROM main.scopes t
                   WHERE t.parent_id = pm.tgt_scope_id
                     AND t.scope_name = s.scope_name
                     AND t.scope_type = s.scope_type
               )
             GROUP BY pm.tgt_scope_id, s.scope_name, s.scope_type
         ) rep
         JOIN {scopes} s ON s.scope_id = rep.rep_id
         ORDER BY rep.rep_id"
    );

    let mut iterations = 0u32;
    loop {
        if iterations >= max_iterations {
            return Err(MergeError::invalid(format!(
                "scope tree of {scopes} is deeper than {max_iterations} levels"
            ))
            .into());
        }
        iterations += 1;
        let matched = conn.execute(&match_sql, []).context("match scopes")?;
        let created = conn.execute(&create_sql, []).context("create scopes")?;
        debug!(iteration = iterations, matched, created, "scope mapping pass");
        if matched == 0 && created == 0 {
            break;
        }
    }

    let mapped: i64 = conn.query_row("SELECT COUNT(*) FROM temp.scope_mapping", [], |row| {
        row.get(0)
    })?;
    let mut stmt =
        conn.prepare("SELECT scope_id FROM main.scopes WHERE scope_id > ?1 ORDER BY scope_id")?;
    let created = stmt
        .query_map(params![pre_max], |row| row.get::<_, i64>(0))?
        .map(|r| r.map(ScopeId))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let matched = (mapped as u64).saturating_sub(1 + created.len() as u64);
    Ok((matched, created))
}

/// Sum mapped source bins into the target: update matches, then insert the rest.
pub fn reconcile_items(conn: &Connection, tables: SourceTables) -> Result<(u64, u64, u64)> {
    let items = tables.coveritems;

    let (total, hits): (i64, i64) = conn.query_row(
        &format!(
            "SELECT COUNT(*), COALESCE(SUM(c.cover_data), 0)
             FROM {items} c JOIN temp.scope_mapping m ON c.scope_id = m.src_scope_id"
        ),
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let updated = conn
        .execute(
            &format!(
                "UPDATE main.coveritems AS tc
                 SET cover_data = tc.cover_data + (
                     SELECT SUM(c.cover_data)
                     FROM {items} c JOIN temp.scope_mapping m ON c.scope_id = m.src_scope_id
                     WHERE m.tgt_scope_id = tc.scope_id AND c.cover_name = tc.cover_name
                 )
                 WHERE tc.scope_id IN (SELECT tgt_scope_id FROM temp.scope_mapping)
                   AND EXISTS (
                     SELECT 1
                     FROM {items} c JOIN temp.scope_mapping m ON c.scope_id = m.src_scope_id
                     WHERE m.tgt_scope_id = tc.scope_id AND c.cover_name = tc.cover_name
                   )
                   AND NOT EXISTS (
                     SELECT 1 FROM main.coveritems d
                     WHERE d.scope_id = tc.scope_id
                       AND d.cover_name = tc.cover_name
                       AND d.cover_id < tc.cover_id
                   )"
            ),
            [],
        )
        .context("update matched cover items")?;

    let added = conn
        .execute(
            &format!(
                "INSERT INTO main.coveritems
                 (scope_id, cover_index, cover_type, cover_name, cover_flags, cover_data,
                  at_least, weight, goal, source_file, source_line)
                 SELECT g.tgt_scope_id,
                        COALESCE((SELECT MAX(e.cover_index) FROM main.coveritems e
                                  WHERE e.scope_id = g.tgt_scope_id), -1)
                          + ROW_NUMBER() OVER (PARTITION BY g.tgt_scope_id ORDER BY g.rep_id),
                        c.cover_type, c.cover_name, c.cover_flags, g.hits,
                        c.at_least, c.weight, c.goal, c.source_file, c.source_line
                 FROM (
                     SELECT m.tgt_scope_id AS tgt_scope_id,
                            MIN(c.cover_id) AS rep_id,
                            SUM(c.cover_data) AS hits
                     FROM {items} c JOIN temp.scope_mapping m ON c.scope_id = m.src_scope_id
                     WHERE NOT EXISTS (
                         SELECT 1 FROM main.coveritems t
                         WHERE t.scope_id = m.tgt_scope_id AND t.cover_name = c.cover_name
                     )
                     GROUP BY m.tgt_scope_id, c.cover_name
                 ) g
                 JOIN {items} c ON c.cover_id = g.rep_id
                 ORDER BY g.tgt_scope_id, g.rep_id"
            ),
            [],
        )
        .context("insert unmatched cover items")?;

    let widened: i64 = conn.query_row(
        "SELECT COUNT(*) FROM main.coveritems
         WHERE typeof(cover_data) != 'integer'
           AND scope_id IN (SELECT tgt_scope_id FROM temp.scope_mapping)",
        [],
        |row| row.get(0),
    )?;
    if widened > 0 {
        return Err(MergeError::storage(
            "reconcile cover items",
            anyhow::anyhow!("{widened} hit counts overflowed the 64-bit column"),
        )
        .into());
    }

    debug!(total, updated, added, "reconciled cover items");
    let added = added as u64;
    Ok(((total as u64).saturating_sub(added), added, hits as u64))
}

/// Last writer wins: source properties replace same-key target properties.
pub fn merge_scope_properties(conn: &Connection, tables: SourceTables) -> Result<usize> {
    let props = tables.scope_properties;
    let n = conn
        .execute(
            &format!(
                "INSERT OR REPLACE INTO main.scope_properties
                 (scope_id, property_key, property_type, int_value, real_value, string_value)
                 SELECT m.tgt_scope_id, p.property_key, p.property_type,
                        p.int_value, p.real_value, p.string_value
                 FROM {props} p JOIN temp.scope_mapping m ON p.scope_id = m.src_scope_id
                 ORDER BY p.scope_id"
            ),
            [],
        )
        .context("merge scope properties")?;
    Ok(n)
}

pub fn count_tests(conn: &Connection, tables: SourceTables) -> Result<u64> {
    let n: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE history_kind = ?1",
            tables.history_nodes
        ),
        params![HistoryKind::Test.code()],
        |row| row.get(0),
    )?;
    Ok(n as u64)
}

/// Copy every source TEST record under the MERGE record `parent`.
pub fn copy_tests(conn: &Connection, tables: SourceTables, parent: HistoryId) -> Result<u64> {
    let n = conn
        .execute(
            &format!(
                "INSERT INTO main.history_nodes
                 (parent_id, history_kind, logical_name, physical_name, test_status,
                  seed, cmd_line, date, user_name)
                 SELECT ?1, history_kind, logical_name, physical_name, test_status,
                        seed, cmd_line, date, user_name
                 FROM {}
                 WHERE history_kind = ?2
                 ORDER BY history_id",
                tables.history_nodes
            ),
            params![parent.0, HistoryKind::Test.code()],
        )
        .context("copy test records")?;
    Ok(n as u64)
}
