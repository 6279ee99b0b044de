//! Attaching a source file to the target connection.

use anyhow::{Context, Result};
use covdb_sqlite::{SqliteDb, read_only_uri};
use rusqlite::{Connection, params};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub const SOURCE_SCHEMA: &str = "src";

/// Bounded fixed-delay retry for `DETACH`, which fails transiently while a
/// statement on the attached schema is still being finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetachPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl DetachPolicy {
    pub fn new(retries: u32, delay_ms: u64) -> Self {
        Self {
            retries,
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Attach `path` read-only as the `src` schema.
pub fn attach(conn: &Connection, path: &Path) -> Result<()> {
    let uri = read_only_uri(path)?;
    conn.execute(&format!("ATTACH DATABASE ?1 AS {SOURCE_SCHEMA}"), params![uri])
        .with_context(|| format!("attach {}", path.display()))?;
    debug!(uri = %uri, "attached source");
    Ok(())
}

fn already_detached(err: &rusqlite::Error) -> bool {
    err.to_string().contains("no such database")
}

/// Detach the `src` schema. Never fails: a schema that is already gone is
/// fine, and one that stays locked past the retries is logged and left for
/// the connection to drop.
pub fn detach(conn: &Connection, policy: DetachPolicy) {
    let mut attempt = 0u32;
    loop {
        match conn.execute_batch(&format!("DETACH DATABASE {SOURCE_SCHEMA}")) {
            Ok(()) => return,
            Err(e) if already_detached(&e) => return,
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                debug!(attempt, error = %e, "detach failed, retrying");
                thread::sleep(policy.delay);
            }
            Err(e) => {
                warn!(attempts = attempt + 1, error = %e, "could not detach source schema");
                return;
            }
        }
    }
}

/// Run `f` with `path` attached to `target`, detaching afterwards whatever
/// `f` returns.
pub fn with_attached<T>(
    target: &mut SqliteDb,
    path: &Path,
    policy: DetachPolicy,
    f: impl FnOnce(&mut SqliteDb) -> Result<T>,
) -> Result<T> {
    attach(target.conn(), path)?;
    let result = f(target);
    detach(target.conn(), policy);
    result
}
