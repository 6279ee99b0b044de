//! Runs the same merge through both drivers and compares the outcome.
//!
//! The object-graph driver and the relational bulk driver must leave the
//! target with the same scopes, the same summed hits and the same history
//! counts, and must report the same counters. Timings and the per-driver
//! tallies are excluded from the comparison.

use crate::snapshot::{Snapshot, snapshot};
use crate::{DbSpec, memory_db, sqlite_db};
use anyhow::{Context, Result, ensure};
use covdb_ports::CoverageDb;
use covdb_schema::{MergeOptions, MergeStats, RelationalMode};
use covdb_sqlite::SqliteDb;
use std::path::Path;
use tempfile::TempDir;

/// Outcome of one driver run.
#[derive(Clone, Debug, PartialEq)]
pub struct DriverRun {
    pub snapshot: Snapshot,
    pub stats: MergeStats,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CrossCheck {
    pub object: DriverRun,
    pub relational: DriverRun,
}

impl CrossCheck {
    /// Fail with a readable diff description when the drivers disagree.
    pub fn ensure_equivalent(&self) -> Result<()> {
        ensure!(
            self.object.snapshot == self.relational.snapshot,
            "target contents differ\nobject:     {:?}\nrelational: {:?}",
            self.object.snapshot,
            self.relational.snapshot
        );
        ensure!(
            self.object.stats.counters() == self.relational.stats.counters(),
            "stats differ\nobject:     {:?}\nrelational: {:?}",
            self.object.stats,
            self.relational.stats
        );
        Ok(())
    }
}

fn write_files(dir: &Path, target: &DbSpec, sources: &[DbSpec]) -> Result<(SqliteDb, Vec<SqliteDb>)> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let tgt = sqlite_db(&dir.join("target.cdb"), target)?;
    let mut srcs = Vec::with_capacity(sources.len());
    for (i, spec) in sources.iter().enumerate() {
        let path = dir.join(format!("src{i}.cdb"));
        drop(sqlite_db(&path, spec)?);
        srcs.push(SqliteDb::open_read_only(&path)?);
    }
    Ok((tgt, srcs))
}

fn as_dyn(sources: &[SqliteDb]) -> Vec<&dyn CoverageDb> {
    sources.iter().map(|s| s as &dyn CoverageDb).collect()
}

/// Object-graph driver over database files in `dir`.
pub fn run_object_driver(
    dir: &Path,
    target: &DbSpec,
    sources: &[DbSpec],
    options: &MergeOptions,
) -> Result<DriverRun> {
    let (mut tgt, srcs) = write_files(dir, target, sources)?;
    let stats = covdb_merge::merge_many(&mut tgt, &as_dyn(&srcs), options)?;
    Ok(DriverRun {
        snapshot: snapshot(&tgt)?,
        stats,
    })
}

/// Relational driver over database files in `dir`. Every source must take
/// the relational path.
pub fn run_relational_driver(
    dir: &Path,
    target: &DbSpec,
    sources: &[DbSpec],
    options: &MergeOptions,
) -> Result<DriverRun> {
    let (mut tgt, srcs) = write_files(dir, target, sources)?;
    let options = options.clone().with_relational(RelationalMode::Required);
    let stats = covdb_merge_sql::merge_many(&mut tgt, &as_dyn(&srcs), &options)?;
    Ok(DriverRun {
        snapshot: snapshot(&tgt)?,
        stats,
    })
}

/// Object-graph driver with every database held in memory.
pub fn run_object_in_memory(
    target: &DbSpec,
    sources: &[DbSpec],
    options: &MergeOptions,
) -> Result<DriverRun> {
    let mut tgt = memory_db("target", target)?;
    let srcs = sources
        .iter()
        .enumerate()
        .map(|(i, spec)| memory_db(&format!("src{i}"), spec))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&dyn CoverageDb> = srcs.iter().map(|s| s as &dyn CoverageDb).collect();
    let stats = covdb_merge::merge_many(&mut tgt, &refs, options)?;
    Ok(DriverRun {
        snapshot: snapshot(&tgt)?,
        stats,
    })
}

/// Merge `sources` into `target` once per driver, each in its own scratch
/// directory.
pub fn cross_check(target: &DbSpec, sources: &[DbSpec], options: &MergeOptions) -> Result<CrossCheck> {
    let dir = TempDir::new().context("create scratch dir")?;
    let object = run_object_driver(&dir.path().join("object"), target, sources, options)?;
    let relational = run_relational_driver(&dir.path().join("relational"), target, sources, options)?;
    Ok(CrossCheck { object, relational })
}
