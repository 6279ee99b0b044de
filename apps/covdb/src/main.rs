use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use covdb_config::{MergeConfig, load_config};
use covdb_logging::LogLevel;
use covdb_ports::CoverageDb;
use covdb_schema::{MergeStats, RelationalMode};
use covdb_sqlite::SqliteDb;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "covdb",
    version,
    about = "Merge UCIS-style coverage databases into one."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge two or more coverage databases into OUT.
    ///
    /// The first input is the base: its tree is copied to OUT and every
    /// further input is merged into that copy.
    Merge(MergeArgs),
}

#[derive(clap::Args, Debug)]
struct MergeArgs {
    /// Input databases, merged in the order given
    inputs: Vec<PathBuf>,

    /// Output database
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Read additional inputs from FILE, one path per line
    #[arg(long)]
    file_list: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Sqlite)]
    input_format: Format,

    #[arg(long, value_enum, default_value_t = Format::Sqlite)]
    output_format: Format,

    /// Vendor library path; accepted for command-line compatibility only
    #[arg(long)]
    lib: Option<PathBuf>,

    /// Collapse merge history into a single running summary record
    #[arg(long, conflicts_with = "no_history")]
    squash_history: bool,

    /// Record no history at all
    #[arg(long)]
    no_history: bool,

    /// Set-based merge path policy
    #[arg(long)]
    relational: Option<RelationalMode>,

    /// YAML or JSON merge configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Print the merge statistics as JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Sqlite,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Merge(args) => run_merge(args),
    }
}

impl MergeArgs {
    /// Configuration file values with command-line flags layered on top.
    fn config(&self) -> Result<MergeConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => MergeConfig::default(),
        };
        if self.squash_history {
            config.create_history = true;
            config.squash_history = true;
        }
        if self.no_history {
            config.create_history = false;
            config.squash_history = false;
        }
        if let Some(mode) = self.relational {
            config.relational = mode;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        Ok(config)
    }

    fn all_inputs(&self) -> Result<Vec<PathBuf>> {
        let mut inputs = self.inputs.clone();
        if let Some(list) = &self.file_list {
            inputs.extend(read_file_list(list)?);
        }
        Ok(inputs)
    }
}

fn read_file_list(path: &Path) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read file list {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect())
}

/// Sibling path the merge is written to before it replaces OUT.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

/// Best-effort removal of a failed merge's output.
fn discard_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "could not remove partial output");
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn run_merge(args: MergeArgs) -> Result<()> {
    let config = args.config()?;
    config.logging.init()?;

    if let Some(lib) = &args.lib {
        tracing::info!(lib = %lib.display(), "--lib ignored; databases are read natively");
    }
    tracing::debug!(
        input_format = ?args.input_format,
        output_format = ?args.output_format,
        "formats"
    );

    let inputs = args.all_inputs()?;
    if inputs.len() < 2 {
        bail!(
            "at least two input databases are required (got {})",
            inputs.len()
        );
    }
    if let Some(clash) = inputs.iter().find(|p| same_file(p, &args.output)) {
        bail!("output {} is also an input", clash.display());
    }

    // Opening the base read-only first rejects files that are not coverage
    // databases before anything is written.
    let (base, rest) = (&inputs[0], &inputs[1..]);
    drop(SqliteDb::open_read_only(base).with_context(|| format!("open {}", base.display()))?);

    let sources = rest
        .iter()
        .map(|p| SqliteDb::open_read_only(p).with_context(|| format!("open {}", p.display())))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&dyn CoverageDb> = sources.iter().map(|s| s as &dyn CoverageDb).collect();

    let partial = partial_path(&args.output);
    std::fs::copy(base, &partial)
        .with_context(|| format!("copy {} to {}", base.display(), partial.display()))?;

    let merged = SqliteDb::open(&partial)
        .and_then(|mut target| covdb_merge_sql::merge_many(&mut target, &refs, &config.options()));
    let stats = match merged {
        Ok(stats) => stats,
        Err(e) => {
            discard_partial(&partial);
            return Err(e.context(format!("merge into {}", args.output.display())));
        }
    };
    std::fs::rename(&partial, &args.output)
        .with_context(|| format!("write {}", args.output.display()))?;

    tracing::info!(
        output = %args.output.display(),
        inputs = inputs.len(),
        duration_ms = stats.duration_ms,
        "merge complete"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_summary(&args.output, inputs.len(), &stats);
    }
    Ok(())
}

fn print_summary(output: &Path, inputs: usize, stats: &MergeStats) {
    println!(
        "Merged {} databases into {} ({} ms)",
        inputs,
        output.display(),
        stats.duration_ms
    );
    println!(
        "  scopes:      {} matched, {} added",
        stats.scopes_matched, stats.scopes_added
    );
    println!(
        "  cover items: {} matched, {} added, {} skipped",
        stats.cover_items_matched, stats.cover_items_added, stats.cover_items_skipped
    );
    println!("  hits added:  {}", stats.total_hits_added);
    println!(
        "  history:     {} tests, {} records",
        stats.tests_merged, stats.history_nodes_merged
    );
    println!(
        "  drivers:     {} relational, {} object",
        stats.relational_merges, stats.object_merges
    );
}
