//! cmsync CLI Binary
//!
//! Inspection commands for a synchronized folder: the filtered local tree
//! and the stored mapping from the last sync.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cmsync::config::{ConfigLoader, SyncConfig};
use cmsync::filter::IgnoreFilters;
use cmsync::fs::NativeFileSystem;
use cmsync::logging::init_logging;
use cmsync::report;
use cmsync::store::{
    MetaDataStorage, PathMatcher, SledIgnoredEntitiesStorage, SledMetaDataStorage, StoredSnapshot,
};
use cmsync::tree::LocalTreeBuilder;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "cmsync")]
#[command(about = "Inspect the state of a folder synchronized with a content repository")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file used instead of the layered lookup
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the local folder and print the entries that would be synchronized
    Scan {
        dir: PathBuf,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Load, validate and print the stored mapping records
    Snapshot {
        dir: PathBuf,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List remote folders recorded as fully ignored
    Ignored { dir: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<String> {
    let dir = match &cli.command {
        Commands::Scan { dir, .. } | Commands::Snapshot { dir, .. } | Commands::Ignored { dir } => {
            dunce::canonicalize(dir).with_context(|| format!("Cannot open {}", dir.display()))?
        }
    };
    let mut config = load_config(cli.config.as_deref(), &dir)?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_logging(Some(&config.logging)).context("Failed to initialize logging")?;

    match &cli.command {
        Commands::Scan { format, .. } => scan(&dir, &config, *format),
        Commands::Snapshot { format, .. } => snapshot(&dir, &config, *format),
        Commands::Ignored { .. } => ignored(&dir, &config),
    }
}

fn load_config(file: Option<&Path>, dir: &Path) -> Result<SyncConfig> {
    let config = match file {
        Some(file) => ConfigLoader::load_from_file(file),
        None => ConfigLoader::load(dir),
    };
    config.context("Failed to load configuration")
}

fn scan(dir: &Path, config: &SyncConfig, format: OutputFormat) -> Result<String> {
    let fs = NativeFileSystem::new();
    let filters = IgnoreFilters::new(config.filters.clone());
    let tree = LocalTreeBuilder::new(&fs, &filters).build(dir)?;
    let rows = report::scan_rows(&tree);
    Ok(match format {
        OutputFormat::Text => report::format_scan_text(&rows),
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&rows)?),
    })
}

fn open_db(dir: &Path, config: &SyncConfig) -> Result<sled::Db> {
    let path = config.storage.resolve_path(dir)?;
    if !path.exists() {
        anyhow::bail!("No metadata store at {}", path.display());
    }
    sled::open(&path).with_context(|| format!("Failed to open metadata store {}", path.display()))
}

fn snapshot(dir: &Path, config: &SyncConfig, format: OutputFormat) -> Result<String> {
    let db = open_db(dir, config)?;
    let matcher = PathMatcher::new(dir, config.repository.root_path.clone());
    let storage = SledMetaDataStorage::from_db(&db, matcher)?
        .with_strict_validation(config.storage.strict_validation);
    let snapshot = StoredSnapshot::from_objects(storage.get_object_list()?)
        .context("Stored snapshot is inconsistent")?;
    let rows = report::snapshot_rows(&snapshot, storage.path_matcher());
    Ok(match format {
        OutputFormat::Text => report::format_snapshot_text(&rows),
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&rows)?),
    })
}

fn ignored(dir: &Path, config: &SyncConfig) -> Result<String> {
    let db = open_db(dir, config)?;
    let ignored = SledIgnoredEntitiesStorage::from_db(&db)?;
    let mut out = String::new();
    for entity in ignored.list()? {
        let path = entity
            .local_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!("{}\t{}\n", entity.object_id, path));
    }
    if out.is_empty() {
        out.push_str("No ignored folders.\n");
    }
    Ok(out)
}
