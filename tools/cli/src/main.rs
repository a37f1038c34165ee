//! jsonloc CLI - drive the location registry and document sync from a terminal.
//!
//! The CLI plays the host: module roots, the active theme and the scratch
//! base directory come from a JSON manifest. Each invocation is one request.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use jsonloc_common::DocumentId;
use jsonloc_locations::StaticHost;
use jsonloc_sync::{DocumentSnapshot, LocationManager, ManagerConfig};

#[derive(Parser)]
#[command(name = "jsonloc")]
#[command(about = "jsonloc - per-module document locations with a merged staging cache")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Host manifest describing modules, theme and scratch directory.
    #[arg(short, long, global = true, default_value = "jsonloc-host.json")]
    manifest: PathBuf,

    /// Configuration file (default: <config dir>/jsonloc/config.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered locations.
    Locations {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Discover locations and rebuild the staging cache.
    Rebuild,

    /// Remove the staging cache.
    Purge,

    /// Save a document into a location.
    Save {
        /// Document id (file name stem).
        #[arg(short, long)]
        id: String,

        /// Location key. Omit to see the no-location error.
        #[arg(short, long)]
        key: Option<String>,

        /// File holding the document payload.
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Delete a document from a location.
    Delete {
        /// Document id.
        #[arg(short, long)]
        id: String,

        /// Location key.
        #[arg(short, long)]
        key: String,
    },

    /// Mark a document as trashed (the file stays in place).
    Trash {
        /// Document id.
        #[arg(short, long)]
        id: String,

        /// Location key.
        #[arg(short, long)]
        key: String,
    },

    /// Restore a trashed document, removing stray copies elsewhere.
    Untrash {
        /// Document id.
        #[arg(short, long)]
        id: String,

        /// Location key.
        #[arg(short, long)]
        key: String,

        /// File holding the document snapshot.
        #[arg(short, long)]
        source: PathBuf,

        /// Last-modified time to stamp (RFC 3339, default: now).
        #[arg(long)]
        modified: Option<String>,
    },

    /// Show which locations hold a document.
    Status {
        /// Document id.
        #[arg(short, long)]
        id: String,
    },

    /// Write the effective configuration to the config file.
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = ManagerConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    if let Commands::InitConfig = cli.command {
        return cmd_init_config(&config, &config_path);
    }

    let manager = open_manager(&cli.manifest, config)?;

    match cli.command {
        Commands::Locations { json } => cmd_locations(&manager, json),
        Commands::Rebuild => cmd_rebuild(&manager).await,
        Commands::Purge => cmd_purge(&manager).await,
        Commands::Save { id, key, source } => cmd_save(&manager, &id, key.as_deref(), &source).await,
        Commands::Delete { id, key } => cmd_delete(&manager, &id, &key).await,
        Commands::Trash { id, key } => cmd_trash(&manager, &id, &key).await,
        Commands::Untrash {
            id,
            key,
            source,
            modified,
        } => cmd_untrash(&manager, &id, &key, &source, modified.as_deref()).await,
        Commands::Status { id } => cmd_status(&manager, &id).await,
        Commands::InitConfig => Ok(()),
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jsonloc")
        .join("config.json")
}

/// Build a manager from the manifest and run discovery.
fn open_manager(manifest: &Path, config: ManagerConfig) -> Result<LocationManager> {
    let host = StaticHost::load(manifest)
        .with_context(|| format!("Failed to load manifest {}", manifest.display()))?;
    let manager =
        LocationManager::new(config, Arc::new(host)).context("Invalid configuration")?;
    manager.discover();
    Ok(manager)
}

fn parse_id(id: &str) -> Result<DocumentId> {
    DocumentId::new(id).context("Invalid document id")
}

/// Write the effective configuration.
fn cmd_init_config(config: &ManagerConfig, path: &Path) -> Result<()> {
    config
        .save(path)
        .with_context(|| format!("Failed to write config {}", path.display()))?;
    println!("Configuration written to {}", path.display());
    Ok(())
}

/// List locations.
fn cmd_locations(manager: &LocationManager, json: bool) -> Result<()> {
    let locations = manager.registry().list();

    if json {
        println!("{}", serde_json::to_string_pretty(&locations)?);
        return Ok(());
    }

    if locations.is_empty() {
        println!(
            "No locations found. Create a '{}' directory in a module.",
            manager.config().subdirectory_name
        );
    } else {
        println!("Locations:");
        for location in locations {
            println!(
                "  {:<24} {:<13} {}  ({})",
                location.key.as_str(),
                location.kind.as_str(),
                location.label,
                location.path.display()
            );
        }
    }
    Ok(())
}

/// Rebuild the staging cache.
async fn cmd_rebuild(manager: &LocationManager) -> Result<()> {
    let report = manager.rebuild().await.context("Failed to rebuild staging cache")?;

    println!("Staging cache: {}", manager.cache().path().display());
    println!("  Copied: {}/{}", report.copied, report.total);
    println!("  Failed: {}", report.failed);
    println!("  Removed stale: {}", report.removed);
    if report.skipped_locations > 0 {
        println!("  Unreadable locations: {}", report.skipped_locations);
    }
    if !report.is_complete(manager.config().max_copy_failure_ratio) {
        anyhow::bail!("Staging cache is incomplete");
    }
    Ok(())
}

/// Purge the staging cache.
async fn cmd_purge(manager: &LocationManager) -> Result<()> {
    manager.end_session().await.context("Failed to purge staging cache")?;
    println!("Staging cache removed: {}", manager.cache().path().display());
    Ok(())
}

/// Save a document.
async fn cmd_save(
    manager: &LocationManager,
    id: &str,
    key: Option<&str>,
    source: &Path,
) -> Result<()> {
    let id = parse_id(id)?;
    info!("Saving {} from {}", id, source.display());

    let payload = tokio::fs::read(source)
        .await
        .context("Failed to read source file")?;
    let path = manager
        .engine()
        .save(&id, &payload, key)
        .await
        .context("Failed to save document")?;

    println!("Saved {} ({} bytes) to {}", id, payload.len(), path.display());
    Ok(())
}

/// Delete a document.
async fn cmd_delete(manager: &LocationManager, id: &str, key: &str) -> Result<()> {
    let id = parse_id(id)?;
    manager
        .engine()
        .delete(&id, key)
        .await
        .context("Failed to delete document")?;
    println!("Deleted {} from {}", id, key);
    Ok(())
}

/// Trash a document.
async fn cmd_trash(manager: &LocationManager, id: &str, key: &str) -> Result<()> {
    let id = parse_id(id)?;
    manager
        .engine()
        .trash(&id, key)
        .await
        .context("Failed to trash document")?;
    println!("Trashed {} (file kept in {})", id, key);
    Ok(())
}

/// Restore a document from trash.
async fn cmd_untrash(
    manager: &LocationManager,
    id: &str,
    key: &str,
    source: &Path,
    modified: Option<&str>,
) -> Result<()> {
    let id = parse_id(id)?;
    let modified: DateTime<Utc> = match modified {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .context("Invalid --modified timestamp")?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let payload = tokio::fs::read(source)
        .await
        .context("Failed to read source file")?;

    manager
        .engine()
        .untrash(&id, &DocumentSnapshot::new(payload, modified), key)
        .await
        .context("Failed to restore document")?;
    println!("Restored {} in {}", id, key);
    Ok(())
}

/// Show where a document lives.
async fn cmd_status(manager: &LocationManager, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let holders = manager.engine().locate(&id).await;

    match holders.as_slice() {
        [] => println!("{}: not stored in any location", id),
        [only] => println!("{}: {} ({})", id, only.key, only.path.display()),
        many => {
            println!("{}: {} copies (expected at most one)", id, many.len());
            for location in many {
                println!("  {} ({})", location.key, location.path.display());
            }
        }
    }
    Ok(())
}
