//! Binary entrypoint for the invkeeper CLI.
//!
//! Commands:
//! - `init` - create a starter `invkeeper.toml`
//! - `validate` - load the config and build the group registry, reporting
//!   fatal configuration errors
//! - `status` - summarize stored snapshots per group
//! - `players` - list every player UUID with stored data
//! - `inspect` - print one stored snapshot as JSON
//! - `backup` / `backups` / `verify` / `restore` - archive management
//!
//! The CLI operates on the data directory only; live synchronization runs
//! inside the host game server via the library crate (`invkeeper::`).
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use invkeeper::config::Config;
use invkeeper::snapshot::{GameMode, InventoryBucket, SnapshotKey};
use invkeeper::storage::backup::BackupManager;
use invkeeper::storage::{SledSnapshotStore, SnapshotStore};

#[derive(Parser)]
#[command(name = "invkeeper")]
#[command(about = "Per-group inventory synchronization for multi-world game servers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "invkeeper.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration file
    Init,
    /// Load the configuration and validate the group registry
    Validate,
    /// Show stored-data statistics per group
    Status,
    /// List every player UUID with stored snapshots
    Players,
    /// Print one stored snapshot as JSON
    Inspect {
        /// Player UUID
        player: String,
        /// Group name
        group: String,
        /// Restrict to one game-mode bucket (survival, creative, adventure, spectator)
        #[arg(long)]
        mode: Option<String>,
    },
    /// Archive the data directory
    Backup {
        /// Optional label stored with the backup
        #[arg(short, long)]
        name: Option<String>,
        /// After archiving, keep only the newest N backups
        #[arg(long)]
        prune: Option<usize>,
    },
    /// List existing backups
    Backups,
    /// Re-check one backup's checksum
    Verify {
        /// Backup id as shown by `backups`
        id: String,
    },
    /// Unpack a backup into a directory
    Restore {
        /// Backup id as shown by `backups`
        id: String,
        /// Target directory; defaults to `<data_dir>-restore`
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn init_logging(config: Option<&Config>, verbose: u8) {
    let filter = match verbose {
        0 => config
            .map(|c| c.logging.level.clone())
            .unwrap_or_else(|| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&filter);
    let _ = builder.try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes it)
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(pre_config.as_ref(), cli.verbose);

    match cli.command {
        Commands::Init => {
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                return Err(anyhow!("{} already exists; refusing to overwrite", cli.config));
            }
            Config::create_default(&cli.config).await?;
            println!("Wrote starter configuration to {}", cli.config);
            println!("Edit the [[groups]] entries, then run `invkeeper validate`.");
        }
        Commands::Validate => {
            let config = Config::load(&cli.config).await?;
            let registry = config.build_registry()?;
            println!("Configuration OK: {} group(s)", registry.all().len());
            for group in registry.all() {
                println!(
                    "  {}{}: {} world(s), {} pattern(s)",
                    group.name,
                    if group.is_default { " [default]" } else { "" },
                    group.worlds.len(),
                    group.patterns.len()
                );
            }
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            let store = SledSnapshotStore::open(&config.service.data_dir)?;
            let keys = store.list_keys(&|_| true)?;
            let players = store.player_ids()?;

            let mut per_group: BTreeMap<String, usize> = BTreeMap::new();
            for key in &keys {
                *per_group.entry(key.group.clone()).or_default() += 1;
            }

            println!("Data directory: {}", config.service.data_dir);
            println!("Players with data: {}", players.len());
            println!("Stored snapshots: {}", keys.len());
            for (group, count) in per_group {
                let configured = config.groups.iter().any(|g| g.name == group);
                println!(
                    "  {}: {} snapshot(s){}",
                    group,
                    count,
                    if configured { "" } else { " (not in config)" }
                );
            }
        }
        Commands::Players => {
            let config = Config::load(&cli.config).await?;
            let store = SledSnapshotStore::open(&config.service.data_dir)?;
            let players = store.player_ids()?;
            for id in &players {
                println!("{}", id);
            }
            info!("{} player(s) with stored data", players.len());
        }
        Commands::Inspect {
            player,
            group,
            mode,
        } => {
            let config = Config::load(&cli.config).await?;
            let store = SledSnapshotStore::open(&config.service.data_dir)?;
            let player = Uuid::parse_str(&player)
                .map_err(|e| anyhow!("invalid player UUID {}: {}", player, e))?;

            let buckets: Vec<InventoryBucket> = match mode {
                Some(text) => {
                    let mode = text.parse::<GameMode>().map_err(|e| anyhow!(e))?;
                    vec![InventoryBucket::Mode(mode)]
                }
                None => InventoryBucket::all().to_vec(),
            };

            let mut found = false;
            for bucket in buckets {
                let key = SnapshotKey::new(player, group.clone(), bucket);
                if let Some(snapshot) = store.load(&key)? {
                    println!("# {}", key);
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                    found = true;
                }
            }
            if !found {
                println!("No snapshot stored for player {} in group {}", player, group);
            }
        }
        Commands::Backup { name, prune } => {
            let config = Config::load(&cli.config).await?;
            let mut manager = BackupManager::new(
                PathBuf::from(&config.service.data_dir),
                PathBuf::from(config.service.backup_dir()),
            )?;
            let metadata = manager.create_backup(name)?;
            println!(
                "Backup {} created ({} bytes, sha256 {})",
                metadata.id, metadata.size_bytes, metadata.checksum
            );
            if let Some(keep) = prune {
                let deleted = manager.prune(keep)?;
                for id in deleted {
                    println!("Pruned {}", id);
                }
            }
        }
        Commands::Backups => {
            let config = Config::load(&cli.config).await?;
            let manager = BackupManager::new(
                PathBuf::from(&config.service.data_dir),
                PathBuf::from(config.service.backup_dir()),
            )?;
            let backups = manager.list_backups();
            if backups.is_empty() {
                println!("No backups recorded.");
            }
            for b in backups {
                println!(
                    "{}  {}  {} bytes{}{}",
                    b.id,
                    b.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    b.size_bytes,
                    if b.verified { "  verified" } else { "" },
                    b.name.as_deref().map(|n| format!("  ({})", n)).unwrap_or_default()
                );
            }
        }
        Commands::Verify { id } => {
            let config = Config::load(&cli.config).await?;
            let mut manager = BackupManager::new(
                PathBuf::from(&config.service.data_dir),
                PathBuf::from(config.service.backup_dir()),
            )?;
            if manager.verify_backup(&id)? {
                println!("Backup {} verified", id);
            } else {
                return Err(anyhow!("backup {} failed verification", id));
            }
        }
        Commands::Restore { id, output } => {
            let config = Config::load(&cli.config).await?;
            let manager = BackupManager::new(
                PathBuf::from(&config.service.data_dir),
                PathBuf::from(config.service.backup_dir()),
            )?;
            let target = output.unwrap_or_else(|| format!("{}-restore", config.service.data_dir));
            manager.restore_backup(&id, &PathBuf::from(&target))?;
            println!("Backup {} restored to {}", id, target);
            println!("Point service.data_dir at the restored directory to use it.");
        }
    }

    Ok(())
}
