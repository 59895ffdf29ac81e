use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use label_playlist_sync as lib;
use lib::api::spotify::SpotifyProvider;
use lib::api::Provider;
use lib::config::Config;
use lib::plan::{plan_playlist_update, SyncMode};
use lib::sync::SyncOptions;
use std::path::{Path, PathBuf};
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "label-playlist-sync", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate config file and exit
    ConfigValidate,
    /// Register a label; creates its playlist unless --playlist-id is given
    AddLabel {
        #[arg(long)]
        name: String,
        #[arg(long)]
        playlist_id: Option<String>,
    },
    /// List registered labels
    Labels,
    /// Print the edits turning one tracklist file into another (no network)
    Plan {
        /// Desired tracklist, one track id or URI per line
        #[arg(long)]
        target: PathBuf,
        /// Current tracklist, same format
        #[arg(long)]
        current: PathBuf,
        #[arg(long, value_enum, default_value_t = SyncMode::Diff)]
        mode: SyncMode,
        #[arg(long, default_value_t = 100)]
        max_batch_size: usize,
    },
    /// Sync a label's playlist to a tracklist file
    Sync {
        #[arg(long)]
        label: String,
        #[arg(long)]
        target: PathBuf,
        /// Overrides sync_mode from the config
        #[arg(long, value_enum)]
        mode: Option<SyncMode>,
    },
    /// Store the live tracklist of a playlist under its snapshot id
    RecordSnapshot {
        #[arg(long)]
        playlist_id: String,
    },
    /// Print the tracks of a stored snapshot
    ShowSnapshot {
        #[arg(long)]
        id: String,
    },
}

fn init_logging(log_dir: Option<&Path>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    // Bridge `log` records (provider code) into tracing.
    let _ = LogTracer::init();
    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("creating log dir {}", dir.display()))?;
            let file_appender: RollingFileAppender = tracing_appender::rolling::daily(dir, "label-playlist-sync.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(non_blocking))
                .with(fmt::layer().with_writer(std::io::stderr));
            tracing_subscriber_global::set_global_default(subscriber)
                .context("setting global tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr));
            tracing_subscriber_global::set_global_default(subscriber)
                .context("setting global tracing subscriber")?;
            Ok(None)
        }
    }
}

fn spotify_provider(cfg: &Config) -> Result<SpotifyProvider> {
    // Empty client credentials are loaded from the DB
    let provider = SpotifyProvider::new(String::new(), String::new(), cfg.db_path.clone())
        .with_timeout(cfg.request_timeout())?
        .with_user_id(cfg.spotify_user_id.clone());
    if !provider.is_authenticated() {
        return Err(anyhow!("no Spotify client credentials stored in {}", cfg.db_path.display()));
    }
    Ok(provider)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Plan { target, current, mode, max_batch_size } = &cli.command {
        let _ = init_logging(None)?;
        let target = lib::util::read_track_ids(target)?;
        let current = lib::util::read_track_ids(current)?;
        let plan = plan_playlist_update(&target, &current, *mode, *max_batch_size)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    // Resolve config path: explicit --config overrides; otherwise prefer
    // system-wide /etc/label-playlist-sync/config.toml and fall back to the
    // per-user config directory.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let etc_path = Path::new("/etc/label-playlist-sync/config.toml");
            if etc_path.exists() {
                etc_path.to_path_buf()
            } else {
                dirs::config_dir()
                    .map(|d| d.join("label-playlist-sync").join("config.toml"))
                    .unwrap_or_else(|| PathBuf::from("config.toml"))
            }
        }
    };

    let cfg = match Config::from_path(&resolved_config_path) {
        Ok(cfg) => cfg,
        Err(e) if matches!(cli.command, Commands::ConfigValidate) => {
            eprintln!("Config validation failed: {}", e);
            std::process::exit(2);
        }
        Err(e) => return Err(e).with_context(|| format!("loading config from {}", resolved_config_path.display())),
    };
    let _guard = init_logging(Some(&cfg.log_dir))?;

    match cli.command {
        Commands::ConfigValidate => println!("OK"),
        Commands::AddLabel { name, playlist_id } => {
            let conn = lib::db::open_or_create(&cfg.db_path)?;
            if lib::db::get_label(&conn, &name)?.is_some() {
                return Err(anyhow!("label {} already exists", name));
            }
            let playlist_id = match playlist_id {
                Some(id) => id,
                None => {
                    let provider = spotify_provider(&cfg)?;
                    let existing = provider.user_playlists().await?.into_iter().find(|p| p.name == name);
                    match existing {
                        Some(p) => {
                            tracing::info!("Playlist {} already exists, reusing {}", name, p.id);
                            p.id
                        }
                        None => provider.create_playlist(&name, &format!("All {} releases", name)).await?.id,
                    }
                }
            };
            lib::db::add_label(&conn, &name, &playlist_id)?;
            println!("Added label {} -> playlist {}", name, playlist_id);
        }
        Commands::Labels => {
            let conn = lib::db::open_or_create(&cfg.db_path)?;
            for label in lib::db::list_labels(&conn)? {
                println!("- {} ({})", label.name, label.playlist_id);
            }
        }
        Commands::Sync { label, target, mode } => {
            let conn = lib::db::open_or_create(&cfg.db_path)?;
            let label = lib::db::get_label(&conn, &label)?.ok_or_else(|| anyhow!("unknown label {}", label))?;
            drop(conn);
            let target = lib::util::read_track_ids(&target)?;
            let mut options = SyncOptions::from_config(&cfg);
            if let Some(m) = mode {
                options = options.with_mode(m);
            }
            let provider = spotify_provider(&cfg)?;
            let snapshot_id = lib::sync::update_label_playlist(&cfg.db_path, &provider, &label, &target, &options)
                .await
                .with_context(|| format!("syncing playlist of label {}", label.name))?;
            println!("Playlist {} now at snapshot {}", label.playlist_id, snapshot_id);
        }
        Commands::RecordSnapshot { playlist_id } => {
            lib::db::open_or_create(&cfg.db_path)?;
            let provider = spotify_provider(&cfg)?;
            let snapshot_id =
                lib::sync::record_playlist_snapshot(&cfg.db_path, &provider, &playlist_id, &cfg.retry_policy()).await?;
            println!("{}", snapshot_id);
        }
        Commands::ShowSnapshot { id } => {
            let conn = lib::db::open_or_create(&cfg.db_path)?;
            for track_id in lib::db::get_snapshot(&conn, &id)? {
                println!("{}", track_id);
            }
        }
        // handled before config loading
        Commands::Plan { .. } => {}
    }

    Ok(())
}
