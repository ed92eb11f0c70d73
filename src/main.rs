//! # ScrumBot
//!
//! Daily scrum bot for the Dooray messenger: one stand-up schedule per
//! channel, asynchronous status collection and a daily report.
//!
//! Usage:
//!   scrumbot                          # Start gateway + scheduler
//!   scrumbot --port 8080              # Custom port
//!   scrumbot --config ./scrumbot.toml # Explicit config file
//!   scrumbot --init-db                # Create the database schema and exit

use anyhow::Result;
use clap::Parser;
use scrumbot_channels::MessengerClient;
use scrumbot_core::config::ScrumBotConfig;
use scrumbot_gateway::AppState;
use scrumbot_scheduler::{ScrumContext, ScrumDb, spawn_scheduler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scrumbot", version, about = "📅 ScrumBot: daily scrum bot")]
struct Cli {
    /// Config file (defaults to $SCRUMBOT_CONFIG, then ~/.scrumbot/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Database path
    #[arg(long)]
    db: Option<String>,

    /// Create the database schema and exit
    #[arg(long)]
    init_db: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn load_config(cli: &Cli) -> Result<ScrumBotConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var("SCRUMBOT_CONFIG").ok())
        .map(|p| PathBuf::from(expand_path(&p)));

    let mut config = match path {
        Some(path) => ScrumBotConfig::load_from(&path)?.with_env_overrides(),
        None => ScrumBotConfig::load()?,
    };

    if let Some(host) = &cli.host {
        config.gateway.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "scrumbot=debug,scrumbot_gateway=debug,scrumbot_scheduler=debug,tower_http=debug"
    } else {
        "scrumbot=info,scrumbot_gateway=info,scrumbot_scheduler=info,scrumbot_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(&cli)?;

    let db_path = expand_path(&config.database.path);
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(ScrumDb::open(Path::new(&db_path))?);

    if cli.init_db {
        println!("✅ Database ready: {db_path}");
        return Ok(());
    }

    if config.app_token.is_empty() {
        tracing::warn!("⚠️  No app token configured; every command will be rejected. Set SCRUMBOT_APP_TOKEN.");
    }

    let notifier: Arc<dyn scrumbot_core::Notifier> =
        Arc::new(MessengerClient::new(config.messenger.clone()));

    if config.scheduler.enabled {
        spawn_scheduler(
            ScrumContext::new(db.clone(), notifier.clone()),
            config.scheduler.check_interval_ms,
        );
    } else {
        tracing::info!("⏸️ Scheduler disabled by config");
    }

    println!("📅 ScrumBot v{}", env!("CARGO_PKG_VERSION"));
    println!("   🌐 Gateway:  http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   🗄️  Database: {db_path}");
    println!();

    scrumbot_gateway::start(AppState::new(config, db, notifier)).await
}
