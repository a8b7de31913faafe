use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use duetto_server::config::{FileConfig, MatchingConfig};
use duetto_server::realtime::ChannelNotifier;
use duetto_server::{
    run_server, RequestsLoggingLevel, SqliteAuthStore, SqliteMatchStore, SqliteTasteStore,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite database files (taste.db, match.db, auth.db).
    #[clap(value_parser = parse_path)]
    pub db_dir: PathBuf,

    /// Optional TOML config file; values there override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Channel capacity of the realtime message fan-out.
    #[clap(long, default_value_t = 256)]
    pub realtime_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let db_dir = file_config
        .db_dir
        .map(PathBuf::from)
        .unwrap_or(cli_args.db_dir);
    let port = file_config.port.unwrap_or(cli_args.port);
    let logging_level = match file_config.logging_level {
        Some(level) => RequestsLoggingLevel::from_str(&level, true)
            .map_err(|e| anyhow!("Invalid logging_level in config: {}", e))?,
        None => cli_args.logging_level,
    };
    let matching_config: MatchingConfig = file_config.matching.unwrap_or_default();

    std::fs::create_dir_all(&db_dir)
        .with_context(|| format!("Failed to create db directory {:?}", db_dir))?;

    info!("Opening SQLite databases under {:?}...", db_dir);
    let taste_store = Arc::new(SqliteTasteStore::new(db_dir.join("taste.db"))?);
    let match_store = Arc::new(SqliteMatchStore::new(db_dir.join("match.db"))?);
    let auth_store = Arc::new(SqliteAuthStore::new(db_dir.join("auth.db"))?);
    let notifier = Arc::new(ChannelNotifier::new(cli_args.realtime_capacity));

    info!("Ready to serve at port {}!", port);
    run_server(
        taste_store,
        match_store,
        auth_store,
        notifier,
        &matching_config,
        logging_level,
        port,
    )
    .await
}
