//! verity-server binary.
//!
//! Reads `verity.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the `/v1` JSON API over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use verity_api::ApiState;
use verity_judge::Engines;
use verity_server::ServerConfig;
use verity_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Verity relevance store server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "verity.toml")]
  config: PathBuf,

  /// Print the resolved configuration and exit.
  #[arg(long)]
  check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = ServerConfig::load(&cli.config)?;

  if cli.check_config {
    let rendered = toml::to_string_pretty(&server_cfg).context("failed to render config")?;
    println!("{rendered}");
    return Ok(());
  }

  if let Some(parent) = server_cfg.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }

  let store = SqliteStore::open_with(&server_cfg.store_path, server_cfg.store_options())
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?;

  let client = reqwest::Client::builder()
    .user_agent(concat!("verity/", env!("CARGO_PKG_VERSION")))
    .build()
    .context("failed to build HTTP client")?;

  let state = ApiState::new(
    Arc::new(store),
    Arc::new(Engines::new(client)),
    server_cfg.api_settings(),
  );

  let app = verity_server::router(state);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
