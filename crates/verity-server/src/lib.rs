//! Configuration and router assembly for the Verity server binary.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use verity_api::{ApiSettings, ApiState};
use verity_store_sqlite::StoreOptions;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `verity.toml` and
/// `VERITY_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  pub judge_timeout_ms:    u64,
  pub max_version_retries: u32,
  pub busy_timeout_ms:     u64,
  pub max_upload_bytes:    usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                "127.0.0.1".to_owned(),
      port:                8080,
      store_path:          PathBuf::from("~/.local/share/verity/verity.db"),
      judge_timeout_ms:    30_000,
      max_version_retries: 5,
      busy_timeout_ms:     5_000,
      max_upload_bytes:    16 * 1024 * 1024,
    }
  }
}

impl ServerConfig {
  /// Layer the TOML file at `path` (optional) under the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("VERITY")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      max_version_retries: self.max_version_retries,
      busy_timeout:        Duration::from_millis(self.busy_timeout_ms),
    }
  }

  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      judge_timeout:    Duration::from_millis(self.judge_timeout_ms),
      max_upload_bytes: self.max_upload_bytes,
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The API router with request tracing.
pub fn router<S>(state: ApiState<S>) -> Router
where
  S: verity_core::store::RelevanceStore + 'static,
{
  verity_api::api_router(state).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use std::{io::Write as _, sync::Arc};

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use tower::ServiceExt as _;
  use verity_judge::Engines;
  use verity_store_sqlite::SqliteStore;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/verity.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.max_version_retries, 5);
    assert!(!cfg.store_path.starts_with("~"));
  }

  #[test]
  fn file_overrides_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "port = 9191\njudge_timeout_ms = 250\nstore_path = \"/tmp/v.db\"").unwrap();

    let cfg = ServerConfig::load(file.path()).unwrap();
    assert_eq!(cfg.port, 9191);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.store_path, PathBuf::from("/tmp/v.db"));
    assert_eq!(cfg.api_settings().judge_timeout, Duration::from_millis(250));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }

  #[tokio::test]
  async fn traced_router_serves_health() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let state = ApiState::new(store, Arc::new(Engines::default()), ApiSettings::default());
    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
