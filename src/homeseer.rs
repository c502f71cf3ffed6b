//! Process-wide controller handle with atomic config reload.
//!
//! [`HomeSeerHandle`] holds the current [`HomeSeerClient`] snapshot behind an
//! `RwLock<Arc<_>>`. Tool handlers grab an `Arc` clone per call, so every
//! in-flight operation keeps the snapshot it started with — a reload can
//! never expose a partially-updated configuration.
//!
//! ## Reload
//!
//! When created with a config file path, the handle checks the file's mtime
//! before each resolve and re-runs the full merge (defaults → file → env)
//! when it changed. [`HomeSeerHandle::reload`] forces the same merge
//! explicitly. A failed reload (e.g. invalid JSON) keeps the previous
//! snapshot and logs to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{Mutex, RwLock};

use crate::client::HomeSeerClient;
use crate::config::{self, ConfigOverlay, HomeSeerConfig};

pub struct HomeSeerHandle {
    inner: RwLock<Arc<HomeSeerClient>>,
    /// Config file path (if any) for mtime-based hot-reload.
    config_path: Option<PathBuf>,
    /// Last observed mtime of the config file.
    last_mtime: Mutex<Option<SystemTime>>,
    /// Source of the environment overlay used on reload. Reads the process
    /// environment in production; tests swap in an empty overlay so reloads
    /// are hermetic.
    env_source: fn() -> ConfigOverlay,
}

fn process_env() -> ConfigOverlay {
    ConfigOverlay::from_env_vars(std::env::vars())
}

impl HomeSeerHandle {
    /// Build a handle from resolved configuration (no hot-reload).
    pub fn new(config: HomeSeerConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(HomeSeerClient::new(config))),
            config_path: None,
            last_mtime: Mutex::new(None),
            env_source: process_env,
        }
    }

    /// Build a handle tracking a config file for hot-reload.
    pub fn with_config_file(config: HomeSeerConfig, path: PathBuf) -> Self {
        let mtime = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        Self {
            inner: RwLock::new(Arc::new(HomeSeerClient::new(config))),
            config_path: Some(path),
            last_mtime: Mutex::new(mtime),
            env_source: process_env,
        }
    }

    /// Replace the environment overlay source with an empty one so reload
    /// behavior depends only on the config file.
    #[cfg(test)]
    fn without_env(mut self) -> Self {
        self.env_source = ConfigOverlay::default;
        self
    }

    /// The current client snapshot. Checks for config file changes first.
    pub async fn client(&self) -> Arc<HomeSeerClient> {
        self.maybe_reload().await;
        self.inner.read().await.clone()
    }

    /// Re-run the config merge and swap in a fresh client wholesale.
    pub async fn reload(&self) -> Result<(), String> {
        let config = config::load_layers(self.config_path.as_deref(), (self.env_source)())?;
        let mut inner = self.inner.write().await;
        *inner = Arc::new(HomeSeerClient::new(config));
        Ok(())
    }

    /// Check if the config file has changed and reload if so.
    async fn maybe_reload(&self) {
        let path = match &self.config_path {
            Some(p) => p,
            None => return,
        };

        let current_mtime = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return,
        };

        let mut last = self.last_mtime.lock().await;
        if *last == Some(current_mtime) {
            return;
        }

        match self.reload().await {
            Ok(()) => {
                eprintln!("mcp-homeseer: config file changed, configuration reloaded");
                *last = Some(current_mtime);
            }
            Err(e) => {
                // Keep the old snapshot; record the mtime so the same broken
                // file is not re-parsed on every call.
                eprintln!("mcp-homeseer: config reload failed: {}", e);
                *last = Some(current_mtime);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_is_stable_across_reload() {
        let handle = HomeSeerHandle::new(HomeSeerConfig {
            source: "before".into(),
            ..Default::default()
        })
        .without_env();

        let snapshot = handle.client().await;
        assert_eq!(snapshot.config().source, "before");

        // Reload rebuilds from defaults + env; the old snapshot is untouched.
        handle.reload().await.unwrap();
        assert_eq!(snapshot.config().source, "before");
    }

    #[tokio::test]
    async fn reload_swaps_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"source": "from-file", "timeout": 7}"#).unwrap();

        let config = config::load_layers(Some(&path), ConfigOverlay::default()).unwrap();
        let handle = HomeSeerHandle::with_config_file(config, path.clone()).without_env();
        assert_eq!(handle.client().await.config().timeout, 7);

        std::fs::write(&path, r#"{"source": "from-file", "timeout": 9}"#).unwrap();
        handle.reload().await.unwrap();

        let snapshot = handle.client().await;
        assert_eq!(snapshot.config().timeout, 9);
        assert_eq!(snapshot.config().source, "from-file");
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"timeout": 7}"#).unwrap();

        let config = config::load_layers(Some(&path), ConfigOverlay::default()).unwrap();
        let handle = HomeSeerHandle::with_config_file(config, path.clone()).without_env();

        std::fs::write(&path, "{broken").unwrap();
        assert!(handle.reload().await.is_err());
        assert_eq!(handle.client().await.config().timeout, 7);
    }
}
