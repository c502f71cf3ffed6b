//! Configuration loading for mcp-homeseer.
//!
//! Configuration is resolved by layering three sources, where a later
//! layer's present key always replaces an earlier layer's value:
//!
//! 1. **Built-in defaults** (Connected2 cloud endpoint, no auth)
//! 2. **JSON file** via `--config <path>` CLI flag, the `HOMESEER_CONFIG`
//!    environment variable, or `config.json` in the current directory
//! 3. **Environment variables** — `HOMESEER_URL`, `HOMESEER_USERNAME`,
//!    `HOMESEER_PASSWORD`, `HOMESEER_TOKEN`, `HOMESEER_SOURCE`,
//!    `HOMESEER_TIMEOUT`, `HOMESEER_VERIFY_SSL`
//!
//! A missing config file is not an error; a file that exists but is not
//! valid JSON is. See `config.example.json` for the file format.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_URL: &str = "https://connected2.homeseer.com/json";
pub const DEFAULT_SOURCE: &str = "homeseer-mcp";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_PREFIX: &str = "HOMESEER_";
const CONFIG_FILE_NAME: &str = "config.json";

/// CLI arguments parsed by `clap`.
#[derive(Parser)]
#[command(name = "mcp-homeseer", about = "MCP server for HomeSeer controllers")]
pub struct Cli {
    /// Path to configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Effective HomeSeer API configuration after all layers are merged.
///
/// Built once at startup and treated as immutable; reload builds a fresh
/// value and swaps it in wholesale (see [`crate::homeseer::HomeSeerHandle`]).
#[derive(Debug, Clone, PartialEq)]
pub struct HomeSeerConfig {
    /// Base URL of the controller's JSON endpoint.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// API token. Takes precedence over username/password when set.
    pub token: Option<String>,
    /// Value of the `source` query parameter sent with every request.
    pub source: String,
    /// HTTP request timeout in seconds.
    pub timeout: u64,
    /// When false, TLS certificate verification is disabled.
    pub verify_ssl: bool,
}

impl Default for HomeSeerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            username: None,
            password: None,
            token: None,
            source: DEFAULT_SOURCE.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            verify_ssl: true,
        }
    }
}

impl HomeSeerConfig {
    /// The API URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Authentication query parameters: `token=` when a token is configured,
    /// otherwise `user=`/`pass=` when both are configured, otherwise none.
    pub fn auth_params(&self) -> Vec<(&'static str, String)> {
        if let Some(token) = &self.token {
            vec![("token", token.clone())]
        } else if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            vec![("user", user.clone()), ("pass", pass.clone())]
        } else {
            Vec::new()
        }
    }

    /// Full query parameters for one API request: `source`, auth, then the
    /// operation's own parameters.
    pub fn request_params(&self, extra: &[(&str, String)]) -> Vec<(String, String)> {
        let mut params = vec![("source".to_string(), self.source.clone())];
        params.extend(
            self.auth_params()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );
        params.extend(extra.iter().map(|(k, v)| (k.to_string(), v.clone())));
        params
    }

    /// Human-readable auth mode for startup logging (never includes secrets).
    pub fn auth_mode(&self) -> &'static str {
        if self.token.is_some() {
            "token"
        } else if self.username.is_some() && self.password.is_some() {
            "username/password"
        } else {
            "none"
        }
    }
}

/// Partial configuration from a single source. Present keys override the
/// layers below when applied.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigOverlay {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub source: Option<String>,
    pub timeout: Option<u64>,
    pub verify_ssl: Option<bool>,
}

impl ConfigOverlay {
    /// Apply this overlay on top of `config`, returning the merged result.
    pub fn apply(self, mut config: HomeSeerConfig) -> HomeSeerConfig {
        if let Some(url) = self.url {
            config.url = url;
        }
        if let Some(username) = self.username {
            config.username = Some(username);
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
        if let Some(token) = self.token {
            config.token = Some(token);
        }
        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(verify_ssl) = self.verify_ssl {
            config.verify_ssl = verify_ssl;
        }
        config
    }

    /// Build an overlay from `HOMESEER_*` variables.
    ///
    /// Takes the variables as an iterator so the merge stays testable without
    /// touching the process environment. An unparseable `HOMESEER_TIMEOUT` is
    /// warned about and skipped rather than failing the load.
    pub fn from_env_vars(vars: impl Iterator<Item = (String, String)>) -> Self {
        let mut overlay = Self::default();
        for (key, value) in vars {
            let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match suffix {
                "URL" => overlay.url = Some(value),
                "USERNAME" => overlay.username = Some(value),
                "PASSWORD" => overlay.password = Some(value),
                "TOKEN" => overlay.token = Some(value),
                "SOURCE" => overlay.source = Some(value),
                "TIMEOUT" => match value.parse::<u64>() {
                    Ok(t) => overlay.timeout = Some(t),
                    Err(_) => {
                        eprintln!(
                            "mcp-homeseer: invalid {}TIMEOUT value '{}', ignoring",
                            ENV_PREFIX, value
                        );
                    }
                },
                "VERIFY_SSL" => overlay.verify_ssl = Some(parse_bool(&value)),
                _ => {}
            }
        }
        overlay
    }
}

/// Truthy values accepted for `HOMESEER_VERIFY_SSL`; anything else is false.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Determine which config file to use: `--config` flag, then the
/// `HOMESEER_CONFIG` environment variable, then `config.json` in the current
/// directory if it exists.
pub fn resolve_config_path(cli: &Cli) -> Option<PathBuf> {
    if let Some(path) = &cli.config {
        return Some(path.clone());
    }
    if let Ok(path) = std::env::var("HOMESEER_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    local.exists().then_some(local)
}

/// Load the effective configuration: defaults, then the optional config file,
/// then overrides from the process environment.
pub fn load(path: Option<&Path>) -> Result<HomeSeerConfig, String> {
    load_layers(path, ConfigOverlay::from_env_vars(std::env::vars()))
}

/// Merge defaults, the optional config file, and a prebuilt environment
/// overlay. Taking the overlay as a value keeps the merge independent of the
/// process environment.
pub fn load_layers(path: Option<&Path>, env: ConfigOverlay) -> Result<HomeSeerConfig, String> {
    let mut config = HomeSeerConfig::default();
    if let Some(path) = path {
        config = load_overlay_file(path)?.apply(config);
    }
    Ok(env.apply(config))
}

/// Read a config file as an overlay. A missing file yields an empty overlay;
/// invalid JSON is a hard error.
fn load_overlay_file(path: &Path) -> Result<ConfigOverlay, String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigOverlay::default());
        }
        Err(e) => {
            return Err(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ));
        }
    };

    serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))
}
