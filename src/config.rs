//! TOML configuration parsing.
//!
//! ```toml
//! [store]
//! backend = "firebase"
//! database_url = "https://talcfactory-default-rtdb.asia-southeast1.firebasedatabase.app"
//! root_path = "/"
//! auth_token_env = "FIREBASE_AUTH_TOKEN"
//!
//! [ai]
//! provider = "gemini"
//! model = "gemini-2.0-flash"
//!
//! [server]
//! bind = "127.0.0.1:9002"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `memory`, `sqlite`, or `firebase`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Realtime Database URL (firebase backend).
    #[serde(default)]
    pub database_url: Option<String>,
    /// Path of the ledger document inside the database.
    #[serde(default = "default_root_path")]
    pub root_path: String,
    /// Environment variable holding a database auth token, if any.
    #[serde(default)]
    pub auth_token_env: Option<String>,
    /// SQLite file (sqlite backend).
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long to wait for the first snapshot before giving up.
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: None,
            root_path: default_root_path(),
            auth_token_env: None,
            path: default_db_path(),
            load_timeout_secs: default_load_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_root_path() -> String {
    "/".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/talctrack.sqlite")
}
fn default_load_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    /// `disabled`, `gemini`, or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Base URL override (self-hosted gateways, tests).
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key. Defaults per provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl AiConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Model name, falling back to the provider's default.
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider.as_str()) {
            (Some(model), _) => model,
            (None, "openai") => "gpt-4o-mini",
            (None, _) => "gemini-2.0-flash",
        }
    }

    /// Name of the environment variable the API key is read from.
    pub fn key_env(&self) -> &str {
        match (&self.api_key_env, self.provider.as_str()) {
            (Some(name), _) => name,
            (None, "openai") => "OPENAI_API_KEY",
            (None, _) => "GEMINI_API_KEY",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:9002".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Configuration used when no file exists: process-local store and no
    /// AI provider.
    pub fn minimal() -> Self {
        Self {
            store: StoreConfig {
                backend: "memory".to_string(),
                ..StoreConfig::default()
            },
            ..Self::default()
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.store.backend.as_str() {
        "memory" | "sqlite" => {}
        "firebase" => {
            let url = config.store.database_url.as_deref().unwrap_or("");
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                anyhow::bail!("store.database_url must be an http(s) URL when backend is 'firebase'");
            }
        }
        other => anyhow::bail!(
            "Unknown store backend: '{}'. Must be memory, sqlite, or firebase.",
            other
        ),
    }

    if config.store.load_timeout_secs == 0 {
        anyhow::bail!("store.load_timeout_secs must be > 0");
    }

    match config.ai.provider.as_str() {
        "disabled" | "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown AI provider: '{}'. Must be disabled, gemini, or openai.",
            other
        ),
    }

    if config.ai.timeout_secs == 0 {
        anyhow::bail!("ai.timeout_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.store.backend, "sqlite");
        assert_eq!(config.store.root_path, "/");
        assert!(!config.ai.is_enabled());
        assert_eq!(config.server.bind, "127.0.0.1:9002");
    }

    #[test]
    fn provider_defaults() {
        let config: Config = toml::from_str("[ai]\nprovider = \"gemini\"").unwrap();
        assert_eq!(config.ai.model_name(), "gemini-2.0-flash");
        assert_eq!(config.ai.key_env(), "GEMINI_API_KEY");

        let config: Config =
            toml::from_str("[ai]\nprovider = \"openai\"\napi_key_env = \"MY_KEY\"").unwrap();
        assert_eq!(config.ai.model_name(), "gpt-4o-mini");
        assert_eq!(config.ai.key_env(), "MY_KEY");
    }

    #[test]
    fn firebase_requires_url() {
        let config: Config = toml::from_str("[store]\nbackend = \"firebase\"").unwrap();
        assert!(validate(&config).is_err());

        let config: Config = toml::from_str(
            "[store]\nbackend = \"firebase\"\ndatabase_url = \"https://x.firebaseio.com\"",
        )
        .unwrap();
        validate(&config).unwrap();
    }

    #[test]
    fn unknown_names_are_rejected() {
        let config: Config = toml::from_str("[store]\nbackend = \"redis\"").unwrap();
        assert!(validate(&config).is_err());
        let config: Config = toml::from_str("[ai]\nprovider = \"llama\"").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
