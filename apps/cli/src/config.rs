use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the prompt-optimization backend, without a trailing slash.
    pub api_base_url: String,
    /// Where the session tokens are persisted between invocations.
    pub token_file: PathBuf,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_base_url: require_env("PROMPTLY_API_URL")?
                .trim_end_matches('/')
                .to_string(),
            token_file: match std::env::var("PROMPTLY_TOKEN_FILE") {
                Ok(path) => PathBuf::from(path),
                Err(_) => default_token_file()
                    .context("no user config directory found; set PROMPTLY_TOKEN_FILE")?,
            },
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()),
        })
    }
}

fn default_token_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("promptly").join("tokens.json"))
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
