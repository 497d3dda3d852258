use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Placeholder JWT secrets that should never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEFAULT_SECRET: &str = "dev-secret-change-me";

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub static_dir: PathBuf,
    /// Existing account promoted to admin at startup.
    pub bootstrap_admin: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("CHATBOX_JWT_SECRET").unwrap_or_else(|_| DEFAULT_SECRET.into());
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) || jwt_secret.is_empty() {
            warn!("CHATBOX_JWT_SECRET is unset or a placeholder; tokens are forgeable");
        }

        let port = std::env::var("CHATBOX_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("CHATBOX_PORT must be a port number")?;

        Ok(Self {
            host: std::env::var("CHATBOX_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            db_path: std::env::var("CHATBOX_DB_PATH")
                .unwrap_or_else(|_| "chatbox.db".into())
                .into(),
            jwt_secret,
            static_dir: std::env::var("CHATBOX_STATIC_DIR")
                .unwrap_or_else(|_| "public".into())
                .into(),
            bootstrap_admin: std::env::var("CHATBOX_BOOTSTRAP_ADMIN")
                .ok()
                .filter(|name| !name.trim().is_empty()),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}
