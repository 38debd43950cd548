use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use chapel_api::ApiConfig;
use chapel_db::seed::DEFAULT_ROOT_EMAIL;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    /// Seeded as the protected admin account when the store opens.
    pub root_email: String,
    pub api: ApiConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("CHAPEL_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CHAPEL_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("CHAPEL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("PORT")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("CHAPEL_HOST must be an IP address")?;

        let latency_ms: u64 = match var("CHAPEL_API_LATENCY_MS") {
            Some(v) => v.parse().context("CHAPEL_API_LATENCY_MS must be milliseconds")?,
            None => 0,
        };

        let defaults = ApiConfig::default();
        Ok(Self {
            addr,
            db_path: var("DATABASE_PATH").unwrap_or_else(|| "chapel.db".into()).into(),
            root_email: var("CHAPEL_ROOT_EMAIL")
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ROOT_EMAIL.into()),
            api: ApiConfig {
                latency: Duration::from_millis(latency_ms),
                root_password: var("CHAPEL_ROOT_PASSWORD").filter(|p| !p.is_empty()),
                jwt_secret,
                ..defaults
            },
        })
    }
}
