//! Server configuration, read from `PARLOR_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

use parlor_api::MembershipPolicy;

/// Secrets that ship in sample files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "dev-secret-change-me",
    "change-me",
    "changeme",
    "secret",
    "your-secret-here",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Env: `PARLOR_HOST`, default `0.0.0.0`
    pub host: String,
    /// Env: `PARLOR_PORT`, default `3000`
    pub port: u16,
    /// Env: `PARLOR_DB_PATH`, default `parlor.db`
    pub db_path: PathBuf,
    /// Env: `PARLOR_JWT_SECRET`, required
    pub jwt_secret: String,
    /// Env: `PARLOR_TOKEN_TTL_DAYS`, default `30`
    pub token_ttl_days: i64,
    /// Env: `PARLOR_ADMIN_ONLY_MEMBERSHIP`, default `false`
    pub membership_policy: MembershipPolicy,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("PARLOR_HOST").unwrap_or_else(|| "0.0.0.0".into());

        let port = match lookup("PARLOR_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PARLOR_PORT is not a port number: '{}'", raw))?,
            None => 3000,
        };

        let db_path = PathBuf::from(lookup("PARLOR_DB_PATH").unwrap_or_else(|| "parlor.db".into()));

        let jwt_secret = lookup("PARLOR_JWT_SECRET").unwrap_or_default();
        let trimmed = jwt_secret.trim();
        if trimmed.is_empty() {
            bail!("PARLOR_JWT_SECRET must be set");
        }
        if PLACEHOLDER_SECRETS.contains(&trimmed.to_ascii_lowercase().as_str()) {
            bail!("PARLOR_JWT_SECRET is still a placeholder value; set a real secret");
        }

        let token_ttl_days = match lookup("PARLOR_TOKEN_TTL_DAYS") {
            Some(raw) => {
                let days: i64 = raw
                    .parse()
                    .with_context(|| format!("PARLOR_TOKEN_TTL_DAYS is not a number: '{}'", raw))?;
                if days <= 0 {
                    bail!("PARLOR_TOKEN_TTL_DAYS must be positive, got {}", days);
                }
                days
            }
            None => 30,
        };

        let membership_policy = match lookup("PARLOR_ADMIN_ONLY_MEMBERSHIP").as_deref() {
            Some("1" | "true" | "TRUE" | "yes") => MembershipPolicy::AdminOnly,
            _ => MembershipPolicy::Open,
        };

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            token_ttl_days,
            membership_policy,
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
