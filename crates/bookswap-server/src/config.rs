use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Development-only signing secret. Refused in production.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Placeholder secrets that MUST NOT be used in production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    DEV_JWT_SECRET,
    "change-me-to-a-random-string",
    "your_jwt_secret",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    /// `true` when no secret was configured and the dev fallback is in use.
    pub using_dev_secret: bool,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub environment: Environment,
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("BOOKSWAP_ENV").as_deref() {
            None | Some("") | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => bail!("BOOKSWAP_ENV must be 'development' or 'production', got '{}'", other),
        };

        let configured_secret = lookup("BOOKSWAP_JWT_SECRET").filter(|s| !s.is_empty());
        if environment == Environment::Production {
            match configured_secret.as_deref() {
                None => bail!("BOOKSWAP_JWT_SECRET must be set in production"),
                Some(s) if PLACEHOLDER_SECRETS.contains(&s) => {
                    bail!("BOOKSWAP_JWT_SECRET is still a placeholder value")
                }
                Some(_) => {}
            }
        }
        let using_dev_secret = configured_secret.is_none();
        let jwt_secret = configured_secret.unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let port: u16 = lookup("BOOKSWAP_PORT")
            .unwrap_or_else(|| "3001".into())
            .parse()
            .context("BOOKSWAP_PORT is not a valid port")?;

        let seed_demo = match lookup("BOOKSWAP_SEED_DEMO").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => bail!("BOOKSWAP_SEED_DEMO must be true or false, got '{}'", other),
        };

        Ok(Self {
            host: lookup("BOOKSWAP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            jwt_secret,
            using_dev_secret,
            db_path: lookup("BOOKSWAP_DB_PATH")
                .unwrap_or_else(|| bookswap_db::IN_MEMORY.into())
                .into(),
            upload_dir: lookup("BOOKSWAP_UPLOAD_DIR")
                .unwrap_or_else(|| "./uploads".into())
                .into(),
            environment,
            seed_demo,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
