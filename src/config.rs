//! Service configuration, read from `HEALTH_TECH_*` environment variables.
//!
//! Every variable is optional. `from_lookup` takes the lookup function as a
//! parameter so tests can feed values without touching the process
//! environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "health-tech";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_LISTEN_ADDR: &str = "HEALTH_TECH_LISTEN_ADDR";
pub const ENV_DATABASE_PATH: &str = "HEALTH_TECH_DATABASE_PATH";
pub const ENV_PUBLIC_DIR: &str = "HEALTH_TECH_PUBLIC_DIR";
pub const ENV_MAX_BODY_BYTES: &str = "HEALTH_TECH_MAX_BODY_BYTES";
pub const ENV_KEEP_ALIVE_URL: &str = "HEALTH_TECH_KEEP_ALIVE_URL";
pub const ENV_KEEP_ALIVE_INTERVAL_SECS: &str = "HEALTH_TECH_KEEP_ALIVE_INTERVAL_SECS";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_DATABASE_PATH: &str = "./data/health-tech.db";
const DEFAULT_PUBLIC_DIR: &str = "./public";
/// 55 MB, leaves room for several 5 MB attachments plus multipart overhead.
const DEFAULT_MAX_BODY_BYTES: usize = 55 * 1024 * 1024;
const DEFAULT_KEEP_ALIVE_INTERVAL_SECS: u64 = 10;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "health_tech=info,tower_http=info"
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

/// Settings for the self-ping task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveConfig {
    /// Base URL of the deployed instance, e.g. `https://example.onrender.com`.
    pub base_url: String,
    pub interval: Duration,
}

impl KeepAliveConfig {
    /// Full URL of the ping endpoint on the target instance.
    pub fn ping_url(&self) -> String {
        format!("{}/api/ping", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// SQLite database file. Parent directories are created at startup.
    pub database_path: PathBuf,
    /// Directory served as static files; attachments live in `uploads/`.
    pub public_dir: PathBuf,
    pub max_body_bytes: usize,
    /// `None` disables the keep-alive task.
    pub keep_alive: Option<KeepAliveConfig>,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let listen_addr = parse_or(
            ENV_LISTEN_ADDR,
            get(ENV_LISTEN_ADDR),
            DEFAULT_LISTEN_ADDR,
        )?;
        let database_path = PathBuf::from(
            get(ENV_DATABASE_PATH).unwrap_or_else(|| DEFAULT_DATABASE_PATH.into()),
        );
        let public_dir =
            PathBuf::from(get(ENV_PUBLIC_DIR).unwrap_or_else(|| DEFAULT_PUBLIC_DIR.into()));
        let max_body_bytes = match get(ENV_MAX_BODY_BYTES) {
            Some(raw) => parse_value(ENV_MAX_BODY_BYTES, &raw)?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let keep_alive = match get(ENV_KEEP_ALIVE_URL) {
            Some(base_url) => {
                let secs: u64 = match get(ENV_KEEP_ALIVE_INTERVAL_SECS) {
                    Some(raw) => parse_value(ENV_KEEP_ALIVE_INTERVAL_SECS, &raw)?,
                    None => DEFAULT_KEEP_ALIVE_INTERVAL_SECS,
                };
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        name: ENV_KEEP_ALIVE_INTERVAL_SECS,
                        message: "interval must be at least one second".into(),
                    });
                }
                Some(KeepAliveConfig {
                    base_url,
                    interval: Duration::from_secs(secs),
                })
            }
            None => None,
        };

        Ok(Self {
            listen_addr,
            database_path,
            public_dir,
            max_body_bytes,
            keep_alive,
        })
    }

    /// Directory where uploaded attachments are written.
    pub fn uploads_dir(&self) -> PathBuf {
        self.public_dir.join(crate::attachments::UPLOADS_SUBDIR)
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(name, raw.as_deref().unwrap_or(default))
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name,
        message: e.to_string(),
    })
}
