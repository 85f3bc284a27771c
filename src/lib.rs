pub mod api;
pub mod attachments;
pub mod config;
pub mod core_state;
pub mod db;
pub mod keep_alive;
pub mod models;
pub mod validation;

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Signal handler error: {0}")]
    Signal(std::io::Error),
}

/// Run the service until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServerConfig::from_env()?;
    let core = Arc::new(prepare(&config)?);

    let server =
        api::start_api_server(core, config.listen_addr, config.max_body_bytes)
            .await
            .map_err(StartupError::Server)?;

    let pinger = config
        .keep_alive
        .clone()
        .map(|ka| keep_alive::start_keep_alive(ka, reqwest::Client::new()));

    let signal = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down");

    if let Some(handle) = pinger {
        handle.stop().await;
    }
    server.stop().await;

    signal.map_err(StartupError::Signal)
}

/// Create data directories and verify the database before serving.
fn prepare(config: &ServerConfig) -> Result<CoreState, StartupError> {
    if let Some(parent) = config.database_path.parent() {
        create_dir(parent)?;
    }
    create_dir(&config.uploads_dir())?;

    let conn = db::open_database(&config.database_path)?;
    db::check_connection(&conn)?;
    tracing::info!(
        path = %config.database_path.display(),
        version = db::get_current_version(&conn),
        "Database ready"
    );

    Ok(CoreState::from_config(config))
}

fn create_dir(path: &std::path::Path) -> Result<(), StartupError> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|source| StartupError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}
