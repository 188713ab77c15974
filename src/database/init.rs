// init.rs

use std::sync::Arc;

use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use thiserror::Error;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::info;

use crate::config::StoreConfig;
use crate::database::migrations::apply_migrations;
use crate::repositories::memory_store::MemoryMessageStore;
use crate::repositories::message_store::MessageStore;
use crate::repositories::pg_message_store::PgMessageStore;

/// Database-related error types
#[derive(Error, Debug)]
pub enum DbError {
    /// Error when DATABASE_URL parsing fails
    #[error("Failed to parse DATABASE_URL: {0}")]
    ParseError(String),

    /// Error when connection pool creation fails
    #[error("Failed to create pool: {0}")]
    PoolCreationError(String),

    /// Error when the messages table cannot be prepared
    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Creates a connection pool using the provided database URL
///
/// Returns the pool together with the `host:port` it points at, used when
/// reporting connection failures.
fn create_pool(database_url: &str) -> Result<(Pool, Option<String>), DbError> {
    // Parse the database URL into a PostgreSQL configuration
    let pg_config = database_url
        .parse::<PgConfig>()
        .map_err(|e| DbError::ParseError(e.to_string()))?;

    let mut cfg = Config::new();

    cfg.user = pg_config.get_user().map(ToString::to_string);
    cfg.password = pg_config
        .get_password()
        .map(|s| String::from_utf8(s.to_vec()))
        .transpose()
        .map_err(|e| DbError::ParseError(e.to_string()))?;
    cfg.dbname = pg_config.get_dbname().map(ToString::to_string);
    cfg.host = pg_config.get_hosts().first().and_then(|host| match host {
        tokio_postgres::config::Host::Tcp(host) => Some(host.to_string()),
        _ => None,
    });
    cfg.port = pg_config.get_ports().first().copied();

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let endpoint = cfg
        .host
        .as_ref()
        .map(|host| format!("{}:{}", host, cfg.port.unwrap_or(5432)));

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| DbError::PoolCreationError(e.to_string()))?;

    Ok((pool, endpoint))
}

/// Opens the configured message store. For Postgres this also makes sure
/// the messages table exists.
pub async fn init_store(config: &StoreConfig) -> Result<Arc<dyn MessageStore>, DbError> {
    match config {
        StoreConfig::Postgres {
            database_url,
            table,
        } => {
            let (pool, endpoint) = create_pool(database_url)?;

            let client = pool
                .get()
                .await
                .map_err(|e| DbError::MigrationError(e.to_string()))?;

            apply_migrations(&client, table)
                .await
                .map_err(|e| DbError::MigrationError(e.to_string()))?;

            info!("Database pool initialized and table {} is ready", table);
            Ok(Arc::new(PgMessageStore::new(pool, table.clone(), endpoint)))
        }
        StoreConfig::Memory => {
            info!("Using in-memory message store; messages are lost on exit");
            Ok(Arc::new(MemoryMessageStore::new()))
        }
    }
}
