//! MySQL connection pool.

use std::fmt;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use tracing::info;

use crate::config::MysqlConfig;
use crate::lifecycle::Resource;
use crate::store::StoreError;

/// Shared MySQL pool.
#[derive(Clone)]
pub struct Database {
    pool: MySqlPool,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("size", &self.pool.size())
            .field("idle", &self.pool.num_idle())
            .finish()
    }
}

impl Database {
    /// Open the pool and verify it with a round trip.
    pub async fn connect(config: &MysqlConfig) -> Result<Self, StoreError> {
        let timeout = Duration::from_secs(config.connect_timeout_secs);

        let connect = MySqlPoolOptions::new()
            .max_connections(config.max_conns)
            .min_connections(config.max_idle_conns)
            .acquire_timeout(timeout)
            .connect_with(connect_options(config));

        let pool = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| StoreError::Timeout {
                store: "mysql",
                timeout,
            })??;

        sqlx::query("SELECT 1").execute(&pool).await?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.dbname,
            max_connections = config.max_conns,
            "MySQL pool connected"
        );

        Ok(Self { pool })
    }

    /// The underlying pool, for queries.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl Resource for Database {
    async fn close(self) {
        self.pool.close().await;
        info!("MySQL pool closed");
    }
}

fn connect_options(config: &MysqlConfig) -> MySqlConnectOptions {
    let options = MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .database(&config.dbname);

    if config.password.is_empty() {
        options
    } else {
        options.password(&config.password)
    }
}
