//! Redis connection.

use std::fmt;
use std::time::Duration;

use redis::aio::ConnectionManager;
use tracing::info;
use url::Url;

use crate::config::RedisConfig;
use crate::lifecycle::Resource;
use crate::store::StoreError;

/// Multiplexed Redis connection that reconnects on its own.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    addr: String,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("addr", &self.addr)
            .field("conn", &"<ConnectionManager>")
            .finish()
    }
}

impl Cache {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let url = redis_url(config)?;
        let client = redis::Client::open(url.as_str())?;
        let timeout = Duration::from_secs(config.connect_timeout_secs);

        let mut conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout {
                store: "redis",
                timeout,
            })??;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        let addr = format!("{}:{}", config.host, config.port);
        info!(address = %addr, db = config.db, "Redis connected");

        Ok(Self { conn, addr })
    }

    /// A handle to the shared connection.
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

impl Resource for Cache {
    async fn close(self) {
        drop(self.conn);
        info!(address = %self.addr, "Redis connection released");
    }
}

/// Build the connection URL; the password is percent-encoded.
pub fn redis_url(config: &RedisConfig) -> Result<Url, StoreError> {
    let mut url = Url::parse(&format!(
        "redis://{}:{}/{}",
        config.host, config.port, config.db
    ))
    .map_err(|e| StoreError::Address(e.to_string()))?;

    if !config.password.is_empty() {
        url.set_password(Some(&config.password))
            .map_err(|_| StoreError::Address(format!("cannot attach password to {}", config.host)))?;
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_without_password() {
        let url = redis_url(&RedisConfig::default()).unwrap();
        assert_eq!(url.as_str(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn url_encodes_password_and_db() {
        let config = RedisConfig {
            host: "cache.internal".into(),
            password: "p@ss word".into(),
            db: 3,
            ..RedisConfig::default()
        };
        let url = redis_url(&config).unwrap();
        assert_eq!(url.host_str(), Some("cache.internal"));
        assert_eq!(url.password(), Some("p%40ss%20word"));
        assert_eq!(url.path(), "/3");
    }

    #[test]
    fn bad_host_is_rejected() {
        let config = RedisConfig {
            host: "bad host".into(),
            ..RedisConfig::default()
        };
        assert!(matches!(redis_url(&config), Err(StoreError::Address(_))));
    }

    #[tokio::test]
    async fn unreachable_server_times_out() {
        let config = RedisConfig {
            port: 1,
            connect_timeout_secs: 1,
            ..RedisConfig::default()
        };
        assert!(Cache::connect(&config).await.is_err());
    }
}
