use std::sync::Arc;

use deadpool::managed::QueueMode;
use deadpool_redis::{Config as DeadpoolConfig, Pool, PoolConfig, Runtime, Timeouts};
use redis::AsyncCommands;

use crate::error::{MedimindError, Result};

/// Redis connection manager. Values are stored as opaque JSON strings under
/// fixed keys.
#[derive(Clone)]
pub struct RedisManager {
    pool: Arc<Pool>,
}

impl RedisManager {
    /// Create a new Redis manager with configuration
    pub async fn new_with_config(config: &crate::config::Config) -> Result<Self> {
        let redis_url = config.get_redis_url();

        tracing::info!(
            "Connecting to Redis at {}:{} (db: {})",
            config.redis.host,
            config.redis.port,
            config.redis.database
        );

        let mut cfg = DeadpoolConfig::from_url(&redis_url);
        cfg.pool = Some(PoolConfig {
            max_size: config.redis.pool.max_size,
            timeouts: Timeouts {
                wait: Some(config.get_pool_timeout()),
                create: Some(config.get_pool_create_timeout()),
                recycle: Some(config.get_pool_recycle_timeout()),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| MedimindError::PoolCreation(e.to_string()))?;

        // Test the connection
        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::info!("Redis connection established");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        Ok(conn.get(key).await?)
    }

    pub async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        Ok(conn.exists(key).await?)
    }
}
