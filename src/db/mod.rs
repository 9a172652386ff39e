//! PostgreSQL pool behind the settlement store

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::MarketResult;
use crate::store::PgStore;

pub struct Database {
    pool: PgPool,
}

fn pool_options(settings: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
}

impl Database {
    pub async fn connect(url: &str, settings: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = pool_options(settings).connect(url).await?;
        tracing::info!(
            max_connections = settings.max_connections,
            acquire_timeout_secs = settings.acquire_timeout_secs,
            "PostgreSQL pool established"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Settlement store on this pool with the schema applied
    pub async fn open_store(&self) -> MarketResult<PgStore> {
        let store = PgStore::new(self.pool.clone());
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        if one != 1 {
            return Err(sqlx::Error::Protocol(format!("health check returned {}", one)));
        }
        Ok(())
    }
}
