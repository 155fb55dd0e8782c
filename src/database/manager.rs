use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use super::collection::CollectionError;
use crate::config::DatabaseConfig;

/// Builds and checks the connection pool behind [`super::PgCollection`]
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, CollectionError> {
        let url = config
            .url
            .as_deref()
            .ok_or(CollectionError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(pool)
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), CollectionError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}
