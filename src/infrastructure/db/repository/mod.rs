use crate::domain::error::{AppError, Result};
use crate::infrastructure::db::connection::connect_options;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod entities;
pub mod introspection;
mod layout;
mod personnel;
pub mod rows;
pub mod seed;

pub struct FacilityRepository {
    pool: SqlitePool,
}

impl FacilityRepository {
    pub async fn connect(db_path: &Path, max_connections: u32) -> Result<Self> {
        let options = connect_options(db_path)?;

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect database: {}", e)))?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database. Every handle shares that one
    /// connection, so callers must not hold two connections at once.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::DatabaseError(format!("Failed to parse memory URL: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to open memory DB: {}", e)))?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool for direct queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
pub(crate) async fn test_repository() -> FacilityRepository {
    let repo = FacilityRepository::in_memory().await.unwrap();
    crate::infrastructure::db::connection::init_facility_db(repo.pool())
        .await
        .unwrap();
    repo
}
