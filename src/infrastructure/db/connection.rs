use crate::domain::error::{AppError, Result};
use crate::domain::schema::quote_identifier;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const FACILITY_SCHEMA: &str = include_str!("../../../resources/schema.sql");

const FACILITY_SCHEMA_VERSION: i32 = 1;

/// Brings the database up to the schema this build expects.
///
/// Tables are created additively (`CREATE TABLE IF NOT EXISTS`), so an existing
/// file keeps its data. A file written by a newer build is refused.
pub async fn init_facility_db(pool: &SqlitePool) -> Result<()> {
    let current_version = read_user_version(pool).await?;
    if current_version > FACILITY_SCHEMA_VERSION {
        return Err(AppError::DatabaseError(format!(
            "Database schema too new: db user_version={} > app supported_version={}",
            current_version, FACILITY_SCHEMA_VERSION
        )));
    }

    apply_schema(pool).await?;
    set_user_version(pool, FACILITY_SCHEMA_VERSION).await?;

    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {e}")))?;

    tracing::info!(version = FACILITY_SCHEMA_VERSION, "Facility schema ready");
    Ok(())
}

pub fn connect_options(db_path: &Path) -> Result<SqliteConnectOptions> {
    let db_url = db_path_to_url(db_path)?;
    Ok(SqliteConnectOptions::from_str(&db_url)
        .map_err(|e| AppError::DatabaseError(format!("Failed to parse database URL: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true))
}

fn db_path_to_url(db_path: &Path) -> Result<String> {
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| AppError::DatabaseError("Database path is not valid UTF-8".to_string()))?;
    Ok(format!("sqlite://{}", db_path_str.replace('\\', "/")))
}

async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for stmt in split_sql_statements(FACILITY_SCHEMA) {
        sqlx::query(&stmt)
            .execute(pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to apply schema statement: {e}")))?;
    }

    // Databases created before photos were tracked lack this column.
    ensure_column(pool, "person", "image_url", "TEXT").await?;

    Ok(())
}

async fn ensure_column(pool: &SqlitePool, table: &str, column: &str, definition: &str) -> Result<()> {
    let pragma_query = format!("PRAGMA table_info({})", quote_identifier(table));
    let rows = sqlx::query(&pragma_query)
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to inspect {table} schema: {e}")))?;

    let mut exists = false;
    for row in rows {
        let name: String = row
            .try_get("name")
            .map_err(|e| AppError::DatabaseError(format!("Failed to read {table} schema: {e}")))?;
        if name == column {
            exists = true;
            break;
        }
    }

    if !exists {
        let alter_stmt = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_identifier(table),
            quote_identifier(column),
            definition
        );
        sqlx::query(&alter_stmt).execute(pool).await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to add {column} column to {table}: {e}"))
        })?;
    }

    Ok(())
}

async fn read_user_version(pool: &SqlitePool) -> Result<i32> {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read PRAGMA user_version: {e}")))
}

async fn set_user_version(pool: &SqlitePool, version: i32) -> Result<()> {
    let sql = format!("PRAGMA user_version = {}", version);
    sqlx::query(&sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to set PRAGMA user_version: {e}")))?;
    Ok(())
}

/// The schema file holds plain DDL: no triggers and no semicolons inside
/// literals, so dropping `--` comments and splitting on `;` is enough.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let without_comments: String = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty())
        .map(String::from)
        .collect()
}
