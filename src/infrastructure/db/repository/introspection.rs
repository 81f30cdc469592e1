use super::FacilityRepository;
use crate::domain::error::{AppError, Result};
use crate::domain::schema::{quote_identifier, ColumnInfo, ColumnKind, ForeignKeyRef, TableSchema};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;
use std::collections::HashMap;

pub async fn list_tables(conn: &mut SqliteConnection) -> Result<Vec<String>> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::DatabaseError(format!("Failed to list tables: {e}")))
}

/// Schema of `table`, or `None` when no such table exists.
pub async fn describe_table(conn: &mut SqliteConnection, table: &str) -> Result<Option<TableSchema>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_identifier(table)))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to inspect {table}: {e}")))?;
    if rows.is_empty() {
        return Ok(None);
    }

    let read_err = |e: sqlx::Error| AppError::DatabaseError(format!("Failed to read {table} schema: {e}"));
    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let declared_type: String = row.try_get("type").map_err(read_err)?;
        let not_null: i64 = row.try_get("notnull").map_err(read_err)?;
        let pk: i64 = row.try_get("pk").map_err(read_err)?;
        columns.push(ColumnInfo {
            name: row.try_get("name").map_err(read_err)?,
            kind: ColumnKind::from_declared(&declared_type),
            declared_type,
            not_null: not_null != 0,
            primary_key: pk != 0,
            default: row.try_get("dflt_value").map_err(read_err)?,
        });
    }

    let fk_rows = sqlx::query(&format!("PRAGMA foreign_key_list({})", quote_identifier(table)))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to inspect {table} foreign keys: {e}")))?;

    let mut foreign_keys = Vec::with_capacity(fk_rows.len());
    for row in fk_rows {
        let ref_column: Option<String> = row.try_get("to").map_err(read_err)?;
        foreign_keys.push(ForeignKeyRef {
            column: row.try_get("from").map_err(read_err)?,
            ref_table: row.try_get("table").map_err(read_err)?,
            ref_column: ref_column.unwrap_or_else(|| "id".to_string()),
            on_delete: row.try_get("on_delete").map_err(read_err)?,
        });
    }
    foreign_keys.sort_by(|a, b| a.column.cmp(&b.column));

    Ok(Some(TableSchema {
        name: table.to_string(),
        columns,
        foreign_keys,
    }))
}

pub async fn all_schemas(conn: &mut SqliteConnection) -> Result<Vec<TableSchema>> {
    let tables = list_tables(conn).await?;
    let mut schemas = Vec::with_capacity(tables.len());
    for table in tables {
        if let Some(schema) = describe_table(conn, &table).await? {
            schemas.push(schema);
        }
    }
    Ok(schemas)
}

impl FacilityRepository {
    pub async fn schema_map(&self) -> Result<HashMap<String, TableSchema>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to acquire connection: {e}")))?;
        let schemas = all_schemas(&mut conn).await?;
        Ok(schemas.into_iter().map(|s| (s.name.clone(), s)).collect())
    }
}
