//! Generic per-table editing driven by SQLite introspection. Only tables
//! that exist in `sqlite_master` are addressable.

use crate::domain::error::{AppError, Result};
use crate::domain::record::{coerce_assignments, coerce_value, parse_optional_int, Record};
use crate::domain::schema::{
    is_valid_identifier, quote_identifier, ColumnKind, SelectOption, TableSchema,
};
use crate::infrastructure::db::repository::introspection::{all_schemas, describe_table, list_tables};
use crate::infrastructure::db::repository::rows::{
    delete_by_key, execute, fetch_records, fetch_scalar, insert_values, update_values,
};
use crate::infrastructure::db::repository::FacilityRepository;
use serde::Serialize;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteConnection;
use sqlx::Sqlite;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct AddRowResult {
    pub success: bool,
    pub id: Value,
    pub existing: bool,
}

/// `{id, label}` pairs of `schema`'s rows, keyed by `key_column` and labelled
/// with the table's display expression.
pub async fn load_select_options(
    conn: &mut SqliteConnection,
    schema: &TableSchema,
    key_column: &str,
) -> Result<Vec<SelectOption>> {
    let sql = format!(
        "SELECT {} AS id, {} AS label FROM {} ORDER BY label",
        quote_identifier(key_column),
        schema.display_expression(),
        quote_identifier(&schema.name)
    );
    let rows = fetch_records(conn, &sql, &[]).await?;
    Ok(rows
        .into_iter()
        .map(|mut row| {
            let id = row.remove("id").unwrap_or(Value::Null);
            let label = match row.remove("label") {
                Some(Value::String(s)) if !s.is_empty() => s,
                Some(Value::Null) | None => id.to_string(),
                Some(Value::String(_)) => id.to_string(),
                Some(other) => other.to_string(),
            };
            SelectOption { id, label }
        })
        .collect())
}

/// Parses a submitted row key against the table's key column.
fn coerce_key(schema: &TableSchema, id: &Value) -> Result<Value> {
    let coerced = match schema.column(schema.primary_key()) {
        Some(column) => coerce_value(column, id)?,
        None => parse_optional_int(Some(id)).map(Value::from).unwrap_or(Value::Null),
    };
    if coerced.is_null() {
        return Err(AppError::ValidationError("Row id is required".to_string()));
    }
    Ok(coerced)
}

pub struct TableEditorUseCase {
    repository: Arc<FacilityRepository>,
}

impl TableEditorUseCase {
    pub fn new(repository: Arc<FacilityRepository>) -> Self {
        Self { repository }
    }

    async fn conn(&self) -> Result<PoolConnection<Sqlite>> {
        self.repository
            .pool()
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to acquire connection: {}", e)))
    }

    async fn schema_of(conn: &mut SqliteConnection, table: &str) -> Result<TableSchema> {
        let unknown = || AppError::NotFound(format!("Table '{table}' does not exist"));
        if !is_valid_identifier(table) {
            return Err(unknown());
        }
        if !list_tables(conn).await?.iter().any(|t| t == table) {
            return Err(unknown());
        }
        describe_table(conn, table).await?.ok_or_else(unknown)
    }

    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        list_tables(&mut conn).await
    }

    pub async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        let mut conn = self.conn().await?;
        Self::schema_of(&mut conn, table).await
    }

    pub async fn list_schemas(&self) -> Result<Vec<TableSchema>> {
        let mut conn = self.conn().await?;
        all_schemas(&mut conn).await
    }

    pub async fn list_rows(&self, table: &str) -> Result<Vec<Record>> {
        let mut conn = self.conn().await?;
        let schema = Self::schema_of(&mut conn, table).await?;
        let pk = schema.primary_key();
        let select = if schema.has_column(pk) {
            "*".to_string()
        } else {
            format!("{}, *", quote_identifier(pk))
        };
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            select,
            quote_identifier(table),
            quote_identifier(pk)
        );
        fetch_records(&mut conn, &sql, &[]).await
    }

    /// Inserts a row. With `dedupe`, a row that already carries every
    /// provided non-null value is returned instead (`existing: true`).
    pub async fn add_row(&self, table: &str, data: &Record, dedupe: bool) -> Result<AddRowResult> {
        let mut conn = self.conn().await?;
        let schema = Self::schema_of(&mut conn, table).await?;
        let pk = schema.primary_key().to_string();

        let mut provided = Vec::with_capacity(data.len());
        for (column, value) in data {
            if column == &pk {
                let blank = value.is_null() || value.as_str().is_some_and(|s| s.trim().is_empty());
                if blank {
                    continue;
                }
                return Err(AppError::ValidationError(format!(
                    "Column '{column}' is assigned automatically"
                )));
            }
            provided.push((column.clone(), value.clone()));
        }
        let values = coerce_assignments(&schema, &provided)?;

        if let Some(missing) = schema.columns.iter().find(|c| {
            c.not_null
                && !c.primary_key
                && c.default.is_none()
                && !values.iter().any(|(name, _)| name == &c.name)
        }) {
            return Err(AppError::ValidationError(format!(
                "Column '{}' must not be empty",
                missing.name
            )));
        }

        if dedupe {
            let present: Vec<&(String, Value)> = values.iter().filter(|(_, v)| !v.is_null()).collect();
            if !present.is_empty() {
                let conditions: Vec<String> = present
                    .iter()
                    .map(|(c, _)| format!("{} = ?", quote_identifier(c)))
                    .collect();
                let sql = format!(
                    "SELECT {} FROM {} WHERE {} LIMIT 1",
                    quote_identifier(&pk),
                    quote_identifier(table),
                    conditions.join(" AND ")
                );
                let params: Vec<Value> = present.iter().map(|(_, v)| v.clone()).collect();
                if let Some(id) = fetch_scalar(&mut conn, &sql, &params).await? {
                    return Ok(AddRowResult {
                        success: true,
                        id,
                        existing: true,
                    });
                }
            }
        }

        let id = insert_values(&mut conn, table, &values).await?;
        info!(table = %table, id, "Row added");
        Ok(AddRowResult {
            success: true,
            id: Value::from(id),
            existing: false,
        })
    }

    pub async fn update_cell(&self, table: &str, id: &Value, column: &str, value: &Value) -> Result<()> {
        let mut values = Record::new();
        values.insert(column.to_string(), value.clone());
        self.update_row(table, id, &values).await
    }

    pub async fn update_row(&self, table: &str, id: &Value, values: &Record) -> Result<()> {
        let mut conn = self.conn().await?;
        let schema = Self::schema_of(&mut conn, table).await?;
        let key = coerce_key(&schema, id)?;
        let pk = schema.primary_key();

        let assignments: Vec<(String, Value)> = values
            .iter()
            .map(|(c, v)| (c.clone(), v.clone()))
            .collect();
        if assignments.is_empty() {
            return Err(AppError::ValidationError("No values to update".to_string()));
        }
        if assignments.iter().any(|(c, _)| c == pk) {
            return Err(AppError::ValidationError(format!(
                "Column '{pk}' cannot be changed"
            )));
        }
        let assignments = coerce_assignments(&schema, &assignments)?;

        let affected = update_values(&mut conn, table, pk, &key, &assignments).await?;
        if affected == 0 {
            return Err(AppError::NotFound(format!("Row {key} in '{table}' not found")));
        }
        Ok(())
    }

    pub async fn delete_row(&self, table: &str, id: &Value) -> Result<()> {
        let mut conn = self.conn().await?;
        let schema = Self::schema_of(&mut conn, table).await?;
        let key = coerce_key(&schema, id)?;
        let affected = delete_by_key(&mut conn, table, schema.primary_key(), &key).await?;
        if affected == 0 {
            return Err(AppError::NotFound(format!("Row {key} in '{table}' not found")));
        }
        info!(table = %table, id = %key, "Row deleted");
        Ok(())
    }

    pub async fn add_column(&self, table: &str, name: &str, sql_type: &str) -> Result<TableSchema> {
        let mut conn = self.conn().await?;
        let schema = Self::schema_of(&mut conn, table).await?;
        if !is_valid_identifier(name) {
            return Err(AppError::ValidationError(format!("Invalid column name: {name}")));
        }
        if schema.has_column(name) {
            return Err(AppError::Conflict(format!(
                "Column '{name}' already exists in '{table}'"
            )));
        }
        let kind = ColumnKind::parse_sql_type(sql_type).ok_or_else(|| {
            AppError::ValidationError(format!(
                "Unsupported column type '{sql_type}' (TEXT, INTEGER, REAL, DATE, TIMESTAMP)"
            ))
        })?;

        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_identifier(table),
            quote_identifier(name),
            kind.sql_type()
        );
        execute(&mut conn, &sql, &[]).await?;
        info!(table = %table, column = %name, kind = kind.sql_type(), "Column added");
        Self::schema_of(&mut conn, table).await
    }

    pub async fn drop_column(&self, table: &str, name: &str) -> Result<TableSchema> {
        let mut conn = self.conn().await?;
        let schema = Self::schema_of(&mut conn, table).await?;
        let column = schema
            .column(name)
            .ok_or_else(|| AppError::NotFound(format!("Column '{name}' not found in '{table}'")))?;
        if column.primary_key {
            return Err(AppError::ValidationError(format!(
                "Primary key column '{name}' cannot be dropped"
            )));
        }

        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_identifier(table),
            quote_identifier(name)
        );
        execute(&mut conn, &sql, &[]).await?;
        info!(table = %table, column = %name, "Column dropped");
        Self::schema_of(&mut conn, table).await
    }

    /// Select options for every foreign key column of `table`.
    pub async fn foreign_key_options(&self, table: &str) -> Result<BTreeMap<String, Vec<SelectOption>>> {
        let mut conn = self.conn().await?;
        let schema = Self::schema_of(&mut conn, table).await?;
        let mut options = BTreeMap::new();
        for fk in &schema.foreign_keys {
            let Some(target) = describe_table(&mut conn, &fk.ref_table).await? else {
                continue;
            };
            let entries = load_select_options(&mut conn, &target, &fk.ref_column).await?;
            options.insert(fk.column.clone(), entries);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::repository::test_repository;
    use serde_json::json;

    async fn use_case() -> TableEditorUseCase {
        TableEditorUseCase::new(Arc::new(test_repository().await))
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_unknown_table_is_not_found() {
        let editor = use_case().await;
        assert!(matches!(editor.list_rows("nope").await, Err(AppError::NotFound(_))));
        assert!(matches!(
            editor.list_rows("person; DROP TABLE person").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_update_delete_round_trip() {
        let editor = use_case().await;
        let added = editor
            .add_row("room", &record(json!({ "name": "2.01", "floor": "2" })), false)
            .await
            .unwrap();
        assert!(!added.existing);

        editor
            .update_cell("room", &added.id, "floor", &json!("3"))
            .await
            .unwrap();
        let rows = editor.list_rows("room").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["floor"], json!(3));

        editor.delete_row("room", &json!("1")).await.unwrap();
        assert!(matches!(
            editor.delete_row("room", &added.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_dedupe_reuses_matching_row() {
        let editor = use_case().await;
        let data = record(json!({ "name": "Hauptgebäude", "building_number": "H1", "address": "" }));
        let first = editor.add_row("building", &data, true).await.unwrap();
        let second = editor.add_row("building", &data, true).await.unwrap();
        assert!(second.existing);
        assert_eq!(first.id, second.id);

        let third = editor.add_row("building", &data, false).await.unwrap();
        assert!(!third.existing);
        assert_ne!(third.id, first.id);
    }

    #[tokio::test]
    async fn test_rejects_bad_values_and_columns() {
        let editor = use_case().await;
        let bad_int = editor
            .add_row("room", &record(json!({ "floor": "zwei" })), false)
            .await;
        assert!(matches!(bad_int, Err(AppError::ValidationError(_))));

        let unknown = editor
            .add_row("room", &record(json!({ "ceiling": 1 })), false)
            .await;
        assert!(matches!(unknown, Err(AppError::ValidationError(_))));

        let missing = editor
            .update_cell("room", &json!(99), "name", &json!("x"))
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_omitted_required_column_is_rejected() {
        let editor = use_case().await;
        let room = editor
            .add_row("room", &record(json!({ "name": "2.01" })), false)
            .await
            .unwrap();

        let err = editor
            .add_row("room_layout", &record(json!({ "room_id": room.id.clone() })), false)
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::ValidationError(msg) if msg.contains("'x'")));

        let blank = editor
            .add_row("room_layout", &record(json!({ "room_id": room.id.clone(), "x": "" })), false)
            .await;
        assert!(matches!(blank, Err(AppError::ValidationError(_))));

        let added = editor
            .add_row(
                "room_layout",
                &record(json!({ "room_id": room.id.clone(), "x": 1, "y": 2, "width": 30, "height": 20 })),
                false,
            )
            .await
            .unwrap();
        assert!(!added.existing);
    }

    #[tokio::test]
    async fn test_add_and_drop_column() {
        let editor = use_case().await;
        let schema = editor.add_column("room", "capacity", "integer").await.unwrap();
        assert_eq!(schema.column("capacity").unwrap().kind, ColumnKind::Integer);

        assert!(matches!(
            editor.add_column("room", "capacity", "TEXT").await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            editor.add_column("room", "area", "BLOB").await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            editor.drop_column("room", "id").await,
            Err(AppError::ValidationError(_))
        ));

        let schema = editor.drop_column("room", "capacity").await.unwrap();
        assert!(!schema.has_column("capacity"));
    }

    #[tokio::test]
    async fn test_foreign_key_options_use_display_labels() {
        let editor = use_case().await;
        editor
            .add_row("person", &record(json!({ "first_name": "Anna", "last_name": "Müller" })), false)
            .await
            .unwrap();
        editor
            .add_row("building", &record(json!({ "name": "Hauptgebäude" })), false)
            .await
            .unwrap();

        let options = editor.foreign_key_options("transponder").await.unwrap();
        assert_eq!(options["owner_id"][0].label, "Anna Müller");
        assert_eq!(options["owner_id"][0].id, json!(1));

        let room_options = editor.foreign_key_options("room").await.unwrap();
        assert_eq!(room_options["building_id"][0].label, "Hauptgebäude");
    }
}
