//! Untyped access for tables and views whose shape is only known at runtime.
//! Every statement handed in here must already have its identifiers
//! validated and quoted; values always travel as bind parameters.

use crate::domain::error::{AppError, Result};
use crate::domain::record::Record;
use crate::domain::schema::quote_identifier;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Column, Row, Sqlite};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

pub fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn bind_all<'q>(sql: &'q str, params: &[Value]) -> SqliteQuery<'q> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, value| bind_value(query, value))
}

/// Reads a column as INTEGER, REAL or TEXT, whichever the stored value is.
fn column_value(row: &SqliteRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    Value::Null
}

pub fn record_from_row(row: &SqliteRow) -> Record {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        record.insert(column.name().to_string(), column_value(row, idx));
    }
    record
}

pub async fn fetch_records(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Record>> {
    let rows = bind_all(sql, params)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to fetch rows", e))?;
    Ok(rows.iter().map(record_from_row).collect())
}

pub async fn fetch_optional_record(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
) -> Result<Option<Record>> {
    let row = bind_all(sql, params)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to fetch row", e))?;
    Ok(row.as_ref().map(record_from_row))
}

/// First column of the first row; `None` when there is no row.
pub async fn fetch_scalar(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
) -> Result<Option<Value>> {
    let row = bind_all(sql, params)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to fetch value", e))?;
    Ok(row.map(|r| column_value(&r, 0)))
}

pub async fn execute(conn: &mut SqliteConnection, sql: &str, params: &[Value]) -> Result<u64> {
    let result = bind_all(sql, params)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::from_sqlx("Statement failed", e))?;
    Ok(result.rows_affected())
}

pub async fn insert_values(
    conn: &mut SqliteConnection,
    table: &str,
    values: &[(String, Value)],
) -> Result<i64> {
    let sql = if values.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table))
    } else {
        let columns: Vec<String> = values.iter().map(|(c, _)| quote_identifier(c)).collect();
        let placeholders = vec!["?"; values.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            columns.join(", "),
            placeholders
        )
    };
    let params: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
    let result = bind_all(&sql, &params)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::from_sqlx(&format!("Failed to insert into {table}"), e))?;
    Ok(result.last_insert_rowid())
}

/// Returns the number of rows matched by `key_column = key`.
pub async fn update_values(
    conn: &mut SqliteConnection,
    table: &str,
    key_column: &str,
    key: &Value,
    values: &[(String, Value)],
) -> Result<u64> {
    if values.is_empty() {
        return Ok(0);
    }
    let assignments: Vec<String> = values
        .iter()
        .map(|(c, _)| format!("{} = ?", quote_identifier(c)))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_identifier(table),
        assignments.join(", "),
        quote_identifier(key_column)
    );
    let mut params: Vec<Value> = values.iter().map(|(_, v)| v.clone()).collect();
    params.push(key.clone());
    let result = bind_all(&sql, &params)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::from_sqlx(&format!("Failed to update {table}"), e))?;
    Ok(result.rows_affected())
}

pub async fn delete_by_key(
    conn: &mut SqliteConnection,
    table: &str,
    key_column: &str,
    key: &Value,
) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quote_identifier(table),
        quote_identifier(key_column)
    );
    let result = bind_all(&sql, std::slice::from_ref(key))
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::from_sqlx(&format!("Failed to delete from {table}"), e))?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::repository::test_repository;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_update_delete_round_trip() {
        let repo = test_repository().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        let id = insert_values(
            &mut conn,
            "building",
            &[
                ("name".to_string(), json!("Hauptgebäude")),
                ("building_number".to_string(), json!("H1")),
            ],
        )
        .await
        .unwrap();

        let changed = update_values(
            &mut conn,
            "building",
            "id",
            &json!(id),
            &[("address".to_string(), json!("Campusstraße 1"))],
        )
        .await
        .unwrap();
        assert_eq!(changed, 1);

        let rows = fetch_records(&mut conn, "SELECT * FROM building", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["address"], json!("Campusstraße 1"));
        assert_eq!(rows[0]["id"], json!(id));

        assert_eq!(
            delete_by_key(&mut conn, "building", "id", &json!(id)).await.unwrap(),
            1
        );
        assert_eq!(
            delete_by_key(&mut conn, "building", "id", &json!(id)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_values_keep_their_storage_type() {
        let repo = test_repository().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        insert_values(
            &mut conn,
            "object",
            &[
                ("name".to_string(), json!("Laptop")),
                ("price".to_string(), json!(999.5)),
                ("category_id".to_string(), Value::Null),
            ],
        )
        .await
        .unwrap();

        let row = fetch_optional_record(&mut conn, "SELECT name, price, category_id FROM object", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row["name"], json!("Laptop"));
        assert_eq!(row["price"], json!(999.5));
        assert_eq!(row["category_id"], Value::Null);

        let count = fetch_scalar(&mut conn, "SELECT COUNT(*) FROM object", &[])
            .await
            .unwrap();
        assert_eq!(count, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_foreign_key_violation_is_validation_error() {
        let repo = test_repository().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        let err = insert_values(
            &mut conn,
            "person_contact",
            &[("person_id".to_string(), json!(999))],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_not_null_violation_is_validation_error() {
        let repo = test_repository().await;
        let mut conn = repo.pool().acquire().await.unwrap();

        let room = insert_values(&mut conn, "room", &[("name".to_string(), json!("2.01"))])
            .await
            .unwrap();
        let err = insert_values(
            &mut conn,
            "room_layout",
            &[("room_id".to_string(), json!(room))],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("NOT NULL")));
    }
}
