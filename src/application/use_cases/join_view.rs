use crate::application::use_cases::join_query::{
    build_join_query, build_link_lookup, group_updates_by_table,
};
use crate::application::use_cases::table_editor::load_select_options;
use crate::domain::error::{AppError, Result};
use crate::domain::join_view::{JoinView, JoinViewRegistry, JoinViewSummary};
use crate::domain::record::{coerce_assignments, coerce_value, Record};
use crate::domain::schema::{quote_identifier, SelectOption, TableSchema};
use crate::infrastructure::db::repository::introspection::describe_table;
use crate::infrastructure::db::repository::rows::{
    delete_by_key, fetch_records, fetch_scalar, insert_values, update_values,
};
use crate::infrastructure::db::repository::FacilityRepository;
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteConnection;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct JoinViewData {
    pub view: String,
    pub primary_key: String,
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinUpdateResult {
    pub success: bool,
    pub updated_tables: Vec<String>,
    pub ignored: Vec<String>,
}

async fn table_schema(conn: &mut SqliteConnection, table: &str) -> Result<TableSchema> {
    describe_table(conn, table)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Table '{table}' does not exist")))
}

fn coerce_view_key(view: &JoinView, schema: &TableSchema, key: &Value) -> Result<Value> {
    let column = schema.column(view.primary_key_column()).ok_or_else(|| {
        AppError::ConfigError(format!(
            "View '{}': key column '{}' missing in '{}'",
            view.name,
            view.primary_key_column(),
            view.base_table
        ))
    })?;
    let coerced = coerce_value(column, key)?;
    if coerced.is_null() {
        return Err(AppError::ValidationError(format!(
            "primary key '{}' missing",
            view.primary_key
        )));
    }
    Ok(coerced)
}

pub struct JoinViewUseCase {
    repository: Arc<FacilityRepository>,
    registry: Arc<JoinViewRegistry>,
}

impl JoinViewUseCase {
    pub fn new(repository: Arc<FacilityRepository>, registry: Arc<JoinViewRegistry>) -> Self {
        Self {
            repository,
            registry,
        }
    }

    pub fn registry(&self) -> &JoinViewRegistry {
        &self.registry
    }

    pub fn list_views(&self) -> Vec<JoinViewSummary> {
        self.registry.summaries()
    }

    pub async fn fetch_view(&self, name: &str) -> Result<JoinViewData> {
        let view = self.registry.get(name)?;
        let query = build_join_query(view);
        debug!(view = %name, sql = %query.sql, "Fetching join view");

        let mut conn = self.acquire().await?;
        let rows = fetch_records(&mut conn, &query.sql, &query.params).await?;
        Ok(JoinViewData {
            view: view.name.clone(),
            primary_key: view.primary_key.clone(),
            columns: view.output_names().into_iter().map(String::from).collect(),
            rows,
        })
    }

    /// Options for every `*_id` field of the view that points at another
    /// table, either through a join key or a foreign key.
    pub async fn fetch_select_options(&self, name: &str) -> Result<BTreeMap<String, Vec<SelectOption>>> {
        let view = self.registry.get(name)?;
        let mut conn = self.acquire().await?;
        let mut options = BTreeMap::new();

        for column in view.columns.iter().filter(|c| c.output.ends_with("_id")) {
            let Some(table) = view.table_for_alias(&column.alias) else {
                continue;
            };

            let join_key = view
                .join_for_alias(&column.alias)
                .and_then(|j| j.on.split_for(&j.alias))
                .filter(|(joined, _)| joined.column == column.column);

            let (target_table, key_column) = if join_key.is_some() {
                (table.to_string(), column.column.clone())
            } else {
                let schema = table_schema(&mut conn, table).await?;
                match schema.foreign_key(&column.column) {
                    Some(fk) => (fk.ref_table.clone(), fk.ref_column.clone()),
                    None => continue,
                }
            };

            let target = table_schema(&mut conn, &target_table).await?;
            let entries = load_select_options(&mut conn, &target, &key_column).await?;
            options.insert(column.output.clone(), entries);
        }
        Ok(options)
    }

    /// Applies an edited view row to its underlying tables in one
    /// transaction. Joined rows are located through their join condition;
    /// a joined row that does not exist yet is inserted.
    pub async fn update_view_row(&self, name: &str, data: &Record) -> Result<JoinUpdateResult> {
        let view = self.registry.get(name)?;
        let plan = group_updates_by_table(view, data)?;

        let mut tx = self
            .repository
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        let base_schema = table_schema(&mut tx, &view.base_table).await?;
        let key = coerce_view_key(view, &base_schema, &plan.key)?;
        let key_column = view.primary_key_column();
        let mut updated_tables: Vec<String> = Vec::new();

        let not_found = || {
            AppError::NotFound(format!(
                "Row {} not found in view '{}'",
                plan.key, view.name
            ))
        };
        match plan.base(view) {
            Some(base) => {
                let values = coerce_assignments(&base_schema, &base.values)?;
                let affected = update_values(&mut tx, &view.base_table, key_column, &key, &values).await?;
                if affected == 0 {
                    return Err(not_found());
                }
                updated_tables.push(view.base_table.clone());
            }
            None => {
                let sql = format!(
                    "SELECT 1 FROM {} WHERE {} = ?",
                    quote_identifier(&view.base_table),
                    quote_identifier(key_column)
                );
                if fetch_scalar(&mut tx, &sql, std::slice::from_ref(&key)).await?.is_none() {
                    return Err(not_found());
                }
            }
        }

        for group in plan.joined(view) {
            let join = view.join_for_alias(&group.alias).ok_or_else(|| {
                AppError::ConfigError(format!("View '{}': no join for '{}'", view.name, group.alias))
            })?;
            let (joined, _) = join.on.split_for(&join.alias).ok_or_else(|| {
                AppError::ConfigError(format!("Join '{}' does not reference itself", join.alias))
            })?;

            let lookup = build_link_lookup(view, join, &key)?;
            let link = fetch_scalar(&mut tx, &lookup.sql, &lookup.params)
                .await?
                .filter(|v| !v.is_null())
                .ok_or_else(|| AppError::NotFound(format!("no linked row in {}", group.table)))?;

            let schema = table_schema(&mut tx, &group.table).await?;
            let values = coerce_assignments(&schema, &group.values)?;
            let affected = update_values(&mut tx, &group.table, &joined.column, &link, &values).await?;
            if affected == 0 {
                let mut row = vec![(joined.column.clone(), link.clone())];
                row.extend(values.into_iter().filter(|(c, _)| c != &joined.column));
                insert_values(&mut tx, &group.table, &row).await?;
                debug!(table = %group.table, link = %link, "Inserted missing joined row");
            }
            if !updated_tables.contains(&group.table) {
                updated_tables.push(group.table.clone());
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit view update: {}", e)))?;

        info!(view = %view.name, key = %key, tables = ?updated_tables, "View row updated");
        Ok(JoinUpdateResult {
            success: true,
            updated_tables,
            ignored: plan.ignored,
        })
    }

    /// Inserts the base-table fields of `data`; the key is always assigned
    /// by the database.
    pub async fn insert_view_row(&self, name: &str, data: &Record) -> Result<i64> {
        let view = self.registry.get(name)?;
        let fields = view.column_field_mapping();
        let key_column = view.primary_key_column();

        let values: Vec<(String, Value)> = data
            .iter()
            .filter(|(field, _)| *field != &view.primary_key)
            .filter_map(|(field, value)| {
                fields
                    .get(field)
                    .filter(|src| src.alias == view.base_alias && src.column != key_column)
                    .map(|src| (src.column.clone(), value.clone()))
            })
            .collect();

        let mut conn = self.acquire().await?;
        let schema = table_schema(&mut conn, &view.base_table).await?;
        let values = coerce_assignments(&schema, &values)?;
        let id = insert_values(&mut conn, &view.base_table, &values).await?;
        info!(view = %view.name, id, "View row inserted");
        Ok(id)
    }

    pub async fn delete_view_row(&self, name: &str, key: &Value) -> Result<()> {
        let view = self.registry.get(name)?;
        let mut conn = self.acquire().await?;
        let schema = table_schema(&mut conn, &view.base_table).await?;
        let key = coerce_view_key(view, &schema, key)?;
        let affected = delete_by_key(&mut conn, &view.base_table, view.primary_key_column(), &key).await?;
        if affected == 0 {
            return Err(AppError::NotFound(format!(
                "Row {} not found in view '{}'",
                key, view.name
            )));
        }
        info!(view = %view.name, key = %key, "View row deleted");
        Ok(())
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Sqlite>> {
        self.repository
            .pool()
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to acquire connection: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::repository::test_repository;
    use serde_json::json;

    async fn use_case() -> JoinViewUseCase {
        let repo = Arc::new(test_repository().await);
        repo.seed_demo_data().await.unwrap();
        let registry =
            JoinViewRegistry::from_json(include_str!("../../../resources/join_views.json")).unwrap();
        registry.verify_against(&repo.schema_map().await.unwrap()).unwrap();
        JoinViewUseCase::new(repo, Arc::new(registry))
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn count(uc: &JoinViewUseCase, sql: &str) -> i64 {
        sqlx::query_scalar(sql)
            .fetch_one(uc.repository.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_every_embedded_view_runs() {
        let uc = use_case().await;
        for name in uc.registry().names() {
            let data = uc.fetch_view(name).await.unwrap();
            assert_eq!(data.view, name);
            if let Some(row) = data.rows.first() {
                assert_eq!(row.len(), data.columns.len());
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_view_rows() {
        let uc = use_case().await;
        let data = uc.fetch_view("transponder_with_owner_and_rooms").await.unwrap();
        assert_eq!(data.primary_key, "transponder_id");
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[0]["owner_first_name"], json!("Anna"));
        assert!(matches!(uc.fetch_view("nope").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_base_and_link_tables() {
        let uc = use_case().await;
        let result = uc
            .update_view_row(
                "person_contact",
                &record(json!({ "id": 1, "last_name": "Meyer", "email": "anna@uni.de" })),
            )
            .await
            .unwrap();
        assert_eq!(result.updated_tables, vec!["person", "person_contact"]);

        let data = uc.fetch_view("person_contact").await.unwrap();
        let anna = data.rows.iter().find(|r| r["id"] == json!(1)).unwrap();
        assert_eq!(anna["last_name"], json!("Meyer"));
        assert_eq!(anna["email"], json!("anna@uni.de"));
        assert_eq!(anna["phone"], json!("1234"));
    }

    #[tokio::test]
    async fn test_update_inserts_missing_joined_row() {
        let uc = use_case().await;
        // Max (id 2) has no contact row yet.
        uc.update_view_row("person_contact", &record(json!({ "id": "2", "phone": "555" })))
            .await
            .unwrap();
        assert_eq!(
            count(&uc, "SELECT COUNT(*) FROM person_contact WHERE person_id = 2 AND phone = '555'").await,
            1
        );
    }

    #[tokio::test]
    async fn test_link_field_moves_assignment() {
        let uc = use_case().await;
        sqlx::query("INSERT INTO abteilung (id, name) VALUES (5, 'Verwaltung')")
            .execute(uc.repository.pool())
            .await
            .unwrap();

        let result = uc
            .update_view_row(
                "person_abteilung",
                &record(json!({ "id": 2, "abteilung_id": 5, "abteilungsname": "Zentrale Verwaltung" })),
            )
            .await
            .unwrap();
        assert_eq!(result.updated_tables, vec!["person_to_abteilung", "abteilung"]);
        assert_eq!(
            count(&uc, "SELECT COUNT(*) FROM person_to_abteilung WHERE person_id = 2 AND abteilung_id = 5").await,
            1
        );
        assert_eq!(
            count(&uc, "SELECT COUNT(*) FROM abteilung WHERE id = 5 AND name = 'Zentrale Verwaltung'").await,
            1
        );
    }

    #[tokio::test]
    async fn test_joined_update_uses_oldest_link_row() {
        let uc = use_case().await;
        sqlx::query("INSERT INTO abteilung (id, name) VALUES (6, 'Lehre')")
            .execute(uc.repository.pool())
            .await
            .unwrap();
        // Lowest rowid even though it was inserted last.
        sqlx::query("INSERT INTO person_to_abteilung (id, person_id, abteilung_id) VALUES (0, 1, 6)")
            .execute(uc.repository.pool())
            .await
            .unwrap();

        uc.update_view_row(
            "person_abteilung",
            &record(json!({ "id": 1, "abteilungsname": "Lehre und Forschung" })),
        )
        .await
        .unwrap();
        assert_eq!(
            count(&uc, "SELECT COUNT(*) FROM abteilung WHERE id = 6 AND name = 'Lehre und Forschung'").await,
            1
        );
        assert_eq!(count(&uc, "SELECT COUNT(*) FROM abteilung WHERE name = 'IT'").await, 1);
    }

    #[tokio::test]
    async fn test_failed_update_rolls_back() {
        let uc = use_case().await;
        let err = uc
            .update_view_row("person_contact", &record(json!({ "id": 99, "first_name": "X" })))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = uc
            .update_view_row(
                "person_to_room",
                &record(json!({ "id": 1, "person_id": 2, "room_id": 404 })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(
            count(&uc, "SELECT COUNT(*) FROM person_to_room WHERE person_id = 1").await,
            1
        );
    }

    #[tokio::test]
    async fn test_select_options() {
        let uc = use_case().await;
        let options = uc.fetch_select_options("person_abteilung").await.unwrap();
        assert_eq!(options["abteilung_id"][0].label, "IT");
        assert_eq!(options["abteilungsleiter_id"].len(), 2);

        let transponder = uc.fetch_select_options("transponder").await.unwrap();
        assert!(transponder.contains_key("owner_id"));
        assert!(transponder.contains_key("issuer_id"));
    }

    #[tokio::test]
    async fn test_insert_and_delete_view_row() {
        let uc = use_case().await;
        let id = uc
            .insert_view_row(
                "room",
                &record(json!({ "id": 77, "name": "3.01", "floor": "3", "building_name": "ignored" })),
            )
            .await
            .unwrap();
        assert_ne!(id, 77);

        uc.delete_view_row("room", &json!(id)).await.unwrap();
        assert!(matches!(
            uc.delete_view_row("room", &json!(id)).await,
            Err(AppError::NotFound(_))
        ));
    }
}
