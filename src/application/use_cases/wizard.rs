//! Guided multi-table entry. Each wizard runs in a single transaction so a
//! bad reference leaves nothing behind.

use crate::domain::error::{AppError, Result};
use crate::domain::record::{parse_date, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::domain::wizard::{PersonWizardInput, TransponderWizardInput, WizardOutcome};
use crate::infrastructure::db::repository::rows::insert_values;
use crate::infrastructure::db::repository::FacilityRepository;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

fn opt_text(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn pair(column: &str, value: Value) -> (String, Value) {
    (column.to_string(), value)
}

pub struct WizardUseCase {
    repository: Arc<FacilityRepository>,
}

impl WizardUseCase {
    pub fn new(repository: Arc<FacilityRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_person(&self, input: PersonWizardInput) -> Result<WizardOutcome> {
        input.validate()?;
        let created_at = chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string();

        let mut tx = self.begin().await?;
        let person_id = insert_values(
            &mut tx,
            "person",
            &[
                pair("title", opt_text(&input.title)),
                pair("first_name", Value::String(input.first_name.clone())),
                pair("last_name", Value::String(input.last_name.clone())),
                pair("created_at", Value::String(created_at)),
                pair("comment", opt_text(&input.comment)),
            ],
        )
        .await?;

        let mut linked = Vec::new();
        if input.has_contact() {
            insert_values(
                &mut tx,
                "person_contact",
                &[
                    pair("person_id", Value::from(person_id)),
                    pair("phone", opt_text(&input.phone)),
                    pair("fax", opt_text(&input.fax)),
                    pair("email", opt_text(&input.email)),
                ],
            )
            .await?;
            linked.push("person_contact".to_string());
        }

        let links = [
            ("person_to_abteilung", "abteilung_id", input.abteilung_id),
            ("person_to_room", "room_id", input.room_id),
            ("professorship_to_person", "professorship_id", input.professorship_id),
        ];
        for (table, column, target) in links {
            let Some(target) = target else { continue };
            insert_values(
                &mut tx,
                table,
                &[
                    pair("person_id", Value::from(person_id)),
                    pair(column, Value::from(target)),
                ],
            )
            .await?;
            linked.push(table.to_string());
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit person wizard: {}", e)))?;

        info!(person_id, linked = ?linked, "Person wizard completed");
        Ok(WizardOutcome {
            success: true,
            id: person_id,
            linked,
        })
    }

    pub async fn create_transponder(&self, input: TransponderWizardInput) -> Result<WizardOutcome> {
        input.validate()?;
        let got_date = match input.got_date.as_deref() {
            None => Value::Null,
            Some(raw) => parse_date(raw)
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .ok_or_else(|| AppError::ValidationError(format!("Invalid got_date: {raw}")))?,
        };

        let mut tx = self.begin().await?;
        let transponder_id = insert_values(
            &mut tx,
            "transponder",
            &[
                pair("serial_number", Value::String(input.serial_number.clone())),
                pair("issuer_id", input.issuer_id.map(Value::from).unwrap_or(Value::Null)),
                pair("owner_id", input.owner_id.map(Value::from).unwrap_or(Value::Null)),
                pair("got_date", got_date),
                pair("comment", opt_text(&input.comment)),
            ],
        )
        .await?;

        let mut linked = Vec::with_capacity(input.room_ids.len());
        for room_id in &input.room_ids {
            insert_values(
                &mut tx,
                "transponder_to_room",
                &[
                    pair("transponder_id", Value::from(transponder_id)),
                    pair("room_id", Value::from(*room_id)),
                ],
            )
            .await?;
            linked.push(format!("room:{room_id}"));
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to commit transponder wizard: {}", e))
        })?;

        info!(transponder_id, rooms = input.room_ids.len(), "Transponder wizard completed");
        Ok(WizardOutcome {
            success: true,
            id: transponder_id,
            linked,
        })
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'_, sqlx::Sqlite>> {
        self.repository
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))
    }
}
