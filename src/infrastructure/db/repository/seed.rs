//! Demo data for a fresh installation: two people, one department, a room
//! pair and a transponder that opens both rooms.

use super::FacilityRepository;
use crate::domain::error::{AppError, Result};
use crate::domain::record::TIMESTAMP_FORMAT;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnection;

use super::rows::bind_value;

async fn insert(conn: &mut SqliteConnection, sql: &str, binds: &[Value]) -> Result<i64> {
    let query = binds
        .iter()
        .fold(sqlx::query(sql), |query, value| bind_value(query, value));
    let result = query
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to insert demo data", e))?;
    Ok(result.last_insert_rowid())
}

impl FacilityRepository {
    /// Seeds only when `person` is empty. Returns whether anything was written.
    pub async fn seed_demo_data(&self) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        let people: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM person")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to count people: {}", e)))?;
        if people > 0 {
            return Ok(false);
        }

        let now = chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let person_sql = "INSERT INTO person (first_name, last_name, created_at) VALUES (?, ?, ?)";
        let anna = insert(&mut tx, person_sql, &[json!("Anna"), json!("Müller"), json!(now)]).await?;
        let max = insert(&mut tx, person_sql, &[json!("Max"), json!("Schmidt"), json!(now)]).await?;

        let it = insert(
            &mut tx,
            "INSERT INTO abteilung (name, abteilungsleiter_id) VALUES (?, ?)",
            &[json!("IT"), json!(anna)],
        )
        .await?;
        for person in [anna, max] {
            insert(
                &mut tx,
                "INSERT INTO person_to_abteilung (person_id, abteilung_id) VALUES (?, ?)",
                &[json!(person), json!(it)],
            )
            .await?;
        }

        let prof = insert(
            &mut tx,
            "INSERT INTO professorship (name) VALUES (?)",
            &[json!("AI Research")],
        )
        .await?;
        for person in [anna, max] {
            insert(
                &mut tx,
                "INSERT INTO professorship_to_person (professorship_id, person_id) VALUES (?, ?)",
                &[json!(prof), json!(person)],
            )
            .await?;
        }

        let building = insert(
            &mut tx,
            "INSERT INTO building (name, building_number, address) VALUES (?, ?, ?)",
            &[json!("Hauptgebäude"), json!("H1"), json!("Campusstraße 1")],
        )
        .await?;
        let room_sql = "INSERT INTO room (name, floor, building_id) VALUES (?, 2, ?)";
        let room1 = insert(&mut tx, room_sql, &[json!("2.01"), json!(building)]).await?;
        let room2 = insert(&mut tx, room_sql, &[json!("2.02"), json!(building)]).await?;

        insert(
            &mut tx,
            "INSERT INTO person_to_room (person_id, room_id) VALUES (?, ?)",
            &[json!(anna), json!(room1)],
        )
        .await?;

        let transponder = insert(
            &mut tx,
            "INSERT INTO transponder (issuer_id, owner_id, serial_number) VALUES (?, ?, ?)",
            &[json!(max), json!(anna), json!("T-123")],
        )
        .await?;
        for room in [room1, room2] {
            insert(
                &mut tx,
                "INSERT INTO transponder_to_room (transponder_id, room_id) VALUES (?, ?)",
                &[json!(transponder), json!(room)],
            )
            .await?;
        }

        insert(
            &mut tx,
            "INSERT INTO person_contact (person_id, email, phone) VALUES (?, ?, ?)",
            &[json!(anna), json!("anna@example.com"), json!("1234")],
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit demo data: {}", e)))?;

        tracing::info!("Seeded demo data");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::infrastructure::db::repository::test_repository;

    #[tokio::test]
    async fn test_seed_runs_once() {
        let repo = test_repository().await;
        assert!(repo.seed_demo_data().await.unwrap());
        assert!(!repo.seed_demo_data().await.unwrap());

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transponder_to_room")
            .fetch_one(repo.pool())
            .await
            .unwrap();
        assert_eq!(links, 2);
    }
}
