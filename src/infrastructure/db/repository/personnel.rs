use crate::domain::error::{AppError, Result};
use crate::domain::personnel::{
    Abteilung, AbteilungAssignment, AbteilungUpdate, NewAbteilung, NewPerson, Person, PersonUpdate,
};
use serde_json::Value;

use super::entities::{AbteilungEntity, PersonEntity};
use super::rows::update_values;
use super::FacilityRepository;

impl FacilityRepository {
    pub async fn insert_person(&self, person: &NewPerson, created_at: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO person (title, first_name, last_name, created_at, comment, image_url)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&person.title)
        .bind(&person.first_name)
        .bind(&person.last_name)
        .bind(created_at)
        .bind(&person.comment)
        .bind(&person.image_url)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to insert person", e))?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_person(&self, id: i64) -> Result<Person> {
        let person = sqlx::query_as::<_, PersonEntity>(
            "SELECT id, title, first_name, last_name, created_at, comment, image_url FROM person WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch person: {}", e)))?;

        match person {
            Some(person) => Ok(person.into()),
            None => Err(AppError::NotFound(format!("Person not found: {}", id))),
        }
    }

    /// Returns the number of matched rows; no assignments means no statement.
    pub async fn update_person(&self, update: &PersonUpdate) -> Result<u64> {
        let values: Vec<(String, Value)> = update
            .assignments()
            .into_iter()
            .map(|(column, value)| (column.to_string(), Value::String(value.to_string())))
            .collect();
        if values.is_empty() {
            return Ok(0);
        }
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to acquire connection: {}", e)))?;
        update_values(&mut conn, "person", "id", &Value::from(update.id), &values).await
    }

    pub async fn delete_person(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM person WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to delete person", e))?;
        Ok(result.rows_affected())
    }

    pub async fn insert_abteilung(&self, abteilung: &NewAbteilung) -> Result<i64> {
        let result = sqlx::query("INSERT INTO abteilung (name, abteilungsleiter_id) VALUES (?, ?)")
            .bind(&abteilung.name)
            .bind(abteilung.abteilungsleiter_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to insert abteilung", e))?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_abteilung(&self, id: i64) -> Result<Abteilung> {
        let abteilung = sqlx::query_as::<_, AbteilungEntity>(
            "SELECT id, name, abteilungsleiter_id FROM abteilung WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch abteilung: {}", e)))?;

        match abteilung {
            Some(abteilung) => Ok(abteilung.into()),
            None => Err(AppError::NotFound(format!("Abteilung not found: {}", id))),
        }
    }

    pub async fn update_abteilung(&self, update: &AbteilungUpdate) -> Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE abteilung
             SET name = COALESCE(?, name),
                 abteilungsleiter_id = COALESCE(?, abteilungsleiter_id)
             WHERE id = ?",
        )
        .bind(&update.name)
        .bind(update.abteilungsleiter_id)
        .bind(update.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to update abteilung", e))?;
        Ok(result.rows_affected())
    }

    pub async fn delete_abteilung(&self, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM abteilung WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to delete abteilung", e))?;
        Ok(result.rows_affected())
    }

    pub async fn assign_person_to_abteilung(&self, link: &AbteilungAssignment) -> Result<i64> {
        let result =
            sqlx::query("INSERT INTO person_to_abteilung (person_id, abteilung_id) VALUES (?, ?)")
                .bind(link.person_id)
                .bind(link.abteilung_id)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::from_sqlx("Failed to assign person to abteilung", e))?;
        Ok(result.last_insert_rowid())
    }

    pub async fn remove_person_from_abteilung(&self, link: &AbteilungAssignment) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM person_to_abteilung WHERE person_id = ? AND abteilung_id = ?")
                .bind(link.person_id)
                .bind(link.abteilung_id)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::from_sqlx("Failed to remove abteilung assignment", e))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::repository::test_repository;

    fn anna() -> NewPerson {
        NewPerson {
            title: Some("Dr.".to_string()),
            first_name: "Anna".to_string(),
            last_name: "Müller".to_string(),
            comment: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_person_crud() {
        let repo = test_repository().await;
        let id = repo.insert_person(&anna(), "2024-01-02 03:04:05").await.unwrap();

        let update = PersonUpdate {
            id,
            comment: Some("Raum wechselt".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.update_person(&update).await.unwrap(), 1);

        let person = repo.get_person(id).await.unwrap();
        assert_eq!(person.first_name.as_deref(), Some("Anna"));
        assert_eq!(person.comment.as_deref(), Some("Raum wechselt"));
        assert_eq!(person.created_at.as_deref(), Some("2024-01-02 03:04:05"));

        assert_eq!(repo.delete_person(id).await.unwrap(), 1);
        assert!(matches!(repo.get_person(id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_assignment_is_conflict() {
        let repo = test_repository().await;
        let person_id = repo.insert_person(&anna(), "2024-01-02 03:04:05").await.unwrap();
        let abteilung_id = repo
            .insert_abteilung(&NewAbteilung {
                name: "IT".to_string(),
                abteilungsleiter_id: Some(person_id),
            })
            .await
            .unwrap();
        let link = AbteilungAssignment {
            person_id,
            abteilung_id,
        };

        repo.assign_person_to_abteilung(&link).await.unwrap();
        let err = repo.assign_person_to_abteilung(&link).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert_eq!(repo.remove_person_from_abteilung(&link).await.unwrap(), 1);
        assert_eq!(repo.remove_person_from_abteilung(&link).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deleting_leader_clears_reference() {
        let repo = test_repository().await;
        let person_id = repo.insert_person(&anna(), "2024-01-02 03:04:05").await.unwrap();
        let abteilung_id = repo
            .insert_abteilung(&NewAbteilung {
                name: "IT".to_string(),
                abteilungsleiter_id: Some(person_id),
            })
            .await
            .unwrap();

        repo.delete_person(person_id).await.unwrap();
        let abteilung = repo.get_abteilung(abteilung_id).await.unwrap();
        assert_eq!(abteilung.abteilungsleiter_id, None);
    }
}
