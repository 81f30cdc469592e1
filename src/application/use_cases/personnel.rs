use crate::domain::error::{AppError, Result};
use crate::domain::personnel::{
    AbteilungAssignment, AbteilungUpdate, NewAbteilung, NewPerson, PersonUpdate,
};
use crate::domain::record::TIMESTAMP_FORMAT;
use crate::infrastructure::db::repository::FacilityRepository;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct PersonnelUseCase {
    repository: Arc<FacilityRepository>,
}

impl PersonnelUseCase {
    pub fn new(repository: Arc<FacilityRepository>) -> Self {
        Self { repository }
    }

    pub async fn insert_person(&self, person: NewPerson) -> Result<i64> {
        person.validate()?;
        let created_at = chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let id = self.repository.insert_person(&person, &created_at).await?;
        info!(person_id = id, "Person inserted");
        Ok(id)
    }

    /// Fields missing from `update` are left alone; an update without any
    /// field is a no-op.
    pub async fn update_person(&self, update: PersonUpdate) -> Result<()> {
        update.validate()?;
        if update.assignments().is_empty() {
            return Ok(());
        }
        if self.repository.update_person(&update).await? == 0 {
            return Err(AppError::NotFound(format!("Person not found: {}", update.id)));
        }
        Ok(())
    }

    pub async fn delete_person(&self, id: i64) -> Result<()> {
        if self.repository.delete_person(id).await? == 0 {
            return Err(AppError::NotFound(format!("Person not found: {}", id)));
        }
        info!(person_id = id, "Person deleted");
        Ok(())
    }

    pub async fn insert_abteilung(&self, abteilung: NewAbteilung) -> Result<i64> {
        abteilung.validate()?;
        let id = self.repository.insert_abteilung(&abteilung).await?;
        info!(abteilung_id = id, "Abteilung inserted");
        Ok(id)
    }

    pub async fn update_abteilung(&self, update: AbteilungUpdate) -> Result<()> {
        update.validate()?;
        if update.is_empty() {
            return Ok(());
        }
        if self.repository.update_abteilung(&update).await? == 0 {
            return Err(AppError::NotFound(format!("Abteilung not found: {}", update.id)));
        }
        Ok(())
    }

    pub async fn delete_abteilung(&self, id: i64) -> Result<()> {
        if self.repository.delete_abteilung(id).await? == 0 {
            return Err(AppError::NotFound(format!("Abteilung not found: {}", id)));
        }
        info!(abteilung_id = id, "Abteilung deleted");
        Ok(())
    }

    pub async fn assign_person_to_abteilung(&self, link: AbteilungAssignment) -> Result<i64> {
        self.repository.assign_person_to_abteilung(&link).await
    }

    pub async fn remove_person_from_abteilung(&self, link: AbteilungAssignment) -> Result<()> {
        if self.repository.remove_person_from_abteilung(&link).await? == 0 {
            return Err(AppError::NotFound(format!(
                "Person {} is not assigned to Abteilung {}",
                link.person_id, link.abteilung_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::repository::test_repository;

    async fn use_case() -> PersonnelUseCase {
        PersonnelUseCase::new(Arc::new(test_repository().await))
    }

    fn person(first: &str, last: &str) -> NewPerson {
        NewPerson {
            title: None,
            first_name: first.to_string(),
            last_name: last.to_string(),
            comment: None,
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_insert_sets_created_at() {
        let uc = use_case().await;
        let id = uc.insert_person(person("Anna", "Müller")).await.unwrap();
        let stored = uc.repository.get_person(id).await.unwrap();
        let created = stored.created_at.unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(&created, TIMESTAMP_FORMAT).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_person_is_rejected() {
        let uc = use_case().await;
        let err = uc.insert_person(person("", "Müller")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_empty_update_is_noop_and_missing_row_is_not_found() {
        let uc = use_case().await;
        uc.update_person(PersonUpdate {
            id: 42,
            ..Default::default()
        })
        .await
        .unwrap();

        let err = uc
            .update_person(PersonUpdate {
                id: 42,
                last_name: Some("Schulz".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(uc.delete_person(42).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deleting_person_cascades_assignments() {
        let uc = use_case().await;
        let person_id = uc.insert_person(person("Max", "Schmidt")).await.unwrap();
        let abteilung_id = uc
            .insert_abteilung(NewAbteilung {
                name: "IT".to_string(),
                abteilungsleiter_id: None,
            })
            .await
            .unwrap();
        uc.assign_person_to_abteilung(AbteilungAssignment {
            person_id,
            abteilung_id,
        })
        .await
        .unwrap();

        uc.delete_person(person_id).await.unwrap();
        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM person_to_abteilung")
            .fetch_one(uc.repository.pool())
            .await
            .unwrap();
        assert_eq!(links, 0);
    }

    #[tokio::test]
    async fn test_update_abteilung_keeps_untouched_fields() {
        let uc = use_case().await;
        let leader = uc.insert_person(person("Anna", "Müller")).await.unwrap();
        let id = uc
            .insert_abteilung(NewAbteilung {
                name: "IT".to_string(),
                abteilungsleiter_id: Some(leader),
            })
            .await
            .unwrap();

        uc.update_abteilung(AbteilungUpdate {
            id,
            name: Some("IT-Service".to_string()),
            abteilungsleiter_id: None,
        })
        .await
        .unwrap();

        let stored = uc.repository.get_abteilung(id).await.unwrap();
        assert_eq!(stored.name.as_deref(), Some("IT-Service"));
        assert_eq!(stored.abteilungsleiter_id, Some(leader));
    }
}
