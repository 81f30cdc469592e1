use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: Option<String>,
    pub comment: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPerson {
    #[validate(length(max = 64))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255))]
    pub last_name: String,
    #[validate(length(max = 4000))]
    pub comment: Option<String>,
    #[validate(length(max = 1024))]
    pub image_url: Option<String>,
}

/// Partial update: fields left out keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PersonUpdate {
    pub id: i64,
    #[validate(length(max = 64))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub last_name: Option<String>,
    #[validate(length(max = 4000))]
    pub comment: Option<String>,
    #[validate(length(max = 1024))]
    pub image_url: Option<String>,
}

impl PersonUpdate {
    pub fn assignments(&self) -> Vec<(&'static str, &str)> {
        [
            ("title", &self.title),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("comment", &self.comment),
            ("image_url", &self.image_url),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.as_deref().map(|v| (column, v)))
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Abteilung {
    pub id: i64,
    pub name: Option<String>,
    pub abteilungsleiter_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAbteilung {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub abteilungsleiter_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AbteilungUpdate {
    pub id: i64,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub abteilungsleiter_id: Option<i64>,
}

impl AbteilungUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.abteilungsleiter_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AbteilungAssignment {
    pub person_id: i64,
    pub abteilung_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_person_requires_names() {
        let person = NewPerson {
            title: None,
            first_name: String::new(),
            last_name: "Meier".to_string(),
            comment: None,
            image_url: None,
        };
        assert!(person.validate().is_err());
    }

    #[test]
    fn test_person_update_assignments_skip_absent_fields() {
        let update = PersonUpdate {
            id: 3,
            last_name: Some("Schulz".to_string()),
            comment: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            update.assignments(),
            vec![("last_name", "Schulz"), ("comment", "")]
        );
        assert!(PersonUpdate::default().assignments().is_empty());
    }

    #[test]
    fn test_abteilung_update_emptiness() {
        assert!(AbteilungUpdate::default().is_empty());
        let update = AbteilungUpdate {
            id: 1,
            abteilungsleiter_id: Some(2),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
