//! Inputs of the guided entry forms. Ids arrive from HTML selects, so an
//! empty string means "not chosen".

use crate::domain::record::parse_optional_int;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PersonWizardInput {
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 64))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub first_name: String,
    #[validate(length(min = 1, max = 255))]
    pub last_name: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 64))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 64))]
    pub fax: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    pub abteilung_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_id")]
    pub room_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_id")]
    pub professorship_id: Option<i64>,
}

impl PersonWizardInput {
    pub fn has_contact(&self) -> bool {
        self.phone.is_some() || self.fax.is_some() || self.email.is_some()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransponderWizardInput {
    #[validate(length(min = 1, max = 255))]
    pub serial_number: String,
    #[serde(default, deserialize_with = "optional_id")]
    pub issuer_id: Option<i64>,
    #[serde(default, deserialize_with = "optional_id")]
    pub owner_id: Option<i64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub got_date: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "id_list")]
    pub room_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WizardOutcome {
    pub success: bool,
    pub id: i64,
    pub linked: Vec<String>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => parse_optional_int(Some(&v))
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid id: {v}"))),
    }
}

fn id_list<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut ids = Vec::with_capacity(values.len());
    for v in values {
        match parse_optional_int(Some(&v)) {
            Some(id) => {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            None if v.is_null() || v.as_str().is_some_and(|s| s.trim().is_empty()) => {}
            None => return Err(serde::de::Error::custom(format!("invalid id: {v}"))),
        }
    }
    Ok(ids)
}
