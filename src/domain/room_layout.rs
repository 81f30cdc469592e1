//! Map editor persistence: a room rectangle on the floor plan plus the snap
//! zones furniture can be dropped onto.

use crate::domain::error::AppError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapzoneKind {
    Laptop,
    Stuhl,
    Tisch,
}

impl SnapzoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapzoneKind::Laptop => "laptop",
            SnapzoneKind::Stuhl => "stuhl",
            SnapzoneKind::Tisch => "tisch",
        }
    }
}

impl FromStr for SnapzoneKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "laptop" => Ok(SnapzoneKind::Laptop),
            "stuhl" => Ok(SnapzoneKind::Stuhl),
            "tisch" => Ok(SnapzoneKind::Tisch),
            other => Err(AppError::ValidationError(format!(
                "Unknown snapzone kind: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Snapzone {
    pub kind: SnapzoneKind,
    pub x: f64,
    pub y: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub width: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RoomLayout {
    /// Taken from the route when saving.
    #[serde(default)]
    pub room_id: i64,
    pub x: f64,
    pub y: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub width: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub height: f64,
    #[serde(default)]
    #[validate(nested)]
    pub snapzones: Vec<Snapzone>,
}
