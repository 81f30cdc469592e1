use crate::domain::error::AppError;
use crate::domain::personnel::{Abteilung, Person};
use crate::domain::room_layout::{RoomLayout, Snapzone, SnapzoneKind};

#[derive(sqlx::FromRow)]
pub(super) struct PersonEntity {
    id: i64,
    title: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: Option<String>,
    comment: Option<String>,
    image_url: Option<String>,
}

impl From<PersonEntity> for Person {
    fn from(entity: PersonEntity) -> Self {
        Self {
            id: entity.id,
            title: entity.title,
            first_name: entity.first_name,
            last_name: entity.last_name,
            created_at: entity.created_at,
            comment: entity.comment,
            image_url: entity.image_url,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct AbteilungEntity {
    id: i64,
    name: Option<String>,
    abteilungsleiter_id: Option<i64>,
}

impl From<AbteilungEntity> for Abteilung {
    fn from(entity: AbteilungEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            abteilungsleiter_id: entity.abteilungsleiter_id,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct RoomLayoutEntity {
    pub(super) id: i64,
    room_id: i64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl RoomLayoutEntity {
    pub(super) fn into_layout(self, snapzones: Vec<Snapzone>) -> RoomLayout {
        RoomLayout {
            room_id: self.room_id,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            snapzones,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct SnapzoneEntity {
    kind: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl TryFrom<SnapzoneEntity> for Snapzone {
    type Error = AppError;

    fn try_from(entity: SnapzoneEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: entity.kind.parse::<SnapzoneKind>()?,
            x: entity.x,
            y: entity.y,
            width: entity.width,
            height: entity.height,
        })
    }
}
