use crate::domain::error::{AppError, Result};
use crate::domain::room_layout::RoomLayout;
use crate::infrastructure::db::repository::FacilityRepository;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct RoomLayoutUseCase {
    repository: Arc<FacilityRepository>,
}

impl RoomLayoutUseCase {
    pub fn new(repository: Arc<FacilityRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_layout(&self, room_id: i64) -> Result<RoomLayout> {
        self.repository
            .get_room_layout(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No layout for room {room_id}")))
    }

    /// The route's room id wins over whatever the body carries.
    pub async fn save_layout(&self, room_id: i64, mut layout: RoomLayout) -> Result<RoomLayout> {
        layout.validate()?;
        layout.room_id = room_id;
        self.repository.save_room_layout(&layout).await?;
        info!(room_id, snapzones = layout.snapzones.len(), "Room layout saved");
        Ok(layout)
    }
}
