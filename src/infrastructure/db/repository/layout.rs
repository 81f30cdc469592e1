use crate::domain::error::{AppError, Result};
use crate::domain::room_layout::{RoomLayout, Snapzone};

use super::entities::{RoomLayoutEntity, SnapzoneEntity};
use super::FacilityRepository;

impl FacilityRepository {
    pub async fn get_room_layout(&self, room_id: i64) -> Result<Option<RoomLayout>> {
        let layout = sqlx::query_as::<_, RoomLayoutEntity>(
            "SELECT id, room_id, x, y, width, height FROM room_layout WHERE room_id = ?",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch room layout: {}", e)))?;

        let Some(layout) = layout else {
            return Ok(None);
        };

        let zones = sqlx::query_as::<_, SnapzoneEntity>(
            "SELECT kind, x, y, width, height FROM snapzone WHERE room_layout_id = ? ORDER BY id",
        )
        .bind(layout.id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch snapzones: {}", e)))?;

        let snapzones = zones
            .into_iter()
            .map(Snapzone::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(layout.into_layout(snapzones)))
    }

    /// Replaces the stored layout of `layout.room_id` together with its
    /// snapzones.
    pub async fn save_room_layout(&self, layout: &RoomLayout) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM room_layout WHERE room_id = ?")
            .bind(layout.room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to clear room layout", e))?;

        let layout_id = sqlx::query(
            "INSERT INTO room_layout (room_id, x, y, width, height) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(layout.room_id)
        .bind(layout.x)
        .bind(layout.y)
        .bind(layout.width)
        .bind(layout.height)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::from_sqlx("Failed to save room layout", e))?
        .last_insert_rowid();

        for zone in &layout.snapzones {
            sqlx::query(
                "INSERT INTO snapzone (room_layout_id, kind, x, y, width, height) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(layout_id)
            .bind(zone.kind.as_str())
            .bind(zone.x)
            .bind(zone.y)
            .bind(zone.width)
            .bind(zone.height)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::from_sqlx("Failed to save snapzone", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit room layout: {}", e)))?;
        Ok(())
    }
}
