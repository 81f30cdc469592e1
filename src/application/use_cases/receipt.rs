use crate::domain::error::{AppError, Result};
use crate::domain::receipt::{IssuanceReceipt, ReceiptKind};
use crate::domain::record::{display_value, Record};
use crate::infrastructure::db::repository::rows::fetch_optional_record;
use crate::infrastructure::db::repository::FacilityRepository;
use crate::infrastructure::pdf::ReceiptPdfRenderer;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

const TRANSPONDER_SQL: &str = "SELECT t.id, t.serial_number, t.got_date, \
    TRIM(COALESCE(o.first_name, '') || ' ' || COALESCE(o.last_name, '')) AS owner, \
    TRIM(COALESCE(i.first_name, '') || ' ' || COALESCE(i.last_name, '')) AS issuer, \
    (SELECT GROUP_CONCAT(r.name, ', ') FROM transponder_to_room ttr \
       JOIN room r ON r.id = ttr.room_id WHERE ttr.transponder_id = t.id) AS rooms \
    FROM transponder t \
    LEFT JOIN person o ON o.id = t.owner_id \
    LEFT JOIN person i ON i.id = t.issuer_id \
    WHERE t.id = ?";

const INVENTORY_SQL: &str = "SELECT inv.id, inv.serial_number, inv.got_date, inv.anlagennummer, \
    TRIM(COALESCE(o.first_name, '') || ' ' || COALESCE(o.last_name, '')) AS owner, \
    TRIM(COALESCE(i.first_name, '') || ' ' || COALESCE(i.last_name, '')) AS issuer, \
    obj.name AS object, c.name AS category, k.name AS kostenstelle \
    FROM inventory inv \
    LEFT JOIN person o ON o.id = inv.owner_id \
    LEFT JOIN person i ON i.id = inv.issuer_id \
    LEFT JOIN object obj ON obj.id = inv.object_id \
    LEFT JOIN object_category c ON c.id = obj.category_id \
    LEFT JOIN kostenstelle k ON k.id = inv.kostenstelle_id \
    WHERE inv.id = ?";

/// A rendered receipt ready to be sent as an attachment.
pub struct ReceiptDocument {
    pub filename: String,
    pub receipt_number: String,
    pub bytes: Vec<u8>,
}

fn detail_keys(kind: ReceiptKind) -> &'static [&'static str] {
    match kind {
        ReceiptKind::Transponder => &["rooms", "got_date"],
        ReceiptKind::Inventory => &["object", "category", "anlagennummer", "kostenstelle", "got_date"],
    }
}

fn receipt_from_record(kind: ReceiptKind, id: i64, record: &Record) -> IssuanceReceipt {
    let details = detail_keys(kind)
        .iter()
        .filter_map(|key| {
            let value = display_value(record.get(*key));
            (!value.is_empty()).then(|| (key.to_string(), value))
        })
        .collect();

    IssuanceReceipt {
        kind,
        subject_id: id,
        receipt_number: uuid::Uuid::new_v4().to_string(),
        issued_on: chrono::Local::now().date_naive(),
        owner: display_value(record.get("owner")),
        issuer: display_value(record.get("issuer")),
        serial_number: display_value(record.get("serial_number")),
        details,
    }
}

pub struct ReceiptUseCase {
    repository: Arc<FacilityRepository>,
    renderer: ReceiptPdfRenderer,
}

impl ReceiptUseCase {
    pub fn new(repository: Arc<FacilityRepository>, renderer: ReceiptPdfRenderer) -> Self {
        Self {
            repository,
            renderer,
        }
    }

    pub async fn build_receipt(&self, kind: ReceiptKind, id: i64) -> Result<IssuanceReceipt> {
        let sql = match kind {
            ReceiptKind::Transponder => TRANSPONDER_SQL,
            ReceiptKind::Inventory => INVENTORY_SQL,
        };
        let mut conn = self
            .repository
            .pool()
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to acquire connection: {}", e)))?;
        let record = fetch_optional_record(&mut conn, sql, &[Value::from(id)])
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", kind.as_str(), id)))?;
        Ok(receipt_from_record(kind, id, &record))
    }

    pub async fn generate_pdf(&self, kind: ReceiptKind, id: i64) -> Result<ReceiptDocument> {
        let receipt = self.build_receipt(kind, id).await?;
        let bytes = self.renderer.render(&receipt)?;
        info!(
            kind = kind.as_str(),
            id,
            receipt_number = %receipt.receipt_number,
            size = bytes.len(),
            "Receipt generated"
        );
        Ok(ReceiptDocument {
            filename: receipt.filename(),
            receipt_number: receipt.receipt_number,
            bytes,
        })
    }
}
