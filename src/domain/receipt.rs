use crate::domain::error::AppError;
use chrono::NaiveDate;
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptKind {
    Transponder,
    Inventory,
}

impl ReceiptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptKind::Transponder => "transponder",
            ReceiptKind::Inventory => "inventory",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReceiptKind::Transponder => "Ausgabebeleg Transponder",
            ReceiptKind::Inventory => "Ausgabebeleg Inventar",
        }
    }
}

impl FromStr for ReceiptKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transponder" => Ok(ReceiptKind::Transponder),
            "inventory" => Ok(ReceiptKind::Inventory),
            other => Err(AppError::NotFound(format!("Unknown receipt kind: {other}"))),
        }
    }
}

/// Everything printed on an issuance receipt. `details` holds the
/// kind-specific lines (rooms for transponders, object data for inventory).
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceReceipt {
    pub kind: ReceiptKind,
    pub subject_id: i64,
    pub receipt_number: String,
    pub issued_on: NaiveDate,
    pub owner: String,
    pub issuer: String,
    pub serial_number: String,
    pub details: Vec<(String, String)>,
}

impl IssuanceReceipt {
    /// AcroForm field name -> value.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("receipt_number".to_string(), self.receipt_number.clone()),
            ("date".to_string(), self.issued_on.format("%d.%m.%Y").to_string()),
            ("owner".to_string(), self.owner.clone()),
            ("issuer".to_string(), self.issuer.clone()),
            ("serial_number".to_string(), self.serial_number.clone()),
        ];
        fields.extend(self.details.iter().cloned());
        fields
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Belegnummer: {}", self.receipt_number),
            format!("Datum: {}", self.issued_on.format("%d.%m.%Y")),
            format!("Empfänger: {}", self.owner),
            format!("Ausgegeben von: {}", self.issuer),
            format!("Seriennummer: {}", self.serial_number),
        ];
        for (label, value) in &self.details {
            lines.push(format!("{}: {}", detail_label(label), value));
        }
        lines
    }

    pub fn filename(&self) -> String {
        format!("{}_{}.pdf", self.kind.as_str(), self.subject_id)
    }
}

fn detail_label(key: &str) -> &str {
    match key {
        "rooms" => "Räume",
        "object" => "Gegenstand",
        "category" => "Kategorie",
        "anlagennummer" => "Anlagennummer",
        "kostenstelle" => "Kostenstelle",
        "got_date" => "Ausgabedatum",
        other => other,
    }
}
