//! Table metadata as reported by SQLite introspection, plus the identifier
//! rules every dynamically assembled statement goes through.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    Date,
    Timestamp,
}

impl ColumnKind {
    /// Follows SQLite's type affinity rules, with the date types split out
    /// so forms can render dedicated inputs.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            ColumnKind::Integer
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            ColumnKind::Real
        } else if upper.contains("TIMESTAMP") || upper.contains("DATETIME") {
            ColumnKind::Timestamp
        } else if upper.contains("DATE") {
            ColumnKind::Date
        } else {
            ColumnKind::Text
        }
    }

    /// Declared type used when a column is added through the editor.
    pub fn parse_sql_type(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Some(ColumnKind::Text),
            "INTEGER" => Some(ColumnKind::Integer),
            "REAL" => Some(ColumnKind::Real),
            "DATE" => Some(ColumnKind::Date),
            "TIMESTAMP" => Some(ColumnKind::Timestamp),
            _ => None,
        }
    }

    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Text => "TEXT",
            ColumnKind::Date => "DATE",
            ColumnKind::Timestamp => "TIMESTAMP",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForeignKeyRef {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    pub on_delete: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKeyRef>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Tables without an explicit key still expose SQLite's rowid.
    pub fn primary_key(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .unwrap_or("rowid")
    }

    pub fn foreign_key(&self, column: &str) -> Option<&ForeignKeyRef> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    /// Expression used to label rows of this table in select boxes.
    pub fn display_expression(&self) -> String {
        if self.has_column("name") {
            quote_identifier("name")
        } else if self.has_column("first_name") && self.has_column("last_name") {
            format!(
                "TRIM(COALESCE({}, '') || ' ' || COALESCE({}, ''))",
                quote_identifier("first_name"),
                quote_identifier("last_name")
            )
        } else if self.has_column("serial_number") {
            quote_identifier("serial_number")
        } else {
            format!("CAST({} AS TEXT)", quote_identifier(self.primary_key()))
        }
    }
}

/// One entry of a foreign key select box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub id: serde_json::Value,
    pub label: String,
}

pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Header label for a column: configured override first, otherwise the
/// humanised column name ("abteilungsleiter_id" -> "Abteilungsleiter").
pub fn column_label(labels: &HashMap<String, String>, table: &str, column: &str) -> String {
    if let Some(label) = labels.get(&format!("{table}.{column}")) {
        return label.clone();
    }
    let base = column.strip_suffix("_id").unwrap_or(column).replace('_', " ");
    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, declared: &str, pk: bool) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            kind: ColumnKind::from_declared(declared),
            declared_type: declared.to_string(),
            not_null: false,
            primary_key: pk,
            default: None,
        }
    }

    #[test]
    fn test_kind_from_declared_type() {
        assert_eq!(ColumnKind::from_declared("INTEGER"), ColumnKind::Integer);
        assert_eq!(ColumnKind::from_declared("real"), ColumnKind::Real);
        assert_eq!(ColumnKind::from_declared("DOUBLE PRECISION"), ColumnKind::Real);
        assert_eq!(ColumnKind::from_declared("TIMESTAMP"), ColumnKind::Timestamp);
        assert_eq!(ColumnKind::from_declared("DATETIME"), ColumnKind::Timestamp);
        assert_eq!(ColumnKind::from_declared("DATE"), ColumnKind::Date);
        assert_eq!(ColumnKind::from_declared("TEXT"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_declared(""), ColumnKind::Text);
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_valid_identifier("person_to_room"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("name; DROP TABLE person"));
        assert!(!is_valid_identifier(""));
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_column_label() {
        let mut labels = HashMap::new();
        labels.insert(
            "abteilung.abteilungsleiter_id".to_string(),
            "Abteilungsleiter".to_string(),
        );
        assert_eq!(
            column_label(&labels, "abteilung", "abteilungsleiter_id"),
            "Abteilungsleiter"
        );
        assert_eq!(column_label(&labels, "room", "building_id"), "Building");
        assert_eq!(column_label(&labels, "person", "first_name"), "First name");
    }

    #[test]
    fn test_display_expression_prefers_name() {
        let building = TableSchema {
            name: "building".to_string(),
            columns: vec![column("id", "INTEGER", true), column("name", "TEXT", false)],
            foreign_keys: vec![],
        };
        assert_eq!(building.display_expression(), "\"name\"");

        let person = TableSchema {
            name: "person".to_string(),
            columns: vec![
                column("id", "INTEGER", true),
                column("first_name", "TEXT", false),
                column("last_name", "TEXT", false),
            ],
            foreign_keys: vec![],
        };
        assert!(person.display_expression().contains("first_name"));

        let link = TableSchema {
            name: "lager".to_string(),
            columns: vec![column("id", "INTEGER", true), column("raum_id", "INTEGER", false)],
            foreign_keys: vec![],
        };
        assert_eq!(link.display_expression(), "CAST(\"id\" AS TEXT)");
        assert_eq!(link.primary_key(), "id");
    }
}
