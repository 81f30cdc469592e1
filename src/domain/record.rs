use crate::domain::error::{AppError, Result};
use crate::domain::schema::{ColumnInfo, ColumnKind, TableSchema};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// One row keyed by output column, in select order.
pub type Record = serde_json::Map<String, Value>;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_optional_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        // Fractional numbers truncate toward zero; numeric strings must be integral.
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                return None;
            }
            trimmed.parse::<i64>().ok()
        }
        _ => None,
    }
}

/// Converts a submitted form or JSON value into the representation stored
/// for the given column.
pub fn coerce_value(column: &ColumnInfo, value: &Value) -> Result<Value> {
    let value = match value {
        Value::String(s) if s.trim().is_empty() => &Value::Null,
        other => other,
    };

    if value.is_null() {
        if column.not_null && !column.primary_key {
            return Err(AppError::ValidationError(format!(
                "Column '{}' must not be empty",
                column.name
            )));
        }
        return Ok(Value::Null);
    }

    let invalid = || {
        AppError::ValidationError(format!(
            "Invalid value for column '{}' ({}): {}",
            column.name,
            column.kind.sql_type(),
            value
        ))
    };

    match column.kind {
        ColumnKind::Integer => match value {
            Value::Bool(b) => Ok(Value::from(i64::from(*b))),
            Value::Number(_) | Value::String(_) => parse_optional_int(Some(value))
                .map(Value::from)
                .ok_or_else(invalid),
            _ => Err(invalid()),
        },
        ColumnKind::Real => match value {
            Value::Number(n) => n.as_f64().map(Value::from).ok_or_else(invalid),
            Value::String(s) => parse_decimal(s).map(Value::from).ok_or_else(invalid),
            _ => Err(invalid()),
        },
        ColumnKind::Date => match value {
            Value::String(s) => parse_date(s)
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .ok_or_else(invalid),
            _ => Err(invalid()),
        },
        ColumnKind::Timestamp => match value {
            Value::String(s) => parse_timestamp(s)
                .map(|ts| Value::String(ts.format(TIMESTAMP_FORMAT).to_string()))
                .ok_or_else(invalid),
            _ => Err(invalid()),
        },
        ColumnKind::Text => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid()),
        },
    }
}

/// Coerces `(column, value)` pairs against `schema`; unknown columns are
/// rejected.
pub fn coerce_assignments(
    schema: &TableSchema,
    values: &[(String, Value)],
) -> Result<Vec<(String, Value)>> {
    values
        .iter()
        .map(|(name, value)| {
            let column = schema.column(name).ok_or_else(|| {
                AppError::ValidationError(format!(
                    "Unknown column '{}' in table '{}'",
                    name, schema.name
                ))
            })?;
            Ok((name.clone(), coerce_value(column, value)?))
        })
        .collect()
}

/// Accepts "3.50" as well as the German "3,50".
fn parse_decimal(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    trimmed
        .parse::<f64>()
        .ok()
        .or_else(|| {
            if trimmed.contains('.') {
                None
            } else {
                trimmed.replace(',', ".").parse::<f64>().ok()
            }
        })
        .filter(|f| f.is_finite())
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d.%m.%Y"))
        .ok()
}

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| parse_date(trimmed).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// Renders a stored value for an HTML input or a PDF line.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(kind: ColumnKind, not_null: bool) -> ColumnInfo {
        ColumnInfo {
            name: "c".to_string(),
            kind,
            declared_type: kind.sql_type().to_string(),
            not_null,
            primary_key: false,
            default: None,
        }
    }

    #[test]
    fn test_parse_optional_int() {
        assert_eq!(parse_optional_int(None), None);
        assert_eq!(parse_optional_int(Some(&json!(null))), None);
        assert_eq!(parse_optional_int(Some(&json!(""))), None);
        assert_eq!(parse_optional_int(Some(&json!(" None "))), None);
        assert_eq!(parse_optional_int(Some(&json!("42"))), Some(42));
        assert_eq!(parse_optional_int(Some(&json!(7))), Some(7));
        assert_eq!(parse_optional_int(Some(&json!(7.0))), Some(7));
        assert_eq!(parse_optional_int(Some(&json!("abc"))), None);
        assert_eq!(parse_optional_int(Some(&json!(7.5))), Some(7));
        assert_eq!(parse_optional_int(Some(&json!(-2.9))), Some(-2));
        assert_eq!(parse_optional_int(Some(&json!("3.0"))), None);
    }

    #[test]
    fn test_empty_string_becomes_null() {
        let col = column(ColumnKind::Integer, false);
        assert_eq!(coerce_value(&col, &json!("")).unwrap(), Value::Null);

        let required = column(ColumnKind::Text, true);
        assert!(coerce_value(&required, &json!("  ")).is_err());
    }

    #[test]
    fn test_numeric_coercion() {
        let int_col = column(ColumnKind::Integer, false);
        assert_eq!(coerce_value(&int_col, &json!("3")).unwrap(), json!(3));
        assert!(coerce_value(&int_col, &json!("drei")).is_err());

        let real_col = column(ColumnKind::Real, false);
        assert_eq!(coerce_value(&real_col, &json!("12,5")).unwrap(), json!(12.5));
        assert_eq!(coerce_value(&real_col, &json!(4)).unwrap(), json!(4.0));
        assert!(coerce_value(&real_col, &json!("1,000.5")).is_err());
    }

    #[test]
    fn test_date_and_timestamp_coercion() {
        let date_col = column(ColumnKind::Date, false);
        assert_eq!(
            coerce_value(&date_col, &json!("24.12.2024")).unwrap(),
            json!("2024-12-24")
        );
        assert!(coerce_value(&date_col, &json!("2024-13-01")).is_err());

        let ts_col = column(ColumnKind::Timestamp, false);
        assert_eq!(
            coerce_value(&ts_col, &json!("2024-05-01T08:30")).unwrap(),
            json!("2024-05-01 08:30:00")
        );
        assert_eq!(
            coerce_value(&ts_col, &json!("2024-05-01T08:30:00+02:00")).unwrap(),
            json!("2024-05-01 06:30:00")
        );
    }

    #[test]
    fn test_coerce_assignments_rejects_unknown_columns() {
        let schema = TableSchema {
            name: "room".to_string(),
            columns: vec![ColumnInfo {
                name: "floor".to_string(),
                ..column(ColumnKind::Integer, false)
            }],
            foreign_keys: vec![],
        };
        let ok = coerce_assignments(&schema, &[("floor".to_string(), json!("2"))]).unwrap();
        assert_eq!(ok, vec![("floor".to_string(), json!(2))]);
        assert!(coerce_assignments(&schema, &[("ceiling".to_string(), json!(1))]).is_err());
    }

    #[test]
    fn test_text_accepts_numbers() {
        let col = column(ColumnKind::Text, false);
        assert_eq!(coerce_value(&col, &json!(12)).unwrap(), json!("12"));
    }
}
