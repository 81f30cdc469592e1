//! SQL assembly for join views.
//!
//! Identifiers come from a validated [`JoinView`] and are always quoted;
//! values only ever travel as bind parameters.

use crate::domain::error::{AppError, Result};
use crate::domain::join_view::{ColumnRef, Join, JoinView};
use crate::domain::record::Record;
use crate::domain::schema::quote_identifier;
use serde_json::Value;

/// SQL text with its positional parameters.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

fn qualified(reference: &ColumnRef) -> String {
    format!(
        "{}.{}",
        quote_identifier(&reference.alias),
        quote_identifier(&reference.column)
    )
}

fn base_key(view: &JoinView) -> ColumnRef {
    ColumnRef {
        alias: view.base_alias.clone(),
        column: view.primary_key_column().to_string(),
    }
}

fn from_clause(view: &JoinView) -> String {
    let mut parts = vec![format!(
        "FROM {} AS {}",
        quote_identifier(&view.base_table),
        quote_identifier(&view.base_alias)
    )];
    for join in &view.joins {
        parts.push(format!(
            "{} {} AS {} ON {} = {}",
            join.kind.sql(),
            quote_identifier(&join.table),
            quote_identifier(&join.alias),
            qualified(&join.on.left),
            qualified(&join.on.right)
        ));
    }
    parts.join(" ")
}

fn select_clause(view: &JoinView) -> String {
    let columns: Vec<String> = view
        .columns
        .iter()
        .map(|c| format!("{} AS {}", qualified(&c.source()), quote_identifier(&c.output)))
        .collect();
    format!("SELECT {}", columns.join(", "))
}

/// All rows of the view, ordered by its primary key.
pub fn build_join_query(view: &JoinView) -> CompiledQuery {
    CompiledQuery {
        sql: format!(
            "{} {} ORDER BY {}",
            select_clause(view),
            from_clause(view),
            qualified(&base_key(view))
        ),
        params: Vec::new(),
    }
}

/// Rows of the view belonging to one base row.
pub fn build_join_query_for_key(view: &JoinView, key: &Value) -> CompiledQuery {
    CompiledQuery {
        sql: format!(
            "{} {} WHERE {} = ? ORDER BY {}",
            select_clause(view),
            from_clause(view),
            qualified(&base_key(view)),
            qualified(&base_key(view))
        ),
        params: vec![key.clone()],
    }
}

/// Reads the value a joined alias is keyed on: the non-joined side of its
/// join condition, evaluated for one base row.
pub fn build_link_lookup(view: &JoinView, join: &Join, key: &Value) -> Result<CompiledQuery> {
    let (_, other) = join.on.split_for(&join.alias).ok_or_else(|| {
        AppError::ConfigError(format!("Join '{}' does not reference itself", join.alias))
    })?;
    Ok(CompiledQuery {
        sql: format!(
            "SELECT {} {} WHERE {} = ? ORDER BY {}.rowid LIMIT 1",
            qualified(other),
            from_clause(view),
            qualified(&base_key(view)),
            quote_identifier(&other.alias)
        ),
        params: vec![key.clone()],
    })
}

/// Column assignments for one alias of the view.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasAssignments {
    pub alias: String,
    pub table: String,
    pub values: Vec<(String, Value)>,
}

#[derive(Debug, Clone)]
pub struct JoinUpdatePlan {
    pub key: Value,
    /// Base alias first, then joined aliases in join order.
    pub groups: Vec<AliasAssignments>,
    pub ignored: Vec<String>,
}

impl JoinUpdatePlan {
    pub fn base<'a>(&'a self, view: &JoinView) -> Option<&'a AliasAssignments> {
        self.groups.iter().find(|g| g.alias == view.base_alias)
    }

    pub fn joined<'a>(&'a self, view: &'a JoinView) -> impl Iterator<Item = &'a AliasAssignments> {
        self.groups.iter().filter(move |g| g.alias != view.base_alias)
    }
}

/// Splits an update payload into per-alias column assignments.
///
/// Fields outside the view or on read-only aliases are reported in
/// `ignored`. A field showing the key a joined alias is matched on is a link
/// change and is moved to the other side of that join
/// (`abteilung_id -> a.id` becomes `pta.abteilung_id`).
pub fn group_updates_by_table(view: &JoinView, data: &Record) -> Result<JoinUpdatePlan> {
    let key = data
        .get(&view.primary_key)
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| {
            AppError::ValidationError(format!("primary key '{}' missing", view.primary_key))
        })?;

    let fields = view.column_field_mapping();
    let aliases = view.alias_table_mapping();
    let mut groups: Vec<AliasAssignments> = Vec::new();
    let mut ignored = Vec::new();

    for (field, value) in data {
        if field == &view.primary_key {
            continue;
        }
        let Some(source) = fields.get(field) else {
            ignored.push(field.clone());
            continue;
        };

        let target = match view.join_for_alias(&source.alias) {
            Some(join) => match join.on.split_for(&join.alias) {
                Some((joined, other)) if joined.column == source.column => other.clone(),
                _ => source.clone(),
            },
            None => source.clone(),
        };

        if !view.is_writable(&target.alias) {
            ignored.push(field.clone());
            continue;
        }
        let Some(table) = aliases.get(&target.alias) else {
            ignored.push(field.clone());
            continue;
        };

        let group = match groups.iter_mut().position(|g| g.alias == target.alias) {
            Some(idx) => &mut groups[idx],
            None => {
                groups.push(AliasAssignments {
                    alias: target.alias.clone(),
                    table: table.clone(),
                    values: Vec::new(),
                });
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };
        match group.values.iter_mut().find(|(c, _)| c == &target.column) {
            Some(existing) => existing.1 = value.clone(),
            None => group.values.push((target.column, value.clone())),
        }
    }

    // The base key itself is never rewritten through a link field.
    let key_column = view.primary_key_column();
    for group in groups.iter_mut().filter(|g| g.alias == view.base_alias) {
        group.values.retain(|(c, _)| c != key_column);
    }
    groups.retain(|g| !g.values.is_empty());

    if groups.is_empty() {
        return Err(AppError::ValidationError(format!(
            "No updatable fields for view '{}'",
            view.name
        )));
    }

    let order = |alias: &str| -> usize {
        if alias == view.base_alias {
            0
        } else {
            view.joins
                .iter()
                .position(|j| j.alias == alias)
                .map(|p| p + 1)
                .unwrap_or(usize::MAX)
        }
    };
    groups.sort_by_key(|g| order(&g.alias));

    Ok(JoinUpdatePlan {
        key,
        groups,
        ignored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::join_view::JoinViewRegistry;
    use serde_json::json;

    fn registry() -> JoinViewRegistry {
        JoinViewRegistry::from_json(include_str!("../../../resources/join_views.json")).unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_select_quotes_and_orders() {
        let registry = registry();
        let view = registry.get("person_contact").unwrap();
        let query = build_join_query(view);
        assert!(query.sql.starts_with(
            "SELECT \"p\".\"id\" AS \"id\", \"p\".\"first_name\" AS \"first_name\""
        ));
        assert!(query.sql.contains(
            "FROM \"person\" AS \"p\" LEFT JOIN \"person_contact\" AS \"pc\" ON \"p\".\"id\" = \"pc\".\"person_id\""
        ));
        assert!(query.sql.ends_with("ORDER BY \"p\".\"id\""));
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_keyed_query_binds_key() {
        let registry = registry();
        let view = registry.get("transponder_with_owner_and_rooms").unwrap();
        let query = build_join_query_for_key(view, &json!(7));
        assert!(query.sql.contains("WHERE \"t\".\"id\" = ?"));
        assert_eq!(query.params, vec![json!(7)]);
    }

    #[test]
    fn test_link_lookup_reads_other_side() {
        let registry = registry();
        let view = registry.get("person_abteilung").unwrap();
        let join = view.join_for_alias("a").unwrap();
        let query = build_link_lookup(view, join, &json!(1)).unwrap();
        assert!(query.sql.starts_with("SELECT \"pta\".\"abteilung_id\" FROM"));
        assert!(query
            .sql
            .ends_with("WHERE \"p\".\"id\" = ? ORDER BY \"pta\".rowid LIMIT 1"));
    }

    #[test]
    fn test_grouping_rewrites_link_fields() {
        let registry = registry();
        let view = registry.get("person_abteilung").unwrap();
        let plan = group_updates_by_table(
            view,
            &record(json!({
                "id": 1,
                "first_name": "Anna",
                "abteilung_id": 2,
                "abteilungsname": "IT-Service",
                "unknown": "x"
            })),
        )
        .unwrap();

        assert_eq!(plan.key, json!(1));
        assert_eq!(plan.ignored, vec!["unknown".to_string()]);
        let aliases: Vec<&str> = plan.groups.iter().map(|g| g.alias.as_str()).collect();
        assert_eq!(aliases, vec!["p", "pta", "a"]);
        assert_eq!(
            plan.groups[1].values,
            vec![("abteilung_id".to_string(), json!(2))]
        );
        assert_eq!(plan.groups[2].table, "abteilung");
        assert_eq!(
            plan.groups[2].values,
            vec![("name".to_string(), json!("IT-Service"))]
        );
    }

    #[test]
    fn test_grouping_skips_read_only_aliases() {
        let registry = registry();
        let view = registry.get("transponder").unwrap();
        let plan = group_updates_by_table(
            view,
            &record(json!({ "id": 3, "comment": "neu", "owner_first_name": "Max" })),
        )
        .unwrap();
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.base(view).unwrap().table, "transponder");
        assert_eq!(plan.ignored, vec!["owner_first_name".to_string()]);
    }

    #[test]
    fn test_grouping_requires_key_and_fields() {
        let registry = registry();
        let view = registry.get("person_contact").unwrap();
        let missing_key = group_updates_by_table(view, &record(json!({ "email": "a@b.de" })));
        assert!(matches!(missing_key, Err(AppError::ValidationError(msg)) if msg.contains("'id' missing")));

        let nothing = group_updates_by_table(view, &record(json!({ "id": 1, "nope": 1 })));
        assert!(matches!(nothing, Err(AppError::ValidationError(_))));
    }
}
