//! Declarative join views.
//!
//! A view names a base table with an alias, a list of LEFT/INNER joins and the
//! projected columns (`alias.column [AS output]`). Views are read from JSON and
//! validated once on load; everything downstream works on the parsed form.

use crate::domain::error::{AppError, Result};
use crate::domain::schema::{is_valid_identifier, TableSchema};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

static COLUMN_EXPR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\w+)\.(\w+)(?:\s+(?i:AS)\s+(\w+))?\s*$").expect("valid column regex")
});

static JOIN_CONDITION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\w+)\.(\w+)\s*=\s*(\w+)\.(\w+)\s*$").expect("valid join regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinKind {
    Left,
    #[default]
    Inner,
}

impl JoinKind {
    pub fn sql(&self) -> &'static str {
        match self {
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Inner => "INNER JOIN",
        }
    }
}

/// Raw view definition as written in `join_views.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinViewConfig {
    pub name: String,
    pub base_table: String,
    #[serde(default)]
    pub base_alias: Option<String>,
    pub primary_key: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub joins: Vec<JoinConfig>,
    #[serde(default)]
    pub writable: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinConfig {
    pub table: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: JoinKind,
    pub on: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnExpr {
    pub alias: String,
    pub column: String,
    pub output: String,
}

impl ColumnExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let caps = COLUMN_EXPR_PATTERN.captures(expr).ok_or_else(|| {
            AppError::ConfigError(format!(
                "Column expression must look like 'alias.column [AS name]': {expr}"
            ))
        })?;
        let alias = caps[1].to_string();
        let column = caps[2].to_string();
        let output = caps
            .get(3)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| column.clone());
        for ident in [&alias, &column, &output] {
            if !is_valid_identifier(ident) {
                return Err(AppError::ConfigError(format!(
                    "Invalid identifier '{ident}' in column expression: {expr}"
                )));
            }
        }
        Ok(Self {
            alias,
            column,
            output,
        })
    }

    pub fn source(&self) -> ColumnRef {
        ColumnRef {
            alias: self.alias.clone(),
            column: self.column.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinCondition {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

impl JoinCondition {
    pub fn parse(on: &str) -> Result<Self> {
        let caps = JOIN_CONDITION_PATTERN.captures(on).ok_or_else(|| {
            AppError::ConfigError(format!(
                "Join condition must look like 'a.x = b.y': {on}"
            ))
        })?;
        let left = ColumnRef {
            alias: caps[1].to_string(),
            column: caps[2].to_string(),
        };
        let right = ColumnRef {
            alias: caps[3].to_string(),
            column: caps[4].to_string(),
        };
        for ident in [&left.alias, &left.column, &right.alias, &right.column] {
            if !is_valid_identifier(ident) {
                return Err(AppError::ConfigError(format!(
                    "Invalid identifier '{ident}' in join condition: {on}"
                )));
            }
        }
        Ok(Self { left, right })
    }

    /// Splits the condition into (side of `alias`, other side).
    pub fn split_for(&self, alias: &str) -> Option<(&ColumnRef, &ColumnRef)> {
        if self.left.alias == alias && self.right.alias != alias {
            Some((&self.left, &self.right))
        } else if self.right.alias == alias && self.left.alias != alias {
            Some((&self.right, &self.left))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Join {
    pub table: String,
    pub alias: String,
    pub kind: JoinKind,
    pub on: JoinCondition,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinView {
    pub name: String,
    pub base_table: String,
    pub base_alias: String,
    pub primary_key: String,
    pub columns: Vec<ColumnExpr>,
    pub joins: Vec<Join>,
    pub writable: Option<Vec<String>>,
}

impl JoinView {
    pub fn from_config(config: JoinViewConfig) -> Result<Self> {
        let name = config.name;
        let err = |msg: String| AppError::ConfigError(format!("View '{name}': {msg}"));

        if !is_valid_identifier(&name) {
            return Err(AppError::ConfigError(format!("Invalid view name: {name}")));
        }
        if !is_valid_identifier(&config.base_table) {
            return Err(err(format!("invalid base table '{}'", config.base_table)));
        }
        let base_alias = config
            .base_alias
            .unwrap_or_else(|| config.base_table.clone());
        if !is_valid_identifier(&base_alias) {
            return Err(err(format!("invalid base alias '{base_alias}'")));
        }

        let mut known_aliases: HashSet<String> = HashSet::new();
        known_aliases.insert(base_alias.clone());

        let mut joins = Vec::with_capacity(config.joins.len());
        for join in config.joins {
            if !is_valid_identifier(&join.table) {
                return Err(err(format!("invalid join table '{}'", join.table)));
            }
            let alias = join.alias.unwrap_or_else(|| join.table.clone());
            if !is_valid_identifier(&alias) {
                return Err(err(format!("invalid join alias '{alias}'")));
            }
            if known_aliases.contains(&alias) {
                return Err(err(format!("duplicate alias '{alias}'")));
            }
            let on = JoinCondition::parse(&join.on).map_err(|e| err(e.to_string()))?;
            match on.split_for(&alias) {
                Some((_, other)) if known_aliases.contains(&other.alias) => {}
                _ => {
                    return Err(err(format!(
                        "join '{alias}' must reference itself and an earlier alias: {}",
                        join.on
                    )))
                }
            }
            known_aliases.insert(alias.clone());
            joins.push(Join {
                table: join.table,
                alias,
                kind: join.kind,
                on,
            });
        }

        let mut outputs: HashSet<String> = HashSet::new();
        let mut columns = Vec::with_capacity(config.columns.len());
        for expr in &config.columns {
            let column = ColumnExpr::parse(expr).map_err(|e| err(e.to_string()))?;
            if !known_aliases.contains(&column.alias) {
                return Err(err(format!("unknown alias '{}' in '{expr}'", column.alias)));
            }
            if !outputs.insert(column.output.clone()) {
                return Err(err(format!("duplicate output column '{}'", column.output)));
            }
            columns.push(column);
        }
        if columns.is_empty() {
            return Err(err("no columns".to_string()));
        }

        match columns.iter().find(|c| c.output == config.primary_key) {
            Some(pk) if pk.alias == base_alias => {}
            Some(_) => {
                return Err(err(format!(
                    "primary key '{}' must come from the base table",
                    config.primary_key
                )))
            }
            None => {
                return Err(err(format!(
                    "primary key '{}' is not a selected column",
                    config.primary_key
                )))
            }
        }

        if let Some(writable) = &config.writable {
            for alias in writable {
                if !known_aliases.contains(alias) {
                    return Err(err(format!("unknown writable alias '{alias}'")));
                }
            }
        }

        Ok(Self {
            name,
            base_table: config.base_table,
            base_alias,
            primary_key: config.primary_key,
            columns,
            joins,
            writable: config.writable,
        })
    }

    pub fn alias_table_mapping(&self) -> HashMap<String, String> {
        let mut mapping = HashMap::new();
        mapping.insert(self.base_alias.clone(), self.base_table.clone());
        for join in &self.joins {
            mapping.insert(join.alias.clone(), join.table.clone());
        }
        mapping
    }

    /// Output name -> (alias, real column).
    pub fn column_field_mapping(&self) -> HashMap<String, ColumnRef> {
        self.columns
            .iter()
            .map(|c| (c.output.clone(), c.source()))
            .collect()
    }

    pub fn table_for_alias(&self, alias: &str) -> Option<&str> {
        if alias == self.base_alias {
            return Some(&self.base_table);
        }
        self.join_for_alias(alias).map(|j| j.table.as_str())
    }

    pub fn join_for_alias(&self, alias: &str) -> Option<&Join> {
        self.joins.iter().find(|j| j.alias == alias)
    }

    /// Real key column of the base table behind the primary key output.
    pub fn primary_key_column(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.output == self.primary_key)
            .map(|c| c.column.as_str())
            .unwrap_or("id")
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.output.as_str()).collect()
    }

    pub fn is_writable(&self, alias: &str) -> bool {
        match &self.writable {
            Some(aliases) => aliases.iter().any(|a| a == alias),
            None => true,
        }
    }

    /// Checks every referenced table and column against the live schema.
    pub fn verify_against(&self, schemas: &HashMap<String, TableSchema>) -> Result<()> {
        let aliases = self.alias_table_mapping();
        let check = |reference: &ColumnRef| -> Result<()> {
            let table = aliases.get(&reference.alias).ok_or_else(|| {
                AppError::ConfigError(format!(
                    "View '{}': unknown alias '{}'",
                    self.name, reference.alias
                ))
            })?;
            let schema = schemas.get(table).ok_or_else(|| {
                AppError::ConfigError(format!("View '{}': unknown table '{table}'", self.name))
            })?;
            if !schema.has_column(&reference.column) {
                return Err(AppError::ConfigError(format!(
                    "View '{}': table '{table}' has no column '{}'",
                    self.name, reference.column
                )));
            }
            Ok(())
        };

        for column in &self.columns {
            check(&column.source())?;
        }
        for join in &self.joins {
            check(&join.on.left)?;
            check(&join.on.right)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinViewSummary {
    pub name: String,
    pub base_table: String,
    pub primary_key: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct JoinViewRegistry {
    views: Vec<JoinView>,
}

impl JoinViewRegistry {
    pub fn from_json(json: &str) -> Result<Self> {
        let configs: Vec<JoinViewConfig> = serde_json::from_str(json)
            .map_err(|e| AppError::ConfigError(format!("Invalid join view JSON: {e}")))?;
        let mut views: Vec<JoinView> = Vec::with_capacity(configs.len());
        for config in configs {
            let view = JoinView::from_config(config)?;
            if views.iter().any(|v| v.name == view.name) {
                return Err(AppError::ConfigError(format!(
                    "View '{}' is defined twice",
                    view.name
                )));
            }
            views.push(view);
        }
        Ok(Self { views })
    }

    pub fn verify_against(&self, schemas: &HashMap<String, TableSchema>) -> Result<()> {
        for view in &self.views {
            view.verify_against(schemas)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&JoinView> {
        self.views
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| AppError::NotFound(format!("View '{name}' is not defined")))
    }

    pub fn names(&self) -> Vec<&str> {
        self.views.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn summaries(&self) -> Vec<JoinViewSummary> {
        self.views
            .iter()
            .map(|v| JoinViewSummary {
                name: v.name.clone(),
                base_table: v.base_table.clone(),
                primary_key: v.primary_key.clone(),
                columns: v.output_names().into_iter().map(String::from).collect(),
            })
            .collect()
    }
}
