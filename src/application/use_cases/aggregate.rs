use crate::domain::error::{AppError, Result};
use crate::domain::record::Record;
use crate::infrastructure::db::repository::rows::fetch_records;
use crate::infrastructure::db::repository::FacilityRepository;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// A fixed read-only report. `columns` lists the select outputs in order so
/// empty results still render a header.
pub struct AggregateDefinition {
    pub name: &'static str,
    pub title: &'static str,
    pub columns: &'static [&'static str],
    pub sql: &'static str,
}

pub const AGGREGATES: &[AggregateDefinition] = &[
    AggregateDefinition {
        name: "person_overview",
        title: "Personenübersicht",
        columns: &["person_id", "name", "abteilungen", "rooms", "transponder_count"],
        sql: "SELECT p.id AS person_id, \
              TRIM(COALESCE(p.title, '') || ' ' || COALESCE(p.first_name, '') || ' ' || COALESCE(p.last_name, '')) AS name, \
              (SELECT GROUP_CONCAT(a.name, ', ') FROM person_to_abteilung pta \
                 JOIN abteilung a ON a.id = pta.abteilung_id WHERE pta.person_id = p.id) AS abteilungen, \
              (SELECT GROUP_CONCAT(r.name, ', ') FROM person_to_room ptr \
                 JOIN room r ON r.id = ptr.room_id WHERE ptr.person_id = p.id) AS rooms, \
              (SELECT COUNT(*) FROM transponder t WHERE t.owner_id = p.id) AS transponder_count \
              FROM person p ORDER BY p.last_name, p.first_name, p.id",
    },
    AggregateDefinition {
        name: "transponder_rooms",
        title: "Transponder und Räume",
        columns: &["transponder_id", "serial_number", "owner", "issuer", "rooms"],
        sql: "SELECT t.id AS transponder_id, t.serial_number, \
              TRIM(COALESCE(o.first_name, '') || ' ' || COALESCE(o.last_name, '')) AS owner, \
              TRIM(COALESCE(i.first_name, '') || ' ' || COALESCE(i.last_name, '')) AS issuer, \
              (SELECT GROUP_CONCAT(r.name, ', ') FROM transponder_to_room ttr \
                 JOIN room r ON r.id = ttr.room_id WHERE ttr.transponder_id = t.id) AS rooms \
              FROM transponder t \
              LEFT JOIN person o ON o.id = t.owner_id \
              LEFT JOIN person i ON i.id = t.issuer_id \
              ORDER BY t.serial_number",
    },
    AggregateDefinition {
        name: "inventory_by_owner",
        title: "Inventar je Besitzer",
        columns: &["owner_id", "owner", "items", "price_sum"],
        sql: "SELECT i.owner_id, \
              TRIM(COALESCE(p.first_name, '') || ' ' || COALESCE(p.last_name, '')) AS owner, \
              COUNT(i.id) AS items, COALESCE(SUM(i.price), 0) AS price_sum \
              FROM inventory i LEFT JOIN person p ON p.id = i.owner_id \
              GROUP BY i.owner_id ORDER BY owner",
    },
    AggregateDefinition {
        name: "inventory_by_kostenstelle",
        title: "Inventar je Kostenstelle",
        columns: &["kostenstelle_id", "kostenstelle", "items", "price_sum"],
        sql: "SELECT i.kostenstelle_id, k.name AS kostenstelle, \
              COUNT(i.id) AS items, COALESCE(SUM(i.price), 0) AS price_sum \
              FROM inventory i LEFT JOIN kostenstelle k ON k.id = i.kostenstelle_id \
              GROUP BY i.kostenstelle_id ORDER BY k.name",
    },
    AggregateDefinition {
        name: "room_occupancy",
        title: "Raumbelegung",
        columns: &["room_id", "room", "building", "floor", "persons"],
        sql: "SELECT r.id AS room_id, r.name AS room, b.name AS building, r.floor, \
              COUNT(ptr.person_id) AS persons \
              FROM room r \
              LEFT JOIN building b ON b.id = r.building_id \
              LEFT JOIN person_to_room ptr ON ptr.room_id = r.id \
              GROUP BY r.id ORDER BY b.name, r.name",
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct AggregateSummary {
    pub name: &'static str,
    pub title: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub name: String,
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

pub fn find_aggregate(name: &str) -> Result<&'static AggregateDefinition> {
    AGGREGATES
        .iter()
        .find(|a| a.name == name)
        .ok_or_else(|| AppError::NotFound(format!("Aggregate '{name}' does not exist")))
}

pub struct AggregateUseCase {
    repository: Arc<FacilityRepository>,
}

impl AggregateUseCase {
    pub fn new(repository: Arc<FacilityRepository>) -> Self {
        Self { repository }
    }

    pub fn list(&self) -> Vec<AggregateSummary> {
        AGGREGATES
            .iter()
            .map(|a| AggregateSummary {
                name: a.name,
                title: a.title,
            })
            .collect()
    }

    pub async fn run(&self, name: &str) -> Result<AggregateResult> {
        let aggregate = find_aggregate(name)?;
        debug!(aggregate = name, "Running aggregate");

        let mut conn = self
            .repository
            .pool()
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to acquire connection: {}", e)))?;
        let rows = fetch_records(&mut conn, aggregate.sql, &[]).await?;

        Ok(AggregateResult {
            name: aggregate.name.to_string(),
            title: aggregate.title.to_string(),
            columns: aggregate.columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }
}
