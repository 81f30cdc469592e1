use std::sync::{Arc, Mutex};

use tracing::{error, info};

use crate::application::{
    AggregateUseCase, JoinViewUseCase, PersonnelUseCase, ReceiptUseCase, RoomLayoutUseCase,
    TableEditorUseCase, WizardUseCase,
};
use crate::domain::error::{AppError, Result};
use crate::domain::join_view::JoinViewRegistry;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::db::connection::init_facility_db;
use crate::infrastructure::db::repository::FacilityRepository;
use crate::infrastructure::pdf::{template_exists, ReceiptPdfRenderer};
use crate::infrastructure::storage::ensure_parent_dir;
use crate::interfaces::http::{add_log, AppState, LogEntry};

const EMBEDDED_VIEWS: &str = include_str!("../../resources/join_views.json");

/// Opens and migrates the database, seeds it when asked, loads the join
/// views and wires every use case.
pub async fn build_state(
    config: &AppConfig,
    logs: &Mutex<Vec<LogEntry>>,
) -> Result<Arc<AppState>> {
    let db_path = &config.database.path;
    ensure_parent_dir(db_path).map_err(|err| {
        error!(error = %err, db_path = %db_path.display(), "Failed to create database dir");
        AppError::IoError(err.to_string())
    })?;

    let repository =
        FacilityRepository::connect(db_path, config.database.max_connections).await?;
    init_facility_db(repository.pool()).await?;
    add_log(
        logs,
        "INFO",
        "Database",
        &format!("Database ready at {}", db_path.display()),
    );

    if config.database.seed_demo && repository.seed_demo_data().await? {
        add_log(logs, "INFO", "Database", "Seeded demo data");
    }

    let registry = load_registry(config, &repository).await?;
    add_log(
        logs,
        "INFO",
        "Views",
        &format!("Loaded {} join views", registry.names().len()),
    );

    if let Some(dir) = &config.pdf.template_dir {
        for kind in ["transponder", "inventory"] {
            if !template_exists(dir, kind) {
                add_log(
                    logs,
                    "WARN",
                    "Pdf",
                    &format!("No {kind}.pdf template in {}, generating plain receipts", dir.display()),
                );
            }
        }
    }

    Ok(Arc::new(assemble(
        Arc::new(repository),
        Arc::new(registry),
        config,
    )))
}

pub fn assemble(
    repository: Arc<FacilityRepository>,
    registry: Arc<JoinViewRegistry>,
    config: &AppConfig,
) -> AppState {
    AppState {
        table_editor: TableEditorUseCase::new(repository.clone()),
        join_views: JoinViewUseCase::new(repository.clone(), registry),
        personnel: PersonnelUseCase::new(repository.clone()),
        wizards: WizardUseCase::new(repository.clone()),
        aggregates: AggregateUseCase::new(repository.clone()),
        receipts: ReceiptUseCase::new(
            repository.clone(),
            ReceiptPdfRenderer::new(config.pdf.template_dir.clone()),
        ),
        layouts: RoomLayoutUseCase::new(repository),
        labels: config.labels.clone(),
    }
}

async fn load_registry(
    config: &AppConfig,
    repository: &FacilityRepository,
) -> Result<JoinViewRegistry> {
    let registry = match &config.views.file {
        Some(path) => {
            info!(file = %path.display(), "Loading join views from file");
            let json = std::fs::read_to_string(path)?;
            JoinViewRegistry::from_json(&json)?
        }
        None => JoinViewRegistry::from_json(EMBEDDED_VIEWS)?,
    };
    registry.verify_against(&repository.schema_map().await?)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_state_seeds_and_loads_views() {
        let dir = std::env::temp_dir().join(format!("verwaltung-boot-{}", uuid::Uuid::new_v4()));
        let mut config = AppConfig::default();
        config.database.path = dir.join("db").join("facility.db");
        config.database.seed_demo = true;
        let logs = Mutex::new(Vec::new());

        let state = build_state(&config, &logs).await.unwrap();
        assert!(!state.join_views.list_views().is_empty());
        let tables = state.table_editor.list_tables().await.unwrap();
        assert!(tables.contains(&"person".to_string()));
        let messages: Vec<String> = logs.lock().unwrap().iter().map(|l| l.message.clone()).collect();
        assert!(messages.iter().any(|m| m == "Seeded demo data"));

        drop(state);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_invalid_view_file_fails_start_up() {
        let dir = std::env::temp_dir().join(format!("verwaltung-boot-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let views = dir.join("views.json");
        std::fs::write(
            &views,
            r#"[{"name": "ghost", "base_table": "ghost", "base_alias": "g", "primary_key": "id", "columns": ["g.id"]}]"#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.database.path = dir.join("facility.db");
        config.views.file = Some(views);

        let err = build_state(&config, &Mutex::new(Vec::new()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::ConfigError(msg) if msg.contains("ghost")));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
