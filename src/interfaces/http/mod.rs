use crate::application::{
    AggregateUseCase, JoinViewUseCase, PersonnelUseCase, ReceiptUseCase, RoomLayoutUseCase,
    TableEditorUseCase, WizardUseCase,
};
use crate::domain::error::AppError;
use actix_cors::Cors;
use actix_web::{dev::Server, web, App, HttpResponse, HttpServer};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

mod error;
mod html;
mod records;
mod reports;
mod tables;
mod views;

pub use error::HtmlError;

const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct AppState {
    pub table_editor: TableEditorUseCase,
    pub join_views: JoinViewUseCase,
    pub personnel: PersonnelUseCase,
    pub wizards: WizardUseCase,
    pub aggregates: AggregateUseCase,
    pub receipts: ReceiptUseCase,
    pub layouts: RoomLayoutUseCase,
    /// `"table.column" -> header label`
    pub labels: HashMap<String, String>,
}

pub struct HttpState {
    pub app: Arc<AppState>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

impl HttpState {
    pub fn log(&self, level: &str, source: &str, message: &str) {
        add_log(&self.logs, level, source, message);
    }

    /// Records a failed request in the log buffer and hands the error back.
    pub fn fail(&self, source: &str, err: AppError) -> AppError {
        self.log("ERROR", source, &err.to_string());
        err
    }
}

fn lock_logs(logs: &Mutex<Vec<LogEntry>>) -> MutexGuard<'_, Vec<LogEntry>> {
    logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn html_page(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    match level {
        "ERROR" => tracing::error!(source, "{message}"),
        "WARN" => tracing::warn!(source, "{message}"),
        _ => tracing::info!(source, "{message}"),
    }
    let mut logs = lock_logs(logs);
    logs.push(entry.clone());
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

pub fn snapshot_logs(logs: &Mutex<Vec<LogEntry>>) -> Vec<LogEntry> {
    lock_logs(logs).clone()
}

/// Registers every route; shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(reports::index)
        .service(tables::table_page)
        .service(tables::list_rows)
        .service(tables::list_schemas)
        .service(tables::add_row)
        .service(tables::update_row)
        .service(tables::delete_row)
        .service(tables::delete_row_via_post)
        .service(tables::add_column)
        .service(tables::drop_column)
        .service(views::view_page)
        .service(views::list_views)
        .service(views::select_options)
        .service(views::fetch_view)
        .service(views::update_view_row)
        .service(views::insert_view_row)
        .service(views::delete_view_row)
        .service(records::insert_person)
        .service(records::update_person)
        .service(records::delete_person)
        .service(records::insert_abteilung)
        .service(records::update_abteilung)
        .service(records::delete_abteilung)
        .service(records::assign_abteilung)
        .service(records::unassign_abteilung)
        .service(records::person_wizard_page)
        .service(records::person_wizard)
        .service(records::transponder_wizard_page)
        .service(records::transponder_wizard)
        .service(reports::list_aggregates)
        .service(reports::aggregate_page)
        .service(reports::aggregate_json)
        .service(reports::generate_pdf)
        .service(reports::get_layout)
        .service(reports::save_layout)
        .service(reports::get_logs);
}

pub fn start_server(
    app: Arc<AppState>,
    logs: Arc<Mutex<Vec<LogEntry>>>,
    host: &str,
    port: u16,
) -> std::io::Result<Server> {
    let state = web::Data::new(HttpState { app, logs });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive(); // Allow all origins for local tool

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .app_data(error::json_config())
            .app_data(error::path_config())
            .configure(configure)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::join_view::JoinViewRegistry;
    use crate::infrastructure::bootstrap::assemble;
    use crate::infrastructure::config::AppConfig;
    use crate::infrastructure::db::repository::test_repository;

    /// Seeded in-memory state, as the server would build it.
    pub async fn http_state() -> web::Data<HttpState> {
        let repo = test_repository().await;
        repo.seed_demo_data().await.unwrap();
        let registry =
            JoinViewRegistry::from_json(include_str!("../../../resources/join_views.json")).unwrap();
        registry.verify_against(&repo.schema_map().await.unwrap()).unwrap();
        let app = assemble(Arc::new(repo), Arc::new(registry), &AppConfig::default());
        web::Data::new(HttpState {
            app: Arc::new(app),
            logs: Arc::new(Mutex::new(Vec::new())),
        })
    }

    macro_rules! test_app {
        ($state:expr) => {
            actix_web::test::init_service(
                actix_web::App::new()
                    .app_data($state.clone())
                    .app_data(crate::interfaces::http::error::json_config())
                    .app_data(crate::interfaces::http::error::path_config())
                    .configure(crate::interfaces::http::configure),
            )
            .await
        };
    }
    pub(crate) use test_app;
}
