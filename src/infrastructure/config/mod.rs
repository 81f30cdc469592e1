use crate::domain::error::{AppError, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

const ENV_PREFIX: &str = "VERWALTUNG_";
const ENV_CONFIG_FILE: &str = "VERWALTUNG_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "Verwaltung.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub seed_demo: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("databases.db"),
            max_connections: 4,
            seed_demo: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// Replaces the built-in join views when set.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Directory searched for `<kind>.pdf` form templates.
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub views: ViewsConfig,
    pub pdf: PdfConfig,
    /// `"table.column" -> header label`
    pub labels: HashMap<String, String>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            views: ViewsConfig::default(),
            pdf: PdfConfig::default(),
            labels: default_labels(),
            log_filter: "info".to_string(),
        }
    }
}

fn default_labels() -> HashMap<String, String> {
    [
        ("abteilung.abteilungsleiter_id", "Abteilungsleiter"),
        ("transponder.issuer_id", "Ausgegeben von"),
        ("transponder.owner_id", "Besitzer"),
        ("transponder.got_date", "Ausgabedatum"),
        ("transponder.return_date", "Rückgabedatum"),
        ("inventory.owner_id", "Besitzer"),
        ("inventory.issuer_id", "Ausgegeben von"),
        ("inventory.raum_id", "Raum"),
        ("lager.raum_id", "Raum"),
        ("person.first_name", "Vorname"),
        ("person.last_name", "Nachname"),
        ("person.created_at", "Angelegt am"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl AppConfig {
    /// Defaults, then the TOML file, then `VERWALTUNG_*` variables
    /// (`VERWALTUNG_SERVER__PORT=8080`).
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let file = std::env::var(ENV_CONFIG_FILE).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::figment(&file).extract().map_err(|e| AppError::ConfigError(e.to_string()))
    }

    fn figment(file: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config: AppConfig = AppConfig::figment("missing.toml").extract()?;
            assert_eq!(config.bind_address(), "127.0.0.1:5000");
            assert_eq!(config.database.max_connections, 4);
            assert!(!config.database.seed_demo);
            assert_eq!(
                config.labels.get("abteilung.abteilungsleiter_id").map(String::as_str),
                Some("Abteilungsleiter")
            );
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_layers() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "Verwaltung.toml",
                r#"
                log_filter = "debug"

                [database]
                path = "data/facility.db"
                seed_demo = true

                [labels]
                "room.floor" = "Etage"
                "#,
            )?;
            jail.set_env("VERWALTUNG_SERVER__PORT", "8080");

            let config: AppConfig = AppConfig::figment("Verwaltung.toml").extract()?;
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.server.host, "127.0.0.1");
            assert_eq!(config.database.path, PathBuf::from("data/facility.db"));
            assert!(config.database.seed_demo);
            assert_eq!(config.log_filter, "debug");
            assert_eq!(config.labels.get("room.floor").map(String::as_str), Some("Etage"));
            assert!(config.labels.contains_key("transponder.owner_id"));
            Ok(())
        });
    }
}
