pub mod config;
pub mod counters;
pub mod doctor;
pub mod link;
pub mod migrate;
pub mod repair;
pub mod sequential;
pub mod subids;
pub mod suggest;

use std::fs;
use std::path::Path;

use affilink_core::catalog::CategoryIndex;
use affilink_core::config::{AppConfig, LoadOptions};
use affilink_core::domain::product::{parse_products, Product};
use affilink_core::errors::{ApplicationError, DomainError};
use affilink_db::{connect_with_config, migrations, DbPool};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Success line carrying a structured result under `data`.
    pub fn success_with(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

/// A command step that failed, with the error class and process exit code
/// reported for it.
#[derive(Debug)]
pub struct CommandFailure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl CommandFailure {
    pub fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }

    pub fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.error_class, self.message, self.exit_code)
    }
}

impl From<DomainError> for CommandFailure {
    fn from(error: DomainError) -> Self {
        Self::new("domain", error.to_string(), 7)
    }
}

impl From<ApplicationError> for CommandFailure {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(domain) => domain.into(),
            other => Self::new(other.class(), other.to_string(), 8),
        }
    }
}

impl From<affilink_db::RepositoryError> for CommandFailure {
    fn from(error: affilink_db::RepositoryError) -> Self {
        Self::new("persistence", error.to_string(), 8)
    }
}

pub(crate) fn load_config() -> Result<AppConfig, CommandFailure> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandFailure::new("config_validation", format!("configuration issue: {error}"), 2)
    })
}

pub(crate) fn runtime() -> Result<Runtime, CommandFailure> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandFailure::new(
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Connects with the configured pool settings and applies pending migrations.
pub(crate) async fn open_store(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| CommandFailure::new("db_connectivity", error.to_string(), 4))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| CommandFailure::new("migration", error.to_string(), 5))?;
    Ok(pool)
}

/// The configured category catalog, or an empty one when none is configured.
pub(crate) fn load_catalog(config: &AppConfig) -> Result<CategoryIndex, CommandFailure> {
    match config.catalog.path.as_deref() {
        Some(path) => CategoryIndex::load(path)
            .map_err(|error| CommandFailure::new("catalog", error.to_string(), 6)),
        None => Ok(CategoryIndex::new(Vec::new())),
    }
}

pub(crate) fn read_products(path: &Path) -> Result<Vec<Product>, CommandFailure> {
    let raw = fs::read_to_string(path).map_err(|error| {
        CommandFailure::new("input", format!("failed to read {}: {error}", path.display()), 6)
    })?;
    parse_products(&raw).map_err(|error| {
        CommandFailure::new("input", format!("failed to parse {}: {error}", path.display()), 6)
    })
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
