pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use mandi_core::config::{AppConfig, LoadOptions};
use mandi_db::{connect_with_settings, DbPool};
use serde_json::json;

/// Outcome of one CLI command: a JSON line for stdout plus the process exit
/// code, so wrapper scripts can branch on both.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: json!({
                "command": command,
                "status": "ok",
                "error_class": serde_json::Value::Null,
                "message": message.into(),
            })
            .to_string(),
        }
    }

    pub fn failure(command: &str, failure: CommandFailure) -> Self {
        Self {
            exit_code: failure.exit_code,
            output: json!({
                "command": command,
                "status": "error",
                "error_class": failure.class,
                "message": failure.message,
            })
            .to_string(),
        }
    }
}

/// A classified command failure. Exit codes distinguish the failing stage:
/// 2 config, 3 runtime, 4 database, 5 execution, 6 verification.
#[derive(Debug)]
pub struct CommandFailure {
    pub class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl CommandFailure {
    pub fn new(class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { class, message: message.into(), exit_code }
    }
}

pub(crate) fn load_config() -> Result<AppConfig, CommandFailure> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandFailure::new("config_validation", format!("configuration issue: {error}"), 2)
    })
}

/// Drive a command body on a fresh current-thread runtime. Commands are
/// one-shot, so none of them keep a long-lived runtime around.
pub(crate) fn block_on<T>(
    future: impl std::future::Future<Output = Result<T, CommandFailure>>,
) -> Result<T, CommandFailure> {
    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandFailure::new(
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;
    runtime.block_on(future)
}

pub(crate) async fn open_pool(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| CommandFailure::new("db_connectivity", error.to_string(), 4))
}
