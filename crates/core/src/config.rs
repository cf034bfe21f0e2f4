//! Layered configuration: defaults, optional TOML file with `${ENV}`
//! interpolation, `MANDI_*` environment overrides, programmatic overrides,
//! then validation. Later layers win.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub scoring: ScoringServiceConfig,
    pub recs: RecsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

/// The external scoring service consumed by the on-demand flow. Its internal
/// algorithm is a black box; only the request/response contract is ours.
#[derive(Clone, Debug)]
pub struct ScoringServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub default_count: u32,
}

/// Tunables for the internal generation pipeline and batch scheduler.
#[derive(Clone, Debug)]
pub struct RecsConfig {
    /// Raw-score ceiling for normalization into [0, 1].
    pub score_ceiling: f64,
    pub max_recommendations: usize,
    /// Trending backstop fires below this candidate count.
    pub fallback_floor: usize,
    pub batch_interval_secs: u64,
    pub batch_user_delay_ms: u64,
    pub event_retention_days: i64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub scoring_base_url: Option<String>,
    pub scoring_timeout_secs: Option<u64>,
    pub batch_interval_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file `{path}`: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("config file references undefined environment variable `{0}`")]
    MissingEnvInterpolation(String),
    #[error("config file contains an unterminated `${{...}}` expression")]
    UnterminatedInterpolation,
    #[error("environment variable `{key}` holds an unusable value `{value}`")]
    BadEnvValue { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://mandi.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            scoring: ScoringServiceConfig {
                base_url: "http://localhost:8000".to_string(),
                timeout_secs: 10,
                default_count: 10,
            },
            recs: RecsConfig {
                score_ceiling: crate::recs::DEFAULT_SCORE_CEILING,
                max_recommendations: crate::recs::MAX_RECOMMENDATIONS,
                fallback_floor: crate::recs::FALLBACK_FLOOR,
                batch_interval_secs: 600,
                batch_user_delay_ms: 200,
                event_retention_days: crate::domain::event::EVENT_RETENTION_DAYS,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(invalid(format!(
                "logging.format `{other}` is not one of compact, pretty, json"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match locate_file(options.config_path.as_deref()) {
            Some(path) => FilePatch::read(&path)?.merge_into(&mut config),
            None if options.require_file => {
                let expected = options.config_path.unwrap_or_else(|| PathBuf::from("mandi.toml"));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.merge_env()?;
        options.overrides.merge_into(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn merge_env(&mut self) -> Result<(), ConfigError> {
        env_text("MANDI_DATABASE_URL", &mut self.database.url);
        env_parsed("MANDI_DATABASE_MAX_CONNECTIONS", &mut self.database.max_connections)?;
        env_parsed("MANDI_DATABASE_TIMEOUT_SECS", &mut self.database.timeout_secs)?;

        env_text("MANDI_SERVER_BIND_ADDRESS", &mut self.server.bind_address);
        env_parsed("MANDI_SERVER_PORT", &mut self.server.port)?;
        env_parsed("MANDI_SERVER_HEALTH_CHECK_PORT", &mut self.server.health_check_port)?;
        env_parsed(
            "MANDI_SERVER_GRACEFUL_SHUTDOWN_SECS",
            &mut self.server.graceful_shutdown_secs,
        )?;

        env_text("MANDI_SCORING_BASE_URL", &mut self.scoring.base_url);
        env_parsed("MANDI_SCORING_TIMEOUT_SECS", &mut self.scoring.timeout_secs)?;
        env_parsed("MANDI_SCORING_DEFAULT_COUNT", &mut self.scoring.default_count)?;

        env_parsed("MANDI_RECS_SCORE_CEILING", &mut self.recs.score_ceiling)?;
        env_parsed("MANDI_RECS_BATCH_INTERVAL_SECS", &mut self.recs.batch_interval_secs)?;
        env_parsed("MANDI_RECS_BATCH_USER_DELAY_MS", &mut self.recs.batch_user_delay_ms)?;
        env_parsed("MANDI_RECS_EVENT_RETENTION_DAYS", &mut self.recs.event_retention_days)?;

        // Both the long and short spellings are accepted for logging.
        if let Some(level) = first_env(&["MANDI_LOGGING_LEVEL", "MANDI_LOG_LEVEL"]) {
            self.logging.level = level;
        }
        if let Some(format) = first_env(&["MANDI_LOGGING_FORMAT", "MANDI_LOG_FORMAT"]) {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.server.validate()?;
        self.scoring.validate()?;
        self.recs.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.url.trim();
        if !(url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:") {
            return Err(invalid(
                "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
            ));
        }
        if self.max_connections == 0 {
            return Err(invalid("database.max_connections must be greater than zero"));
        }
        if !(1..=300).contains(&self.timeout_secs) {
            return Err(invalid("database.timeout_secs must be in range 1..=300"));
        }
        Ok(())
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 || self.health_check_port == 0 {
            return Err(invalid("server ports must be greater than zero"));
        }
        if self.port == self.health_check_port {
            return Err(invalid("server.port and server.health_check_port must differ"));
        }
        if self.graceful_shutdown_secs == 0 {
            return Err(invalid("server.graceful_shutdown_secs must be greater than zero"));
        }
        Ok(())
    }
}

impl ScoringServiceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(invalid("scoring.base_url must start with http:// or https://"));
        }
        if !(1..=120).contains(&self.timeout_secs) {
            return Err(invalid("scoring.timeout_secs must be in range 1..=120"));
        }
        if self.default_count == 0 {
            return Err(invalid("scoring.default_count must be greater than zero"));
        }
        Ok(())
    }
}

impl RecsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.score_ceiling.is_finite() || self.score_ceiling <= 0.0 {
            return Err(invalid("recs.score_ceiling must be a positive number"));
        }
        if self.max_recommendations == 0 {
            return Err(invalid("recs.max_recommendations must be greater than zero"));
        }
        if self.fallback_floor > self.max_recommendations {
            return Err(invalid("recs.fallback_floor must not exceed recs.max_recommendations"));
        }
        if self.batch_interval_secs == 0 {
            return Err(invalid("recs.batch_interval_secs must be greater than zero"));
        }
        if self.event_retention_days <= 0 {
            return Err(invalid("recs.event_retention_days must be greater than zero"));
        }
        Ok(())
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(invalid("logging.level must be one of trace|debug|info|warn|error")),
        }
    }
}

impl ConfigOverrides {
    fn merge_into(self, config: &mut AppConfig) {
        merge(&mut config.database.url, self.database_url);
        merge(&mut config.logging.level, self.log_level);
        merge(&mut config.scoring.base_url, self.scoring_base_url);
        merge(&mut config.scoring.timeout_secs, self.scoring_timeout_secs);
        merge(&mut config.recs.batch_interval_secs, self.batch_interval_secs);
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

fn merge<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn locate_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => ["mandi.toml", "config/mandi.toml"]
            .into_iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.exists()),
    }
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| env::var(key).ok().filter(|value| !value.trim().is_empty()))
}

fn env_text(key: &str, slot: &mut String) {
    if let Some(value) = first_env(&[key]) {
        *slot = value;
    }
}

fn env_parsed<T: FromStr>(key: &str, slot: &mut T) -> Result<(), ConfigError> {
    let Some(raw) = first_env(&[key]) else {
        return Ok(());
    };
    *slot = raw
        .parse()
        .map_err(|_| ConfigError::BadEnvValue { key: key.to_string(), value: raw })?;
    Ok(())
}

/// Substitute `${NAME}` references with environment values before the TOML
/// parser sees the file.
fn expand_env_refs(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let key = &tail[..end];
        let value =
            env::var(key).map_err(|_| ConfigError::MissingEnvInterpolation(key.to_string()))?;
        output.push_str(&value);
        rest = &tail[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

#[derive(Debug, Default, Deserialize)]
struct FilePatch {
    database: Option<DatabaseSection>,
    server: Option<ServerSection>,
    scoring: Option<ScoringSection>,
    recs: Option<RecsSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoringSection {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    default_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RecsSection {
    score_ceiling: Option<f64>,
    max_recommendations: Option<usize>,
    fallback_floor: Option<usize>,
    batch_interval_secs: Option<u64>,
    batch_user_delay_ms: Option<u64>,
    event_retention_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl FilePatch {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let expanded = expand_env_refs(&raw)?;
        toml::from_str(&expanded)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    fn merge_into(self, config: &mut AppConfig) {
        if let Some(section) = self.database {
            merge(&mut config.database.url, section.url);
            merge(&mut config.database.max_connections, section.max_connections);
            merge(&mut config.database.timeout_secs, section.timeout_secs);
        }
        if let Some(section) = self.server {
            merge(&mut config.server.bind_address, section.bind_address);
            merge(&mut config.server.port, section.port);
            merge(&mut config.server.health_check_port, section.health_check_port);
            merge(&mut config.server.graceful_shutdown_secs, section.graceful_shutdown_secs);
        }
        if let Some(section) = self.scoring {
            merge(&mut config.scoring.base_url, section.base_url);
            merge(&mut config.scoring.timeout_secs, section.timeout_secs);
            merge(&mut config.scoring.default_count, section.default_count);
        }
        if let Some(section) = self.recs {
            merge(&mut config.recs.score_ceiling, section.score_ceiling);
            merge(&mut config.recs.max_recommendations, section.max_recommendations);
            merge(&mut config.recs.fallback_floor, section.fallback_floor);
            merge(&mut config.recs.batch_interval_secs, section.batch_interval_secs);
            merge(&mut config.recs.batch_user_delay_ms, section.batch_user_delay_ms);
            merge(&mut config.recs.event_retention_days, section.event_retention_days);
        }
        if let Some(section) = self.logging {
            merge(&mut config.logging.level, section.level);
            merge(&mut config.logging.format, section.format);
        }
    }
}
