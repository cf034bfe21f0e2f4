use mandi_core::config::{AppConfig, LoadOptions};
use serde_json::json;

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            let payload = json!({
                "database": {
                    "url": config.database.url,
                    "max_connections": config.database.max_connections,
                    "timeout_secs": config.database.timeout_secs,
                },
                "server": {
                    "bind_address": config.server.bind_address,
                    "port": config.server.port,
                    "health_check_port": config.server.health_check_port,
                    "graceful_shutdown_secs": config.server.graceful_shutdown_secs,
                },
                "scoring": {
                    "base_url": config.scoring.base_url,
                    "timeout_secs": config.scoring.timeout_secs,
                    "default_count": config.scoring.default_count,
                },
                "recs": {
                    "score_ceiling": config.recs.score_ceiling,
                    "max_recommendations": config.recs.max_recommendations,
                    "fallback_floor": config.recs.fallback_floor,
                    "batch_interval_secs": config.recs.batch_interval_secs,
                    "batch_user_delay_ms": config.recs.batch_user_delay_ms,
                    "event_retention_days": config.recs.event_retention_days,
                },
                "logging": {
                    "level": config.logging.level,
                    "format": config.logging.format,
                },
            });
            serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}"))
        }
        Err(error) => {
            serde_json::to_string_pretty(&json!({
                "status": "error",
                "error_class": "config_validation",
                "message": error.to_string(),
            }))
            .unwrap_or_else(|serialize_error| format!("{{\"error\":\"{serialize_error}\"}}"))
        }
    }
}
