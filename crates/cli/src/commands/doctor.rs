use mandi_core::config::AppConfig;
use serde::Serialize;

use crate::commands::{block_on, load_config, open_pool, CommandFailure};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
        Self {
            overall_status: if failed { CheckStatus::Fail } else { CheckStatus::Pass },
            summary: if failed { "one or more checks failed" } else { "all checks passed" }
                .to_string(),
            checks,
        }
    }

    fn render_human(&self) -> String {
        let mut lines = Vec::with_capacity(self.checks.len() + 1);
        lines.push(format!("mandi doctor: {}", self.summary));
        for check in &self.checks {
            let marker = match check.status {
                CheckStatus::Pass => "ok",
                CheckStatus::Fail => "FAIL",
                CheckStatus::Skipped => "skip",
            };
            lines.push(format!("  [{marker}] {} - {}", check.name, check.details));
        }
        lines.join("\n")
    }
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            serde_json::json!({
                "overall_status": "fail",
                "summary": "doctor serialization failed",
                "error": error.to_string(),
            })
            .to_string()
        })
    } else {
        report.render_human()
    }
}

fn build_report() -> DoctorReport {
    let checks = match load_config() {
        Ok(config) => vec![
            DoctorCheck::pass("config_validation", "configuration loaded and validated"),
            scoring_settings_check(&config),
            database_check(&config),
        ],
        Err(failure) => vec![
            DoctorCheck::fail("config_validation", failure.message),
            DoctorCheck::skipped("scoring_service_settings"),
            DoctorCheck::skipped("database_connectivity"),
        ],
    };

    DoctorReport::from_checks(checks)
}

fn scoring_settings_check(config: &AppConfig) -> DoctorCheck {
    let base_url = config.scoring.base_url.trim();
    if base_url.starts_with("http://") || base_url.starts_with("https://") {
        DoctorCheck::pass(
            "scoring_service_settings",
            format!("scoring service at {base_url} with {}s timeout", config.scoring.timeout_secs),
        )
    } else {
        DoctorCheck::fail(
            "scoring_service_settings",
            format!("scoring.base_url `{base_url}` is not an http(s) URL"),
        )
    }
}

fn database_check(config: &AppConfig) -> DoctorCheck {
    let probe = block_on(async {
        let pool = open_pool(config).await?;
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|error| CommandFailure::new("db_probe", error.to_string(), 4))?;
        pool.close().await;
        Ok(())
    });

    match probe {
        Ok(()) => {
            DoctorCheck::pass("database_connectivity", format!("connected to {}", config.database.url))
        }
        Err(failure) => DoctorCheck::fail(
            "database_connectivity",
            format!("database check failed: {}", failure.message),
        ),
    }
}
