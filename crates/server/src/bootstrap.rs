use mandi_core::config::{AppConfig, ConfigError, LoadOptions};
use mandi_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

/// Runtime dependencies assembled before any task is spawned: validated
/// configuration plus a connected, fully-migrated pool.
pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not open database pool: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("could not apply migrations: {0}")]
    Migrate(#[source] sqlx::migrate::MigrateError),
}

impl Application {
    pub async fn assemble(config: AppConfig) -> Result<Self, BootstrapError> {
        let db_pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(BootstrapError::Connect)?;

        migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migrate)?;
        info!(
            event_name = "system.bootstrap.ready",
            correlation_id = "bootstrap",
            database_url = %config.database.url,
            "database connected and migrations applied"
        );

        Ok(Self { config, db_pool })
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    Application::assemble(AppConfig::load(options)?).await
}

#[cfg(test)]
mod tests {
    use mandi_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn memory_options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn assemble_applies_migrations_on_a_fresh_database() {
        let app = bootstrap(memory_options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed");

        let recommendation_tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('users', 'products', 'orders', 'user_events', 'recommendations')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables should be queryable after bootstrap");
        assert_eq!(recommendation_tables, 5);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn assemble_fails_fast_on_invalid_configuration() {
        let result = bootstrap(memory_options("postgres://nope")).await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("database.url"));
    }
}
