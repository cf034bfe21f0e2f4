use mandi_db::{migrations, DbPool};

use crate::commands::{block_on, load_config, open_pool, CommandFailure, CommandResult};

/// Tables every read and write path of the engine depends on. Checked after
/// the migrator runs so a silently-empty migration directory fails loudly.
const BASELINE_TABLES: &[&str] = &[
    "users",
    "distributors",
    "products",
    "orders",
    "order_lines",
    "user_events",
    "recommendations",
];

pub fn run() -> CommandResult {
    match apply() {
        Ok(verified) => CommandResult::success(
            "migrate",
            format!("applied pending migrations, verified {verified} baseline tables"),
        ),
        Err(failure) => CommandResult::failure("migrate", failure),
    }
}

fn apply() -> Result<usize, CommandFailure> {
    let config = load_config()?;

    block_on(async {
        let pool = open_pool(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::new("migration", error.to_string(), 5))?;

        let present = count_baseline_tables(&pool)
            .await
            .map_err(|error| CommandFailure::new("schema_verification", error.to_string(), 6))?;
        let expected = BASELINE_TABLES.len() as i64;
        if present != expected {
            return Err(CommandFailure::new(
                "schema_verification",
                format!("expected {expected} baseline tables after migration, found {present}"),
                6,
            ));
        }

        pool.close().await;
        Ok(BASELINE_TABLES.len())
    })
}

async fn count_baseline_tables(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let placeholders = vec!["?"; BASELINE_TABLES.len()].join(", ");
    let query = format!(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ({placeholders})"
    );

    let mut statement = sqlx::query_scalar::<_, i64>(&query);
    for table in BASELINE_TABLES {
        statement = statement.bind(*table);
    }
    statement.fetch_one(pool).await
}
