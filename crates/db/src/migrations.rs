use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::{run_pending, MIGRATOR};
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "users",
        "distributors",
        "products",
        "orders",
        "order_lines",
        "user_events",
        "recommendations",
        "idx_products_category",
        "idx_products_stock",
        "idx_orders_retailer",
        "idx_order_lines_order_id",
        "idx_user_events_user_id",
        "idx_user_events_created_at",
        "idx_recommendations_user_id",
    ];

    /// Sorted (type, name, sql) triples for every schema object the migrator
    /// owns, so before/after comparisons catch both drops and drift.
    async fn managed_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        sqlx::query(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')
             ORDER BY type, name",
        )
        .fetch_all(pool)
        .await
        .expect("read sqlite_master")
        .into_iter()
        .map(|row| {
            (
                row.get::<String, _>("type"),
                row.get::<String, _>("name"),
                row.get::<String, _>("sql"),
            )
        })
        .filter(|(_, name, _)| MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()))
        .collect()
    }

    async fn fresh_pool() -> sqlx::SqlitePool {
        connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect")
    }

    #[tokio::test]
    async fn baseline_schema_comes_up_complete() {
        let pool = fresh_pool().await;
        run_pending(&pool).await.expect("run migrations");

        let signature = managed_signature(&pool).await;
        assert_eq!(signature.len(), MANAGED_SCHEMA_OBJECTS.len());
    }

    #[tokio::test]
    async fn full_undo_removes_every_managed_object() {
        let pool = fresh_pool().await;
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        assert!(managed_signature(&pool).await.is_empty());
    }

    #[tokio::test]
    async fn up_down_up_round_trips_the_schema() {
        let pool = fresh_pool().await;
        run_pending(&pool).await.expect("run migrations");
        let first = managed_signature(&pool).await;

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");
        run_pending(&pool).await.expect("re-run migrations");

        assert_eq!(managed_signature(&pool).await, first);
    }
}
