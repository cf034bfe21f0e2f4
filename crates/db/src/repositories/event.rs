use chrono::{DateTime, Utc};
use sqlx::Row;

use mandi_core::domain::event::{BehavioralEvent, EventKind};
use mandi_core::domain::product::ProductId;
use mandi_core::domain::user::UserId;

use super::{EventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEventRepository {
    pool: DbPool,
}

impl SqlEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<BehavioralEvent, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let event_type: String =
        row.try_get("event_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: Option<String> =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: Option<String> =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let search_query: Option<String> =
        row.try_get("search_query").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let kind = EventKind::parse(&event_type)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown event type `{event_type}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(BehavioralEvent {
        id,
        user: UserId(user_id),
        kind,
        product_id: product_id.map(ProductId),
        category,
        search_query,
        created_at,
    })
}

#[async_trait::async_trait]
impl EventRepository for SqlEventRepository {
    async fn recent_for_user(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<BehavioralEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, event_type, product_id, category, search_query, created_at
             FROM user_events
             WHERE user_id = ?
             ORDER BY datetime(created_at) DESC, id DESC
             LIMIT ?",
        )
        .bind(&user.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }

    async fn distinct_viewed_products(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<ProductId>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT product_id, MAX(datetime(created_at)) AS last_seen
             FROM user_events
             WHERE user_id = ? AND event_type = 'product_view' AND product_id IS NOT NULL
             GROUP BY product_id
             ORDER BY last_seen DESC, product_id
             LIMIT ?",
        )
        .bind(&user.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("product_id")
                    .map(ProductId)
                    .map_err(|e| RepositoryError::Decode(e.to_string()))
            })
            .collect()
    }

    async fn log_event(&self, event: &BehavioralEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_events
                (id, user_id, event_type, product_id, category, search_query, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.user.0)
        .bind(event.kind.as_str())
        .bind(event.product_id.as_ref().map(|id| id.0.clone()))
        .bind(&event.category)
        .bind(&event.search_query)
        .bind(event.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_expired(&self, retention_days: i64) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM user_events
             WHERE datetime(created_at) < datetime('now', '-' || ? || ' days')",
        )
        .bind(retention_days.max(0))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use mandi_core::domain::event::{BehavioralEvent, EventKind};
    use mandi_core::domain::product::ProductId;
    use mandi_core::domain::user::UserId;

    use super::SqlEventRepository;
    use crate::repositories::EventRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query("INSERT INTO users (id, name) VALUES ('retailer-1', 'Sharma Stores')")
            .execute(&pool)
            .await
            .expect("insert user");

        pool
    }

    fn event(id: &str, kind: EventKind, product_id: Option<&str>, days_ago: i64) -> BehavioralEvent {
        BehavioralEvent {
            id: id.to_string(),
            user: UserId("retailer-1".to_string()),
            kind,
            product_id: product_id.map(|value| ProductId(value.to_string())),
            category: None,
            search_query: None,
            created_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[tokio::test]
    async fn distinct_viewed_products_dedup_and_order_by_recency() {
        let pool = setup().await;
        let repo = SqlEventRepository::new(pool);

        repo.log_event(&event("ev-1", EventKind::ProductView, Some("prod-a"), 5))
            .await
            .expect("log");
        repo.log_event(&event("ev-2", EventKind::ProductView, Some("prod-b"), 3))
            .await
            .expect("log");
        repo.log_event(&event("ev-3", EventKind::ProductView, Some("prod-a"), 1))
            .await
            .expect("log");
        repo.log_event(&event("ev-4", EventKind::AddToCart, Some("prod-c"), 1))
            .await
            .expect("log");

        let viewed = repo
            .distinct_viewed_products(&UserId("retailer-1".to_string()), 20)
            .await
            .expect("query");

        assert_eq!(
            viewed,
            vec![ProductId("prod-a".to_string()), ProductId("prod-b".to_string())]
        );
    }

    #[tokio::test]
    async fn recent_events_are_bounded_and_newest_first() {
        let pool = setup().await;
        let repo = SqlEventRepository::new(pool);

        for index in 0..5 {
            repo.log_event(&event(
                &format!("ev-{index}"),
                EventKind::Search,
                None,
                i64::from(index),
            ))
            .await
            .expect("log");
        }

        let events =
            repo.recent_for_user(&UserId("retailer-1".to_string()), 3).await.expect("query");

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].id, "ev-0");
        assert_eq!(events[2].id, "ev-2");
    }

    #[tokio::test]
    async fn purge_expired_removes_only_rows_past_retention() {
        let pool = setup().await;
        let repo = SqlEventRepository::new(pool);

        repo.log_event(&event("ev-old", EventKind::ProductView, Some("prod-a"), 120))
            .await
            .expect("log");
        repo.log_event(&event("ev-fresh", EventKind::ProductView, Some("prod-b"), 2))
            .await
            .expect("log");

        let purged = repo.purge_expired(90).await.expect("purge");
        assert_eq!(purged, 1);

        let events =
            repo.recent_for_user(&UserId("retailer-1".to_string()), 10).await.expect("query");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ev-fresh");
    }

    #[tokio::test]
    async fn empty_history_is_a_valid_result() {
        let pool = setup().await;
        let repo = SqlEventRepository::new(pool);

        let events =
            repo.recent_for_user(&UserId("retailer-1".to_string()), 100).await.expect("query");
        assert!(events.is_empty());
    }
}
