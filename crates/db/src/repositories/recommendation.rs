use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use mandi_core::domain::product::ProductId;
use mandi_core::domain::recommendation::Recommendation;
use mandi_core::domain::user::UserId;
use mandi_core::recs::StrategyTag;

use super::{RecommendationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlRecommendationRepository {
    pool: DbPool,
}

impl SqlRecommendationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_recommendation(row: &sqlx::sqlite::SqliteRow) -> Result<Recommendation, RepositoryError> {
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: String =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let score: f64 = row.try_get("score").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reason_raw: String =
        row.try_get("reason").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata_raw: Option<String> =
        row.try_get("metadata").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_raw: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let reason = StrategyTag::parse(&reason_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown reason tag `{reason_raw}`")))?;
    let metadata = metadata_raw
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or(serde_json::Value::Null);
    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Recommendation {
        user: UserId(user_id),
        product_id: ProductId(product_id),
        score,
        reason,
        metadata,
        created_at,
    })
}

#[async_trait::async_trait]
impl RecommendationRepository for SqlRecommendationRepository {
    async fn replace_for_user(
        &self,
        user: &UserId,
        records: &[Recommendation],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recommendations WHERE user_id = ?")
            .bind(&user.0)
            .execute(&mut *tx)
            .await?;

        for (rank, record) in records.iter().enumerate() {
            let metadata_json = match &record.metadata {
                serde_json::Value::Null => None,
                value => Some(value.to_string()),
            };
            sqlx::query(
                "INSERT INTO recommendations
                    (id, user_id, product_id, score, reason, metadata, rank, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(format!("REC-{}", Uuid::new_v4().simple()))
            .bind(&user.0)
            .bind(&record.product_id.0)
            .bind(record.score)
            .bind(record.reason.as_str())
            .bind(metadata_json)
            .bind(rank as i64)
            .bind(record.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn top_for_user(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<Recommendation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, product_id, score, reason, metadata, created_at
             FROM recommendations
             WHERE user_id = ?
             ORDER BY rank
             LIMIT ?",
        )
        .bind(&user.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_recommendation).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mandi_core::domain::product::ProductId;
    use mandi_core::domain::recommendation::Recommendation;
    use mandi_core::domain::user::UserId;
    use mandi_core::recs::StrategyTag;

    use super::SqlRecommendationRepository;
    use crate::repositories::RecommendationRepository;
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

    fn record(product_id: &str, score: f64, reason: StrategyTag) -> Recommendation {
        Recommendation {
            user: UserId("retailer-1".to_string()),
            product_id: ProductId(product_id.to_string()),
            score,
            reason,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn top_for_user_returns_stored_rank_order() {
        let pool = setup().await;
        let repo = SqlRecommendationRepository::new(pool);
        let user = UserId("retailer-1".to_string());

        repo.replace_for_user(
            &user,
            &[
                record("prod-a", 0.42, StrategyTag::SimilarCategory),
                record("prod-b", 0.26, StrategyTag::CrossSell),
                record("prod-c", 0.16, StrategyTag::Trending),
            ],
        )
        .await
        .expect("replace");

        let stored = repo.top_for_user(&user, 2).await.expect("query");

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].product_id.0, "prod-a");
        assert_eq!(stored[1].product_id.0, "prod-b");
        assert_eq!(stored[0].reason, StrategyTag::SimilarCategory);
    }

    #[tokio::test]
    async fn replace_is_wholesale_with_no_survivors() {
        let pool = setup().await;
        let repo = SqlRecommendationRepository::new(pool);
        let user = UserId("retailer-1".to_string());

        repo.replace_for_user(
            &user,
            &[
                record("prod-a", 0.42, StrategyTag::SimilarCategory),
                record("prod-b", 0.26, StrategyTag::CrossSell),
            ],
        )
        .await
        .expect("first replace");

        repo.replace_for_user(&user, &[record("prod-c", 0.18, StrategyTag::RecentlyViewed)])
            .await
            .expect("second replace");

        let stored = repo.top_for_user(&user, 10).await.expect("query");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].product_id.0, "prod-c");
    }

    #[tokio::test]
    async fn identical_regeneration_keeps_one_record_per_product() {
        let pool = setup().await;
        let repo = SqlRecommendationRepository::new(pool);
        let user = UserId("retailer-1".to_string());
        let records = vec![
            record("prod-a", 0.42, StrategyTag::SimilarCategory),
            record("prod-b", 0.26, StrategyTag::CrossSell),
        ];

        repo.replace_for_user(&user, &records).await.expect("first replace");
        repo.replace_for_user(&user, &records).await.expect("second replace");

        let stored = repo.top_for_user(&user, 10).await.expect("query");
        assert_eq!(stored.len(), 2);
        let ids: Vec<&str> = stored.iter().map(|r| r.product_id.0.as_str()).collect();
        assert_eq!(ids, vec!["prod-a", "prod-b"]);
    }

    #[tokio::test]
    async fn replace_with_empty_list_clears_the_user() {
        let pool = setup().await;
        let repo = SqlRecommendationRepository::new(pool);
        let user = UserId("retailer-1".to_string());

        repo.replace_for_user(&user, &[record("prod-a", 0.42, StrategyTag::SimilarCategory)])
            .await
            .expect("replace");
        repo.replace_for_user(&user, &[]).await.expect("clear");

        let stored = repo.top_for_user(&user, 10).await.expect("query");
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn metadata_round_trips_as_json() {
        let pool = setup().await;
        let repo = SqlRecommendationRepository::new(pool);
        let user = UserId("retailer-1".to_string());

        let mut rec = record("prod-a", 0.42, StrategyTag::SimilarCategory);
        rec.metadata = serde_json::json!({"raw_score": 2.1});
        repo.replace_for_user(&user, &[rec]).await.expect("replace");

        let stored = repo.top_for_user(&user, 10).await.expect("query");
        assert_eq!(stored[0].metadata["raw_score"], serde_json::json!(2.1));
    }
}
