//! Batch-path recommendation generation.
//!
//! One call runs the full cycle for a single user: read purchase and
//! behavioral signals, let each strategy propose weighted candidates, rank
//! the accumulated board, and replace the user's stored list. Signal reads
//! degrade to empty on failure; only the final store write can fail the run.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use mandi_core::config::RecsConfig;
use mandi_core::domain::product::ProductId;
use mandi_core::domain::recommendation::Recommendation;
use mandi_core::domain::user::UserId;
use mandi_core::errors::ApplicationError;
use mandi_core::recs::{
    viewed_product_ids, PurchaseSignals, ScoreBoard, StrategyTag, CROSS_SELL_LIMIT,
    EVENT_HISTORY_LIMIT, ORDER_HISTORY_LIMIT, SIMILAR_CATEGORY_LIMIT, TOP_CATEGORY_COUNT,
    TRENDING_LIMIT, TRENDING_MIN_STOCK,
};
use mandi_db::repositories::{
    CatalogRepository, EventRepository, OrderRepository, RecommendationRepository,
    SqlCatalogRepository, SqlEventRepository, SqlOrderRepository, SqlRecommendationRepository,
};
use mandi_db::DbPool;

pub struct RecommendationGenerator {
    orders: Arc<dyn OrderRepository>,
    events: Arc<dyn EventRepository>,
    catalog: Arc<dyn CatalogRepository>,
    store: Arc<dyn RecommendationRepository>,
    config: RecsConfig,
}

impl RecommendationGenerator {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        events: Arc<dyn EventRepository>,
        catalog: Arc<dyn CatalogRepository>,
        store: Arc<dyn RecommendationRepository>,
        config: RecsConfig,
    ) -> Self {
        Self { orders, events, catalog, store, config }
    }

    pub fn from_pool(pool: DbPool, config: RecsConfig) -> Self {
        Self::new(
            Arc::new(SqlOrderRepository::new(pool.clone())),
            Arc::new(SqlEventRepository::new(pool.clone())),
            Arc::new(SqlCatalogRepository::new(pool.clone())),
            Arc::new(SqlRecommendationRepository::new(pool)),
            config,
        )
    }

    /// Run one scoring, ranking, and replace cycle. Returns the stored count.
    pub async fn generate_for_user(&self, user: &UserId) -> Result<usize, ApplicationError> {
        let orders = match self.orders.recent_for_retailer(user, ORDER_HISTORY_LIMIT).await {
            Ok(orders) => orders,
            Err(error) => {
                warn!(
                    event_name = "recs.generate.signal_degraded",
                    user_id = %user,
                    signal = "orders",
                    error = %error,
                    "order history unavailable, proceeding with empty signal"
                );
                Vec::new()
            }
        };
        let events = match self.events.recent_for_user(user, EVENT_HISTORY_LIMIT).await {
            Ok(events) => events,
            Err(error) => {
                warn!(
                    event_name = "recs.generate.signal_degraded",
                    user_id = %user,
                    signal = "events",
                    error = %error,
                    "behavioral events unavailable, proceeding with empty signal"
                );
                Vec::new()
            }
        };

        let purchases = PurchaseSignals::from_orders(&orders);
        let preferred = purchases.top_categories(TOP_CATEGORY_COUNT);
        let mut exclusions: Vec<ProductId> = purchases.purchased.iter().cloned().collect();
        exclusions.sort_by(|a, b| a.0.cmp(&b.0));
        let viewed = viewed_product_ids(&events);

        let mut board = ScoreBoard::new();

        if !preferred.is_empty() {
            match self
                .catalog
                .in_categories(&preferred, &exclusions, SIMILAR_CATEGORY_LIMIT)
                .await
            {
                Ok(products) => {
                    for product in products {
                        board.touch(product.id, StrategyTag::SimilarCategory);
                    }
                }
                Err(error) => self.warn_strategy_degraded(user, StrategyTag::SimilarCategory, &error),
            }
        }

        if !viewed.is_empty() {
            match self.catalog.find_by_ids(&viewed).await {
                Ok(products) => {
                    for product in products {
                        if product.in_stock() && !purchases.purchased.contains(&product.id) {
                            board.touch(product.id, StrategyTag::RecentlyViewed);
                        }
                    }
                }
                Err(error) => self.warn_strategy_degraded(user, StrategyTag::RecentlyViewed, &error),
            }
        }

        if !preferred.is_empty() {
            match self.catalog.outside_categories(&preferred, &exclusions, CROSS_SELL_LIMIT).await {
                Ok(products) => {
                    for product in products {
                        board.touch(product.id, StrategyTag::CrossSell);
                    }
                }
                Err(error) => self.warn_strategy_degraded(user, StrategyTag::CrossSell, &error),
            }
        }

        // Scarcity backstop: only runs when the first three strategies left
        // the board under the floor.
        if board.len() < self.config.fallback_floor {
            match self.catalog.trending(TRENDING_MIN_STOCK, TRENDING_LIMIT).await {
                Ok(products) => {
                    for product in products {
                        if !purchases.purchased.contains(&product.id) {
                            board.touch(product.id, StrategyTag::Trending);
                        }
                    }
                }
                Err(error) => self.warn_strategy_degraded(user, StrategyTag::Trending, &error),
            }
        }

        let now = Utc::now();
        let records: Vec<Recommendation> = board
            .into_ranked(self.config.score_ceiling)
            .into_iter()
            .take(self.config.max_recommendations)
            .map(|entry| Recommendation {
                user: user.clone(),
                product_id: entry.product_id,
                score: entry.score,
                reason: entry.reason,
                metadata: json!({ "raw_score": entry.raw_score }),
                created_at: now,
            })
            .collect();

        let stored = records.len();
        self.store
            .replace_for_user(user, &records)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        info!(
            event_name = "recs.generate.completed",
            user_id = %user,
            stored,
            "recommendation set replaced"
        );
        Ok(stored)
    }

    fn warn_strategy_degraded(
        &self,
        user: &UserId,
        strategy: StrategyTag,
        error: &mandi_db::repositories::RepositoryError,
    ) {
        warn!(
            event_name = "recs.generate.strategy_degraded",
            user_id = %user,
            strategy = strategy.as_str(),
            error = %error,
            "strategy skipped after candidate read failure"
        );
    }
}

#[cfg(test)]
mod tests {
    use mandi_core::config::{AppConfig, RecsConfig};
    use mandi_core::domain::user::UserId;
    use mandi_core::recs::StrategyTag;
    use mandi_db::repositories::{RecommendationRepository, SqlRecommendationRepository};
    use mandi_db::{connect_with_settings, migrations};

    use super::RecommendationGenerator;

    fn recs_config() -> RecsConfig {
        AppConfig::default().recs
    }

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        sqlx::query("INSERT INTO users (id, name) VALUES ('retailer-1', 'Sharma Stores')")
            .execute(&pool)
            .await
            .expect("insert user");
        sqlx::query("INSERT INTO distributors (id, name) VALUES ('dist-1', 'Fresh Supply Co')")
            .execute(&pool)
            .await
            .expect("insert distributor");

        pool
    }

    async fn insert_product(pool: &sqlx::SqlitePool, id: &str, category: &str, stock: i64) {
        sqlx::query(
            "INSERT INTO products (id, name, category, price, stock, distributor_id)
             VALUES (?, ?, ?, '100.00', ?, 'dist-1')",
        )
        .bind(id)
        .bind(format!("Product {id}"))
        .bind(category)
        .bind(stock)
        .execute(pool)
        .await
        .expect("insert product");
    }

    async fn insert_order(pool: &sqlx::SqlitePool, id: &str, lines: &[(&str, u32)]) {
        sqlx::query(
            "INSERT INTO orders (id, retailer_id, created_at) VALUES (?, 'retailer-1', ?)",
        )
        .bind(id)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("insert order");
        for (product_id, quantity) in lines {
            sqlx::query(
                "INSERT INTO order_lines (order_id, product_id, quantity) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(product_id)
            .bind(quantity)
            .execute(pool)
            .await
            .expect("insert line");
        }
    }

    async fn insert_view(pool: &sqlx::SqlitePool, id: &str, product_id: &str) {
        sqlx::query(
            "INSERT INTO user_events (id, user_id, event_type, product_id, created_at)
             VALUES (?, 'retailer-1', 'product_view', ?, ?)",
        )
        .bind(id)
        .bind(product_id)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .expect("insert event");
    }

    #[tokio::test]
    async fn cold_start_falls_back_to_trending_with_normalized_scores() {
        let pool = setup().await;
        for index in 0..6 {
            insert_product(&pool, &format!("prod-{index}"), "grains", 60).await;
        }

        let generator = RecommendationGenerator::from_pool(pool.clone(), recs_config());
        let user = UserId("retailer-1".to_string());
        let stored = generator.generate_for_user(&user).await.expect("generate");
        assert_eq!(stored, 6);

        let store = SqlRecommendationRepository::new(pool);
        let records = store.top_for_user(&user, 20).await.expect("query");
        assert_eq!(records.len(), 6);
        for record in &records {
            assert_eq!(record.reason, StrategyTag::Trending);
            // 0.8 / 5.0
            assert!((record.score - 0.16).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn preferred_categories_drive_content_affinity_and_cross_sell() {
        let pool = setup().await;
        // Category A dominates history, B trails; C is never purchased.
        insert_product(&pool, "prod-a-bought", "grains", 40).await;
        insert_product(&pool, "prod-a-new", "grains", 40).await;
        insert_product(&pool, "prod-b-bought", "dairy", 40).await;
        insert_product(&pool, "prod-c-new", "snacks", 40).await;
        insert_order(&pool, "ord-1", &[("prod-a-bought", 10), ("prod-b-bought", 2)]).await;

        let generator = RecommendationGenerator::from_pool(pool.clone(), recs_config());
        let user = UserId("retailer-1".to_string());
        generator.generate_for_user(&user).await.expect("generate");

        let store = SqlRecommendationRepository::new(pool);
        let records = store.top_for_user(&user, 20).await.expect("query");

        let affinity: Vec<&str> = records
            .iter()
            .filter(|r| r.reason == StrategyTag::SimilarCategory)
            .map(|r| r.product_id.0.as_str())
            .collect();
        let cross: Vec<&str> = records
            .iter()
            .filter(|r| r.reason == StrategyTag::CrossSell)
            .map(|r| r.product_id.0.as_str())
            .collect();

        assert_eq!(affinity, vec!["prod-a-new"]);
        assert_eq!(cross, vec!["prod-c-new"]);
        // Purchased products never come back.
        assert!(records.iter().all(|r| !r.product_id.0.ends_with("-bought")));
    }

    #[tokio::test]
    async fn overlapping_strategies_sum_weights_and_keep_latest_reason() {
        let pool = setup().await;
        insert_product(&pool, "prod-anchor", "grains", 30).await;
        insert_product(&pool, "prod-overlap", "grains", 30).await;
        // Enough candidates elsewhere to keep trending quiet is not needed;
        // trending requires stock > 50 and none qualifies here.
        insert_order(&pool, "ord-1", &[("prod-anchor", 5)]).await;
        insert_view(&pool, "ev-1", "prod-overlap").await;

        let generator = RecommendationGenerator::from_pool(pool.clone(), recs_config());
        let user = UserId("retailer-1".to_string());
        generator.generate_for_user(&user).await.expect("generate");

        let store = SqlRecommendationRepository::new(pool);
        let records = store.top_for_user(&user, 20).await.expect("query");
        let overlap = records
            .iter()
            .find(|r| r.product_id.0 == "prod-overlap")
            .expect("overlap candidate stored");

        // similar-category (1.2) + recently-viewed (0.9) = 2.1 raw, 0.42 normalized.
        assert!((overlap.score - 0.42).abs() < 1e-9);
        assert_eq!(overlap.metadata["raw_score"], serde_json::json!(2.1));
        assert_eq!(overlap.reason, StrategyTag::RecentlyViewed);
    }

    #[tokio::test]
    async fn out_of_stock_and_purchased_products_are_never_recommended() {
        let pool = setup().await;
        insert_product(&pool, "prod-bought", "grains", 25).await;
        insert_product(&pool, "prod-empty", "grains", 0).await;
        insert_product(&pool, "prod-ok", "grains", 25).await;
        insert_order(&pool, "ord-1", &[("prod-bought", 3)]).await;
        insert_view(&pool, "ev-1", "prod-empty").await;
        insert_view(&pool, "ev-2", "prod-bought").await;

        let generator = RecommendationGenerator::from_pool(pool.clone(), recs_config());
        let user = UserId("retailer-1".to_string());
        generator.generate_for_user(&user).await.expect("generate");

        let store = SqlRecommendationRepository::new(pool);
        let records = store.top_for_user(&user, 20).await.expect("query");

        let ids: Vec<&str> = records.iter().map(|r| r.product_id.0.as_str()).collect();
        assert!(ids.contains(&"prod-ok"));
        assert!(!ids.contains(&"prod-empty"));
        assert!(!ids.contains(&"prod-bought"));
    }

    #[tokio::test]
    async fn trending_stays_quiet_once_the_floor_is_met() {
        let pool = setup().await;
        for index in 0..5 {
            insert_product(&pool, &format!("prod-grain-{index}"), "grains", 30).await;
        }
        // High-stock product that would win a trending slot if the backstop ran.
        insert_product(&pool, "prod-hot", "beverages", 400).await;
        insert_order(&pool, "ord-1", &[("prod-grain-0", 2)]).await;

        let generator = RecommendationGenerator::from_pool(pool.clone(), recs_config());
        let user = UserId("retailer-1".to_string());
        generator.generate_for_user(&user).await.expect("generate");

        let store = SqlRecommendationRepository::new(pool);
        let records = store.top_for_user(&user, 20).await.expect("query");

        // 4 unpurchased grain products + prod-hot via cross-sell = floor met.
        assert!(records.len() >= 5);
        assert!(records.iter().all(|r| r.reason != StrategyTag::Trending));
    }

    #[tokio::test]
    async fn regeneration_with_unchanged_signals_is_idempotent() {
        let pool = setup().await;
        insert_product(&pool, "prod-a", "grains", 30).await;
        insert_product(&pool, "prod-b", "snacks", 30).await;
        insert_order(&pool, "ord-1", &[("prod-a", 2)]).await;

        let generator = RecommendationGenerator::from_pool(pool.clone(), recs_config());
        let user = UserId("retailer-1".to_string());

        generator.generate_for_user(&user).await.expect("first run");
        let store = SqlRecommendationRepository::new(pool.clone());
        let first = store.top_for_user(&user, 20).await.expect("query");

        generator.generate_for_user(&user).await.expect("second run");
        let second = store.top_for_user(&user, 20).await.expect("query");

        assert_eq!(first.len(), second.len());
        let first_ids: Vec<_> = first.iter().map(|r| r.product_id.0.clone()).collect();
        let second_ids: Vec<_> = second.iter().map(|r| r.product_id.0.clone()).collect();
        assert_eq!(first_ids, second_ids);
    }
}
