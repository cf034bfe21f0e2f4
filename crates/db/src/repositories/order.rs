use chrono::{DateTime, Utc};
use sqlx::Row;

use mandi_core::domain::order::{Order, OrderId, OrderLine};
use mandi_core::domain::product::ProductId;
use mandi_core::domain::user::UserId;

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn recent_for_retailer(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT o.id AS order_id, o.created_at AS created_at,
                    l.product_id AS product_id, l.quantity AS quantity,
                    p.category AS category
             FROM (
                 SELECT id, created_at FROM orders
                 WHERE retailer_id = ?
                 ORDER BY datetime(created_at) DESC, id
                 LIMIT ?
             ) o
             JOIN order_lines l ON l.order_id = o.id
             JOIN products p ON p.id = l.product_id
             ORDER BY datetime(o.created_at) DESC, o.id, l.product_id",
        )
        .bind(&user.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut orders: Vec<Order> = Vec::new();
        for row in &rows {
            let order_id: String =
                row.try_get("order_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let created_at_raw: String =
                row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let product_id: String =
                row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let quantity: i64 =
                row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let category: String =
                row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;

            let line = OrderLine {
                product_id: ProductId(product_id),
                category,
                quantity: quantity.max(0) as u32,
            };

            match orders.last_mut() {
                Some(order) if order.id.0 == order_id => order.lines.push(line),
                _ => {
                    let created_at = DateTime::parse_from_rfc3339(&created_at_raw)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now());
                    orders.push(Order {
                        id: OrderId(order_id),
                        retailer: user.clone(),
                        lines: vec![line],
                        created_at,
                    });
                }
            }
        }

        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use mandi_core::domain::user::UserId;

    use super::SqlOrderRepository;
    use crate::repositories::OrderRepository;
    use crate::{connect_with_settings, migrations};

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

        for (id, category) in [("prod-atta", "grains"), ("prod-ghee", "dairy")] {
            sqlx::query(
                "INSERT INTO products (id, name, category, price, stock, distributor_id)
                 VALUES (?, ?, ?, '100.00', 10, 'dist-1')",
            )
            .bind(id)
            .bind(format!("Product {id}"))
            .bind(category)
            .execute(&pool)
            .await
            .expect("insert product");
        }

        pool
    }

    async fn insert_order(pool: &sqlx::SqlitePool, id: &str, days_ago: i64, lines: &[(&str, u32)]) {
        let created_at = (Utc::now() - Duration::days(days_ago)).to_rfc3339();
        sqlx::query("INSERT INTO orders (id, retailer_id, created_at) VALUES (?, 'retailer-1', ?)")
            .bind(id)
            .bind(created_at)
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
            .expect("insert order line");
        }
    }

    #[tokio::test]
    async fn recent_orders_resolve_lines_newest_first() {
        let pool = setup().await;
        insert_order(&pool, "ord-older", 10, &[("prod-atta", 6)]).await;
        insert_order(&pool, "ord-newer", 1, &[("prod-atta", 2), ("prod-ghee", 1)]).await;

        let repo = SqlOrderRepository::new(pool);
        let orders = repo
            .recent_for_retailer(&UserId("retailer-1".to_string()), 50)
            .await
            .expect("query");

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id.0, "ord-newer");
        assert_eq!(orders[0].lines.len(), 2);
        assert_eq!(orders[0].lines[1].category, "dairy");
        assert_eq!(orders[1].lines[0].quantity, 6);
    }

    #[tokio::test]
    async fn order_history_limit_bounds_orders_not_lines() {
        let pool = setup().await;
        insert_order(&pool, "ord-1", 3, &[("prod-atta", 1), ("prod-ghee", 1)]).await;
        insert_order(&pool, "ord-2", 2, &[("prod-atta", 1)]).await;
        insert_order(&pool, "ord-3", 1, &[("prod-ghee", 1)]).await;

        let repo = SqlOrderRepository::new(pool);
        let orders = repo
            .recent_for_retailer(&UserId("retailer-1".to_string()), 2)
            .await
            .expect("query");

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id.0, "ord-3");
        assert_eq!(orders[1].id.0, "ord-2");
    }

    #[tokio::test]
    async fn empty_history_is_a_valid_result() {
        let pool = setup().await;
        let repo = SqlOrderRepository::new(pool);

        let orders = repo
            .recent_for_retailer(&UserId("retailer-unknown".to_string()), 50)
            .await
            .expect("query");

        assert!(orders.is_empty());
    }
}
