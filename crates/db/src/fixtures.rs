//! Deterministic marketplace seed data for demos and end-to-end checks.
//!
//! Three retailer profiles exercise the engine's signal paths: a repeat buyer
//! with category-heavy order history, a browser with view events only, and a
//! cold-start retailer with no history at all.

use chrono::{Duration, Utc};
use sqlx::Row;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

struct UserSeed {
    id: &'static str,
    name: &'static str,
}

const USER_SEEDS: &[UserSeed] = &[
    UserSeed { id: "retailer-bulkbuyer", name: "Sharma Wholesale Stores" },
    UserSeed { id: "retailer-browser", name: "Lakeview Corner Mart" },
    UserSeed { id: "retailer-coldstart", name: "New Dawn Traders" },
];

struct DistributorSeed {
    id: &'static str,
    name: &'static str,
}

const DISTRIBUTOR_SEEDS: &[DistributorSeed] = &[
    DistributorSeed { id: "dist-freshsupply", name: "Fresh Supply Co" },
    DistributorSeed { id: "dist-unionfoods", name: "Union Foods Distribution" },
];

struct ProductSeed {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    price: &'static str,
    stock: i64,
    distributor_id: &'static str,
}

const PRODUCT_SEEDS: &[ProductSeed] = &[
    ProductSeed {
        id: "prod-atta-10kg",
        name: "Whole Wheat Atta 10kg",
        category: "grains",
        price: "420.00",
        stock: 140,
        distributor_id: "dist-freshsupply",
    },
    ProductSeed {
        id: "prod-basmati-5kg",
        name: "Basmati Rice 5kg",
        category: "grains",
        price: "610.00",
        stock: 35,
        distributor_id: "dist-freshsupply",
    },
    ProductSeed {
        id: "prod-poha-1kg",
        name: "Thick Poha 1kg",
        category: "grains",
        price: "62.00",
        stock: 88,
        distributor_id: "dist-unionfoods",
    },
    ProductSeed {
        id: "prod-ghee-1l",
        name: "Pure Cow Ghee 1L",
        category: "dairy",
        price: "540.00",
        stock: 64,
        distributor_id: "dist-freshsupply",
    },
    ProductSeed {
        id: "prod-paneer-1kg",
        name: "Fresh Paneer Block 1kg",
        category: "dairy",
        price: "330.00",
        stock: 0,
        distributor_id: "dist-unionfoods",
    },
    ProductSeed {
        id: "prod-chips-carton",
        name: "Salted Chips Carton",
        category: "snacks",
        price: "480.00",
        stock: 120,
        distributor_id: "dist-unionfoods",
    },
    ProductSeed {
        id: "prod-namkeen-5kg",
        name: "Mixed Namkeen 5kg",
        category: "snacks",
        price: "390.00",
        stock: 18,
        distributor_id: "dist-unionfoods",
    },
    ProductSeed {
        id: "prod-tea-2kg",
        name: "Assam Tea 2kg",
        category: "beverages",
        price: "720.00",
        stock: 75,
        distributor_id: "dist-freshsupply",
    },
    ProductSeed {
        id: "prod-soda-crate",
        name: "Club Soda Crate",
        category: "beverages",
        price: "260.00",
        stock: 42,
        distributor_id: "dist-unionfoods",
    },
];

struct OrderSeed {
    id: &'static str,
    retailer_id: &'static str,
    days_ago: i64,
    lines: &'static [(&'static str, u32)],
}

const ORDER_SEEDS: &[OrderSeed] = &[
    OrderSeed {
        id: "ord-bulk-001",
        retailer_id: "retailer-bulkbuyer",
        days_ago: 21,
        lines: &[("prod-atta-10kg", 8), ("prod-ghee-1l", 2)],
    },
    OrderSeed {
        id: "ord-bulk-002",
        retailer_id: "retailer-bulkbuyer",
        days_ago: 9,
        lines: &[("prod-atta-10kg", 6), ("prod-basmati-5kg", 4)],
    },
    OrderSeed {
        id: "ord-bulk-003",
        retailer_id: "retailer-bulkbuyer",
        days_ago: 2,
        lines: &[("prod-ghee-1l", 3)],
    },
];

struct EventSeed {
    id: &'static str,
    user_id: &'static str,
    event_type: &'static str,
    product_id: Option<&'static str>,
    search_query: Option<&'static str>,
    days_ago: i64,
}

const EVENT_SEEDS: &[EventSeed] = &[
    EventSeed {
        id: "ev-browser-001",
        user_id: "retailer-browser",
        event_type: "product_view",
        product_id: Some("prod-tea-2kg"),
        search_query: None,
        days_ago: 4,
    },
    EventSeed {
        id: "ev-browser-002",
        user_id: "retailer-browser",
        event_type: "product_view",
        product_id: Some("prod-chips-carton"),
        search_query: None,
        days_ago: 2,
    },
    EventSeed {
        id: "ev-browser-003",
        user_id: "retailer-browser",
        event_type: "search",
        product_id: None,
        search_query: Some("namkeen wholesale"),
        days_ago: 2,
    },
    EventSeed {
        id: "ev-bulk-001",
        user_id: "retailer-bulkbuyer",
        event_type: "product_view",
        product_id: Some("prod-namkeen-5kg"),
        search_query: None,
        days_ago: 1,
    },
];

#[derive(Debug, Clone)]
pub struct SeedResult {
    pub users: usize,
    pub products: usize,
    pub orders: usize,
    pub events: usize,
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

pub struct MarketSeedDataset;

impl MarketSeedDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        for user in USER_SEEDS {
            sqlx::query("INSERT OR REPLACE INTO users (id, name) VALUES (?, ?)")
                .bind(user.id)
                .bind(user.name)
                .execute(pool)
                .await?;
        }

        for distributor in DISTRIBUTOR_SEEDS {
            sqlx::query("INSERT OR REPLACE INTO distributors (id, name) VALUES (?, ?)")
                .bind(distributor.id)
                .bind(distributor.name)
                .execute(pool)
                .await?;
        }

        for product in PRODUCT_SEEDS {
            sqlx::query(
                "INSERT OR REPLACE INTO products
                    (id, name, category, price, stock, distributor_id)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(product.id)
            .bind(product.name)
            .bind(product.category)
            .bind(product.price)
            .bind(product.stock)
            .bind(product.distributor_id)
            .execute(pool)
            .await?;
        }

        let now = Utc::now();
        for order in ORDER_SEEDS {
            sqlx::query("INSERT OR REPLACE INTO orders (id, retailer_id, created_at) VALUES (?, ?, ?)")
                .bind(order.id)
                .bind(order.retailer_id)
                .bind((now - Duration::days(order.days_ago)).to_rfc3339())
                .execute(pool)
                .await?;
            for (product_id, quantity) in order.lines {
                sqlx::query(
                    "INSERT OR REPLACE INTO order_lines (order_id, product_id, quantity)
                     VALUES (?, ?, ?)",
                )
                .bind(order.id)
                .bind(product_id)
                .bind(quantity)
                .execute(pool)
                .await?;
            }
        }

        for event in EVENT_SEEDS {
            sqlx::query(
                "INSERT OR REPLACE INTO user_events
                    (id, user_id, event_type, product_id, category, search_query, created_at)
                 VALUES (?, ?, ?, ?, NULL, ?, ?)",
            )
            .bind(event.id)
            .bind(event.user_id)
            .bind(event.event_type)
            .bind(event.product_id)
            .bind(event.search_query)
            .bind((now - Duration::days(event.days_ago)).to_rfc3339())
            .execute(pool)
            .await?;
        }

        Ok(SeedResult {
            users: USER_SEEDS.len(),
            products: PRODUCT_SEEDS.len(),
            orders: ORDER_SEEDS.len(),
            events: EVENT_SEEDS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        checks.push(("users", table_count(pool, "users").await? >= USER_SEEDS.len() as i64));
        checks.push((
            "products",
            table_count(pool, "products").await? >= PRODUCT_SEEDS.len() as i64,
        ));
        checks.push(("orders", table_count(pool, "orders").await? >= ORDER_SEEDS.len() as i64));
        checks.push((
            "events",
            table_count(pool, "user_events").await? >= EVENT_SEEDS.len() as i64,
        ));

        let out_of_stock: i64 =
            sqlx::query("SELECT COUNT(*) AS count FROM products WHERE stock <= 0")
                .fetch_one(pool)
                .await?
                .try_get("count")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        checks.push(("out-of-stock-product-present", out_of_stock >= 1));

        let trending: i64 = sqlx::query("SELECT COUNT(*) AS count FROM products WHERE stock > 50")
            .fetch_one(pool)
            .await?
            .try_get("count")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        checks.push(("trending-stock-present", trending >= 1));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn table_count(pool: &DbPool, table: &str) -> Result<i64, RepositoryError> {
    let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {table}"))
        .fetch_one(pool)
        .await?;
    row.try_get("count").map_err(|e| RepositoryError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::MarketSeedDataset;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_loads_and_verifies() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let result = MarketSeedDataset::load(&pool).await.expect("load");
        assert_eq!(result.users, 3);
        assert_eq!(result.products, 9);

        let verification = MarketSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        MarketSeedDataset::load(&pool).await.expect("first load");
        MarketSeedDataset::load(&pool).await.expect("second load");

        let verification = MarketSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present);
    }
}
