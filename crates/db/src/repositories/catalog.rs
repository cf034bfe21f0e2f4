use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Row, Sqlite};

use mandi_core::domain::product::{Product, ProductId};

use super::{CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.category, p.price, p.stock, \
     p.distributor_id, d.name AS distributor_name";

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category: String =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_raw: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let stock: i64 = row.try_get("stock").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let distributor_id: String =
        row.try_get("distributor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let distributor_name: String =
        row.try_get("distributor_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price = price_raw
        .parse::<Decimal>()
        .map_err(|e| RepositoryError::Decode(format!("invalid price `{price_raw}`: {e}")))?;

    Ok(Product {
        id: ProductId(id),
        name,
        description,
        category,
        price,
        stock,
        distributor_id,
        distributor_name,
    })
}

fn push_exclusions(builder: &mut QueryBuilder<'_, Sqlite>, exclude: &[ProductId]) {
    if exclude.is_empty() {
        return;
    }
    builder.push(" AND p.id NOT IN (");
    let mut separated = builder.separated(", ");
    for product_id in exclude {
        separated.push_bind(product_id.0.clone());
    }
    builder.push(")");
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn find_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p
             JOIN distributors d ON d.id = p.distributor_id
             WHERE p.id IN ("
        ));
        let mut separated = builder.separated(", ");
        for product_id in ids {
            separated.push_bind(product_id.0.clone());
        }
        builder.push(") ORDER BY p.id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn in_categories(
        &self,
        categories: &[String],
        exclude: &[ProductId],
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p
             JOIN distributors d ON d.id = p.distributor_id
             WHERE p.stock > 0 AND p.category IN ("
        ));
        let mut separated = builder.separated(", ");
        for category in categories {
            separated.push_bind(category.clone());
        }
        builder.push(")");
        push_exclusions(&mut builder, exclude);
        builder.push(" ORDER BY p.id LIMIT ");
        builder.push_bind(i64::from(limit));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn outside_categories(
        &self,
        categories: &[String],
        exclude: &[ProductId],
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p
             JOIN distributors d ON d.id = p.distributor_id
             WHERE p.stock > 0"
        ));
        if !categories.is_empty() {
            builder.push(" AND p.category NOT IN (");
            let mut separated = builder.separated(", ");
            for category in categories {
                separated.push_bind(category.clone());
            }
            builder.push(")");
        }
        push_exclusions(&mut builder, exclude);
        builder.push(" ORDER BY p.id LIMIT ");
        builder.push_bind(i64::from(limit));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn trending(&self, min_stock: i64, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p
             JOIN distributors d ON d.id = p.distributor_id
             WHERE p.stock > ?
             ORDER BY p.stock DESC, p.id
             LIMIT ?"
        ))
        .bind(min_stock)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }
}
