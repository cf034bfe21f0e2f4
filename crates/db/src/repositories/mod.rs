use async_trait::async_trait;
use thiserror::Error;

use mandi_core::domain::event::BehavioralEvent;
use mandi_core::domain::order::Order;
use mandi_core::domain::product::{Product, ProductId};
use mandi_core::domain::recommendation::Recommendation;
use mandi_core::domain::user::UserId;

pub mod catalog;
pub mod event;
pub mod order;
pub mod recommendation;
pub mod user;

pub use catalog::SqlCatalogRepository;
pub use event::SqlEventRepository;
pub use order::SqlOrderRepository;
pub use recommendation::SqlRecommendationRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Read-only catalog access. Every query that feeds the internal strategies
/// filters to in-stock products; stock filtering is a precondition of
/// candidate selection, not a scoring penalty.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// In-stock products inside `categories`, minus `exclude`, capped at `limit`.
    async fn in_categories(
        &self,
        categories: &[String],
        exclude: &[ProductId],
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// In-stock products outside `categories`, minus `exclude`, capped at `limit`.
    async fn outside_categories(
        &self,
        categories: &[String],
        exclude: &[ProductId],
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Products with stock above `min_stock`, highest stock first.
    async fn trending(&self, min_stock: i64, limit: u32) -> Result<Vec<Product>, RepositoryError>;
}

/// Read-only order history access.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// The user's most recent orders (newest first) with line items resolved
    /// to product id, category, and quantity. An empty history is a valid
    /// result, not an error.
    async fn recent_for_retailer(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// The user's most recent behavioral events, newest first.
    async fn recent_for_user(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<BehavioralEvent>, RepositoryError>;

    /// Distinct product ids from the user's product-view events, most
    /// recently viewed first.
    async fn distinct_viewed_products(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<ProductId>, RepositoryError>;

    async fn log_event(&self, event: &BehavioralEvent) -> Result<(), RepositoryError>;

    /// Delete events older than the retention window; returns the purged row
    /// count. Substitutes for the TTL index a document store would carry.
    async fn purge_expired(&self, retention_days: i64) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    /// Replace the user's whole recommendation set in one transaction: delete
    /// everything owned by the user, then insert `records` in rank order. A
    /// concurrent reader sees the old complete list or the new complete list.
    async fn replace_for_user(
        &self,
        user: &UserId,
        records: &[Recommendation],
    ) -> Result<(), RepositoryError>;

    /// Up to `limit` stored records, most relevant first (stored rank order).
    async fn top_for_user(
        &self,
        user: &UserId,
        limit: u32,
    ) -> Result<Vec<Recommendation>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Every known user id, for batch enumeration.
    async fn all_ids(&self) -> Result<Vec<UserId>, RepositoryError>;
}
