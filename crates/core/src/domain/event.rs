use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::user::UserId;

/// Behavioral events older than this are purged by the batch scheduler.
pub const EVENT_RETENTION_DAYS: i64 = 90;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Search,
    ProductView,
    AddToCart,
    RemoveFromCart,
    CategoryView,
}

impl EventKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "search" => Some(Self::Search),
            "product_view" => Some(Self::ProductView),
            "add_to_cart" => Some(Self::AddToCart),
            "remove_from_cart" => Some(Self::RemoveFromCart),
            "category_view" => Some(Self::CategoryView),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::ProductView => "product_view",
            Self::AddToCart => "add_to_cart",
            Self::RemoveFromCart => "remove_from_cart",
            Self::CategoryView => "category_view",
        }
    }
}

/// A logged user interaction. Detail fields are event-specific: a product
/// view carries `product_id`, a search carries `search_query`, a category
/// view carries `category`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehavioralEvent {
    pub id: String,
    pub user: UserId,
    pub kind: EventKind,
    pub product_id: Option<ProductId>,
    pub category: Option<String>,
    pub search_query: Option<String>,
    pub created_at: DateTime<Utc>,
}
