use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::product::ProductId;
use crate::domain::user::UserId;
use crate::recs::StrategyTag;

/// A persisted, ranked recommendation. For a given user the whole record set
/// is replaced on every regeneration; within one generation at most one
/// record exists per (user, product) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub user: UserId,
    pub product_id: ProductId,
    /// Normalized score in [0, 1].
    pub score: f64,
    pub reason: StrategyTag,
    /// Opaque, strategy-specific metadata.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}
