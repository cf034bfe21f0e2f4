//! Recommendation scoring engine
//!
//! Derives per-user signals from order history and behavioral events, lets
//! the four strategies propose weighted candidates, and ranks a bounded,
//! normalized list. Everything in this module is pure; data access lives in
//! the repository layer.

mod scoring;
mod signals;
mod types;

pub use scoring::{RankedProduct, ScoreBoard};
pub use signals::{viewed_product_ids, PurchaseSignals};
pub use types::StrategyTag;

/// Raw-score ceiling used to normalize into [0, 1]. A heuristic calibration
/// constant, not a derived maximum; the effective value comes from config.
pub const DEFAULT_SCORE_CEILING: f64 = 5.0;

/// A stored ranked list never exceeds this many entries.
pub const MAX_RECOMMENDATIONS: usize = 20;

/// The trending backstop only fires when the board holds fewer candidates
/// than this after the first three strategies.
pub const FALLBACK_FLOOR: usize = 5;

/// Candidate caps per strategy.
pub const SIMILAR_CATEGORY_LIMIT: u32 = 10;
pub const CROSS_SELL_LIMIT: u32 = 5;
pub const TRENDING_LIMIT: u32 = 10;

/// Stock level above which a product counts as trending.
pub const TRENDING_MIN_STOCK: i64 = 50;

/// Signal read bounds.
pub const ORDER_HISTORY_LIMIT: u32 = 50;
pub const EVENT_HISTORY_LIMIT: u32 = 100;
pub const VIEWED_SIGNAL_LIMIT: u32 = 20;

/// How many preferred categories feed content-affinity and cross-sell.
pub const TOP_CATEGORY_COUNT: usize = 3;
