//! Score accumulation and ranking.

use std::collections::HashMap;

use crate::domain::product::ProductId;

use super::types::StrategyTag;
use super::{DEFAULT_SCORE_CEILING, MAX_RECOMMENDATIONS};

#[derive(Clone, Debug)]
struct Candidate {
    raw_score: f64,
    reason: StrategyTag,
}

/// Request-scoped accumulation map from product to weighted score. Each
/// generation run owns its own board; there is no process-wide state.
///
/// Strategies add their weight when they touch a product (weights sum across
/// strategies) and the latest touch wins the reason attribution.
#[derive(Debug, Default)]
pub struct ScoreBoard {
    candidates: HashMap<ProductId, Candidate>,
}

/// A ranked entry produced by [`ScoreBoard::into_ranked`].
#[derive(Clone, Debug, PartialEq)]
pub struct RankedProduct {
    pub product_id: ProductId,
    /// Unnormalized sum of the strategy weights that touched this product.
    pub raw_score: f64,
    /// `min(raw_score / ceiling, 1)`, clamped to [0, 1].
    pub score: f64,
    pub reason: StrategyTag,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&mut self, product_id: ProductId, tag: StrategyTag) {
        let candidate = self
            .candidates
            .entry(product_id)
            .or_insert(Candidate { raw_score: 0.0, reason: tag });
        candidate.raw_score += tag.weight();
        candidate.reason = tag;
    }

    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.candidates.contains_key(product_id)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Rank by raw score descending (ties by product id so output is
    /// deterministic), truncate to the bounded list size, and normalize.
    pub fn into_ranked(self, ceiling: f64) -> Vec<RankedProduct> {
        let ceiling = if ceiling > 0.0 { ceiling } else { DEFAULT_SCORE_CEILING };

        let mut ranked: Vec<RankedProduct> = self
            .candidates
            .into_iter()
            .map(|(product_id, candidate)| RankedProduct {
                score: (candidate.raw_score / ceiling).clamp(0.0, 1.0),
                product_id,
                raw_score: candidate.raw_score,
                reason: candidate.reason,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.product_id.0.cmp(&b.product_id.0))
        });
        ranked.truncate(MAX_RECOMMENDATIONS);
        ranked
    }
}
