use serde::{Deserialize, Serialize};

/// The strategy that proposed a candidate. When several strategies touch the
/// same product their weights sum, and the last strategy in the fixed
/// execution order (similar-category, recently-viewed, cross-sell, trending)
/// wins the attribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyTag {
    SimilarCategory,
    RecentlyViewed,
    CrossSell,
    Trending,
}

impl StrategyTag {
    /// Fixed partial-score weight contributed per touch.
    pub fn weight(&self) -> f64 {
        match self {
            StrategyTag::SimilarCategory => 1.2,
            StrategyTag::RecentlyViewed => 0.9,
            StrategyTag::CrossSell => 1.3,
            StrategyTag::Trending => 0.8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTag::SimilarCategory => "similar_category",
            StrategyTag::RecentlyViewed => "recently_viewed",
            StrategyTag::CrossSell => "cross_sell",
            StrategyTag::Trending => "trending",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "similar_category" => Some(StrategyTag::SimilarCategory),
            "recently_viewed" => Some(StrategyTag::RecentlyViewed),
            "cross_sell" => Some(StrategyTag::CrossSell),
            "trending" => Some(StrategyTag::Trending),
            _ => None,
        }
    }

    /// Human-readable explanation used by user-facing surfaces.
    pub fn description(&self) -> &'static str {
        match self {
            StrategyTag::SimilarCategory => "From the categories you buy most",
            StrategyTag::RecentlyViewed => "You viewed this recently",
            StrategyTag::CrossSell => "Something different to explore",
            StrategyTag::Trending => "Popular across the marketplace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StrategyTag;

    #[test]
    fn weights_match_strategy_table() {
        assert_eq!(StrategyTag::SimilarCategory.weight(), 1.2);
        assert_eq!(StrategyTag::RecentlyViewed.weight(), 0.9);
        assert_eq!(StrategyTag::CrossSell.weight(), 1.3);
        assert_eq!(StrategyTag::Trending.weight(), 0.8);
    }

    #[test]
    fn tags_round_trip_through_storage_names() {
        for tag in [
            StrategyTag::SimilarCategory,
            StrategyTag::RecentlyViewed,
            StrategyTag::CrossSell,
            StrategyTag::Trending,
        ] {
            assert_eq!(StrategyTag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(StrategyTag::parse("reorder"), None);
    }
}
