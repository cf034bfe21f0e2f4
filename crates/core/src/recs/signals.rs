use std::collections::{HashMap, HashSet};

use crate::domain::event::{BehavioralEvent, EventKind};
use crate::domain::order::Order;
use crate::domain::product::ProductId;

/// Signals derived from a user's order history: the already-purchased
/// exclusion set and the quantity-weighted category frequency.
#[derive(Clone, Debug, Default)]
pub struct PurchaseSignals {
    pub purchased: HashSet<ProductId>,
    pub category_quantity: HashMap<String, u64>,
}

impl PurchaseSignals {
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut signals = Self::default();
        for order in orders {
            for line in &order.lines {
                signals.purchased.insert(line.product_id.clone());
                *signals.category_quantity.entry(line.category.clone()).or_insert(0) +=
                    u64::from(line.quantity);
            }
        }
        signals
    }

    pub fn is_empty(&self) -> bool {
        self.purchased.is_empty()
    }

    /// Categories ranked by total purchased quantity, descending. Ties break
    /// on the category identifier so the ranking is stable across runs.
    pub fn top_categories(&self, count: usize) -> Vec<String> {
        let mut ranked: Vec<(&String, &u64)> = self.category_quantity.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        ranked.into_iter().take(count).map(|(category, _)| category.clone()).collect()
    }
}

/// Distinct product ids from product-view events, most recent first. Events
/// are expected newest-first, as the event reader returns them.
pub fn viewed_product_ids(events: &[BehavioralEvent]) -> Vec<ProductId> {
    let mut seen = HashSet::new();
    let mut viewed = Vec::new();
    for event in events {
        if event.kind != EventKind::ProductView {
            continue;
        }
        if let Some(product_id) = &event.product_id {
            if seen.insert(product_id.clone()) {
                viewed.push(product_id.clone());
            }
        }
    }
    viewed
}
