pub mod config;
pub mod domain;
pub mod errors;
pub mod recs;

pub use domain::event::{BehavioralEvent, EventKind, EVENT_RETENTION_DAYS};
pub use domain::order::{Order, OrderId, OrderLine};
pub use domain::product::{Product, ProductId};
pub use domain::recommendation::Recommendation;
pub use domain::user::UserId;
pub use errors::{ApplicationError, DomainError, InterfaceError, InterfaceErrorKind};
pub use recs::{viewed_product_ids, PurchaseSignals, RankedProduct, ScoreBoard, StrategyTag};
