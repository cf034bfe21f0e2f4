//! On-demand recommendation flow backed by the external scoring service.
//!
//! The service is an opaque ranking oracle: we ship it the user's recent
//! viewed-product signal, take its ranked ids as-is, and enrich them with
//! authoritative catalog data before answering the caller. Ids the catalog
//! does not know pass through with only the external fields.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use mandi_core::config::ScoringServiceConfig;
use mandi_core::domain::product::{Product, ProductId};
use mandi_core::domain::user::UserId;
use mandi_core::errors::ApplicationError;
use mandi_core::recs::VIEWED_SIGNAL_LIMIT;
use mandi_db::repositories::{
    CatalogRepository, EventRepository, SqlCatalogRepository, SqlEventRepository,
};
use mandi_db::DbPool;

#[derive(Debug, Serialize)]
struct ScoringRequest {
    recent_behavior_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredItem {
    pub product_id: String,
    pub score: f64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoringResponse {
    #[serde(default)]
    pub recommendations: Vec<ScoredItem>,
    #[serde(default)]
    pub explanation: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ScoringErrorBody {
    #[serde(default)]
    detail: Option<String>,
}

pub struct ScoringServiceClient {
    client: Client,
    base_url: String,
}

impl ScoringServiceClient {
    pub fn new(config: &ScoringServiceConfig) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                ApplicationError::Configuration(format!("failed to build scoring client: {error}"))
            })?;
        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    pub async fn score(
        &self,
        user: &UserId,
        behavior: &[ProductId],
        count: u32,
    ) -> Result<ScoringResponse, ApplicationError> {
        let url = format!("{}/recommendations/{}?top_k={}", self.base_url, user.0, count);
        let body = ScoringRequest {
            recent_behavior_ids: behavior.iter().map(|id| id.0.clone()).collect(),
        };

        let response = self.client.post(&url).json(&body).send().await.map_err(|error| {
            let detail = if error.is_timeout() {
                "scoring service timed out".to_string()
            } else {
                format!("scoring service request failed: {error}")
            };
            ApplicationError::ExternalService { status: None, detail }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ScoringErrorBody>()
                .await
                .ok()
                .and_then(|error_body| error_body.detail)
                .unwrap_or_else(|| format!("scoring service returned {status}"));
            return Err(ApplicationError::ExternalService {
                status: Some(status.as_u16()),
                detail,
            });
        }

        response.json::<ScoringResponse>().await.map_err(|error| {
            ApplicationError::ExternalService {
                status: Some(status.as_u16()),
                detail: format!("failed to decode scoring response: {error}"),
            }
        })
    }
}

/// One enriched entry: the external service's fields merged with catalog
/// data when the id resolved.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedRecommendation {
    pub product_id: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributor: Option<String>,
}

/// Join external items against resolved catalog products, preserving the
/// external ranking order and clamping to the requested count.
pub fn merge_with_catalog(
    items: Vec<ScoredItem>,
    products: &[Product],
    desired_count: usize,
) -> Vec<EnrichedRecommendation> {
    let by_id: HashMap<&str, &Product> =
        products.iter().map(|product| (product.id.0.as_str(), product)).collect();

    items
        .into_iter()
        .take(desired_count)
        .map(|item| {
            let catalog = by_id.get(item.product_id.as_str());
            EnrichedRecommendation {
                name: catalog.map(|product| product.name.clone()),
                description: catalog.and_then(|product| product.description.clone()),
                category: catalog.map(|product| product.category.clone()),
                price: catalog.map(|product| product.price),
                stock: catalog.map(|product| product.stock),
                distributor: catalog.map(|product| product.distributor_name.clone()),
                product_id: item.product_id,
                score: item.score,
                title: item.title,
                reason: item.reason,
            }
        })
        .collect()
}

#[derive(Debug)]
pub struct OnDemandResult {
    pub recommendations: Vec<EnrichedRecommendation>,
    pub explanation: serde_json::Value,
}

pub struct EnrichmentService {
    events: Arc<dyn EventRepository>,
    catalog: Arc<dyn CatalogRepository>,
    scoring: ScoringServiceClient,
}

impl EnrichmentService {
    pub fn new(
        events: Arc<dyn EventRepository>,
        catalog: Arc<dyn CatalogRepository>,
        scoring: ScoringServiceClient,
    ) -> Self {
        Self { events, catalog, scoring }
    }

    pub fn from_pool(
        pool: DbPool,
        config: &ScoringServiceConfig,
    ) -> Result<Self, ApplicationError> {
        Ok(Self::new(
            Arc::new(SqlEventRepository::new(pool.clone())),
            Arc::new(SqlCatalogRepository::new(pool)),
            ScoringServiceClient::new(config)?,
        ))
    }

    /// Run the synchronous on-demand flow. The persisted store is never
    /// touched; external-service failures surface to the caller.
    pub async fn generate(
        &self,
        user: &UserId,
        desired_count: u32,
    ) -> Result<OnDemandResult, ApplicationError> {
        let behavior = match self.events.distinct_viewed_products(user, VIEWED_SIGNAL_LIMIT).await
        {
            Ok(behavior) => behavior,
            Err(error) => {
                warn!(
                    event_name = "recs.ondemand.signal_degraded",
                    user_id = %user,
                    error = %error,
                    "viewed-product signal unavailable, sending empty behavior"
                );
                Vec::new()
            }
        };

        let response = self.scoring.score(user, &behavior, desired_count).await?;

        let ids: Vec<ProductId> = response
            .recommendations
            .iter()
            .map(|item| ProductId(item.product_id.clone()))
            .collect();
        let products = match self.catalog.find_by_ids(&ids).await {
            Ok(products) => products,
            Err(error) => {
                warn!(
                    event_name = "recs.ondemand.enrichment_degraded",
                    user_id = %user,
                    error = %error,
                    "catalog join failed, returning external fields only"
                );
                Vec::new()
            }
        };

        let recommendations =
            merge_with_catalog(response.recommendations, &products, desired_count as usize);
        info!(
            event_name = "recs.ondemand.completed",
            user_id = %user,
            returned = recommendations.len(),
            "on-demand recommendations generated"
        );

        Ok(OnDemandResult {
            recommendations,
            explanation: response.explanation.unwrap_or_else(|| json!({})),
        })
    }
}
