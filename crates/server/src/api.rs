//! Recommendation HTTP surface.
//!
//! Endpoints:
//! - `GET  /api/v1/users/{user_id}/recommendations`            — stored, ranked list
//! - `POST /api/v1/users/{user_id}/recommendations/refresh`    — run the internal pipeline once
//! - `POST /api/v1/users/{user_id}/recommendations/generate`   — on-demand flow via the scoring service
//! - `POST /api/v1/events`                                     — behavioral event ingress
//!
//! Authentication and session issuance live in the gateway in front of this
//! service; the user id travels in the path.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use mandi_core::domain::event::{BehavioralEvent, EventKind};
use mandi_core::domain::product::ProductId;
use mandi_core::domain::user::UserId;
use mandi_core::errors::{ApplicationError, InterfaceErrorKind};
use mandi_db::repositories::{
    EventRepository, RecommendationRepository, SqlEventRepository, SqlRecommendationRepository,
};
use mandi_db::DbPool;

use crate::enrichment::{EnrichedRecommendation, EnrichmentService};
use crate::generator::RecommendationGenerator;

const DEFAULT_STORED_LIMIT: u32 = 10;
const MAX_STORED_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct ApiState {
    generator: Arc<RecommendationGenerator>,
    enrichment: Arc<EnrichmentService>,
    store: Arc<dyn RecommendationRepository>,
    events: Arc<dyn EventRepository>,
    default_count: u32,
}

pub fn router(
    pool: DbPool,
    generator: Arc<RecommendationGenerator>,
    enrichment: Arc<EnrichmentService>,
    default_count: u32,
) -> Router {
    let state = ApiState {
        generator,
        enrichment,
        store: Arc::new(SqlRecommendationRepository::new(pool.clone())),
        events: Arc::new(SqlEventRepository::new(pool)),
        default_count,
    };

    Router::new()
        .route("/api/v1/users/{user_id}/recommendations", get(stored_recommendations))
        .route("/api/v1/users/{user_id}/recommendations/refresh", post(refresh_recommendations))
        .route("/api/v1/users/{user_id}/recommendations/generate", post(generate_on_demand))
        .route("/api/v1/events", post(log_event))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ApiError {
    message: String,
    detail: String,
    correlation_id: String,
}

fn error_response(error: ApplicationError) -> (StatusCode, Json<ApiError>) {
    let correlation_id = Uuid::new_v4().simple().to_string();
    let interface = error.into_interface(correlation_id.clone());

    let status = match interface.kind {
        InterfaceErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        InterfaceErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceErrorKind::UpstreamFailure { status } => {
            StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        InterfaceErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ApiError {
            message: interface.user_message().to_string(),
            detail: interface.to_string(),
            correlation_id,
        }),
    )
}

fn bad_request(detail: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            message: "The request could not be processed. Check inputs and try again."
                .to_string(),
            detail: detail.into(),
            correlation_id: Uuid::new_v4().simple().to_string(),
        }),
    )
}

#[derive(Debug, Serialize)]
struct StoredRecommendationView {
    product_id: String,
    score: f64,
    reason: String,
    reason_text: &'static str,
    metadata: Value,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct StoredRecommendationsResponse {
    count: usize,
    recommendations: Vec<StoredRecommendationView>,
}

#[derive(Debug, Deserialize)]
struct StoredQuery {
    #[serde(default)]
    limit: Option<u32>,
}

async fn stored_recommendations(
    Path(user_id): Path<String>,
    Query(query): Query<StoredQuery>,
    State(state): State<ApiState>,
) -> Result<Json<StoredRecommendationsResponse>, (StatusCode, Json<ApiError>)> {
    let user = UserId(user_id);
    let limit = query.limit.unwrap_or(DEFAULT_STORED_LIMIT).clamp(1, MAX_STORED_LIMIT);

    let records = state
        .store
        .top_for_user(&user, limit)
        .await
        .map_err(|error| error_response(ApplicationError::Persistence(error.to_string())))?;

    let recommendations: Vec<StoredRecommendationView> = records
        .into_iter()
        .map(|record| StoredRecommendationView {
            product_id: record.product_id.0,
            score: record.score,
            reason: record.reason.as_str().to_string(),
            reason_text: record.reason.description(),
            metadata: record.metadata,
            created_at: record.created_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(StoredRecommendationsResponse { count: recommendations.len(), recommendations }))
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    user_id: String,
    stored: usize,
}

async fn refresh_recommendations(
    Path(user_id): Path<String>,
    State(state): State<ApiState>,
) -> Result<Json<RefreshResponse>, (StatusCode, Json<ApiError>)> {
    let user = UserId(user_id);
    let stored = state.generator.generate_for_user(&user).await.map_err(error_response)?;
    Ok(Json(RefreshResponse { user_id: user.0, stored }))
}

#[derive(Debug, Deserialize)]
struct GenerateQuery {
    #[serde(default)]
    count: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OnDemandResponse {
    message: &'static str,
    recommendations: Vec<EnrichedRecommendation>,
    explanation: Value,
}

async fn generate_on_demand(
    Path(user_id): Path<String>,
    Query(query): Query<GenerateQuery>,
    State(state): State<ApiState>,
) -> Result<Json<OnDemandResponse>, (StatusCode, Json<ApiError>)> {
    let user = UserId(user_id);
    let desired_count = query.count.unwrap_or(state.default_count).max(1);

    let result = state.enrichment.generate(&user, desired_count).await.map_err(error_response)?;

    Ok(Json(OnDemandResponse {
        message: "Recommendations generated successfully",
        recommendations: result.recommendations,
        explanation: result.explanation,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct EventDetails {
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    search_query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogEventRequest {
    user_id: String,
    event_type: String,
    #[serde(default)]
    details: EventDetails,
}

#[derive(Debug, Serialize)]
struct LogEventResponse {
    message: &'static str,
}

async fn log_event(
    State(state): State<ApiState>,
    Json(request): Json<LogEventRequest>,
) -> Result<Json<LogEventResponse>, (StatusCode, Json<ApiError>)> {
    if request.user_id.trim().is_empty() {
        return Err(bad_request("user_id is required"));
    }
    let Some(kind) = EventKind::parse(&request.event_type) else {
        return Err(bad_request(format!("unknown event_type `{}`", request.event_type)));
    };

    let event = BehavioralEvent {
        id: format!("EV-{}", Uuid::new_v4().simple()),
        user: UserId(request.user_id),
        kind,
        product_id: request.details.product_id.map(ProductId),
        category: request.details.category,
        search_query: request.details.search_query,
        created_at: Utc::now(),
    };

    // Telemetry must never block the caller: failures are logged server-side
    // and the request is acknowledged anyway.
    match state.events.log_event(&event).await {
        Ok(()) => Ok(Json(LogEventResponse { message: "event logged" })),
        Err(error) => {
            warn!(
                event_name = "events.log_failed",
                user_id = %event.user,
                error = %error,
                "failed to persist behavioral event"
            );
            Ok(Json(LogEventResponse { message: "event logging acknowledged" }))
        }
    }
}
