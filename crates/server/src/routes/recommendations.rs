use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::recommendation_session::{RecommendationSession, SuggestionStatus};
use serde::{Deserialize, Serialize};
use services::services::recommendations::Operation;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, user::CurrentUser};

#[derive(Debug, Deserialize, TS)]
pub struct UpdateStatusRequest {
    pub status: SuggestionStatus,
}

#[derive(Debug, Deserialize, TS)]
pub struct RefineRequest {
    pub description: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct DirectSearchRequest {
    pub query: String,
}

/// `generate`, `direct` or `search:<suggestion id>`
#[derive(Debug, Deserialize, TS)]
pub struct CancelRequest {
    pub operation: String,
}

#[derive(Debug, Serialize, TS)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// GET /api/recommendations/session
pub async fn get_session(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<ResponseJson<ApiResponse<Option<RecommendationSession>>>, ApiError> {
    let session = state.recommendations.session(&ctx).await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

/// DELETE /api/recommendations/session
pub async fn reset_session(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.recommendations.reset(&ctx).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/recommendations/suggestions
/// Generate suggestions for the wardrobe; waits for the model
pub async fn generate_suggestions(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<ResponseJson<ApiResponse<RecommendationSession>>, ApiError> {
    let session = state.recommendations.generate_suggestions(&ctx).await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

/// PUT /api/recommendations/suggestions/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(suggestion_id): Path<String>,
    axum::Json(payload): axum::Json<UpdateStatusRequest>,
) -> Result<ResponseJson<ApiResponse<RecommendationSession>>, ApiError> {
    let session = state
        .recommendations
        .set_status(&ctx, &suggestion_id, payload.status)
        .await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

/// PUT /api/recommendations/suggestions/{id}/refine
pub async fn refine_suggestion(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(suggestion_id): Path<String>,
    axum::Json(payload): axum::Json<RefineRequest>,
) -> Result<ResponseJson<ApiResponse<RecommendationSession>>, ApiError> {
    let session = state
        .recommendations
        .refine(&ctx, &suggestion_id, &payload.description)
        .await?;
    Ok(ResponseJson(ApiResponse::success(session)))
}

/// POST /api/recommendations/suggestions/{id}/search
/// Returns the session with a loading entry; poll the session for the result
pub async fn search_for_products(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(suggestion_id): Path<String>,
) -> Result<ResponseJson<ApiResponse<RecommendationSession>>, ApiError> {
    let started = state
        .recommendations
        .search_for_products(&ctx, &suggestion_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(started.session)))
}

/// POST /api/recommendations/direct-search
pub async fn direct_search(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    axum::Json(payload): axum::Json<DirectSearchRequest>,
) -> Result<ResponseJson<ApiResponse<RecommendationSession>>, ApiError> {
    let started = state
        .recommendations
        .search_direct(&ctx, &payload.query)
        .await?;
    Ok(ResponseJson(ApiResponse::success(started.session)))
}

/// POST /api/recommendations/cancel
pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    axum::Json(payload): axum::Json<CancelRequest>,
) -> Result<ResponseJson<ApiResponse<CancelResponse>>, ApiError> {
    let operation = payload
        .operation
        .parse::<Operation>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let cancelled = state.recommendations.cancel(&ctx, operation);
    Ok(ResponseJson(ApiResponse::success(CancelResponse { cancelled })))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/recommendations",
        Router::new()
            .route("/session", get(get_session).delete(reset_session))
            .route("/suggestions", post(generate_suggestions))
            .route("/suggestions/{id}/status", put(update_status))
            .route("/suggestions/{id}/refine", put(refine_suggestion))
            .route("/suggestions/{id}/search", post(search_for_products))
            .route("/direct-search", post(direct_search))
            .route("/cancel", post(cancel)),
    )
}
