use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    recommendation_preferences::{PreferenceSet, StorePreference},
    wardrobe::{ClothingType, WardrobeItem},
};
use serde::Deserialize;
use services::services::preferences::LoadedPreferences;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, user::CurrentUser};

#[derive(Debug, Deserialize, TS)]
pub struct AddStoreRequest {
    pub name: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateStoreRequest {
    pub preference: StorePreference,
}

#[derive(Debug, Deserialize, TS)]
pub struct PriceLimitRequest {
    pub max_price: f64,
}

/// GET /api/preferences
/// Load preferences, seeding or merging retailers from the order history
pub async fn get_preferences(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<ResponseJson<ApiResponse<LoadedPreferences>>, ApiError> {
    let wardrobe = WardrobeItem::find_by_user(&state.db.pool, &ctx.user_id).await?;
    let loaded = state
        .recommendations
        .preferences()
        .load(&ctx, &wardrobe)
        .await?;
    Ok(ResponseJson(ApiResponse::success(loaded)))
}

/// POST /api/preferences/stores
pub async fn add_store(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    axum::Json(payload): axum::Json<AddStoreRequest>,
) -> Result<ResponseJson<ApiResponse<PreferenceSet>>, ApiError> {
    let prefs = state
        .recommendations
        .preferences()
        .add_store(&ctx, &payload.name)
        .await?;
    Ok(ResponseJson(ApiResponse::success(prefs)))
}

/// PUT /api/preferences/stores/{name}
pub async fn update_store(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(name): Path<String>,
    axum::Json(payload): axum::Json<UpdateStoreRequest>,
) -> Result<ResponseJson<ApiResponse<PreferenceSet>>, ApiError> {
    let prefs = state
        .recommendations
        .preferences()
        .update_store_preference(&ctx, &name, payload.preference)
        .await?;
    Ok(ResponseJson(ApiResponse::success(prefs)))
}

/// DELETE /api/preferences/stores/{name}
/// Stores detected from the order history can be re-tagged but not removed
pub async fn remove_store(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(name): Path<String>,
) -> Result<ResponseJson<ApiResponse<PreferenceSet>>, ApiError> {
    let store = state.recommendations.preferences();
    let current = store.current(&ctx).await?;
    if current.find_store(&name).is_some_and(|s| s.is_from_history) {
        return Err(ApiError::Conflict(format!(
            "{name} comes from your order history and cannot be removed"
        )));
    }

    let prefs = store.remove_store(&ctx, &name).await?;
    Ok(ResponseJson(ApiResponse::success(prefs)))
}

/// PUT /api/preferences/price-limits/{clothing_type}
pub async fn upsert_price_limit(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(clothing_type): Path<ClothingType>,
    axum::Json(payload): axum::Json<PriceLimitRequest>,
) -> Result<ResponseJson<ApiResponse<PreferenceSet>>, ApiError> {
    let prefs = state
        .recommendations
        .preferences()
        .upsert_price_limit(&ctx, clothing_type, payload.max_price)
        .await?;
    Ok(ResponseJson(ApiResponse::success(prefs)))
}

/// DELETE /api/preferences/price-limits/{clothing_type}
pub async fn remove_price_limit(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
    Path(clothing_type): Path<ClothingType>,
) -> Result<ResponseJson<ApiResponse<PreferenceSet>>, ApiError> {
    let prefs = state
        .recommendations
        .preferences()
        .remove_price_limit(&ctx, clothing_type)
        .await?;
    Ok(ResponseJson(ApiResponse::success(prefs)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/preferences",
        Router::new()
            .route("/", get(get_preferences))
            .route("/stores", post(add_store))
            .route("/stores/{name}", put(update_store).delete(remove_store))
            .route(
                "/price-limits/{clothing_type}",
                put(upsert_price_limit).delete(remove_price_limit),
            ),
    )
}
