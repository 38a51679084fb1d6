use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::wardrobe::WardrobeItem;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError, user::CurrentUser};

/// GET /api/wardrobe
/// Read-only snapshot, used to resolve compatible piece ids
pub async fn get_wardrobe(
    State(state): State<AppState>,
    CurrentUser(ctx): CurrentUser,
) -> Result<ResponseJson<ApiResponse<Vec<WardrobeItem>>>, ApiError> {
    let items = WardrobeItem::find_by_user(&state.db.pool, &ctx.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(items)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/wardrobe", get(get_wardrobe))
}
