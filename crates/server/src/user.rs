use axum::{extract::FromRequestParts, http::request::Parts};
use services::services::context::UserContext;

use crate::error::ApiError;

/// Header carrying the authenticated user's id, set by the identity proxy
pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller's [`UserContext`], taken from [`USER_ID_HEADER`]
pub struct CurrentUser(pub UserContext);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CurrentUser(UserContext::new(id)))
            .ok_or(ApiError::Unauthorized)
    }
}
