use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    preferences::PreferenceError, recommendations::RecommendationError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Recommendation(#[from] RecommendationError),
    #[error(transparent)]
    Preferences(#[from] PreferenceError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("missing or empty x-user-id header")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Recommendation(e) => match e {
                RecommendationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                RecommendationError::Preferences(e) => preference_status(e),
                RecommendationError::Generation(_) | RecommendationError::Search(_) => {
                    StatusCode::BAD_GATEWAY
                }
                RecommendationError::SessionExists
                | RecommendationError::WrongMode { .. }
                | RecommendationError::Cancelled => StatusCode::CONFLICT,
                RecommendationError::NoSession | RecommendationError::SuggestionNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                RecommendationError::EmptyQuery | RecommendationError::EmptyDescription => {
                    StatusCode::BAD_REQUEST
                }
            },
            ApiError::Preferences(e) => preference_status(e),
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

fn preference_status(error: &PreferenceError) -> StatusCode {
    match error {
        PreferenceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PreferenceError::EmptyStoreName | PreferenceError::InvalidPrice(_) => {
            StatusCode::BAD_REQUEST
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}
