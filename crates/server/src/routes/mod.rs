use axum::{Router, response::Json as ResponseJson, routing::get};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::AppState;

pub mod preferences;
pub mod recommendations;
pub mod wardrobe;

#[derive(Debug, Serialize, TS)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

/// GET /api/health
pub async fn health() -> ResponseJson<ApiResponse<HealthStatus>> {
    ResponseJson(ApiResponse::success(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .merge(preferences::router())
        .merge(recommendations::router())
        .merge(wardrobe::router());

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use db::{
        DBService,
        models::wardrobe::{ClothingType, CreateWardrobeItem, WardrobeItem},
    };
    use serde_json::{Value, json};
    use services::services::reasoning::{ModelError, ReasoningModel, StructuredRequest};
    use tower::ServiceExt;

    use super::*;
    use crate::user::USER_ID_HEADER;

    /// Finds nothing for every search
    struct EmptyModel;

    #[async_trait]
    impl ReasoningModel for EmptyModel {
        async fn generate(&self, request: StructuredRequest) -> Result<Value, ModelError> {
            if request.tools.is_empty() {
                return Err(ModelError::Call("generation disabled".to_string()));
            }
            Ok(json!({ "products": [] }))
        }
    }

    async fn app() -> (Router, DBService) {
        let db = DBService::new_in_memory().await.unwrap();
        let state = AppState::new(db.clone(), Arc::new(EmptyModel));
        (router(state), db)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, "u1");
        let body = match body {
            Some(body) => {
                request = request.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health_and_missing_user() {
        let (app, _db) = app().await;

        let (status, body) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/recommendations/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_history_stores_cannot_be_removed() {
        let (app, db) = app().await;
        WardrobeItem::create(
            &db.pool,
            "u1",
            &CreateWardrobeItem {
                name: "Trench".to_string(),
                clothing_type: ClothingType::Coat,
                retailer: Some("Acme".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let (status, body) = send(&app, "GET", "/api/preferences", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["detected_retailers"], json!(["Acme"]));
        assert_eq!(body["data"]["preferences"]["stores"][0]["preference"], "preferred");

        let (status, body) = send(&app, "DELETE", "/api/preferences/stores/acme", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            &app,
            "POST",
            "/api/preferences/stores",
            Some(json!({ "name": "Nordic Knits" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) =
            send(&app, "DELETE", "/api/preferences/stores/Nordic%20Knits", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["stores"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_limit_routes() {
        let (app, _db) = app().await;

        let (status, body) = send(
            &app,
            "PUT",
            "/api/preferences/price-limits/jacket",
            Some(json!({ "max_price": 200.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["price_limits"][0]["clothing_type"], "jacket");

        let (status, _) = send(
            &app,
            "PUT",
            "/api/preferences/price-limits/jacket",
            Some(json!({ "max_price": -5.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send(&app, "DELETE", "/api/preferences/price-limits/jacket", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["price_limits"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_direct_search_flow() {
        let (app, _db) = app().await;

        let (status, body) = send(&app, "GET", "/api/recommendations/session", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_null());

        let (status, _) = send(
            &app,
            "POST",
            "/api/recommendations/direct-search",
            Some(json!({ "query": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/recommendations/direct-search",
            Some(json!({ "query": "black loafers" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"]["mode"], "direct-search");
        assert_eq!(body["data"]["state"]["results"]["state"]["status"], "loading");

        let (status, _) = send(
            &app,
            "PUT",
            "/api/recommendations/suggestions/s1/status",
            Some(json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, "DELETE", "/api/recommendations/session", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, "GET", "/api/recommendations/session", None).await;
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_generation_failure_creates_no_session() {
        let (app, _db) = app().await;

        let (status, body) = send(&app, "POST", "/api/recommendations/suggestions", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["message"].as_str().unwrap().contains("generation disabled"));

        let (_, body) = send(&app, "GET", "/api/recommendations/session", None).await;
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_cancel_validates_operation() {
        let (app, _db) = app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/recommendations/cancel",
            Some(json!({ "operation": "generate" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cancelled"], false);

        let (status, _) = send(
            &app,
            "POST",
            "/api/recommendations/cancel",
            Some(json!({ "operation": "explode" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
