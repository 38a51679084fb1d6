use std::sync::Arc;

use db::DBService;
use services::services::{reasoning::ReasoningModel, recommendations::RecommendationService};

pub mod error;
pub mod routes;
pub mod user;

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub recommendations: RecommendationService,
}

impl AppState {
    pub fn new(db: DBService, model: Arc<dyn ReasoningModel>) -> Self {
        Self {
            recommendations: RecommendationService::new(db.pool.clone(), model),
            db,
        }
    }
}
