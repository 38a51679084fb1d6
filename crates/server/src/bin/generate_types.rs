//! Writes TypeScript declarations for the API types consumed by the web UI.

use db::models::{
    query_log::QuerySource,
    recommendation_preferences::{PreferenceSet, PriceLimit, StoreInfo, StorePreference},
    recommendation_session::{
        PieceSuggestion, ProductResult, ProductSearchResults, RecommendationSession, SearchState,
        SearchStatus, SessionMode, SessionState, SuggestionStatus,
    },
    wardrobe::{ClothingType, OrderInfo, WardrobeItem},
};
use server::routes::{
    HealthStatus,
    preferences::{AddStoreRequest, PriceLimitRequest, UpdateStoreRequest},
    recommendations::{
        CancelRequest, CancelResponse, DirectSearchRequest, RefineRequest, UpdateStatusRequest,
    },
};
use services::services::preferences::LoadedPreferences;
use ts_rs::TS;
use utils::response::ApiResponse;

fn main() -> std::io::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "shared/types.ts".to_string());

    let decls = [
        ClothingType::decl(),
        OrderInfo::decl(),
        WardrobeItem::decl(),
        StorePreference::decl(),
        StoreInfo::decl(),
        PriceLimit::decl(),
        PreferenceSet::decl(),
        LoadedPreferences::decl(),
        SuggestionStatus::decl(),
        PieceSuggestion::decl(),
        ProductResult::decl(),
        SearchStatus::decl(),
        SearchState::decl(),
        ProductSearchResults::decl(),
        SessionMode::decl(),
        SessionState::decl(),
        RecommendationSession::decl(),
        QuerySource::decl(),
        ApiResponse::<()>::decl(),
        HealthStatus::decl(),
        AddStoreRequest::decl(),
        UpdateStoreRequest::decl(),
        PriceLimitRequest::decl(),
        UpdateStatusRequest::decl(),
        RefineRequest::decl(),
        DirectSearchRequest::decl(),
        CancelRequest::decl(),
        CancelResponse::decl(),
    ];

    let mut output = String::from("// Generated by `cargo run --bin generate_types`. Do not edit.\n\n");
    for decl in decls {
        output.push_str("export ");
        output.push_str(&decl);
        output.push_str("\n\n");
    }

    if let Some(parent) = std::path::Path::new(&path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, output)?;
    println!("Wrote {path}");
    Ok(())
}
