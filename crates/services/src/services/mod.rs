pub mod claude_api;
pub mod config;
pub mod context;
pub mod preferences;
pub mod product_search;
pub mod product_verifier;
pub mod query_log;
pub mod reasoning;
pub mod recommendations;
pub mod suggestion_generator;
pub mod wardrobe_context;
