pub mod query_log;
pub mod recommendation_preferences;
pub mod recommendation_session;
pub mod wardrobe;
