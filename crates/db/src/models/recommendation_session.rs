use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Key under which a direct (free-text) search stores its results
pub const DIRECT_SEARCH_KEY: &str = "direct-search";

/// Review state of a piece suggestion. Any state may follow any other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Refined,
}

/// An AI-proposed new piece for the wardrobe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct PieceSuggestion {
    pub id: String,
    pub description: String,
    pub rationale: String,
    pub refined_description: Option<String>,
    /// Wardrobe item ids present in the snapshot the suggestion was generated from
    pub compatible_piece_ids: Vec<i64>,
    pub status: SuggestionStatus,
}

impl PieceSuggestion {
    /// Text used when searching: the user's refinement if any, else the original
    pub fn effective_description(&self) -> &str {
        self.refined_description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&self.description)
    }

    pub fn set_status(&mut self, status: SuggestionStatus) {
        if status == SuggestionStatus::Refined && self.refined_description.is_none() {
            self.refined_description = Some(self.description.clone());
        }
        self.status = status;
    }

    pub fn refine(&mut self, description: impl Into<String>) {
        self.refined_description = Some(description.into());
        self.status = SuggestionStatus::Refined;
    }
}

/// A purchasable product found for a suggestion or direct query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct ProductResult {
    pub id: String,
    pub name: String,
    pub retailer: String,
    pub url: String,
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub image_url: Option<String>,
    pub available_sizes: Option<Vec<String>>,
    pub is_preferred_store: bool,
}

pub fn default_currency() -> String {
    "USD".to_string()
}

/// Flat status of a product search, for callers that only need the tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SearchStatus {
    Loading,
    Complete,
    Error,
}

/// Progress of one product search; products only exist once complete
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SearchState {
    Loading,
    Complete { products: Vec<ProductResult> },
    Error { error: String },
}

/// Results of the latest search for one suggestion (or the direct search)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct ProductSearchResults {
    pub suggestion_id: String,
    pub state: SearchState,
    pub searched_at: DateTime<Utc>,
}

impl ProductSearchResults {
    pub fn loading(suggestion_id: impl Into<String>) -> Self {
        Self::with_state(suggestion_id, SearchState::Loading)
    }

    pub fn complete(suggestion_id: impl Into<String>, products: Vec<ProductResult>) -> Self {
        Self::with_state(suggestion_id, SearchState::Complete { products })
    }

    pub fn failed(suggestion_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::with_state(
            suggestion_id,
            SearchState::Error {
                error: error.into(),
            },
        )
    }

    fn with_state(suggestion_id: impl Into<String>, state: SearchState) -> Self {
        Self {
            suggestion_id: suggestion_id.into(),
            state,
            searched_at: Utc::now(),
        }
    }

    pub fn status(&self) -> SearchStatus {
        match self.state {
            SearchState::Loading => SearchStatus::Loading,
            SearchState::Complete { .. } => SearchStatus::Complete,
            SearchState::Error { .. } => SearchStatus::Error,
        }
    }

    pub fn products(&self) -> &[ProductResult] {
        match &self.state {
            SearchState::Complete { products } => products,
            SearchState::Loading | SearchState::Error { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            SearchState::Error { error } => Some(error),
            SearchState::Loading | SearchState::Complete { .. } => None,
        }
    }
}

/// Which flow a session is running
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SessionMode {
    Suggestions,
    DirectSearch,
}

/// Mode-specific content. Suggestions and a direct search never coexist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SessionState {
    Suggestions {
        suggestions: Vec<PieceSuggestion>,
        search_results: Vec<ProductSearchResults>,
    },
    DirectSearch {
        query: String,
        results: ProductSearchResults,
    },
}

/// The in-progress recommendation flow of one user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct RecommendationSession {
    /// Changes whenever the session is replaced, so late completions can
    /// tell they belong to a session that no longer exists
    pub id: Uuid,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl RecommendationSession {
    pub fn with_suggestions(suggestions: Vec<PieceSuggestion>) -> Self {
        Self::new(SessionState::Suggestions {
            suggestions,
            search_results: Vec::new(),
        })
    }

    /// A direct-search session whose results are still loading
    pub fn direct_search(query: impl Into<String>) -> Self {
        Self::new(SessionState::DirectSearch {
            query: query.into(),
            results: ProductSearchResults::loading(DIRECT_SEARCH_KEY),
        })
    }

    fn new(state: SessionState) -> Self {
        Self {
            id: Uuid::new_v4(),
            state,
            created_at: Utc::now(),
        }
    }

    pub fn mode(&self) -> SessionMode {
        match self.state {
            SessionState::Suggestions { .. } => SessionMode::Suggestions,
            SessionState::DirectSearch { .. } => SessionMode::DirectSearch,
        }
    }

    pub fn suggestions(&self) -> &[PieceSuggestion] {
        match &self.state {
            SessionState::Suggestions { suggestions, .. } => suggestions,
            SessionState::DirectSearch { .. } => &[],
        }
    }

    pub fn search_results(&self) -> &[ProductSearchResults] {
        match &self.state {
            SessionState::Suggestions { search_results, .. } => search_results,
            SessionState::DirectSearch { .. } => &[],
        }
    }

    pub fn direct_search_query(&self) -> Option<&str> {
        match &self.state {
            SessionState::DirectSearch { query, .. } => Some(query),
            SessionState::Suggestions { .. } => None,
        }
    }

    pub fn direct_search_results(&self) -> Option<&ProductSearchResults> {
        match &self.state {
            SessionState::DirectSearch { results, .. } => Some(results),
            SessionState::Suggestions { .. } => None,
        }
    }

    pub fn suggestion(&self, id: &str) -> Option<&PieceSuggestion> {
        self.suggestions().iter().find(|s| s.id == id)
    }

    pub fn suggestion_mut(&mut self, id: &str) -> Option<&mut PieceSuggestion> {
        match &mut self.state {
            SessionState::Suggestions { suggestions, .. } => {
                suggestions.iter_mut().find(|s| s.id == id)
            }
            SessionState::DirectSearch { .. } => None,
        }
    }

    pub fn search_result_for(&self, suggestion_id: &str) -> Option<&ProductSearchResults> {
        self.search_results()
            .iter()
            .find(|r| r.suggestion_id == suggestion_id)
    }

    /// Drop any entry with the same suggestion id and append `results`.
    /// Returns the replaced entry, or `None` in direct-search mode where
    /// nothing is stored.
    pub fn replace_search_result(
        &mut self,
        results: ProductSearchResults,
    ) -> Option<Option<ProductSearchResults>> {
        match &mut self.state {
            SessionState::Suggestions { search_results, .. } => {
                let previous = search_results
                    .iter()
                    .position(|r| r.suggestion_id == results.suggestion_id)
                    .map(|i| search_results.remove(i));
                search_results.push(results);
                Some(previous)
            }
            SessionState::DirectSearch { .. } => None,
        }
    }

    /// Put back the entry that existed before a search started (or clear it)
    pub fn restore_search_result(
        &mut self,
        suggestion_id: &str,
        previous: Option<ProductSearchResults>,
    ) {
        if let SessionState::Suggestions { search_results, .. } = &mut self.state {
            search_results.retain(|r| r.suggestion_id != suggestion_id);
            if let Some(previous) = previous {
                search_results.push(previous);
            }
        }
    }

    /// Returns false when the session is not a direct search
    pub fn set_direct_results(&mut self, new_results: ProductSearchResults) -> bool {
        match &mut self.state {
            SessionState::DirectSearch { results, .. } => {
                *results = new_results;
                true
            }
            SessionState::Suggestions { .. } => false,
        }
    }
}

impl RecommendationSession {
    pub async fn find_by_user(pool: &SqlitePool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        let json = sqlx::query_scalar::<_, String>(
            "SELECT session FROM recommendation_sessions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        json.map(|json| serde_json::from_str(&json).map_err(|e| sqlx::Error::Decode(Box::new(e))))
            .transpose()
    }

    /// Persist the full session snapshot, replacing the stored one
    pub async fn save(&self, pool: &SqlitePool, user_id: &str) -> Result<(), sqlx::Error> {
        let json = serde_json::to_string(self).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        sqlx::query(
            r#"INSERT INTO recommendation_sessions (user_id, session)
               VALUES ($1, $2)
               ON CONFLICT(user_id) DO UPDATE SET
                   session = excluded.session,
                   updated_at = datetime('now', 'subsec')"#,
        )
        .bind(user_id)
        .bind(json)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete_by_user(pool: &SqlitePool, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM recommendation_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
