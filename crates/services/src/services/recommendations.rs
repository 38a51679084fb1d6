//! The recommendation session state machine.
//!
//! A user has at most one session. It is either a batch of piece suggestions,
//! each with its own product search, or a single direct search. Every visible
//! change is persisted as a full snapshot before the call returns.
//!
//! Model calls run outside the per-user lock. Their results are applied by
//! reloading the session under the lock and checking that it is still the
//! session that started the call; anything else is discarded.

use std::{fmt, str::FromStr, sync::Arc};

use dashmap::DashMap;
use db::models::{
    query_log::QuerySource,
    recommendation_session::{
        DIRECT_SEARCH_KEY, PieceSuggestion, ProductResult, ProductSearchResults,
        RecommendationSession, SearchStatus, SessionMode, SuggestionStatus,
    },
    wardrobe::WardrobeItem,
};
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    context::UserContext,
    preferences::{PreferenceError, PreferenceStore},
    product_search::{ProductSearchEngine, SearchError},
    product_verifier::ProductVerifier,
    query_log::QueryRecorder,
    reasoning::ReasoningModel,
    suggestion_generator::{GenerationError, SuggestionGenerator},
};

/// Recent queries passed to the suggestion prompt
const RECENT_QUERY_COUNT: i64 = 10;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Preferences(#[from] PreferenceError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("a recommendation session already exists; reset it first")]
    SessionExists,
    #[error("no recommendation session")]
    NoSession,
    #[error("session is in {actual} mode, expected {expected}")]
    WrongMode {
        expected: SessionMode,
        actual: SessionMode,
    },
    #[error("suggestion not found: {0}")]
    SuggestionNotFound(String),
    #[error("search query must not be empty")]
    EmptyQuery,
    #[error("refined description must not be empty")]
    EmptyDescription,
    #[error("operation cancelled")]
    Cancelled,
}

/// An abortable in-flight call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    Generate,
    Search(String),
    Direct,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::Search(id) => write!(f, "search:{id}"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown operation: {0}")]
pub struct ParseOperationError(String);

impl FromStr for Operation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "generate" => Ok(Self::Generate),
            "direct" => Ok(Self::Direct),
            other => other
                .strip_prefix("search:")
                .filter(|id| !id.is_empty())
                .map(|id| Self::Search(id.to_string()))
                .ok_or_else(|| ParseOperationError(s.to_string())),
        }
    }
}

struct InFlight {
    id: Uuid,
    token: CancellationToken,
}

type OperationKey = (String, Operation);

/// Session snapshot right after a search started, plus the task completing it
pub struct SearchStarted {
    pub session: RecommendationSession,
    pub completion: JoinHandle<()>,
}

#[derive(Clone)]
pub struct RecommendationService {
    pool: SqlitePool,
    model: Arc<dyn ReasoningModel>,
    preferences: PreferenceStore,
    queries: QueryRecorder,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    in_flight: Arc<DashMap<OperationKey, InFlight>>,
}

impl RecommendationService {
    pub fn new(pool: SqlitePool, model: Arc<dyn ReasoningModel>) -> Self {
        Self {
            preferences: PreferenceStore::new(pool.clone()),
            queries: QueryRecorder::new(pool.clone()),
            pool,
            model,
            locks: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub async fn session(
        &self,
        ctx: &UserContext,
    ) -> Result<Option<RecommendationSession>, RecommendationError> {
        Ok(RecommendationSession::find_by_user(&self.pool, &ctx.user_id).await?)
    }

    /// Generate a suggestion batch and start a session with it.
    /// On failure or cancellation no session is created.
    pub async fn generate_suggestions(
        &self,
        ctx: &UserContext,
    ) -> Result<RecommendationSession, RecommendationError> {
        if self.session(ctx).await?.is_some() {
            return Err(RecommendationError::SessionExists);
        }

        let (op_id, token) = self.register(ctx, Operation::Generate);
        let result = tokio::select! {
            _ = token.cancelled() => Err(RecommendationError::Cancelled),
            result = self.run_generation(ctx) => result,
        };
        self.finish(ctx, Operation::Generate, op_id);

        let suggestions = match result {
            Ok(suggestions) => suggestions,
            Err(RecommendationError::Cancelled) => {
                info!(user_id = %ctx.user_id, "Suggestion generation cancelled");
                return Err(RecommendationError::Cancelled);
            }
            Err(e) => {
                warn!(user_id = %ctx.user_id, error = %e, "Suggestion generation failed");
                return Err(e);
            }
        };

        let lock = self.user_lock(&ctx.user_id);
        let _guard = lock.lock().await;
        let session = RecommendationSession::with_suggestions(suggestions);
        session.save(&self.pool, &ctx.user_id).await?;
        info!(
            user_id = %ctx.user_id,
            session_id = %session.id,
            count = session.suggestions().len(),
            "Created suggestion session"
        );
        Ok(session)
    }

    async fn run_generation(
        &self,
        ctx: &UserContext,
    ) -> Result<Vec<PieceSuggestion>, RecommendationError> {
        let wardrobe = WardrobeItem::find_by_user(&self.pool, &ctx.user_id).await?;
        let preferences = self.preferences.load(ctx, &wardrobe).await?.preferences;
        let recent = self.queries.recent(ctx, RECENT_QUERY_COUNT).await?;

        Ok(SuggestionGenerator::new(self.model.as_ref())
            .generate(&wardrobe, &preferences, &recent)
            .await?)
    }

    pub async fn set_status(
        &self,
        ctx: &UserContext,
        suggestion_id: &str,
        status: SuggestionStatus,
    ) -> Result<RecommendationSession, RecommendationError> {
        self.update_suggestion(ctx, suggestion_id, |s| s.set_status(status))
            .await
    }

    pub async fn refine(
        &self,
        ctx: &UserContext,
        suggestion_id: &str,
        description: &str,
    ) -> Result<RecommendationSession, RecommendationError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(RecommendationError::EmptyDescription);
        }
        self.update_suggestion(ctx, suggestion_id, |s| s.refine(description))
            .await
    }

    async fn update_suggestion(
        &self,
        ctx: &UserContext,
        suggestion_id: &str,
        change: impl FnOnce(&mut PieceSuggestion),
    ) -> Result<RecommendationSession, RecommendationError> {
        let lock = self.user_lock(&ctx.user_id);
        let _guard = lock.lock().await;

        let mut session = self.require_mode(ctx, SessionMode::Suggestions).await?;
        let suggestion = session
            .suggestion_mut(suggestion_id)
            .ok_or_else(|| RecommendationError::SuggestionNotFound(suggestion_id.to_string()))?;
        change(suggestion);
        session.save(&self.pool, &ctx.user_id).await?;
        Ok(session)
    }

    /// Mark the suggestion's search as loading and complete it in the background
    pub async fn search_for_products(
        &self,
        ctx: &UserContext,
        suggestion_id: &str,
    ) -> Result<SearchStarted, RecommendationError> {
        let lock = self.user_lock(&ctx.user_id);
        let guard = lock.lock().await;

        let mut session = self.require_mode(ctx, SessionMode::Suggestions).await?;
        let query = session
            .suggestion(suggestion_id)
            .ok_or_else(|| RecommendationError::SuggestionNotFound(suggestion_id.to_string()))?
            .effective_description()
            .to_string();
        let previous = session
            .replace_search_result(ProductSearchResults::loading(suggestion_id))
            .flatten();
        session.save(&self.pool, &ctx.user_id).await?;

        let operation = Operation::Search(suggestion_id.to_string());
        let (op_id, token) = self.register(ctx, operation.clone());
        drop(guard);

        self.queries.record(ctx, &query, QuerySource::Suggestions);
        info!(
            user_id = %ctx.user_id,
            suggestion_id = %suggestion_id,
            "Started product search"
        );

        let this = self.clone();
        let ctx = ctx.clone();
        let session_id = session.id;
        let suggestion_id = suggestion_id.to_string();
        let completion = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => None,
                result = this.find_products(&ctx, &query) => Some(result),
            };
            this.finish(&ctx, operation, op_id);

            let applied = match outcome {
                None => {
                    info!(suggestion_id = %suggestion_id, "Product search cancelled");
                    this.with_session(&ctx, session_id, |s| {
                        s.restore_search_result(&suggestion_id, previous);
                        true
                    })
                    .await
                }
                Some(result) => {
                    let entry = search_entry(&suggestion_id, result);
                    this.with_session(&ctx, session_id, |s| {
                        s.suggestion(&suggestion_id).is_some()
                            && s.replace_search_result(entry).is_some()
                    })
                    .await
                }
            };
            match applied {
                Ok(true) => {}
                Ok(false) => debug!(suggestion_id = %suggestion_id, "Discarded stale search completion"),
                Err(e) => error!(suggestion_id = %suggestion_id, error = %e, "Failed to save search result"),
            }
        });

        Ok(SearchStarted {
            session,
            completion,
        })
    }

    /// Start a direct-search session for `query`, replacing any earlier one
    pub async fn search_direct(
        &self,
        ctx: &UserContext,
        query: &str,
    ) -> Result<SearchStarted, RecommendationError> {
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(RecommendationError::EmptyQuery);
        }

        let lock = self.user_lock(&ctx.user_id);
        let guard = lock.lock().await;

        let previous = self.session(ctx).await?;
        if let Some(current) = &previous {
            if current.mode() != SessionMode::DirectSearch {
                return Err(RecommendationError::WrongMode {
                    expected: SessionMode::DirectSearch,
                    actual: current.mode(),
                });
            }
        }
        // A search still loading is about to be superseded and will never
        // complete, so cancelling this one falls back to no session
        let previous = previous.filter(|s| {
            s.direct_search_results()
                .is_none_or(|r| r.status() != SearchStatus::Loading)
        });
        let session = RecommendationSession::direct_search(&query);
        session.save(&self.pool, &ctx.user_id).await?;

        let (op_id, token) = self.register(ctx, Operation::Direct);
        drop(guard);

        self.queries.record(ctx, &query, QuerySource::DirectSearch);
        info!(user_id = %ctx.user_id, query = %query, "Started direct search");

        let this = self.clone();
        let ctx = ctx.clone();
        let session_id = session.id;
        let completion = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => None,
                result = this.find_products(&ctx, &query) => Some(result),
            };
            this.finish(&ctx, Operation::Direct, op_id);

            let applied = match outcome {
                None => {
                    info!(user_id = %ctx.user_id, "Direct search cancelled");
                    this.restore_snapshot(&ctx, session_id, previous).await
                }
                Some(result) => {
                    let entry = search_entry(DIRECT_SEARCH_KEY, result);
                    this.with_session(&ctx, session_id, |s| s.set_direct_results(entry))
                        .await
                }
            };
            match applied {
                Ok(true) => {}
                Ok(false) => debug!(user_id = %ctx.user_id, "Discarded stale direct search completion"),
                Err(e) => error!(user_id = %ctx.user_id, error = %e, "Failed to save direct search result"),
            }
        });

        Ok(SearchStarted {
            session,
            completion,
        })
    }

    /// Abort in-flight calls and delete the session
    pub async fn reset(&self, ctx: &UserContext) -> Result<(), RecommendationError> {
        let lock = self.user_lock(&ctx.user_id);
        let _guard = lock.lock().await;

        self.in_flight.retain(|(user_id, _), in_flight| {
            if *user_id == ctx.user_id {
                in_flight.token.cancel();
                false
            } else {
                true
            }
        });
        let deleted = RecommendationSession::delete_by_user(&self.pool, &ctx.user_id).await?;
        info!(user_id = %ctx.user_id, deleted, "Reset recommendation session");
        Ok(())
    }

    /// Signal an in-flight call to stop. Returns false if nothing was running.
    pub fn cancel(&self, ctx: &UserContext, operation: Operation) -> bool {
        match self.in_flight.get(&(ctx.user_id.clone(), operation.clone())) {
            Some(in_flight) => {
                in_flight.token.cancel();
                debug!(user_id = %ctx.user_id, operation = %operation, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    async fn find_products(
        &self,
        ctx: &UserContext,
        query: &str,
    ) -> Result<Vec<ProductResult>, RecommendationError> {
        let preferences = self.preferences.current(ctx).await?;
        let products = ProductSearchEngine::new(self.model.as_ref())
            .search(query, &preferences)
            .await?;
        Ok(ProductVerifier::new(self.model.as_ref())
            .verify(products)
            .await)
    }

    async fn require_mode(
        &self,
        ctx: &UserContext,
        expected: SessionMode,
    ) -> Result<RecommendationSession, RecommendationError> {
        let session = self.session(ctx).await?.ok_or(RecommendationError::NoSession)?;
        if session.mode() != expected {
            return Err(RecommendationError::WrongMode {
                expected,
                actual: session.mode(),
            });
        }
        Ok(session)
    }

    /// Apply `change` to the stored session if it is still `session_id`.
    /// Returns whether anything was saved.
    async fn with_session(
        &self,
        ctx: &UserContext,
        session_id: Uuid,
        change: impl FnOnce(&mut RecommendationSession) -> bool,
    ) -> Result<bool, sqlx::Error> {
        let lock = self.user_lock(&ctx.user_id);
        let _guard = lock.lock().await;

        let Some(mut session) = RecommendationSession::find_by_user(&self.pool, &ctx.user_id).await?
        else {
            return Ok(false);
        };
        if session.id != session_id || !change(&mut session) {
            return Ok(false);
        }
        session.save(&self.pool, &ctx.user_id).await?;
        Ok(true)
    }

    /// Put back the session that existed before a cancelled direct search
    async fn restore_snapshot(
        &self,
        ctx: &UserContext,
        session_id: Uuid,
        previous: Option<RecommendationSession>,
    ) -> Result<bool, sqlx::Error> {
        let lock = self.user_lock(&ctx.user_id);
        let _guard = lock.lock().await;

        let current = RecommendationSession::find_by_user(&self.pool, &ctx.user_id).await?;
        if current.map(|s| s.id) != Some(session_id) {
            return Ok(false);
        }
        match previous {
            Some(previous) => previous.save(&self.pool, &ctx.user_id).await?,
            None => {
                RecommendationSession::delete_by_user(&self.pool, &ctx.user_id).await?;
            }
        }
        Ok(true)
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(user_id.to_string()).or_default().clone()
    }

    fn register(&self, ctx: &UserContext, operation: Operation) -> (Uuid, CancellationToken) {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let replaced = self.in_flight.insert(
            (ctx.user_id.clone(), operation.clone()),
            InFlight {
                id,
                token: token.clone(),
            },
        );
        // A repeated generate or direct search supersedes the earlier call;
        // repeated searches for one suggestion both run to completion
        if let Some(replaced) = replaced {
            if !matches!(operation, Operation::Search(_)) {
                replaced.token.cancel();
            }
        }
        (id, token)
    }

    fn finish(&self, ctx: &UserContext, operation: Operation, id: Uuid) {
        self.in_flight
            .remove_if(&(ctx.user_id.clone(), operation), |_, in_flight| in_flight.id == id);
    }
}

fn search_entry(
    suggestion_id: &str,
    result: Result<Vec<ProductResult>, RecommendationError>,
) -> ProductSearchResults {
    match result {
        Ok(products) => ProductSearchResults::complete(suggestion_id, products),
        Err(e) => {
            warn!(suggestion_id = %suggestion_id, error = %e, "Product search failed");
            ProductSearchResults::failed(suggestion_id, e.to_string())
        }
    }
}
