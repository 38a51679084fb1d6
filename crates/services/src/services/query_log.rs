//! Background recording of user queries.
//!
//! Recording never blocks or fails the request that produced the query: the
//! write runs on its own task and a failure is logged and dropped.

use db::models::query_log::{QueryLogEntry, QuerySource};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::context::UserContext;

/// Entries kept per user
pub const QUERY_LOG_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct QueryRecorder {
    pool: SqlitePool,
}

impl QueryRecorder {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Submit a query for recording and return immediately
    pub fn record(&self, ctx: &UserContext, query: &str, source: QuerySource) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let user_id = ctx.user_id.clone();
        let query = query.to_string();

        tokio::spawn(async move {
            if let Err(e) = Self::write(&pool, &user_id, &query, source).await {
                warn!(user_id = %user_id, source = %source, error = %e, "Failed to record query");
            }
        })
    }

    async fn write(
        pool: &SqlitePool,
        user_id: &str,
        query: &str,
        source: QuerySource,
    ) -> Result<(), sqlx::Error> {
        QueryLogEntry::create(pool, user_id, query, source).await?;
        let pruned = QueryLogEntry::prune(pool, user_id, QUERY_LOG_LIMIT).await?;
        if pruned > 0 {
            debug!(user_id = %user_id, pruned, "Pruned query log");
        }
        Ok(())
    }

    pub async fn recent(
        &self,
        ctx: &UserContext,
        limit: i64,
    ) -> Result<Vec<QueryLogEntry>, sqlx::Error> {
        QueryLogEntry::find_recent(&self.pool, &ctx.user_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    #[tokio::test]
    async fn test_record_runs_in_background_and_prunes() {
        let db = DBService::new_in_memory().await.unwrap();
        let recorder = QueryRecorder::new(db.pool.clone());
        let ctx = UserContext::new("u1");

        for i in 0..(QUERY_LOG_LIMIT + 3) {
            recorder
                .record(&ctx, &format!("query {i}"), QuerySource::DirectSearch)
                .await
                .unwrap();
        }

        let recent = recorder.recent(&ctx, 100).await.unwrap();
        assert_eq!(recent.len() as i64, QUERY_LOG_LIMIT);
        assert_eq!(recent[0].query, format!("query {}", QUERY_LOG_LIMIT + 2));
    }

    #[tokio::test]
    async fn test_record_failure_is_swallowed() {
        let db = DBService::new_in_memory().await.unwrap();
        let recorder = QueryRecorder::new(db.pool.clone());
        db.pool.close().await;

        // The task completes without panicking even though the write fails
        recorder
            .record(&UserContext::new("u1"), "loafers", QuerySource::DirectSearch)
            .await
            .unwrap();
    }
}
