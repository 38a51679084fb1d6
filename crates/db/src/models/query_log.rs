use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Where a logged query came from
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "query_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuerySource {
    Suggestions,
    DirectSearch,
}

/// A query the user made, kept to give the model some history about them
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct QueryLogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub query: String,
    pub source: QuerySource,
    pub created_at: DateTime<Utc>,
}

impl QueryLogEntry {
    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        query: &str,
        source: QuerySource,
    ) -> Result<Self, sqlx::Error> {
        let entry = Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            query: query.to_string(),
            source,
            created_at: Utc::now(),
        };
        sqlx::query(
            r#"INSERT INTO query_log (id, user_id, query, source, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(&entry.query)
        .bind(entry.source)
        .bind(entry.created_at)
        .execute(pool)
        .await?;
        Ok(entry)
    }

    /// Most recent entries first
    pub async fn find_recent(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, QueryLogEntry>(
            r#"SELECT id, user_id, query, source, created_at
               FROM query_log
               WHERE user_id = $1
               ORDER BY created_at DESC, rowid DESC
               LIMIT $2"#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Delete all but the `keep` newest entries for a user
    pub async fn prune(pool: &SqlitePool, user_id: &str, keep: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"DELETE FROM query_log
               WHERE user_id = $1
                 AND id NOT IN (
                     SELECT id FROM query_log
                     WHERE user_id = $1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT $2
                 )"#,
        )
        .bind(user_id)
        .bind(keep)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
