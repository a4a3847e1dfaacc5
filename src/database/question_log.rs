//! Question audit log.
//!
//! Every pipeline run is recorded in the `question_log` table: question,
//! generated SQL, outcome, and token totals. Logging is best-effort; a
//! failed insert is logged and swallowed so it never fails the request.

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, MySqlPool};
use tracing::warn;

/// One persisted pipeline run.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QuestionRecord {
    pub id: i64,
    pub user_id: Option<String>,
    pub question: String,
    pub generated_sql: Option<String>,
    pub answer: Option<String>,
    pub status: String,
    pub model: String,
    pub total_tokens: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields written on insert; the id and timestamp come from the database.
#[derive(Debug, Clone)]
pub struct NewQuestionRecord {
    pub user_id: Option<String>,
    pub question: String,
    pub generated_sql: Option<String>,
    pub answer: Option<String>,
    pub status: String,
    pub model: String,
    pub total_tokens: i64,
}

/// Repository over the `question_log` table.
pub struct QuestionLog {
    pool: MySqlPool,
}

impl QuestionLog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Insert a record, swallowing failures. The audit log must never take
    /// down a request that otherwise succeeded.
    pub async fn insert(&self, record: NewQuestionRecord) {
        let result = sqlx::query(
            "INSERT INTO question_log \
             (user_id, question, generated_sql, answer, status, model, total_tokens) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.user_id)
        .bind(&record.question)
        .bind(&record.generated_sql)
        .bind(&record.answer)
        .bind(&record.status)
        .bind(&record.model)
        .bind(record.total_tokens)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(error = %e, "failed to write question log entry");
        }
    }

    /// Most recent entries, newest first.
    pub async fn list(&self, limit: u32) -> Result<Vec<QuestionRecord>, ServiceError> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, user_id, question, generated_sql, answer, status, model, \
             total_tokens, created_at \
             FROM question_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ServiceError::question_log(e.to_string()))?;
        Ok(records)
    }

    pub async fn by_id(&self, id: i64) -> Result<Option<QuestionRecord>, ServiceError> {
        let record = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, user_id, question, generated_sql, answer, status, model, \
             total_tokens, created_at \
             FROM question_log WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ServiceError::question_log(e.to_string()))?;
        Ok(record)
    }

    /// All entries for one user, newest first.
    pub async fn by_user_id(&self, user_id: &str) -> Result<Vec<QuestionRecord>, ServiceError> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, user_id, question, generated_sql, answer, status, model, \
             total_tokens, created_at \
             FROM question_log WHERE user_id = ? ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ServiceError::question_log(e.to_string()))?;
        Ok(records)
    }
}
