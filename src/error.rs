//! Error types for the NL2SQL server.
//!
//! These cover the orchestration layer: configuration, LLM invocation,
//! retrieval, and database execution. Safety-validator rejections are NOT
//! errors; they are [`Verdict`](crate::security::Verdict) values resolved
//! locally by the validator and never raised.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Domain-specific errors for the NL2SQL server.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM provider returned an error or unusable response
    #[error("LLM provider error: {message}")]
    LlmProvider {
        message: String,
        status: Option<u16>,
    },

    /// Schema retrieval error
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Query execution error
    #[error("Query execution error: {0}")]
    QueryExecution(String),

    /// Question log error
    #[error("Question log error: {0}")]
    QuestionLog(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an LLM provider error.
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::LlmProvider {
            message: msg.into(),
            status: None,
        }
    }

    /// Create an LLM provider error carrying the upstream HTTP status.
    pub fn llm_with_status(msg: impl Into<String>, status: u16) -> Self {
        Self::LlmProvider {
            message: msg.into(),
            status: Some(status),
        }
    }

    /// Create a retrieval error.
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }

    /// Create a query execution error.
    pub fn query_error(msg: impl Into<String>) -> Self {
        Self::QueryExecution(msg.into())
    }

    /// Create a question log error.
    pub fn question_log(msg: impl Into<String>) -> Self {
        Self::QuestionLog(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::LlmProvider { .. } => StatusCode::BAD_GATEWAY,
            Self::Config(_)
            | Self::Retrieval(_)
            | Self::QueryExecution(_)
            | Self::QuestionLog(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Configuration(_) => ServiceError::config(e.to_string()),
            sqlx::Error::RowNotFound => ServiceError::query_error("Row not found"),
            sqlx::Error::PoolTimedOut => {
                ServiceError::query_error("Connection pool timed out")
            }
            _ => ServiceError::query_error(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        ServiceError::LlmProvider {
            message: e.to_string(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::invalid_input("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::llm("upstream down").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::query_error("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_includes_message() {
        let err = ServiceError::config("NL2SQL_DATABASE_URL is required");
        assert!(err.to_string().contains("NL2SQL_DATABASE_URL"));
    }
}
