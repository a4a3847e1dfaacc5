//! HTTP surface.
//!
//! Routes map one-to-one onto pipeline operations: generation-only, the
//! full generate/execute/analyze pipeline, the contextual variant, the
//! model listing, and the question audit log.

use crate::config::ServerConfig;
use crate::constants::{AVAILABLE_MODELS, DEFAULT_MODEL, DEFAULT_QUESTION_LOG_LIMIT};
use crate::database::{QuestionLog, QuestionRecord};
use crate::error::ServiceError;
use crate::middleware::token_count;
use crate::service::{AskResponse, ChatResponse, Nl2SqlService, SqlOnlyResponse};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared handler state.
pub struct AppState {
    pub service: Arc<Nl2SqlService>,
    pub question_log: Option<Arc<QuestionLog>>,
}

/// Stateless query request.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Contextual query request carrying a conversation id.
#[derive(Debug, Deserialize)]
pub struct ContextualQueryRequest {
    pub question: String,
    pub conversation_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Free-form chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionLogQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<&'static str>,
    pub default: &'static str,
}

/// Build the application router.
pub fn router(state: Arc<AppState>, server_config: &ServerConfig) -> Router {
    let cors = build_cors(server_config);

    Router::new()
        .route("/", get(health))
        .route("/models", get(models))
        .route("/generate-sql-only", post(generate_sql_only))
        .route("/generate-sql-execute-analyze", post(ask))
        .route("/context-nl-to-sql", post(ask_contextual))
        .route("/openrouter/chat", post(chat))
        .route("/questions", get(list_questions))
        .route("/questions/{id}", get(question_by_id))
        .fallback(not_found)
        .layer(middleware::from_fn(token_count))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "message": "NL2SQL service is running",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: AVAILABLE_MODELS.to_vec(),
        default: DEFAULT_MODEL,
    })
}

async fn generate_sql_only(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<SqlOnlyResponse>, ServiceError> {
    validate_question(&request.question)?;
    let response = state
        .service
        .generate_sql_only(&request.question, request.model.as_deref())
        .await?;
    Ok(Json(response))
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<AskResponse>, ServiceError> {
    validate_question(&request.question)?;
    let response = state
        .service
        .ask(
            &request.question,
            request.model.as_deref(),
            request.user_id.as_deref(),
        )
        .await?;
    Ok(Json(response))
}

async fn ask_contextual(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ContextualQueryRequest>,
) -> Result<Json<AskResponse>, ServiceError> {
    validate_question(&request.question)?;
    if request.conversation_id.trim().is_empty() {
        return Err(ServiceError::invalid_input("conversation_id is required"));
    }
    let response = state
        .service
        .ask_contextual(
            &request.question,
            &request.conversation_id,
            request.model.as_deref(),
            request.user_id.as_deref(),
        )
        .await?;
    Ok(Json(response))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ServiceError> {
    if request.prompt.trim().is_empty() {
        return Err(ServiceError::invalid_input("prompt must not be empty"));
    }
    let response = state
        .service
        .chat(&request.prompt, request.model.as_deref())
        .await?;
    Ok(Json(response))
}

async fn list_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestionLogQuery>,
) -> Result<Json<Vec<QuestionRecord>>, ServiceError> {
    let log = require_log(&state)?;
    let records = match query.user_id {
        Some(user_id) => log.by_user_id(&user_id).await?,
        None => {
            let limit = query
                .limit
                .unwrap_or(DEFAULT_QUESTION_LOG_LIMIT as u32);
            log.list(limit).await?
        }
    };
    Ok(Json(records))
}

async fn question_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<QuestionRecord>, ServiceError> {
    let log = require_log(&state)?;
    match log.by_id(id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ServiceError::invalid_input(format!(
            "no question log entry with id {}",
            id
        ))),
    }
}

fn require_log(state: &AppState) -> Result<&Arc<QuestionLog>, ServiceError> {
    state
        .question_log
        .as_ref()
        .ok_or_else(|| ServiceError::internal("question log is not configured"))
}

fn validate_question(question: &str) -> Result<(), ServiceError> {
    if question.trim().is_empty() {
        return Err(ServiceError::invalid_input("question must not be empty"));
    }
    Ok(())
}

/// 404 handler kept JSON-shaped like every other response.
pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "route not found"})),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_payload() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_models_payload() {
        let Json(body) = models().await;
        assert!(body.models.contains(&DEFAULT_MODEL));
        assert_eq!(body.default, DEFAULT_MODEL);
    }

    #[test]
    fn test_validate_question_rejects_blank() {
        assert!(validate_question("").is_err());
        assert!(validate_question("   ").is_err());
        assert!(validate_question("total budget?").is_ok());
    }

    #[test]
    fn test_query_request_deserializes_with_defaults() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"question": "how much?"}"#).unwrap();
        assert_eq!(request.question, "how much?");
        assert!(request.model.is_none());
        assert!(request.user_id.is_none());
    }
}
