//! NL2SQL pipeline orchestration.
//!
//! [`Nl2SqlService`] wires the stages together: intent classification,
//! schema retrieval, SQL generation, output sanitizing, safety validation,
//! execution, and result analysis. Every stage failure maps to a pipeline
//! outcome rather than an error; the only errors surfaced to the HTTP layer
//! are ones that occur before the pipeline can produce a meaningful outcome.

use crate::config::RetrievalConfig;
use crate::database::question_log::NewQuestionRecord;
use crate::database::{QueryExecutor, QueryResult, QuestionLog};
use crate::history::ConversationStore;
use crate::llm::LlmClient;
use crate::prompts::{
    analysis_prompt, classification_prompt, sql_generation_prompt, CATEGORY_DATA_QUERY,
    EMPTY_RESULT_TEXT, NO_HISTORY,
};
use crate::retrieval::{SchemaCatalog, SchemaRetriever};
use crate::security::{sanitize, QueryValidator};
use crate::usage::UsageLedger;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::constants::MIN_GENERATED_SQL_LENGTH;

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineOutcome {
    #[serde(rename = "SUCCESS")]
    Success,
    /// The router classified the question as outside the database's domain.
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "SQL_GENERATION_FAILED")]
    SqlGenerationFailed,
    #[serde(rename = "UNSAFE_SQL_QUERY")]
    UnsafeSqlQuery,
    #[serde(rename = "SQL_EXECUTION_ERROR")]
    SqlExecutionError,
}

impl PipelineOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineOutcome::Success => "SUCCESS",
            PipelineOutcome::Rejected => "REJECTED",
            PipelineOutcome::SqlGenerationFailed => "SQL_GENERATION_FAILED",
            PipelineOutcome::UnsafeSqlQuery => "UNSAFE_SQL_QUERY",
            PipelineOutcome::SqlExecutionError => "SQL_EXECUTION_ERROR",
        }
    }
}

/// Full pipeline response for the ask endpoints.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub status: PipelineOutcome,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub token_usage: UsageLedger,
}

/// Response for the generation-only endpoint: the sanitized SQL plus the
/// validator's verdict, without execution.
#[derive(Debug, Serialize)]
pub struct SqlOnlyResponse {
    pub sql: String,
    pub safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    pub token_usage: UsageLedger,
}

/// Response for the free-form chat passthrough.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub token_usage: UsageLedger,
}

/// The NL2SQL pipeline.
pub struct Nl2SqlService {
    llm: Arc<dyn LlmClient>,
    executor: Arc<dyn QueryExecutor>,
    retriever: Arc<dyn SchemaRetriever>,
    validator: QueryValidator,
    catalog: SchemaCatalog,
    conversations: ConversationStore,
    question_log: Option<Arc<QuestionLog>>,
    default_model: String,
    top_k: usize,
}

impl Nl2SqlService {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        executor: Arc<dyn QueryExecutor>,
        retriever: Arc<dyn SchemaRetriever>,
        validator: QueryValidator,
        catalog: SchemaCatalog,
        retrieval: &RetrievalConfig,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            executor,
            retriever,
            validator,
            catalog,
            conversations: ConversationStore::new(),
            question_log: None,
            default_model: default_model.into(),
            top_k: retrieval.top_k,
        }
    }

    /// Attach the question audit log.
    pub fn with_question_log(mut self, log: Arc<QuestionLog>) -> Self {
        self.question_log = Some(log);
        self
    }

    fn resolve_model<'a>(&'a self, model: Option<&'a str>) -> &'a str {
        match model {
            Some(m) if !m.trim().is_empty() => m,
            _ => &self.default_model,
        }
    }

    /// Classify the question's intent. Returns the category word.
    async fn classify(
        &self,
        question: &str,
        model: &str,
        ledger: &mut UsageLedger,
    ) -> Result<String, crate::error::ServiceError> {
        let completion = self
            .llm
            .complete(&classification_prompt(question), model)
            .await?;
        ledger.record("router", completion.usage);
        Ok(completion.text.trim().to_lowercase())
    }

    /// Retrieve schema context and generate a raw SQL candidate.
    async fn generate_sql(
        &self,
        question: &str,
        history: &str,
        model: &str,
        ledger: &mut UsageLedger,
    ) -> Result<String, crate::error::ServiceError> {
        let snippets = self.retriever.retrieve(question, self.top_k).await?;
        let prompt = sql_generation_prompt(
            &self.catalog.table,
            &self.catalog.columns,
            &snippets,
            history,
            question,
        );
        let completion = self.llm.complete(&prompt, model).await?;
        ledger.record("sql", completion.usage);
        Ok(completion.text)
    }

    /// Generate, sanitize, and validate a SQL candidate without executing it.
    pub async fn generate_sql_only(
        &self,
        question: &str,
        model: Option<&str>,
    ) -> Result<SqlOnlyResponse, crate::error::ServiceError> {
        let model = self.resolve_model(model);
        let mut ledger = UsageLedger::new(model);

        let raw = self
            .generate_sql(question, NO_HISTORY, model, &mut ledger)
            .await?;
        let sql = sanitize(&raw);
        let verdict = self.validator.is_safe_select(&sql);

        Ok(SqlOnlyResponse {
            safe: verdict.is_admitted(),
            reject_reason: verdict.reason(),
            sql,
            token_usage: ledger,
        })
    }

    /// Free-form chat passthrough to the provider, with no domain
    /// classification and no SQL pipeline. Token usage is still accounted.
    pub async fn chat(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<ChatResponse, crate::error::ServiceError> {
        let model = self.resolve_model(model);
        let mut ledger = UsageLedger::new(model);
        let completion = self.llm.complete(prompt, model).await?;
        ledger.record("chat", completion.usage);
        Ok(ChatResponse {
            answer: completion.text.trim().to_string(),
            token_usage: ledger,
        })
    }

    /// Run the full pipeline for a stateless question.
    pub async fn ask(
        &self,
        question: &str,
        model: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<AskResponse, crate::error::ServiceError> {
        self.run_pipeline(question, NO_HISTORY, model, user_id).await
    }

    /// Run the full pipeline with conversation history, then record the
    /// completed turn.
    pub async fn ask_contextual(
        &self,
        question: &str,
        conversation_id: &str,
        model: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<AskResponse, crate::error::ServiceError> {
        let history = self.conversations.format_history(conversation_id);
        let response = self.run_pipeline(question, &history, model, user_id).await?;
        self.conversations
            .append(conversation_id, question, &response.answer);
        Ok(response)
    }

    async fn run_pipeline(
        &self,
        question: &str,
        history: &str,
        model: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<AskResponse, crate::error::ServiceError> {
        let model = self.resolve_model(model);
        let mut ledger = UsageLedger::new(model);

        let category = self.classify(question, model, &mut ledger).await?;
        info!(category = %category, "question classified");

        if category != CATEGORY_DATA_QUERY {
            let response = AskResponse {
                status: PipelineOutcome::Rejected,
                answer: "I can only answer questions about the budget and \
                         activity data in this system."
                    .to_string(),
                generated_sql: None,
                data: None,
                token_usage: ledger,
            };
            self.log_run(question, &response, model, user_id).await;
            return Ok(response);
        }

        let raw = match self.generate_sql(question, history, model, &mut ledger).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "SQL generation failed");
                let response = AskResponse {
                    status: PipelineOutcome::SqlGenerationFailed,
                    answer: "I could not build a query for that question. \
                             Try rephrasing it."
                        .to_string(),
                    generated_sql: None,
                    data: None,
                    token_usage: ledger,
                };
                self.log_run(question, &response, model, user_id).await;
                return Ok(response);
            }
        };

        let sql = sanitize(&raw);
        if sql.len() < MIN_GENERATED_SQL_LENGTH || sql.to_lowercase().contains("error") {
            let response = AskResponse {
                status: PipelineOutcome::SqlGenerationFailed,
                answer: "I could not build a query for that question. \
                         Try rephrasing it."
                    .to_string(),
                generated_sql: Some(sql),
                data: None,
                token_usage: ledger,
            };
            self.log_run(question, &response, model, user_id).await;
            return Ok(response);
        }

        let verdict = self.validator.is_safe_select(&sql);
        if !verdict.is_admitted() {
            let reason = verdict.reason().unwrap_or_default();
            let response = AskResponse {
                status: PipelineOutcome::UnsafeSqlQuery,
                answer: format!(
                    "The generated query was blocked by the safety validator: {}.",
                    reason
                ),
                generated_sql: Some(sql),
                data: None,
                token_usage: ledger,
            };
            self.log_run(question, &response, model, user_id).await;
            return Ok(response);
        }

        let result = match self.executor.execute(&sql).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "query execution failed");
                let response = AskResponse {
                    status: PipelineOutcome::SqlExecutionError,
                    answer: "The query failed to execute against the database."
                        .to_string(),
                    generated_sql: Some(sql),
                    data: None,
                    token_usage: ledger,
                };
                self.log_run(question, &response, model, user_id).await;
                return Ok(response);
            }
        };

        let answer = self
            .analyze(question, history, &result, model, &mut ledger)
            .await?;

        let response = AskResponse {
            status: PipelineOutcome::Success,
            answer,
            generated_sql: Some(sql),
            data: Some(result.to_records()),
            token_usage: ledger,
        };
        self.log_run(question, &response, model, user_id).await;
        Ok(response)
    }

    /// Turn the query result into a natural-language answer.
    async fn analyze(
        &self,
        question: &str,
        history: &str,
        result: &QueryResult,
        model: &str,
        ledger: &mut UsageLedger,
    ) -> Result<String, crate::error::ServiceError> {
        let rendered = if result.is_empty() {
            EMPTY_RESULT_TEXT.to_string()
        } else {
            result.to_table_string()
        };
        let completion = self
            .llm
            .complete(&analysis_prompt(question, history, &rendered), model)
            .await?;
        ledger.record("analysis", completion.usage);
        Ok(completion.text.trim().to_string())
    }

    async fn log_run(
        &self,
        question: &str,
        response: &AskResponse,
        model: &str,
        user_id: Option<&str>,
    ) {
        let Some(log) = &self.question_log else {
            return;
        };
        log.insert(NewQuestionRecord {
            user_id: user_id.map(|s| s.to_string()),
            question: question.to_string(),
            generated_sql: response.generated_sql.clone(),
            answer: Some(response.answer.clone()),
            status: response.status.as_str().to_string(),
            model: model.to_string(),
            total_tokens: response.token_usage.grand_total() as i64,
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqlValue;
    use crate::error::ServiceError;
    use crate::llm::Completion;
    use crate::retrieval::{KeywordRetriever, SchemaCatalog};
    use crate::usage::TokenUsage;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// LLM double that replays a fixed script of completions.
    struct ScriptedLlm {
        script: Mutex<Vec<Result<String, ServiceError>>>,
    }

    impl ScriptedLlm {
        fn new(script: Vec<Result<&str, ServiceError>>) -> Self {
            Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .rev()
                        .map(|r| r.map(|s| s.to_string()))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _prompt: &str, _model: &str) -> Result<Completion, ServiceError> {
            let next = self
                .script
                .lock()
                .pop()
                .unwrap_or(Err(ServiceError::llm("script exhausted")));
            next.map(|text| Completion {
                text,
                usage: TokenUsage::new(10, 5),
            })
        }
    }

    struct StubExecutor {
        result: Result<QueryResult, String>,
    }

    #[async_trait]
    impl QueryExecutor for StubExecutor {
        async fn execute(&self, _sql: &str) -> Result<QueryResult, ServiceError> {
            self.result
                .clone()
                .map_err(ServiceError::query_error)
        }
    }

    fn service(
        script: Vec<Result<&str, ServiceError>>,
        result: Result<QueryResult, String>,
    ) -> Nl2SqlService {
        let catalog = SchemaCatalog::embedded();
        Nl2SqlService::new(
            Arc::new(ScriptedLlm::new(script)),
            Arc::new(StubExecutor { result }),
            Arc::new(KeywordRetriever::new(catalog.clone())),
            QueryValidator::default(),
            catalog,
            &RetrievalConfig::default(),
            "test/model",
        )
    }

    fn one_row_result() -> QueryResult {
        QueryResult {
            columns: vec!["Nama_Unit".to_string(), "Jumlah".to_string()],
            rows: vec![vec![
                SqlValue::String("Rektorat".to_string()),
                SqlValue::I64(1000),
            ]],
        }
    }

    #[tokio::test]
    async fn test_happy_path_succeeds() {
        let svc = service(
            vec![
                Ok("data_query"),
                Ok("```sql\nSELECT Nama_Unit, Jumlah FROM drauk_unit LIMIT 1\n```"),
                Ok("Rektorat has the largest budget at 1000."),
            ],
            Ok(one_row_result()),
        );
        let response = svc
            .ask("which unit has the largest budget?", None, None)
            .await
            .unwrap();
        assert_eq!(response.status, PipelineOutcome::Success);
        assert_eq!(
            response.generated_sql.as_deref(),
            Some("SELECT Nama_Unit, Jumlah FROM drauk_unit LIMIT 1")
        );
        assert!(response.answer.contains("Rektorat"));
        assert!(response.token_usage.grand_total() > 0);
    }

    #[tokio::test]
    async fn test_general_knowledge_is_rejected() {
        let svc = service(vec![Ok("general_knowledge")], Ok(QueryResult::default()));
        let response = svc.ask("who won the world cup?", None, None).await.unwrap();
        assert_eq!(response.status, PipelineOutcome::Rejected);
        assert!(response.generated_sql.is_none());
    }

    #[tokio::test]
    async fn test_unsafe_sql_is_blocked_not_executed() {
        let svc = service(
            vec![Ok("data_query"), Ok("DROP TABLE drauk_unit")],
            Err("must not be reached".to_string()),
        );
        let response = svc.ask("delete everything", None, None).await.unwrap();
        assert_eq!(response.status, PipelineOutcome::UnsafeSqlQuery);
        assert!(response.answer.contains("safety validator"));
    }

    #[tokio::test]
    async fn test_stacked_statements_blocked() {
        let svc = service(
            vec![
                Ok("data_query"),
                Ok("SELECT 1; DELETE FROM drauk_unit"),
            ],
            Err("must not be reached".to_string()),
        );
        let response = svc.ask("anything", None, None).await.unwrap();
        assert_eq!(response.status, PipelineOutcome::UnsafeSqlQuery);
    }

    #[tokio::test]
    async fn test_short_generation_fails() {
        let svc = service(
            vec![Ok("data_query"), Ok("nope")],
            Ok(QueryResult::default()),
        );
        let response = svc.ask("a question", None, None).await.unwrap();
        assert_eq!(response.status, PipelineOutcome::SqlGenerationFailed);
    }

    #[tokio::test]
    async fn test_generation_llm_error_maps_to_failed_outcome() {
        let svc = service(
            vec![Ok("data_query"), Err(ServiceError::llm("provider down"))],
            Ok(QueryResult::default()),
        );
        let response = svc.ask("a question", None, None).await.unwrap();
        assert_eq!(response.status, PipelineOutcome::SqlGenerationFailed);
    }

    #[tokio::test]
    async fn test_execution_error_maps_to_outcome() {
        let svc = service(
            vec![
                Ok("data_query"),
                Ok("SELECT Jumlah FROM drauk_unit"),
            ],
            Err("table gone".to_string()),
        );
        let response = svc.ask("total budget?", None, None).await.unwrap();
        assert_eq!(response.status, PipelineOutcome::SqlExecutionError);
        assert_eq!(
            response.generated_sql.as_deref(),
            Some("SELECT Jumlah FROM drauk_unit")
        );
    }

    #[tokio::test]
    async fn test_empty_result_still_succeeds() {
        let svc = service(
            vec![
                Ok("data_query"),
                Ok("SELECT Jumlah FROM drauk_unit WHERE Tahun_Anggaran = 1999"),
                Ok("No data was found for 1999."),
            ],
            Ok(QueryResult::default()),
        );
        let response = svc.ask("budget in 1999?", None, None).await.unwrap();
        assert_eq!(response.status, PipelineOutcome::Success);
        assert!(response.answer.contains("No data"));
    }

    #[tokio::test]
    async fn test_contextual_ask_records_turns() {
        let svc = service(
            vec![
                Ok("data_query"),
                Ok("SELECT Jumlah FROM drauk_unit LIMIT 1"),
                Ok("The budget is 1000."),
            ],
            Ok(one_row_result()),
        );
        let response = svc
            .ask_contextual("total budget?", "conv-1", None, None)
            .await
            .unwrap();
        assert_eq!(response.status, PipelineOutcome::Success);
        assert_eq!(svc.conversations.turn_count("conv-1"), 1);
        assert!(svc
            .conversations
            .format_history("conv-1")
            .contains("The budget is 1000."));
    }

    #[tokio::test]
    async fn test_generate_sql_only_flags_unsafe() {
        let svc = service(
            vec![Ok("SELECT SLEEP(10)")],
            Err("must not be reached".to_string()),
        );
        let response = svc.generate_sql_only("slow it down", None).await.unwrap();
        assert!(!response.safe);
        assert!(response.reject_reason.unwrap().contains("SLEEP"));
    }

    #[tokio::test]
    async fn test_generate_sql_only_strips_fences() {
        let svc = service(
            vec![Ok("```sql\nSELECT 1\n```")],
            Err("must not be reached".to_string()),
        );
        let response = svc.generate_sql_only("one", None).await.unwrap();
        assert_eq!(response.sql, "SELECT 1");
        assert!(response.safe);
    }

    #[tokio::test]
    async fn test_chat_passthrough_skips_pipeline() {
        let svc = service(
            vec![Ok("The capital of France is Paris.")],
            Err("must not be reached".to_string()),
        );
        let response = svc
            .chat("what is the capital of France?", None)
            .await
            .unwrap();
        assert_eq!(response.answer, "The capital of France is Paris.");
        assert!(response.token_usage.get("chat_total").unwrap() > 0);
    }

    #[test]
    fn test_outcome_serialization() {
        assert_eq!(
            serde_json::to_value(PipelineOutcome::UnsafeSqlQuery).unwrap(),
            "UNSAFE_SQL_QUERY"
        );
        assert_eq!(PipelineOutcome::Success.as_str(), "SUCCESS");
    }
}
