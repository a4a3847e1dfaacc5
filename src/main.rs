//! NL2SQL server entry point.
//!
//! Loads configuration from the environment, connects the MySQL pool and
//! the OpenRouter client, and serves the HTTP API with graceful shutdown
//! on SIGINT.

use anyhow::Result;
use nl2sql_server::database::{MySqlExecutor, QuestionLog};
use nl2sql_server::llm::OpenRouterClient;
use nl2sql_server::retrieval::{KeywordRetriever, SchemaCatalog};
use nl2sql_server::security::{QueryValidator, SafetyPolicy};
use nl2sql_server::server::{router, AppState};
use nl2sql_server::{Config, Nl2SqlService};
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] {}", info);
    }));

    let config = Config::from_env()?;
    tracing::info!("configuration loaded");

    let pool = MySqlPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.connect_timeout)
        .connect(&config.database.url)
        .await?;
    tracing::info!("database pool connected");

    let catalog = match &config.retrieval.catalog_path {
        Some(path) => SchemaCatalog::from_file(path)?,
        None => SchemaCatalog::embedded(),
    };

    let llm = Arc::new(OpenRouterClient::new(&config.llm)?);
    let executor = Arc::new(MySqlExecutor::new(pool.clone()));
    let retriever = Arc::new(KeywordRetriever::new(catalog.clone()));
    let validator = QueryValidator::new(
        SafetyPolicy::default(),
        config.security.max_query_length,
    );
    let question_log = Arc::new(QuestionLog::new(pool));

    let service = Nl2SqlService::new(
        llm,
        executor,
        retriever,
        validator,
        catalog,
        &config.retrieval,
        config.llm.default_model.clone(),
    )
    .with_question_log(question_log.clone());

    let state = Arc::new(AppState {
        service: Arc::new(service),
        question_log: Some(question_log),
    });

    let app = router(state, &config.server);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(addr = %config.server.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown signal handler");
    }
}

fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,nl2sql_server=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .init();
}
