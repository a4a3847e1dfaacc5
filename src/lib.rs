//! # NL2SQL Server
//!
//! An HTTP service that turns natural-language questions into validated,
//! read-only SQL and natural-language answers.
//!
//! This crate provides:
//! - **Security**: output sanitizing and a deny-by-structure SQL safety
//!   validator gating everything the generator produces
//! - **Pipeline**: intent classification, schema retrieval, SQL generation,
//!   execution, and result analysis
//! - **Accounting**: per-stage token usage ledgers and a question audit log
//!
//! ## Architecture
//!
//! The safety validator is the sole boundary between the stochastic SQL
//! generator and the execution engine. It is pure, total, and runs on every
//! candidate query; nothing downstream executes input it has not admitted.

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod history;
pub mod llm;
pub mod middleware;
pub mod prompts;
pub mod retrieval;
pub mod security;
pub mod server;
pub mod service;
pub mod usage;

pub use config::Config;
pub use error::ServiceError;
pub use security::{QueryValidator, RejectReason, Verdict};
pub use service::Nl2SqlService;
