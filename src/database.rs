//! Database layer: query execution and the question log.

pub mod executor;
pub mod question_log;

pub use executor::{MySqlExecutor, QueryExecutor, QueryResult, SqlValue};
pub use question_log::{QuestionLog, QuestionRecord};
