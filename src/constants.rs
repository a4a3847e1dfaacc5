//! Centralized constants for the NL2SQL server.
//!
//! This module contains all magic numbers, default values, and the safety
//! blacklists used throughout the codebase, making them easy to find,
//! understand, and modify.

// =============================================================================
// Safety Policy Blacklists
// =============================================================================

/// Keywords rejected when they appear anywhere in a statement's token stream.
///
/// INTO blocks `SELECT ... INTO OUTFILE/DUMPFILE`, FOR blocks the
/// `FOR UPDATE` / `FOR SHARE` locking clauses. The DML/DDL verbs are listed
/// as well so a disguised or nested write statement is caught even when the
/// statement-kind classification misses it.
pub const DENIED_KEYWORDS: &[&str] = &[
    "INTO", "FOR", "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "REPLACE", "TRUNCATE",
    "GRANT", "REVOKE", "LOCK", "UNLOCK", "EXECUTE",
];

/// Function names rejected when called from inside an otherwise-valid SELECT.
///
/// These enable side-channel, resource-exhaustion, file-read, or
/// system-execution attacks (e.g. `SELECT SLEEP(10)`). The list is a fixed
/// enumeration of known-dangerous primitives; expanding it is a policy
/// decision, not an inferred requirement.
pub const DENIED_FUNCTIONS: &[&str] = &[
    "SLEEP", "BENCHMARK", "LOAD_FILE", "SYS_EVAL", "SYS_EXEC", "SYS_GET", "EXECUTE",
];

// =============================================================================
// Validation Constants
// =============================================================================

/// Default maximum candidate query length in bytes, checked before parsing.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 1_000_000;

/// Generated SQL shorter than this is treated as a failed generation.
pub const MIN_GENERATED_SQL_LENGTH: usize = 5;

// =============================================================================
// Timeout Constants
// =============================================================================

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default HTTP request timeout against the LLM provider in seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Connection Pool Constants
// =============================================================================

/// Default minimum connections in pool.
pub const DEFAULT_MIN_CONNECTIONS: u32 = 1;

/// Default maximum connections in pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// =============================================================================
// Retrieval Constants
// =============================================================================

/// Default number of schema snippets handed to the SQL generation prompt.
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 5;

// =============================================================================
// Token Accounting Constants
// =============================================================================

/// Fallback token estimate: roughly four characters per token.
pub const CHARS_PER_TOKEN: usize = 4;

// =============================================================================
// History Constants
// =============================================================================

/// Maximum turns of conversation history threaded into a prompt.
pub const MAX_HISTORY_TURNS: usize = 10;

/// Default row limit when listing the question log.
pub const DEFAULT_QUESTION_LOG_LIMIT: usize = 300;

// =============================================================================
// Server Constants
// =============================================================================

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// Default LLM model when a request does not name one.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Curated OpenRouter model identifiers surfaced by `GET /models`.
pub const AVAILABLE_MODELS: &[&str] = &[
    "openai/gpt-4o-mini",
    "openai/gpt-4o",
    "anthropic/claude-3.5-sonnet",
    "anthropic/claude-3-haiku",
    "google/gemini-2.5-flash",
    "meta-llama/llama-3.1-70b-instruct",
];

/// Default OpenRouter API base URL.
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

// =============================================================================
// Logging Constants
// =============================================================================

/// Default truncation length for query logging.
pub const LOG_QUERY_TRUNCATE_LENGTH: usize = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blacklists_are_uppercase() {
        for kw in DENIED_KEYWORDS {
            assert_eq!(*kw, kw.to_uppercase());
        }
        for f in DENIED_FUNCTIONS {
            assert_eq!(*f, f.to_uppercase());
        }
    }

    #[test]
    fn test_select_is_never_denied() {
        assert!(!DENIED_KEYWORDS.contains(&"SELECT"));
    }

    #[test]
    fn test_default_model_is_available() {
        assert!(AVAILABLE_MODELS.contains(&DEFAULT_MODEL));
    }
}
