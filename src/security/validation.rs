//! SQL safety validation.
//!
//! The validator is the sole safety boundary between the stochastic SQL
//! generator and the execution engine: nothing downstream may run on input
//! it has not admitted. It is a pure function from string to verdict with no
//! side effects beyond local diagnostics, and it never raises — malformed
//! input is a normal rejection outcome, not an exceptional control path.

use crate::security::parser::parse_statements;
use crate::security::policy::SafetyPolicy;
use serde::Serialize;

/// Why a candidate query was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "detail")]
pub enum RejectReason {
    /// Input parses to no statements, or cannot be parsed at all.
    EmptyOrUnparseable,
    /// Input exceeds the configured length cap (checked before parsing).
    QueryTooLong { length: usize, max: usize },
    /// More than one statement detected: a stacking attempt.
    MultipleStatements { count: usize },
    /// The statement's leading verb is not SELECT.
    NonSelectStatement { kind: String },
    /// A blacklisted bare keyword token was found.
    DeniedKeyword(String),
    /// A blacklisted function-call token was found.
    DeniedFunction(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::EmptyOrUnparseable => write!(f, "empty or unparseable"),
            RejectReason::QueryTooLong { length, max } => {
                write!(f, "query length {} exceeds maximum of {} bytes", length, max)
            }
            RejectReason::MultipleStatements { count } => {
                write!(f, "multiple statements detected ({})", count)
            }
            RejectReason::NonSelectStatement { kind } => {
                write!(f, "statement kind not SELECT: {}", kind)
            }
            RejectReason::DeniedKeyword(name) => write!(f, "denied keyword '{}'", name),
            RejectReason::DeniedFunction(name) => write!(f, "denied function '{}'", name),
        }
    }
}

/// The validator's admit/reject decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum Verdict {
    Admit,
    Reject { reason: RejectReason },
}

impl Verdict {
    fn reject(reason: RejectReason) -> Self {
        Verdict::Reject { reason }
    }

    /// Whether the query may be handed to the execution engine.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Verdict::Admit)
    }

    /// Human-readable rejection reason, if rejected.
    pub fn reason(&self) -> Option<String> {
        match self {
            Verdict::Admit => None,
            Verdict::Reject { reason } => Some(reason.to_string()),
        }
    }
}

/// Static analyzer deciding whether a candidate SQL string is a safe,
/// single, read-only SELECT.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    policy: SafetyPolicy,
    max_query_length: usize,
}

impl QueryValidator {
    /// Create a validator over an immutable policy with a pre-parse length
    /// cap in bytes.
    pub fn new(policy: SafetyPolicy, max_query_length: usize) -> Self {
        Self {
            policy,
            max_query_length,
        }
    }

    /// Decide whether `query` is safe to execute.
    ///
    /// Checks run in a fixed order so the first-triggering rule determines
    /// the surfaced diagnostic: length cap, parse, single-statement rule,
    /// statement-kind rule, then the two token sweeps. The sweeps run
    /// unconditionally on every statement that passes the kind rule; they do
    /// not trust the kind classification alone, because dialect quirks could
    /// let a dangerous clause hide inside a syntactic SELECT.
    pub fn is_safe_select(&self, query: &str) -> Verdict {
        if query.len() > self.max_query_length {
            let verdict = Verdict::reject(RejectReason::QueryTooLong {
                length: query.len(),
                max: self.max_query_length,
            });
            self.trace(query, &verdict);
            return verdict;
        }

        let statements = parse_statements(query);
        if statements.is_empty() {
            let verdict = Verdict::reject(RejectReason::EmptyOrUnparseable);
            self.trace(query, &verdict);
            return verdict;
        }

        if statements.len() > 1 {
            let verdict = Verdict::reject(RejectReason::MultipleStatements {
                count: statements.len(),
            });
            self.trace(query, &verdict);
            return verdict;
        }

        let statement = &statements[0];

        if !statement.kind.is_select() {
            let verdict = Verdict::reject(RejectReason::NonSelectStatement {
                kind: statement.kind.to_string(),
            });
            self.trace(query, &verdict);
            return verdict;
        }

        // Token sweep: denied bare keywords, flattened across subqueries and
        // clauses. Catches INTO OUTFILE, FOR UPDATE, and nested DML verbs
        // that survive the kind check.
        for token in &statement.tokens {
            if token.is_keyword && self.policy.is_denied_keyword(&token.normalized()) {
                let verdict = Verdict::reject(RejectReason::DeniedKeyword(token.normalized()));
                self.trace(query, &verdict);
                return verdict;
            }
        }

        // Token sweep: denied function calls (SLEEP, BENCHMARK, LOAD_FILE...).
        for token in &statement.tokens {
            if token.starts_call && self.policy.is_denied_function(&token.normalized()) {
                let verdict = Verdict::reject(RejectReason::DeniedFunction(token.normalized()));
                self.trace(query, &verdict);
                return verdict;
            }
        }

        Verdict::Admit
    }

    fn trace(&self, query: &str, verdict: &Verdict) {
        if let Some(reason) = verdict.reason() {
            let preview: String = query
                .chars()
                .take(crate::constants::LOG_QUERY_TRUNCATE_LENGTH)
                .collect();
            tracing::warn!(query = %preview, %reason, "rejected candidate query");
        }
    }
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new(
            SafetyPolicy::default(),
            crate::constants::DEFAULT_MAX_QUERY_LENGTH,
        )
    }
}
