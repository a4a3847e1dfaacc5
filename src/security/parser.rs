//! Narrow facade over the SQL parser backend.
//!
//! The validator only needs two things from a parser: how many statements an
//! input contains, and a flattened lexical token stream per statement with
//! keywords and function-call forms identified. Everything here speaks that
//! vocabulary so the backend (currently the `sqlparser` tokenizer with the
//! MySQL dialect) can be swapped without touching validator logic.
//!
//! The facade is deliberately non-validating: it lexes rather than builds an
//! AST, so vendor clauses the grammar does not model (`INTO OUTFILE`,
//! `FOR UPDATE`) still reach the validator's token sweeps instead of dying
//! as parse errors.

use sqlparser::dialect::MySqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// The classified kind of a single SQL statement, from its leading verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Truncate,
    Replace,
    Grant,
    Revoke,
    Merge,
    Execute,
    Set,
    Show,
    Unknown,
}

impl StatementKind {
    /// Only SELECT statements are eligible for execution.
    pub fn is_select(&self) -> bool {
        matches!(self, StatementKind::Select)
    }

    fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "SELECT" => Some(StatementKind::Select),
            "INSERT" => Some(StatementKind::Insert),
            "UPDATE" => Some(StatementKind::Update),
            "DELETE" => Some(StatementKind::Delete),
            "CREATE" => Some(StatementKind::Create),
            "ALTER" => Some(StatementKind::Alter),
            "DROP" => Some(StatementKind::Drop),
            "TRUNCATE" => Some(StatementKind::Truncate),
            "REPLACE" => Some(StatementKind::Replace),
            "GRANT" => Some(StatementKind::Grant),
            "REVOKE" => Some(StatementKind::Revoke),
            "MERGE" => Some(StatementKind::Merge),
            "EXEC" | "EXECUTE" | "CALL" => Some(StatementKind::Execute),
            "SET" => Some(StatementKind::Set),
            "SHOW" => Some(StatementKind::Show),
            _ => None,
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Create => "CREATE",
            StatementKind::Alter => "ALTER",
            StatementKind::Drop => "DROP",
            StatementKind::Truncate => "TRUNCATE",
            StatementKind::Replace => "REPLACE",
            StatementKind::Grant => "GRANT",
            StatementKind::Revoke => "REVOKE",
            StatementKind::Merge => "MERGE",
            StatementKind::Execute => "EXECUTE",
            StatementKind::Set => "SET",
            StatementKind::Show => "SHOW",
            StatementKind::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// One significant lexical token of a statement.
#[derive(Debug, Clone)]
pub struct SqlToken {
    /// Original token text, casing preserved.
    pub text: String,
    /// Whether the dialect classifies this word as a keyword. Quoted
    /// identifiers are never keywords.
    pub is_keyword: bool,
    /// Whether the token is the name position of a function-call form: a
    /// word whose next significant token is an opening parenthesis.
    pub starts_call: bool,
}

impl SqlToken {
    /// Case-folded form used for deny-list membership checks.
    pub fn normalized(&self) -> String {
        self.text.to_uppercase()
    }
}

/// A statement decomposed into its kind and flattened token stream.
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    pub kind: StatementKind,
    pub tokens: Vec<SqlToken>,
}

/// Parse `sql` into statements of tokens, splitting on statement
/// terminators. Semicolons inside string literals and quoted identifiers do
/// not split.
///
/// Returns an empty vector for empty or unlexable input; the caller treats
/// that as a normal rejection, never an error. A panic inside the backend is
/// caught and mapped the same way.
pub fn parse_statements(sql: &str) -> Vec<ParsedStatement> {
    let tokens = catch_unwind(AssertUnwindSafe(|| {
        Tokenizer::new(&MySqlDialect {}, sql).tokenize()
    }));

    match tokens {
        Ok(Ok(tokens)) => split_into_statements(&tokens),
        Ok(Err(_)) | Err(_) => Vec::new(),
    }
}

/// Split a raw token stream on statement terminators and flatten each group
/// into significant tokens with keyword/function-call classification.
fn split_into_statements(tokens: &[Token]) -> Vec<ParsedStatement> {
    let significant: Vec<&Token> = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect();

    let mut groups: Vec<Vec<SqlToken>> = Vec::new();
    let mut current: Vec<SqlToken> = Vec::new();

    for (i, token) in significant.iter().enumerate() {
        match token {
            Token::SemiColon => {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
            }
            Token::Word(word) => {
                let next_is_lparen = matches!(significant.get(i + 1), Some(Token::LParen));
                current.push(SqlToken {
                    text: word.value.clone(),
                    is_keyword: word.quote_style.is_none() && word.keyword != Keyword::NoKeyword,
                    starts_call: next_is_lparen,
                });
            }
            other => {
                current.push(SqlToken {
                    text: other.to_string(),
                    is_keyword: false,
                    starts_call: false,
                });
            }
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
        .into_iter()
        .map(|tokens| ParsedStatement {
            kind: classify(&tokens),
            tokens,
        })
        .collect()
}

/// Classify a statement by its first statement verb. Keywords that are not
/// statement verbs (WITH, EXPLAIN) are skipped, so a CTE-led query
/// classifies by the verb it introduces, matching the leading-verb rule.
fn classify(tokens: &[SqlToken]) -> StatementKind {
    for token in tokens {
        if !token.is_keyword {
            continue;
        }
        if let Some(kind) = StatementKind::from_verb(&token.normalized()) {
            return kind;
        }
    }
    StatementKind::Unknown
}
