//! Security layer: output sanitizing and SQL safety validation.
//!
//! Control flow is generator output -> [`sanitize`] -> [`QueryValidator`] ->
//! execution. The validator is the gate; nothing downstream runs on
//! unvalidated input.

pub mod parser;
pub mod policy;
pub mod sanitize;
pub mod validation;

pub use parser::{ParsedStatement, SqlToken, StatementKind};
pub use policy::SafetyPolicy;
pub use sanitize::sanitize;
pub use validation::{QueryValidator, RejectReason, Verdict};
