//! The immutable safety policy consumed by the SQL validator.

use crate::constants::{DENIED_FUNCTIONS, DENIED_KEYWORDS};
use std::collections::HashSet;

/// Deny lists applied to every candidate query.
///
/// Constructed once at startup and shared read-only by all calls; it is a
/// design invariant, not request-time configuration. Tests may build
/// alternate policies without process-wide side effects.
#[derive(Debug, Clone)]
pub struct SafetyPolicy {
    denied_keywords: HashSet<String>,
    denied_functions: HashSet<String>,
}

impl SafetyPolicy {
    /// Build a policy from explicit deny lists. Entries are case-folded to
    /// uppercase so membership checks match normalized tokens.
    pub fn new<K, F>(keywords: K, functions: F) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        Self {
            denied_keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_uppercase())
                .collect(),
            denied_functions: functions
                .into_iter()
                .map(|f| f.as_ref().to_uppercase())
                .collect(),
        }
    }

    /// Whether a normalized (uppercased) keyword token is denied.
    pub fn is_denied_keyword(&self, normalized: &str) -> bool {
        self.denied_keywords.contains(normalized)
    }

    /// Whether an uppercased function name is denied.
    pub fn is_denied_function(&self, upper_name: &str) -> bool {
        self.denied_functions.contains(upper_name)
    }
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self::new(DENIED_KEYWORDS.iter(), DENIED_FUNCTIONS.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_contents() {
        let policy = SafetyPolicy::default();
        assert!(policy.is_denied_keyword("INTO"));
        assert!(policy.is_denied_keyword("FOR"));
        assert!(policy.is_denied_keyword("DROP"));
        assert!(policy.is_denied_function("SLEEP"));
        assert!(policy.is_denied_function("LOAD_FILE"));
        assert!(!policy.is_denied_keyword("SELECT"));
        assert!(!policy.is_denied_function("COUNT"));
    }

    #[test]
    fn test_custom_policy_is_case_folded() {
        let policy = SafetyPolicy::new(["shutdown"], ["my_func"]);
        assert!(policy.is_denied_keyword("SHUTDOWN"));
        assert!(policy.is_denied_function("MY_FUNC"));
        assert!(!policy.is_denied_keyword("INTO"));
    }
}
