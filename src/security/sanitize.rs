//! Output sanitizing for LLM-generated SQL.
//!
//! Generation models routinely wrap SQL in a markdown code fence even when
//! told not to. The sanitizer strips that presentation artifact and nothing
//! else: the query body must survive byte for byte so column-name case
//! sensitivity is preserved downstream.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches a ```sql fenced block and captures its interior.
static SQL_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```sql\n(.*?)\n```")
        .unwrap_or_else(|e| panic!("Internal error: invalid fence pattern: {}", e))
});

/// Strip markdown code-fence wrapping from generated SQL.
///
/// If `raw` contains a ```sql fenced block closed by a matching fence, only
/// the interior content is returned, trimmed. Otherwise `raw` is returned
/// trimmed, with no content removed. Interior whitespace, casing, and
/// punctuation are never altered.
///
/// Always returns a string; an empty result is valid and is the caller's
/// signal that generation failed.
pub fn sanitize(raw: &str) -> String {
    if let Some(caps) = SQL_FENCE.captures(raw) {
        if let Some(inner) = caps.get(1) {
            return inner.as_str().trim().to_string();
        }
    }
    raw.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_sql_fence() {
        let raw = "```sql\nSELECT * FROM t\n```";
        assert_eq!(sanitize(raw), "SELECT * FROM t");
    }

    #[test]
    fn test_fence_with_surrounding_prose() {
        let raw = "Here is your query:\n```sql\nSELECT 1\n```\nHope that helps!";
        assert_eq!(sanitize(raw), "SELECT 1");
    }

    #[test]
    fn test_plain_input_is_only_trimmed() {
        assert_eq!(sanitize("  SELECT 1  \n"), "SELECT 1");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   \n\t "), "");
    }

    #[test]
    fn test_unclosed_fence_is_left_alone() {
        let raw = "```sql\nSELECT 1";
        assert_eq!(sanitize(raw), "```sql\nSELECT 1");
    }

    #[test]
    fn test_multiline_body_preserved() {
        let sql = "SELECT a,\n       b\nFROM t\nWHERE a > 1";
        let raw = format!("```sql\n{}\n```", sql);
        assert_eq!(sanitize(&raw), sql);
    }

    #[test]
    fn test_case_preserved() {
        let sql = "SELECT Nama_Unit, Jumlah FROM drauk_unit";
        let raw = format!("```sql\n{}\n```", sql);
        assert_eq!(sanitize(&raw), sql);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "SELECT 1",
            "```sql\nSELECT 1\n```",
            "  padded  ",
            "",
            "```sql\nunclosed",
            "text ```sql\nSELECT a\n``` trailing",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_fence_round_trip() {
        let sql_text = "  SELECT Jumlah FROM drauk_unit LIMIT 5  ";
        let wrapped = format!("```sql\n{}\n```", sql_text);
        assert_eq!(sanitize(&wrapped), sql_text.trim());
    }
}
