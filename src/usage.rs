//! Token usage accounting.
//!
//! Each LLM call reports input/output/total token counts; the pipeline
//! merges them into a per-stage ledger that is returned to the caller and
//! written to the question log.

use crate::constants::CHARS_PER_TOKEN;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token counts for a single LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }

    /// Estimate usage from raw prompt/completion text when the provider
    /// reports no counts.
    pub fn estimated(prompt: &str, completion: &str) -> Self {
        Self::new(estimate_tokens(prompt), estimate_tokens(completion))
    }
}

/// Rough token estimate used when no provider count is available.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / CHARS_PER_TOKEN) as u64
}

/// Per-stage usage ledger keyed by `<stage>_input` / `<stage>_output` /
/// `<stage>_total`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageLedger {
    /// Model the counts belong to.
    pub model: String,
    #[serde(flatten)]
    entries: BTreeMap<String, u64>,
}

impl UsageLedger {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Merge one stage's usage into the ledger, accumulating on repeat keys.
    pub fn record(&mut self, stage: &str, usage: TokenUsage) {
        for (suffix, value) in [
            ("input", usage.input_tokens),
            ("output", usage.output_tokens),
            ("total", usage.total_tokens),
        ] {
            let key = format!("{}_{}", stage, suffix);
            *self.entries.entry(key).or_insert(0) += value;
        }
    }

    /// Sum of every `*_total` entry.
    pub fn grand_total(&self) -> u64 {
        self.entries
            .iter()
            .filter(|(k, _)| k.ends_with("_total"))
            .map(|(_, v)| *v)
            .sum()
    }

    /// Look up a single entry, mainly for tests and logging.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).copied()
    }
}
