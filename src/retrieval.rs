//! Schema retrieval for the RAG pipeline.
//!
//! The generation prompt is grounded in a schema catalog: a column whitelist
//! plus per-column descriptions and synonyms. A retriever picks the snippets
//! most relevant to the question. The vector store lives behind the
//! [`SchemaRetriever`] trait; the in-process implementation scores snippets
//! by case-folded term overlap, which is enough for a single-table catalog.

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One retrievable unit of schema documentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnippet {
    /// Descriptive text handed to the generation prompt.
    pub text: String,
    /// Match terms: the column name, its synonyms, related phrasing.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// The schema catalog: table name, column whitelist, and snippets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub table: String,
    pub columns: Vec<String>,
    pub snippets: Vec<SchemaSnippet>,
}

impl SchemaCatalog {
    /// Load a catalog from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ServiceError::retrieval(format!(
                "cannot read schema catalog {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| ServiceError::retrieval(format!("invalid schema catalog: {}", e)))
    }

    /// The embedded catalog for the `drauk_unit` budget table, used when no
    /// catalog file is configured.
    pub fn embedded() -> Self {
        let columns = [
            "Tahun_Anggaran",
            "Kode_DRAUK",
            "Indikator_Tujuan",
            "Kode_SS",
            "Sasaran_Strategis",
            "Kode_IKSS",
            "Indikator_Kinerja_Sasaran_Strategis",
            "Kode_PS",
            "Program_Strategis",
            "Kode_IKPS",
            "Indikator_Kinerja_Program_Strategis",
            "Kode_Unit",
            "Nama_Unit",
            "Tipe_Unit",
            "Kegiatan_Universitas",
            "Indikator_Capaian",
            "Kegiatan_Unit",
            "Kode_Standar_Kegiatan",
            "Standar_Kegiatan",
            "FTE",
            "Detail_Kegiatan",
            "Kelompok_Pagu",
            "Akun",
            "COA",
            "Nama_COA",
            "Satuan_Kegiatan",
            "Barjas",
            "Volume_1",
            "Satuan_1",
            "Volume_2",
            "Satuan_2",
            "Volume_3",
            "Satuan_3",
            "Volume_4",
            "Satuan_4",
            "Harga_Satuan",
            "Sumber_Dana",
            "Detail_Sumber_Dana",
            "Jumlah",
            "Realisasi",
            "Sisa",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let snippet = |text: &str, keywords: &[&str]| SchemaSnippet {
            text: text.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
        };

        SchemaCatalog {
            table: "drauk_unit".to_string(),
            columns,
            snippets: vec![
                snippet(
                    "Column `Tahun_Anggaran` (integer): the fiscal year the budget \
                     line belongs to. Users may say: year, fiscal year, budget year.",
                    &["tahun", "year", "fiscal", "anggaran", "2023", "2024", "2025"],
                ),
                snippet(
                    "Column `Nama_Unit` (text): the name of the organizational unit \
                     that owns the budget line. Users may say: unit, department, \
                     directorate, faculty, office.",
                    &["unit", "department", "directorate", "faculty", "nama"],
                ),
                snippet(
                    "Column `Jumlah` (number): the total budgeted amount for the \
                     line. Users may say: budget, amount, allocation, total.",
                    &["jumlah", "budget", "amount", "allocation", "total", "largest", "biggest"],
                ),
                snippet(
                    "Column `Realisasi` (number): the amount already spent against \
                     the budget line. Users may say: spent, realized, spending.",
                    &["realisasi", "spent", "realized", "spending", "expenditure"],
                ),
                snippet(
                    "Column `Sisa` (number): the remaining unspent amount, i.e. \
                     Jumlah minus Realisasi. Users may say: remaining, left over.",
                    &["sisa", "remaining", "left", "unspent", "balance"],
                ),
                snippet(
                    "Column `Program_Strategis` (text): the strategic program the \
                     activity supports. Users may say: program, strategic program.",
                    &["program", "strategic", "strategis"],
                ),
                snippet(
                    "Column `Sasaran_Strategis` (text): the strategic goal. Users \
                     may say: goal, objective, target.",
                    &["sasaran", "goal", "objective", "target"],
                ),
                snippet(
                    "Column `Kegiatan_Unit` (text): the unit-level activity the \
                     budget line funds. Users may say: activity, task, event.",
                    &["kegiatan", "activity", "activities", "task", "event"],
                ),
                snippet(
                    "Column `Sumber_Dana` (text): the funding source. Users may \
                     say: fund source, financed by.",
                    &["sumber", "dana", "fund", "source", "financed"],
                ),
                snippet(
                    "Column `Kelompok_Pagu` (text): the budget ceiling group the \
                     line is classified under. Users may say: ceiling, group.",
                    &["pagu", "kelompok", "ceiling", "group"],
                ),
            ],
        }
    }
}

/// Retrieval seam: given a question, return the most relevant snippets.
#[async_trait]
pub trait SchemaRetriever: Send + Sync {
    async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<SchemaSnippet>, ServiceError>;
}

/// In-process retriever scoring snippets by case-folded term overlap
/// between the question and each snippet's keywords and text.
#[derive(Debug, Clone)]
pub struct KeywordRetriever {
    catalog: SchemaCatalog,
}

impl KeywordRetriever {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    fn score(question_terms: &[String], snippet: &SchemaSnippet) -> usize {
        let haystack = snippet.text.to_lowercase();
        question_terms
            .iter()
            .map(|term| {
                let keyword_hit = snippet
                    .keywords
                    .iter()
                    .any(|k| k.to_lowercase() == *term);
                // Keyword matches outweigh free-text matches.
                if keyword_hit {
                    2
                } else if haystack.contains(term.as_str()) {
                    1
                } else {
                    0
                }
            })
            .sum()
    }
}

#[async_trait]
impl SchemaRetriever for KeywordRetriever {
    async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<SchemaSnippet>, ServiceError> {
        let terms: Vec<String> = question
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| t.len() > 2)
            .map(|t| t.to_string())
            .collect();

        let mut scored: Vec<(usize, &SchemaSnippet)> = self
            .catalog
            .snippets
            .iter()
            .map(|s| (Self::score(&terms, s), s))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .filter(|(score, _)| *score > 0)
            .take(top_k)
            .map(|(_, s)| s.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog_shape() {
        let catalog = SchemaCatalog::embedded();
        assert_eq!(catalog.table, "drauk_unit");
        assert!(catalog.columns.contains(&"Jumlah".to_string()));
        assert!(catalog.columns.contains(&"Nama_Unit".to_string()));
        assert!(!catalog.snippets.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_ranks_relevant_snippets_first() {
        let retriever = KeywordRetriever::new(SchemaCatalog::embedded());
        let snippets = retriever
            .retrieve("which unit has the largest budget in 2024?", 3)
            .await
            .unwrap();
        assert!(!snippets.is_empty());
        assert!(snippets.len() <= 3);
        // The budget amount snippet must surface for this question.
        assert!(snippets.iter().any(|s| s.text.contains("Jumlah")));
    }

    #[tokio::test]
    async fn test_retrieve_unrelated_question_yields_nothing() {
        let retriever = KeywordRetriever::new(SchemaCatalog::embedded());
        let snippets = retriever
            .retrieve("zzz qqq xyzzy", 5)
            .await
            .unwrap();
        assert!(snippets.is_empty());
    }

    #[test]
    fn test_catalog_roundtrips_through_json() {
        let catalog = SchemaCatalog::embedded();
        let json = serde_json::to_string(&catalog).unwrap();
        let back: SchemaCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.columns.len(), catalog.columns.len());
    }
}
