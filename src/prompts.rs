//! Prompt templates for the NL2SQL pipeline.
//!
//! Three prompts drive the pipeline: intent classification, SQL generation,
//! and result analysis. The SQL generation prompt carries the column
//! whitelist and exact-case rule; it is the main guard against hallucinated
//! column names.

use crate::retrieval::SchemaSnippet;

/// Category name for questions answerable from the database.
pub const CATEGORY_DATA_QUERY: &str = "data_query";

/// Category name for everything else.
pub const CATEGORY_GENERAL_KNOWLEDGE: &str = "general_knowledge";

/// Placeholder used when a conversation has no history yet.
pub const NO_HISTORY: &str = "No previous conversation.";

/// Text handed to the analysis prompt when a query returns zero rows.
pub const EMPTY_RESULT_TEXT: &str =
    "The query executed successfully, but no data was found.";

/// Build the intent classification prompt. The model must answer with a
/// single category word.
pub fn classification_prompt(question: &str) -> String {
    format!(
        "You are a classification AI. Classify the user's question into exactly one \
         of the following two categories:\n\
         1. \"{data}\": the question concerns budgets, spending, remaining funds, \
         activities, organizational units, strategic goals, programs, or other \
         internal data.\n\
         2. \"{general}\": the question is about any other topic.\n\
         Return ONLY the single category word and nothing else.\n\
         User question: {question}\n\
         Category:",
        data = CATEGORY_DATA_QUERY,
        general = CATEGORY_GENERAL_KNOWLEDGE,
        question = question,
    )
}

/// Build the SQL generation prompt.
///
/// `columns` is the whitelist of valid column names, `snippets` the
/// retrieved schema context, `history` the formatted conversation history
/// (use [`NO_HISTORY`] for stateless calls).
pub fn sql_generation_prompt(
    table: &str,
    columns: &[String],
    snippets: &[SchemaSnippet],
    history: &str,
    question: &str,
) -> String {
    let column_list = columns.join(", ");
    let context = snippets
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n");

    format!(
        "You are an AI assistant that converts natural language into a valid SQL \
         query for a table named `{table}`.\n\n\
         VALID COLUMN LIST (whitelist):\n[{column_list}]\n\n\
         MOST IMPORTANT RULES:\n\
         1. Use ONLY column names from the VALID COLUMN LIST above. Never invent or \
         alter column names.\n\
         2. Column names are case-sensitive and must be copied EXACTLY as written in \
         the list. Do not change `Kegiatan_Unit` into `kegiatan_unit`.\n\
         3. Use the Schema Context below to understand what each column means and to \
         connect it with the user's question.\n\
         4. If a word in the question is not in the column list, use the synonyms and \
         descriptions in the Schema Context to find the best matching column.\n\
         5. For \"largest\", \"highest\", or \"most\", use `ORDER BY ... DESC LIMIT ...`.\n\
         6. For \"smallest\", \"lowest\", or \"fewest\", use `ORDER BY ... ASC LIMIT ...`.\n\
         7. Take the previous conversation into account for follow-up questions.\n\
         8. Return ONLY the raw SQL query string, without ```sql formatting.\n\n\
         ---\n\
         Conversation History:\n{history}\n\n\
         Schema Context:\n{context}\n\n\
         New User Question: {question}\n\n\
         SQL Query:",
    )
}

/// Build the result analysis prompt: answer the original question from the
/// tabular query result in one or two informative sentences.
pub fn analysis_prompt(question: &str, history: &str, sql_result: &str) -> String {
    format!(
        "You are an AI data analyst. Based on the user's original question, the \
         conversation history, and the query result data below, give an answer in \
         one or two informative, easy-to-understand sentences.\n\
         Conversation History: {history}\n\
         Original User Question: {question}\n\
         Query Result Data: {sql_result}\n\
         Analysis Answer:",
    )
}
