//! Language normalization: bring the query into the working language before rule matching.

use crate::llm::{ChatMessage, TextGenerator};

pub fn translation_instruction(working_language: &str) -> String {
    format!(
        "You are a translator. Translate this medical text to {}. Output ONLY the translation.",
        working_language
    )
}

pub fn is_working_language(language: &str, working_language: &str) -> bool {
    language.trim().eq_ignore_ascii_case(working_language.trim())
}

/// Returns the query in the working language.
///
/// Never fails: an empty reply or a backend error falls back to the original query so
/// translation trouble cannot block triage.
pub async fn normalize_query(
    translator: &dyn TextGenerator,
    query: &str,
    language: &str,
    working_language: &str,
) -> String {
    if is_working_language(language, working_language) {
        return query.to_string();
    }

    let messages = vec![
        ChatMessage::system(translation_instruction(working_language)),
        ChatMessage::user(query),
    ];
    match translator.generate(messages, None).await {
        Ok(text) if !text.trim().is_empty() => {
            tracing::debug!(language = %language, "query translated");
            text
        }
        Ok(_) => {
            tracing::warn!(language = %language, "translation empty, using original query");
            query.to_string()
        }
        Err(e) => {
            tracing::warn!(language = %language, error = %e, "translation failed, using original query");
            query.to_string()
        }
    }
}
