//! Triage core library.
//! Patient lookup, language normalization, first-match rule table, prompt assembly and the
//! generative-text backend seam used by the triage gateway.

pub mod config;
pub mod error;
pub mod language;
pub mod llm;
pub mod patient;
pub mod pipeline;
pub mod prompt;
pub mod rules;
pub mod store;

pub use config::TriageConfig;
pub use error::{Result, TriageError};
pub use language::normalize_query;
pub use llm::{ChatMessage, OpenRouterGenerator, TextGenerator};
pub use patient::{lookup_patient, PatientContext, PatientRecord, PatientStore, NO_PATIENT_RECORD};
pub use pipeline::{generate_response, TriagePipeline, TriageRequest, TriageSession};
pub use prompt::{assemble_prompt, PromptInputs};
pub use rules::{match_rule, Protocol, RuleStore, TriageRule, Urgency};
pub use store::SqliteStore;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
