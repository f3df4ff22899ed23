//! The triage pipeline: patient lookup, normalization, rule matching, prompt assembly,
//! generation. Stages run one after another; nothing is kept between requests.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::TriageConfig;
use crate::error::Result;
use crate::language::normalize_query;
use crate::llm::{ChatMessage, TextGenerator};
use crate::patient::{lookup_patient, PatientContext, PatientStore};
use crate::prompt::{assemble_prompt, PromptInputs};
use crate::rules::{match_rule, Protocol, RuleStore};

/// Body of `POST /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRequest {
    pub query: String,
    #[serde(default)]
    pub nric: Option<String>,
    /// Missing language means the working language.
    #[serde(default)]
    pub language: Option<String>,
}

/// Per-request state. Dropped when the response is sent.
#[derive(Debug, Clone)]
pub struct TriageSession {
    pub patient: PatientContext,
    pub normalized_query: String,
    pub protocol: Protocol,
    pub system_prompt: String,
    pub response: String,
}

/// Invoke the generation backend with the assembled instruction and the user's own words.
pub async fn generate_response(
    generator: &dyn TextGenerator,
    system_prompt: &str,
    original_query: &str,
    max_tokens: u32,
) -> Result<String> {
    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(original_query),
    ];
    generator.generate(messages, Some(max_tokens)).await
}

pub struct TriagePipeline {
    patients: Arc<dyn PatientStore>,
    rules: Arc<dyn RuleStore>,
    translator: Arc<dyn TextGenerator>,
    generator: Arc<dyn TextGenerator>,
    working_language: String,
    emergency_number: String,
    max_tokens: u32,
}

impl TriagePipeline {
    pub fn new(
        patients: Arc<dyn PatientStore>,
        rules: Arc<dyn RuleStore>,
        translator: Arc<dyn TextGenerator>,
        generator: Arc<dyn TextGenerator>,
        cfg: &TriageConfig,
    ) -> Self {
        Self {
            patients,
            rules,
            translator,
            generator,
            working_language: cfg.working_language.clone(),
            emergency_number: cfg.emergency_number.clone(),
            max_tokens: cfg.max_tokens,
        }
    }

    pub fn working_language(&self) -> &str {
        &self.working_language
    }

    /// Run one request end to end.
    pub async fn run(&self, req: &TriageRequest) -> Result<TriageSession> {
        let language = req
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.working_language.as_str());

        let patient = lookup_patient(self.patients.as_ref(), req.nric.as_deref())?;

        let normalized_query = normalize_query(
            self.translator.as_ref(),
            &req.query,
            language,
            &self.working_language,
        )
        .await;

        let rules = self.rules.load_rules()?;
        let protocol = match_rule(&normalized_query, &rules);
        tracing::info!(
            topic = %protocol.topic,
            urgency = %protocol.urgency,
            rule_id = protocol.rule_id.as_deref().unwrap_or("-"),
            patient_known = patient.is_known(),
            rules = rules.len(),
            "protocol matched"
        );

        let system_prompt = assemble_prompt(&PromptInputs {
            protocol: &protocol,
            patient: &patient,
            translated_query: &normalized_query,
            original_query: &req.query,
            language,
            emergency_number: &self.emergency_number,
        });

        let response = generate_response(
            self.generator.as_ref(),
            &system_prompt,
            &req.query,
            self.max_tokens,
        )
        .await?;

        Ok(TriageSession {
            patient,
            normalized_query,
            protocol,
            system_prompt,
            response,
        })
    }
}
