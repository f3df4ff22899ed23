//! System prompt for the triage reply.

use crate::patient::PatientContext;
use crate::rules::Protocol;

/// Legend spelled out next to the urgency code.
pub const URGENCY_LEGEND: &str = "AE = Emergency, GP = Doctor, SELF_CARE = Home";

/// Everything the assembler embeds.
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub protocol: &'a Protocol,
    pub patient: &'a PatientContext,
    pub translated_query: &'a str,
    pub original_query: &'a str,
    pub language: &'a str,
    pub emergency_number: &'a str,
}

/// Deterministic: same inputs, same prompt.
pub fn assemble_prompt(inputs: &PromptInputs<'_>) -> String {
    let p = inputs.protocol;
    let mut protocol_block = format!(
        "- Condition: {}\n\
         - Urgency Code: {} ({})\n\
         - REQUIRED ACTIONS: {}\n\
         - PROHIBITED ACTIONS: {}",
        p.topic, p.urgency, URGENCY_LEGEND, p.required_actions, p.prohibited_actions
    );
    if let Some(escalate) = p.seek_care_soon_if.as_deref() {
        protocol_block.push_str(&format!("\n- SEEK CARE SOON IF: {}", escalate));
    }

    let mut user_block = format!("\"{}\"", inputs.translated_query);
    if inputs.translated_query != inputs.original_query {
        user_block.push_str(&format!("\n(Original: \"{}\")", inputs.original_query));
    }

    format!(
        "You are an official SCDF Triage Assistant.\n\
         \n\
         CRITICAL PROTOCOL FOUND:\n\
         {protocol_block}\n\
         \n\
         PATIENT CONTEXT:\n\
         {patient}\n\
         \n\
         USER INPUT (Translated):\n\
         {user_block}\n\
         \n\
         INSTRUCTIONS:\n\
         1. Reply in {language}.\n\
         2. STRICTLY follow the \"REQUIRED ACTIONS\" above.\n\
         3. If Urgency is 'AE', tell them to call {emergency} or go to A&E immediately.\n\
         4. Mention the \"PROHIBITED ACTIONS\" if relevant (e.g., \"Do not give food\").\n\
         5. Be calm, concise, and professional!\n",
        protocol_block = protocol_block,
        patient = inputs.patient,
        user_block = user_block,
        language = inputs.language,
        emergency = inputs.emergency_number,
    )
}
