//! End-to-end pipeline over a seeded SQLite store with stand-in backends.
//!
//! Run with: `cargo test -p triage_core --test sqlite_pipeline_test`

use std::sync::{Arc, Mutex};
use triage_core::store::{parse_patients_json, parse_rules_json};
use triage_core::{
    ChatMessage, PatientContext, SqliteStore, TextGenerator, TriageConfig, TriagePipeline,
    TriageRequest, Urgency,
};

const RULES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/rules.sample.json"));
const PATIENTS: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/patients.sample.json"));

struct Echo {
    reply: String,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Echo {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl TextGenerator for Echo {
    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        _max_tokens: Option<u32>,
    ) -> triage_core::Result<String> {
        self.seen.lock().unwrap().push(messages);
        Ok(self.reply.clone())
    }
}

fn seeded_store() -> (tempfile::TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = SqliteStore::new(dir.path().join("triage.db")).expect("open store");
    store
        .replace_rules(&parse_rules_json(RULES).expect("parse rules"))
        .expect("seed rules");
    store
        .replace_patients(&parse_patients_json(PATIENTS).expect("parse patients"))
        .expect("seed patients");
    (dir, Arc::new(store))
}

fn pipeline(store: Arc<SqliteStore>, translator: Arc<Echo>, generator: Arc<Echo>) -> TriagePipeline {
    TriagePipeline::new(
        store.clone(),
        store,
        translator,
        generator,
        &TriageConfig::default(),
    )
}

fn req(query: &str, nric: &str, language: &str) -> TriageRequest {
    TriageRequest {
        query: query.to_string(),
        nric: Some(nric.to_string()),
        language: Some(language.to_string()),
    }
}

#[tokio::test]
async fn known_patient_with_chest_pain() {
    let (_dir, store) = seeded_store();
    let generator = Echo::new("Call 995 now.");
    let p = pipeline(store, Echo::new("unused"), generator.clone());

    let session = p
        .run(&req("My father has CRUSHING CHEST pain", "S1234567A", "English"))
        .await
        .expect("pipeline run");

    assert_eq!(session.response, "Call 995 now.");
    assert_eq!(session.protocol.topic, "Chest Pain");
    assert_eq!(session.protocol.urgency, Urgency::Emergency);
    match &session.patient {
        PatientContext::Known(p) => assert_eq!(p.name, "Tan Ah Kow"),
        PatientContext::Unknown => panic!("expected a patient record"),
    }
    let seen = generator.seen.lock().unwrap();
    assert!(seen[0][0].content.contains("Do not let the person walk around."));
    assert!(seen[0][0].content.contains("Last visit: 2024-02-14"));
}

#[tokio::test]
async fn storage_order_decides_between_matching_rules() {
    let (_dir, store) = seeded_store();
    let p = pipeline(store, Echo::new("unused"), Echo::new("ok"));

    // "burn" (Burns, 3rd) and "fever" (Fever, 4th) both match; Burns is stored first
    let session = p
        .run(&req("fever after I burned my arm", "", "English"))
        .await
        .expect("pipeline run");
    assert_eq!(session.protocol.topic, "Burns");
    assert_eq!(session.protocol.urgency, Urgency::Doctor);
    assert_eq!(
        session.protocol.seek_care_soon_if.as_deref(),
        Some("blisters larger than a coin or signs of infection appear")
    );
}

#[tokio::test]
async fn unknown_patient_and_unmatched_query_use_defaults() {
    let (_dir, store) = seeded_store();
    let p = pipeline(store, Echo::new("unused"), Echo::new("ok"));

    let session = p
        .run(&req("i have a headache", "S0000000Z", "English"))
        .await
        .expect("pipeline run");
    assert_eq!(session.patient, PatientContext::Unknown);
    assert!(session.protocol.is_default());
    assert_eq!(session.protocol.topic, "General Assessment");
}

#[tokio::test]
async fn translated_query_is_matched_against_the_table() {
    let (_dir, store) = seeded_store();
    let translator = Echo::new("My son has had a high temperature since last night");
    let p = pipeline(store, translator.clone(), Echo::new("ok"));

    let session = p
        .run(&req("Anak saya panas badan sejak semalam", "", "Malay"))
        .await
        .expect("pipeline run");
    assert_eq!(session.protocol.topic, "Fever");
    assert_eq!(translator.seen.lock().unwrap().len(), 1);
    assert!(session.system_prompt.contains("1. Reply in Malay."));
}
