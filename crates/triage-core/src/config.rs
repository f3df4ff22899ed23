//! Gateway configuration.
//!
//! Precedence: env `TRIAGE_CONFIG` path > `config/triage.toml` > defaults, then
//! `TRIAGE__*` environment overrides on top.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | bind_addr | 127.0.0.1:8787 | Listener address for the gateway. |
//! | db_path | ./data/triage.db | SQLite file holding `patients` and `triage_rules`. |
//! | working_language | English | Language that needs no translation. |
//! | emergency_number | 995 | Number the assistant tells AE cases to call. |
//! | api_base | https://openrouter.ai/api/v1 | OpenAI-compatible chat completions base URL. |
//! | api_key | (OPENROUTER_API_KEY) | Bearer key for the backend. |
//! | generation_model | meta-llama/llama-3.1-8b-instruct | Model writing the triage reply. |
//! | translation_model | aisingapore/gemma-sea-lion-v4-27b-it | Model normalizing non-working-language input. |
//! | max_tokens | 1024 | Output cap for the triage reply. |
//! | request_timeout_secs | 60 | HTTP client timeout for backend calls. |

use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

pub const DEFAULT_CONFIG_PATH: &str = "config/triage";

#[derive(Debug, Clone, Deserialize)]
pub struct TriageConfig {
    pub bind_addr: String,
    pub db_path: String,
    pub working_language: String,
    pub emergency_number: String,
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub generation_model: String,
    pub translation_model: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".to_string(),
            db_path: "./data/triage.db".to_string(),
            working_language: "English".to_string(),
            emergency_number: "995".to_string(),
            api_base: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            generation_model: "meta-llama/llama-3.1-8b-instruct".to_string(),
            translation_model: "aisingapore/gemma-sea-lion-v4-27b-it".to_string(),
            max_tokens: 1024,
            request_timeout_secs: 60,
        }
    }
}

impl TriageConfig {
    /// Load from the file named by `TRIAGE_CONFIG` (or the default path) plus environment.
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("TRIAGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&config_path)
    }

    /// Load from an explicit path. A missing file is not an error; defaults apply.
    pub fn load_from(config_path: &str) -> Result<Self> {
        let d = Self::default();
        let builder = config::Config::builder()
            .set_default("bind_addr", d.bind_addr)?
            .set_default("db_path", d.db_path)?
            .set_default("working_language", d.working_language)?
            .set_default("emergency_number", d.emergency_number)?
            .set_default("api_base", d.api_base)?
            .set_default("generation_model", d.generation_model)?
            .set_default("translation_model", d.translation_model)?
            .set_default("max_tokens", i64::from(d.max_tokens))?
            .set_default("request_timeout_secs", d.request_timeout_secs as i64)?;

        let builder = builder.add_source(config::File::with_name(config_path).required(false));

        let built = builder
            .add_source(config::Environment::with_prefix("TRIAGE").separator("__"))
            .build()?;

        let mut cfg: TriageConfig = built.try_deserialize()?;
        if cfg.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            cfg.api_key = env_opt_string("OPENROUTER_API_KEY");
        }
        Ok(cfg)
    }

    pub fn db_path(&self) -> &Path {
        Path::new(&self.db_path)
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
