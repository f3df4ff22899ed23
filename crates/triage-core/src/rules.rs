//! Triage rules and the first-match rule matcher.
//!
//! Rules are evaluated strictly in storage order and the first rule with any trigger
//! phrase contained in the query wins. There is no scoring: a general rule listed ahead
//! of a specific one shadows it, so rule tables must list the more specific or more
//! urgent protocols first.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Delimiter between trigger phrases in `trigger_any`.
pub const TRIGGER_DELIMITER: char = ';';

pub const DEFAULT_TOPIC: &str = "General Assessment";
pub const DEFAULT_ACTIONS: &str = "Assess symptoms carefully.";

/// Destination / urgency code carried by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Urgency {
    /// `AE`: call emergency services or go to A&E.
    Emergency,
    /// `GP`: see a doctor.
    Doctor,
    /// `SELF_CARE`: manage at home.
    SelfCare,
    /// No rule matched.
    Standard,
    /// Any other code in the rule table, kept verbatim.
    Other(String),
}

impl Urgency {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "AE" => Urgency::Emergency,
            "GP" => Urgency::Doctor,
            "SELF_CARE" => Urgency::SelfCare,
            "Standard" => Urgency::Standard,
            other => Urgency::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Urgency::Emergency => "AE",
            Urgency::Doctor => "GP",
            Urgency::SelfCare => "SELF_CARE",
            Urgency::Standard => "Standard",
            Urgency::Other(code) => code,
        }
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, Urgency::Emergency)
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One row of the `triage_rules` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageRule {
    #[serde(default)]
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub category: String,
    pub destination: String,
    pub trigger_any: String,
    #[serde(default)]
    pub red_flags_any: String,
    #[serde(default)]
    pub immediate_actions: String,
    #[serde(default)]
    pub do_not: String,
    #[serde(default)]
    pub seek_care_soon_if: String,
}

impl TriageRule {
    /// Trimmed, lowercased, non-empty trigger phrases.
    pub fn triggers(&self) -> impl Iterator<Item = String> + '_ {
        self.trigger_any
            .split(TRIGGER_DELIMITER)
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
    }

    /// True when any trigger phrase occurs in `query_lower` (already lowercased).
    fn matches(&self, query_lower: &str) -> bool {
        self.triggers().any(|t| query_lower.contains(&t))
    }
}

/// Full ordered rule set, loaded fresh for every request.
pub trait RuleStore: Send + Sync {
    fn load_rules(&self) -> Result<Vec<TriageRule>>;
}

impl RuleStore for Vec<TriageRule> {
    fn load_rules(&self) -> Result<Vec<TriageRule>> {
        Ok(self.clone())
    }
}

/// The protocol handed to the prompt assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Protocol {
    pub topic: String,
    pub urgency: Urgency,
    pub required_actions: String,
    pub prohibited_actions: String,
    pub seek_care_soon_if: Option<String>,
    /// Id of the rule that produced this protocol; `None` for the default.
    pub rule_id: Option<String>,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            urgency: Urgency::Standard,
            required_actions: DEFAULT_ACTIONS.to_string(),
            prohibited_actions: String::new(),
            seek_care_soon_if: None,
            rule_id: None,
        }
    }
}

impl Protocol {
    pub fn is_default(&self) -> bool {
        self.rule_id.is_none()
    }
}

impl From<&TriageRule> for Protocol {
    fn from(rule: &TriageRule) -> Self {
        Self {
            topic: rule.topic.clone(),
            urgency: Urgency::from_code(&rule.destination),
            required_actions: rule.immediate_actions.clone(),
            prohibited_actions: rule.do_not.clone(),
            seek_care_soon_if: Some(rule.seek_care_soon_if.trim().to_string())
                .filter(|s| !s.is_empty()),
            rule_id: Some(rule.id.clone()),
        }
    }
}

/// Index of the first rule whose triggers occur in `query`, if any.
pub fn first_match(query: &str, rules: &[TriageRule]) -> Option<usize> {
    let query_lower = query.to_lowercase();
    rules.iter().position(|r| r.matches(&query_lower))
}

/// Protocol of the first matching rule, or the General Assessment default.
pub fn match_rule(query: &str, rules: &[TriageRule]) -> Protocol {
    first_match(query, rules)
        .map(|i| Protocol::from(&rules[i]))
        .unwrap_or_default()
}
