//! Patient lookup: optional identifier in, patient context block out.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;

/// Sentinel context used whenever no record applies.
pub const NO_PATIENT_RECORD: &str = "No patient record found.";

/// Read-only patient row. The lifecycle belongs to the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub nric: String,
    pub name: String,
    pub age: i64,
    pub sex: String,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub last_visit: Option<String>,
}

/// Exact-match record lookup by identifier.
pub trait PatientStore: Send + Sync {
    fn find_patient(&self, nric: &str) -> Result<Option<PatientRecord>>;
}

impl PatientStore for HashMap<String, PatientRecord> {
    fn find_patient(&self, nric: &str) -> Result<Option<PatientRecord>> {
        Ok(self.get(nric).cloned())
    }
}

/// What the prompt gets to know about the patient.
#[derive(Debug, Clone, PartialEq)]
pub enum PatientContext {
    Known(PatientRecord),
    Unknown,
}

impl PatientContext {
    pub fn is_known(&self) -> bool {
        matches!(self, PatientContext::Known(_))
    }
}

impl fmt::Display for PatientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatientContext::Unknown => f.write_str(NO_PATIENT_RECORD),
            PatientContext::Known(p) => {
                write!(
                    f,
                    "Patient: {}, Age: {}, Sex: {}, Conditions: {}, Medications: {}, Allergies: {}",
                    p.name, p.age, p.sex, p.conditions, p.medications, p.allergies
                )?;
                if let Some(visit) = p.last_visit.as_deref().filter(|v| !v.trim().is_empty()) {
                    write!(f, ", Last visit: {}", visit)?;
                }
                Ok(())
            }
        }
    }
}

/// Resolve the patient context for a request.
///
/// Blank identifiers never reach the store. A store error is returned as-is and is not
/// treated as "no record".
pub fn lookup_patient(store: &dyn PatientStore, nric: Option<&str>) -> Result<PatientContext> {
    let Some(id) = nric.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(PatientContext::Unknown);
    };
    Ok(match store.find_patient(id)? {
        Some(record) => PatientContext::Known(record),
        None => PatientContext::Unknown,
    })
}
