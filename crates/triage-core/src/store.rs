//! SQLite-backed patient and rule tables.
//!
//! One connection per call, no caching: every request sees the tables as they are on disk.
//! `triage_rules` is read in `rowid` order, which is the order rows were imported in.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Result, TriageError};
use crate::patient::{PatientRecord, PatientStore};
use crate::rules::{RuleStore, TriageRule};

#[derive(Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (creating the file and tables if needed).
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let this = Self {
            db_path: db_path.into(),
        };
        this.init()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Ok(Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?)
    }

    fn init(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS patients (
                nric TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                age INTEGER NOT NULL,
                sex TEXT NOT NULL,
                conditions TEXT NOT NULL DEFAULT '',
                medications TEXT NOT NULL DEFAULT '',
                allergies TEXT NOT NULL DEFAULT '',
                last_visit TEXT NULL
            );

            CREATE TABLE IF NOT EXISTS triage_rules (
                id TEXT NOT NULL DEFAULT '',
                topic TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT '',
                destination TEXT NOT NULL,
                trigger_any TEXT NOT NULL DEFAULT '',
                red_flags_any TEXT NOT NULL DEFAULT '',
                immediate_actions TEXT NOT NULL DEFAULT '',
                do_not TEXT NOT NULL DEFAULT '',
                seek_care_soon_if TEXT NOT NULL DEFAULT ''
            );
            "#,
        )?;
        Ok(())
    }

    /// Replace every rule with `rules`, keeping their order. Returns the number written.
    pub fn replace_rules(&self, rules: &[TriageRule]) -> Result<usize> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM triage_rules", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO triage_rules (id, topic, category, destination, trigger_any, red_flags_any, immediate_actions, do_not, seek_care_soon_if)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for r in rules {
                stmt.execute(params![
                    r.id.trim(),
                    r.topic.trim(),
                    r.category.trim(),
                    r.destination.trim(),
                    r.trigger_any.trim(),
                    r.red_flags_any.trim(),
                    r.immediate_actions.trim(),
                    r.do_not.trim(),
                    r.seek_care_soon_if.trim(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(rules.len())
    }

    /// Replace every patient with `patients`. Returns the number written.
    pub fn replace_patients(&self, patients: &[PatientRecord]) -> Result<usize> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM patients", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO patients (nric, name, age, sex, conditions, medications, allergies, last_visit)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for p in patients {
                stmt.execute(params![
                    p.nric.trim(),
                    p.name.trim(),
                    p.age,
                    p.sex.trim(),
                    p.conditions,
                    p.medications,
                    p.allergies,
                    p.last_visit,
                ])?;
            }
        }
        tx.commit()?;
        Ok(patients.len())
    }
}

impl PatientStore for SqliteStore {
    fn find_patient(&self, nric: &str) -> Result<Option<PatientRecord>> {
        let conn = self.open()?;
        let row = conn
            .query_row(
                "SELECT nric, name, age, sex, conditions, medications, allergies, last_visit
                 FROM patients WHERE nric = ?1",
                params![nric],
                |r| {
                    Ok(PatientRecord {
                        nric: r.get(0)?,
                        name: r.get(1)?,
                        age: r.get(2)?,
                        sex: r.get(3)?,
                        conditions: r.get(4)?,
                        medications: r.get(5)?,
                        allergies: r.get(6)?,
                        last_visit: r.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

impl RuleStore for SqliteStore {
    fn load_rules(&self) -> Result<Vec<TriageRule>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, topic, category, destination, trigger_any, red_flags_any, immediate_actions, do_not, seek_care_soon_if
             FROM triage_rules ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok(TriageRule {
                id: r.get(0)?,
                topic: r.get(1)?,
                category: r.get(2)?,
                destination: r.get(3)?,
                trigger_any: r.get(4)?,
                red_flags_any: r.get(5)?,
                immediate_actions: r.get(6)?,
                do_not: r.get(7)?,
                seek_care_soon_if: r.get(8)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Patient row as exported from the registry: either `name` or `first_name` + `last_name`.
#[derive(Debug, Deserialize)]
struct PatientSeed {
    #[serde(alias = "patient_nric")]
    nric: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "patient_first_name")]
    first_name: Option<String>,
    #[serde(default, alias = "patient_last_name")]
    last_name: Option<String>,
    age: i64,
    sex: String,
    #[serde(default)]
    conditions: String,
    #[serde(default)]
    medications: String,
    #[serde(default)]
    allergies: String,
    #[serde(default, alias = "last_visit_date")]
    last_visit: Option<String>,
}

impl PatientSeed {
    fn into_record(self) -> Result<PatientRecord> {
        let name = match (self.name, self.first_name, self.last_name) {
            (Some(n), _, _) if !n.trim().is_empty() => n.trim().to_string(),
            (_, first, last) => {
                let joined = format!(
                    "{} {}",
                    first.unwrap_or_default().trim(),
                    last.unwrap_or_default().trim()
                );
                joined.trim().to_string()
            }
        };
        let nric = self.nric.trim().to_string();
        if nric.is_empty() {
            return Err(TriageError::Seed("patient without nric".to_string()));
        }
        if name.is_empty() {
            return Err(TriageError::Seed(format!("patient {} has no name", nric)));
        }
        Ok(PatientRecord {
            nric,
            name,
            age: self.age,
            sex: self.sex,
            conditions: self.conditions,
            medications: self.medications,
            allergies: self.allergies,
            last_visit: self.last_visit.filter(|v| !v.trim().is_empty()),
        })
    }
}

/// Parse a JSON array of rules. Rules without a topic or destination are rejected.
pub fn parse_rules_json(raw: &str) -> Result<Vec<TriageRule>> {
    let rules: Vec<TriageRule> =
        serde_json::from_str(raw).map_err(|e| TriageError::Seed(e.to_string()))?;
    for (i, r) in rules.iter().enumerate() {
        if r.topic.trim().is_empty() || r.destination.trim().is_empty() {
            return Err(TriageError::Seed(format!(
                "rule #{} is missing topic or destination",
                i + 1
            )));
        }
        if r.triggers().next().is_none() {
            tracing::warn!(rule = i + 1, topic = %r.topic, "rule has no trigger phrases and can never match");
        }
    }
    Ok(rules)
}

/// Parse a JSON array of patients.
pub fn parse_patients_json(raw: &str) -> Result<Vec<PatientRecord>> {
    let seeds: Vec<PatientSeed> =
        serde_json::from_str(raw).map_err(|e| TriageError::Seed(e.to_string()))?;
    seeds.into_iter().map(PatientSeed::into_record).collect()
}
