//! Seed the triage database from JSON exports.
//!
//! Usage:
//!   cargo run --bin seed -- rules data/rules.json
//!   cargo run --bin seed -- patients data/patients.json
//!
//! Each run replaces the whole table. Rule order in the file becomes evaluation order:
//! the first rule whose trigger matches wins, so put specific and urgent rules first.
//! The database path comes from the same configuration as the gateway (`db_path`).

use triage_core::store::{parse_patients_json, parse_rules_json};
use triage_core::{SqliteStore, TriageConfig};

fn usage() -> ! {
    eprintln!("Usage: seed <rules|patients> <file.json>");
    std::process::exit(2);
}

fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[seed] .env not loaded: {} (using system environment)", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (table, file) = match args.as_slice() {
        [table, file] => (table.as_str(), file.as_str()),
        _ => usage(),
    };

    if let Err(e) = run(table, file) {
        eprintln!("[seed] Error: {}", e);
        std::process::exit(1);
    }
}

fn run(table: &str, file: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = TriageConfig::load()?;
    let raw = std::fs::read_to_string(file)?;
    let store = SqliteStore::new(cfg.db_path())?;

    println!("[seed] Reading {} into {}", file, store.path().display());
    let count = match table {
        "rules" => store.replace_rules(&parse_rules_json(&raw)?)?,
        "patients" => store.replace_patients(&parse_patients_json(&raw)?)?,
        _ => usage(),
    };
    println!("[seed] Imported {} {} (previous rows replaced).", count, table);
    Ok(())
}
