//! Load probe: fires concurrent triage requests at a running gateway and reports
//! status counts and latency. Requests are independent, so every one should succeed or
//! fail on its own.
//! Run with the gateway up: cargo run --bin load_probe [base_url]

use reqwest::Client;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";
const CONCURRENT_CALLERS: usize = 8;
const REQUESTS_PER_CALLER: usize = 4;

const QUERIES: &[(&str, &str)] = &[
    ("My father has crushing chest pain and is sweating", "English"),
    ("I burned my hand on the stove", "English"),
    ("i have a headache", "English"),
    ("Anak saya demam tinggi sejak semalam", "Malay"),
    ("我头很晕，站不稳", "Chinese"),
    ("Small cut on my finger, bleeding a little", "English"),
];

const NRICS: &[&str] = &["", "S1234567A", "S0000000Z"];

#[tokio::main]
async fn main() {
    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    println!(
        "[PROBE] {} callers x {} requests = {} total against {}",
        CONCURRENT_CALLERS,
        REQUESTS_PER_CALLER,
        CONCURRENT_CALLERS * REQUESTS_PER_CALLER,
        base_url
    );

    let ok = Arc::new(AtomicU32::new(0));
    let failed = Arc::new(AtomicU32::new(0));
    let latencies: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let client = Client::new();

    let mut handles = Vec::new();
    for caller in 0..CONCURRENT_CALLERS {
        let client = client.clone();
        let base_url = base_url.clone();
        let ok = Arc::clone(&ok);
        let failed = Arc::clone(&failed);
        let latencies = Arc::clone(&latencies);

        handles.push(tokio::spawn(async move {
            for i in 0..REQUESTS_PER_CALLER {
                let (query, language) = QUERIES[(caller + i) % QUERIES.len()];
                let nric = NRICS[(caller * REQUESTS_PER_CALLER + i) % NRICS.len()];
                let body = json!({ "query": query, "nric": nric, "language": language });

                let start = Instant::now();
                let res = client.post(&base_url).json(&body).send().await;
                let ms = start.elapsed().as_millis() as u64;
                latencies.lock().await.push(ms);

                match res {
                    Ok(r) if r.status().is_success() => {
                        ok.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(r) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        let status = r.status();
                        let text = r.text().await.unwrap_or_default();
                        eprintln!("[PROBE] caller {} request {}: {} {}", caller, i, status, text);
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        eprintln!("[PROBE] caller {} request {}: {}", caller, i, e);
                    }
                }
            }
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let mut l = latencies.lock().await.clone();
    l.sort_unstable();
    let p50 = l.get(l.len() / 2).copied().unwrap_or(0);
    let p95 = l
        .get((l.len() * 95 / 100).min(l.len().saturating_sub(1)))
        .copied()
        .unwrap_or(0);

    println!(
        "[PROBE] ok={} failed={} p50={}ms p95={}ms",
        ok.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        p50,
        p95
    );
}
