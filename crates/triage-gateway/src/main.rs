//! Triage Gateway: chat UI on `GET /`, triage pipeline on `POST /`.
//! Every request is independent: patient lookup, translation, rule match and generation
//! run in sequence and nothing is remembered afterwards.

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_core::{
    OpenRouterGenerator, SqliteStore, TriageConfig, TriageError, TriagePipeline, TriageRequest,
};

struct AppState {
    pipeline: TriagePipeline,
}

#[derive(Serialize)]
struct TriageReply {
    response: String,
}

#[derive(Serialize)]
struct ErrorReply {
    error: String,
}

/// Any pipeline failure. Always answered with 500 and `{"error": ...}`.
#[derive(Debug)]
struct ApiError(TriageError);

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        ApiError(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError(TriageError::MalformedRequest(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "triage request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorReply {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[triage-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = TriageConfig::load()?;
    if cfg.api_key.is_none() {
        tracing::warn!("no backend API key configured (TRIAGE__API_KEY or OPENROUTER_API_KEY); backend calls will be unauthenticated");
    }

    let store = Arc::new(SqliteStore::new(cfg.db_path())?);
    let pipeline = TriagePipeline::new(
        store.clone(),
        store,
        Arc::new(OpenRouterGenerator::for_translation(&cfg)?),
        Arc::new(OpenRouterGenerator::for_generation(&cfg)?),
        &cfg,
    );
    let app = router(Arc::new(AppState { pipeline }));

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr.as_str()).await?;
    tracing::info!(
        addr = %cfg.bind_addr,
        db = %cfg.db_path,
        working_language = %cfg.working_language,
        version = triage_core::version(),
        "triage gateway listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/",
            get(serve_chat_ui)
                // axum answers HEAD with the GET handler unless HEAD has its own
                .head(method_not_allowed)
                .post(triage_handler)
                .fallback(method_not_allowed),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn(log_request))
}

async fn log_request(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    tracing::info!(%peer, %method, %path, status = response.status().as_u16(), "request");
    response
}

async fn health() -> &'static str {
    "OK"
}

/// Static chat UI compiled into the binary.
async fn serve_chat_ui() -> Html<&'static str> {
    const INDEX: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/index.html"));
    Html(INDEX)
}

/// POST /: parse the body by hand so malformed JSON is reported like every other failure.
async fn triage_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TriageReply>, ApiError> {
    let req: TriageRequest = serde_json::from_slice(&body)?;
    tracing::debug!(
        query_len = req.query.len(),
        has_nric = req.nric.as_deref().is_some_and(|n| !n.trim().is_empty()),
        "triage request"
    );
    let session = state.pipeline.run(&req).await?;
    Ok(Json(TriageReply {
        response: session.response,
    }))
}

async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use triage_core::{ChatMessage, PatientRecord, TextGenerator, TriageRule};

    struct Canned {
        reply: Result<String, u16>,
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl TextGenerator for Canned {
        async fn generate(
            &self,
            messages: Vec<ChatMessage>,
            _max_tokens: Option<u32>,
        ) -> triage_core::Result<String> {
            self.prompts.lock().unwrap().push(messages);
            self.reply.clone().map_err(|status| TriageError::BackendStatus {
                status,
                body: "backend down".into(),
            })
        }
    }

    fn app_with(generator: Arc<Canned>) -> Router {
        let rules = vec![TriageRule {
            id: "cp-01".into(),
            topic: "Chest Pain".into(),
            destination: "AE".into(),
            trigger_any: "chest pain;crushing chest".into(),
            immediate_actions: "Call 995 immediately.".into(),
            do_not: "Do not drive yourself to hospital.".into(),
            ..Default::default()
        }];
        let mut patients = HashMap::new();
        patients.insert(
            "S1234567A".to_string(),
            PatientRecord {
                nric: "S1234567A".into(),
                name: "Tan Ah Kow".into(),
                age: 67,
                sex: "M".into(),
                conditions: "Hypertension".into(),
                medications: "Amlodipine".into(),
                allergies: "Penicillin".into(),
                last_visit: None,
            },
        );
        let pipeline = TriagePipeline::new(
            Arc::new(patients),
            Arc::new(rules),
            Canned::ok("chest pain"),
            generator,
            &TriageConfig::default(),
        );
        router(Arc::new(AppState { pipeline }))
    }

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn get_serves_chat_ui() {
        let app = app_with(Canned::ok("unused"));
        let req = Request::builder().method("GET").uri("/").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let ct = res.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap().to_string();
        assert!(ct.starts_with("text/html"));
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("id=\"language\""));
        assert!(html.contains("id=\"nric\""));
        assert!(html.contains("id=\"messages\""));
    }

    #[tokio::test]
    async fn post_runs_pipeline_and_returns_response() {
        let generator = Canned::ok("Call 995 now and stay seated.");
        let app = app_with(generator.clone());
        let res = app
            .oneshot(post(r#"{"query":"chest pain","nric":"S1234567A","language":"English"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["response"], "Call 995 now and stay seated.");
        assert!(json.get("error").is_none());

        let prompts = generator.prompts.lock().unwrap();
        let system = &prompts[0][0].content;
        assert!(system.contains("- Condition: Chest Pain"));
        assert!(system.contains("- REQUIRED ACTIONS: Call 995 immediately."));
        assert!(system.contains("Patient: Tan Ah Kow"));
        assert_eq!(prompts[0][1], ChatMessage::user("chest pain"));
    }

    #[tokio::test]
    async fn malformed_json_is_500_with_parse_error() {
        let app = app_with(Canned::ok("unused"));
        let res = app.oneshot(post("{\"query\": ")).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        let msg = json["error"].as_str().unwrap();
        assert!(msg.contains("EOF"), "unexpected message: {}", msg);
    }

    #[tokio::test]
    async fn missing_query_field_is_500() {
        let app = app_with(Canned::ok("unused"));
        let res = app.oneshot(post(r#"{"language":"English"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert!(json["error"].as_str().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn backend_failure_is_500_with_error() {
        let app = app_with(Canned::failing(502));
        let res = app
            .oneshot(post(r#"{"query":"i have a headache","language":"English"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert!(json["error"].as_str().unwrap().contains("502"));
        assert!(json.get("response").is_none());
    }

    #[tokio::test]
    async fn other_methods_are_405_plain_text() {
        for method in ["PUT", "DELETE", "PATCH"] {
            let app = app_with(Canned::ok("unused"));
            let req = Request::builder().method(method).uri("/").body(Body::empty()).unwrap();
            let res = app.oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&bytes[..], b"Method not allowed");
        }
    }

    #[tokio::test]
    async fn head_is_405_not_the_chat_ui() {
        let app = app_with(Canned::ok("unused"));
        let req = Request::builder().method("HEAD").uri("/").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        let ct = res.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap().to_string();
        assert!(ct.starts_with("text/plain"), "unexpected content type: {}", ct);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = app_with(Canned::ok("unused"));
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
