use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
    routing::post,
};
use http_body_util::BodyExt;
use misinfo_detector::{AppConfig, AppState, build_router, db};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Router plus the state behind it; keeps the scratch database alive.
pub struct TestApp {
    pub router: Router,
    #[allow(dead_code)]
    pub state: AppState,
    _dir: TempDir,
}

#[allow(dead_code)]
pub async fn spawn_app() -> TestApp {
    spawn_app_with_llm("http://127.0.0.1:9/api/v1").await
}

#[allow(dead_code)]
pub async fn spawn_app_with_llm(llm_base_url: &str) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("test.db").display());

    let mut config = AppConfig::for_database(&url);
    config.llm.base_url = llm_base_url.to_string();

    let pool = db::connect(&url).await.expect("Failed to open test database");
    let state = AppState::from_parts(pool, &config);

    TestApp {
        router: build_router(state.clone()),
        state,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    /// Register a user and return `(token, user_id)`.
    pub async fn register(&self, username: &str, password: &str) -> (String, i64) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_i64().unwrap(),
        )
    }

    #[allow(dead_code)]
    pub async fn save_settings(&self, token: &str, api_key: &str, model: &str) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/settings",
                Some(token),
                Some(json!({ "apiKey": api_key, "model": model })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "save settings failed: {body}");
    }
}

/// One call received by the fake LLM endpoint.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub authorization: Option<String>,
    pub body: Value,
}

#[allow(dead_code)]
pub type Captured = Arc<Mutex<Vec<CapturedCall>>>;

/// Serve a fake OpenRouter on an ephemeral port that always answers with
/// `status` and `body`. Returns the base URL and the calls it receives.
#[allow(dead_code)]
pub async fn fake_llm(status: StatusCode, body: Value) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    let app = Router::new().route(
        "/api/v1/chat/completions",
        post(move |headers: HeaderMap, Json(request): Json<Value>| {
            let sink = sink.clone();
            let body = body.clone();
            async move {
                sink.lock().unwrap().push(CapturedCall {
                    authorization: headers
                        .get(header::AUTHORIZATION)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string),
                    body: request,
                });
                (status, Json(body))
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/api/v1"), captured)
}

/// Chat-completions envelope whose assistant message is `content`.
#[allow(dead_code)]
pub fn completion(content: &str) -> Value {
    json!({
        "id": "gen-test",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content }
        }],
        "usage": { "prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160 }
    })
}

#[allow(dead_code)]
pub fn synthetic_verdict() -> Value {
    json!({
        "isAIGenerated": true,
        "confidenceScore": 92,
        "riskLevel": "high",
        "indicators": ["repetitive phrasing"],
        "factCheckSuggestion": "Check source",
        "verdict": "Likely synthetic"
    })
}
