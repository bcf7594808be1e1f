use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tagline::config::Config;
use tagline::gemini::{GeminiClient, GenerativeApi, MediaRef, Usage, FILE_POLL_ATTEMPTS};

const API_KEY: &str = "test-key";
const MODEL: &str = "gemini-test";

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Recorded {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Stand-in for the Gemini REST API: generateContent, the resumable upload
/// pair and the file status endpoint.
struct FakeServer {
    base: String,
    generate_status: StatusCode,
    generate_body: Value,
    /// File states handed out by the upload response and each status check.
    states: Mutex<VecDeque<&'static str>>,
    /// State reported once `states` runs out.
    final_state: &'static str,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeServer {
    fn next_file(&self) -> Value {
        let state = self
            .states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.final_state);
        json!({
            "name": "files/abc",
            "uri": format!("{}/v1beta/files/abc", self.base),
            "mimeType": "video/mp4",
            "state": state
        })
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    fn requests_to(&self, method: Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

async fn handle(
    State(fake): State<Arc<FakeServer>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    fake.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        headers,
        body,
    });

    if method == Method::POST && path.ends_with(":generateContent") {
        return (fake.generate_status, Json(fake.generate_body.clone())).into_response();
    }
    match (method, path.as_str()) {
        (Method::POST, "/upload/v1beta/files") => (
            StatusCode::OK,
            [("x-goog-upload-url", format!("{}/upload-session/1", fake.base))],
            "",
        )
            .into_response(),
        (Method::POST, "/upload-session/1") => Json(json!({ "file": fake.next_file() })).into_response(),
        (Method::GET, "/v1beta/files/abc") => Json(fake.next_file()).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_fake(
    generate_status: StatusCode,
    generate_body: Value,
    states: &[&'static str],
    final_state: &'static str,
) -> Arc<FakeServer> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let fake = Arc::new(FakeServer {
        base,
        generate_status,
        generate_body,
        states: Mutex::new(states.iter().copied().collect()),
        final_state,
        requests: Mutex::new(Vec::new()),
    });
    let app = Router::new().fallback(handle).with_state(fake.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    fake
}

fn client_for(fake: &FakeServer) -> GeminiClient {
    let base = format!("{}/", fake.base);
    let config = Config::from_lookup(|key: &str| match key {
        "GEMINI_API_KEY" => Some(API_KEY.to_string()),
        "GEMINI_API_BASE" => Some(base.clone()),
        "GEMINI_MODEL" => Some(MODEL.to_string()),
        _ => None,
    })
    .unwrap();
    GeminiClient::new(&config).with_poll_interval(Duration::from_millis(5))
}

fn caption_response() -> Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": "Beach day\n" }, { "text": "#sun #sea" }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 120,
            "candidatesTokenCount": 14,
            "totalTokenCount": 134
        }
    })
}

fn write_clip() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    std::fs::write(&path, b"fake video bytes").unwrap();
    (dir, path)
}

#[tokio::test]
async fn generate_from_url_sends_key_and_reads_usage() {
    let fake = spawn_fake(StatusCode::OK, caption_response(), &[], "ACTIVE").await;
    let client = client_for(&fake);

    let generation = client
        .generate_from_media("Describe this", &MediaRef::Url("https://cdn.test/a.jpg".into()))
        .await
        .unwrap();

    assert_eq!(generation.text, "Beach day\n#sun #sea");
    assert_eq!(
        generation.usage,
        Some(Usage {
            prompt_tokens: Some(120),
            candidate_tokens: Some(14),
            total_tokens: Some(134),
        })
    );

    let calls = fake.requests();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.method, Method::POST);
    assert_eq!(call.path, format!("/v1beta/models/{}:generateContent", MODEL));
    assert_eq!(call.header("x-goog-api-key"), Some(API_KEY));
    assert_eq!(
        call.json(),
        json!({ "contents": [{ "parts": [
            { "text": "Describe this" },
            { "text": "https://cdn.test/a.jpg" }
        ] }] })
    );
}

#[tokio::test]
async fn generate_text_sends_a_single_text_part() {
    let fake = spawn_fake(StatusCode::OK, caption_response(), &[], "ACTIVE").await;
    let client = client_for(&fake);

    let text = client.generate_text("Exact match for 'beach'").await.unwrap();

    assert_eq!(text, "Beach day\n#sun #sea");
    let body = fake.requests()[0].json();
    assert_eq!(body["contents"][0]["parts"], json!([{ "text": "Exact match for 'beach'" }]));
}

#[tokio::test]
async fn error_status_carries_code_and_body() {
    let fake = spawn_fake(
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "message": "Resource has been exhausted" } }),
        &[],
        "ACTIVE",
    )
    .await;
    let client = client_for(&fake);

    let err = client.generate_text("hello").await.unwrap_err();

    let message = format!("{:#}", err);
    assert!(message.contains("429"), "{message}");
    assert!(message.contains("Resource has been exhausted"), "{message}");
}

#[tokio::test]
async fn upload_runs_resumable_protocol_and_waits_for_active() {
    let fake = spawn_fake(
        StatusCode::OK,
        caption_response(),
        &["PROCESSING", "PROCESSING"],
        "ACTIVE",
    )
    .await;
    let client = client_for(&fake);
    let (_dir, path) = write_clip();

    let media = client.upload_file(&path).await.unwrap();

    let uri = format!("{}/v1beta/files/abc", fake.base);
    assert_eq!(
        media,
        MediaRef::Uploaded {
            uri: uri.clone(),
            mime_type: "video/mp4".to_string(),
        }
    );

    let start = &fake.requests_to(Method::POST, "/upload/v1beta/files")[0];
    assert_eq!(start.header("x-goog-api-key"), Some(API_KEY));
    assert_eq!(start.header("x-goog-upload-protocol"), Some("resumable"));
    assert_eq!(start.header("x-goog-upload-command"), Some("start"));
    assert_eq!(start.header("x-goog-upload-header-content-length"), Some("16"));
    assert_eq!(start.header("x-goog-upload-header-content-type"), Some("video/mp4"));
    assert_eq!(start.json(), json!({ "file": { "display_name": "clip.mp4" } }));

    let finalize = &fake.requests_to(Method::POST, "/upload-session/1")[0];
    assert_eq!(finalize.header("x-goog-upload-command"), Some("upload, finalize"));
    assert_eq!(finalize.header("x-goog-upload-offset"), Some("0"));
    assert_eq!(&finalize.body[..], b"fake video bytes");

    // Upload answered PROCESSING, first check PROCESSING, second ACTIVE.
    let checks = fake.requests_to(Method::GET, "/v1beta/files/abc");
    assert_eq!(checks.len(), 2);
    assert!(checks.iter().all(|c| c.header("x-goog-api-key") == Some(API_KEY)));

    client.generate_from_media("Describe this", &media).await.unwrap();
    let generate = fake
        .requests()
        .into_iter()
        .find(|r| r.path.ends_with(":generateContent"))
        .unwrap();
    assert_eq!(
        generate.json()["contents"][0]["parts"][1],
        json!({ "file_data": { "mime_type": "video/mp4", "file_uri": uri } })
    );
}

#[tokio::test]
async fn failed_processing_is_an_error() {
    let fake = spawn_fake(StatusCode::OK, caption_response(), &["PROCESSING"], "FAILED").await;
    let client = client_for(&fake);
    let (_dir, path) = write_clip();

    let err = client.upload_file(&path).await.unwrap_err();

    assert!(err.to_string().contains("could not process"), "{err}");
    assert_eq!(fake.requests_to(Method::GET, "/v1beta/files/abc").len(), 1);
}

#[tokio::test]
async fn processing_forever_gives_up_after_the_poll_cap() {
    let fake = spawn_fake(StatusCode::OK, caption_response(), &[], "PROCESSING").await;
    let client = client_for(&fake);
    let (_dir, path) = write_clip();

    let err = client.upload_file(&path).await.unwrap_err();

    assert!(err.to_string().contains("still processing"), "{err}");
    assert_eq!(
        fake.requests_to(Method::GET, "/v1beta/files/abc").len(),
        FILE_POLL_ATTEMPTS as usize
    );
}

#[tokio::test]
async fn unknown_extension_uploads_as_octet_stream() {
    let fake = spawn_fake(StatusCode::OK, caption_response(), &[], "ACTIVE").await;
    let client = client_for(&fake);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob.unknownext");
    std::fs::write(&path, b"x").unwrap();

    client.upload_file(&path).await.unwrap();
    let start = &fake.requests_to(Method::POST, "/upload/v1beta/files")[0];
    assert_eq!(
        start.header("x-goog-upload-header-content-type"),
        Some("application/octet-stream")
    );
}
