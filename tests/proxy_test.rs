//! Proxy integration tests
//!
//! Runs the router against a local stand-in for the generation API and the
//! file host, and drives it over real HTTP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use motion_proxy::api::{router, AppState};
use motion_proxy::client::{Event, HttpProxyClient, Phase, Session, UploadFile};
use motion_proxy::Config;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

const PRO: &str = "kling-v2-6-motion-control-pro";

/// Requests seen by the fake upstream.
#[derive(Default)]
struct Upstream {
    generate_calls: Mutex<Vec<(Option<String>, Value)>>,
    status_calls: AtomicUsize,
    upload_calls: Mutex<Vec<(String, String)>>,
}

type Shared = Arc<Upstream>;

fn key_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-freepik-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn fake_generate(
    State(up): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    up.generate_calls
        .lock()
        .unwrap()
        .push((key_header(&headers), body.clone()));
    match body.get("prompt").and_then(Value::as_str) {
        Some("html") => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/html")],
            "<html><body>Service Unavailable</body></html>",
        )
            .into_response(),
        Some("reject") => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "Invalid image_url", "invalid_params": ["image_url"] })),
        )
            .into_response(),
        _ => Json(json!({ "data": { "task_id": "task-1", "status": "CREATED" } })).into_response(),
    }
}

async fn fake_status(State(up): State<Shared>, Path(task_id): Path<String>) -> Response {
    let seen = up.status_calls.fetch_add(1, Ordering::SeqCst);
    match task_id.as_str() {
        "missing" => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Not found" })),
        )
            .into_response(),
        "gone" => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json")],
            "",
        )
            .into_response(),
        "garbled" => "<html>gateway timeout</html>".into_response(),
        _ if seen < 1 => {
            Json(json!({ "data": { "task_id": task_id, "status": "IN_PROGRESS" } })).into_response()
        }
        _ => Json(json!({
            "data": {
                "task_id": task_id,
                "status": "COMPLETED",
                "generated": ["https://cdn.example/out.mp4"]
            }
        }))
        .into_response(),
    }
}

async fn fake_host(State(up): State<Shared>, mut multipart: Multipart) -> String {
    let mut reqtype = String::new();
    let mut file_name = String::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("reqtype") => reqtype = field.text().await.unwrap(),
            Some("fileToUpload") => file_name = field.file_name().unwrap_or_default().to_string(),
            _ => {}
        }
    }
    up.upload_calls
        .lock()
        .unwrap()
        .push((reqtype, file_name.clone()));
    format!("  https://files.example/{}\n", file_name)
}

async fn fake_bad_host() -> &'static str {
    "Internal error: storage full"
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Start the fake upstream and a proxy pointing at it.
async fn start(server_key: Option<&str>, host_path: &str) -> (String, Shared) {
    start_with_limit(server_key, host_path, None).await
}

async fn start_with_limit(
    server_key: Option<&str>,
    host_path: &str,
    max_upload_bytes: Option<u64>,
) -> (String, Shared) {
    let up: Shared = Arc::new(Upstream::default());
    let fake = Router::new()
        .route(&format!("/v1/ai/video/{}", PRO), post(fake_generate))
        .route("/v1/ai/image-to-video/kling-v2-6/:task_id", get(fake_status))
        .route("/user/api.php", post(fake_host))
        .route("/bad/api.php", post(fake_bad_host))
        .with_state(up.clone());
    let upstream = spawn(fake).await;

    let mut config = Config::new(
        server_key.map(str::to_string),
        format!("{}/", upstream),
        format!("{}{}", upstream, host_path),
    );
    if let Some(max) = max_upload_bytes {
        config.max_upload_bytes = max;
    }
    let proxy = spawn(router(Arc::new(AppState::new(config)))).await;
    (proxy, up)
}

fn media_form(name: &str, mime: &str) -> Form {
    sized_media_form(name, mime, b"not really media".to_vec())
}

fn sized_media_form(name: &str, mime: &str, data: Vec<u8>) -> Form {
    let part = Part::bytes(data)
        .file_name(name.to_string())
        .mime_str(mime)
        .unwrap();
    Form::new().part("file", part)
}

#[tokio::test]
async fn test_generate_strips_empty_params_and_relays_task() {
    let (proxy, up) = start(None, "/user/api.php").await;

    let res = reqwest::Client::new()
        .post(format!("{}/generate", proxy))
        .header("x-api-key", "caller-key")
        .json(&json!({
            "model": PRO,
            "image_url": "https://a/x.png",
            "video_url": "https://a/y.mp4",
            "prompt": "",
            "character_orientation": "video",
            "cfg_scale": 0.5,
            "negative_prompt": null
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["task_id"], "task-1");

    let calls = up.generate_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (key, sent) = &calls[0];
    assert_eq!(key.as_deref(), Some("caller-key"));
    assert_eq!(
        sent,
        &json!({
            "image_url": "https://a/x.png",
            "video_url": "https://a/y.mp4",
            "character_orientation": "video",
            "cfg_scale": 0.5
        })
    );
}

#[tokio::test]
async fn test_generate_without_any_key_is_unauthorized() {
    let (proxy, up) = start(None, "/user/api.php").await;

    let res = reqwest::Client::new()
        .post(format!("{}/generate", proxy))
        .json(&json!({ "model": PRO }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("API key"));
    assert!(up.generate_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_server_key_overrides_caller_key() {
    let (proxy, up) = start(Some("server-key"), "/user/api.php").await;

    let res = reqwest::Client::new()
        .post(format!("{}/generate", proxy))
        .header("x-api-key", "caller-key")
        .json(&json!({ "model": PRO, "image_url": "https://a/x.png" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let calls = up.generate_calls.lock().unwrap();
    assert_eq!(calls[0].0.as_deref(), Some("server-key"));
}

#[tokio::test]
async fn test_generate_unknown_model() {
    let (proxy, up) = start(Some("k"), "/user/api.php").await;

    let res = reqwest::Client::new()
        .post(format!("{}/generate", proxy))
        .json(&json!({ "model": "kling-v9" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Unknown model: kling-v9");
    assert!(up.generate_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generate_non_json_upstream_is_bad_gateway() {
    let (proxy, _up) = start(Some("k"), "/user/api.php").await;

    let res = reqwest::Client::new()
        .post(format!("{}/generate", proxy))
        .json(&json!({ "model": PRO, "prompt": "html" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Upstream API error (503). Server returned a non-JSON response. Please try again."
    );
}

#[tokio::test]
async fn test_generate_upstream_failure_is_relayed_with_details() {
    let (proxy, _up) = start(Some("k"), "/user/api.php").await;

    let res = reqwest::Client::new()
        .post(format!("{}/generate", proxy))
        .json(&json!({ "model": PRO, "prompt": "reject" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 422);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid image_url");
    assert_eq!(body["details"]["invalid_params"][0], "image_url");
}

#[tokio::test]
async fn test_status_relays_upstream_body() {
    let (proxy, _up) = start(Some("k"), "/user/api.php").await;

    let res = reqwest::Client::new()
        .get(format!("{}/status?model={}&taskId=task-1", proxy, PRO))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["data"]["status"], "IN_PROGRESS");
}

#[tokio::test]
async fn test_status_requires_model_and_task_id() {
    let (proxy, up) = start(Some("k"), "/user/api.php").await;

    let res = reqwest::Client::new()
        .get(format!("{}/status?model={}", proxy, PRO))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    assert_eq!(up.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_status_not_found_names_the_url() {
    let (proxy, _up) = start(Some("k"), "/user/api.php").await;

    let res = reqwest::Client::new()
        .get(format!("{}/status?model={}&taskId=missing", proxy, PRO))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Task not found (404). URL: "));
    assert!(message.ends_with("/v1/ai/image-to-video/kling-v2-6/missing"));
}

#[tokio::test]
async fn test_status_not_found_with_empty_json_body() {
    let (proxy, _up) = start(Some("k"), "/user/api.php").await;

    let res = reqwest::Client::new()
        .get(format!("{}/status?model={}&taskId=gone", proxy, PRO))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], 404);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .ends_with("/v1/ai/image-to-video/kling-v2-6/gone"));
}

#[tokio::test]
async fn test_status_non_json_includes_snippet() {
    let (proxy, _up) = start(Some("k"), "/user/api.php").await;

    let res = reqwest::Client::new()
        .get(format!("{}/status?model={}&taskId=garbled", proxy, PRO))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["rawSnippet"], "<html>gateway timeout</html>");
}

#[tokio::test]
async fn test_upload_returns_trimmed_host_url() {
    let (proxy, up) = start(None, "/user/api.php").await;

    let res = reqwest::Client::new()
        .post(format!("{}/upload", proxy))
        .multipart(media_form("clip.mp4", "video/mp4"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["url"], "https://files.example/clip.mp4");

    let calls = up.upload_calls.lock().unwrap();
    assert_eq!(
        calls.as_slice(),
        &[("fileupload".to_string(), "clip.mp4".to_string())]
    );
}

#[tokio::test]
async fn test_upload_rejects_non_media_without_contacting_host() {
    let (proxy, up) = start(None, "/user/api.php").await;

    let res = reqwest::Client::new()
        .post(format!("{}/upload", proxy))
        .multipart(media_form("notes.pdf", "application/pdf"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Unsupported file format"));
    assert!(up.upload_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_size_limit_is_inclusive() {
    let (proxy, up) = start_with_limit(None, "/user/api.php", Some(8)).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/upload", proxy))
        .multipart(sized_media_form("exact.png", "image/png", vec![7u8; 8]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(up.upload_calls.lock().unwrap().len(), 1);

    let res = client
        .post(format!("{}/upload", proxy))
        .multipart(sized_media_form("over.png", "image/png", vec![7u8; 9]))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("File is too large"));
    assert_eq!(up.upload_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let (proxy, _up) = start(None, "/user/api.php").await;

    let form = Form::new().text("note", "hello");
    let res = reqwest::Client::new()
        .post(format!("{}/upload", proxy))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "A file is required");
}

#[tokio::test]
async fn test_upload_host_without_url_is_bad_gateway() {
    let (proxy, _up) = start(None, "/bad/api.php").await;

    let res = reqwest::Client::new()
        .post(format!("{}/upload", proxy))
        .multipart(media_form("me.png", "image/png"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Upload failed: invalid response from file host.");
}

#[tokio::test]
async fn test_models_and_health() {
    let (proxy, _up) = start(Some("k"), "/user/api.php").await;
    let client = reqwest::Client::new();

    let models: Value = client
        .get(format!("{}/models", proxy))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = models["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![PRO, "kling-v2-6-motion-control-std"]);
    assert_eq!(models["models"][0]["fields"][0]["name"], "image_url");

    let health: Value = client
        .get(format!("{}/health", proxy))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["server_key"], true);
}

#[tokio::test]
async fn test_session_upload_generate_and_poll_to_completion() {
    let (proxy, up) = start(None, "/user/api.php").await;

    let mut session = Session::new(Arc::new(HttpProxyClient::new(proxy)))
        .with_poll_interval(Duration::from_millis(20));
    session.dispatch(Event::ApiKeyEdited("caller-key".to_string())).await;
    session
        .dispatch(Event::UploadRequested {
            field: "image_url".to_string(),
            file: UploadFile::new("me.png", "image/png", Bytes::from_static(b"png")),
        })
        .await;
    assert_eq!(
        session.state().form()["image_url"],
        json!("https://files.example/me.png")
    );

    session
        .dispatch(Event::SetField {
            name: "video_url".to_string(),
            value: json!("https://a/dance.mp4"),
        })
        .await;
    session
        .dispatch(Event::SetField {
            name: "prompt".to_string(),
            value: json!("dance"),
        })
        .await;
    session.dispatch(Event::GenerateRequested).await;
    assert_eq!(session.state().phase(), Phase::Polling);

    let phase = tokio::time::timeout(Duration::from_secs(5), session.run_until_settled(|_| {}))
        .await
        .unwrap();

    assert_eq!(phase, Phase::Completed);
    let history = session.state().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].video_url, "https://cdn.example/out.mp4");
    assert_eq!(history[0].prompt, "dance");
    assert!(up.status_calls.load(Ordering::SeqCst) >= 2);

    let sent = &up.generate_calls.lock().unwrap()[0];
    assert_eq!(sent.0.as_deref(), Some("caller-key"));
    assert_eq!(sent.1["image_url"], "https://files.example/me.png");
}
