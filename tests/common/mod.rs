#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use expo_contacts::config::Config;
use expo_contacts::db::ExpoStorage;
use expo_contacts::ocr::{OcrError, RecognizeParams, TextRecognizer};
use expo_contacts::{ExpoState, expo_router};
use image::GrayImage;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "expo-test-boundary-7d1f";

/// Canned recognizer output per page-segmentation mode.
#[derive(Default)]
pub struct FakeRecognizer {
    pub outputs: HashMap<u8, String>,
    pub calls: Mutex<Vec<RecognizeParams>>,
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    async fn recognize(
        &self,
        _image: &GrayImage,
        params: &RecognizeParams,
    ) -> Result<String, OcrError> {
        self.calls.lock().unwrap().push(params.clone());
        self.outputs
            .get(&params.psm)
            .cloned()
            .ok_or_else(|| OcrError::EngineFailed {
                status: "exit status: 1".into(),
                stderr: "unsupported psm".into(),
            })
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: ExpoStorage,
    pub recognizer: Arc<FakeRecognizer>,
    pub uploads: PathBuf,
    _dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut cfg = Config::default();
    cfg.basic.database_url = format!("sqlite:{}", dir.path().join("expo.sqlite").display());
    cfg.basic.insecure_cookie = true;
    cfg.uploads.root_dir = dir.path().join("uploads");
    cfg
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(tweak: impl FnOnce(&mut Config)) -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut cfg = test_config(&dir);
    tweak(&mut cfg);

    let db = ExpoStorage::connect(&cfg.basic.database_url)
        .await
        .expect("database should open");
    let recognizer = Arc::new(FakeRecognizer {
        outputs: [
            (6u8, "ACME Corp\nJohn Smith & CEO\n\n".to_string()),
            (4u8, "ACME\n".to_string()),
            (3u8, "ACME Corp\nJohn Smith\nCEO\n+7 999 123-45-67\n".to_string()),
        ]
        .into_iter()
        .collect(),
        calls: Mutex::default(),
    });
    let uploads = cfg.uploads.root_dir.clone();
    let state = ExpoState::new(db.clone(), Arc::new(cfg), recognizer.clone())
        .expect("state should build");

    TestApp {
        app: expo_router(state),
        db,
        recognizer,
        uploads,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response {
        self.app.clone().oneshot(req).await.expect("request failed")
    }

    /// Logs in through `/login` and returns the `Cookie` header for later requests.
    pub async fn login(&self, id: i64, last_name: &str) -> String {
        let body = serde_json::json!({
            "id": id,
            "fio": {"last_name": last_name, "first_name": "Test"},
            "department": "Sales",
            "position": "Manager",
            "session_id": format!("sess-{id}")
        });
        let resp = self.send(json_request("POST", "/login", None, &body)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        cookie_header(&resp)
    }

    pub async fn login_admin(&self, id: i64) -> String {
        let cookies = self.login(id, "Admin").await;
        assert!(self.db.set_admin(id, true).await.unwrap());
        cookies
    }
}

/// `name=value` pairs from `Set-Cookie`, skipping removals.
pub fn cookie_header(resp: &Response) -> String {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .filter(|pair| pair.split_once('=').is_some_and(|(_, value)| !value.is_empty()))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn request(method: &str, uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).expect("failed to build request")
}

pub fn json_request(method: &str, uri: &str, cookies: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

/// `(field name, file name, bytes)` parts encoded as `multipart/form-data`.
pub fn multipart_request(
    uri: &str,
    cookies: Option<&str>,
    parts: &[(&str, &str, &[u8])],
) -> Request<Body> {
    let mut body = Vec::new();
    for (field, file_name, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::from(body)).expect("failed to build request")
}

/// A single file part whose body stops before the closing boundary.
pub fn truncated_multipart_request(
    uri: &str,
    cookies: Option<&str>,
    field: &str,
    file_name: &str,
    bytes: &[u8],
) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::from(body)).expect("failed to build request")
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not JSON")
}

pub async fn create_exhibition(app: &TestApp, admin: &str, body: Value) -> Value {
    let resp = app
        .send(json_request("POST", "/exhibitions", Some(admin), &body))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

pub fn contact_body(email: &str, phone: &str) -> Value {
    serde_json::json!({
        "title": "Acme",
        "full_name": "John Smith",
        "position": "CEO",
        "email": email,
        "phone_number": phone,
        "city": "Kazan",
        "questionnaire": {"product_type": [1, 3]}
    })
}

/// Files under `uploads/{dir}`, empty when the directory does not exist.
pub fn files_in(app: &TestApp, dir: &str) -> Vec<String> {
    std::fs::read_dir(app.uploads.join(dir))
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}
