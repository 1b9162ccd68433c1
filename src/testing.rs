//! Shared fixtures for in-process tests.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{
    app::build_app,
    complaints::Complaint,
    config::MailConfig,
    notify::{DisabledNotifier, Notification, NotifyError, Notifier},
    state::AppState,
};

pub(crate) struct TestEnv {
    pub dir: TempDir,
    pub state: AppState,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_notifier(Arc::new(DisabledNotifier)).await
    }

    pub async fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_mail(notifier, no_mail()).await
    }

    pub async fn with_mail(notifier: Arc<dyn Notifier>, mail: MailConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = AppState::fake(dir.path(), notifier, mail).await;
        Self { dir, state }
    }

    pub fn app(&self) -> Router {
        build_app(self.state.clone())
    }

    pub fn stored(&self) -> Vec<Complaint> {
        let raw = std::fs::read(&self.state.config.complaints_file).expect("read store");
        serde_json::from_slice(&raw).expect("parse store")
    }

    pub fn stored_count(&self) -> usize {
        self.stored().len()
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.state.config.uploads_dir)
            .expect("read uploads")
            .map(|e| e.expect("dir entry").path())
            .collect()
    }

    /// Removes the store's directory so every later write fails.
    pub fn break_store(&self) {
        let data_dir = self
            .state
            .config
            .complaints_file
            .parent()
            .expect("store has a parent dir");
        std::fs::remove_dir_all(data_dir).expect("remove store dir");
        assert!(self.dir.path().exists());
    }
}

pub(crate) fn no_mail() -> MailConfig {
    MailConfig {
        user: None,
        app_password: None,
        relay: "smtp.gmail.com".into(),
    }
}

/// A three-segment token whose payload is `payload` and whose signature is junk.
pub(crate) fn unsigned_token(payload: Value) -> String {
    format!(
        "{}.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","kid":"test"}"#),
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

pub(crate) fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub(crate) fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

/// Runs one request through the router and returns status plus JSON body
/// (a JSON string for non-JSON bodies).
pub(crate) async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.expect("infallible");
    let status = res.status();
    let bytes = res
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().expect("lock").push(message.clone());
        Ok(())
    }
}

pub(crate) struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, _message: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::DeliveryFailure("relay refused connection".into()))
    }
}
