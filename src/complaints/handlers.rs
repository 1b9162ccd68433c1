use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{error, instrument, warn};

use super::{
    dto::{SubmitComplaintRequest, SubmitComplaintResponse},
    repo::StoreError,
    repo_types::Complaint,
    services,
};
use crate::{
    auth::handlers::rejection_message,
    error::{AppError, AppResult},
    state::AppState,
};

// Inline photos arrive base64-encoded inside the JSON body.
const SUBMIT_BODY_LIMIT: usize = 20 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/status/:id", get(get_status))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/submit-complaint", post(submit_complaint))
        .layer(DefaultBodyLimit::max(SUBMIT_BODY_LIMIT))
}

/// The body is read as loose JSON first so that the identity gate runs
/// before any field is type-checked.
#[instrument(skip(state, payload))]
pub async fn submit_complaint(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<SubmitComplaintResponse>> {
    let Json(body) = payload.map_err(|rejection| {
        warn!(error = %rejection, "unreadable complaint body");
        AppError::from(rejection)
    })?;

    let Some(token) = body
        .get("googleToken")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        warn!("submission without identity token");
        return Err(AppError::Unauthorized("Google authentication required".into()));
    };

    let claim = state.identity.verify(token).await.map_err(|e| {
        warn!(error = %e, "identity token rejected");
        AppError::Unauthorized(rejection_message(&e).into())
    })?;

    let form: SubmitComplaintRequest = serde_json::from_value(body).map_err(|e| {
        warn!(error = %e, "complaint form rejected");
        AppError::BadRequest(format!("Invalid complaint form: {e}"))
    })?;
    let submission = services::submit_complaint(&state, &claim, form).await?;

    let mut message = format!(
        "Complaint submitted successfully. Reference ID: {}",
        submission.reference_id
    );
    if submission.email_sent {
        message.push_str(" - Confirmation email will be sent.");
    }
    Ok(Json(SubmitComplaintResponse {
        message,
        reference_id: submission.reference_id,
        email_sent: submission.email_sent,
    }))
}

#[instrument(skip(state))]
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Complaint>> {
    match state.store.find_by_reference(id.trim()).await {
        Ok(complaint) => Ok(Json(complaint)),
        Err(StoreError::NotFound(_)) => Err(AppError::NotFound("Reference not found".into())),
        Err(e) => {
            error!(error = %e, %id, "status lookup failed");
            Err(AppError::Internal("Status lookup failed".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use lazy_static::lazy_static;
    use regex::Regex;
    use serde_json::{json, Value};

    use crate::testing::{call, get, post_json, unsigned_token, RecordingNotifier, TestEnv};

    lazy_static! {
        static ref REFERENCE_RE: Regex = Regex::new(r"^VLG-[0-9a-f]{8}$").unwrap();
    }

    fn form(token: Option<String>) -> Value {
        let mut body = json!({
            "city": "Springfield",
            "area": "North",
            "street": "Elm St",
            "issueType": "other",
            "otherIssue": "Broken bench",
            "description": "Bench split in half",
            "email": "citizen@example.org"
        });
        if let Some(token) = token {
            body["googleToken"] = Value::String(token);
        }
        body
    }

    fn token() -> String {
        unsigned_token(json!({ "email": "citizen@example.org", "sub": "42" }))
    }

    #[tokio::test]
    async fn submit_then_lookup_returns_the_record() {
        let env = TestEnv::new().await;
        let (status, body) =
            call(env.app(), post_json("/submit-complaint", form(Some(token())))).await;
        assert_eq!(status, StatusCode::OK);
        let reference = body["referenceId"].as_str().unwrap().to_string();
        assert!(REFERENCE_RE.is_match(&reference), "{reference}");
        assert_eq!(body["emailSent"], false);
        assert_eq!(
            body["message"],
            format!("Complaint submitted successfully. Reference ID: {reference}")
        );

        let (status, record) = call(env.app(), get(&format!("/status/{reference}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["referenceId"], reference.as_str());
        assert_eq!(record["status"], "Received");
        assert_eq!(record["otherIssue"], "Broken bench");
        assert_eq!(record["notificationStatus"], "not_configured");
        assert!(record.get("googleToken").is_none());
    }

    #[tokio::test]
    async fn references_are_unique_across_submissions() {
        let env = TestEnv::new().await;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..20 {
            let (status, body) =
                call(env.app(), post_json("/submit-complaint", form(Some(token())))).await;
            assert_eq!(status, StatusCode::OK);
            assert!(seen.insert(body["referenceId"].as_str().unwrap().to_string()));
        }
        assert_eq!(env.stored_count(), 20);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized_and_stores_nothing() {
        let env = TestEnv::new().await;
        let (status, body) = call(env.app(), post_json("/submit-complaint", form(None))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Google authentication required");
        assert_eq!(env.stored_count(), 0);
    }

    #[tokio::test]
    async fn token_without_email_is_unauthorized_and_stores_nothing() {
        let env = TestEnv::new().await;
        let no_email = unsigned_token(json!({ "sub": "42" }));
        let (status, body) =
            call(env.app(), post_json("/submit-complaint", form(Some(no_email)))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
        assert_eq!(env.stored_count(), 0);
    }

    #[tokio::test]
    async fn incomplete_form_is_bad_request() {
        let env = TestEnv::new().await;
        let mut body = form(Some(token()));
        body["city"] = Value::String(String::new());
        let (status, body) = call(env.app(), post_json("/submit-complaint", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "city is required");
        assert_eq!(env.stored_count(), 0);
    }

    #[tokio::test]
    async fn image_is_saved_and_bad_image_is_ignored() {
        let env = TestEnv::new().await;

        let mut body = form(Some(token()));
        body["imageData"] = json!("data:image/png;base64,AAAA");
        let (status, res) = call(env.app(), post_json("/submit-complaint", body)).await;
        assert_eq!(status, StatusCode::OK);
        let reference = res["referenceId"].as_str().unwrap();
        let (_, record) = call(env.app(), get(&format!("/status/{reference}"))).await;
        assert!(record["imagePath"].as_str().unwrap().ends_with(".png"));

        let mut body = form(Some(token()));
        body["imageData"] = json!("not a data uri");
        let (status, res) = call(env.app(), post_json("/submit-complaint", body)).await;
        assert_eq!(status, StatusCode::OK);
        let reference = res["referenceId"].as_str().unwrap();
        let (_, record) = call(env.app(), get(&format!("/status/{reference}"))).await;
        assert!(record.get("imagePath").is_none());
    }

    #[tokio::test]
    async fn email_sent_reflects_configured_mail() {
        let notifier = Arc::new(RecordingNotifier::default());
        let env = TestEnv::with_notifier(notifier).await;
        let (status, body) =
            call(env.app(), post_json("/submit-complaint", form(Some(token())))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["emailSent"], true);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .ends_with("Confirmation email will be sent."));
    }

    #[tokio::test]
    async fn store_failure_is_a_server_error() {
        let env = TestEnv::new().await;
        env.break_store();
        let (status, body) =
            call(env.app(), post_json("/submit-complaint", form(Some(token())))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to store complaint");
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let env = TestEnv::new().await;
        let (status, body) = call(env.app(), get("/status/VLG-00000000")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "Reference not found" }));
    }

    fn raw_post(uri: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
        let mut req = Request::builder().method(Method::POST).uri(uri);
        if let Some(ct) = content_type {
            req = req.header(header::CONTENT_TYPE, ct);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn tokenless_form_with_wrong_field_type_is_unauthorized() {
        let env = TestEnv::new().await;
        let (status, body) =
            call(env.app(), post_json("/submit-complaint", json!({ "city": 5 }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Google authentication required" }));
        assert_eq!(env.stored_count(), 0);
    }

    #[tokio::test]
    async fn wrong_field_type_with_token_is_bad_request() {
        let env = TestEnv::new().await;
        let mut body = form(Some(token()));
        body["city"] = json!(5);
        let (status, body) = call(env.app(), post_json("/submit-complaint", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid complaint form"));
        assert_eq!(env.stored_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_bodies_get_json_errors() {
        let env = TestEnv::new().await;
        let payload = form(Some(token())).to_string();

        let (status, body) = call(env.app(), raw_post("/submit-complaint", None, &payload)).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"].is_string(), "{body}");

        let (status, body) = call(
            env.app(),
            raw_post("/submit-complaint", Some("application/json"), "{not json"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string(), "{body}");
        assert_eq!(env.stored_count(), 0);
    }
}
