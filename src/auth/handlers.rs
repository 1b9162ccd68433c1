use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{debug, instrument, warn};

use crate::{
    auth::{
        claims::ClaimError,
        dto::{VerifyTokenRequest, VerifyTokenResponse},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/verify-token", post(verify_token))
        .route("/verify-google-token", post(verify_token))
}

/// Client-facing message for a rejected token. Details stay in the logs.
pub(crate) fn rejection_message(err: &ClaimError) -> &'static str {
    match err {
        ClaimError::MalformedToken => "Invalid token format",
        ClaimError::ExpiredClaim => "Token expired",
        ClaimError::MissingEmail => "Token carries no email",
        ClaimError::UnverifiedEmail => "Token email is not verified",
        ClaimError::Rejected(_) => "Token verification failed",
        ClaimError::KeysUnavailable => "Token verification unavailable",
    }
}

#[instrument(skip(state, payload))]
pub async fn verify_token(
    State(state): State<AppState>,
    payload: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> (StatusCode, Json<VerifyTokenResponse>) {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable verify-token body");
            return (
                StatusCode::BAD_REQUEST,
                Json(VerifyTokenResponse::invalid(rejection.body_text())),
            );
        }
    };
    let Some(token) = payload
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(VerifyTokenResponse::invalid("No token provided")),
        );
    };

    match state.identity.verify(token).await {
        Ok(claim) => {
            debug!(email = %claim.email, "token verified");
            (StatusCode::OK, Json(VerifyTokenResponse::valid(claim.email)))
        }
        Err(e) => {
            warn!(error = %e, "token verification failed");
            (
                StatusCode::UNAUTHORIZED,
                Json(VerifyTokenResponse::invalid(rejection_message(&e))),
            )
        }
    }
}
