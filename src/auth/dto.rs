use serde::{Deserialize, Serialize};

/// Request body for token verification.
#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    #[serde(default)]
    pub token: Option<String>,
}

/// Outcome of token verification. Exactly one of `email` / `error` is set.
#[derive(Debug, Serialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyTokenResponse {
    pub fn valid(email: String) -> Self {
        Self { valid: true, email: Some(email), error: None }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self { valid: false, email: None, error: Some(error.into()) }
    }
}
