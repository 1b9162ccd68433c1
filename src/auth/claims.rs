use base64::{
    engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

/// Identity asserted by an ID token. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    pub email: String,
    pub subject: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("Invalid token format")]
    MalformedToken,
    #[error("Token expired")]
    ExpiredClaim,
    #[error("Token carries no email claim")]
    MissingEmail,
    #[error("Token email is not verified")]
    UnverifiedEmail,
    #[error("Token rejected: {0}")]
    Rejected(String),
    #[error("Signing keys unavailable")]
    KeysUnavailable,
}

/// Payload fields we care about. Everything else in the token is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenPayload {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<f64>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email_verified: Option<Flag>,
}

/// Issuers have sent `email_verified` both as a boolean and as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn is_false(&self) -> bool {
        match self {
            Flag::Bool(b) => !b,
            Flag::Text(s) => s.trim().eq_ignore_ascii_case("false"),
        }
    }
}

impl TokenPayload {
    pub(crate) fn into_claim(self, now: OffsetDateTime) -> Result<IdentityClaim, ClaimError> {
        if let Some(exp) = self.exp {
            if exp < now.unix_timestamp() as f64 {
                return Err(ClaimError::ExpiredClaim);
            }
        }
        let email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or(ClaimError::MissingEmail)?;
        if self.email_verified.as_ref().is_some_and(Flag::is_false) {
            return Err(ClaimError::UnverifiedEmail);
        }
        Ok(IdentityClaim {
            email,
            subject: self.sub,
            expires_at: self
                .exp
                .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp as i64).ok()),
        })
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
}

/// Reads the payload segment of a three-part token without checking its
/// signature, issuer or audience.
pub fn decode_claim(token: &str, now: OffsetDateTime) -> Result<IdentityClaim, ClaimError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(ClaimError::MalformedToken);
    }
    let bytes = decode_segment(parts[1]).map_err(|_| ClaimError::MalformedToken)?;
    let payload: TokenPayload =
        serde_json::from_slice(&bytes).map_err(|_| ClaimError::MalformedToken)?;
    payload.into_claim(now)
}
