use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod handlers;
pub mod verifier;

pub use claims::{decode_claim, ClaimError, IdentityClaim};
pub use verifier::{DecodeOnlyVerifier, IdentityVerifier, JwksVerifier};

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
