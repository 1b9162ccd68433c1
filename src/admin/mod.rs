use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin-info", get(admin_info))
}

#[derive(Debug, Serialize)]
pub struct AdminInfo {
    pub email: Option<String>,
    pub configured: bool,
}

/// Masks a sender address as first character, `***`, then up to the last ten
/// characters. Short addresses show fewer trailing characters so that some
/// part of the address is always hidden.
pub fn mask_email(email: &str) -> String {
    let chars: Vec<char> = email.chars().collect();
    let Some(first) = chars.first() else {
        return String::new();
    };
    let tail_len = if chars.len() > 11 {
        10
    } else {
        (chars.len() - 1) / 2
    };
    let tail: String = chars[chars.len() - tail_len..].iter().collect();
    format!("{first}***{tail}")
}

#[instrument(skip(state))]
pub async fn admin_info(State(state): State<AppState>) -> Json<AdminInfo> {
    let user = state.config.mail.user.as_deref();
    Json(AdminInfo {
        email: user.map(mask_email),
        configured: state.config.mail.credentials().is_some(),
    })
}
