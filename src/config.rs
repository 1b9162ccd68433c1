use std::path::PathBuf;

use anyhow::Context;

pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Verify signature, issuer, audience and expiry against the issuer's JWKS.
    Verify,
    /// Decode the payload only. Any caller can forge a claim in this mode.
    DecodeOnly,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub client_id: Option<String>,
    pub jwks_url: String,
    pub issuers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub user: Option<String>,
    pub app_password: Option<String>,
    pub relay: String,
}

impl MailConfig {
    /// Sender credentials, only when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.app_password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub complaints_file: PathBuf,
    pub uploads_dir: PathBuf,
    pub reference_prefix: String,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mode = match var("AUTH_MODE").as_deref() {
            None | Some("verify") => AuthMode::Verify,
            Some("decode-only") => AuthMode::DecodeOnly,
            Some(other) => anyhow::bail!("unknown AUTH_MODE {other:?}; expected verify or decode-only"),
        };
        let client_id = var("GOOGLE_CLIENT_ID");
        if mode == AuthMode::Verify && client_id.is_none() {
            anyhow::bail!("GOOGLE_CLIENT_ID is required when AUTH_MODE=verify");
        }
        let auth = AuthConfig {
            mode,
            client_id,
            jwks_url: var("GOOGLE_JWKS_URL").unwrap_or_else(|| GOOGLE_JWKS_URL.into()),
            issuers: GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
        };

        let mail = MailConfig {
            user: var("GMAIL_USER"),
            app_password: var("GMAIL_APP_PASSWORD"),
            relay: var("SMTP_RELAY").unwrap_or_else(|| "smtp.gmail.com".into()),
        };

        let port = match var("APP_PORT") {
            Some(p) => p.parse::<u16>().with_context(|| format!("invalid APP_PORT {p:?}"))?,
            None => 3000,
        };

        Ok(Self {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            complaints_file: var("COMPLAINTS_FILE")
                .unwrap_or_else(|| "complaints.json".into())
                .into(),
            uploads_dir: var("UPLOADS_DIR").unwrap_or_else(|| "uploads".into()).into(),
            reference_prefix: var("REFERENCE_PREFIX").unwrap_or_else(|| "VLG".into()),
            auth,
            mail,
        })
    }
}
