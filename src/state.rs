use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use crate::{
    attachments::AttachmentSaver,
    auth::{DecodeOnlyVerifier, IdentityVerifier, JwksVerifier},
    complaints::ComplaintStore,
    config::{AppConfig, AuthMode},
    notify::{DisabledNotifier, Notifier, SmtpNotifier},
};

/// Request context shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: ComplaintStore,
    pub attachments: AttachmentSaver,
    pub identity: Arc<dyn IdentityVerifier>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store = ComplaintStore::open(&config.complaints_file)
            .await
            .with_context(|| format!("open complaint store {}", config.complaints_file.display()))?;

        let attachments = AttachmentSaver::open(&config.uploads_dir)
            .await
            .with_context(|| format!("create uploads dir {}", config.uploads_dir.display()))?;

        let identity: Arc<dyn IdentityVerifier> = match config.auth.mode {
            AuthMode::Verify => {
                let audience = config
                    .auth
                    .client_id
                    .clone()
                    .context("GOOGLE_CLIENT_ID is required when AUTH_MODE=verify")?;
                Arc::new(JwksVerifier::new(
                    config.auth.jwks_url.clone(),
                    audience,
                    config.auth.issuers.clone(),
                )?)
            }
            AuthMode::DecodeOnly => {
                warn!("AUTH_MODE=decode-only: identity tokens are NOT verified; any caller can forge a claim");
                Arc::new(DecodeOnlyVerifier)
            }
        };

        let notifier: Arc<dyn Notifier> = match config.mail.credentials() {
            Some((user, pass)) => Arc::new(SmtpNotifier::new(&config.mail.relay, user, pass)?),
            None => {
                warn!("GMAIL_USER or GMAIL_APP_PASSWORD not set; confirmation emails disabled");
                Arc::new(DisabledNotifier)
            }
        };

        Ok(Self::from_parts(
            Arc::new(config),
            store,
            attachments,
            identity,
            notifier,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: ComplaintStore,
        attachments: AttachmentSaver,
        identity: Arc<dyn IdentityVerifier>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            attachments,
            identity,
            notifier,
        }
    }

    /// State rooted in `dir`, accepting unsigned tokens.
    #[cfg(test)]
    pub async fn fake(
        dir: &std::path::Path,
        notifier: Arc<dyn Notifier>,
        mail: crate::config::MailConfig,
    ) -> Self {
        use crate::config::{AuthConfig, GOOGLE_JWKS_URL};

        let config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            complaints_file: dir.join("data").join("complaints.json"),
            uploads_dir: dir.join("uploads"),
            reference_prefix: "VLG".into(),
            auth: AuthConfig {
                mode: AuthMode::DecodeOnly,
                client_id: None,
                jwks_url: GOOGLE_JWKS_URL.into(),
                issuers: Vec::new(),
            },
            mail,
        };
        let store = ComplaintStore::open(&config.complaints_file)
            .await
            .expect("open fake store");
        let attachments = AttachmentSaver::open(&config.uploads_dir)
            .await
            .expect("create fake uploads dir");
        Self::from_parts(
            Arc::new(config),
            store,
            attachments,
            Arc::new(DecodeOnlyVerifier),
            notifier,
        )
    }
}
