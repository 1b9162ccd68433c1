use async_trait::async_trait;
use thiserror::Error;

use crate::complaints::repo_types::Complaint;

pub mod mailer;
pub mod template;

pub use mailer::{DisabledNotifier, SmtpNotifier};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail delivery is not configured")]
    NotConfigured,
    #[error("invalid recipient address {0:?}")]
    InvalidAddress(String),
    #[error("mail delivery failed: {0}")]
    DeliveryFailure(String),
}

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl Notification {
    pub fn confirmation(complaint: &Complaint) -> Self {
        Self {
            to: complaint.email.clone(),
            subject: template::subject(&complaint.reference_id),
            html: template::confirmation_html(complaint),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether `send` can deliver at all.
    fn is_configured(&self) -> bool;
    async fn send(&self, message: &Notification) -> Result<(), NotifyError>;
}
