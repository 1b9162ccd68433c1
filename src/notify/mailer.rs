use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use super::{Notification, NotifyError, Notifier};

/// Sends mail through an authenticated SMTP relay over implicit TLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(relay: &str, user: &str, password: &str) -> anyhow::Result<Self> {
        let from: Mailbox = user
            .parse()
            .with_context(|| format!("sender address {user:?} is not a valid mailbox"))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)
            .with_context(|| format!("smtp relay {relay}"))?
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(message.to.clone()))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html.clone())
            .map_err(|e| NotifyError::DeliveryFailure(e.to_string()))?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| NotifyError::DeliveryFailure(e.to_string()))?;
        debug!(code = %response.code(), "smtp relay accepted message");
        Ok(())
    }
}

/// Stand-in used when no sender credentials are configured.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    fn is_configured(&self) -> bool {
        false
    }

    async fn send(&self, _message: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_notifier_sends_nothing() {
        let n = DisabledNotifier;
        assert!(!n.is_configured());
        let msg = Notification {
            to: "citizen@example.org".into(),
            subject: "s".into(),
            html: "<p>x</p>".into(),
        };
        assert!(matches!(n.send(&msg).await, Err(NotifyError::NotConfigured)));
    }

    #[tokio::test]
    async fn smtp_notifier_rejects_bad_sender() {
        assert!(SmtpNotifier::new("smtp.gmail.com", "not an address", "pw").is_err());
    }

    #[tokio::test]
    async fn smtp_notifier_rejects_bad_recipient_before_connecting() {
        let n = SmtpNotifier::new("smtp.gmail.com", "desk@example.org", "pw").unwrap();
        let msg = Notification {
            to: "nobody".into(),
            subject: "s".into(),
            html: "<p>x</p>".into(),
        };
        assert!(matches!(n.send(&msg).await, Err(NotifyError::InvalidAddress(_))));
    }
}
