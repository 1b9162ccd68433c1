use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    dto::SubmitComplaintRequest,
    repo::{ComplaintStore, StoreError},
    repo_types::{Complaint, NotificationStatus, INITIAL_STATUS},
};
use crate::{
    auth::IdentityClaim,
    error::{AppError, AppResult},
    notify::{Notification, Notifier},
    state::AppState,
};

/// How many fresh reference codes a submission tries before giving up.
pub const MAX_REFERENCE_ATTEMPTS: usize = 3;

/// `PREFIX-` followed by eight lowercase hex digits.
pub fn generate_reference(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

struct ComplaintDraft {
    city: String,
    area: String,
    street: String,
    issue_type: String,
    other_issue: Option<String>,
    description: String,
    email: String,
}

impl ComplaintDraft {
    fn to_complaint(
        &self,
        reference_id: String,
        image_path: Option<String>,
        notification_status: NotificationStatus,
    ) -> Complaint {
        Complaint {
            reference_id,
            city: self.city.clone(),
            area: self.area.clone(),
            street: self.street.clone(),
            issue_type: self.issue_type.clone(),
            other_issue: self.other_issue.clone(),
            description: self.description.clone(),
            email: self.email.clone(),
            date: OffsetDateTime::now_utc(),
            status: INITIAL_STATUS.to_string(),
            image_path,
            notification_status,
        }
    }
}

fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn validate(req: &SubmitComplaintRequest, claim: &IdentityClaim) -> AppResult<ComplaintDraft> {
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(&claim.email)
        .to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid contact email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    Ok(ComplaintDraft {
        city: required("city", &req.city)?,
        area: required("area", &req.area)?,
        street: required("street", &req.street)?,
        issue_type: required("issueType", &req.issue_type)?,
        other_issue: req
            .other_issue
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        description: required("description", &req.description)?,
        email,
    })
}

pub struct Submission {
    pub reference_id: String,
    /// A confirmation email was dispatched; its outcome lands on the record.
    pub email_sent: bool,
    pub notification: Option<JoinHandle<()>>,
}

fn store_failure(e: StoreError) -> AppError {
    error!(error = %e, "complaint store failure");
    AppError::Internal("Failed to store complaint".into())
}

/// Registers a complaint for an already verified identity.
///
/// The record is persisted before anything is reported back; a store
/// failure fails the submission and removes the photo saved for it.
pub async fn submit_complaint(
    st: &AppState,
    claim: &IdentityClaim,
    req: SubmitComplaintRequest,
) -> AppResult<Submission> {
    let draft = validate(&req, claim)?;
    let image_data = req.image_data.as_deref().filter(|d| !d.trim().is_empty());

    let configured = st.notifier.is_configured();
    let initial = if configured {
        NotificationStatus::Pending
    } else {
        NotificationStatus::NotConfigured
    };

    for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
        let reference = generate_reference(&st.config.reference_prefix);
        match st.store.find_by_reference(&reference).await {
            Ok(_) => {
                warn!(%reference, attempt, "reference collision; regenerating");
                continue;
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => return Err(store_failure(e)),
        }

        let image_path = match image_data {
            Some(data) => st.attachments.save_best_effort(data, &reference).await,
            None => None,
        };
        let complaint = draft.to_complaint(
            reference.clone(),
            image_path.as_ref().map(|p| p.display().to_string()),
            initial,
        );

        match st.store.append(complaint.clone()).await {
            Ok(()) => {
                info!(
                    %reference,
                    issue_type = %complaint.issue_type,
                    has_image = image_path.is_some(),
                    "complaint registered"
                );
                if !configured {
                    warn!(%reference, "mail not configured; confirmation email not sent");
                }
                let notification = configured
                    .then(|| spawn_confirmation(st.notifier.clone(), st.store.clone(), complaint));
                return Ok(Submission {
                    reference_id: reference,
                    email_sent: configured,
                    notification,
                });
            }
            Err(e) => {
                if let Some(path) = &image_path {
                    st.attachments.discard(path).await;
                }
                if let StoreError::Duplicate(_) = e {
                    warn!(%reference, attempt, "reference taken concurrently; regenerating");
                    continue;
                }
                return Err(store_failure(e));
            }
        }
    }

    error!("no free reference code after {MAX_REFERENCE_ATTEMPTS} attempts");
    Err(AppError::Internal("Could not allocate a reference code".into()))
}

/// Sends the confirmation email in the background and records the outcome.
pub fn spawn_confirmation(
    notifier: Arc<dyn Notifier>,
    store: ComplaintStore,
    complaint: Complaint,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reference = complaint.reference_id.clone();
        let message = Notification::confirmation(&complaint);
        let status = match notifier.send(&message).await {
            Ok(()) => {
                info!(%reference, to = %message.to, "confirmation email sent");
                NotificationStatus::Sent
            }
            Err(e) => {
                error!(error = %e, %reference, "failed to send confirmation email");
                NotificationStatus::Failed
            }
        };
        if let Err(e) = store.set_notification_status(&reference, status).await {
            warn!(error = %e, %reference, "could not record notification status");
        }
    })
}
