use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Status every complaint starts in.
pub const INITIAL_STATUS: &str = "Received";

/// Delivery state of the confirmation email for a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    #[default]
    NotConfigured,
}

/// A complaint as persisted in the store file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub reference_id: String, // PREFIX-xxxxxxxx, immutable
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_issue: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub email: String, // contact address for confirmation
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default)]
    pub notification_status: NotificationStatus,
}
