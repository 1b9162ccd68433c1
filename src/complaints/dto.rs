use serde::{Deserialize, Serialize};

/// Complaint form as posted by the web client.
///
/// Every field defaults so that absent and blank fields reach the same
/// validation message.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubmitComplaintRequest {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub issue_type: String,
    #[serde(default)]
    pub other_issue: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub google_token: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>, // data:image/<subtype>;base64,...
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitComplaintResponse {
    pub message: String,
    pub reference_id: String,
    pub email_sent: bool,
}
