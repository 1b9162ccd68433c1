use time::{macros::format_description, OffsetDateTime};

use crate::complaints::repo_types::Complaint;

pub fn subject(reference_id: &str) -> String {
    format!("Complaint Registered Successfully - Reference ID: {reference_id}")
}

pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn submitted_on(date: OffsetDateTime) -> String {
    date.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute] UTC"
    ))
    .unwrap_or_else(|_| date.to_string())
}

/// Confirmation email body. Every user-supplied field is escaped.
pub fn confirmation_html(c: &Complaint) -> String {
    let issue = match c.other_issue.as_deref() {
        Some(other) => format!("{} ({})", escape_html(&c.issue_type), escape_html(other)),
        None => escape_html(&c.issue_type),
    };
    let location = format!(
        "{}, {}, {}",
        escape_html(&c.street),
        escape_html(&c.area),
        escape_html(&c.city)
    );
    let cell = "padding: 10px; border: 1px solid #ddd;";

    format!(
        r#"<div style="font-family: Arial, sans-serif; color: #333; max-width: 600px; margin: 0 auto;">
  <div style="background: #1e40af; padding: 20px; text-align: center; color: white; border-radius: 8px 8px 0 0;">
    <h2 style="margin: 0; font-size: 24px;">Complaint Registered Successfully</h2>
  </div>
  <div style="background: #f8f9fa; padding: 30px; border: 1px solid #e0e0e0;">
    <p>Dear Citizen,</p>
    <p>Thank you for reporting this issue. Your complaint has been registered.</p>
    <div style="background: white; padding: 20px; border-left: 4px solid #3b82f6; margin: 20px 0;">
      <h3 style="color: #3b82f6; margin-top: 0;">Your Reference ID:</h3>
      <p style="font-size: 18px; font-weight: bold;">{reference}</p>
      <p style="color: #666; font-size: 12px;">Keep this reference ID to track the status of your complaint.</p>
    </div>
    <h3>Complaint Details:</h3>
    <table style="width: 100%; border-collapse: collapse;">
      <tr><td style="{cell} font-weight: bold;">Issue Type:</td><td style="{cell}">{issue}</td></tr>
      <tr><td style="{cell} font-weight: bold;">Location:</td><td style="{cell}">{location}</td></tr>
      <tr><td style="{cell} font-weight: bold;">Description:</td><td style="{cell}">{description}</td></tr>
      <tr><td style="{cell} font-weight: bold;">Submitted On:</td><td style="{cell}">{submitted}</td></tr>
    </table>
    <h3>Next Steps:</h3>
    <ol style="color: #666;">
      <li>Your complaint has been recorded and assigned a reference ID</li>
      <li>Our team will review your complaint within 24-48 hours</li>
      <li>You can track the status anytime using your reference ID</li>
    </ol>
    <p style="color: #999; font-size: 12px;">This is an automated email. Please do not reply.</p>
  </div>
</div>
"#,
        reference = escape_html(&c.reference_id),
        description = escape_html(&c.description),
        submitted = submitted_on(c.date),
    )
}
