//! Slack incoming-webhook message shape.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub text: String,
    pub mrkdwn: bool,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentField {
    pub value: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub short: bool,
}

impl AttachmentField {
    /// A half-width field rendering `<url| label>`.
    pub fn link(url: &str, label: &str) -> Self {
        Self {
            value: format!("<{url}| {label}>"),
            short: true,
        }
    }

    pub fn wide(value: String) -> Self {
        Self {
            value,
            short: false,
        }
    }
}
