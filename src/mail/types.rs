//! SendGrid v3 mail-send request body.
//!
//! These types mirror the JSON accepted by `POST /v3/mail/send`. They are
//! plain data: nothing here validates addresses or content.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// An email address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// The address.
    pub email: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EmailAddress {
    /// Create an address without a display name.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
        }
    }

    /// Create an address with a display name.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: Some(name.into()),
        }
    }
}

impl From<&str> for EmailAddress {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

impl From<String> for EmailAddress {
    fn from(email: String) -> Self {
        Self::new(email)
    }
}

/// A group of recipients sharing per-message settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personalization {
    /// Primary recipients.
    #[serde(default)]
    pub to: Vec<EmailAddress>,
    /// Carbon-copy recipients.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<EmailAddress>,
    /// Blind carbon-copy recipients.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<EmailAddress>,
    /// Subject overriding the message subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Extra headers for this group.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Dynamic template data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_template_data: Option<Map<String, Value>>,
    /// Custom arguments for this group.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_args: BTreeMap<String, String>,
}

impl Personalization {
    /// Create a personalization addressed to the given recipients.
    pub fn to<I, A>(recipients: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<EmailAddress>,
    {
        Self {
            to: recipients.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// A content block with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// MIME type such as `text/plain`.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Content body.
    pub value: String,
}

impl Content {
    /// Create a content block.
    pub fn new(content_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            value: value.into(),
        }
    }

    /// Plain text content.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(mime::TEXT_PLAIN.essence_str(), value)
    }

    /// HTML content.
    pub fn html(value: impl Into<String>) -> Self {
        Self::new(mime::TEXT_HTML.essence_str(), value)
    }
}

/// How an attachment is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    /// Regular attachment.
    Attachment,
    /// Inline, referenced by content id.
    Inline,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Base64-encoded file content.
    pub content: String,
    /// MIME type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// File name.
    pub filename: String,
    /// Presentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposition: Option<Disposition>,
    /// Content id for inline attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

impl Attachment {
    /// Create an attachment from raw bytes.
    ///
    /// The content is base64-encoded and the MIME type guessed from the
    /// file name.
    ///
    /// ```rust
    /// use integrations_sendgrid::mail::Attachment;
    ///
    /// let attachment = Attachment::from_bytes("notes.txt", b"hello");
    /// assert_eq!(attachment.content, "aGVsbG8=");
    /// assert_eq!(attachment.content_type.as_deref(), Some("text/plain"));
    /// ```
    pub fn from_bytes(filename: impl Into<String>, bytes: impl AsRef<[u8]>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Self {
            content: base64::engine::general_purpose::STANDARD.encode(bytes),
            content_type: Some(content_type),
            filename,
            disposition: Some(Disposition::Attachment),
            content_id: None,
        }
    }

    /// Override the MIME type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Mark the attachment inline under the given content id.
    pub fn inline(mut self, content_id: impl Into<String>) -> Self {
        self.disposition = Some(Disposition::Inline);
        self.content_id = Some(content_id.into());
        self
    }
}

/// A complete mail-send request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mail {
    /// Recipient groups.
    #[serde(default)]
    pub personalizations: Vec<Personalization>,
    /// Sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<EmailAddress>,
    /// Reply-to address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<EmailAddress>,
    /// Subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Content blocks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Content>,
    /// Attachments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Template to render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    /// Categories for statistics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Custom arguments echoed back in events.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_args: BTreeMap<String, String>,
    /// Unix timestamp at which to send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<i64>,
}

impl Mail {
    /// Start building a message.
    pub fn builder() -> super::MailBuilder {
        super::MailBuilder::new()
    }

    /// Append an attachment.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }
}
