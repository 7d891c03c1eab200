//! Mail payloads.
//!
//! [`MailPayload`] is what the client needs from a message: its JSON body
//! and the few facts recorded on the send span. It is implemented for the
//! typed [`Mail`] model and for raw [`serde_json::Value`] bodies.

mod builder;
mod types;

pub use builder::MailBuilder;
pub use types::{Attachment, Content, Disposition, EmailAddress, Mail, Personalization};

use serde_json::Value;

use crate::error::SendgridResult;

/// A message that can be posted to the mail-send endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait MailPayload: Send + Sync {
    /// JSON request body.
    fn to_json(&self) -> SendgridResult<Value>;

    /// Whether the message carries at least one attachment.
    fn has_attachments(&self) -> bool;

    /// Number of primary recipients in the first personalization.
    fn num_recipients(&self) -> usize;

    /// MIME types of the content blocks, in order.
    fn content_types(&self) -> Vec<String>;
}

impl MailPayload for Mail {
    fn to_json(&self) -> SendgridResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    fn num_recipients(&self) -> usize {
        self.personalizations.first().map_or(0, |p| p.to.len())
    }

    fn content_types(&self) -> Vec<String> {
        self.content.iter().map(|c| c.content_type.clone()).collect()
    }
}

impl MailPayload for Value {
    fn to_json(&self) -> SendgridResult<Value> {
        Ok(self.clone())
    }

    fn has_attachments(&self) -> bool {
        self.get("attachments")
            .and_then(Value::as_array)
            .map_or(false, |a| !a.is_empty())
    }

    fn num_recipients(&self) -> usize {
        self.pointer("/personalizations/0/to")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    fn content_types(&self) -> Vec<String> {
        self.get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b.get("type").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn mail_with(recipients: usize, attachments: usize) -> Mail {
        let mut builder = Mail::builder().from("sender@example.com").subject("subject");
        for i in 0..recipients {
            builder = builder.to(format!("user{i}@example.com"));
        }
        for i in 0..attachments {
            builder = builder.attachment(Attachment::from_bytes(format!("file{i}.txt"), b"data"));
        }
        builder.text("body").build().unwrap()
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 0)]
    #[case(3, 1)]
    #[case(2, 2)]
    fn test_mail_span_facts(#[case] recipients: usize, #[case] attachments: usize) {
        let mail = mail_with(recipients, attachments);

        assert_eq!(mail.num_recipients(), recipients);
        assert_eq!(mail.has_attachments(), attachments > 0);
        assert_eq!(mail.content_types(), vec!["text/plain".to_string()]);
    }

    #[test]
    fn test_mail_with_only_attachments() {
        let mut mail = Mail::default();
        mail.add_attachment(Attachment::from_bytes("a.csv", b"x,y"));

        assert!(mail.has_attachments());
        assert_eq!(mail.num_recipients(), 0);
    }

    #[test]
    fn test_mail_to_json_matches_serde() {
        let mail = mail_with(2, 1);
        assert_eq!(mail.to_json().unwrap(), serde_json::to_value(&mail).unwrap());
    }

    #[rstest]
    #[case(json!({}), false, 0)]
    #[case(json!({"attachments": []}), false, 0)]
    #[case(json!({"attachments": [{"content": "eA==", "filename": "x"}]}), true, 0)]
    #[case(json!({"personalizations": [{"to": [{"email": "a@example.com"}]}]}), false, 1)]
    #[case(json!({"personalizations": [{"to": "not-a-list"}]}), false, 0)]
    #[case(json!({"personalizations": []}), false, 0)]
    fn test_raw_json_span_facts(
        #[case] body: Value,
        #[case] has_attachments: bool,
        #[case] recipients: usize,
    ) {
        assert_eq!(body.has_attachments(), has_attachments);
        assert_eq!(body.num_recipients(), recipients);
    }

    #[test]
    fn test_raw_json_content_types() {
        let body = json!({
            "content": [
                {"type": "text/plain", "value": "a"},
                {"value": "missing type"},
                {"type": "text/html", "value": "b"}
            ]
        });

        assert_eq!(body.content_types(), vec!["text/plain", "text/html"]);
        assert_eq!(body.to_json().unwrap(), body);
    }
}
