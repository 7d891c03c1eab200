//! Fluent builder for [`Mail`].

use chrono::{DateTime, Utc};

use super::types::{Attachment, Content, EmailAddress, Mail, Personalization};
use crate::error::{SendgridError, SendgridResult};

/// Builder for [`Mail`].
///
/// Recipients added with [`to`](Self::to), [`cc`](Self::cc) and
/// [`bcc`](Self::bcc) go into the first personalization, which is created
/// on demand.
#[derive(Debug, Default)]
pub struct MailBuilder {
    mail: Mail,
}

impl MailBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender.
    pub fn from(mut self, from: impl Into<EmailAddress>) -> Self {
        self.mail.from = Some(from.into());
        self
    }

    /// Sets the reply-to address.
    pub fn reply_to(mut self, reply_to: impl Into<EmailAddress>) -> Self {
        self.mail.reply_to = Some(reply_to.into());
        self
    }

    /// Adds a primary recipient.
    pub fn to(mut self, recipient: impl Into<EmailAddress>) -> Self {
        self.first_personalization().to.push(recipient.into());
        self
    }

    /// Adds several primary recipients.
    pub fn to_many<I, A>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<EmailAddress>,
    {
        self.first_personalization()
            .to
            .extend(recipients.into_iter().map(Into::into));
        self
    }

    /// Adds a carbon-copy recipient.
    pub fn cc(mut self, recipient: impl Into<EmailAddress>) -> Self {
        self.first_personalization().cc.push(recipient.into());
        self
    }

    /// Adds a blind carbon-copy recipient.
    pub fn bcc(mut self, recipient: impl Into<EmailAddress>) -> Self {
        self.first_personalization().bcc.push(recipient.into());
        self
    }

    /// Appends a personalization.
    pub fn personalization(mut self, personalization: Personalization) -> Self {
        self.mail.personalizations.push(personalization);
        self
    }

    /// Sets the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.mail.subject = Some(subject.into());
        self
    }

    /// Adds a plain text body.
    pub fn text(self, body: impl Into<String>) -> Self {
        self.content(Content::text(body))
    }

    /// Adds an HTML body.
    pub fn html(self, body: impl Into<String>) -> Self {
        self.content(Content::html(body))
    }

    /// Adds a content block.
    pub fn content(mut self, content: Content) -> Self {
        self.mail.content.push(content);
        self
    }

    /// Adds an attachment.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.mail.attachments.push(attachment);
        self
    }

    /// Uses a dynamic template.
    pub fn template_id(mut self, template_id: impl Into<String>) -> Self {
        self.mail.template_id = Some(template_id.into());
        self
    }

    /// Adds a category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.mail.categories.push(category.into());
        self
    }

    /// Adds a custom argument.
    pub fn custom_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mail.custom_args.insert(key.into(), value.into());
        self
    }

    /// Schedules delivery.
    pub fn send_at(mut self, at: DateTime<Utc>) -> Self {
        self.mail.send_at = Some(at.timestamp());
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no sender was set.
    pub fn build(self) -> SendgridResult<Mail> {
        if self.mail.from.is_none() {
            return Err(SendgridError::validation("Sender address is required", "from"));
        }
        Ok(self.mail)
    }

    fn first_personalization(&mut self) -> &mut Personalization {
        if self.mail.personalizations.is_empty() {
            self.mail.personalizations.push(Personalization::default());
        }
        &mut self.mail.personalizations[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_builder_collects_recipients_in_first_personalization() {
        let mail = MailBuilder::new()
            .from("sender@example.com")
            .to("a@example.com")
            .to_many(["b@example.com", "c@example.com"])
            .cc("cc@example.com")
            .subject("Hello")
            .text("plain")
            .html("<b>html</b>")
            .build()
            .unwrap();

        assert_eq!(mail.personalizations.len(), 1);
        assert_eq!(mail.personalizations[0].to.len(), 3);
        assert_eq!(mail.personalizations[0].cc.len(), 1);
        assert_eq!(mail.content[0].content_type, "text/plain");
        assert_eq!(mail.content[1].content_type, "text/html");
    }

    #[test]
    fn test_builder_requires_sender() {
        let err = MailBuilder::new().to("a@example.com").build().unwrap_err();

        match err {
            SendgridError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("from")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builder_optional_fields() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let mail = Mail::builder()
            .from(EmailAddress::with_name("sender@example.com", "Sender"))
            .template_id("d-123")
            .category("receipts")
            .custom_arg("order", "42")
            .send_at(at)
            .build()
            .unwrap();

        assert_eq!(mail.template_id.as_deref(), Some("d-123"));
        assert_eq!(mail.categories, vec!["receipts".to_string()]);
        assert_eq!(mail.custom_args.get("order").map(String::as_str), Some("42"));
        assert_eq!(mail.send_at, Some(at.timestamp()));
        assert!(mail.personalizations.is_empty());
    }
}
