//! MIME message building.

use crate::content_type::ContentType;
use crate::encoding::{encode_base64_wrapped, encode_quoted_printable, encode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::mailbox::Mailbox;
use chrono::{DateTime, FixedOffset, Local};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fmt;
use std::path::Path;

/// A file to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// Content type of the data.
    pub content_type: ContentType,
    /// Raw file content.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment from memory.
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: ContentType, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data,
        }
    }

    /// Reads a file; the content type is guessed from its extension.
    ///
    /// # Errors
    ///
    /// Returns an error naming the path if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::Attachment {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());

        Ok(Self::new(filename, ContentType::guess_from_path(path), data))
    }
}

/// One MIME entity: headers plus encoded content or nested parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Entity headers (Content-Type and friends).
    pub headers: Headers,
    /// Entity content.
    pub body: PartBody,
}

/// Content of a [`Part`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartBody {
    /// Transfer-encoded content, ready to be written.
    Encoded(String),
    /// Nested entities separated by `boundary`.
    Multipart {
        /// Boundary string.
        boundary: String,
        /// Child entities in order.
        parts: Vec<Part>,
    },
}

impl Part {
    /// Creates a quoted-printable text part.
    #[must_use]
    pub fn text(content_type: ContentType, text: &str) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add("Content-Transfer-Encoding", "quoted-printable");
        Self {
            headers,
            body: PartBody::Encoded(encode_quoted_printable(text)),
        }
    }

    /// Creates a base64 attachment part.
    #[must_use]
    pub fn attachment(attachment: &Attachment) -> Self {
        let filename = encode_rfc2047(&attachment.filename);
        let mut headers = Headers::new();
        headers.add(
            "Content-Type",
            attachment
                .content_type
                .clone()
                .with_parameter("name", filename.as_str())
                .to_string(),
        );
        headers.add(
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        );
        headers.add("Content-Transfer-Encoding", "base64");
        Self {
            headers,
            body: PartBody::Encoded(encode_base64_wrapped(&attachment.data)),
        }
    }

    /// Creates a multipart entity (`mixed`, `alternative`, ...).
    #[must_use]
    pub fn multipart(sub_type: &str, parts: Vec<Self>) -> Self {
        let boundary = random_token(28);
        let mut headers = Headers::new();
        headers.add(
            "Content-Type",
            ContentType::multipart(sub_type, boundary.as_str()).to_string(),
        );
        Self {
            headers,
            body: PartBody::Multipart { boundary, parts },
        }
    }

    fn write_body(&self, out: &mut String) {
        match &self.body {
            PartBody::Encoded(content) => {
                out.push_str(content);
                out.push_str("\r\n");
            }
            PartBody::Multipart { boundary, parts } => {
                for part in parts {
                    out.push_str("--");
                    out.push_str(boundary);
                    out.push_str("\r\n");
                    out.push_str(&part.headers.to_string());
                    out.push_str("\r\n");
                    part.write_body(out);
                }
                out.push_str("--");
                out.push_str(boundary);
                out.push_str("--\r\n");
            }
        }
    }
}

/// Builder for an outgoing message.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<Mailbox>,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    reply_to: Vec<Mailbox>,
    read_receipt_to: Vec<Mailbox>,
    subject: String,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
    date: Option<DateTime<FixedOffset>>,
    message_id: Option<String>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the From mailbox.
    #[must_use]
    pub fn from(mut self, mailbox: Mailbox) -> Self {
        self.from = Some(mailbox);
        self
    }

    /// Adds To recipients.
    #[must_use]
    pub fn to(mut self, mailboxes: impl IntoIterator<Item = Mailbox>) -> Self {
        self.to.extend(mailboxes);
        self
    }

    /// Adds Cc recipients.
    #[must_use]
    pub fn cc(mut self, mailboxes: impl IntoIterator<Item = Mailbox>) -> Self {
        self.cc.extend(mailboxes);
        self
    }

    /// Adds Bcc recipients (envelope only, never written as a header).
    #[must_use]
    pub fn bcc(mut self, mailboxes: impl IntoIterator<Item = Mailbox>) -> Self {
        self.bcc.extend(mailboxes);
        self
    }

    /// Adds Reply-To mailboxes.
    #[must_use]
    pub fn reply_to(mut self, mailboxes: impl IntoIterator<Item = Mailbox>) -> Self {
        self.reply_to.extend(mailboxes);
        self
    }

    /// Adds `Disposition-Notification-To` (read receipt) mailboxes.
    #[must_use]
    pub fn read_receipt_to(mut self, mailboxes: impl IntoIterator<Item = Mailbox>) -> Self {
        self.read_receipt_to.extend(mailboxes);
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Appends an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Overrides the Date header (defaults to now).
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Overrides the Message-ID (without angle brackets).
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Builds the message.
    ///
    /// Plain and HTML bodies become `multipart/alternative`; attachments
    /// wrap the body in `multipart/mixed`. Empty bodies are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if From or every recipient list is missing.
    pub fn build(self) -> Result<Message> {
        let from = self.from.ok_or(Error::MissingFrom)?;
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(Error::MissingRecipients);
        }

        let mut headers = Headers::new();
        let date = self.date.unwrap_or_else(|| Local::now().fixed_offset());
        headers.add("Date", date.to_rfc2822());
        headers.add("From", from.to_string());
        for (name, list) in [
            ("To", &self.to),
            ("Cc", &self.cc),
            ("Reply-To", &self.reply_to),
            ("Disposition-Notification-To", &self.read_receipt_to),
        ] {
            if !list.is_empty() {
                headers.add(name, Mailbox::join(list));
            }
        }
        headers.add("Subject", encode_rfc2047(&self.subject));
        let message_id = self.message_id.unwrap_or_else(|| {
            let domain = from.address.rsplit_once('@').map_or("localhost", |(_, d)| d);
            format!("{}.{}@{domain}", random_token(20), date.timestamp())
        });
        headers.add("Message-ID", format!("<{message_id}>"));
        headers.add("MIME-Version", "1.0");

        let mut bodies = Vec::new();
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            bodies.push(Part::text(ContentType::text_plain(), text));
        }
        if let Some(html) = self.html.as_deref().filter(|h| !h.is_empty()) {
            bodies.push(Part::text(ContentType::text_html(), html));
        }
        let body = match bodies.len() {
            0 => Part::text(ContentType::text_plain(), ""),
            1 => bodies.remove(0),
            _ => Part::multipart("alternative", bodies),
        };

        let root = if self.attachments.is_empty() {
            body
        } else {
            let mut parts = vec![body];
            parts.extend(self.attachments.iter().map(Part::attachment));
            Part::multipart("mixed", parts)
        };

        let mut recipients = self.to;
        recipients.extend(self.cc);
        recipients.extend(self.bcc);

        Ok(Message {
            headers,
            root,
            from,
            recipients,
        })
    }
}

/// A complete message ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    headers: Headers,
    root: Part,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl Message {
    /// Returns the top-level headers (without the root Content-Type).
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the root MIME entity.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Returns the sender mailbox.
    #[must_use]
    pub const fn sender(&self) -> &Mailbox {
        &self.from
    }

    /// Returns every envelope recipient: To, then Cc, then Bcc.
    #[must_use]
    pub fn recipients(&self) -> &[Mailbox] {
        &self.recipients
    }

    /// Returns the formatted message as bytes.
    #[must_use]
    pub fn formatted(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = self.headers.to_string();
        out.push_str(&self.root.headers.to_string());
        out.push_str("\r\n");
        self.root.write_body(&mut out);
        f.write_str(&out)
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn mailbox(s: &str) -> Mailbox {
        Mailbox::parse(s).unwrap()
    }

    fn base() -> MessageBuilder {
        MessageBuilder::new()
            .from(mailbox("Alice <alice@example.com>"))
            .to([mailbox("bob@example.com")])
            .subject("Hello")
            .date(DateTime::parse_from_rfc2822("Tue, 15 Jul 2025 10:52:37 +0200").unwrap())
            .message_id("fixed@example.com")
    }

    #[test]
    fn test_plain_message() {
        let message = base().text_body("Hi Bob").build().unwrap();
        let text = message.to_string();

        assert!(text.starts_with("Date: Tue, 15 Jul 2025 10:52:37 +0200\r\nFrom: Alice <alice@example.com>\r\nTo: bob@example.com\r\nSubject: Hello\r\n"));
        assert!(text.contains("Message-ID: <fixed@example.com>\r\n"));
        assert!(text.contains("MIME-Version: 1.0\r\n"));
        assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(text.ends_with("\r\n\r\nHi Bob\r\n"));
        assert!(!text.contains("multipart"));
    }

    #[test]
    fn test_optional_headers_omitted_when_empty() {
        let text = base().text_body("x").build().unwrap().to_string();
        assert!(!text.contains("Cc:"));
        assert!(!text.contains("Reply-To:"));
        assert!(!text.contains("Disposition-Notification-To:"));
    }

    #[test]
    fn test_bcc_only_in_envelope() {
        let message = base()
            .cc([mailbox("carol@example.com")])
            .bcc([mailbox("dave@example.com")])
            .reply_to([mailbox("replies@example.com")])
            .read_receipt_to([mailbox("receipts@example.com")])
            .text_body("x")
            .build()
            .unwrap();
        let text = message.to_string();

        assert!(text.contains("Cc: carol@example.com\r\n"));
        assert!(text.contains("Reply-To: replies@example.com\r\n"));
        assert!(text.contains("Disposition-Notification-To: receipts@example.com\r\n"));
        assert!(!text.contains("dave@example.com"));

        let recipients: Vec<&str> = message
            .recipients()
            .iter()
            .map(|m| m.address.as_str())
            .collect();
        assert_eq!(
            recipients,
            vec!["bob@example.com", "carol@example.com", "dave@example.com"]
        );
    }

    #[test]
    fn test_alternative_message() {
        let message = base()
            .text_body("plain")
            .html_body("<p>html</p>")
            .build()
            .unwrap();

        let PartBody::Multipart { boundary, parts } = &message.root().body else {
            panic!("expected multipart body");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0].headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(
            parts[1].headers.get("Content-Type"),
            Some("text/html; charset=utf-8")
        );

        let text = message.to_string();
        assert!(text.contains(&format!("multipart/alternative; boundary={boundary}")));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn test_attachments_wrap_in_mixed() {
        let attachment = Attachment::new("notes.txt", ContentType::new("text", "plain"), b"abc".to_vec());
        let message = base()
            .html_body("<b>hi</b>")
            .attach(attachment)
            .build()
            .unwrap();

        let PartBody::Multipart { parts, .. } = &message.root().body else {
            panic!("expected multipart body");
        };
        assert!(
            message
                .root()
                .headers
                .get("Content-Type")
                .unwrap()
                .starts_with("multipart/mixed")
        );
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[1].headers.get("Content-Disposition"),
            Some("attachment; filename=\"notes.txt\"")
        );
        assert_eq!(parts[1].body, PartBody::Encoded("YWJj".to_string()));
    }

    #[test]
    fn test_non_ascii_subject() {
        let text = base()
            .subject("Grüße")
            .text_body("x")
            .build()
            .unwrap()
            .to_string();
        assert!(text.contains("Subject: =?utf-8?B?R3LDvMOfZQ==?=\r\n"));
    }

    #[test]
    fn test_missing_parts() {
        assert!(matches!(
            MessageBuilder::new()
                .to([mailbox("bob@example.com")])
                .build(),
            Err(Error::MissingFrom)
        ));
        assert!(matches!(
            MessageBuilder::new()
                .from(mailbox("alice@example.com"))
                .build(),
            Err(Error::MissingRecipients)
        ));
    }

    #[test]
    fn test_attachment_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let attachment = Attachment::from_file(&path).unwrap();
        assert_eq!(attachment.filename, "report.pdf");
        assert_eq!(attachment.content_type.to_string(), "application/pdf");
        assert_eq!(attachment.data, b"%PDF-1.4");

        let err = Attachment::from_file(dir.path().join("missing.pdf")).unwrap_err();
        assert!(err.to_string().starts_with("Could not attach file '"));
    }

    #[test]
    fn test_generated_message_id_uses_sender_domain() {
        let message = MessageBuilder::new()
            .from(mailbox("alice@example.com"))
            .to([mailbox("bob@example.com")])
            .text_body("x")
            .build()
            .unwrap();
        let id = message.headers().get("Message-ID").unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));
    }
}
