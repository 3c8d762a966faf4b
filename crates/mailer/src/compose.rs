//! Message assembly from resolved options.

use crate::error::ValidationError;
use crate::options::ResolvedOptions;
use mailer_mime::{Attachment, Mailbox, Message, MessageBuilder};
use mailer_smtp::{Address, Envelope};

/// A message together with its SMTP envelope.
#[derive(Debug, Clone)]
pub struct Outgoing {
    /// Formatted message.
    pub message: Message,
    /// Envelope sender and every To, Cc and Bcc address.
    pub envelope: Envelope,
}

/// Builds the message and envelope for one set of options.
///
/// # Errors
///
/// Returns an error naming the address or attachment that could not be
/// used.
pub fn compose(options: &ResolvedOptions) -> Result<Outgoing, ValidationError> {
    let mut builder = MessageBuilder::new()
        .from(Mailbox::parse(&options.from)?)
        .to(Mailbox::parse_list(&options.to)?)
        .subject(options.subject.as_str())
        .text_body(options.plain_body.as_str())
        .html_body(options.html_body.as_str());

    if let Some(cc) = &options.cc {
        builder = builder.cc(Mailbox::parse_list(cc)?);
    }
    if let Some(bcc) = &options.bcc {
        builder = builder.bcc(Mailbox::parse_list(bcc)?);
    }
    if let Some(reply_to) = &options.reply_to {
        builder = builder.reply_to(Mailbox::parse_list(reply_to)?);
    }
    if let Some(read) = &options.read_receipt_to {
        builder = builder.read_receipt_to(Mailbox::parse_list(read)?);
    }
    for path in &options.attachments {
        builder = builder.attach(Attachment::from_file(path)?);
    }

    let message = builder.build()?;
    let envelope = Envelope {
        from: smtp_address(&message.sender().address)?,
        recipients: message
            .recipients()
            .iter()
            .map(|mailbox| smtp_address(&mailbox.address))
            .collect::<Result<_, _>>()?,
    };

    Ok(Outgoing { message, envelope })
}

fn smtp_address(address: &str) -> Result<Address, ValidationError> {
    Address::new(address).map_err(|_| ValidationError::InvalidAddress(address.to_string()))
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

    fn options() -> ResolvedOptions {
        ResolvedOptions {
            user: "me@example.com".into(),
            password: "secret".into(),
            server: "smtp.example.com".into(),
            port: "587".into(),
            use_tls: false,
            from: "Me <me@example.com>".into(),
            to: "a@example.com, B <b@example.com>".into(),
            cc: Some("c@example.com".into()),
            bcc: Some("d@example.com".into()),
            reply_to: None,
            read_receipt_to: None,
            subject: "Hello".into(),
            plain_body: "hi".into(),
            html_body: String::new(),
            attachments: Vec::new(),
            csv_file: None,
        }
    }

    #[test]
    fn test_envelope_from_address_part() {
        let outgoing = compose(&options()).unwrap();
        assert_eq!(outgoing.envelope.from.as_str(), "me@example.com");

        let recipients: Vec<&str> = outgoing
            .envelope
            .recipients
            .iter()
            .map(Address::as_str)
            .collect();
        assert_eq!(
            recipients,
            vec!["a@example.com", "b@example.com", "c@example.com", "d@example.com"]
        );
    }

    #[test]
    fn test_headers() {
        let text = compose(&options()).unwrap().message.to_string();
        assert!(text.contains("From: Me <me@example.com>\r\n"));
        assert!(text.contains("To: a@example.com, B <b@example.com>\r\n"));
        assert!(text.contains("Cc: c@example.com\r\n"));
        assert!(!text.contains("\r\nBcc:"));
        assert!(!text.contains("d@example.com"));
        assert!(!text.contains("Reply-To"));
    }

    #[test]
    fn test_invalid_address_is_named() {
        let mut options = options();
        options.cc = Some("good@example.com, not-an-address".into());
        let err = compose(&options).unwrap_err();
        assert_eq!(err.to_string(), "Invalid email address: 'not-an-address'");
    }

    #[test]
    fn test_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n").unwrap();

        let mut options = options();
        options.attachments = vec![path];
        let text = compose(&options).unwrap().message.to_string();
        assert!(text.contains("multipart/mixed"));
        assert!(text.contains("Content-Disposition: attachment; filename=\"data.csv\""));

        options.attachments = vec![dir.path().join("gone.bin")];
        let err = compose(&options).unwrap_err();
        assert!(err.to_string().starts_with("Could not attach file '"));
    }
}
