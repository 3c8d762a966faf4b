//! # mailer-mime
//!
//! Builds RFC 5322 messages with MIME bodies for submission over SMTP.
//!
//! ## Features
//!
//! - Plain, HTML or `multipart/alternative` bodies (quoted-printable)
//! - File attachments in `multipart/mixed` (base64, type guessed from the extension)
//! - RFC 2047 encoded words for non-ASCII subjects and display names
//! - Date, Message-ID and MIME-Version headers
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailer_mime::{Attachment, Mailbox, MessageBuilder};
//!
//! # fn main() -> mailer_mime::Result<()> {
//! let message = MessageBuilder::new()
//!     .from(Mailbox::parse("Alice <alice@example.com>")?)
//!     .to(Mailbox::parse_list("bob@example.com, carol@example.com")?)
//!     .subject("Report")
//!     .text_body("See attachment.")
//!     .html_body("<p>See attachment.</p>")
//!     .attach(Attachment::from_file("report.pdf")?)
//!     .build()?;
//!
//! let bytes = message.formatted();
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod mailbox;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use mailbox::Mailbox;
pub use message::{Attachment, Message, MessageBuilder, Part, PartBody};
