//! Error types for MIME operations.

use std::io;
use std::path::PathBuf;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Mailbox is neither `addr@host` nor `Name <addr@host>`.
    #[error("Invalid email address: '{0}'")]
    InvalidMailbox(String),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Attachment file could not be read.
    #[error("Could not attach file '{}': {source}", path.display())]
    Attachment {
        /// Path of the attachment.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Message has no From mailbox.
    #[error("Missing required header: From")]
    MissingFrom,

    /// Message has no To, Cc or Bcc recipient.
    #[error("Message has no recipients")]
    MissingRecipients,
}
