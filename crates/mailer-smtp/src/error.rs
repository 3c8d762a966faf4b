//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server returned an error reply.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 535).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Host name cannot be used for TLS server name verification.
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// Credentials would travel over an unencrypted connection.
    #[error("refusing to authenticate with {0} over an unencrypted connection")]
    InsecureAuth(String),

    /// Message exceeds the size advertised by the server.
    #[error("Message exceeds size limit: {size} bytes (server accepts {limit})")]
    MessageTooLarge {
        /// Message size in bytes.
        size: usize,
        /// Limit from the `SIZE` extension.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// The envelope has no recipients.
    #[error("No recipients in envelope")]
    NoRecipients,
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if the server rejected the credentials (535).
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::SmtpError { code: 535, .. })
    }
}
