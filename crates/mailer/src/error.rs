//! Error types for the mailer application.
//!
//! Validation errors end the run with the usage text and exit status 1,
//! delivery errors with exit status 2.

use std::io;
use std::path::PathBuf;

/// Bad, missing or conflicting input.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Commandline could not be parsed.
    #[error("{0}")]
    Commandline(String),

    /// Attachment given on the commandline does not exist.
    #[error("Attachment '{}' not found", .0.display())]
    AttachmentNotFound(PathBuf),

    /// Config file given with `-o` does not exist.
    #[error("Config file '{}' not found", .0.display())]
    ConfigNotFound(PathBuf),

    /// Config file exists but cannot be read.
    #[error("Cannot read config file '{}': {source}", path.display())]
    ConfigRead {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Config file is not valid YAML or has unknown keys.
    #[error("Error in config file '{}':\n{detail}", path.display())]
    ConfigSyntax {
        /// Config file path.
        path: PathBuf,
        /// Decoder message.
        detail: String,
    },

    /// One of `to`, `subject`, `user`, `password` is missing.
    #[error("Essential option '{0}' missing")]
    MissingEssential(&'static str),

    /// Config file sets both the literal body and its file.
    #[error("Can't have both '{literal}' and '{file}' options set in config file")]
    ConflictingBody {
        /// Literal body key.
        literal: &'static str,
        /// Body file key.
        file: &'static str,
    },

    /// No plain or HTML body given.
    #[error("Content missing, none of 'message'/'mfile'/'nmessage'/'nfile' given")]
    ContentMissing,

    /// Plain text body file cannot be read.
    #[error("Mfile not found: '{}'", .0.display())]
    MfileNotFound(PathBuf),

    /// HTML body file cannot be read.
    #[error("Nfile not found: '{}'", .0.display())]
    NfileNotFound(PathBuf),

    /// Attachment from the config file does not exist.
    #[error("Attachment '{}' from config file not found", .0.display())]
    ConfigAttachmentNotFound(PathBuf),

    /// Password `-` but stdin could not be read.
    #[error("Cannot read password from stdin: {0}")]
    Stdin(#[source] io::Error),

    /// Neither `from` nor `user` yields an email address.
    #[error("No 'from' email nor 'user' email")]
    NoFromEmail,

    /// CSV file cannot be opened.
    #[error("Cannot open CSV file '{}'", .0.display())]
    CsvOpen(PathBuf),

    /// CSV file is malformed.
    #[error("Error reading CSV file '{}': {detail}", path.display())]
    CsvRead {
        /// CSV file path.
        path: PathBuf,
        /// Reader message.
        detail: String,
    },

    /// Envelope address rejected by the SMTP layer.
    #[error("Invalid email address: '{0}'")]
    InvalidAddress(String),

    /// Message could not be assembled (bad address, unreadable attachment).
    #[error(transparent)]
    Message(#[from] mailer_mime::Error),
}

/// Failure while talking to the mail server.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Port is not a number in 1..=65535.
    #[error("Invalid port '{0}'")]
    InvalidPort(String),

    /// SMTP session failed (connect, TLS, auth, rejection).
    #[error(transparent)]
    Smtp(#[from] mailer_smtp::Error),
}

/// Any error that ends a run.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Input error.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Sending error.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl AppError {
    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 1,
            Self::Delivery(_) => 2,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ValidationError::MissingEssential("subject").to_string(),
            "Essential option 'subject' missing"
        );
        assert_eq!(
            ValidationError::ConflictingBody {
                literal: "nmessage",
                file: "nfile"
            }
            .to_string(),
            "Can't have both 'nmessage' and 'nfile' options set in config file"
        );
        assert_eq!(
            ValidationError::ConfigSyntax {
                path: PathBuf::from("conf.yml"),
                detail: "bad".into()
            }
            .to_string(),
            "Error in config file 'conf.yml':\nbad"
        );
        assert_eq!(
            ValidationError::MfileNotFound(PathBuf::from("body.txt")).to_string(),
            "Mfile not found: 'body.txt'"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::from(ValidationError::ContentMissing).exit_code(), 1);
        assert_eq!(
            AppError::from(DeliveryError::InvalidPort("x".into())).exit_code(),
            2
        );
    }
}
