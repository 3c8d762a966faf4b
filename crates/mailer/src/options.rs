//! Option layering and validation.
//!
//! Each source (commandline, config file) yields a [`PartialOptions`];
//! [`resolve`] merges them with commandline values winning field by field,
//! checks the mandatory and exclusive options and derives the implicit
//! ones, producing a [`ResolvedOptions`] for one send.
//!
//! `None` means a field was not supplied. `Some("")` on the commandline is
//! an explicit value: it hides the config value, and a mandatory field that
//! ends up empty still fails.

use crate::error::ValidationError;
use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Server used when neither source names one.
pub const DEFAULT_SERVER: &str = "smtp.gmail.com";

/// Port used when neither source names one.
pub const DEFAULT_PORT: &str = "587";

/// Port that always means implicit TLS.
pub const IMPLICIT_TLS_PORT: &str = "465";

/// One source of options; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialOptions {
    /// Login user.
    pub user: Option<String>,
    /// Login password, `-` for stdin.
    pub password: Option<String>,
    /// Mail server host.
    pub server: Option<String>,
    /// Mail server port.
    pub port: Option<String>,
    /// Implicit TLS requested.
    pub tls: Option<bool>,
    /// From name or address.
    pub from: Option<String>,
    /// To addresses.
    pub to: Option<String>,
    /// Cc addresses.
    pub cc: Option<String>,
    /// Bcc addresses.
    pub bcc: Option<String>,
    /// Reply-To addresses.
    pub reply: Option<String>,
    /// Read receipt addresses.
    pub read: Option<String>,
    /// Subject line.
    pub subject: Option<String>,
    /// Plain text body.
    pub message: Option<String>,
    /// Plain text body file.
    pub mfile: Option<PathBuf>,
    /// HTML body.
    pub nmessage: Option<String>,
    /// HTML body file.
    pub nfile: Option<PathBuf>,
    /// Files to attach, in order.
    pub attachments: Vec<PathBuf>,
    /// CSV file for bulk sending.
    pub csv: Option<PathBuf>,
}

/// Merged, validated options for one message.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Mail server host.
    pub server: String,
    /// Mail server port.
    pub port: String,
    /// Connect with implicit TLS instead of STARTTLS.
    pub use_tls: bool,
    /// From header, always containing an address.
    pub from: String,
    /// To addresses, comma separated.
    pub to: String,
    /// Cc addresses.
    pub cc: Option<String>,
    /// Bcc addresses.
    pub bcc: Option<String>,
    /// Reply-To addresses.
    pub reply_to: Option<String>,
    /// Read receipt addresses.
    pub read_receipt_to: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Plain text body, empty when absent.
    pub plain_body: String,
    /// HTML body, empty when absent.
    pub html_body: String,
    /// Files to attach, in order.
    pub attachments: Vec<PathBuf>,
    /// CSV file for bulk sending.
    pub csv_file: Option<PathBuf>,
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("user", &self.user)
            .field("password", &"********")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("reply_to", &self.reply_to)
            .field("read_receipt_to", &self.read_receipt_to)
            .field("subject", &self.subject)
            .field("plain_body", &self.plain_body)
            .field("html_body", &self.html_body)
            .field("attachments", &self.attachments)
            .field("csv_file", &self.csv_file)
            .finish()
    }
}

/// Merges the commandline and config layers into one send job.
///
/// `stdin` is only read when the password is `-`.
///
/// # Errors
///
/// Returns the first validation failure, checked in this order: mandatory
/// options, body conflicts, missing content, body files, config
/// attachment, stdin, From address.
pub fn resolve(
    cli: PartialOptions,
    config: Option<PartialOptions>,
    stdin: impl BufRead,
) -> Result<ResolvedOptions, ValidationError> {
    let config = config.unwrap_or_default();

    let mut use_tls = cli.tls.unwrap_or(false) || config.tls.unwrap_or(false);

    let to = essential("to", cli.to, config.to)?;
    let subject = essential("subject", cli.subject, config.subject)?;
    let user = essential("user", cli.user, config.user)?;
    let password = essential("password", cli.password, config.password)?;

    let server = optional(cli.server, config.server).unwrap_or_else(|| DEFAULT_SERVER.into());
    let port = optional(cli.port, config.port).unwrap_or_else(|| DEFAULT_PORT.into());
    if port == IMPLICIT_TLS_PORT {
        use_tls = true;
    }

    let plain = body_pair(
        (cli.message, cli.mfile),
        (config.message, config.mfile),
        ("message", "mfile"),
    )?;
    let html = body_pair(
        (cli.nmessage, cli.nfile),
        (config.nmessage, config.nfile),
        ("nmessage", "nfile"),
    )?;
    if !plain.is_given() && !html.is_given() {
        return Err(ValidationError::ContentMissing);
    }

    let plain_body = plain.load(ValidationError::MfileNotFound)?;
    let html_body = html.load(ValidationError::NfileNotFound)?;

    let mut attachments = cli.attachments;
    for path in config.attachments {
        if !path.exists() {
            return Err(ValidationError::ConfigAttachmentNotFound(path));
        }
        attachments.push(path);
    }

    let password = if password == "-" {
        read_password(stdin).map_err(ValidationError::Stdin)?
    } else {
        password
    };

    let from = derive_from(&cli.from.or(config.from).unwrap_or_default(), &user)?;

    let options = ResolvedOptions {
        user,
        password,
        server,
        port,
        use_tls,
        from,
        to,
        cc: optional(cli.cc, config.cc),
        bcc: optional(cli.bcc, config.bcc),
        reply_to: optional(cli.reply, config.reply),
        read_receipt_to: optional(cli.read, config.read),
        subject,
        plain_body,
        html_body,
        attachments,
        csv_file: cli.csv.or(config.csv).filter(|p| !p.as_os_str().is_empty()),
    };

    debug!(
        server = %options.server,
        port = %options.port,
        use_tls = options.use_tls,
        attachments = options.attachments.len(),
        "options resolved"
    );

    Ok(options)
}

/// Turns the `from` option into a header value containing an address.
///
/// An address is kept as is, an empty value becomes `user`, and a bare
/// name becomes `Name <user>`.
///
/// # Errors
///
/// Returns [`ValidationError::NoFromEmail`] if the result has no `@`.
pub fn derive_from(from: &str, user: &str) -> Result<String, ValidationError> {
    if from.contains('@') {
        return Ok(from.to_string());
    }

    let from = if from.is_empty() {
        user.to_string()
    } else {
        format!("{from} <{user}>")
    };

    if from.contains('@') {
        Ok(from)
    } else {
        Err(ValidationError::NoFromEmail)
    }
}

/// Reads all lines and concatenates them without line terminators.
///
/// # Errors
///
/// Returns an error if the reader fails or yields invalid UTF-8.
pub fn read_password(reader: impl BufRead) -> std::io::Result<String> {
    reader.lines().collect()
}

fn essential(
    name: &'static str,
    cli: Option<String>,
    config: Option<String>,
) -> Result<String, ValidationError> {
    cli.or(config)
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::MissingEssential(name))
}

fn optional(cli: Option<String>, config: Option<String>) -> Option<String> {
    cli.or(config).filter(|value| !value.is_empty())
}

/// Literal text or file path for one kind of body.
#[derive(Debug, Default)]
struct BodySource {
    text: Option<String>,
    file: Option<PathBuf>,
}

impl BodySource {
    fn file(&self) -> Option<&Path> {
        self.file.as_deref().filter(|p| !p.as_os_str().is_empty())
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    fn is_given(&self) -> bool {
        self.text().is_some() || self.file().is_some()
    }

    fn load(self, not_found: fn(PathBuf) -> ValidationError) -> Result<String, ValidationError> {
        match self.file() {
            Some(path) => std::fs::read_to_string(path).map_err(|_| not_found(path.to_path_buf())),
            None => Ok(self.text.unwrap_or_default()),
        }
    }
}

fn body_pair(
    cli: (Option<String>, Option<PathBuf>),
    config: (Option<String>, Option<PathBuf>),
    (literal, file): (&'static str, &'static str),
) -> Result<BodySource, ValidationError> {
    if cli.0.is_some() || cli.1.is_some() {
        return Ok(BodySource {
            text: cli.0,
            file: cli.1,
        });
    }

    let source = BodySource {
        text: config.0,
        file: config.1,
    };
    if source.text().is_some() && source.file().is_some() {
        return Err(ValidationError::ConflictingBody { literal, file });
    }

    Ok(source)
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
    use std::io::Cursor;

    fn essentials() -> PartialOptions {
        PartialOptions {
            user: Some("a@x.com".into()),
            password: Some("secret".into()),
            to: Some("b@y.com".into()),
            subject: Some("Hi".into()),
            message: Some("hello".into()),
            ..PartialOptions::default()
        }
    }

    fn no_stdin() -> Cursor<&'static [u8]> {
        Cursor::new(&[][..])
    }

    #[test]
    fn test_defaults() {
        let options = resolve(essentials(), None, no_stdin()).unwrap();
        assert_eq!(options.server, "smtp.gmail.com");
        assert_eq!(options.port, "587");
        assert!(!options.use_tls);
        assert_eq!(options.from, "a@x.com");
        assert_eq!(options.plain_body, "hello");
        assert_eq!(options.html_body, "");
        assert_eq!(options.cc, None);
    }

    #[test]
    fn test_essential_order() {
        let err = resolve(PartialOptions::default(), None, no_stdin()).unwrap_err();
        assert_eq!(err.to_string(), "Essential option 'to' missing");

        let mut partial = essentials();
        partial.user = None;
        partial.password = None;
        let err = resolve(partial, None, no_stdin()).unwrap_err();
        assert_eq!(err.to_string(), "Essential option 'user' missing");
    }

    #[test]
    fn test_explicit_empty_hides_config() {
        let mut cli = essentials();
        cli.subject = Some(String::new());
        let config = PartialOptions {
            subject: Some("From config".into()),
            ..PartialOptions::default()
        };
        let err = resolve(cli, Some(config), no_stdin()).unwrap_err();
        assert_eq!(err.to_string(), "Essential option 'subject' missing");
    }

    #[test]
    fn test_port_465_forces_tls() {
        let mut cli = essentials();
        cli.port = Some("465".into());
        assert!(resolve(cli, None, no_stdin()).unwrap().use_tls);

        let config = PartialOptions {
            tls: Some(true),
            ..PartialOptions::default()
        };
        assert!(resolve(essentials(), Some(config), no_stdin()).unwrap().use_tls);
    }

    #[test]
    fn test_config_body_conflict() {
        let mut cli = essentials();
        cli.message = None;
        let config = PartialOptions {
            message: Some("hi".into()),
            mfile: Some("body.txt".into()),
            ..PartialOptions::default()
        };
        let err = resolve(cli, Some(config), no_stdin()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can't have both 'message' and 'mfile' options set in config file"
        );
    }

    #[test]
    fn test_cli_body_hides_config_pair() {
        let config = PartialOptions {
            message: Some("hi".into()),
            mfile: Some("body.txt".into()),
            nmessage: Some("<p>config</p>".into()),
            ..PartialOptions::default()
        };
        let options = resolve(essentials(), Some(config), no_stdin()).unwrap();
        assert_eq!(options.plain_body, "hello");
        assert_eq!(options.html_body, "<p>config</p>");
    }

    #[test]
    fn test_content_missing() {
        let mut cli = essentials();
        cli.message = None;
        let err = resolve(cli, None, no_stdin()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Content missing, none of 'message'/'mfile'/'nmessage'/'nfile' given"
        );
    }

    #[test]
    fn test_body_files() {
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("body.html");
        std::fs::write(&html, "<h1>Hello</h1>\n").unwrap();

        let mut cli = essentials();
        cli.nfile = Some(html);
        let options = resolve(cli, None, no_stdin()).unwrap();
        assert_eq!(options.html_body, "<h1>Hello</h1>\n");

        let mut cli = essentials();
        cli.message = None;
        cli.mfile = Some(dir.path().join("missing.txt"));
        let err = resolve(cli, None, no_stdin()).unwrap_err();
        assert!(matches!(err, ValidationError::MfileNotFound(_)));
        assert!(err.to_string().starts_with("Mfile not found: '"));
    }

    #[test]
    fn test_config_attachment_appended() {
        let dir = tempfile::tempdir().unwrap();
        let cli_file = dir.path().join("cli.txt");
        let config_file = dir.path().join("config.txt");
        std::fs::write(&cli_file, "a").unwrap();
        std::fs::write(&config_file, "b").unwrap();

        let mut cli = essentials();
        cli.attachments = vec![cli_file.clone()];
        let config = PartialOptions {
            attachments: vec![config_file.clone()],
            ..PartialOptions::default()
        };
        let options = resolve(cli, Some(config), no_stdin()).unwrap();
        assert_eq!(options.attachments, vec![cli_file, config_file]);

        let missing = dir.path().join("gone.txt");
        let config = PartialOptions {
            attachments: vec![missing.clone()],
            ..PartialOptions::default()
        };
        let err = resolve(essentials(), Some(config), no_stdin()).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Attachment '{}' from config file not found", missing.display())
        );
    }

    #[test]
    fn test_password_from_stdin() {
        let mut cli = essentials();
        cli.password = Some("-".into());
        let options = resolve(cli, None, Cursor::new(&b"mypw\n"[..])).unwrap();
        assert_eq!(options.password, "mypw");
    }

    #[test]
    fn test_read_password_joins_lines() {
        assert_eq!(read_password(Cursor::new(&b"ab\r\ncd\nef"[..])).unwrap(), "abcdef");
        assert_eq!(read_password(Cursor::new(&b""[..])).unwrap(), "");
    }

    #[test]
    fn test_derive_from() {
        assert_eq!(derive_from("", "a@b.com").unwrap(), "a@b.com");
        assert_eq!(derive_from("Alice", "a@b.com").unwrap(), "Alice <a@b.com>");
        assert_eq!(
            derive_from("Bob <bob@x.com>", "a@b.com").unwrap(),
            "Bob <bob@x.com>"
        );
        assert_eq!(
            derive_from("Alice", "notanemail").unwrap_err().to_string(),
            "No 'from' email nor 'user' email"
        );
        assert!(derive_from("", "notanemail").is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let options = resolve(essentials(), None, no_stdin()).unwrap();
        let debug = format!("{options:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("********"));
    }

    #[test]
    fn test_csv_file_cli_wins() {
        let mut cli = essentials();
        cli.csv = Some("cli.csv".into());
        let config = PartialOptions {
            csv: Some("config.csv".into()),
            ..PartialOptions::default()
        };
        let options = resolve(cli, Some(config.clone()), no_stdin()).unwrap();
        assert_eq!(options.csv_file, Some(PathBuf::from("cli.csv")));

        let options = resolve(essentials(), Some(config), no_stdin()).unwrap();
        assert_eq!(options.csv_file, Some(PathBuf::from("config.csv")));
    }
}
