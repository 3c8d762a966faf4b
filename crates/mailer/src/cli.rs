//! Commandline flags.

use crate::error::ValidationError;
use crate::options::PartialOptions;
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};

const ABOUT: &str = "Simple commandline SMTP client";

const HELP_TEMPLATE: &str = "\
{usage-heading} {usage}

{all-args}{after-help}";

const NOTES: &str = "\
Notes:
    - Commandline options take precedence over CONFIGFILE options.
    - Commandline errors print help text and the error to stdout and return 1.
      Errors with sending are printed to stdout and return exitcode 2.
    1. If USER is not an email address, '-f'/'--from' should have EMAIL!
    2. EMAILS can be like \"you@and.me\" or like \"Some String <you@and.me>\" and
       can be strung together comma-separated. (Mind the shell's parsing!)
    3. Could be the only option, if all ESSENTIALS and BODY options get set.
       Without it, $HOME/.mailer is used when present.
    4. All given in the CONFIGFILE and on the commandline will be used.
    5. StartTLS is the default, except when PORT is 465, then SSL/TLS is used.
    6. CSV header names (to, cc, bcc, reply, read, subject, from, message,
       nmessage) override those options per row; any {{header}} in the
       subject or body is replaced by the row's value.";

/// Simple commandline SMTP client.
#[derive(Debug, Parser)]
#[command(
    name = "mailer",
    version,
    about = ABOUT,
    help_template = HELP_TEMPLATE,
    after_help = NOTES
)]
pub struct Cli {
    /// For logging in to mail server. ^1
    #[arg(
        short = 'u',
        long,
        value_name = "USER",
        help_heading = "ESSENTIALS",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub user: Option<String>,

    /// If PASSWORD is '-', it is read from stdin.
    #[arg(
        short = 'p',
        long,
        value_name = "PASSWORD",
        help_heading = "ESSENTIALS",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub password: Option<String>,

    /// To email(s). ^2
    #[arg(
        short = 't',
        long,
        value_name = "EMAILS",
        help_heading = "ESSENTIALS",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub to: Option<String>,

    /// Subject line.
    #[arg(
        short = 's',
        long,
        value_name = "TEXTLINE",
        help_heading = "ESSENTIALS",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub subject: Option<String>,

    /// Message string in plain text.
    #[arg(
        short = 'm',
        long,
        value_name = "PLAINTEXT",
        conflicts_with = "mfile",
        help_heading = "BODY",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub message: Option<String>,

    /// File containing the plain text message.
    #[arg(
        short = 'M',
        long,
        value_name = "FILENAME",
        help_heading = "BODY",
        allow_hyphen_values = true,
        value_parser = path_value
    )]
    pub mfile: Option<PathBuf>,

    /// Message string in html.
    #[arg(
        short = 'n',
        long,
        value_name = "HTML",
        conflicts_with = "nfile",
        help_heading = "BODY",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub nmessage: Option<String>,

    /// File containing the html message.
    #[arg(
        short = 'N',
        long,
        value_name = "FILENAME",
        help_heading = "BODY",
        allow_hyphen_values = true,
        value_parser = path_value
    )]
    pub nfile: Option<PathBuf>,

    /// File with options. ^3
    #[arg(
        short = 'o',
        long,
        value_name = "CONFIGFILE",
        allow_hyphen_values = true,
        value_parser = path_value
    )]
    pub options: Option<PathBuf>,

    /// File to attach [multiple flags allowed]. ^4
    #[arg(
        short = 'a',
        long = "attachment",
        value_name = "FILE",
        allow_hyphen_values = true,
        value_parser = path_value
    )]
    pub attachments: Vec<PathBuf>,

    /// Use CSV file for bulk sending. ^6
    #[arg(
        short = 'C',
        long,
        value_name = "CSVFILE",
        allow_hyphen_values = true,
        value_parser = path_value
    )]
    pub csv: Option<PathBuf>,

    /// Mail server [default: smtp.gmail.com].
    #[arg(
        short = 'S',
        long,
        value_name = "SERVER",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub server: Option<String>,

    /// Port, like 25 or 465 [default: 587]. ^5
    #[arg(
        short = 'P',
        long,
        value_name = "PORT",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub port: Option<String>,

    /// Use SSL/TLS instead of StartTLS. ^5
    #[arg(short = 'T', long, overrides_with = "tls")]
    pub tls: bool,

    /// Cc email(s). ^2
    #[arg(
        short = 'c',
        long,
        value_name = "EMAILS",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub cc: Option<String>,

    /// Bcc email(s). ^2
    #[arg(
        short = 'b',
        long,
        value_name = "EMAILS",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub bcc: Option<String>,

    /// Reply-To email(s). ^2
    #[arg(
        short = 'r',
        long,
        value_name = "EMAILS",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub reply: Option<String>,

    /// Email(s) to send ReadReceipts to. ^2
    #[arg(
        short = 'R',
        long,
        value_name = "EMAILS",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub read: Option<String>,

    /// The name to use with the USER's email. ^1
    #[arg(
        short = 'f',
        long,
        value_name = "NAME|EMAIL",
        allow_hyphen_values = true,
        value_parser = text_value
    )]
    pub from: Option<String>,
}

/// Every flag of the table, short and long.
const FLAGS: &[&str] = &[
    "-u", "--user", "-p", "--password", "-t", "--to", "-s", "--subject", "-m", "--message",
    "-M", "--mfile", "-n", "--nmessage", "-N", "--nfile", "-o", "--options", "-a",
    "--attachment", "-C", "--csv", "-S", "--server", "-P", "--port", "-T", "--tls", "-c",
    "--cc", "-b", "--bcc", "-r", "--reply", "-R", "--read", "-f", "--from", "-h", "--help",
    "-V", "--version",
];

/// Takes any token as the value, even one starting with `-`, unless it is a
/// flag of its own.
fn text_value(value: &str) -> Result<String, String> {
    if FLAGS.contains(&value) {
        Err(format!("must have an argument, found flag {value}"))
    } else {
        Ok(value.to_string())
    }
}

fn path_value(value: &str) -> Result<PathBuf, String> {
    text_value(value).map(PathBuf::from)
}

impl Cli {
    /// Converts the flags into the commandline layer of the options.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first attachment that does not exist.
    pub fn into_partial(self) -> Result<PartialOptions, ValidationError> {
        if let Some(missing) = self.attachments.iter().find(|path| !path.exists()) {
            return Err(ValidationError::AttachmentNotFound(missing.clone()));
        }

        Ok(PartialOptions {
            user: self.user,
            password: self.password,
            server: self.server,
            port: self.port,
            tls: self.tls.then_some(true),
            from: self.from,
            to: self.to,
            cc: self.cc,
            bcc: self.bcc,
            reply: self.reply,
            read: self.read,
            subject: self.subject,
            message: self.message,
            mfile: self.mfile,
            nmessage: self.nmessage,
            nfile: self.nfile,
            attachments: self.attachments,
            csv: self.csv,
        })
    }
}

/// Renders the help text under the given binary name.
#[must_use]
pub fn usage(bin: &str) -> String {
    let help = Cli::command().bin_name(bin.to_string()).render_help();
    format!("{bin} v{} - {ABOUT}\n{help}", env!("CARGO_PKG_VERSION"))
}

/// Binary name from `argv[0]`, without directories.
#[must_use]
pub fn program_name(argv0: Option<&std::ffi::OsStr>) -> String {
    argv0
        .and_then(|arg| Path::new(arg).file_name())
        .map_or_else(|| "mailer".to_string(), |name| name.to_string_lossy().into_owned())
}

/// First line of a clap error, without the `error: ` prefix.
#[must_use]
pub fn describe_error(err: &clap::Error) -> String {
    let rendered = err.render().to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).trim().to_string()
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
    use clap::error::ErrorKind;
    use std::ffi::OsStr;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("mailer").chain(args.iter().copied()))
    }

    #[test]
    fn test_flag_table() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_essentials() {
        let cli = parse(&[
            "-u", "a@x.com", "-p", "secret", "-t", "b@y.com", "-s", "Hi", "-m", "hello",
        ])
        .unwrap();
        assert_eq!(cli.user.as_deref(), Some("a@x.com"));
        assert_eq!(cli.password.as_deref(), Some("secret"));
        assert_eq!(cli.to.as_deref(), Some("b@y.com"));
        assert_eq!(cli.subject.as_deref(), Some("Hi"));
        assert_eq!(cli.message.as_deref(), Some("hello"));
        assert!(!cli.tls);
    }

    #[test]
    fn test_long_flags() {
        let cli = parse(&[
            "--server", "mail.example.com", "--port", "465", "--tls", "--cc", "c@x.com",
            "--bcc", "d@x.com", "--reply", "r@x.com", "--read", "rr@x.com", "--from", "Alice",
            "--csv", "list.csv", "--options", "conf.yml", "--nmessage", "<b>x</b>",
            "--mfile", "body.txt",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("mail.example.com"));
        assert_eq!(cli.port.as_deref(), Some("465"));
        assert!(cli.tls);
        assert_eq!(cli.read.as_deref(), Some("rr@x.com"));
        assert_eq!(cli.csv, Some(PathBuf::from("list.csv")));
        assert_eq!(cli.options, Some(PathBuf::from("conf.yml")));
        assert_eq!(cli.mfile, Some(PathBuf::from("body.txt")));
    }

    #[test]
    fn test_password_from_stdin_marker() {
        let cli = parse(&["-p", "-"]).unwrap();
        assert_eq!(cli.password.as_deref(), Some("-"));
    }

    #[test]
    fn test_values_may_start_with_hyphen() {
        let cli = parse(&[
            "-p", "-x9secret", "-s", "-- urgent", "-m", "- item", "-t", "b@y.com",
        ])
        .unwrap();
        assert_eq!(cli.password.as_deref(), Some("-x9secret"));
        assert_eq!(cli.subject.as_deref(), Some("-- urgent"));
        assert_eq!(cli.message.as_deref(), Some("- item"));
        assert_eq!(cli.to.as_deref(), Some("b@y.com"));

        let cli = parse(&["-p", "-secret"]).unwrap();
        assert_eq!(cli.password.as_deref(), Some("-secret"));
    }

    #[test]
    fn test_flag_in_value_position_fails() {
        let err = parse(&["-u", "-t", "b@y.com"]).unwrap_err();
        let message = describe_error(&err);
        assert!(message.contains("--user"), "{message}");
        assert!(message.contains("must have an argument"), "{message}");

        let err = parse(&["--subject", "--to", "b@y.com"]).unwrap_err();
        assert!(describe_error(&err).contains("--subject"));

        let err = parse(&["-a", "-C", "list.csv"]).unwrap_err();
        assert!(describe_error(&err).contains("--attachment"));
    }

    #[test]
    fn test_duplicate_flag_fails() {
        let err = parse(&["-t", "a@x.com", "-t", "b@x.com"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        assert!(describe_error(&err).contains("--to"));
    }

    #[test]
    fn test_missing_value_fails() {
        let err = parse(&["-s"]).unwrap_err();
        assert!(describe_error(&err).contains("--subject"));

        let err = parse(&["-u", "-t", "b@y.com"]).unwrap_err();
        assert!(describe_error(&err).contains("--user"));
    }

    #[test]
    fn test_body_pairs_are_exclusive() {
        let err = parse(&["-m", "hi", "-M", "body.txt"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        let err = parse(&["-N", "body.html", "-n", "<p>x</p>"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        assert!(parse(&["-m", "hi", "-N", "body.html"]).is_ok());
    }

    #[test]
    fn test_unknown_flag_is_named() {
        let err = parse(&["--bogus"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
        assert!(describe_error(&err).contains("--bogus"));
        assert!(!describe_error(&err).starts_with("error:"));
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["-h"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
        assert_eq!(parse(&["-V"]).unwrap_err().kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_attachments_accumulate_and_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.txt");
        let second = dir.path().join("b.txt");
        std::fs::write(&first, "a").unwrap();
        std::fs::write(&second, "b").unwrap();

        let cli = parse(&[
            "-a",
            first.to_str().unwrap(),
            "--attachment",
            second.to_str().unwrap(),
        ])
        .unwrap();
        let partial = cli.into_partial().unwrap();
        assert_eq!(partial.attachments, vec![first.clone(), second]);

        let missing = dir.path().join("missing.txt");
        let cli = parse(&["-a", first.to_str().unwrap(), "-a", missing.to_str().unwrap()]).unwrap();
        let err = cli.into_partial().unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Attachment '{}' not found", missing.display())
        );
    }

    #[test]
    fn test_tls_flag_maps_to_some() {
        assert_eq!(parse(&["-T"]).unwrap().into_partial().unwrap().tls, Some(true));
        assert_eq!(parse(&["-T", "--tls"]).unwrap().into_partial().unwrap().tls, Some(true));
        assert_eq!(parse(&[]).unwrap().into_partial().unwrap().tls, None);
    }

    #[test]
    fn test_usage_names_binary_and_version() {
        let text = usage("sendit");
        assert!(text.starts_with(&format!(
            "sendit v{} - Simple commandline SMTP client\n",
            env!("CARGO_PKG_VERSION")
        )));
        assert!(text.contains("sendit [OPTIONS]"));
        assert!(!text.contains("mailer v"));
        assert!(text.contains("--attachment"));
        assert!(text.contains("Notes:"));
    }

    #[test]
    fn test_program_name() {
        assert_eq!(program_name(Some(OsStr::new("/usr/local/bin/sendit"))), "sendit");
        assert_eq!(program_name(None), "mailer");
    }
}
