//! Option resolution through the public API: commandline parsing, config
//! files and the precedence between them.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use clap::Parser;
use mailer::cli::Cli;
use mailer::error::ValidationError;
use mailer::options::{PartialOptions, resolve};
use mailer::{config, prepare};
use proptest::prelude::*;
use std::io::{Cursor, empty};
use std::path::Path;

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("mailer").chain(args.iter().copied())).unwrap()
}

fn write_config(dir: &Path, yaml: &str) -> String {
    let path = dir.join("mailer.yml");
    std::fs::write(&path, yaml).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_minimal_commandline() {
    let partial = cli(&[
        "-u", "a@x.com", "-p", "secret", "-t", "b@y.com", "-s", "Hi", "-m", "hello",
    ])
    .into_partial()
    .unwrap();
    let options = resolve(partial, None, empty()).unwrap();

    assert_eq!(options.to, "b@y.com");
    assert_eq!(options.subject, "Hi");
    assert_eq!(options.plain_body, "hello");
    assert!(!options.use_tls);
    assert_eq!(options.server, "smtp.gmail.com");
    assert_eq!(options.port, "587");
    assert_eq!(options.from, "a@x.com");
}

#[test]
fn test_config_only() {
    let dir = tempfile::tempdir().unwrap();
    let body = dir.path().join("body.txt");
    std::fs::write(&body, "From a file\n").unwrap();
    let config = write_config(
        dir.path(),
        &format!(
            "User: me@example.com\npassword: pw\nto: you@example.com\nsubject: Report\n\
             mfile: {}\nport: 465\nfrom: Reports\n",
            body.display()
        ),
    );

    let job = prepare(cli(&["-o", &config]), empty()).unwrap();
    assert!(job.options.use_tls);
    assert_eq!(job.options.port, "465");
    assert_eq!(job.options.from, "Reports <me@example.com>");
    assert_eq!(job.options.plain_body, "From a file\n");
    assert_eq!(job.messages.len(), 1);
    assert_eq!(
        job.messages[0].message.headers().get("From"),
        Some("Reports <me@example.com>")
    );
}

#[test]
fn test_commandline_overrides_config() {
    let dir = tempfile::tempdir().unwrap();
    let attachment = dir.path().join("from-config.txt");
    let cli_attachment = dir.path().join("from-cli.txt");
    std::fs::write(&attachment, "c").unwrap();
    std::fs::write(&cli_attachment, "a").unwrap();
    let config = write_config(
        dir.path(),
        &format!(
            "user: me@example.com\npassword: pw\nto: config@example.com\nsubject: Config\n\
             message: config body\nserver: mail.example.com\ntls: 'no'\nattachment: {}\n",
            attachment.display()
        ),
    );

    let job = prepare(
        cli(&[
            "-o",
            &config,
            "-t",
            "cli@example.com",
            "-S",
            "smtp.example.org",
            "-a",
            cli_attachment.to_str().unwrap(),
        ]),
        empty(),
    )
    .unwrap();

    assert_eq!(job.options.to, "cli@example.com");
    assert_eq!(job.options.subject, "Config");
    assert_eq!(job.options.server, "smtp.example.org");
    assert!(!job.options.use_tls);
    assert_eq!(job.options.attachments, vec![cli_attachment, attachment]);
}

#[test]
fn test_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("none.yml");
    let err = prepare(cli(&["-o", missing.to_str().unwrap()]), empty()).unwrap_err();
    assert!(matches!(err, ValidationError::ConfigNotFound(_)));

    let config = write_config(dir.path(), "user: me@example.com\nsmtp: nope\n");
    let err = prepare(cli(&["-o", &config]), empty()).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with(&format!("Error in config file '{config}':\n")));
    assert!(message.contains("smtp"));
}

#[test]
fn test_password_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let job = prepare(
        cli(&[
            "-o", &config, "-u", "a@x.com", "-p", "-", "-t", "b@y.com", "-s", "Hi", "-n",
            "<p>hi</p>",
        ]),
        Cursor::new("mypw\n"),
    )
    .unwrap();
    assert_eq!(job.options.password, "mypw");
    assert_eq!(job.options.html_body, "<p>hi</p>");
}

#[test]
fn test_bad_address_is_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let err = prepare(
        cli(&[
            "-o", &config, "-u", "a@x.com", "-p", "pw", "-t", "nobody", "-s", "Hi", "-m", "x",
        ]),
        empty(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid email address: 'nobody'");
}

const SCALAR_FLAGS: [&str; 18] = [
    "-u", "-p", "-t", "-s", "-m", "-M", "-n", "-N", "-o", "-C", "-S", "-P", "-c", "-b", "-r",
    "-R", "-f", "--subject",
];

proptest! {
    #[test]
    fn commandline_value_wins(cli_value in "[A-Za-z0-9 ]{1,24}", config_value in "[A-Za-z0-9 ]{1,24}") {
        let from_cli = PartialOptions {
            subject: Some(cli_value.clone()),
            server: Some(cli_value.clone()),
            ..PartialOptions::default()
        };
        let from_config = PartialOptions {
            user: Some("me@example.com".into()),
            password: Some("pw".into()),
            to: Some("you@example.com".into()),
            subject: Some(config_value.clone()),
            server: Some(config_value),
            message: Some("body".into()),
            ..PartialOptions::default()
        };

        let options = resolve(from_cli, Some(from_config), empty()).unwrap();
        prop_assert_eq!(&options.subject, &cli_value);
        prop_assert_eq!(&options.server, &cli_value);
    }

    #[test]
    fn config_value_used_when_flag_absent(config_value in "[A-Za-z0-9]{1,24}") {
        let from_config = PartialOptions {
            user: Some("me@example.com".into()),
            password: Some("pw".into()),
            to: Some("you@example.com".into()),
            subject: Some(config_value.clone()),
            cc: Some(config_value.clone()),
            message: Some("body".into()),
            ..PartialOptions::default()
        };

        let options = resolve(PartialOptions::default(), Some(from_config), empty()).unwrap();
        prop_assert_eq!(&options.subject, &config_value);
        prop_assert_eq!(options.cc.as_deref(), Some(config_value.as_str()));
    }

    #[test]
    fn hyphen_value_taken_verbatim(flag in proptest::sample::select(SCALAR_FLAGS.to_vec()), value in "-[a-z0-9 ]{2,12}") {
        let result = Cli::try_parse_from(["mailer", flag, value.as_str()]);
        prop_assert!(result.is_ok(), "{flag} {value:?} rejected");
    }

    #[test]
    fn repeated_scalar_flag_fails(flag in proptest::sample::select(SCALAR_FLAGS.to_vec()), a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        let result = Cli::try_parse_from(["mailer", flag, a.as_str(), flag, b.as_str()]);
        prop_assert!(result.is_err());
    }

    #[test]
    fn port_465_always_means_tls(tls in proptest::option::of(any::<bool>())) {
        let from_cli = PartialOptions {
            user: Some("me@example.com".into()),
            password: Some("pw".into()),
            to: Some("you@example.com".into()),
            subject: Some("s".into()),
            message: Some("body".into()),
            port: Some("465".into()),
            ..PartialOptions::default()
        };
        let from_config = PartialOptions { tls, ..PartialOptions::default() };
        prop_assert!(resolve(from_cli, Some(from_config), empty()).unwrap().use_tls);
    }

    #[test]
    fn body_and_its_file_conflict(plain in any::<bool>(), text in "[a-z]{1,8}", file in "[a-z]{1,8}") {
        let (literal, path) = if plain { ("-m", "-M") } else { ("-n", "-N") };
        let result = Cli::try_parse_from(["mailer", literal, text.as_str(), path, file.as_str()]);
        prop_assert_eq!(result.unwrap_err().kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}

#[test]
fn test_discovered_file_name() {
    assert_eq!(config::DEFAULT_FILE_NAME, ".mailer");
}
