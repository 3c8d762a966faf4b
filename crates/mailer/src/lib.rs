//! # mailer
//!
//! Simple commandline SMTP client.
//!
//! Options come from commandline flags and an optional YAML config file
//! (`-o FILE`, or `$HOME/.mailer`), commandline values winning. A CSV file
//! turns one invocation into one message per row.
//!
//! ## Flow
//!
//! ```text
//! args ──► cli ──► options::resolve ◄── config::load
//!                        │
//!                        ▼
//!              batch::overlay (per CSV row)
//!                        │
//!                        ▼
//!               compose ──► deliver
//! ```
//!
//! Validation errors print the usage text and `ERROR <message>` and exit
//! with status 1; delivery errors print `Error: <message>` and exit with
//! status 2.

#![forbid(unsafe_code)]

pub mod batch;
pub mod cli;
pub mod compose;
pub mod config;
pub mod deliver;
pub mod error;
pub mod options;

use crate::cli::Cli;
use crate::compose::Outgoing;
use crate::deliver::Delivery;
use crate::error::{AppError, ValidationError};
use crate::options::ResolvedOptions;
use clap::Parser;
use clap::error::ErrorKind;
use std::ffi::OsString;
use std::io::BufRead;
use tracing::{debug, warn};

/// Everything validated and ready to send.
#[derive(Debug)]
pub struct Job {
    /// Options shared by all messages.
    pub options: ResolvedOptions,
    /// Messages in sending order.
    pub messages: Vec<Outgoing>,
}

/// Validates all input and assembles every message.
///
/// Nothing is sent, so a bad row in a CSV batch stops the run before the
/// first message leaves.
///
/// # Errors
///
/// Returns the first validation failure.
pub fn prepare(cli: Cli, stdin: impl BufRead) -> Result<Job, ValidationError> {
    let explicit_config = cli.options.clone();
    let from_cli = cli.into_partial()?;

    let from_config = match explicit_config.or_else(config::discover) {
        Some(path) => Some(config::load(&path)?),
        None => None,
    };

    let options = options::resolve(from_cli, from_config, stdin)?;

    let per_message = match &options.csv_file {
        Some(path) => {
            let records = batch::read_csv(path)?;
            if records.is_empty() {
                warn!(path = %path.display(), "CSV file has no rows, nothing to send");
            }
            records
                .iter()
                .map(|record| batch::overlay(&options, record))
                .collect::<Result<Vec<_>, _>>()?
        }
        None => vec![options.clone()],
    };

    let messages = per_message
        .iter()
        .map(compose::compose)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(messages = messages.len(), "messages assembled");

    Ok(Job { options, messages })
}

/// Sends every message of a prepared job.
///
/// # Errors
///
/// Returns the first delivery failure.
pub async fn execute(job: &Job) -> Result<usize, AppError> {
    let delivery = Delivery::from_options(&job.options)?;
    Ok(delivery.send_all(&job.messages).await?)
}

/// Runs the tool with `args` (including the program name) and returns the
/// process exit status.
///
/// Output for the user goes to stdout; logs go through `tracing`.
pub async fn run<I, T>(args: I, stdin: impl BufRead) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let bin = cli::program_name(args.first().map(OsString::as_os_str));

    if args.len() <= 1 {
        print!("{}", cli::usage(&bin));
        return 0;
    }

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) if err.kind() == ErrorKind::DisplayHelp => {
            print!("{}", cli::usage(&bin));
            return 0;
        }
        Err(err) if err.kind() == ErrorKind::DisplayVersion => {
            print!("{err}");
            return 0;
        }
        Err(err) => {
            return report(
                &bin,
                &ValidationError::Commandline(cli::describe_error(&err)).into(),
            );
        }
    };

    let result = match prepare(cli, stdin) {
        Ok(job) => execute(&job).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(_) => 0,
        Err(e) => report(&bin, &e),
    }
}

fn report(bin: &str, error: &AppError) -> u8 {
    match error {
        AppError::Validation(e) => {
            print!("{}", cli::usage(bin));
            println!("\nERROR {e}");
        }
        AppError::Delivery(e) => println!("Error: {e}"),
    }
    error.exit_code()
}
