//! # mailer-smtp
//!
//! A small SMTP submission client (RFC 5321) for sending one message per
//! connection.
//!
//! ## Features
//!
//! - **Type-state client**: authentication must succeed before a mail
//!   transaction can start
//! - **TLS support**: implicit TLS (port 465) and STARTTLS, always verified
//!   against the webpki roots and the server name
//! - **Authentication**: AUTH PLAIN
//! - **Extensions**: STARTTLS, AUTH, SIZE
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailer_smtp::{Address, Credentials, Envelope, Security, Transport};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> mailer_smtp::Result<()> {
//!     let transport = Transport::new("smtp.example.com", 587, Security::StartTls);
//!     let envelope = Envelope {
//!         from: Address::new("sender@example.com")?,
//!         recipients: vec![Address::new("recipient@example.com")?],
//!     };
//!     let credentials = Credentials::new("sender@example.com", "password");
//!
//!     transport
//!         .send(&credentials, &envelope, b"Subject: Test\r\n\r\nHello!\r\n")
//!         .await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐                     ┌───────────────┐
//! │  Connected   │ ─── auth_plain() ──→│ Authenticated │ ─── send_mail() ──┐
//! └──────────────┘                     └───────────────┘ ←─────────────────┘
//!    │  ehlo(), starttls()
//!    └────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
mod transport;
pub mod types;

pub use connection::{Authenticated, Client, Connected, SmtpStream};
pub use error::{Error, Result};
pub use transport::{Credentials, Envelope, Security, Transport, is_local_host};
pub use types::{Address, Capabilities, Reply, ReplyCode};
