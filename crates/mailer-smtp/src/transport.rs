//! One-shot message submission over a fresh connection.

use crate::connection::{Client, Connected, connect, connect_tls};
use crate::error::{Error, Result};
use crate::types::Address;
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, info};

/// How the connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// TLS from the first byte (SMTPS, usually port 465).
    Tls,
    /// Plain connect, upgraded with STARTTLS when the server offers it.
    StartTls,
}

/// Username and password for AUTH PLAIN.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Envelope sender and recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `MAIL FROM` address.
    pub from: Address,
    /// `RCPT TO` addresses, in order.
    pub recipients: Vec<Address>,
}

/// Name announced in EHLO.
const CLIENT_NAME: &str = "localhost";

/// SMTP submission endpoint.
#[derive(Debug, Clone)]
pub struct Transport {
    host: String,
    port: u16,
    security: Security,
}

impl Transport {
    /// Creates a transport for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, security: Security) -> Self {
        Self {
            host: host.into(),
            port,
            security,
        }
    }

    /// Returns the server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the security mode.
    #[must_use]
    pub const fn security(&self) -> Security {
        self.security
    }

    /// Connects, authenticates, submits `message` and quits.
    ///
    /// With [`Security::StartTls`] the connection is upgraded when the
    /// server advertises STARTTLS. Credentials are only sent over an
    /// unencrypted connection when the server is on the local host.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, the TLS handshake, authentication or
    /// any step of the mail transaction fails.
    pub async fn send(
        &self,
        credentials: &Credentials,
        envelope: &Envelope,
        message: &[u8],
    ) -> Result<()> {
        let client = self.open().await?;

        if !client.is_encrypted() && !is_local_host(&self.host) {
            // Best effort; the refusal is the error that matters.
            let _ = client.quit().await;
            return Err(Error::InsecureAuth(self.host.clone()));
        }

        let client = client
            .auth_plain(&credentials.username, &credentials.password)
            .await?;
        debug!(user = %credentials.username, "authenticated");

        let client = client
            .send_mail(&envelope.from, &envelope.recipients, message)
            .await?;
        info!(
            server = %self.host,
            recipients = envelope.recipients.len(),
            "message accepted"
        );

        client.quit().await
    }

    async fn open(&self) -> Result<Client<Connected>> {
        debug!(host = %self.host, port = self.port, security = ?self.security, "connecting");
        let stream = match self.security {
            Security::Tls => connect_tls(&self.host, self.port).await?,
            Security::StartTls => connect(&self.host, self.port).await?,
        };

        let client = Client::from_stream(stream)
            .await?
            .ehlo(CLIENT_NAME)
            .await?;

        if self.security == Security::StartTls && client.capabilities().starttls {
            client.starttls(&self.host, CLIENT_NAME).await
        } else {
            Ok(client)
        }
    }
}

/// Returns true for `localhost` and loopback IP literals.
#[must_use]
pub fn is_local_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
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

    #[test]
    fn local_hosts() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("LOCALHOST"));
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("::1"));
        assert!(is_local_host("[::1]"));
        assert!(!is_local_host("smtp.gmail.com"));
        assert!(!is_local_host("10.0.0.1"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("me@example.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
