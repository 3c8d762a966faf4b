//! Delivery over SMTP.

use crate::compose::Outgoing;
use crate::error::DeliveryError;
use crate::options::ResolvedOptions;
use mailer_smtp::{Credentials, Security, Transport};
use tracing::{info, warn};

/// Server connection settings shared by every message of a run.
#[derive(Debug, Clone)]
pub struct Delivery {
    transport: Transport,
    credentials: Credentials,
}

impl Delivery {
    /// Takes server, port, TLS mode and credentials from the options.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidPort`] if the port is not a number
    /// in `1..=65535`.
    pub fn from_options(options: &ResolvedOptions) -> Result<Self, DeliveryError> {
        let port = options
            .port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| DeliveryError::InvalidPort(options.port.clone()))?;
        let security = if options.use_tls {
            Security::Tls
        } else {
            Security::StartTls
        };

        Ok(Self {
            transport: Transport::new(options.server.as_str(), port, security),
            credentials: Credentials::new(options.user.as_str(), options.password.as_str()),
        })
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Sends one message in its own SMTP session.
    ///
    /// # Errors
    ///
    /// Returns the SMTP error that ended the session.
    pub async fn send(&self, outgoing: &Outgoing) -> Result<(), DeliveryError> {
        self.transport
            .send(
                &self.credentials,
                &outgoing.envelope,
                &outgoing.message.formatted(),
            )
            .await?;
        Ok(())
    }

    /// Sends messages in order, stopping at the first failure.
    ///
    /// Returns the number of messages sent.
    ///
    /// # Errors
    ///
    /// Returns the error of the first message that could not be sent.
    pub async fn send_all(&self, messages: &[Outgoing]) -> Result<usize, DeliveryError> {
        for (sent, outgoing) in messages.iter().enumerate() {
            if let Err(e) = self.send(outgoing).await {
                warn!(sent, total = messages.len(), error = %e, "sending aborted");
                return Err(e);
            }
            info!(
                number = sent + 1,
                total = messages.len(),
                to = %outgoing.message.headers().get("To").unwrap_or_default(),
                "message sent"
            );
        }
        Ok(messages.len())
    }
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
    use crate::compose::compose;

    fn options() -> ResolvedOptions {
        ResolvedOptions {
            user: "me@example.com".into(),
            password: "secret".into(),
            server: "127.0.0.1".into(),
            port: "587".into(),
            use_tls: false,
            from: "me@example.com".into(),
            to: "you@example.com".into(),
            cc: None,
            bcc: None,
            reply_to: None,
            read_receipt_to: None,
            subject: "Hi".into(),
            plain_body: "hello".into(),
            html_body: String::new(),
            attachments: Vec::new(),
            csv_file: None,
        }
    }

    #[test]
    fn test_security_from_options() {
        let delivery = Delivery::from_options(&options()).unwrap();
        assert_eq!(delivery.transport().security(), Security::StartTls);
        assert_eq!(delivery.transport().port(), 587);

        let mut tls = options();
        tls.use_tls = true;
        tls.port = "465".into();
        let delivery = Delivery::from_options(&tls).unwrap();
        assert_eq!(delivery.transport().security(), Security::Tls);
        assert_eq!(delivery.transport().host(), "127.0.0.1");
    }

    #[test]
    fn test_invalid_port() {
        for port in ["smtp", "0", "70000", ""] {
            let mut bad = options();
            bad.port = port.into();
            let err = Delivery::from_options(&bad).unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid port '{port}'"));
        }
    }

    #[tokio::test]
    async fn test_send_all_stops_at_first_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut options = options();
        options.port = port.to_string();
        let delivery = Delivery::from_options(&options).unwrap();
        let outgoing = compose(&options).unwrap();

        let err = delivery
            .send_all(&[outgoing.clone(), outgoing])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Smtp(mailer_smtp::Error::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_send_all_empty() {
        let delivery = Delivery::from_options(&options()).unwrap();
        assert_eq!(delivery.send_all(&[]).await.unwrap(), 0);
    }
}
