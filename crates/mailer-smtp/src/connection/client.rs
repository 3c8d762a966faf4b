//! Type-state SMTP client.

use super::SmtpStream;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, Capabilities, Reply, ReplyCode};
use base64::Engine;
use std::marker::PhantomData;
use tracing::debug;

/// Type-state marker for a greeted connection (before authentication).
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for an authenticated session.
#[derive(Debug)]
pub struct Authenticated;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    capabilities: Capabilities,
    _state: PhantomData<State>,
}

impl<S> Client<S> {
    /// Returns the capabilities from the most recent EHLO.
    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Returns true if the session runs over TLS.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.stream.is_encrypted()
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(Error::smtp_error(reply.code.as_u16(), reply.text()));
        }
        Ok(())
    }

    fn into_state<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            capabilities: self.capabilities,
            _state: PhantomData,
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        debug!(command = %cmd.redacted(), "smtp >");
        self.stream.write_all(&cmd.serialize()).await?;
        let reply = read_reply(&mut self.stream).await?;
        debug!(code = reply.code.as_u16(), text = %reply.text(), "smtp <");
        Ok(reply)
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server refuses service.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;
        debug!(greeting = %greeting.text(), "smtp <");

        Ok(Self {
            stream,
            capabilities: Capabilities::default(),
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let cmd = Command::Ehlo {
            hostname: client_hostname.to_string(),
        };
        let reply = self.send_command(&cmd).await?.expect_success()?;
        self.capabilities = Capabilities::from_ehlo(&reply.lines);
        Ok(self)
    }

    /// Upgrades the connection with STARTTLS, verifying `server_name`, and
    /// repeats EHLO over the encrypted channel.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is refused or the TLS handshake fails.
    pub async fn starttls(mut self, server_name: &str, client_hostname: &str) -> Result<Self> {
        if !self.capabilities.starttls {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.send_command(&Command::StartTls).await?.expect_success()?;
        self.stream = self.stream.upgrade_to_tls(server_name).await?;
        self.capabilities = Capabilities::default();

        self.ehlo(client_hostname).await
    }

    /// Authenticates using the PLAIN mechanism (RFC 4616).
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not offer AUTH PLAIN or rejects
    /// the credentials.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        if self.capabilities.auth.is_empty() {
            return Err(Error::NotSupported("AUTH".into()));
        }
        if !self.capabilities.supports_auth("PLAIN") {
            return Err(Error::NotSupported("AUTH PLAIN".into()));
        }

        let credentials = format!("\0{username}\0{password}");
        let cmd = Command::AuthPlain {
            initial_response: base64::engine::general_purpose::STANDARD
                .encode(credentials.as_bytes()),
        };

        self.send_command(&cmd)
            .await?
            .expect_code(ReplyCode::AUTH_OK)?;

        Ok(self.into_state())
    }
}

impl Client<Authenticated> {
    /// Runs one mail transaction: MAIL FROM, RCPT TO for every recipient,
    /// DATA and the message content.
    ///
    /// `message` should be an RFC 5322 message. Line endings are normalized
    /// to CRLF, lines starting with `.` are dot-stuffed and the terminating
    /// `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the message exceeds the server's size limit or
    /// the server rejects any step of the transaction.
    pub async fn send_mail(
        mut self,
        from: &Address,
        recipients: &[Address],
        message: &[u8],
    ) -> Result<Self> {
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        let payload = encode_data(message);
        let max_size = self.capabilities.max_size;
        if let Some(limit) = max_size.filter(|&limit| payload.len() > limit) {
            return Err(Error::MessageTooLarge {
                size: payload.len(),
                limit,
            });
        }

        let cmd = Command::MailFrom {
            from: from.clone(),
            size: max_size.map(|_| payload.len()),
        };
        self.send_command(&cmd).await?.expect_success()?;

        for to in recipients {
            let cmd = Command::RcptTo { to: to.clone() };
            self.send_command(&cmd).await?.expect_success()?;
        }

        self.send_command(&Command::Data)
            .await?
            .expect_code(ReplyCode::START_DATA)?;

        debug!(bytes = payload.len(), "smtp > message data");
        self.stream.write_all(&payload).await?;
        let reply = read_reply(&mut self.stream).await?.expect_success()?;
        debug!(code = reply.code.as_u16(), text = %reply.text(), "smtp <");

        Ok(self)
    }
}

/// Reads one complete (possibly multi-line) reply.
async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

/// Normalizes line endings to CRLF, dot-stuffs and terminates the payload.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 32 + 5);
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
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
    fn data_is_crlf_normalized_and_terminated() {
        assert_eq!(
            encode_data(b"Subject: x\n\nhello\r\nworld\n"),
            b"Subject: x\r\n\r\nhello\r\nworld\r\n.\r\n"
        );
    }

    #[test]
    fn data_is_dot_stuffed() {
        assert_eq!(encode_data(b".hidden\n..two"), b"..hidden\r\n...two\r\n.\r\n");
    }

    #[test]
    fn empty_data_is_just_terminator() {
        assert_eq!(encode_data(b""), b".\r\n");
    }
}
