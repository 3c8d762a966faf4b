//! Integration tests for a full submission session.
//!
//! A scripted server on the loopback interface plays the SMTP peer, so the
//! plaintext path (no STARTTLS offered, local host) is exercised end to end.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mailer_smtp::{Address, Credentials, Envelope, Error, Security, Transport};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the scripted server saw: command lines and DATA lines.
#[derive(Debug, Default)]
struct Transcript {
    commands: Vec<String>,
    data: Vec<String>,
}

/// Starts a one-connection server answering with the given EHLO and AUTH replies.
async fn scripted_server(
    ehlo_reply: &'static str,
    auth_reply: &'static str,
) -> (u16, JoinHandle<Transcript>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut transcript = Transcript::default();
        let mut in_data = false;

        write.write_all(b"220 mx.test ESMTP ready\r\n").await.unwrap();

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']).to_string();

            if in_data {
                if line == "." {
                    in_data = false;
                    write.write_all(b"250 2.0.0 queued\r\n").await.unwrap();
                } else {
                    transcript.data.push(line);
                }
                continue;
            }

            transcript.commands.push(line.clone());
            let verb = line
                .split([' ', ':'])
                .next()
                .unwrap_or_default()
                .to_ascii_uppercase();
            let reply = match verb.as_str() {
                "EHLO" => ehlo_reply,
                "AUTH" => auth_reply,
                "MAIL" | "RCPT" => "250 2.1.0 OK\r\n",
                "DATA" => {
                    in_data = true;
                    "354 go ahead\r\n"
                }
                "QUIT" => {
                    write.write_all(b"221 2.0.0 bye\r\n").await.unwrap();
                    break;
                }
                _ => "500 5.5.1 unrecognized\r\n",
            };
            write.write_all(reply.as_bytes()).await.unwrap();
        }

        transcript
    });

    (port, handle)
}

fn envelope() -> Envelope {
    Envelope {
        from: Address::new("a@x.com").unwrap(),
        recipients: vec![
            Address::new("b@y.com").unwrap(),
            Address::new("c@z.com").unwrap(),
        ],
    }
}

#[tokio::test]
async fn test_full_session_over_loopback() {
    let (port, server) = scripted_server(
        "250-mx.test\r\n250-SIZE 1000000\r\n250 AUTH PLAIN LOGIN\r\n",
        "235 2.7.0 accepted\r\n",
    )
    .await;

    let transport = Transport::new("127.0.0.1", port, Security::StartTls);
    let message = b"Subject: Hi\r\n\r\nhello\r\n.dot line\r\n";
    transport
        .send(&Credentials::new("a@x.com", "secret"), &envelope(), message)
        .await
        .unwrap();

    let transcript = server.await.unwrap();
    assert_eq!(transcript.commands[0], "EHLO localhost");
    assert_eq!(transcript.commands[1], "AUTH PLAIN AGFAeC5jb20Ac2VjcmV0");
    assert!(transcript.commands[2].starts_with("MAIL FROM:<a@x.com> SIZE="));
    assert_eq!(transcript.commands[3], "RCPT TO:<b@y.com>");
    assert_eq!(transcript.commands[4], "RCPT TO:<c@z.com>");
    assert_eq!(transcript.commands[5], "DATA");
    assert_eq!(transcript.commands[6], "QUIT");
    assert_eq!(
        transcript.data,
        vec!["Subject: Hi", "", "hello", "..dot line"]
    );
}

#[tokio::test]
async fn test_rejected_credentials() {
    let (port, server) = scripted_server(
        "250-mx.test\r\n250 AUTH PLAIN\r\n",
        "535 5.7.8 Username and Password not accepted\r\n",
    )
    .await;

    let transport = Transport::new("127.0.0.1", port, Security::StartTls);
    let err = transport
        .send(&Credentials::new("a@x.com", "wrong"), &envelope(), b"x")
        .await
        .unwrap_err();

    assert!(err.is_auth_failure(), "unexpected error: {err}");
    let transcript = server.await.unwrap();
    assert!(!transcript.commands.iter().any(|c| c.starts_with("MAIL")));
}

#[tokio::test]
async fn test_server_without_auth() {
    let (port, _server) = scripted_server("250 mx.test\r\n", "235 ok\r\n").await;

    let transport = Transport::new("127.0.0.1", port, Security::StartTls);
    let err = transport
        .send(&Credentials::new("a@x.com", "secret"), &envelope(), b"x")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotSupported(ref what) if what == "AUTH"));
}

#[tokio::test]
async fn test_server_without_auth_plain() {
    let (port, server) =
        scripted_server("250-mx.test\r\n250 AUTH LOGIN\r\n", "235 ok\r\n").await;

    let transport = Transport::new("127.0.0.1", port, Security::StartTls);
    let err = transport
        .send(&Credentials::new("a@x.com", "secret"), &envelope(), b"x")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotSupported(ref what) if what == "AUTH PLAIN"));
    let transcript = server.await.unwrap();
    assert!(!transcript.commands.iter().any(|c| c.starts_with("AUTH")));
}

#[tokio::test]
async fn test_message_over_size_limit() {
    let (port, server) = scripted_server(
        "250-mx.test\r\n250-SIZE 16\r\n250 AUTH PLAIN\r\n",
        "235 ok\r\n",
    )
    .await;

    let transport = Transport::new("127.0.0.1", port, Security::StartTls);
    let err = transport
        .send(
            &Credentials::new("a@x.com", "secret"),
            &envelope(),
            b"Subject: a rather long subject\r\n\r\nbody\r\n",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MessageTooLarge { limit: 16, .. }));
    drop(server);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let transport = Transport::new("127.0.0.1", port, Security::StartTls);
    let err = transport
        .send(&Credentials::new("a@x.com", "secret"), &envelope(), b"x")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
}
