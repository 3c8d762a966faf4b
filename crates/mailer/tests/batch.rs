//! End-to-end runs against a scripted SMTP server on the loopback
//! interface: exit codes, CSV batches and what reaches the wire.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mailer::batch::read_csv;
use std::io::empty;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Commands and DATA lines of one SMTP session.
#[derive(Debug, Default)]
struct Session {
    commands: Vec<String>,
    data: Vec<String>,
}

impl Session {
    fn recipients(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| c.strip_prefix("RCPT TO:"))
            .collect()
    }

    fn header(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}: ");
        self.data.iter().find_map(|line| line.strip_prefix(&prefix))
    }
}

/// Serves up to `sessions` connections one after another. RCPT commands for
/// addresses containing `reject` get a 550.
async fn scripted_server(sessions: usize) -> (u16, JoinHandle<Vec<Session>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for _ in 0..sessions {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut reader = BufReader::new(read);
            let mut session = Session::default();
            let mut in_data = false;

            write.write_all(b"220 mx.test ESMTP\r\n").await.unwrap();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                let line = line.trim_end_matches(['\r', '\n']).to_string();

                if in_data {
                    if line == "." {
                        in_data = false;
                        write.write_all(b"250 queued\r\n").await.unwrap();
                    } else {
                        session.data.push(line);
                    }
                    continue;
                }

                session.commands.push(line.clone());
                let verb = line
                    .split([' ', ':'])
                    .next()
                    .unwrap_or_default()
                    .to_ascii_uppercase();
                let reply: &[u8] = match verb.as_str() {
                    "EHLO" => b"250-mx.test\r\n250 AUTH PLAIN\r\n",
                    "AUTH" => b"235 ok\r\n",
                    "RCPT" if line.contains("reject") => b"550 no such user\r\n",
                    "MAIL" | "RCPT" => b"250 ok\r\n",
                    "DATA" => {
                        in_data = true;
                        b"354 go ahead\r\n"
                    }
                    "QUIT" => {
                        write.write_all(b"221 bye\r\n").await.unwrap();
                        break;
                    }
                    _ => b"500 unrecognized\r\n",
                };
                write.write_all(reply).await.unwrap();
            }
            seen.push(session);
        }
        seen
    });

    (port, handle)
}

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.yml"), "").unwrap();
        Self { dir }
    }

    fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn config(&self) -> PathBuf {
        self.dir.path().join("empty.yml")
    }

    /// Arguments for a complete run against `127.0.0.1:port`.
    fn args(&self, port: u16, extra: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = [
            "mailer", "-o", path_str(&self.config()), "-u", "me@example.com", "-p", "secret",
            "-S", "127.0.0.1", "-P",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        args.push(port.to_string());
        args.extend(extra.iter().map(ToString::to_string));
        args
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_single_message() {
    let fixture = Fixture::new();
    let (port, server) = scripted_server(1).await;

    let args = fixture.args(
        port,
        &["-t", "you@example.com", "-c", "cc@example.com", "-b", "hidden@example.com",
          "-s", "Hi", "-m", "hello", "-f", "Me"],
    );
    assert_eq!(mailer::run(args, empty()).await, 0);

    let sessions = server.await.unwrap();
    let session = &sessions[0];
    assert_eq!(session.commands[0], "EHLO localhost");
    assert!(session.commands[1].starts_with("AUTH PLAIN "));
    assert_eq!(session.commands[2], "MAIL FROM:<me@example.com>");
    assert_eq!(
        session.recipients(),
        vec!["<you@example.com>", "<cc@example.com>", "<hidden@example.com>"]
    );
    assert_eq!(session.header("From"), Some("Me <me@example.com>"));
    assert_eq!(session.header("Cc"), Some("cc@example.com"));
    assert_eq!(session.header("Bcc"), None);
    assert_eq!(session.header("MIME-Version"), Some("1.0"));
    assert!(session.data.iter().any(|line| line == "hello"));
}

#[tokio::test]
async fn test_csv_batch_one_message_per_row() {
    let fixture = Fixture::new();
    let csv = fixture.file(
        "list.csv",
        "to,name\ncarol@example.com,Carol\ndave@example.com,Dave\n",
    );
    let (port, server) = scripted_server(2).await;

    let args = fixture.args(
        port,
        &["-t", "fallback@example.com", "-s", "Hi {{name}}", "-m", "Hello {{name}}!",
          "-C", path_str(&csv)],
    );
    assert_eq!(mailer::run(args, empty()).await, 0);

    let sessions = server.await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].recipients(), vec!["<carol@example.com>"]);
    assert_eq!(sessions[0].header("Subject"), Some("Hi Carol"));
    assert!(sessions[0].data.iter().any(|line| line == "Hello Carol!"));
    assert_eq!(sessions[1].recipients(), vec!["<dave@example.com>"]);
    assert_eq!(sessions[1].header("To"), Some("dave@example.com"));
}

#[tokio::test]
async fn test_csv_batch_aborts_on_first_failure() {
    let fixture = Fixture::new();
    let csv = fixture.file(
        "list.csv",
        "to\nok@example.com\nreject@example.com\nnever@example.com\n",
    );
    let (port, server) = scripted_server(2).await;

    let args = fixture.args(port, &["-t", "x@example.com", "-s", "Hi", "-m", "x", "-C", path_str(&csv)]);
    assert_eq!(mailer::run(args, empty()).await, 2);

    let sessions = server.await.unwrap();
    assert_eq!(sessions[0].recipients(), vec!["<ok@example.com>"]);
    assert_eq!(sessions[1].recipients(), vec!["<reject@example.com>"]);
    assert!(!sessions[1].commands.iter().any(|c| c == "DATA"));
}

#[tokio::test]
async fn test_csv_header_only_sends_nothing() {
    let fixture = Fixture::new();
    let csv = fixture.file("list.csv", "to,subject\n");
    assert!(read_csv(&csv).unwrap().is_empty());

    let args = fixture.args(
        closed_port(),
        &["-t", "x@example.com", "-s", "Hi", "-m", "x", "-C", path_str(&csv)],
    );
    assert_eq!(mailer::run(args, empty()).await, 0);
}

#[tokio::test]
async fn test_bad_csv_row_is_validation_error() {
    let fixture = Fixture::new();
    let csv = fixture.file("list.csv", "to,from\nok@example.com,\nbad@example.com,Nobody\n");

    // User without "@" and a from column without an address.
    let mut args = fixture.args(closed_port(), &["-t", "x@example.com", "-s", "Hi", "-m", "x"]);
    args[4] = "login".to_string();
    args.extend(["-f".to_string(), "a@b.com".to_string(), "-C".to_string(), path_str(&csv).to_string()]);
    assert_eq!(mailer::run(args, empty()).await, 1);
}

#[tokio::test]
async fn test_exit_codes() {
    let fixture = Fixture::new();

    assert_eq!(mailer::run(["mailer"], empty()).await, 0);
    assert_eq!(mailer::run(["mailer", "--help"], empty()).await, 0);
    assert_eq!(mailer::run(["mailer", "-V"], empty()).await, 0);
    assert_eq!(mailer::run(["mailer", "--frobnicate"], empty()).await, 1);
    assert_eq!(mailer::run(["mailer", "-t"], empty()).await, 1);

    let missing_subject = fixture.args(closed_port(), &["-t", "x@example.com", "-m", "x"]);
    assert_eq!(mailer::run(missing_subject, empty()).await, 1);

    let missing_attachment = fixture.args(
        closed_port(),
        &["-t", "x@example.com", "-s", "Hi", "-m", "x", "-a", "/nonexistent/file.pdf"],
    );
    assert_eq!(mailer::run(missing_attachment, empty()).await, 1);

    let refused = fixture.args(closed_port(), &["-t", "x@example.com", "-s", "Hi", "-m", "x"]);
    assert_eq!(mailer::run(refused, empty()).await, 2);

    let bad_port = fixture.args(0, &["-t", "x@example.com", "-s", "Hi", "-m", "x"]);
    assert_eq!(mailer::run(bad_port, empty()).await, 2);
}
