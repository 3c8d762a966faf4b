//! Config file loading.
//!
//! The config file is YAML with one scalar per option. Unknown keys are
//! rejected. Keys may be written lowercase, capitalized (`User`,
//! `CSVfile`) or as `csv_file`.

use crate::error::ValidationError;
use crate::options::PartialOptions;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up in the home directory when `-o` is not given.
pub const DEFAULT_FILE_NAME: &str = ".mailer";

/// Values that turn the `tls` option off.
const FALSE_VALUES: [&str; 5] = ["", "0", "no", "false", "off"];

/// Raw config file contents.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Login user.
    #[serde(default, alias = "User", deserialize_with = "scalar")]
    pub user: Option<String>,
    /// Login password.
    #[serde(default, alias = "Password", deserialize_with = "scalar")]
    pub password: Option<String>,
    /// Mail server.
    #[serde(default, alias = "Server", deserialize_with = "scalar")]
    pub server: Option<String>,
    /// Mail server port.
    #[serde(default, alias = "Port", deserialize_with = "scalar")]
    pub port: Option<String>,
    /// Implicit TLS switch.
    #[serde(default, alias = "TLS", alias = "Tls", deserialize_with = "scalar")]
    pub tls: Option<String>,
    /// From name or address.
    #[serde(default, alias = "From", deserialize_with = "scalar")]
    pub from: Option<String>,
    /// Cc addresses.
    #[serde(default, alias = "CC", alias = "Cc", deserialize_with = "scalar")]
    pub cc: Option<String>,
    /// Bcc addresses.
    #[serde(default, alias = "BCC", alias = "Bcc", deserialize_with = "scalar")]
    pub bcc: Option<String>,
    /// Reply-To addresses.
    #[serde(default, alias = "Reply", deserialize_with = "scalar")]
    pub reply: Option<String>,
    /// Read receipt addresses.
    #[serde(default, alias = "Read", deserialize_with = "scalar")]
    pub read: Option<String>,
    /// To addresses.
    #[serde(default, alias = "To", deserialize_with = "scalar")]
    pub to: Option<String>,
    /// Subject line.
    #[serde(default, alias = "Subject", deserialize_with = "scalar")]
    pub subject: Option<String>,
    /// Plain text body.
    #[serde(default, alias = "Message", deserialize_with = "scalar")]
    pub message: Option<String>,
    /// Plain text body file.
    #[serde(default, alias = "Mfile", deserialize_with = "scalar")]
    pub mfile: Option<String>,
    /// HTML body.
    #[serde(default, alias = "Nmessage", deserialize_with = "scalar")]
    pub nmessage: Option<String>,
    /// HTML body file.
    #[serde(default, alias = "Nfile", deserialize_with = "scalar")]
    pub nfile: Option<String>,
    /// Single file to attach.
    #[serde(default, alias = "Attachment", deserialize_with = "scalar")]
    pub attachment: Option<String>,
    /// CSV file for bulk sending.
    #[serde(
        default,
        alias = "CSVfile",
        alias = "csv_file",
        deserialize_with = "scalar"
    )]
    pub csvfile: Option<String>,
}

impl ConfigFile {
    /// Parses YAML text; an empty document yields an empty config.
    ///
    /// # Errors
    ///
    /// Returns the decoder error for bad syntax, unknown keys or
    /// non-scalar values.
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }
}

impl From<ConfigFile> for PartialOptions {
    fn from(config: ConfigFile) -> Self {
        Self {
            user: non_empty(config.user),
            password: non_empty(config.password),
            server: non_empty(config.server),
            port: non_empty(config.port),
            tls: config.tls.map(|value| tls_enabled(&value)),
            from: non_empty(config.from),
            to: non_empty(config.to),
            cc: non_empty(config.cc),
            bcc: non_empty(config.bcc),
            reply: non_empty(config.reply),
            read: non_empty(config.read),
            subject: non_empty(config.subject),
            message: non_empty(config.message),
            mfile: non_empty(config.mfile).map(PathBuf::from),
            nmessage: non_empty(config.nmessage),
            nfile: non_empty(config.nfile).map(PathBuf::from),
            attachments: non_empty(config.attachment)
                .map(PathBuf::from)
                .into_iter()
                .collect(),
            csv: non_empty(config.csvfile).map(PathBuf::from),
        }
    }
}

/// Whether a config `tls` value turns implicit TLS on.
#[must_use]
pub fn tls_enabled(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    !FALSE_VALUES.contains(&value.as_str())
}

/// Loads and decodes a config file.
///
/// # Errors
///
/// Returns an error naming the path if the file is missing, unreadable or
/// not a valid config.
pub fn load(path: &Path) -> Result<PartialOptions, ValidationError> {
    if !path.exists() {
        return Err(ValidationError::ConfigNotFound(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path).map_err(|source| ValidationError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    let config = ConfigFile::parse(&text).map_err(|e| ValidationError::ConfigSyntax {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    debug!(path = %path.display(), "config file loaded");
    Ok(config.into())
}

/// Returns `$HOME/.mailer` if it exists.
#[must_use]
pub fn discover() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_FILE_NAME))
        .filter(|path| path.is_file())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Accepts strings, numbers and booleans as text (`port: 465`, `tls: true`).
fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Bool(b) => b.to_string(),
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(x) => x.to_string(),
        Scalar::Text(s) => s,
    }))
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
    fn test_parse_lowercase_keys() {
        let config = ConfigFile::parse(
            "user: me@example.com\npassword: hunter2\nport: 465\ntls: yes\nsubject: Hi\n",
        )
        .unwrap();
        assert_eq!(config.user.as_deref(), Some("me@example.com"));
        assert_eq!(config.port.as_deref(), Some("465"));
        assert_eq!(config.tls.as_deref(), Some("yes"));
    }

    #[test]
    fn test_parse_aliases() {
        let config = ConfigFile::parse(
            "User: me@example.com\nCSVfile: list.csv\nTLS: false\nCC: c@x.com\n",
        )
        .unwrap();
        assert_eq!(config.user.as_deref(), Some("me@example.com"));
        assert_eq!(config.csvfile.as_deref(), Some("list.csv"));
        assert_eq!(config.tls.as_deref(), Some("false"));
        assert_eq!(config.cc.as_deref(), Some("c@x.com"));

        let config = ConfigFile::parse("csv_file: other.csv\n").unwrap();
        assert_eq!(config.csvfile.as_deref(), Some("other.csv"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ConfigFile::parse("usr: me@example.com\n").unwrap_err();
        assert!(err.to_string().contains("unknown field `usr`"));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(ConfigFile::parse("").unwrap(), ConfigFile::default());
        assert_eq!(ConfigFile::parse("\n  \n").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_null_value_is_absent() {
        let config = ConfigFile::parse("cc:\nbcc: ~\n").unwrap();
        assert_eq!(config.cc, None);
        assert_eq!(config.bcc, None);
    }

    #[test]
    fn test_tls_enabled() {
        for value in ["", "0", "no", "false", "off", " OFF ", "False"] {
            assert!(!tls_enabled(value), "{value:?} should be off");
        }
        for value in ["1", "yes", "true", "on", "anything"] {
            assert!(tls_enabled(value), "{value:?} should be on");
        }
    }

    #[test]
    fn test_into_partial() {
        let config = ConfigFile::parse(
            "to: b@y.com\ncc: ''\nattachment: file.pdf\nmfile: body.txt\ntls: off\n",
        )
        .unwrap();
        let partial = PartialOptions::from(config);
        assert_eq!(partial.to.as_deref(), Some("b@y.com"));
        assert_eq!(partial.cc, None);
        assert_eq!(partial.attachments, vec![PathBuf::from("file.pdf")]);
        assert_eq!(partial.mfile, Some(PathBuf::from("body.txt")));
        assert_eq!(partial.tls, Some(false));
    }

    #[test]
    fn test_load_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yml");
        assert_eq!(
            load(&missing).unwrap_err().to_string(),
            format!("Config file '{}' not found", missing.display())
        );

        let broken = dir.path().join("broken.yml");
        std::fs::write(&broken, "user: [unclosed\n").unwrap();
        let message = load(&broken).unwrap_err().to_string();
        assert!(message.starts_with(&format!("Error in config file '{}':\n", broken.display())));
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".mailer");
        std::fs::write(&path, "user: me@example.com\nport: 2525\n").unwrap();

        let partial = load(&path).unwrap();
        assert_eq!(partial.user.as_deref(), Some("me@example.com"));
        assert_eq!(partial.port.as_deref(), Some("2525"));
        assert_eq!(partial.tls, None);
    }
}
