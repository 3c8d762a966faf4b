//! CSV bulk sending.
//!
//! The header row names the columns. Each data row becomes a
//! [`BatchRecord`] that is laid over the resolved options to produce one
//! message: columns named after a per-message option replace it, and every
//! column can be used as a `{{header}}` placeholder in the subject and
//! bodies.

use crate::error::ValidationError;
use crate::options::{ResolvedOptions, derive_from};
use std::path::Path;
use tracing::debug;

/// One CSV data row keyed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRecord {
    fields: Vec<(String, String)>,
}

impl BatchRecord {
    /// Returns the value of a column (header matched case-insensitively).
    #[must_use]
    pub fn get(&self, header: &str) -> Option<&str> {
        let header = header.trim();
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(header))
            .map(|(_, value)| value.as_str())
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn non_empty(&self, header: &str) -> Option<&str> {
        self.get(header).filter(|value| !value.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BatchRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_string(), v.into()))
                .collect(),
        }
    }
}

/// Reads every data row of a CSV file.
///
/// # Errors
///
/// Returns an error naming the path if the file cannot be opened or is
/// malformed (rows of different length, bad quoting, invalid UTF-8).
pub fn read_csv(path: &Path) -> Result<Vec<BatchRecord>, ValidationError> {
    let file =
        std::fs::File::open(path).map_err(|_| ValidationError::CsvOpen(path.to_path_buf()))?;
    let read_error = |e: csv::Error| ValidationError::CsvRead {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(file);
    let headers = reader.headers().map_err(read_error)?.clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(read_error)?;
        records.push(headers.iter().zip(row.iter()).collect());
    }

    debug!(path = %path.display(), rows = records.len(), "CSV file read");
    Ok(records)
}

/// Applies one record to a copy of the resolved options.
///
/// Non-empty `to`, `cc`, `bcc`, `reply`, `read`, `subject`, `from`,
/// `message` and `nmessage` columns replace those options. Server, port,
/// credentials and attachments stay as resolved.
///
/// # Errors
///
/// Returns [`ValidationError::NoFromEmail`] if a `from` column yields no
/// address.
pub fn overlay(
    base: &ResolvedOptions,
    record: &BatchRecord,
) -> Result<ResolvedOptions, ValidationError> {
    let mut options = base.clone();

    if let Some(to) = record.non_empty("to") {
        options.to = to.to_string();
    }
    for (header, field) in [
        ("cc", &mut options.cc),
        ("bcc", &mut options.bcc),
        ("reply", &mut options.reply_to),
        ("read", &mut options.read_receipt_to),
    ] {
        if let Some(value) = record.non_empty(header) {
            *field = Some(value.to_string());
        }
    }
    if let Some(from) = record.non_empty("from") {
        options.from = derive_from(from, &options.user)?;
    }
    if let Some(subject) = record.non_empty("subject") {
        options.subject = subject.to_string();
    }
    if let Some(message) = record.non_empty("message") {
        options.plain_body = message.to_string();
    }
    if let Some(nmessage) = record.non_empty("nmessage") {
        options.html_body = nmessage.to_string();
    }

    options.subject = substitute(&options.subject, record);
    options.plain_body = substitute(&options.plain_body, record);
    options.html_body = substitute(&options.html_body, record);

    Ok(options)
}

/// Replaces `{{header}}` placeholders with the record's values.
///
/// Placeholders naming no column are left as they are.
#[must_use]
pub fn substitute(template: &str, record: &BatchRecord) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };

        match record.get(&after[..end]) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
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
    use std::path::PathBuf;

    fn base() -> ResolvedOptions {
        ResolvedOptions {
            user: "me@example.com".into(),
            password: "secret".into(),
            server: "smtp.example.com".into(),
            port: "587".into(),
            use_tls: false,
            from: "me@example.com".into(),
            to: "default@example.com".into(),
            cc: None,
            bcc: None,
            reply_to: None,
            read_receipt_to: Some("receipts@example.com".into()),
            subject: "Hello {{name}}".into(),
            plain_body: "Dear {{ Name }}, your code is {{code}}.".into(),
            html_body: String::new(),
            attachments: vec![PathBuf::from("terms.pdf")],
            csv_file: Some(PathBuf::from("list.csv")),
        }
    }

    fn record(pairs: &[(&str, &str)]) -> BatchRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_record_lookup() {
        let record = record(&[(" To ", "c@z.com"), ("subject", "Batch Hi")]);
        assert_eq!(record.get("to"), Some("c@z.com"));
        assert_eq!(record.get("SUBJECT"), Some("Batch Hi"));
        assert_eq!(record.get("cc"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_overlay_replaces_per_message_fields() {
        let record = record(&[
            ("to", "c@z.com"),
            ("Subject", "Batch Hi"),
            ("cc", ""),
            ("from", "Support"),
        ]);
        let options = overlay(&base(), &record).unwrap();

        assert_eq!(options.to, "c@z.com");
        assert_eq!(options.subject, "Batch Hi");
        assert_eq!(options.cc, None);
        assert_eq!(options.from, "Support <me@example.com>");
        assert_eq!(options.server, "smtp.example.com");
        assert_eq!(options.attachments, vec![PathBuf::from("terms.pdf")]);
        assert_eq!(
            options.read_receipt_to.as_deref(),
            Some("receipts@example.com")
        );
    }

    #[test]
    fn test_overlay_substitutes_placeholders() {
        let record = record(&[("to", "c@z.com"), ("name", "Carol"), ("code", "X1")]);
        let options = overlay(&base(), &record).unwrap();
        assert_eq!(options.subject, "Hello Carol");
        assert_eq!(options.plain_body, "Dear Carol, your code is X1.");
    }

    #[test]
    fn test_overlay_bad_from() {
        let mut base = base();
        base.user = "login-name".into();
        let err = overlay(&base, &record(&[("from", "Support")])).unwrap_err();
        assert!(matches!(err, ValidationError::NoFromEmail));
    }

    #[test]
    fn test_substitute_edge_cases() {
        let record = record(&[("a", "1")]);
        assert_eq!(substitute("{{a}}{{a}}", &record), "11");
        assert_eq!(substitute("{{b}} stays", &record), "{{b}} stays");
        assert_eq!(substitute("open {{a", &record), "open {{a");
        assert_eq!(substitute("no placeholders", &record), "no placeholders");
        assert_eq!(substitute("{{}}", &record), "{{}}");
    }

    #[test]
    fn test_read_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.csv");
        std::fs::write(&path, "to,subject\nc@z.com,Batch Hi\n").unwrap();

        let records = read_csv(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], record(&[("to", "c@z.com"), ("subject", "Batch Hi")]));
    }

    #[test]
    fn test_read_csv_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.csv");
        std::fs::write(&path, "to,subject\n").unwrap();
        assert!(read_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn test_read_csv_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        assert_eq!(
            read_csv(&missing).unwrap_err().to_string(),
            format!("Cannot open CSV file '{}'", missing.display())
        );

        let ragged = dir.path().join("ragged.csv");
        std::fs::write(&ragged, "to,subject\nc@z.com\n").unwrap();
        let message = read_csv(&ragged).unwrap_err().to_string();
        assert!(message.starts_with(&format!("Error reading CSV file '{}': ", ragged.display())));
    }
}
