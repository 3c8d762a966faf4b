//! Server capabilities advertised in the EHLO reply.

/// Extensions the client cares about, parsed from EHLO.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Greeting line of the EHLO reply (normally the server's name).
    pub greeting: String,
    /// `STARTTLS` was advertised.
    pub starttls: bool,
    /// Upper-cased SASL mechanisms from `AUTH`.
    pub auth: Vec<String>,
    /// Maximum message size from `SIZE`, if given and non-zero.
    pub max_size: Option<usize>,
}

impl Capabilities {
    /// Parses the text lines of an EHLO reply.
    ///
    /// The first line is the greeting; each following line is one keyword
    /// with optional parameters. Unknown keywords are ignored.
    #[must_use]
    pub fn from_ehlo<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut caps = Self {
            greeting: lines
                .first()
                .map(|l| l.as_ref().to_string())
                .unwrap_or_default(),
            ..Self::default()
        };

        for line in lines.iter().skip(1) {
            let mut words = line.as_ref().split_whitespace();
            let Some(keyword) = words.next() else {
                continue;
            };

            match keyword.to_ascii_uppercase().as_str() {
                "STARTTLS" => caps.starttls = true,
                "AUTH" => caps.auth.extend(words.map(str::to_ascii_uppercase)),
                "SIZE" => {
                    caps.max_size = words
                        .next()
                        .and_then(|s| s.parse().ok())
                        .filter(|&n| n > 0);
                }
                _ => {}
            }
        }

        caps
    }

    /// Returns true if the server offers the given SASL mechanism.
    #[must_use]
    pub fn supports_auth(&self, mechanism: &str) -> bool {
        self.auth.iter().any(|m| m.eq_ignore_ascii_case(mechanism))
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

    #[test]
    fn parses_gmail_style_reply() {
        let caps = Capabilities::from_ehlo(&[
            "smtp.gmail.com at your service",
            "SIZE 35882577",
            "8BITMIME",
            "STARTTLS",
            "ENHANCEDSTATUSCODES",
        ]);
        assert_eq!(caps.greeting, "smtp.gmail.com at your service");
        assert!(caps.starttls);
        assert_eq!(caps.max_size, Some(35_882_577));
        assert!(caps.auth.is_empty());
    }

    #[test]
    fn parses_auth_mechanisms_case_insensitively() {
        let caps = Capabilities::from_ehlo(&["mx", "auth login plain XOAUTH2"]);
        assert!(caps.supports_auth("PLAIN"));
        assert!(caps.supports_auth("login"));
        assert!(!caps.supports_auth("CRAM-MD5"));
        assert!(!caps.starttls);
    }

    #[test]
    fn size_zero_means_no_limit() {
        let caps = Capabilities::from_ehlo(&["mx", "SIZE 0"]);
        assert_eq!(caps.max_size, None);
        let caps = Capabilities::from_ehlo(&["mx", "SIZE"]);
        assert_eq!(caps.max_size, None);
    }

    #[test]
    fn empty_reply() {
        let caps = Capabilities::from_ehlo::<&str>(&[]);
        assert_eq!(caps, Capabilities::default());
    }
}
