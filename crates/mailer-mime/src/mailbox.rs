//! Mailboxes as written in address headers.

use crate::encoding::{encode_rfc2047, is_header_safe};
use crate::error::{Error, Result};
use std::fmt;

/// Characters that force a display name into a quoted string (RFC 5322 specials).
const SPECIALS: &str = "()<>[]:;@\\,.\"";

/// Mailbox: optional display name plus address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name (optional).
    pub name: Option<String>,
    /// `local@domain` address.
    pub address: String,
}

impl Mailbox {
    /// Creates a mailbox without display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not `local@domain`.
    pub fn new(address: impl AsRef<str>) -> Result<Self> {
        Self::with_name(None::<String>, address)
    }

    /// Creates a mailbox with an optional display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not `local@domain`.
    pub fn with_name(name: Option<impl Into<String>>, address: impl AsRef<str>) -> Result<Self> {
        let address = address.as_ref().trim();
        if !is_plain_address(address) {
            return Err(Error::InvalidMailbox(address.to_string()));
        }

        Ok(Self {
            name: name.map(Into::<String>::into).filter(|n| !n.is_empty()),
            address: address.to_string(),
        })
    }

    /// Parses `addr@host` or `Display Name <addr@host>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input has no valid address.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let invalid = || Error::InvalidMailbox(input.to_string());

        let Some(open) = input.rfind('<') else {
            return Self::new(input).map_err(|_| invalid());
        };

        let address = input[open + 1..].strip_suffix('>').ok_or_else(invalid)?;
        let name = input[..open].trim();
        let name = name
            .strip_prefix('"')
            .and_then(|n| n.strip_suffix('"'))
            .unwrap_or(name)
            .trim();

        Self::with_name(Some(name), address).map_err(|_| invalid())
    }

    /// Parses a comma-separated list; blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first entry that is not a valid mailbox.
    pub fn parse_list(input: &str) -> Result<Vec<Self>> {
        input
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Formats a list for an address header (`a, "B" <b@x>`).
    #[must_use]
    pub fn join(list: &[Self]) -> String {
        list.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            None => f.write_str(&self.address),
            Some(name) if !is_header_safe(name) => {
                write!(f, "{} <{}>", encode_rfc2047(name), self.address)
            }
            Some(name) if name.contains(|c| SPECIALS.contains(c)) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\" <{}>", self.address)
            }
            Some(name) => write!(f, "{name} <{}>", self.address),
        }
    }
}

fn is_plain_address(address: &str) -> bool {
    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !address
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "<>,".contains(c))
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
    fn test_parse_bare_address() {
        let mailbox = Mailbox::parse(" you@and.me ").unwrap();
        assert_eq!(mailbox.name, None);
        assert_eq!(mailbox.address, "you@and.me");
        assert_eq!(mailbox.to_string(), "you@and.me");
    }

    #[test]
    fn test_parse_display_name() {
        let mailbox = Mailbox::parse("Some String <you@and.me>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Some String"));
        assert_eq!(mailbox.address, "you@and.me");
        assert_eq!(mailbox.to_string(), "Some String <you@and.me>");
    }

    #[test]
    fn test_parse_quoted_name() {
        let mailbox = Mailbox::parse("\"Doe, Jane\" <jane@example.com>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Doe, Jane"));
        assert_eq!(mailbox.to_string(), "\"Doe, Jane\" <jane@example.com>");
    }

    #[test]
    fn test_parse_empty_name_is_none() {
        let mailbox = Mailbox::parse("<jane@example.com>").unwrap();
        assert_eq!(mailbox.name, None);
    }

    #[test]
    fn test_non_ascii_name_is_encoded() {
        let mailbox = Mailbox::parse("Jürgen <j@example.de>").unwrap();
        assert_eq!(mailbox.to_string(), "=?utf-8?B?SsO8cmdlbg==?= <j@example.de>");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Mailbox::parse("").is_err());
        assert!(Mailbox::parse("Alice").is_err());
        assert!(Mailbox::parse("Alice <alice>").is_err());
        assert!(Mailbox::parse("Alice <alice@example.com").is_err());
        assert!(Mailbox::parse("alice @example.com").is_err());
    }

    #[test]
    fn test_parse_list() {
        let list = Mailbox::parse_list("a@x.com, Bob <b@y.com>,, ").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(Mailbox::join(&list), "a@x.com, Bob <b@y.com>");

        let err = Mailbox::parse_list("a@x.com,nobody").unwrap_err();
        assert_eq!(err.to_string(), "Invalid email address: 'nobody'");
    }
}
