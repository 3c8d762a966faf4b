//! Envelope address type.

use crate::error::{Error, Result};
use std::fmt;

/// Bare `local@domain` address used in `MAIL FROM` and `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a single `local@domain` pair.
    pub fn new(addr: impl AsRef<str>) -> Result<Self> {
        let addr = addr.as_ref().trim();
        Self::validate(addr)?;
        Ok(Self(addr.to_string()))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(addr: &str) -> Result<()> {
        let Some((local, domain)) = addr.split_once('@') else {
            return Err(Error::InvalidAddress(format!("'{addr}' must contain @")));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "'{addr}' has an empty local or domain part"
            )));
        }

        if domain.contains('@') {
            return Err(Error::InvalidAddress(format!(
                "'{addr}' must have exactly one @"
            )));
        }

        // These would break the `<...>` framing of MAIL/RCPT.
        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!(
                "'{addr}' contains whitespace or angle brackets"
            )));
        }

        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
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
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_address_is_trimmed() {
        let addr = Address::new("  user@example.com ").unwrap();
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Address::new("").is_err());
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
        assert!(Address::new("a@b@c").is_err());
        assert!(Address::new("Jo <jo@example.com>").is_err());
        assert!(Address::new("jo smith@example.com").is_err());
    }
}
