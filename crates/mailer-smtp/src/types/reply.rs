//! SMTP reply types.

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply text, one entry per line.
    pub lines: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the reply text joined into a single line.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }

    /// Converts a non-success reply into an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SmtpError`] unless the code equals `expected`.
    pub fn expect_code(self, expected: ReplyCode) -> crate::Result<Self> {
        if self.code == expected {
            Ok(self)
        } else {
            Err(crate::Error::smtp_error(self.code.as_u16(), self.text()))
        }
    }

    /// Converts a non-2xx reply into an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SmtpError`] when the reply is not 2xx.
    pub fn expect_success(self) -> crate::Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(crate::Error::smtp_error(self.code.as_u16(), self.text()))
        }
    }
}

/// Three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_OK: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);

    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
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
    use crate::Error;

    #[test]
    fn success_range() {
        assert!(ReplyCode::OK.is_success());
        assert!(ReplyCode::CLOSING.is_success());
        assert!(!ReplyCode::START_DATA.is_success());
        assert!(!ReplyCode::new(535).is_success());
    }

    #[test]
    fn text_joins_lines() {
        let reply = Reply::new(
            ReplyCode::new(535),
            vec!["5.7.8 Username and Password".into(), "not accepted".into()],
        );
        assert_eq!(reply.text(), "5.7.8 Username and Password not accepted");
    }

    #[test]
    fn expect_success_maps_rejection() {
        let reply = Reply::new(ReplyCode::new(550), vec!["no such user".into()]);
        match reply.expect_success() {
            Err(Error::SmtpError { code, message }) => {
                assert_eq!(code, 550);
                assert_eq!(message, "no such user");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn expect_code_requires_exact_match() {
        let reply = Reply::new(ReplyCode::OK, vec![]);
        assert!(reply.clone().expect_code(ReplyCode::OK).is_ok());
        assert!(reply.expect_code(ReplyCode::START_DATA).is_err());
    }
}
