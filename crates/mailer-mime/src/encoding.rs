//! MIME transfer and header encodings.
//!
//! Supports Base64 (RFC 2045), Quoted-Printable (RFC 2045) and RFC 2047
//! encoded words. Output always uses CRLF line breaks.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length for Base64 and Quoted-Printable bodies.
const MAX_LINE_LENGTH: usize = 76;

/// Longest UTF-8 chunk per encoded word: 45 bytes -> 60 base64 chars,
/// which keeps `=?utf-8?B?...?=` under the 75 character limit.
const ENCODED_WORD_BYTES: usize = 45;

/// Encodes data as Base64 without line breaks.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 characters per line.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    // Base64 output is ASCII, so byte chunks are valid str boundaries.
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        out.push_str(&String::from_utf8_lossy(chunk));
    }

    out
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Hard line breaks (`\n` or `\r\n`) become CRLF; long lines get soft
/// breaks; whitespace at the end of a line is encoded so transports cannot
/// strip it.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }

        let bytes = line.strip_suffix('\r').unwrap_or(line).as_bytes();
        let mut width = 0;
        for (j, &byte) in bytes.iter().enumerate() {
            let at_end = j + 1 == bytes.len();
            let literal = matches!(byte, b'!'..=b'<' | b'>'..=b'~')
                || (matches!(byte, b' ' | b'\t') && !at_end);
            let len = if literal { 1 } else { 3 };

            // Leave room for the trailing '=' of a soft break.
            if width + len > MAX_LINE_LENGTH - 1 {
                out.push_str("=\r\n");
                width = 0;
            }

            if literal {
                out.push(char::from(byte));
            } else {
                let _ = write!(out, "={byte:02X}");
            }
            width += len;
        }
    }

    out
}

/// Returns true if `text` can go into a header unencoded.
#[must_use]
pub fn is_header_safe(text: &str) -> bool {
    text.bytes().all(|b| (b' '..=b'~').contains(&b)) && !text.contains("=?")
}

/// Encodes a header value as RFC 2047 `B` encoded words when it contains
/// anything but printable ASCII.
///
/// Long values are split on character boundaries into several words,
/// separated by folding whitespace.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if is_header_safe(text) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_BYTES {
            words.push(encoded_word(&chunk));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk));
    }

    words.join("\r\n ")
}

fn encoded_word(chunk: &str) -> String {
    format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes()))
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_wrapped() {
        assert_eq!(encode_base64_wrapped(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");

        let wrapped = encode_base64_wrapped(&[0u8; 120]);
        let lines: Vec<&str> = wrapped.split("\r\n").collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines.concat(), encode_base64(&[0u8; 120]));
    }

    #[test]
    fn test_quoted_printable_plain_ascii() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_non_ascii_and_equals() {
        assert_eq!(encode_quoted_printable("Héllo"), "H=C3=A9llo");
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_line_breaks() {
        assert_eq!(encode_quoted_printable("one\ntwo\r\nthree"), "one\r\ntwo\r\nthree");
        assert_eq!(encode_quoted_printable("trailing \nx"), "trailing=20\r\nx");
        assert_eq!(encode_quoted_printable("tab\t"), "tab=09");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let encoded = encode_quoted_printable(&"a".repeat(100));
        let lines: Vec<&str> = encoded.split("\r\n").collect();
        assert_eq!(lines, vec![format!("{}=", "a".repeat(75)), "a".repeat(25)]);
    }

    #[test]
    fn test_rfc2047_passthrough() {
        assert_eq!(encode_rfc2047("Hello there"), "Hello there");
    }

    #[test]
    fn test_rfc2047_encodes_non_ascii() {
        assert_eq!(encode_rfc2047("Héllo"), "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2047_splits_long_values() {
        let encoded = encode_rfc2047(&"ü".repeat(40));
        let words: Vec<&str> = encoded.split("\r\n ").collect();
        assert_eq!(words.len(), 2);
        assert!(words.iter().all(|w| w.len() <= 75));
    }

    proptest! {
        #[test]
        fn quoted_printable_lines_stay_short(text in "\\PC{0,300}") {
            let encoded = encode_quoted_printable(&text);
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
                prop_assert!(line.is_ascii());
            }
        }
    }
}
