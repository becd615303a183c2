//! Token boundary scanner for IMAP response text.
//!
//! Response values come in three shapes: length-prefixed literals
//! (`{153}` followed by raw bytes), quoted strings, and bare atoms.
//! The scanner locates the end of the token that starts at the head of a
//! buffer; it never consumes input and keeps no state, so callers slice
//! the buffer themselves and are free to re-scan.

use crate::{Error, Result};

/// Classification of a scanned token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Length header of a literal, `{n}`. The declared byte count follows
    /// the header and is consumed by the caller, not the scanner.
    Literal,
    /// Double-quoted string, backslash escapes allowed.
    Quoted,
    /// Bare atom: number, `NIL`, flag, unquoted word.
    Atom,
}

/// A scanned token: its kind and the offset of its last character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Token classification.
    pub kind: TokenKind,
    /// Offset of the token's final character within the scanned buffer.
    ///
    /// For a literal this is the `}` of the length header; for a quoted
    /// string the closing quote; for an atom the last character before
    /// the terminating space or `)`.
    pub end: usize,
}

/// Scans the token starting at the first byte of `buf`.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the buffer is exhausted before the
/// token's terminator is found (truncated or malformed response).
pub fn scan_token(buf: &[u8]) -> Result<Token> {
    match buf.first() {
        None => Err(Error::parse(0, "empty buffer, expected a token")),
        Some(b'{') => {
            let end = buf
                .iter()
                .position(|&b| b == b'}')
                .ok_or_else(|| Error::parse(buf.len(), "unterminated literal length header"))?;
            Ok(Token {
                kind: TokenKind::Literal,
                end,
            })
        }
        Some(b'"') => {
            let mut i = 1;
            while i < buf.len() {
                match buf[i] {
                    b'\\' => i += 2,
                    b'"' => {
                        return Ok(Token {
                            kind: TokenKind::Quoted,
                            end: i,
                        });
                    }
                    _ => i += 1,
                }
            }
            Err(Error::parse(buf.len(), "unterminated quoted string"))
        }
        Some(_) => {
            let stop = buf
                .iter()
                .position(|&b| b == b' ' || b == b')')
                .ok_or_else(|| Error::parse(buf.len(), "atom reached end of buffer"))?;
            if stop == 0 {
                return Err(Error::parse(0, "expected a token, found separator"));
            }
            Ok(Token {
                kind: TokenKind::Atom,
                end: stop - 1,
            })
        }
    }
}

/// Parses the byte count out of a literal length header `{n}` or `{n+}`.
///
/// `header` must span the braces inclusively, as delimited by
/// [`scan_token`].
///
/// # Errors
///
/// Returns [`Error::Parse`] when the braces do not enclose a number.
pub fn literal_length(header: &[u8]) -> Result<usize> {
    let inner = header
        .strip_prefix(b"{")
        .and_then(|h| h.strip_suffix(b"}"))
        .ok_or_else(|| Error::parse(0, "malformed literal length header"))?;
    let inner = inner.strip_suffix(b"+").unwrap_or(inner);
    std::str::from_utf8(inner)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::parse(0, "invalid literal length number"))
}

/// Strips one layer of surrounding double quotes, resolving `\"` and
/// `\\` escapes. Unquoted input is returned unchanged.
#[must_use]
pub fn unquote(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn literal_header_end_is_closing_brace() {
        let token = scan_token(b"{12}\r\nsome literal").unwrap();
        assert_eq!(token.kind, TokenKind::Literal);
        assert_eq!(token.end, 3);
    }

    #[test]
    fn quoted_end_is_final_unescaped_quote() {
        let token = scan_token(b"\"ab\\\"cd\" rest").unwrap();
        assert_eq!(token.kind, TokenKind::Quoted);
        assert_eq!(token.end, 7);
    }

    #[test]
    fn atom_ends_before_space() {
        let token = scan_token(b"NIL \"next\"").unwrap();
        assert_eq!(token.kind, TokenKind::Atom);
        assert_eq!(token.end, 2);
    }

    #[test]
    fn atom_ends_before_closing_paren() {
        let token = scan_token(b"1152)").unwrap();
        assert_eq!(token.kind, TokenKind::Atom);
        assert_eq!(token.end, 3);
    }

    #[test]
    fn end_is_never_before_start() {
        for input in [&b"x "[..], b"{0}", b"\"\"", b"a)"] {
            let token = scan_token(input).unwrap();
            assert!(token.end < input.len());
        }
    }

    #[test]
    fn truncated_literal_header_fails() {
        assert!(matches!(
            scan_token(b"{153"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn unterminated_quote_fails() {
        assert!(matches!(
            scan_token(b"\"never closed"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn unterminated_atom_fails() {
        assert!(matches!(
            scan_token(b"truncated"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn empty_buffer_fails() {
        assert!(matches!(scan_token(b""), Err(Error::Parse { .. })));
    }

    #[test]
    fn scanning_is_pure() {
        let buf = b"\"hello\" tail";
        let first = scan_token(buf).unwrap();
        let second = scan_token(buf).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn literal_length_parses_count() {
        assert_eq!(literal_length(b"{153}").unwrap(), 153);
        assert_eq!(literal_length(b"{0}").unwrap(), 0);
        assert_eq!(literal_length(b"{42+}").unwrap(), 42);
    }

    #[test]
    fn literal_length_rejects_garbage() {
        assert!(literal_length(b"{abc}").is_err());
        assert!(literal_length(b"153").is_err());
    }

    #[test]
    fn unquote_strips_one_layer() {
        assert_eq!(unquote("\"text\""), "text");
        assert_eq!(unquote("\"ab\\\"cd\""), "ab\"cd");
        assert_eq!(unquote("\"a\\\\b\""), "a\\b");
        assert_eq!(unquote("bare"), "bare");
        assert_eq!(unquote("\"\""), "");
    }
}
