//! Tagged and untagged response line parsing.
//!
//! Covers the non-FETCH response shapes the session consumes: tagged
//! completion lines, SORT/SEARCH id lists, LIST entries, and the
//! numbered EXISTS/RECENT/EXPUNGE notifications. FETCH data lines are
//! handled chunk-wise by the assembler and only classified here.

use super::scanner::{self, TokenKind};
use crate::types::{Folder, FolderAttribute, FolderInfo};
use crate::{Error, Result};

/// Command completion status of a tagged response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command succeeded.
    Ok,
    /// Command failed.
    No,
    /// Command was rejected as invalid.
    Bad,
}

/// A classified response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    /// Tagged command completion.
    Tagged {
        /// The command tag.
        tag: String,
        /// Completion status.
        status: Status,
        /// Human-readable text (response code included verbatim).
        text: String,
    },
    /// `* SORT` id list.
    Sort(Vec<u32>),
    /// `* SEARCH` id list.
    Search(Vec<u32>),
    /// `* LIST` folder entry.
    List(FolderInfo),
    /// `* <n> EXISTS` message count.
    Exists(u32),
    /// `* <n> RECENT` count.
    Recent(u32),
    /// `* <n> EXPUNGE` notification.
    Expunge(u32),
    /// `* <n> FETCH` data line; the assembler owns its contents.
    Fetch(u32),
    /// `* BYE` — server is disconnecting.
    Bye(String),
    /// Anything else (OK/NO/BAD untagged, continuation, extensions).
    Other(String),
}

/// Parses one flattened response line.
///
/// # Errors
///
/// Returns [`Error::Parse`] on structurally broken lines (missing
/// status word, non-numeric id lists, malformed LIST entries).
pub fn parse_line(input: &[u8]) -> Result<ResponseLine> {
    let line = strip_crlf(input);
    let text = std::str::from_utf8(line)
        .map_err(|_| Error::parse(0, "response line is not valid UTF-8"))?;

    if let Some(rest) = text.strip_prefix("* ") {
        return parse_untagged(rest);
    }
    if text.starts_with('+') {
        return Ok(ResponseLine::Other(text.to_string()));
    }
    parse_tagged(text)
}

fn parse_untagged(rest: &str) -> Result<ResponseLine> {
    let (word, tail) = split_word(rest);

    if let Ok(n) = word.parse::<u32>() {
        let (keyword, _) = split_word(tail);
        return match keyword.to_uppercase().as_str() {
            "EXISTS" => Ok(ResponseLine::Exists(n)),
            "RECENT" => Ok(ResponseLine::Recent(n)),
            "EXPUNGE" => Ok(ResponseLine::Expunge(n)),
            "FETCH" => Ok(ResponseLine::Fetch(n)),
            _ => Ok(ResponseLine::Other(rest.to_string())),
        };
    }

    match word.to_uppercase().as_str() {
        "SORT" => Ok(ResponseLine::Sort(parse_ids(tail)?)),
        "SEARCH" => Ok(ResponseLine::Search(parse_ids(tail)?)),
        "LIST" => parse_list(tail).map(ResponseLine::List),
        "BYE" => Ok(ResponseLine::Bye(tail.to_string())),
        _ => Ok(ResponseLine::Other(rest.to_string())),
    }
}

fn parse_tagged(text: &str) -> Result<ResponseLine> {
    let (tag, tail) = split_word(text);
    if tag.is_empty() {
        return Err(Error::parse(0, "empty response line"));
    }
    let (word, rest) = split_word(tail);
    let status = match word.to_uppercase().as_str() {
        "OK" => Status::Ok,
        "NO" => Status::No,
        "BAD" => Status::Bad,
        _ => {
            return Err(Error::parse(
                tag.len() + 1,
                format!("expected OK/NO/BAD, got {word:?}"),
            ));
        }
    };
    Ok(ResponseLine::Tagged {
        tag: tag.to_string(),
        status,
        text: rest.to_string(),
    })
}

/// Parses a space-separated message id list.
fn parse_ids(tail: &str) -> Result<Vec<u32>> {
    tail.split_ascii_whitespace()
        .map(|w| {
            w.parse()
                .map_err(|_| Error::parse(0, format!("non-numeric id {w:?} in id list")))
        })
        .collect()
}

/// Parses a LIST entry: `(attributes) "delimiter" name`.
fn parse_list(tail: &str) -> Result<FolderInfo> {
    let bytes = tail.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(Error::parse(0, "LIST entry must start with attributes"));
    }
    let close = bytes
        .iter()
        .position(|&b| b == b')')
        .ok_or_else(|| Error::parse(0, "unclosed attribute list in LIST entry"))?;
    let attributes = tail[1..close]
        .split_ascii_whitespace()
        .map(FolderAttribute::parse)
        .collect();

    let mut i = close + 1;
    while bytes.get(i) == Some(&b' ') {
        i += 1;
    }

    // Hierarchy delimiter: quoted single character or NIL.
    let token = scanner::scan_token(&bytes[i..])?;
    let raw = &tail[i..=i + token.end];
    let delimiter = if token.kind == TokenKind::Quoted {
        scanner::unquote(raw).chars().next()
    } else {
        None
    };
    i += token.end + 1;
    while bytes.get(i) == Some(&b' ') {
        i += 1;
    }

    // Folder name: quoted, atom, or literal. Atoms at the end of the
    // line have no terminator, so take the remainder directly.
    let name_raw = match bytes.get(i) {
        None => return Err(Error::parse(i, "LIST entry has no folder name")),
        Some(b'"') => {
            let token = scanner::scan_token(&bytes[i..])?;
            scanner::unquote(&tail[i..=i + token.end])
        }
        Some(b'{') => {
            let token = scanner::scan_token(&bytes[i..])?;
            let count = scanner::literal_length(&bytes[i..=i + token.end])?;
            let start = i + token.end + 1;
            let end = start + count;
            if end > bytes.len() {
                return Err(Error::parse(start, "truncated literal folder name"));
            }
            tail[start..end].to_string()
        }
        Some(_) => tail[i..].trim_end().to_string(),
    };

    Ok(FolderInfo {
        attributes,
        delimiter,
        name: Folder::from_wire(&name_raw),
    })
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (text, ""),
    }
}

fn strip_crlf(input: &[u8]) -> &[u8] {
    let input = input.strip_suffix(b"\n").unwrap_or(input);
    input.strip_suffix(b"\r").unwrap_or(input)
}
