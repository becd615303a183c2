//! FETCH response assembly.
//!
//! A UID FETCH round trip arrives as a sequence of chunks: segments that
//! announced a `{n}` literal carry the literal's payload, plain segments
//! close with the message's `)` marker. The assembler splits the chunk
//! stream into per-message field maps and runs each field through a
//! decoder looked up by its lower-cased name; fields without a decoder
//! are stored as raw text, unchanged.
//!
//! Assembly is pure: it builds and returns the map and performs no I/O.

#![allow(clippy::missing_errors_doc)]

use std::collections::{BTreeMap, HashMap};

use super::bodystructure::{self, BodyNode};
use super::scanner::{self, TokenKind};
use crate::{Error, Result};

/// One segment of a server response, as framed off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Segment that announced a literal: the text up to and including
    /// the `{n}` length header, and the n payload bytes that followed.
    Tuple {
        /// Segment text, CRLF stripped, length header included.
        text: String,
        /// The literal payload.
        payload: Vec<u8>,
    },
    /// Plain segment with no literal, CRLF stripped.
    Bare(String),
}

impl Chunk {
    fn text(&self) -> &str {
        match self {
            Self::Tuple { text, .. } => text,
            Self::Bare(text) => text,
        }
    }

    fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Tuple { payload, .. } => Some(payload),
            Self::Bare(_) => None,
        }
    }
}

/// Rejoins a chunked response into one contiguous buffer, literal
/// markers and payloads in place, for line-oriented parsing.
#[must_use]
pub fn flatten(chunks: &[Chunk]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend_from_slice(chunk.text().as_bytes());
        if let Some(payload) = chunk.payload() {
            out.extend_from_slice(payload);
        }
    }
    out
}

/// A decoded FETCH field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Raw field text, stored unchanged when no decoder is registered.
    Text(String),
    /// Literal payload that was not valid UTF-8.
    Bytes(Vec<u8>),
    /// Numeric field (UID, RFC822.SIZE).
    Number(u32),
    /// Parsed flag list.
    Flags(Vec<String>),
    /// Parsed body-structure tree.
    Structure(BodyNode),
}

/// One message's decoded FETCH fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Message sequence number from the response head.
    pub seq: u32,
    /// UID, when the response carried one.
    pub uid: Option<u32>,
    /// Field name (as sent by the server) to decoded value.
    pub fields: HashMap<String, FieldValue>,
}

impl FetchedMessage {
    /// Returns the value stored under the exact field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// The identifier this message is keyed by: UID when present,
    /// sequence number otherwise.
    #[must_use]
    pub fn key(&self) -> u32 {
        self.uid.unwrap_or(self.seq)
    }
}

/// A field decoder: raw field text in, decoded value out.
pub type Decoder = fn(&str) -> Result<FieldValue>;

/// Explicit field-name to decoder mapping.
///
/// Built once and handed to the assembler; tests substitute their own.
/// Lookup is by lower-cased field name, so `BODYSTRUCTURE` and
/// `bodystructure` hit the same entry.
#[derive(Debug, Clone)]
pub struct DecoderRegistry {
    map: HashMap<String, Decoder>,
}

impl DecoderRegistry {
    /// Creates a registry with no decoders: every field stays raw.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Registers a decoder under the given field name.
    pub fn register(&mut self, name: &str, decoder: Decoder) {
        self.map.insert(name.to_ascii_lowercase(), decoder);
    }

    /// Looks up the decoder for a field name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Decoder> {
        self.map.get(&name.to_ascii_lowercase()).copied()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("flags", decode_flags);
        registry.register("uid", decode_number);
        registry.register("rfc822.size", decode_number);
        registry.register("bodystructure", decode_structure);
        registry.register("body", decode_structure);
        registry.register("internaldate", decode_unquoted);
        registry
    }
}

fn decode_flags(raw: &str) -> Result<FieldValue> {
    let inner = raw
        .trim()
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| Error::parse(0, "flag list is not parenthesized"))?;
    Ok(FieldValue::Flags(
        inner.split_ascii_whitespace().map(str::to_string).collect(),
    ))
}

fn decode_number(raw: &str) -> Result<FieldValue> {
    raw.trim()
        .parse()
        .map(FieldValue::Number)
        .map_err(|_| Error::parse(0, format!("expected a number, got {raw:?}")))
}

fn decode_structure(raw: &str) -> Result<FieldValue> {
    bodystructure::parse(raw.as_bytes()).map(FieldValue::Structure)
}

fn decode_unquoted(raw: &str) -> Result<FieldValue> {
    Ok(FieldValue::Text(scanner::unquote(raw.trim())))
}

/// Splits a chunked FETCH response into per-message field maps.
pub struct FetchAssembler<'r> {
    registry: &'r DecoderRegistry,
}

impl<'r> FetchAssembler<'r> {
    /// Creates an assembler dispatching through the given registry.
    #[must_use]
    pub const fn new(registry: &'r DecoderRegistry) -> Self {
        Self { registry }
    }

    /// Assembles one FETCH round trip.
    ///
    /// Messages are keyed by UID when the response carries one, sequence
    /// number otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on malformed or truncated response text,
    /// including a message left open at the end of the chunk stream.
    pub fn assemble(&self, chunks: &[Chunk]) -> Result<BTreeMap<u32, FetchedMessage>> {
        let mut messages = BTreeMap::new();
        let mut current: Option<FetchedMessage> = None;

        for chunk in chunks {
            let text = chunk.text();

            let rest = if let Some((seq, rest)) = split_message_head(text) {
                if let Some(done) = current.take() {
                    messages.insert(done.key(), done);
                }
                current = Some(FetchedMessage {
                    seq,
                    ..FetchedMessage::default()
                });
                rest
            } else if text.trim().is_empty() || text.starts_with("* ") {
                // Interleaved untagged data (EXISTS and friends) is not
                // part of the message's field stream.
                continue;
            } else {
                text
            };

            let Some(msg) = current.as_mut() else {
                continue;
            };
            let closed = self.scan_fields(rest.as_bytes(), chunk.payload(), msg)?;
            if closed {
                if let Some(done) = current.take() {
                    messages.insert(done.key(), done);
                }
            }
        }

        if current.is_some() {
            return Err(Error::parse(0, "fetch response ended without close marker"));
        }
        Ok(messages)
    }

    /// Consumes `FIELDNAME value` pairs from one segment. Returns true
    /// when the message's closing `)` was reached.
    fn scan_fields(
        &self,
        bytes: &[u8],
        payload: Option<&[u8]>,
        msg: &mut FetchedMessage,
    ) -> Result<bool> {
        let mut i = 0;

        loop {
            while bytes.get(i) == Some(&b' ') {
                i += 1;
            }
            match bytes.get(i) {
                None => return Ok(false),
                Some(b')') => return Ok(true),
                Some(_) => {}
            }

            let name_len = field_name_end(&bytes[i..])?;
            let name = std::str::from_utf8(&bytes[i..i + name_len])
                .map_err(|_| Error::parse(i, "invalid UTF-8 in field name"))?
                .to_string();
            i += name_len;
            while bytes.get(i) == Some(&b' ') {
                i += 1;
            }

            match bytes.get(i) {
                None => return Err(Error::parse(i, format!("field {name} has no value"))),
                Some(b'(') => {
                    let close = matching_paren(&bytes[i..])
                        .map_err(|_| Error::parse(i, format!("unclosed value for {name}")))?;
                    let raw = std::str::from_utf8(&bytes[i..=i + close])
                        .map_err(|_| Error::parse(i, "invalid UTF-8 in field value"))?;
                    let value = self.decode(&name, raw)?;
                    store_field(msg, name, value);
                    i += close + 1;
                }
                Some(b'{') => {
                    let token = scanner::scan_token(&bytes[i..])?;
                    let count = scanner::literal_length(&bytes[i..=i + token.end])?;
                    let payload = payload
                        .ok_or_else(|| Error::parse(i, format!("{name} literal has no payload")))?;
                    if payload.len() < count {
                        return Err(Error::parse(i, format!("{name} literal payload truncated")));
                    }
                    let value = match std::str::from_utf8(&payload[..count]) {
                        Ok(text) => self.decode(&name, text)?,
                        Err(_) => FieldValue::Bytes(payload[..count].to_vec()),
                    };
                    store_field(msg, name, value);
                    i += token.end + 1;
                }
                Some(_) => {
                    let token = scanner::scan_token(&bytes[i..])?;
                    let raw = std::str::from_utf8(&bytes[i..=i + token.end])
                        .map_err(|_| Error::parse(i, "invalid UTF-8 in field value"))?;
                    let raw = if token.kind == TokenKind::Quoted {
                        scanner::unquote(raw)
                    } else {
                        raw.to_string()
                    };
                    let value = self.decode(&name, &raw)?;
                    store_field(msg, name, value);
                    i += token.end + 1;
                }
            }
        }
    }

    fn decode(&self, name: &str, raw: &str) -> Result<FieldValue> {
        match self.registry.get(name) {
            Some(decoder) => decoder(raw),
            None => Ok(FieldValue::Text(raw.to_string())),
        }
    }
}

fn store_field(msg: &mut FetchedMessage, name: String, value: FieldValue) {
    if name.eq_ignore_ascii_case("UID")
        && let FieldValue::Number(uid) = &value
    {
        msg.uid = Some(*uid);
    }
    msg.fields.insert(name, value);
}

/// Splits a `<seq> (…` or `* <seq> FETCH (…` message head, returning the
/// sequence number and the field stream after the opening parenthesis.
fn split_message_head(text: &str) -> Option<(u32, &str)> {
    let t = text.strip_prefix("* ").unwrap_or(text);
    let digits = t.len() - t.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let seq = t[..digits].parse().ok()?;
    let rest = t[digits..].strip_prefix(' ')?;
    let rest = rest.strip_prefix("FETCH ").unwrap_or(rest);
    let rest = rest.strip_prefix('(')?;
    Some((seq, rest))
}

/// Length of the field name at the head of `bytes`.
///
/// Names containing `[` run to the matching `]` plus an optional `<…>`
/// partial-range suffix; all others end at the next space or `)`.
fn field_name_end(bytes: &[u8]) -> Result<usize> {
    let space = bytes.iter().position(|&b| b == b' ' || b == b')');
    let bracket = bytes.iter().position(|&b| b == b'[');

    let bracketed = match (bracket, space) {
        (Some(br), Some(sp)) => br < sp,
        (Some(_), None) => true,
        (None, _) => false,
    };

    if bracketed {
        let close = bytes
            .iter()
            .position(|&b| b == b']')
            .ok_or_else(|| Error::parse(0, "unclosed section in field name"))?;
        let mut end = close + 1;
        if bytes.get(end) == Some(&b'<') {
            let gt = bytes[end..]
                .iter()
                .position(|&b| b == b'>')
                .ok_or_else(|| Error::parse(end, "unclosed partial range in field name"))?;
            end += gt + 1;
        }
        Ok(end)
    } else {
        space.ok_or_else(|| Error::parse(bytes.len(), "field name reached end of segment"))
    }
}

/// Offset of the `)` matching the `(` at the head of `bytes`. Quoted
/// strings and literal payloads inside the value are skipped over.
fn matching_paren(bytes: &[u8]) -> Result<usize> {
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
                i += 1;
            }
            b'"' => {
                let token = scanner::scan_token(&bytes[i..])?;
                i += token.end + 1;
            }
            b'{' => {
                let token = scanner::scan_token(&bytes[i..])?;
                let count = scanner::literal_length(&bytes[i..=i + token.end])?;
                i += token.end + 1;
                if bytes[i..].starts_with(b"\r\n") {
                    i += 2;
                }
                i += count;
            }
            _ => i += 1,
        }
    }
    Err(Error::parse(bytes.len(), "unbalanced parentheses"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn assemble(chunks: &[Chunk]) -> BTreeMap<u32, FetchedMessage> {
        let registry = DecoderRegistry::default();
        FetchAssembler::new(&registry).assemble(chunks).unwrap()
    }

    #[test]
    fn single_line_message_with_flags_and_uid() {
        let chunks = [Chunk::Bare(
            "855 (UID 46931 FLAGS (\\Seen \\Answered) RFC822.SIZE 4460)".to_string(),
        )];
        let messages = assemble(&chunks);

        let msg = &messages[&46931];
        assert_eq!(msg.seq, 855);
        assert_eq!(msg.uid, Some(46931));
        assert_eq!(
            msg.get("FLAGS"),
            Some(&FieldValue::Flags(vec![
                "\\Seen".to_string(),
                "\\Answered".to_string()
            ]))
        );
        assert_eq!(msg.get("RFC822.SIZE"), Some(&FieldValue::Number(4460)));
    }

    #[test]
    fn header_fields_literal_and_bodystructure() {
        let header_text = "Date: Mon, 2 Jun 2025 10:12:44 +0200\r\n\
             From: Someone <someone@example.net>\r\n\
             To: reader@example.org\r\n\
             Cc: \r\nSubject: Weekly report, budget and questions\r\n\r\n";
        assert_eq!(header_text.len(), 153);

        let text = format!(
            "855 (UID 46931 BODYSTRUCTURE ((\"text\" \"plain\" (\"charset\" \"utf-8\") NIL NIL \
             \"quoted-printable\" 724 26)(\"text\" \"html\" (\"charset\" \"utf-8\") NIL NIL \
             \"quoted-printable\" 2662 52) \"alternative\") \
             BODY[HEADER.FIELDS (DATE FROM TO CC SUBJECT)] {{{}}}",
            header_text.len()
        );
        let chunks = [
            Chunk::Tuple {
                text,
                payload: header_text.as_bytes().to_vec(),
            },
            Chunk::Bare(")".to_string()),
        ];
        let messages = assemble(&chunks);

        let msg = &messages[&46931];
        assert_eq!(msg.seq, 855);

        let Some(FieldValue::Structure(node)) = msg.get("BODYSTRUCTURE") else {
            panic!("BODYSTRUCTURE not decoded");
        };
        assert!(node.is_multipart());
        assert_eq!(node.multipart_subtype(), Some("alternative"));
        assert_eq!(node.children().unwrap().len(), 2);

        assert_eq!(
            msg.get("BODY[HEADER.FIELDS (DATE FROM TO CC SUBJECT)]"),
            Some(&FieldValue::Text(header_text.to_string()))
        );
    }

    #[test]
    fn wire_shape_head_with_fetch_keyword() {
        let chunks = [Chunk::Bare("* 3 FETCH (UID 12 FLAGS ())".to_string())];
        let messages = assemble(&chunks);
        assert_eq!(messages[&12].seq, 3);
    }

    #[test]
    fn keyed_by_sequence_when_uid_absent() {
        let chunks = [Chunk::Bare("7 (FLAGS (\\Deleted))".to_string())];
        let messages = assemble(&chunks);
        assert!(messages.contains_key(&7));
    }

    #[test]
    fn multiple_messages_in_one_round_trip() {
        let chunks = [
            Chunk::Bare("1 (UID 101 FLAGS (\\Seen))".to_string()),
            Chunk::Bare("2 (UID 102 FLAGS ())".to_string()),
            Chunk::Bare("3 (UID 103 FLAGS (\\Flagged))".to_string()),
        ];
        let messages = assemble(&chunks);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[&102].seq, 2);
    }

    #[test]
    fn undecoded_field_is_stored_raw() {
        let chunks = [Chunk::Bare(
            "1 (UID 5 X-GM-THRID 1761234567890123456 FLAGS ())".to_string(),
        )];
        let messages = assemble(&chunks);
        assert_eq!(
            messages[&5].get("X-GM-THRID"),
            Some(&FieldValue::Text("1761234567890123456".to_string()))
        );
    }

    #[test]
    fn interleaved_untagged_data_is_skipped() {
        let chunks = [
            Chunk::Bare("1 (UID 42 FLAGS (\\Seen))".to_string()),
            Chunk::Bare("* 9 EXISTS".to_string()),
        ];
        let messages = assemble(&chunks);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn missing_close_marker_is_a_parse_error() {
        let registry = DecoderRegistry::default();
        let chunks = [Chunk::Tuple {
            text: "1 (UID 5 BODY[TEXT] {4}".to_string(),
            payload: b"body".to_vec(),
        }];
        let result = FetchAssembler::new(&registry).assemble(&chunks);
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn truncated_literal_payload_is_a_parse_error() {
        let registry = DecoderRegistry::default();
        let chunks = [
            Chunk::Tuple {
                text: "1 (UID 5 BODY[TEXT] {10}".to_string(),
                payload: b"short".to_vec(),
            },
            Chunk::Bare(")".to_string()),
        ];
        let result = FetchAssembler::new(&registry).assemble(&chunks);
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn registry_overrides_apply_per_assembler() {
        fn upper(raw: &str) -> Result<FieldValue> {
            Ok(FieldValue::Text(raw.to_uppercase()))
        }

        let mut registry = DecoderRegistry::empty();
        registry.register("internaldate", upper);
        let chunks = [Chunk::Bare(
            "1 (INTERNALDATE \"02-Jun-2025 10:12:44 +0200\")".to_string(),
        )];
        let messages = FetchAssembler::new(&registry).assemble(&chunks).unwrap();
        assert_eq!(
            messages[&1].get("INTERNALDATE"),
            Some(&FieldValue::Text("02-JUN-2025 10:12:44 +0200".to_string()))
        );
    }
}
