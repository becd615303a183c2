//! Modified UTF-7 folder-name encoding (RFC 3501 §5.1.3).
//!
//! Mailbox names travel the wire in modified UTF-7: printable US-ASCII
//! represents itself, `&` is escaped as `&-`, and everything else is
//! carried as modified-BASE64 of the UTF-16BE code units between `&`
//! and `-`. The API keeps native UTF-8 strings; transcoding happens at
//! the command/response boundary.

use base64::Engine as _;
use base64::engine::GeneralPurpose;
use base64::engine::general_purpose::NO_PAD;

use crate::{Error, Result};

/// Modified BASE64: the IMAP alphabet (`,` instead of `/`), no padding.
const MUTF7: GeneralPurpose = GeneralPurpose::new(&base64::alphabet::IMAP_MUTF7, NO_PAD);

/// Encodes a native folder name for the wire.
#[must_use]
pub fn encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending: Vec<u16> = Vec::new();

    for ch in name.chars() {
        match ch {
            '&' => {
                flush(&mut out, &mut pending);
                out.push_str("&-");
            }
            ' '..='%' | '\''..='~' => {
                flush(&mut out, &mut pending);
                out.push(ch);
            }
            _ => {
                let mut units = [0u16; 2];
                pending.extend_from_slice(ch.encode_utf16(&mut units));
            }
        }
    }
    flush(&mut out, &mut pending);
    out
}

fn flush(out: &mut String, pending: &mut Vec<u16>) {
    if pending.is_empty() {
        return;
    }
    let bytes: Vec<u8> = pending.iter().flat_map(|u| u.to_be_bytes()).collect();
    out.push('&');
    out.push_str(&MUTF7.encode(bytes));
    out.push('-');
    pending.clear();
}

/// Decodes a wire folder name back to native UTF-8.
///
/// # Errors
///
/// Returns [`Error::Parse`] on raw control or 8-bit bytes, an
/// unterminated `&…-` shift, or invalid BASE64/UTF-16 inside a shift.
pub fn decode(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'&' => {
                let close = bytes[i + 1..]
                    .iter()
                    .position(|&b| b == b'-')
                    .ok_or_else(|| Error::parse(i, "unterminated shift in folder name"))?;
                let end = i + 1 + close;
                if end == i + 1 {
                    // "&-" is the escape for a literal ampersand.
                    out.push('&');
                } else {
                    let decoded = MUTF7
                        .decode(&bytes[i + 1..end])
                        .map_err(|_| Error::parse(i, "invalid modified BASE64 in folder name"))?;
                    if decoded.len() % 2 != 0 {
                        return Err(Error::parse(i, "odd UTF-16 byte count in folder name"));
                    }
                    let units: Vec<u16> = decoded
                        .chunks_exact(2)
                        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                        .collect();
                    for unit in char::decode_utf16(units) {
                        out.push(
                            unit.map_err(|_| Error::parse(i, "invalid UTF-16 in folder name"))?,
                        );
                    }
                }
                i = end + 1;
            }
            c @ (0x20..=0x25 | 0x27..=0x7e) => {
                out.push(char::from(c));
                i += 1;
            }
            _ => return Err(Error::parse(i, "invalid byte in modified UTF-7 folder name")),
        }
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(encode("INBOX"), "INBOX");
        assert_eq!(decode("INBOX").unwrap(), "INBOX");
        assert_eq!(encode("Sent Items"), "Sent Items");
    }

    #[test]
    fn ampersand_escapes() {
        assert_eq!(encode("A&B"), "A&-B");
        assert_eq!(decode("A&-B").unwrap(), "A&B");
        assert_eq!(decode("&-").unwrap(), "&");
    }

    #[test]
    fn mixed_script_mailbox_name() {
        // RFC 3501 §5.1.3 example.
        assert_eq!(
            decode("~peter/mail/&U,BTFw-/&ZeVnLIqe-").unwrap(),
            "~peter/mail/台北/日本語"
        );
        assert_eq!(
            encode("~peter/mail/台北/日本語"),
            "~peter/mail/&U,BTFw-/&ZeVnLIqe-"
        );
    }

    #[test]
    fn bmp_character_round_trip() {
        assert_eq!(decode("&Jjo-!").unwrap(), "☺!");
        assert_eq!(encode("☺!"), "&Jjo-!");
    }

    #[test]
    fn unterminated_shift_is_rejected() {
        assert!(matches!(decode("&Jjo!"), Err(Error::Parse { .. })));
        assert!(matches!(decode("Drafts&"), Err(Error::Parse { .. })));
    }

    #[test]
    fn raw_eight_bit_is_rejected() {
        assert!(decode("caf\u{e9}").is_err());
    }

    #[test]
    fn superfluous_shift_still_decodes() {
        // Not the canonical form, but some servers emit it.
        assert_eq!(decode("&U,BTFw-&ZeVnLIqe-").unwrap(), "台北日本語");
        assert_eq!(decode("&U,BTF2XlZyyKng-").unwrap(), "台北日本語");
    }

    #[test]
    fn supplementary_plane_round_trip() {
        let name = "archive-𝒜";
        assert_eq!(decode(&encode(name)).unwrap(), name);
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn round_trip(name in "\\PC*") {
                prop_assert_eq!(decode(&encode(&name)).unwrap(), name);
            }

            #[test]
            fn encoded_form_is_wire_safe(name in "\\PC*") {
                let wire = encode(&name);
                prop_assert!(wire.bytes().all(|b| (0x20..=0x7e).contains(&b)));
            }
        }
    }
}
