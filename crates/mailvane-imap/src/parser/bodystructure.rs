//! BODYSTRUCTURE / BODY response parsing.
//!
//! A body-structure value is a parenthesized tree describing a message's
//! MIME layout. The parser walks the raw character stream with recursive
//! descent and produces a [`BodyNode`] tree in which addressable parts
//! carry their dot-separated part number (`1`, `1.2`, `2.1.3`, …),
//! computed from their position so the same input always numbers the
//! same way.

#![allow(clippy::missing_errors_doc)]

use super::scanner::{self, TokenKind};
use crate::{Error, Result};

/// Number of scalar fields in a complete single-part body: type,
/// subtype, parameter list, id, description, encoding, size.
///
/// Reaching this count is used as a structural proxy for "this group is
/// an addressable single-part body". It is not the RFC 3501 grammar
/// (which distinguishes the shapes by the position of the subtype atom),
/// and servers emitting nonstandard extension shapes may defeat it;
/// downstream part addressing depends on this exact behavior, so it
/// stays.
const LEAF_FIELDS: usize = 7;

/// One node of a parsed body structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyNode {
    /// Scalar field: media type, parameter atom, numeric field, …
    Scalar(String),
    /// The `NIL` field.
    Nil,
    /// Ordered group of fields or child parts.
    List(Vec<BodyNode>),
    /// Addressable MIME part tagged with its part number.
    Part {
        /// Dot-separated, 1-based part number.
        number: String,
        /// The part's field group.
        fields: Vec<BodyNode>,
    },
}

impl BodyNode {
    /// Returns the part number when this node is addressable.
    #[must_use]
    pub fn part_number(&self) -> Option<&str> {
        match self {
            Self::Part { number, .. } => Some(number),
            _ => None,
        }
    }

    /// Returns the node's field group, if it has one.
    #[must_use]
    pub fn fields(&self) -> Option<&[BodyNode]> {
        match self {
            Self::List(items) => Some(items),
            Self::Part { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Returns the scalar text of this node.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true when this node is a multipart group (its first field
    /// is the wrapped child list).
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        matches!(self.fields().and_then(|f| f.first()), Some(Self::List(_)))
    }

    /// Returns the immediate children of a multipart group.
    #[must_use]
    pub fn children(&self) -> Option<&[BodyNode]> {
        match self.fields()?.first()? {
            Self::List(children) => Some(children),
            _ => None,
        }
    }

    /// Returns the multipart subtype (`mixed`, `alternative`, …), the
    /// scalar following the child list.
    #[must_use]
    pub fn multipart_subtype(&self) -> Option<&str> {
        if !self.is_multipart() {
            return None;
        }
        self.fields()?.get(1)?.as_scalar()
    }

    /// Returns the media type and subtype of a single-part body.
    #[must_use]
    pub fn media_type(&self) -> Option<(&str, &str)> {
        if self.is_multipart() {
            return None;
        }
        let fields = self.fields()?;
        Some((fields.first()?.as_scalar()?, fields.get(1)?.as_scalar()?))
    }

    /// Counts the single-part leaves in this tree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Scalar(_) | Self::Nil => 0,
            Self::List(items) => Self::group_leaf_count(items),
            Self::Part { fields, .. } => Self::group_leaf_count(fields),
        }
    }

    fn group_leaf_count(fields: &[BodyNode]) -> usize {
        if let Some(Self::List(children)) = fields.first() {
            return children.iter().map(Self::leaf_count).sum();
        }
        if fields.len() >= LEAF_FIELDS
            && matches!(fields.first(), Some(Self::Scalar(_)))
            && matches!(fields.get(1), Some(Self::Scalar(_)))
        {
            return 1;
        }
        fields.iter().map(Self::leaf_count).sum()
    }
}

/// How many nested parts the current group has accumulated so far.
///
/// Threaded explicitly through the parse instead of inspecting the shape
/// of the accumulated fields: the first nested part is appended in
/// place, the second promotes the pair into a wrapped child list, and
/// later parts append into that list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Children {
    NoChildYet,
    /// One nested part, sitting at the recorded field index.
    OneChild(usize),
    /// Child list established at the recorded field index.
    Multipart(usize),
}

/// Parses a full BODYSTRUCTURE / BODY value, opening parenthesis
/// included.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the value does not start with `(` or a
/// group is left unclosed at end of input.
pub fn parse(input: &[u8]) -> Result<BodyNode> {
    let start = input
        .iter()
        .position(|&b| b != b' ')
        .ok_or_else(|| Error::parse(0, "empty body structure"))?;
    if input[start] != b'(' {
        return Err(Error::parse(start, "body structure must start with '('"));
    }
    let (node, _close) = parse_group(&input[start + 1..], 0, "")?;
    Ok(node)
}

/// Parses one parenthesized group.
///
/// `buf` must be positioned just after the group's opening parenthesis;
/// `depth` is the nesting depth of that parenthesis and `prefix` the
/// dotted part number of the enclosing part (empty at the root). Returns
/// the parsed node and the offset of the matching `)` within `buf` —
/// nesting is fully mirrored, every recursion consumes exactly its own
/// closing parenthesis.
pub fn parse_group(buf: &[u8], depth: usize, prefix: &str) -> Result<(BodyNode, usize)> {
    let mut fields: Vec<BodyNode> = Vec::new();
    let mut children = Children::NoChildYet;
    let mut ordinal = 0u32;
    let mut i = 0;

    while i < buf.len() {
        match buf[i] {
            b'(' => {
                ordinal += 1;
                let child_prefix = if prefix.is_empty() {
                    ordinal.to_string()
                } else {
                    format!("{prefix}.{ordinal}")
                };
                let (child, close) = parse_group(&buf[i + 1..], depth + 1, &child_prefix)?;
                i += close + 2;

                match children {
                    Children::NoChildYet => {
                        children = Children::OneChild(fields.len());
                        fields.push(child);
                    }
                    Children::OneChild(at) => {
                        let first = fields.remove(at);
                        fields.insert(at, BodyNode::List(vec![first, child]));
                        children = Children::Multipart(at);
                    }
                    Children::Multipart(at) => {
                        if let Some(BodyNode::List(list)) = fields.get_mut(at) {
                            list.push(child);
                        }
                    }
                }
            }
            b')' => {
                let addressable = depth > 0
                    && (matches!(children, Children::Multipart(_))
                        || fields.len() >= LEAF_FIELDS);
                let node = if addressable {
                    BodyNode::Part {
                        number: prefix.to_string(),
                        fields,
                    }
                } else {
                    BodyNode::List(fields)
                };
                return Ok((node, i));
            }
            b' ' => i += 1,
            _ => {
                let token = scanner::scan_token(&buf[i..])?;
                match token.kind {
                    TokenKind::Literal => {
                        let count = scanner::literal_length(&buf[i..=i + token.end])?;
                        let mut data = i + token.end + 1;
                        if buf[data..].starts_with(b"\r\n") {
                            data += 2;
                        }
                        let end = data + count;
                        if end > buf.len() {
                            return Err(Error::parse(buf.len(), "truncated literal field"));
                        }
                        fields.push(BodyNode::Scalar(field_text(&buf[data..end], data)?));
                        i = end;
                    }
                    TokenKind::Quoted => {
                        let raw = field_text(&buf[i..=i + token.end], i)?;
                        fields.push(BodyNode::Scalar(scanner::unquote(&raw)));
                        i += token.end + 1;
                    }
                    TokenKind::Atom => {
                        let raw = field_text(&buf[i..=i + token.end], i)?;
                        if raw.eq_ignore_ascii_case("NIL") {
                            fields.push(BodyNode::Nil);
                        } else {
                            fields.push(BodyNode::Scalar(raw));
                        }
                        i += token.end + 1;
                    }
                }
            }
        }
    }

    Err(Error::parse(
        buf.len(),
        format!("unclosed group at depth {depth}"),
    ))
}

fn field_text(bytes: &[u8], position: usize) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| Error::parse(position, "invalid UTF-8 in body structure field"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TEXT_PLAIN: &str =
        "(\"text\" \"plain\" (\"charset\" \"utf-8\") NIL NIL \"quoted-printable\" 1152 23)";

    const ALTERNATIVE: &str = "((\"text\" \"plain\" (\"charset\" \"iso-8859-1\") NIL NIL \
         \"quoted-printable\" 724 26)(\"text\" \"html\" (\"charset\" \"iso-8859-1\") NIL NIL \
         \"quoted-printable\" 2662 52) \"alternative\")";

    #[test]
    fn single_part_is_a_flat_field_list() {
        let node = parse(TEXT_PLAIN.as_bytes()).unwrap();

        let fields = node.fields().unwrap();
        assert!(fields.len() >= 7);
        assert!(!node.is_multipart());
        assert_eq!(node.media_type(), Some(("text", "plain")));
        assert_eq!(fields[5].as_scalar(), Some("quoted-printable"));
        assert_eq!(fields[6].as_scalar(), Some("1152"));
        // No wrapped child list anywhere: the only nested group is the
        // parameter list.
        assert!(
            !fields
                .iter()
                .any(|f| matches!(f, BodyNode::List(items) if items.len() > 2))
        );
    }

    #[test]
    fn multipart_children_are_wrapped_and_numbered() {
        let node = parse(ALTERNATIVE.as_bytes()).unwrap();

        assert!(node.is_multipart());
        assert_eq!(node.multipart_subtype(), Some("alternative"));
        let children = node.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].part_number(), Some("1"));
        assert_eq!(children[1].part_number(), Some("2"));
        assert_eq!(children[1].media_type(), Some(("text", "html")));
    }

    #[test]
    fn three_children_append_into_the_established_list() {
        let input = "((\"text\" \"plain\" NIL NIL NIL \"7bit\" 10 1)\
             (\"text\" \"html\" NIL NIL NIL \"7bit\" 20 2)\
             (\"image\" \"png\" NIL NIL NIL \"base64\" 4096) \"mixed\")";
        let node = parse(input.as_bytes()).unwrap();

        let children = node.children().unwrap();
        assert_eq!(children.len(), 3);
        let numbers: Vec<_> = children.iter().filter_map(BodyNode::part_number).collect();
        assert_eq!(numbers, ["1", "2", "3"]);
        assert_eq!(node.multipart_subtype(), Some("mixed"));
    }

    #[test]
    fn nested_multipart_numbers_dot_separated() {
        let input = "(((\"text\" \"plain\" NIL NIL NIL \"7bit\" 10 1)\
             (\"text\" \"html\" NIL NIL NIL \"7bit\" 20 2) \"alternative\")\
             (\"application\" \"pdf\" (\"name\" \"a.pdf\") NIL NIL \"base64\" 9000) \"mixed\")";
        let node = parse(input.as_bytes()).unwrap();

        let children = node.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].part_number(), Some("1"));
        let inner = children[0].children().unwrap();
        assert_eq!(inner[0].part_number(), Some("1.1"));
        assert_eq!(inner[1].part_number(), Some("1.2"));
        assert_eq!(children[1].part_number(), Some("2"));
    }

    #[test]
    fn wrapped_alternative_yields_part_one() {
        // The shape a server returns for BODY of a message whose whole
        // body is one multipart/alternative: the value wraps the
        // multipart in one extra group.
        let input = format!("({ALTERNATIVE})");
        let node = parse(input.as_bytes()).unwrap();

        let fields = node.fields().unwrap();
        assert_eq!(fields.len(), 1);
        let part = &fields[0];
        assert_eq!(part.part_number(), Some("1"));
        assert!(part.is_multipart());
        assert_eq!(part.multipart_subtype(), Some("alternative"));
        assert_eq!(part.children().unwrap().len(), 2);
    }

    #[test]
    fn leaf_count_matches_single_part_groups() {
        let node = parse(ALTERNATIVE.as_bytes()).unwrap();
        assert_eq!(node.leaf_count(), 2);

        let node = parse(TEXT_PLAIN.as_bytes()).unwrap();
        assert_eq!(node.leaf_count(), 1);

        let deep = "(((\"text\" \"plain\" NIL NIL NIL \"7bit\" 10 1)\
             (\"text\" \"html\" NIL NIL NIL \"7bit\" 20 2) \"alternative\")\
             (\"image\" \"gif\" NIL NIL NIL \"base64\" 500)\
             (\"application\" \"pdf\" NIL NIL NIL \"base64\" 9000) \"mixed\")";
        let node = parse(deep.as_bytes()).unwrap();
        assert_eq!(node.leaf_count(), 4);
    }

    #[test]
    fn parse_is_idempotent() {
        let first = parse(ALTERNATIVE.as_bytes()).unwrap();
        let second = parse(ALTERNATIVE.as_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unclosed_group_is_a_parse_error() {
        let input = "(\"text\" \"plain\" (\"charset\" \"utf-8\") NIL NIL \"7bit\" 1152";
        assert!(matches!(
            parse(input.as_bytes()),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn missing_opening_paren_is_a_parse_error() {
        assert!(matches!(
            parse(b"\"text\" \"plain\""),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn literal_field_consumes_declared_count() {
        let input = b"({7}\r\nx-weird \"plain\" NIL NIL NIL \"7bit\" 42 7)";
        let node = parse(input).unwrap();
        let fields = node.fields().unwrap();
        assert_eq!(fields[0].as_scalar(), Some("x-weird"));
        assert_eq!(fields[1].as_scalar(), Some("plain"));
    }

    #[test]
    fn extension_fields_keep_leaf_addressable() {
        // Extension data after the size: md5, disposition, language.
        let input = "((\"application\" \"octet-stream\" NIL NIL NIL \"base64\" 572 NIL \
             (\"attachment\" (\"filename\" \"report.bin\")) NIL) \"mixed\")";
        let node = parse(input.as_bytes()).unwrap();
        let fields = node.fields().unwrap();
        assert_eq!(fields[0].part_number(), Some("1"));
    }
}
