//! Folder (mailbox) types.

use crate::mutf7;

/// A folder name in native UTF-8.
///
/// The wire carries folder names in modified UTF-7; conversion happens
/// through [`Folder::to_wire`] and [`Folder::from_wire`] at the command
/// and response boundaries, never in between.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Folder(String);

impl Folder {
    /// Creates a folder from its native name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The INBOX folder (case-insensitive per RFC).
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the native name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encodes the name for the wire.
    #[must_use]
    pub fn to_wire(&self) -> String {
        mutf7::encode(&self.0)
    }

    /// Decodes a wire name. Names that are not valid modified UTF-7 are
    /// kept verbatim; some servers send raw UTF-8 regardless.
    #[must_use]
    pub fn from_wire(wire: &str) -> Self {
        Self(mutf7::decode(wire).unwrap_or_else(|_| wire.to_string()))
    }
}

impl std::fmt::Display for Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    /// Folder attributes from the LIST response.
    pub attributes: Vec<FolderAttribute>,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Folder name, decoded to native UTF-8.
    pub name: Folder,
}

impl FolderInfo {
    /// Returns true when the folder can be selected.
    #[must_use]
    pub fn selectable(&self) -> bool {
        !self.attributes.contains(&FolderAttribute::NoSelect)
    }
}

/// Folder attributes from LIST responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FolderAttribute {
    /// Folder cannot be selected.
    NoSelect,
    /// Folder has no children.
    HasNoChildren,
    /// Folder has children.
    HasChildren,
    /// Folder is marked for attention.
    Marked,
    /// Folder is not marked.
    Unmarked,
    /// Drafts folder (RFC 6154).
    Drafts,
    /// Sent folder (RFC 6154).
    Sent,
    /// Junk/spam folder (RFC 6154).
    Junk,
    /// Trash folder (RFC 6154).
    Trash,
    /// Archive folder (RFC 6154).
    Archive,
    /// Unknown attribute, kept verbatim.
    Unknown(String),
}

impl FolderAttribute {
    /// Parses a folder attribute atom.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\DRAFTS" => Self::Drafts,
            "\\SENT" => Self::Sent,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\TRASH" => Self::Trash,
            "\\ARCHIVE" => Self::Archive,
            _ => Self::Unknown(s.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip_for_ascii() {
        let folder = Folder::new("Sent Items");
        assert_eq!(folder.to_wire(), "Sent Items");
        assert_eq!(Folder::from_wire("Sent Items"), folder);
    }

    #[test]
    fn wire_round_trip_for_non_ascii() {
        let folder = Folder::new("Entwürfe");
        assert_eq!(folder.to_wire(), "Entw&APw-rfe");
        assert_eq!(Folder::from_wire("Entw&APw-rfe"), folder);
    }

    #[test]
    fn undecodable_wire_name_kept_verbatim() {
        assert_eq!(Folder::from_wire("Caf\u{e9}").as_str(), "Caf\u{e9}");
    }

    #[test]
    fn attribute_parsing() {
        assert_eq!(
            FolderAttribute::parse("\\NoSelect"),
            FolderAttribute::NoSelect
        );
        assert_eq!(FolderAttribute::parse("\\Spam"), FolderAttribute::Junk);
        assert_eq!(
            FolderAttribute::parse("\\Custom"),
            FolderAttribute::Unknown("\\Custom".to_string())
        );
    }

    #[test]
    fn noselect_folders_are_not_selectable() {
        let info = FolderInfo {
            attributes: vec![FolderAttribute::NoSelect, FolderAttribute::HasChildren],
            delimiter: Some('/'),
            name: Folder::new("[Gmail]"),
        };
        assert!(!info.selectable());
    }
}
