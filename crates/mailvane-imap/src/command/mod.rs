//! IMAP command construction and serialization.

mod serialize;
mod tag;

pub use tag::TagGenerator;

use crate::types::{Flag, Folder, IdSet, SortOrder};

use serialize::{write_astring, write_fetch_items, write_search_criteria, write_store_action};

/// An IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// LOGOUT command.
    Logout,
    /// SELECT command.
    Select {
        /// Folder to select.
        folder: Folder,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Folder pattern.
        pattern: String,
    },
    /// SORT command (RFC 5256).
    Sort {
        /// Sort program.
        order: SortOrder,
        /// Search criteria restricting the sorted set.
        criteria: SearchCriteria,
        /// Use UIDs.
        uid: bool,
    },
    /// SEARCH command.
    Search {
        /// Search criteria.
        criteria: SearchCriteria,
        /// Use UIDs.
        uid: bool,
    },
    /// FETCH command.
    Fetch {
        /// Message id set.
        set: IdSet,
        /// Items to fetch.
        items: FetchItems,
        /// Use UIDs.
        uid: bool,
    },
    /// STORE command (flag mutation).
    Store {
        /// Message id set.
        set: IdSet,
        /// Store action.
        action: StoreAction,
        /// Use UIDs.
        uid: bool,
        /// Suppress the untagged FETCH echoes.
        silent: bool,
    },
    /// COPY command.
    Copy {
        /// Message id set.
        set: IdSet,
        /// Destination folder.
        folder: Folder,
        /// Use UIDs.
        uid: bool,
    },
    /// EXPUNGE command.
    Expunge,
}

impl Command {
    /// Returns the command verb, safe to log (never arguments, never
    /// credentials).
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::Logout => "LOGOUT",
            Self::Select { .. } => "SELECT",
            Self::List { .. } => "LIST",
            Self::Sort { .. } => "SORT",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
            Self::Store { .. } => "STORE",
            Self::Copy { .. } => "COPY",
            Self::Expunge => "EXPUNGE",
        }
    }

    /// Serializes the command to wire bytes with the given tag.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }

            Self::Logout => buf.extend_from_slice(b"LOGOUT"),

            Self::Select { folder } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, &folder.to_wire());
            }

            Self::List { reference, pattern } => {
                buf.extend_from_slice(b"LIST ");
                write_astring(&mut buf, reference);
                buf.push(b' ');
                write_astring(&mut buf, pattern);
            }

            Self::Sort {
                order,
                criteria,
                uid,
            } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"SORT ");
                buf.extend_from_slice(order.program().as_bytes());
                buf.extend_from_slice(b" UTF-8 ");
                write_search_criteria(&mut buf, criteria);
            }

            Self::Search { criteria, uid } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"SEARCH ");
                write_search_criteria(&mut buf, criteria);
            }

            Self::Fetch { set, items, uid } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"FETCH ");
                buf.extend_from_slice(set.to_string().as_bytes());
                buf.push(b' ');
                write_fetch_items(&mut buf, items);
            }

            Self::Store {
                set,
                action,
                uid,
                silent,
            } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"STORE ");
                buf.extend_from_slice(set.to_string().as_bytes());
                buf.push(b' ');
                write_store_action(&mut buf, action, *silent);
            }

            Self::Copy { set, folder, uid } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"COPY ");
                buf.extend_from_slice(set.to_string().as_bytes());
                buf.push(b' ');
                write_astring(&mut buf, &folder.to_wire());
            }

            Self::Expunge => buf.extend_from_slice(b"EXPUNGE"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// Items requested by a FETCH command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// The ALL macro: FLAGS INTERNALDATE RFC822.SIZE ENVELOPE.
    All,
    /// The FAST macro: FLAGS INTERNALDATE RFC822.SIZE.
    Fast,
    /// An explicit attribute set.
    Items(Vec<FetchAttribute>),
}

impl FetchItems {
    /// The field set the webmail listing fetches: flags, UID, size,
    /// body structure, and the listed headers (peeked, so listing does
    /// not mark messages read).
    #[must_use]
    pub fn listing(headers: &[&str]) -> Self {
        Self::Items(vec![
            FetchAttribute::Flags,
            FetchAttribute::Uid,
            FetchAttribute::Rfc822Size,
            FetchAttribute::BodyStructure,
            FetchAttribute::HeaderFields(headers.iter().map(ToString::to_string).collect()),
        ])
    }
}

/// A single FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// UID.
    Uid,
    /// Internal date.
    InternalDate,
    /// Message size in octets.
    Rfc822Size,
    /// The entire message.
    Rfc822,
    /// Body structure.
    BodyStructure,
    /// Selected header fields, peeked: `BODY.PEEK[HEADER.FIELDS (…)]`.
    HeaderFields(Vec<String>),
    /// A body section, optionally peeked, with an optional partial
    /// range.
    Body {
        /// Section specifier (`1`, `1.2`, `TEXT`, …; `None` for the
        /// whole body).
        section: Option<String>,
        /// Use BODY.PEEK (do not set \Seen).
        peek: bool,
        /// Partial range `<start.length>`.
        partial: Option<(u32, u32)>,
    },
}

/// Flag mutation for a STORE command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// Replace the flag set.
    SetFlags(Vec<Flag>),
    /// Add flags.
    AddFlags(Vec<Flag>),
    /// Remove flags.
    RemoveFlags(Vec<Flag>),
}

/// Search criteria for SEARCH and SORT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages without \Seen.
    Unseen,
    /// Messages with \Seen.
    Seen,
    /// Messages with \Answered.
    Answered,
    /// Messages with \Flagged.
    Flagged,
    /// Messages with \Deleted.
    Deleted,
    /// From header contains.
    From(String),
    /// To header contains.
    To(String),
    /// Subject contains.
    Subject(String),
    /// Header or body contains.
    Text(String),
    /// Named header contains.
    Header(String, String),
    /// All criteria must match.
    And(Vec<SearchCriteria>),
    /// Either criterion matches.
    Or(Box<SearchCriteria>, Box<SearchCriteria>),
    /// Criterion must not match.
    Not(Box<SearchCriteria>),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn login_plain_atoms() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        assert_eq!(cmd.serialize("A0001"), b"A0001 LOGIN user pass\r\n");
    }

    #[test]
    fn login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pass word".to_string(),
        };
        assert_eq!(
            cmd.serialize("A0001"),
            b"A0001 LOGIN user@example.com \"pass word\"\r\n"
        );
    }

    #[test]
    fn select_encodes_folder_name() {
        let cmd = Command::Select {
            folder: Folder::new("Entw\u{fc}rfe"),
        };
        assert_eq!(cmd.serialize("A0002"), b"A0002 SELECT Entw&APw-rfe\r\n");
    }

    #[test]
    fn list_wildcard() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(cmd.serialize("A0002"), b"A0002 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn uid_sort_reverse_date() {
        let cmd = Command::Sort {
            order: SortOrder::default(),
            criteria: SearchCriteria::All,
            uid: true,
        };
        assert_eq!(
            cmd.serialize("A0003"),
            b"A0003 UID SORT (REVERSE DATE) UTF-8 ALL\r\n"
        );
    }

    #[test]
    fn uid_sort_with_criteria() {
        let cmd = Command::Sort {
            order: SortOrder::default(),
            criteria: SearchCriteria::From("alice".to_string()),
            uid: true,
        };
        assert_eq!(
            cmd.serialize("A0004"),
            b"A0004 UID SORT (REVERSE DATE) UTF-8 FROM alice\r\n"
        );
    }

    #[test]
    fn uid_fetch_listing_field_set() {
        let cmd = Command::Fetch {
            set: IdSet::Ids(vec![46931, 46910]),
            items: FetchItems::listing(&["DATE", "FROM", "TO", "CC", "SUBJECT"]),
            uid: true,
        };
        assert_eq!(
            cmd.serialize("A0005"),
            b"A0005 UID FETCH 46931,46910 (FLAGS UID RFC822.SIZE BODYSTRUCTURE \
              BODY.PEEK[HEADER.FIELDS (DATE FROM TO CC SUBJECT)])\r\n"
                .to_vec()
        );
    }

    #[test]
    fn uid_fetch_whole_message() {
        let cmd = Command::Fetch {
            set: IdSet::Ids(vec![46931]),
            items: FetchItems::Items(vec![FetchAttribute::Rfc822]),
            uid: true,
        };
        assert_eq!(cmd.serialize("A0006"), b"A0006 UID FETCH 46931 RFC822\r\n");
    }

    #[test]
    fn store_silent_add() {
        let cmd = Command::Store {
            set: IdSet::Range(1, 4),
            action: StoreAction::AddFlags(vec![Flag::Seen]),
            uid: true,
            silent: true,
        };
        assert_eq!(
            cmd.serialize("A0007"),
            b"A0007 UID STORE 1:4 +FLAGS.SILENT (\\Seen)\r\n"
        );
    }

    #[test]
    fn store_remove() {
        let cmd = Command::Store {
            set: IdSet::Ids(vec![9]),
            action: StoreAction::RemoveFlags(vec![Flag::Flagged]),
            uid: true,
            silent: false,
        };
        assert_eq!(
            cmd.serialize("A0008"),
            b"A0008 UID STORE 9 -FLAGS (\\Flagged)\r\n"
        );
    }

    #[test]
    fn copy_to_encoded_folder() {
        let cmd = Command::Copy {
            set: IdSet::Ids(vec![12, 14]),
            folder: Folder::new("Archive 2025"),
            uid: true,
        };
        assert_eq!(
            cmd.serialize("A0009"),
            b"A0009 UID COPY 12,14 \"Archive 2025\"\r\n"
        );
    }

    #[test]
    fn search_composed_criteria() {
        let cmd = Command::Search {
            criteria: SearchCriteria::And(vec![
                SearchCriteria::Unseen,
                SearchCriteria::Subject("invoice".to_string()),
            ]),
            uid: true,
        };
        assert_eq!(
            cmd.serialize("A0010"),
            b"A0010 UID SEARCH UNSEEN SUBJECT invoice\r\n"
        );
    }

    #[test]
    fn expunge_and_logout() {
        assert_eq!(Command::Expunge.serialize("A0011"), b"A0011 EXPUNGE\r\n");
        assert_eq!(Command::Logout.serialize("A0012"), b"A0012 LOGOUT\r\n");
    }
}
