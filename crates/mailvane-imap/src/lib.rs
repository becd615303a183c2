//! # mailvane-imap
//!
//! Message-store access layer for the mailvane webmail: an IMAP client
//! that turns raw server responses into structured message metadata and
//! exposes the listing operations the web layer needs.
//!
//! ## What lives here
//!
//! - **Response parsing** ([`parser`]): a token boundary scanner, a
//!   recursive-descent BODYSTRUCTURE parser producing part-numbered
//!   MIME trees, a chunked FETCH assembler with an injectable decoder
//!   registry, and a response-line classifier. All of it pure and
//!   synchronous.
//! - **Folder-name transcoding** ([`mutf7`]): modified UTF-7 on the
//!   wire, native UTF-8 in the API.
//! - **Commands** ([`command`]): typed command construction and wire
//!   serialization.
//! - **The session** ([`connection`]): one live TLS connection per user
//!   context, sorted cached listings, paginated fetches, flag mutation,
//!   move, expunge.
//!
//! ## Quick start
//!
//! ```ignore
//! use mailvane_imap::{Config, FetchItems, MailboxSession};
//!
//! #[tokio::main]
//! async fn main() -> mailvane_imap::Result<()> {
//!     let config = Config::new("imap.example.net");
//!     let mut session = MailboxSession::login(&config, "user", "secret").await?;
//!
//!     // Login lands in INBOX with a reverse-date listing computed.
//!     let page = session
//!         .fetch_page(1, 50, FetchItems::listing(&["DATE", "FROM", "SUBJECT"]))
//!         .await?;
//!     for message in &page {
//!         println!("{:?}", message.get("BODY[HEADER.FIELDS (DATE FROM SUBJECT)]"));
//!     }
//!
//!     session.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! Parsing is safe from any number of tasks on independent buffers. A
//! session wraps exactly one connection, never pipelines, and must be
//! confined to one execution context at a time; pool sessions per user
//! instead of sharing one.

#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod mutf7;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{Config, ConfigBuilder, ImapStream, MailboxSession, Security};
pub use error::{Error, Result};
pub use parser::{
    BodyNode, Chunk, DecoderRegistry, FetchAssembler, FetchedMessage, FieldValue, ResponseLine,
};
pub use types::{Flag, Folder, FolderAttribute, FolderInfo, IdSet, SeqNum, SortKey, SortOrder, Uid};
