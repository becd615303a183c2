//! Response parsing: token scanning, body structures, FETCH assembly,
//! and response-line classification.
//!
//! Everything in this module is synchronous, pure, and free of side
//! effects — safe to call from any number of tasks on independent
//! buffers. Network I/O lives in [`crate::connection`].

pub mod bodystructure;
pub mod fetch;
pub mod response;
pub mod scanner;

pub use bodystructure::BodyNode;
pub use fetch::{Chunk, DecoderRegistry, FetchAssembler, FetchedMessage, FieldValue, flatten};
pub use response::{ResponseLine, Status, parse_line};
pub use scanner::{Token, TokenKind, scan_token};
