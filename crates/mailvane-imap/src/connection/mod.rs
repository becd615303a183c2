//! Connection management: configuration, transport streams, protocol
//! framing, and the mailbox session.

mod config;
mod framed;
mod session;
mod stream;

pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub use session::MailboxSession;
pub use stream::{ImapStream, connect};
