//! Core domain types: folders, message identifiers, flags, sort orders.

mod flags;
mod folder;
mod identifiers;
mod sequence;
mod sort;

pub use flags::Flag;
pub use folder::{Folder, FolderAttribute, FolderInfo};
pub use identifiers::{SeqNum, Uid};
pub use sequence::IdSet;
pub use sort::{SortKey, SortOrder};
