//! Message id sets for commands.

/// A set of message ids (sequence numbers or UIDs) for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSet {
    /// Inclusive contiguous range, `first:last`.
    Range(u32, u32),
    /// Explicit id list, `1,5,9`.
    Ids(Vec<u32>),
}

impl IdSet {
    /// Builds a set from an id slice, collapsing to a range when the
    /// ids are contiguous and ascending.
    #[must_use]
    pub fn from_ids(ids: &[u32]) -> Self {
        let contiguous = ids.len() > 1
            && ids
                .windows(2)
                .all(|pair| pair[1] == pair[0].saturating_add(1));
        if contiguous {
            Self::Range(ids[0], ids[ids.len() - 1])
        } else {
            Self::Ids(ids.to_vec())
        }
    }

    /// Returns true when the set names no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Range(..) => false,
            Self::Ids(ids) => ids.is_empty(),
        }
    }
}

impl std::fmt::Display for IdSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Range(first, last) => write!(f, "{first}:{last}"),
            Self::Ids(ids) => {
                for (i, id) in ids.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{id}")?;
                }
                Ok(())
            }
        }
    }
}
