//! Sort orders for mailbox listings (RFC 5256 SORT).

/// Sort key for the server-side SORT command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Internal arrival date.
    Arrival,
    /// Date header.
    Date,
    /// First Cc address.
    Cc,
    /// First From address.
    From,
    /// Message size.
    Size,
    /// Base subject.
    Subject,
    /// First To address.
    To,
}

impl SortKey {
    /// Returns the wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arrival => "ARRIVAL",
            Self::Date => "DATE",
            Self::Cc => "CC",
            Self::From => "FROM",
            Self::Size => "SIZE",
            Self::Subject => "SUBJECT",
            Self::To => "TO",
        }
    }
}

/// A sort order: key plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    /// The sort key.
    pub key: SortKey,
    /// Reverse the key's natural order.
    pub reverse: bool,
}

impl SortOrder {
    /// Creates a sort order.
    #[must_use]
    pub const fn new(key: SortKey, reverse: bool) -> Self {
        Self { key, reverse }
    }

    /// Renders the parenthesized SORT program, e.g. `(REVERSE DATE)`.
    #[must_use]
    pub fn program(self) -> String {
        if self.reverse {
            format!("(REVERSE {})", self.key.as_str())
        } else {
            format!("({})", self.key.as_str())
        }
    }
}

impl Default for SortOrder {
    /// Newest first: reverse date.
    fn default() -> Self {
        Self::new(SortKey::Date, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_reverse_date() {
        assert_eq!(SortOrder::default().program(), "(REVERSE DATE)");
    }

    #[test]
    fn forward_program_has_no_reverse() {
        assert_eq!(
            SortOrder::new(SortKey::Subject, false).program(),
            "(SUBJECT)"
        );
        assert_eq!(
            SortOrder::new(SortKey::Size, true).program(),
            "(REVERSE SIZE)"
        );
    }
}
