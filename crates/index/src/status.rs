//! Validity and failure state carried by every block-index node.

/// Header passed basic sanity checks.
pub const VALID_HEADER: u32 = 1;
/// Header connects into the tree: parent known, height and bits coherent.
pub const VALID_TREE: u32 = 2;
/// Transactions were received and checked against the header.
pub const VALID_TRANSACTIONS: u32 = 3;

const VALIDITY_MASK: u32 = 0x07;

const HAVE_DATA: u32 = 1 << 3;
const HAVE_UNDO: u32 = 1 << 4;
const FAILED: u32 = 1 << 5;
const FAILED_CHILD: u32 = 1 << 6;
const FAILED_MASK: u32 = FAILED | FAILED_CHILD;

/// Bitset of validity tier plus data/failure flags. Failure is one-way:
/// nothing here ever clears a failure bit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BlockStatus(u32);

impl BlockStatus {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn validity(self) -> u32 {
        self.0 & VALIDITY_MASK
    }

    /// True when the node reached at least the given validity tier and is
    /// not failed.
    pub fn is_valid(self, up_to: u32) -> bool {
        debug_assert_eq!(up_to & !VALIDITY_MASK, 0);
        if self.is_failed() {
            return false;
        }
        self.validity() >= up_to
    }

    pub fn is_failed(self) -> bool {
        (self.0 & FAILED_MASK) != 0
    }

    pub fn is_failed_child(self) -> bool {
        (self.0 & FAILED_CHILD) != 0
    }

    pub fn has_data(self) -> bool {
        (self.0 & HAVE_DATA) != 0
    }

    pub fn has_undo(self) -> bool {
        (self.0 & HAVE_UNDO) != 0
    }

    #[must_use]
    pub fn with_validity(self, level: u32) -> Self {
        debug_assert_eq!(level & !VALIDITY_MASK, 0);
        Self((self.0 & !VALIDITY_MASK) | level)
    }

    #[must_use]
    pub fn with_data(self) -> Self {
        Self(self.0 | HAVE_DATA)
    }

    #[must_use]
    pub fn with_undo(self) -> Self {
        Self(self.0 | HAVE_UNDO)
    }

    #[must_use]
    pub fn with_failed(self) -> Self {
        Self(self.0 | FAILED)
    }

    #[must_use]
    pub fn with_failed_child(self) -> Self {
        Self(self.0 | FAILED_CHILD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_tiers_are_ordered() {
        let status = BlockStatus::default().with_validity(VALID_TRANSACTIONS);
        assert!(status.is_valid(VALID_HEADER));
        assert!(status.is_valid(VALID_TREE));
        assert!(status.is_valid(VALID_TRANSACTIONS));
    }

    #[test]
    fn failure_masks_validity() {
        let status = BlockStatus::default()
            .with_validity(VALID_TRANSACTIONS)
            .with_failed();
        assert!(status.is_failed());
        assert!(!status.is_valid(VALID_TREE));
    }

    #[test]
    fn failed_child_is_distinct_from_failed_self() {
        let status = BlockStatus::default().with_failed_child();
        assert!(status.is_failed());
        assert!(status.is_failed_child());
        let status = BlockStatus::default().with_failed();
        assert!(!status.is_failed_child());
    }

    #[test]
    fn data_flags_do_not_affect_validity() {
        let status = BlockStatus::default()
            .with_validity(VALID_TREE)
            .with_data()
            .with_undo();
        assert!(status.has_data());
        assert!(status.has_undo());
        assert!(status.is_valid(VALID_TREE));
        assert!(!status.is_valid(VALID_TRANSACTIONS));
    }
}
