///
/// CommitSummary
///
/// Result of a collaborator commit: row counts per write kind.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommitSummary {
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl CommitSummary {
    /// Total rows written.
    #[must_use]
    pub const fn rows(&self) -> u64 {
        self.inserted + self.updated + self.deleted
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    pub(crate) const fn merge(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}
