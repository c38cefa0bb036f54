use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Create,
    Update,
    Delete,
}

impl DiffKind {
    pub fn symbol(&self) -> &'static str {
        match self {
            DiffKind::Create => "+",
            DiffKind::Update => "~",
            DiffKind::Delete => "-",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// What one sync cycle (or local reconciliation) changed in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// The cycle replaced the scope from a complete listing.
    pub full: bool,
}

impl SyncReport {
    pub fn record(&mut self, kind: DiffKind) {
        match kind {
            DiffKind::Create => self.created += 1,
            DiffKind::Update => self.updated += 1,
            DiffKind::Delete => self.deleted += 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted{}",
            self.created,
            self.updated,
            self.deleted,
            if self.full { " (full)" } else { "" }
        )
    }
}
