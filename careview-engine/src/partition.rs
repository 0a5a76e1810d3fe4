//! Review-status partitioning for dashboards.
//!
//! Partitions an effective-item list into pending / approved /
//! changes-required buckets. The lazy Pending default is applied here, not
//! only at read time, so the partition invariant holds for items that have
//! never been reviewed.

use careview_core::{AgeGroup, EffectiveItem, ItemKey, ReviewState, ReviewStatus};
use std::collections::HashMap;

/// Review lookup keyed the way status rows are: by item identity and
/// age-group variant.
pub type StatusIndex = HashMap<(ItemKey, AgeGroup), ReviewState>;

/// Build the lookup index from a tenant's review rows.
pub fn status_index(statuses: &[ReviewStatus]) -> StatusIndex {
    statuses
        .iter()
        .map(|s| ((s.item, s.age_group), s.state))
        .collect()
}

/// The partitioned view. Invariant:
/// `pending.len() + approved.len() + changes_required.len() == all.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPartition {
    pub all: Vec<EffectiveItem>,
    pub pending: Vec<EffectiveItem>,
    pub approved: Vec<EffectiveItem>,
    pub changes_required: Vec<EffectiveItem>,
}

impl ReviewPartition {
    /// Bucket sizes, for dashboard counters.
    pub fn counts(&self) -> ReviewCounts {
        ReviewCounts {
            all: self.all.len(),
            pending: self.pending.len(),
            approved: self.approved.len(),
            changes_required: self.changes_required.len(),
        }
    }
}

/// Counters derived from a [`ReviewPartition`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewCounts {
    pub all: usize,
    pub pending: usize,
    pub approved: usize,
    pub changes_required: usize,
}

impl ReviewCounts {
    /// The partition invariant, checkable on every input.
    pub fn is_consistent(&self) -> bool {
        self.pending + self.approved + self.changes_required == self.all
    }
}

/// Partition effective items by review state. An item with no status row
/// counts as Pending.
pub fn partition(items: &[EffectiveItem], statuses: &StatusIndex) -> ReviewPartition {
    let mut result = ReviewPartition::default();
    for item in items {
        let state = statuses
            .get(&(item.key, item.age_group))
            .copied()
            .unwrap_or(ReviewState::Pending);
        result.all.push(item.clone());
        match state {
            ReviewState::Pending => result.pending.push(item.clone()),
            ReviewState::Approved => result.approved.push(item.clone()),
            ReviewState::ChangesRequired => result.changes_required.push(item.clone()),
        }
    }
    result
}

// =============================================================================
// TESTS
// =============================================================================
