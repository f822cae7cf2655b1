//! Position allocation for drops.
//!
//! # Responsibility
//! - Produce an ordering key strictly between the two neighbors of a drop.
//! - Fall back to renumbering the destination column when no key fits.
//!
//! # Invariants
//! - Allocated keys are whole numbers; a gap is usable only when an integer
//!   lies strictly inside it.
//! - After applying an allocation (including renumbered siblings) the column
//!   is strictly increasing with the new item at the requested index.

use crate::model::item::{Item, ItemId};

/// Spacing between keys on renumber, and offset for empty/end drops.
pub const DEFAULT_POSITION_GAP: f64 = 1000.0;

/// Result of one allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Key for the dropped item.
    pub position: f64,
    /// Siblings whose key changed because the column was renumbered.
    pub renumbered: Vec<(ItemId, f64)>,
}

impl Allocation {
    fn fit(position: f64) -> Self {
        Self {
            position,
            renumbered: Vec::new(),
        }
    }

    pub fn renumbers(&self) -> bool {
        !self.renumbered.is_empty()
    }
}

/// Computes ordering keys for drops into a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAllocator {
    gap: f64,
}

impl Default for PositionAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_POSITION_GAP)
    }
}

impl PositionAllocator {
    pub fn new(gap: f64) -> Self {
        Self { gap }
    }

    /// Allocates a key for an item dropped at `index`.
    ///
    /// `siblings` is the destination column in board order with the dropped
    /// item already left out. `index` is clamped to `siblings.len()`.
    pub fn allocate(&self, siblings: &[&Item], index: usize) -> Allocation {
        let index = index.min(siblings.len());
        let before = index
            .checked_sub(1)
            .and_then(|at| siblings.get(at))
            .map(|item| item.position);
        let after = siblings.get(index).map(|item| item.position);

        let candidate = match (before, after) {
            (None, None) => Some(self.gap),
            (Some(low), Some(high)) => bisect(low, high),
            (None, Some(high)) => bisect(0.0, high),
            (Some(low), None) => {
                let next = low + self.gap;
                (next.is_finite() && next > low).then_some(next)
            }
        };

        match candidate {
            Some(position) => Allocation::fit(position),
            None => self.renumber(siblings, index),
        }
    }

    fn renumber(&self, siblings: &[&Item], index: usize) -> Allocation {
        let renumbered = siblings
            .iter()
            .enumerate()
            .filter_map(|(at, sibling)| {
                let rank = if at < index { at } else { at + 1 };
                let target = self.key_for_rank(rank);
                (sibling.position != target).then_some((sibling.id, target))
            })
            .collect();

        Allocation {
            position: self.key_for_rank(index),
            renumbered,
        }
    }

    fn key_for_rank(&self, rank: usize) -> f64 {
        (rank as f64 + 1.0) * self.gap
    }
}

fn bisect(low: f64, high: f64) -> Option<f64> {
    if low >= high {
        return None;
    }
    let middle = (low + (high - low) / 2.0).floor();
    (middle > low && middle < high).then_some(middle)
}
