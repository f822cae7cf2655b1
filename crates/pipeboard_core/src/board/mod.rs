//! Board model: per-column ordered item sequences.
//!
//! # Responsibility
//! - Group an authoritative snapshot by column and order each group.
//! - Offer the local mutations the drag and reconcile layers need.
//!
//! # Invariants
//! - Every loaded item sits in exactly one bucket (a column or `unplaced`).
//! - Bucket order is `position ASC, id ASC` after every mutation.
//! - `load` replaces every bucket at once; there is no delta path.

pub mod allocator;
pub mod drag;
pub mod reconcile;

use crate::model::column::Column;
use crate::model::item::{ColumnKey, Item, ItemId};
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// A `(column, index)` placement on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub column: ColumnKey,
    pub index: usize,
}

impl Slot {
    pub fn new(column: ColumnKey, index: usize) -> Self {
        Self { column, index }
    }
}

/// In-memory board state for one scope.
#[derive(Debug, Clone, Default)]
pub struct Board {
    columns: Vec<Column>,
    items_by_column: HashMap<ColumnKey, Vec<Item>>,
    unplaced: Vec<Item>,
}

impl Board {
    /// Creates a board with configured columns and no items.
    pub fn empty(columns: Vec<Column>) -> Self {
        let items_by_column = columns
            .iter()
            .map(|column| (column.key.clone(), Vec::new()))
            .collect();
        Self {
            columns,
            items_by_column,
            unplaced: Vec::new(),
        }
    }

    /// Builds a board from one full snapshot.
    ///
    /// Items naming an unknown column are kept in `unplaced`; repeated ids keep
    /// their first occurrence.
    pub fn load(columns: &[Column], items: Vec<Item>) -> Self {
        let mut board = Self::empty(columns.to_vec());
        let mut seen = HashSet::with_capacity(items.len());
        let total = items.len();

        for item in items {
            if !seen.insert(item.id) {
                warn!(
                    "event=board_load module=board status=skip reason=duplicate_id item_id={}",
                    item.id
                );
                continue;
            }
            match board.items_by_column.get_mut(&item.column_key) {
                Some(bucket) => bucket.push(item),
                None => {
                    warn!(
                        "event=board_load module=board status=skip reason=unknown_column item_id={} column={}",
                        item.id, item.column_key
                    );
                    board.unplaced.push(item);
                }
            }
        }

        for bucket in board.items_by_column.values_mut() {
            bucket.sort_by(item_order);
        }

        debug!(
            "event=board_load module=board status=ok columns={} items={} unplaced={}",
            board.columns.len(),
            total,
            board.unplaced.len()
        );
        board
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_config(&self, key: &ColumnKey) -> Option<&Column> {
        self.columns.iter().find(|column| &column.key == key)
    }

    pub fn has_column(&self, key: &ColumnKey) -> bool {
        self.items_by_column.contains_key(key)
    }

    /// Ordered items of one column; empty for unknown keys.
    pub fn column(&self, key: &ColumnKey) -> &[Item] {
        self.items_by_column
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Finds the column and index currently holding `id`.
    pub fn locate(&self, id: ItemId) -> Option<Slot> {
        self.columns.iter().find_map(|column| {
            self.column(&column.key)
                .iter()
                .position(|item| item.id == id)
                .map(|index| Slot::new(column.key.clone(), index))
        })
    }

    pub fn column_of(&self, id: ItemId) -> Option<ColumnKey> {
        self.locate(id).map(|slot| slot.column)
    }

    /// Looks up a placed or unplaced item.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items_by_column
            .values()
            .flatten()
            .chain(self.unplaced.iter())
            .find(|item| item.id == id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.item(id).is_some()
    }

    /// Sorted ids of every item on the board, unplaced ones included.
    pub fn item_ids(&self) -> Vec<ItemId> {
        let mut ids = self
            .items_by_column
            .values()
            .flatten()
            .chain(self.unplaced.iter())
            .map(|item| item.id)
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.items_by_column.values().map(Vec::len).sum::<usize>() + self.unplaced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items whose column is not configured on this board.
    pub fn unplaced(&self) -> &[Item] {
        &self.unplaced
    }

    /// Ordered items of `key` with `id` left out.
    pub fn siblings_excluding(&self, key: &ColumnKey, id: ItemId) -> Vec<&Item> {
        self.column(key)
            .iter()
            .filter(|item| item.id != id)
            .collect()
    }

    /// Moves `id` into `column` with a new `position`, keeping bucket order.
    ///
    /// Returns `false` when the item or the column is unknown; the board is
    /// left untouched in that case.
    pub fn place(&mut self, id: ItemId, column: &ColumnKey, position: f64) -> bool {
        if !self.items_by_column.contains_key(column) {
            return false;
        }
        let Some(mut item) = self.take(id) else {
            return false;
        };
        item.column_key = column.clone();
        item.position = position;

        let bucket = self.items_by_column.entry(column.clone()).or_default();
        let at = bucket.partition_point(|existing| item_order(existing, &item) == Ordering::Less);
        bucket.insert(at, item);
        true
    }

    /// Column contents as the shell should draw them while a drag is active.
    ///
    /// The dragged item is lifted out of its source column and shown at
    /// `target` (index clamped to the column length). Stored order is not
    /// changed.
    pub fn preview_column(&self, key: &ColumnKey, dragged: Option<(ItemId, &Slot)>) -> Vec<&Item> {
        let Some((dragged_id, target)) = dragged else {
            return self.column(key).iter().collect();
        };
        let mut items = self.siblings_excluding(key, dragged_id);
        if &target.column == key {
            if let Some(item) = self.item(dragged_id) {
                let at = target.index.min(items.len());
                items.insert(at, item);
            }
        }
        items
    }

    fn take(&mut self, id: ItemId) -> Option<Item> {
        for bucket in self.items_by_column.values_mut() {
            if let Some(index) = bucket.iter().position(|item| item.id == id) {
                return Some(bucket.remove(index));
            }
        }
        let index = self.unplaced.iter().position(|item| item.id == id)?;
        Some(self.unplaced.remove(index))
    }
}

/// Total order used for every column: position, then id.
pub fn item_order(left: &Item, right: &Item) -> Ordering {
    left.position
        .total_cmp(&right.position)
        .then_with(|| left.id.cmp(&right.id))
}
