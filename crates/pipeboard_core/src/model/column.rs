//! Board column (pipeline stage) configuration.

use super::item::ColumnKey;
use serde::{Deserialize, Serialize};

/// One column shown on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub key: ColumnKey,
    pub title: String,
    /// Advisory unless the session runs with `CapacityPolicy::Enforce`.
    #[serde(default)]
    pub capacity_limit: Option<usize>,
}

impl Column {
    pub fn new(key: ColumnKey, title: impl Into<String>) -> Self {
        Self {
            key,
            title: title.into(),
            capacity_limit: None,
        }
    }

    pub fn with_capacity(mut self, limit: usize) -> Self {
        self.capacity_limit = Some(limit);
        self
    }

    /// Returns whether adding one more item would exceed the limit.
    pub fn is_full(&self, current_len: usize) -> bool {
        self.capacity_limit
            .is_some_and(|limit| current_len >= limit)
    }
}
