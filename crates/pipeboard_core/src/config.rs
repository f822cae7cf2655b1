//! Board session configuration.
//!
//! # Responsibility
//! - Describe the column layout and the policy switches of a board session.
//! - Load that description from JSON and validate it.
//!
//! # Invariants
//! - A validated config has at least one column and unique column keys.
//! - `position_gap` is finite and at least 2 so a renumbered column can be
//!   bisected at least once.

use crate::board::allocator::{PositionAllocator, DEFAULT_POSITION_GAP};
use crate::board::reconcile::ReconcilePolicy;
use crate::model::column::Column;
use crate::model::item::ColumnKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const PIPELINE_STAGES: &[(&str, &str, Option<usize>)] = &[
    ("BACKLOG", "Backlog", None),
    ("QUALIFYING", "Qualifying", None),
    ("PROPOSAL", "Proposal", None),
    ("REVIEW", "Review", Some(5)),
    ("WON", "Won", None),
    ("LOST", "Lost", None),
];

/// What a drop into a full column does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Allow the drop and log a warning.
    #[default]
    Advisory,
    /// Reject cross-column drops into a full column.
    Enforce,
}

/// Configuration for one board session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    pub columns: Vec<Column>,
    pub position_gap: f64,
    pub capacity_policy: CapacityPolicy,
    pub rollback_on_failure: bool,
    pub hold_pending_moves: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            columns: pipeline_columns(),
            position_gap: DEFAULT_POSITION_GAP,
            capacity_policy: CapacityPolicy::default(),
            rollback_on_failure: false,
            hold_pending_moves: false,
        }
    }
}

impl BoardConfig {
    /// Default config with a custom column layout.
    pub fn with_columns(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns.is_empty() {
            return Err(ConfigError::NoColumns);
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if !seen.insert(&column.key) {
                return Err(ConfigError::DuplicateColumn(column.key.clone()));
            }
            if column.capacity_limit == Some(0) {
                return Err(ConfigError::ZeroCapacity(column.key.clone()));
            }
        }

        if !self.position_gap.is_finite() || self.position_gap < 2.0 {
            return Err(ConfigError::InvalidGap(self.position_gap));
        }
        Ok(())
    }

    pub fn reconcile_policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            hold_pending_moves: self.hold_pending_moves,
            rollback_on_failure: self.rollback_on_failure,
        }
    }

    pub fn allocator(&self) -> PositionAllocator {
        PositionAllocator::new(self.position_gap)
    }
}

/// Built-in pipeline stages.
pub fn pipeline_columns() -> Vec<Column> {
    PIPELINE_STAGES
        .iter()
        .filter_map(|(key, title, limit)| {
            let column = Column::new(ColumnKey::parse(key).ok()?, *title);
            Some(match limit {
                Some(limit) => column.with_capacity(*limit),
                None => column,
            })
        })
        .collect()
}

/// Configuration load/validation failures.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    NoColumns,
    DuplicateColumn(ColumnKey),
    ZeroCapacity(ColumnKey),
    InvalidGap(f64),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid board config: {err}"),
            Self::NoColumns => write!(f, "board config must declare at least one column"),
            Self::DuplicateColumn(key) => write!(f, "column `{key}` is declared twice"),
            Self::ZeroCapacity(key) => {
                write!(f, "column `{key}` capacity limit must be at least 1")
            }
            Self::InvalidGap(value) => {
                write!(f, "position gap must be a finite number >= 2, got {value}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_pipeline() {
        let config = BoardConfig::default();
        config.validate().unwrap();

        let keys = config
            .columns
            .iter()
            .map(|column| column.key.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec!["BACKLOG", "QUALIFYING", "PROPOSAL", "REVIEW", "WON", "LOST"]
        );
        assert_eq!(config.columns[3].capacity_limit, Some(5));
        assert_eq!(config.capacity_policy, CapacityPolicy::Advisory);
    }

    #[test]
    fn json_overrides_merge_with_defaults() {
        let config = BoardConfig::from_json_str(
            r#"{
                "columns": [
                    {"key": "BACKLOG", "title": "Backlog"},
                    {"key": "WON", "title": "Won", "capacity_limit": 3}
                ],
                "capacity_policy": "enforce",
                "rollback_on_failure": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.columns.len(), 2);
        assert_eq!(config.columns[1].capacity_limit, Some(3));
        assert_eq!(config.capacity_policy, CapacityPolicy::Enforce);
        assert!(config.reconcile_policy().rollback_on_failure);
        assert!(!config.reconcile_policy().hold_pending_moves);
        assert_eq!(config.position_gap, DEFAULT_POSITION_GAP);
    }

    #[test]
    fn json_rejects_bad_keys_and_unknown_fields() {
        let lowercase = BoardConfig::from_json_str(r#"{"columns": [{"key": "won", "title": "Won"}]}"#);
        assert!(matches!(lowercase, Err(ConfigError::Parse(_))));

        let unknown = BoardConfig::from_json_str(r#"{"colums": []}"#);
        assert!(matches!(unknown, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn validate_rejects_duplicates_gap_and_zero_capacity() {
        let duplicate = BoardConfig::from_json_str(
            r#"{"columns": [{"key": "WON", "title": "a"}, {"key": "WON", "title": "b"}]}"#,
        );
        assert!(matches!(duplicate, Err(ConfigError::DuplicateColumn(key)) if key.as_str() == "WON"));

        let gap = BoardConfig::from_json_str(r#"{"position_gap": 1.0}"#);
        assert!(matches!(gap, Err(ConfigError::InvalidGap(_))));

        let zero = BoardConfig::from_json_str(
            r#"{"columns": [{"key": "WON", "title": "Won", "capacity_limit": 0}]}"#,
        );
        assert!(matches!(zero, Err(ConfigError::ZeroCapacity(_))));

        let empty = BoardConfig::from_json_str(r#"{"columns": []}"#);
        assert!(matches!(empty, Err(ConfigError::NoColumns)));
    }
}
