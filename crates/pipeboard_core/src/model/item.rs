//! Opportunity item domain model.
//!
//! # Responsibility
//! - Define the record placed on the pipeline board.
//! - Keep item identity and column identity in separate, typed namespaces.
//!
//! # Invariants
//! - `ItemId` is stable and never reused for another item.
//! - `ColumnKey` values always match `COLUMN_KEY_PATTERN`.
//! - `position` is finite; it is an ordering key, not a rank.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Accepted shape for column keys, e.g. `BACKLOG`, `WON`, `IN_REVIEW`.
pub const COLUMN_KEY_PATTERN: &str = r"^[A-Z][A-Z0-9_]{0,63}$";

static COLUMN_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(COLUMN_KEY_PATTERN).expect("valid column key regex"));

/// Stable identifier of one board item.
///
/// Deliberately not interchangeable with [`ColumnKey`]: a lookup keyed by one
/// can never match the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an id that already exists in the backing store.
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one board column (pipeline stage).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ColumnKey(String);

impl ColumnKey {
    /// Parses and validates a column key.
    ///
    /// Surrounding whitespace is trimmed; letters must already be upper case.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, ColumnKeyError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ColumnKeyError::Empty);
        }
        if !COLUMN_KEY_RE.is_match(trimmed) {
            return Err(ColumnKeyError::Invalid(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ColumnKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ColumnKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ColumnKey::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Column key parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKeyError {
    Empty,
    Invalid(String),
}

impl Display for ColumnKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "column key must not be blank"),
            Self::Invalid(value) => write!(
                f,
                "column key `{value}` must match {COLUMN_KEY_PATTERN}"
            ),
        }
    }
}

impl Error for ColumnKeyError {}

/// Opportunity priority as captured by the edit forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Tenant/team scope of an item, also used as a subscription filter.
///
/// As a filter, `team_id = None` selects every team of the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub tenant_id: String,
    pub team_id: Option<String>,
}

impl Scope {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            team_id: None,
        }
    }

    pub fn team(tenant_id: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            team_id: Some(team_id.into()),
        }
    }

    /// Returns whether an item scoped by `item_scope` is visible under this filter.
    pub fn matches(&self, item_scope: &Scope) -> bool {
        self.tenant_id == item_scope.tenant_id
            && match self.team_id.as_deref() {
                None => true,
                Some(team) => item_scope.team_id.as_deref() == Some(team),
            }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.team_id.as_deref() {
            Some(team) => write!(f, "{}/{}", self.tenant_id, team),
            None => write!(f, "{}/*", self.tenant_id),
        }
    }
}

/// One opportunity on the pipeline board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub column_key: ColumnKey,
    /// Sort key inside `column_key`. Gaps are expected.
    pub position: f64,
    pub priority: Priority,
    pub scope: Scope,
}

impl Item {
    /// Creates an item with a generated id and default priority.
    pub fn new(
        title: impl Into<String>,
        column_key: ColumnKey,
        position: f64,
        scope: Scope,
    ) -> Self {
        Self {
            id: ItemId::new(),
            title: title.into(),
            column_key,
            position,
            priority: Priority::default(),
            scope,
        }
    }

    /// Checks the persisted-field rules before any write.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.title.trim().is_empty() {
            return Err(ItemValidationError::BlankTitle);
        }
        if !self.position.is_finite() {
            return Err(ItemValidationError::NonFinitePosition(self.position));
        }
        if self.scope.tenant_id.trim().is_empty() {
            return Err(ItemValidationError::BlankTenant);
        }
        Ok(())
    }
}

/// Item write-path validation failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValidationError {
    BlankTitle,
    NonFinitePosition(f64),
    BlankTenant,
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "item title must not be blank"),
            Self::NonFinitePosition(value) => {
                write!(f, "item position must be finite, got {value}")
            }
            Self::BlankTenant => write!(f, "item tenant id must not be blank"),
        }
    }
}

impl Error for ItemValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(value: &str) -> ColumnKey {
        ColumnKey::parse(value).unwrap()
    }

    #[test]
    fn column_key_accepts_stage_names_and_trims() {
        assert_eq!(key(" BACKLOG ").as_str(), "BACKLOG");
        assert_eq!(key("IN_REVIEW_2").as_str(), "IN_REVIEW_2");
    }

    #[test]
    fn column_key_rejects_blank_and_lowercase() {
        assert_eq!(ColumnKey::parse("  "), Err(ColumnKeyError::Empty));
        assert!(matches!(
            ColumnKey::parse("backlog"),
            Err(ColumnKeyError::Invalid(value)) if value == "backlog"
        ));
        assert!(ColumnKey::parse("9LIVES").is_err());
    }

    #[test]
    fn column_key_deserialize_runs_validation() {
        let parsed: ColumnKey = serde_json::from_str("\"WON\"").unwrap();
        assert_eq!(parsed, key("WON"));
        assert!(serde_json::from_str::<ColumnKey>("\"won\"").is_err());
    }

    #[test]
    fn scope_filter_without_team_matches_every_team() {
        let filter = Scope::tenant("acme");
        assert!(filter.matches(&Scope::team("acme", "red")));
        assert!(filter.matches(&Scope::tenant("acme")));
        assert!(!filter.matches(&Scope::tenant("globex")));

        let team_filter = Scope::team("acme", "red");
        assert!(team_filter.matches(&Scope::team("acme", "red")));
        assert!(!team_filter.matches(&Scope::team("acme", "blue")));
        assert!(!team_filter.matches(&Scope::tenant("acme")));
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut item = Item::new("Deal", key("BACKLOG"), 1000.0, Scope::tenant("acme"));
        assert!(item.validate().is_ok());

        item.position = f64::NAN;
        assert!(matches!(
            item.validate(),
            Err(ItemValidationError::NonFinitePosition(_))
        ));

        item.position = 1.0;
        item.title = "   ".to_string();
        assert_eq!(item.validate(), Err(ItemValidationError::BlankTitle));

        item.title = "Deal".to_string();
        item.scope.tenant_id = String::new();
        assert_eq!(item.validate(), Err(ItemValidationError::BlankTenant));
    }
}
