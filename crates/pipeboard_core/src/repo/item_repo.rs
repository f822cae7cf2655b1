//! Opportunity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the list/update/create/delete calls the board store needs.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Only active (`is_deleted=0`) rows are listed.
//! - Listing is deterministic: `position ASC, uuid ASC`.
//! - Placement updates only touch rows inside the caller's scope.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::item::{ColumnKey, Item, ItemId, ItemValidationError, Priority, Scope};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    tenant_id,
    team_id,
    title,
    column_key,
    position,
    priority
FROM opportunities";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for opportunity persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Db(DbError),
    /// Row is missing, soft-deleted, or outside the requested scope.
    NotFound(ItemId),
    /// Patch carries no field to change.
    EmptyPatch(ItemId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "opportunity not found: {id}"),
            Self::EmptyPatch(id) => write!(f, "placement patch for {id} changes nothing"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted opportunity data: {message}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "opportunity repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Partial placement update for one item.
///
/// `scope` is the item's own scope and is always checked on write.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPatch {
    pub column_key: Option<ColumnKey>,
    pub position: Option<f64>,
    pub scope: Scope,
}

impl ItemPatch {
    pub fn placement(column_key: ColumnKey, position: f64, scope: Scope) -> Self {
        Self {
            column_key: Some(column_key),
            position: Some(position),
            scope,
        }
    }

    pub fn position_only(position: f64, scope: Scope) -> Self {
        Self {
            column_key: None,
            position: Some(position),
            scope,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.column_key.is_none() && self.position.is_none()
    }
}

/// Repository interface for opportunity rows.
pub trait ItemRepository {
    fn create_item(&self, item: &Item) -> RepoResult<ItemId>;
    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>>;
    /// Lists active items visible under `scope`, position-ordered.
    fn list_items(&self, scope: &Scope) -> RepoResult<Vec<Item>>;
    fn update_placement(&self, id: ItemId, patch: &ItemPatch) -> RepoResult<()>;
    fn soft_delete_item(&self, id: ItemId) -> RepoResult<()>;
}

/// SQLite-backed opportunity repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_item(&self, item: &Item) -> RepoResult<ItemId> {
        item.validate()?;

        self.conn.execute(
            "INSERT INTO opportunities (
                uuid,
                tenant_id,
                team_id,
                title,
                column_key,
                position,
                priority
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                item.id.to_string(),
                item.scope.tenant_id.as_str(),
                item.scope.team_id.as_deref(),
                item.title.as_str(),
                item.column_key.as_str(),
                item.position,
                priority_to_db(item.priority),
            ],
        )?;

        Ok(item.id)
    }

    fn get_item(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE uuid = ?1
               AND is_deleted = 0;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn list_items(&self, scope: &Scope) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE is_deleted = 0
               AND tenant_id = ?1
               AND (?2 IS NULL OR team_id = ?2)
             ORDER BY position ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![scope.tenant_id.as_str(), scope.team_id.as_deref()])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn update_placement(&self, id: ItemId, patch: &ItemPatch) -> RepoResult<()> {
        if patch.is_empty() {
            return Err(RepoError::EmptyPatch(id));
        }
        if let Some(position) = patch.position {
            if !position.is_finite() {
                return Err(ItemValidationError::NonFinitePosition(position).into());
            }
        }

        let changed = self.conn.execute(
            "UPDATE opportunities
             SET
                column_key = COALESCE(?1, column_key),
                position = COALESCE(?2, position),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?3
               AND tenant_id = ?4
               AND team_id IS ?5
               AND is_deleted = 0;",
            params![
                patch.column_key.as_ref().map(ColumnKey::as_str),
                patch.position,
                id.to_string(),
                patch.scope.tenant_id.as_str(),
                patch.scope.team_id.as_deref(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn soft_delete_item(&self, id: ItemId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE opportunities
             SET
                is_deleted = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND is_deleted = 0;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{uuid_text}` in opportunities.uuid"
        ))
    })?;

    let column_text: String = row.get("column_key")?;
    let column_key = ColumnKey::parse(&column_text).map_err(|err| {
        RepoError::InvalidData(format!("{err} in opportunities.column_key"))
    })?;

    let priority_text: String = row.get("priority")?;
    let priority = parse_priority(&priority_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in opportunities.priority"
        ))
    })?;

    let item = Item {
        id: ItemId::from_uuid(uuid),
        title: row.get("title")?,
        column_key,
        position: row.get("position")?,
        priority,
        scope: Scope {
            tenant_id: row.get("tenant_id")?,
            team_id: row.get("team_id")?,
        },
    };
    item.validate()?;
    Ok(item)
}

fn priority_to_db(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

fn parse_priority(value: &str) -> Option<Priority> {
    match value {
        "low" => Some(Priority::Low),
        "medium" => Some(Priority::Medium),
        "high" => Some(Priority::High),
        _ => None,
    }
}
