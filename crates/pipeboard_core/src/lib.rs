//! Core of the pipeline reordering board.
//! Owns ordering, drag and reconciliation invariants; shells only render.

pub mod board;
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use board::allocator::{Allocation, PositionAllocator, DEFAULT_POSITION_GAP};
pub use board::drag::{DragController, DragState, DropTarget, PointerHalf};
pub use board::reconcile::{ApplyReport, PushDisposition, ReconcilePolicy, SettleOutcome};
pub use board::{Board, Slot};
pub use config::{pipeline_columns, BoardConfig, CapacityPolicy, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use gateway::sqlite::SqliteGateway;
pub use gateway::{
    GatewayError, GatewayResult, PersistenceGateway, RequestId, SnapshotEvent, SnapshotStream,
    UpdateRequest, UpdateStatus,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::column::Column;
pub use model::item::{ColumnKey, Item, ItemId, ItemValidationError, Priority, Scope};
pub use repo::item_repo::{ItemPatch, ItemRepository, RepoError, RepoResult, SqliteItemRepository};
pub use service::board_service::{BoardError, BoardSession, DropOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
