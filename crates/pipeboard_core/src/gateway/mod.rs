//! Persistence gateway contract consumed by the board.
//!
//! # Responsibility
//! - Deliver full, position-sorted snapshots for a scope.
//! - Accept single-item placement updates.
//!
//! # Invariants
//! - Snapshots are full replacements, never deltas.
//! - One `update` call touches exactly one item.
//! - A closed stream receives nothing further.

pub mod sqlite;
pub mod stream;

use crate::model::item::{ItemId, Scope};
use crate::repo::item_repo::{ItemPatch, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use stream::{snapshot_channel, SnapshotEvent, SnapshotPublisher, SnapshotStream};

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Session-local id of one issued update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// One single-item update handed to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub id: RequestId,
    pub item: ItemId,
    pub patch: ItemPatch,
}

/// How the gateway handled an accepted update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Written before returning.
    Applied,
    /// Accepted; completion is reported later through
    /// `BoardSession::settle_update`.
    Queued,
}

/// Gateway failures.
#[derive(Debug)]
pub enum GatewayError {
    Repo(RepoError),
    /// The backend refused the request.
    Rejected(String),
    /// The backend could not be reached.
    Unavailable(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Rejected(message) => write!(f, "update rejected: {message}"),
            Self::Unavailable(message) => write!(f, "backend unavailable: {message}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GatewayError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Backing-store access used by a board session.
pub trait PersistenceGateway {
    /// Opens a latest-only snapshot stream for `scope`.
    ///
    /// Implementations deliver an initial snapshot and a new one after every
    /// change visible under `scope`.
    fn subscribe(&mut self, scope: &Scope) -> GatewayResult<SnapshotStream>;

    /// Applies or queues one single-item update.
    fn update(&mut self, request: &UpdateRequest) -> GatewayResult<UpdateStatus>;
}
