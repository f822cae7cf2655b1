//! Board session facade.
//!
//! # Responsibility
//! - Own the board state of one scope and its live subscription.
//! - Turn shell drag events into local moves plus gateway updates.
//! - Route pushes and update completions through the reconciler.
//!
//! # Invariants
//! - A successful drop issues exactly one update for the dragged item, plus
//!   one per renumbered sibling.
//! - Dropping in place issues nothing.
//! - Switching scope closes the old stream before the new subscription opens.
//! - A subscription failure never clears the board.

use crate::board::allocator::PositionAllocator;
use crate::board::drag::{DragCommit, DragController, DragState, DropDecision, DropTarget};
use crate::board::reconcile::{
    PendingUpdate, Placement, PushDisposition, Reconciler, SettleOutcome,
};
use crate::board::{Board, Slot};
use crate::config::{BoardConfig, CapacityPolicy, ConfigError};
use crate::gateway::{
    GatewayError, GatewayResult, PersistenceGateway, RequestId, SnapshotEvent, SnapshotStream,
    UpdateRequest, UpdateStatus,
};
use crate::model::column::Column;
use crate::model::item::{ColumnKey, Item, ItemId, Scope};
use crate::repo::item_repo::ItemPatch;
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Session-level failures, surfaced to the shell.
#[derive(Debug)]
pub enum BoardError {
    Config(ConfigError),
    /// Opening a subscription failed.
    Subscribe(GatewayError),
    /// An open subscription reported a failure; the board keeps stale data.
    Subscription(Arc<GatewayError>),
    /// One issued update failed.
    Update {
        request: RequestId,
        item: ItemId,
        error: GatewayError,
    },
    /// Cross-column drop into a full column under `CapacityPolicy::Enforce`.
    CapacityExceeded { column: ColumnKey, limit: usize },
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Subscribe(err) => write!(f, "subscribe failed: {err}"),
            Self::Subscription(err) => write!(f, "subscription failed: {err}"),
            Self::Update {
                request,
                item,
                error,
            } => write!(f, "update {request} for {item} failed: {error}"),
            Self::CapacityExceeded { column, limit } => {
                write!(f, "column `{column}` is full (limit {limit})")
            }
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Subscribe(err) => Some(err),
            Self::Subscription(err) => Some(err.as_ref()),
            Self::Update { error, .. } => Some(error),
            Self::CapacityExceeded { .. } => None,
        }
    }
}

impl From<ConfigError> for BoardError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Result of `BoardSession::on_drag_end`.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// Local move applied and updates issued.
    Committed {
        item: ItemId,
        to: Slot,
        position: f64,
        /// Requests issued, renumbered siblings first.
        requests: Vec<RequestId>,
    },
    /// Dropped where it started; nothing issued.
    Unchanged,
    /// Released outside any target.
    Cancelled,
    /// No matching drag, or the item was gone.
    Aborted,
    /// Refused by the capacity policy.
    Rejected { column: ColumnKey, limit: usize },
}

/// One scope's board, bound to a persistence gateway.
pub struct BoardSession<G: PersistenceGateway> {
    gateway: G,
    config: BoardConfig,
    scope: Scope,
    board: Board,
    drag: DragController,
    allocator: PositionAllocator,
    reconciler: Reconciler,
    stream: Option<SnapshotStream>,
    errors: Vec<BoardError>,
}

impl<G: PersistenceGateway> BoardSession<G> {
    /// Validates `config`, subscribes to `scope` and applies the first push.
    pub fn open(gateway: G, config: BoardConfig, scope: Scope) -> Result<Self, BoardError> {
        config.validate()?;
        let mut session = Self {
            gateway,
            board: Board::empty(config.columns.clone()),
            drag: DragController::new(),
            allocator: config.allocator(),
            reconciler: Reconciler::new(config.reconcile_policy()),
            config,
            scope,
            stream: None,
            errors: Vec::new(),
        };
        session.subscribe()?;
        Ok(session)
    }

    /// Tears down the current scope and subscribes to `scope`.
    ///
    /// On failure the session stays closed on the new scope.
    pub fn switch_scope(&mut self, scope: Scope) -> Result<(), BoardError> {
        info!(
            "event=board_scope module=service status=start from={} to={scope}",
            self.scope
        );
        self.teardown();
        self.scope = scope;
        self.subscribe()
    }

    /// Cancels the subscription and clears all local state.
    pub fn close(&mut self) {
        self.teardown();
        info!(
            "event=board_close module=service status=ok scope={}",
            self.scope
        );
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Applies the latest push, if one arrived.
    pub fn pump(&mut self) -> Option<PushDisposition> {
        let event = self.stream.as_mut()?.try_next()?;
        match event {
            SnapshotEvent::Snapshot(items) => {
                Some(self.reconciler.receive(&mut self.board, &mut self.drag, items))
            }
            SnapshotEvent::Failed(err) => {
                error!(
                    "event=board_push module=service status=error scope={} error={err}",
                    self.scope
                );
                self.record(BoardError::Subscription(err));
                None
            }
        }
    }

    pub fn on_drag_start(&mut self, item: ItemId) -> bool {
        self.drag.start(&self.board, item)
    }

    /// Updates the tentative target; returns it while the drag is live.
    pub fn on_drag_over(&mut self, active: ItemId, target: &DropTarget) -> Option<Slot> {
        self.drag.over(&self.board, active, target).cloned()
    }

    /// Finalizes the drag, commits locally, issues updates and then applies
    /// whichever push is newest.
    pub fn on_drag_end(&mut self, active: ItemId, target: Option<&DropTarget>) -> DropOutcome {
        let outcome = match self.drag.drop(&self.board, active, target) {
            DropDecision::Commit(commit) => self.commit(commit),
            DropDecision::Unchanged => DropOutcome::Unchanged,
            DropDecision::Cancelled => DropOutcome::Cancelled,
            DropDecision::Aborted => DropOutcome::Aborted,
        };
        self.drag.finish();

        self.pump();
        self.reconciler.flush(&mut self.board);
        outcome
    }

    /// Reports the completion of a `Queued` update.
    pub fn settle_update(&mut self, request: RequestId, result: GatewayResult<()>) -> SettleOutcome {
        let item = self.reconciler.pending(request).map(|pending| pending.item);
        let outcome = self
            .reconciler
            .settle(&mut self.board, request, result.as_ref().map(|_| ()));
        if let (Some(item), Err(error)) = (item, result) {
            self.record(BoardError::Update {
                request,
                item,
                error,
            });
        }
        outcome
    }

    pub fn columns(&self) -> &[Column] {
        self.board.columns()
    }

    /// Column contents as drawn, with the drag preview overlaid.
    pub fn column_items(&self, key: &ColumnKey) -> Vec<&Item> {
        self.board.preview_column(key, self.drag.preview())
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn drag_state(&self) -> &DragState {
        self.drag.state()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn pending_updates(&self) -> usize {
        self.reconciler.pending_count()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// Errors recorded since the last take, oldest first.
    pub fn errors(&self) -> &[BoardError] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&BoardError> {
        self.errors.last()
    }

    pub fn take_errors(&mut self) -> Vec<BoardError> {
        std::mem::take(&mut self.errors)
    }

    /// Clears every recorded error and returns the newest.
    pub fn take_last_error(&mut self) -> Option<BoardError> {
        self.take_errors().pop()
    }

    fn record(&mut self, err: BoardError) {
        self.errors.push(err);
    }

    fn subscribe(&mut self) -> Result<(), BoardError> {
        let stream = self.gateway.subscribe(&self.scope).map_err(|err| {
            error!(
                "event=board_subscribe module=service status=error scope={} error={err}",
                self.scope
            );
            BoardError::Subscribe(err)
        })?;
        self.stream = Some(stream);
        self.pump();
        info!(
            "event=board_subscribe module=service status=ok scope={} items={}",
            self.scope,
            self.board.len()
        );
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.drag.abort();
        self.reconciler.clear();
        self.board = Board::empty(self.config.columns.clone());
    }

    fn commit(&mut self, commit: DragCommit) -> DropOutcome {
        let Some(item) = self.board.item(commit.item).cloned() else {
            return DropOutcome::Aborted;
        };

        if commit.changes_column() {
            if let Some(rejected) = self.check_capacity(&commit.to.column) {
                self.drag.abort();
                return rejected;
            }
        }
        let DragCommit {
            item: item_id,
            from,
            to,
        } = commit;

        let allocation = self
            .allocator
            .allocate(&self.board.siblings_excluding(&to.column, item_id), to.index);

        let mut requests = Vec::with_capacity(allocation.renumbered.len() + 1);
        for (sibling_id, position) in &allocation.renumbered {
            let Some(sibling) = self.board.item(*sibling_id).cloned() else {
                continue;
            };
            self.board.place(*sibling_id, &to.column, *position);
            let patch = ItemPatch::position_only(*position, sibling.scope.clone());
            requests.push(self.issue(&sibling, patch));
        }

        self.board.place(item_id, &to.column, allocation.position);
        let patch = ItemPatch::placement(to.column.clone(), allocation.position, item.scope.clone());
        requests.push(self.issue(&item, patch));

        info!(
            "event=drag_commit module=service status=ok item_id={item_id} from={}:{} to={}:{} position={} renumbered={}",
            from.column,
            from.index,
            to.column,
            to.index,
            allocation.position,
            allocation.renumbered.len()
        );
        DropOutcome::Committed {
            item: item_id,
            to,
            position: allocation.position,
            requests,
        }
    }

    fn check_capacity(&mut self, column: &ColumnKey) -> Option<DropOutcome> {
        let config = self.board.column_config(column)?;
        let limit = config.capacity_limit?;
        let current = self.board.column(column).len();
        if !config.is_full(current) {
            return None;
        }

        match self.config.capacity_policy {
            CapacityPolicy::Advisory => {
                warn!(
                    "event=drag_capacity module=service status=ok policy=advisory column={column} limit={limit} current={current}"
                );
                None
            }
            CapacityPolicy::Enforce => {
                warn!(
                    "event=drag_capacity module=service status=skip policy=enforce column={column} limit={limit} current={current}"
                );
                self.record(BoardError::CapacityExceeded {
                    column: column.clone(),
                    limit,
                });
                Some(DropOutcome::Rejected {
                    column: column.clone(),
                    limit,
                })
            }
        }
    }

    /// Tracks and sends one update. `before` is the item prior to the move.
    fn issue(&mut self, before: &Item, patch: ItemPatch) -> RequestId {
        let request = self.reconciler.next_request_id();
        let committed = Placement {
            column: patch
                .column_key
                .clone()
                .unwrap_or_else(|| before.column_key.clone()),
            position: patch.position.unwrap_or(before.position),
        };
        self.reconciler.track(PendingUpdate {
            request,
            item: before.id,
            committed,
            previous: Placement::of(before),
        });

        let update = UpdateRequest {
            id: request,
            item: before.id,
            patch,
        };
        match self.gateway.update(&update) {
            Ok(UpdateStatus::Applied) => {
                self.reconciler.settle(&mut self.board, request, Ok(()));
            }
            Ok(UpdateStatus::Queued) => {
                debug!(
                    "event=board_update module=service status=ok request_id={request} item_id={} queued=true",
                    before.id
                );
            }
            Err(err) => {
                self.reconciler.settle(&mut self.board, request, Err(&err));
                self.record(BoardError::Update {
                    request,
                    item: before.id,
                    error: err,
                });
            }
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::test_support::{columns, item, key};
    use crate::gateway::{snapshot_channel, SnapshotPublisher};

    /// Gateway that hands out one stream and queues every update.
    struct QueueGateway {
        publisher: Option<SnapshotPublisher>,
        initial: Vec<Item>,
        issued: Vec<UpdateRequest>,
    }

    impl PersistenceGateway for QueueGateway {
        fn subscribe(&mut self, _scope: &Scope) -> GatewayResult<SnapshotStream> {
            let (publisher, stream) = snapshot_channel();
            publisher.publish(SnapshotEvent::Snapshot(self.initial.clone()));
            self.publisher = Some(publisher);
            Ok(stream)
        }

        fn update(&mut self, request: &UpdateRequest) -> GatewayResult<UpdateStatus> {
            self.issued.push(request.clone());
            Ok(UpdateStatus::Queued)
        }
    }

    fn open(initial: Vec<Item>) -> BoardSession<QueueGateway> {
        let gateway = QueueGateway {
            publisher: None,
            initial,
            issued: Vec::new(),
        };
        let config = BoardConfig::with_columns(columns(&["BACKLOG", "WON"]));
        BoardSession::open(gateway, config, Scope::tenant("acme")).unwrap()
    }

    #[test]
    fn open_applies_initial_snapshot() {
        let x = item("X", "BACKLOG", 1.0);
        let session = open(vec![x.clone()]);

        assert!(session.is_open());
        assert_eq!(session.board().len(), 1);
        assert!(session.board().contains(x.id));
    }

    #[test]
    fn open_rejects_invalid_config() {
        let gateway = QueueGateway {
            publisher: None,
            initial: Vec::new(),
            issued: Vec::new(),
        };
        let result = BoardSession::open(
            gateway,
            BoardConfig::with_columns(Vec::new()),
            Scope::tenant("acme"),
        );
        assert!(matches!(
            result,
            Err(BoardError::Config(ConfigError::NoColumns))
        ));
    }

    #[test]
    fn queued_update_stays_pending_until_settled() {
        let x = item("X", "BACKLOG", 1.0);
        let mut session = open(vec![x.clone()]);
        let won = key("WON");

        session.on_drag_start(x.id);
        let outcome = session.on_drag_end(x.id, Some(&DropTarget::Column(won.clone())));
        let DropOutcome::Committed { requests, .. } = outcome else {
            panic!("expected commit");
        };
        assert_eq!(requests.len(), 1);
        assert_eq!(session.pending_updates(), 1);
        assert_eq!(session.gateway().issued.len(), 1);

        assert_eq!(
            session.settle_update(requests[0], Ok(())),
            SettleOutcome::Confirmed
        );
        assert_eq!(session.pending_updates(), 0);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn failed_settle_is_recorded_as_update_error() {
        let x = item("X", "BACKLOG", 1.0);
        let mut session = open(vec![x.clone()]);
        let won = key("WON");

        session.on_drag_start(x.id);
        let DropOutcome::Committed { requests, .. } =
            session.on_drag_end(x.id, Some(&DropTarget::Column(won.clone())))
        else {
            panic!("expected commit");
        };

        let outcome = session.settle_update(
            requests[0],
            Err(GatewayError::Unavailable("offline".to_string())),
        );
        assert_eq!(outcome, SettleOutcome::Failed);
        assert!(matches!(
            session.take_last_error(),
            Some(BoardError::Update { item, .. }) if item == x.id
        ));
        assert_eq!(session.board().column_of(x.id), Some(won));
    }

    #[test]
    fn close_drops_subscription_and_state() {
        let x = item("X", "BACKLOG", 1.0);
        let mut session = open(vec![x]);

        session.close();

        assert!(!session.is_open());
        assert!(session.board().is_empty());
        let publisher = session.gateway().publisher.as_ref().unwrap();
        assert!(publisher.is_closed());
        assert!(session.pump().is_none());
    }
}
