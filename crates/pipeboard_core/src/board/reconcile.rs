//! Reconciliation of authoritative pushes with local optimistic moves.
//!
//! # Responsibility
//! - Decide whether each push is applied now or buffered behind a drag.
//! - Track issued updates until they settle.
//! - Apply the failure and hold policies chosen in `ReconcilePolicy`.
//!
//! # Invariants
//! - At most one push is buffered; a newer push replaces it, and any applied
//!   push discards it.
//! - Applying a push always rebuilds the whole board from it. The only local
//!   state layered on top is a held, still-unsettled move when
//!   `hold_pending_moves` is on.
//! - Settling an unknown request is a no-op.

use super::drag::DragController;
use super::Board;
use crate::gateway::{GatewayError, RequestId};
use crate::model::item::{ColumnKey, Item, ItemId};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};

/// Reconciliation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcilePolicy {
    /// Keep an unsettled local move when a push does not reflect it yet.
    pub hold_pending_moves: bool,
    /// Restore the previous placement as soon as an update fails.
    pub rollback_on_failure: bool,
}

/// Column and key of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub column: ColumnKey,
    pub position: f64,
}

impl Placement {
    pub fn of(item: &Item) -> Self {
        Self {
            column: item.column_key.clone(),
            position: item.position,
        }
    }

    fn matches(&self, item: &Item) -> bool {
        self.column == item.column_key && self.position == item.position
    }
}

/// One issued update awaiting settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub request: RequestId,
    pub item: ItemId,
    pub committed: Placement,
    pub previous: Placement,
}

/// What happened to the items this session moved when a push was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Server placement replaced a local move.
    pub snapped: Vec<ItemId>,
    /// Local unsettled move kept over the pushed placement.
    pub held: Vec<ItemId>,
    /// Push agreed with the local move.
    pub confirmed: Vec<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushDisposition {
    Applied(ApplyReport),
    /// Held back until the active drag ends.
    Buffered,
    /// Push contradicted the dragged item's source; the drag was dropped and
    /// the push applied.
    DragAborted(ApplyReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Confirmed,
    /// Failure recorded; the board waits for the next push.
    Failed,
    RolledBack,
    Unknown,
}

#[derive(Debug, Default)]
pub struct Reconciler {
    policy: ReconcilePolicy,
    buffered: Option<Vec<Item>>,
    ledger: BTreeMap<RequestId, PendingUpdate>,
    awaiting_push: HashMap<ItemId, Placement>,
    next_request: u64,
}

impl Reconciler {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn next_request_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    /// Records an update that is about to be handed to the gateway.
    pub fn track(&mut self, pending: PendingUpdate) {
        self.awaiting_push
            .insert(pending.item, pending.committed.clone());
        self.ledger.insert(pending.request, pending);
    }

    pub fn pending_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn pending(&self, request: RequestId) -> Option<&PendingUpdate> {
        self.ledger.get(&request)
    }

    pub fn has_buffered(&self) -> bool {
        self.buffered.is_some()
    }

    /// Routes one authoritative push.
    pub fn receive(
        &mut self,
        board: &mut Board,
        drag: &mut DragController,
        items: Vec<Item>,
    ) -> PushDisposition {
        let Some(active) = drag.active_item().filter(|_| drag.is_dragging()) else {
            return PushDisposition::Applied(self.apply(board, items));
        };

        let source_column = drag.source().map(|slot| slot.column.clone());
        let pushed_column = items
            .iter()
            .find(|item| item.id == active)
            .map(|item| item.column_key.clone());
        if pushed_column.is_none() || pushed_column != source_column {
            info!(
                "event=reconcile_push module=reconcile status=ok action=abort_drag item_id={active} pushed_column={}",
                pushed_column.as_ref().map_or("<deleted>", ColumnKey::as_str)
            );
            drag.abort();
            return PushDisposition::DragAborted(self.apply(board, items));
        }

        if self.buffered.replace(items).is_some() {
            debug!("event=reconcile_push module=reconcile status=ok action=replace_buffer");
        } else {
            debug!("event=reconcile_push module=reconcile status=ok action=buffer");
        }
        PushDisposition::Buffered
    }

    /// Applies the buffered push, if any.
    pub fn flush(&mut self, board: &mut Board) -> Option<ApplyReport> {
        let items = self.buffered.take()?;
        Some(self.apply(board, items))
    }

    /// Settles one issued update.
    pub fn settle(
        &mut self,
        board: &mut Board,
        request: RequestId,
        result: Result<(), &GatewayError>,
    ) -> SettleOutcome {
        let Some(pending) = self.ledger.remove(&request) else {
            debug!("event=reconcile_settle module=reconcile status=skip reason=unknown_request request_id={request}");
            return SettleOutcome::Unknown;
        };

        let err = match result {
            Ok(()) => return SettleOutcome::Confirmed,
            Err(err) => err,
        };
        warn!(
            "event=reconcile_settle module=reconcile status=error request_id={request} item_id={} error={err}",
            pending.item
        );

        if !self.policy.rollback_on_failure {
            return SettleOutcome::Failed;
        }
        let superseded = self.ledger.values().any(|other| other.item == pending.item);
        let untouched = board
            .item(pending.item)
            .is_some_and(|item| pending.committed.matches(item));
        if superseded || !untouched {
            return SettleOutcome::Failed;
        }

        board.place(
            pending.item,
            &pending.previous.column,
            pending.previous.position,
        );
        self.awaiting_push.remove(&pending.item);
        info!(
            "event=reconcile_rollback module=reconcile status=ok item_id={} column={} position={}",
            pending.item, pending.previous.column, pending.previous.position
        );
        SettleOutcome::RolledBack
    }

    /// Forgets all buffered and in-flight state (scope teardown).
    pub fn clear(&mut self) {
        self.buffered = None;
        self.ledger.clear();
        self.awaiting_push.clear();
    }

    fn apply(&mut self, board: &mut Board, items: Vec<Item>) -> ApplyReport {
        self.buffered = None;
        let columns = board.columns().to_vec();
        *board = Board::load(&columns, items);

        let mut report = ApplyReport::default();
        if self.policy.hold_pending_moves {
            report.held = self.hold_unsettled(board);
        }

        let awaiting = std::mem::take(&mut self.awaiting_push);
        for (item_id, committed) in awaiting {
            let Some(item) = board.item(item_id) else {
                continue;
            };
            if report.held.contains(&item_id) {
                self.awaiting_push.insert(item_id, committed);
            } else if committed.matches(item) {
                report.confirmed.push(item_id);
            } else {
                info!(
                    "event=reconcile_snap module=reconcile status=ok item_id={item_id} local_column={} server_column={}",
                    committed.column, item.column_key
                );
                report.snapped.push(item_id);
            }
        }
        report
    }

    fn hold_unsettled(&self, board: &mut Board) -> Vec<ItemId> {
        let mut latest: HashMap<ItemId, &Placement> = HashMap::new();
        for pending in self.ledger.values() {
            latest.insert(pending.item, &pending.committed);
        }

        let mut held = Vec::new();
        for (item_id, committed) in latest {
            let differs = board
                .item(item_id)
                .is_some_and(|item| !committed.matches(item));
            if differs && board.place(item_id, &committed.column, committed.position) {
                held.push(item_id);
            }
        }
        held.sort();
        held
    }
}
