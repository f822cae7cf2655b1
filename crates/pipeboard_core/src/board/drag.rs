//! Drag gesture state machine.
//!
//! # Responsibility
//! - Translate start/over/end events into a source and destination slot.
//! - Hand exactly one commit per successful drop to the caller.
//!
//! # Invariants
//! - At most one drag is active at a time.
//! - Destination indexes count the destination column with the dragged item
//!   left out.
//! - The controller never mutates the board; its tentative target is a
//!   preview overlay only.

use super::{Board, Slot};
use crate::model::item::{ColumnKey, ItemId};
use log::debug;

/// Which half of the hovered card the pointer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerHalf {
    /// Above the vertical midpoint: insert before the hovered card.
    Upper,
    /// On or below the midpoint: insert after the hovered card.
    Lower,
}

impl PointerHalf {
    /// Classifies a pointer against a card spanning `top..top + height`.
    pub fn from_pointer(pointer_y: f64, top: f64, height: f64) -> Self {
        if pointer_y < top + height / 2.0 {
            Self::Upper
        } else {
            Self::Lower
        }
    }
}

/// What the pointer is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty area of a column: append.
    Column(ColumnKey),
    /// Another card.
    Item { id: ItemId, half: PointerHalf },
}

/// One in-progress (or just dropped) drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub item: ItemId,
    pub source: Slot,
    pub target: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
    /// Drop accepted; the caller is issuing the commit.
    Dropped(DragSession),
}

/// A drop that changes the item's placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragCommit {
    pub item: ItemId,
    pub from: Slot,
    pub to: Slot,
}

impl DragCommit {
    pub fn changes_column(&self) -> bool {
        self.from.column != self.to.column
    }
}

/// Outcome of `DragController::drop`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropDecision {
    Commit(DragCommit),
    /// Dropped where it started.
    Unchanged,
    /// Released outside any target.
    Cancelled,
    /// No matching drag, or the item vanished from the board.
    Aborted,
}

#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn active_item(&self) -> Option<ItemId> {
        match &self.state {
            DragState::Dragging(session) | DragState::Dropped(session) => Some(session.item),
            DragState::Idle => None,
        }
    }

    pub fn source(&self) -> Option<&Slot> {
        match &self.state {
            DragState::Dragging(session) => Some(&session.source),
            _ => None,
        }
    }

    /// Dragged item and its tentative slot, for `Board::preview_column`.
    pub fn preview(&self) -> Option<(ItemId, &Slot)> {
        match &self.state {
            DragState::Dragging(session) => Some((session.item, &session.target)),
            _ => None,
        }
    }

    /// Starts dragging `item`. Returns `false` when it is not on the board.
    ///
    /// A drag that is still active is discarded first.
    pub fn start(&mut self, board: &Board, item: ItemId) -> bool {
        if let Some(previous) = self.active_item() {
            debug!(
                "event=drag_start module=drag status=skip reason=replaced previous_item_id={previous}"
            );
        }
        self.state = DragState::Idle;

        let Some(source) = board.locate(item) else {
            debug!("event=drag_start module=drag status=skip reason=missing_item item_id={item}");
            return false;
        };
        debug!(
            "event=drag_start module=drag status=ok item_id={item} column={} index={}",
            source.column, source.index
        );
        self.state = DragState::Dragging(DragSession {
            item,
            target: source.clone(),
            source,
        });
        true
    }

    /// Recomputes the tentative target. Returns it when the drag is live.
    pub fn over(&mut self, board: &Board, active: ItemId, target: &DropTarget) -> Option<&Slot> {
        if self.active_drag(active).is_none() {
            return None;
        }
        if !board.contains(active) {
            self.abort();
            return None;
        }
        let resolved = resolve_target(board, active, target);
        let DragState::Dragging(session) = &mut self.state else {
            return None;
        };
        if let Some(slot) = resolved {
            session.target = slot;
        }
        Some(&session.target)
    }

    /// Finalizes the drag.
    ///
    /// On `Commit` the controller moves to `Dropped`; the caller issues the
    /// write and then calls `finish`. Every other outcome returns to `Idle`.
    pub fn drop(&mut self, board: &Board, active: ItemId, target: Option<&DropTarget>) -> DropDecision {
        let Some(mut session) = self.active_drag(active).cloned() else {
            debug!("event=drag_drop module=drag status=skip reason=no_active_drag item_id={active}");
            return DropDecision::Aborted;
        };
        self.state = DragState::Idle;

        let Some(from) = board.locate(active) else {
            debug!("event=drag_drop module=drag status=skip reason=missing_item item_id={active}");
            return DropDecision::Aborted;
        };
        let Some(target) = target else {
            return DropDecision::Cancelled;
        };
        if let Some(slot) = resolve_target(board, active, target) {
            session.target = slot;
        }
        session.source = from.clone();

        if session.target == from {
            return DropDecision::Unchanged;
        }

        let commit = DragCommit {
            item: active,
            from,
            to: session.target.clone(),
        };
        self.state = DragState::Dropped(session);
        DropDecision::Commit(commit)
    }

    /// Leaves `Dropped` once the commit has been issued.
    pub fn finish(&mut self) {
        if matches!(self.state, DragState::Dropped(_)) {
            self.state = DragState::Idle;
        }
    }

    /// Discards any drag and its preview. Returns the item that was dragged.
    pub fn abort(&mut self) -> Option<ItemId> {
        let item = self.active_item();
        if let Some(item) = item {
            debug!("event=drag_abort module=drag status=ok item_id={item}");
        }
        self.state = DragState::Idle;
        item
    }

    fn active_drag(&self, active: ItemId) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) if session.item == active => Some(session),
            _ => None,
        }
    }
}

fn resolve_target(board: &Board, active: ItemId, target: &DropTarget) -> Option<Slot> {
    match target {
        DropTarget::Column(key) => {
            if !board.has_column(key) {
                return None;
            }
            let len = board.siblings_excluding(key, active).len();
            Some(Slot::new(key.clone(), len))
        }
        DropTarget::Item { id, half } => {
            if *id == active {
                return None;
            }
            let column = board.column_of(*id)?;
            let at = board
                .siblings_excluding(&column, active)
                .iter()
                .position(|item| item.id == *id)?;
            let index = match half {
                PointerHalf::Upper => at,
                PointerHalf::Lower => at + 1,
            };
            Some(Slot::new(column, index))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::test_support::{columns, item, key};
    use crate::model::item::Item;

    fn board_with(items: &[Item]) -> Board {
        Board::load(&columns(&["BACKLOG", "WON"]), items.to_vec())
    }

    #[test]
    fn pointer_half_splits_at_midpoint() {
        assert_eq!(PointerHalf::from_pointer(10.0, 0.0, 40.0), PointerHalf::Upper);
        assert_eq!(PointerHalf::from_pointer(20.0, 0.0, 40.0), PointerHalf::Lower);
        assert_eq!(PointerHalf::from_pointer(39.0, 0.0, 40.0), PointerHalf::Lower);
    }

    #[test]
    fn start_captures_source_slot() {
        let x = item("X", "BACKLOG", 1.0);
        let y = item("Y", "BACKLOG", 2.0);
        let board = board_with(&[x.clone(), y.clone()]);
        let mut drag = DragController::new();

        assert!(drag.start(&board, y.id));
        assert_eq!(drag.source(), Some(&Slot::new(key("BACKLOG"), 1)));
        assert!(drag.is_dragging());
    }

    #[test]
    fn start_on_missing_item_stays_idle() {
        let board = board_with(&[]);
        let mut drag = DragController::new();
        assert!(!drag.start(&board, ItemId::new()));
        assert_eq!(drag.state(), &DragState::Idle);
    }

    #[test]
    fn over_item_uses_pointer_half() {
        let x = item("X", "BACKLOG", 1.0);
        let y = item("Y", "BACKLOG", 2.0);
        let z = item("Z", "BACKLOG", 3.0);
        let board = board_with(&[x.clone(), y.clone(), z.clone()]);
        let mut drag = DragController::new();
        drag.start(&board, x.id);

        let upper = DropTarget::Item {
            id: z.id,
            half: PointerHalf::Upper,
        };
        assert_eq!(
            drag.over(&board, x.id, &upper),
            Some(&Slot::new(key("BACKLOG"), 1))
        );

        let lower = DropTarget::Item {
            id: z.id,
            half: PointerHalf::Lower,
        };
        assert_eq!(
            drag.over(&board, x.id, &lower),
            Some(&Slot::new(key("BACKLOG"), 2))
        );
    }

    #[test]
    fn over_column_targets_end_and_ignores_unknown_columns() {
        let x = item("X", "BACKLOG", 1.0);
        let w = item("W", "WON", 1.0);
        let board = board_with(&[x.clone(), w]);
        let mut drag = DragController::new();
        drag.start(&board, x.id);

        let won = DropTarget::Column(key("WON"));
        assert_eq!(drag.over(&board, x.id, &won), Some(&Slot::new(key("WON"), 1)));

        let lost = DropTarget::Column(key("LOST"));
        assert_eq!(drag.over(&board, x.id, &lost), Some(&Slot::new(key("WON"), 1)));
    }

    #[test]
    fn over_for_other_item_is_ignored() {
        let x = item("X", "BACKLOG", 1.0);
        let y = item("Y", "BACKLOG", 2.0);
        let board = board_with(&[x.clone(), y.clone()]);
        let mut drag = DragController::new();
        drag.start(&board, x.id);

        assert!(drag
            .over(&board, y.id, &DropTarget::Column(key("WON")))
            .is_none());
        assert_eq!(drag.preview().map(|(_, slot)| slot.clone()), Some(Slot::new(key("BACKLOG"), 0)));
    }

    #[test]
    fn drop_in_place_is_unchanged() {
        let x = item("X", "BACKLOG", 1.0);
        let y = item("Y", "BACKLOG", 2.0);
        let board = board_with(&[x.clone(), y.clone()]);
        let mut drag = DragController::new();
        drag.start(&board, y.id);

        let onto_self_column = DropTarget::Item {
            id: x.id,
            half: PointerHalf::Lower,
        };
        assert_eq!(
            drag.drop(&board, y.id, Some(&onto_self_column)),
            DropDecision::Unchanged
        );
        assert_eq!(drag.state(), &DragState::Idle);
    }

    #[test]
    fn drop_commits_and_waits_for_finish() {
        let x = item("X", "BACKLOG", 1.0);
        let board = board_with(&[x.clone()]);
        let mut drag = DragController::new();
        drag.start(&board, x.id);

        let decision = drag.drop(&board, x.id, Some(&DropTarget::Column(key("WON"))));
        let DropDecision::Commit(commit) = decision else {
            panic!("expected commit");
        };
        assert_eq!(
            commit,
            DragCommit {
                item: x.id,
                from: Slot::new(key("BACKLOG"), 0),
                to: Slot::new(key("WON"), 0),
            }
        );
        assert!(commit.changes_column());
        assert!(matches!(drag.state(), DragState::Dropped(_)));

        drag.finish();
        assert_eq!(drag.state(), &DragState::Idle);
    }

    #[test]
    fn drop_without_target_cancels() {
        let x = item("X", "BACKLOG", 1.0);
        let board = board_with(&[x.clone()]);
        let mut drag = DragController::new();
        drag.start(&board, x.id);

        assert_eq!(drag.drop(&board, x.id, None), DropDecision::Cancelled);
        assert_eq!(drag.state(), &DragState::Idle);
    }

    #[test]
    fn drop_of_vanished_item_aborts() {
        let x = item("X", "BACKLOG", 1.0);
        let board = board_with(&[x.clone()]);
        let mut drag = DragController::new();
        drag.start(&board, x.id);

        let emptied = board_with(&[]);
        assert_eq!(
            drag.drop(&emptied, x.id, Some(&DropTarget::Column(key("WON")))),
            DropDecision::Aborted
        );
        assert_eq!(drag.state(), &DragState::Idle);
    }
}
