//! Latest-only snapshot stream between a gateway and one board session.
//!
//! Built on a `tokio::sync::watch` channel, polled without a runtime. The
//! channel holds one value, so publishing over an unread event replaces it.
//! Every snapshot is a full replacement of the previous one.

use super::GatewayError;
use crate::model::item::Item;
use log::trace;
use std::sync::Arc;
use tokio::sync::watch;

/// One delivery on a subscription.
#[derive(Debug, Clone)]
pub enum SnapshotEvent {
    /// Full, position-sorted item set for the subscribed scope.
    Snapshot(Vec<Item>),
    /// The backend could not produce a snapshot.
    Failed(Arc<GatewayError>),
}

impl SnapshotEvent {
    pub fn failed(error: GatewayError) -> Self {
        Self::Failed(Arc::new(error))
    }
}

/// Gateway-side handle.
#[derive(Debug)]
pub struct SnapshotPublisher {
    sender: watch::Sender<Option<SnapshotEvent>>,
}

/// Session-side handle. Dropping it closes the subscription.
#[derive(Debug)]
pub struct SnapshotStream {
    receiver: Option<watch::Receiver<Option<SnapshotEvent>>>,
}

/// Creates a connected publisher/stream pair.
pub fn snapshot_channel() -> (SnapshotPublisher, SnapshotStream) {
    let (sender, receiver) = watch::channel(None);
    (
        SnapshotPublisher { sender },
        SnapshotStream {
            receiver: Some(receiver),
        },
    )
}

impl SnapshotPublisher {
    /// Stores `event` as the latest delivery.
    ///
    /// Returns `false` when the stream side is closed; the event is dropped.
    pub fn publish(&self, event: SnapshotEvent) -> bool {
        if self.sender.is_closed() {
            return false;
        }
        let replaced = self.sender.send_replace(Some(event));
        trace!(
            "event=snapshot_publish module=gateway status=ok had_previous={}",
            replaced.is_some()
        );
        true
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl SnapshotStream {
    /// Takes the latest unread event, if any.
    pub fn try_next(&mut self) -> Option<SnapshotEvent> {
        let receiver = self.receiver.as_mut()?;
        let latest = receiver.borrow_and_update();
        if !latest.has_changed() {
            return None;
        }
        (*latest).clone()
    }

    /// Stops deliveries and discards anything unread.
    pub fn close(&mut self) {
        self.receiver = None;
    }

    pub fn is_closed(&self) -> bool {
        self.receiver.is_none()
    }
}
