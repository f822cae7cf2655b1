//! SQLite-backed persistence gateway.
//!
//! # Responsibility
//! - Serve board subscriptions from the opportunity repository.
//! - Re-publish full snapshots to matching subscribers after each write.
//!
//! # Invariants
//! - Closed streams are pruned before every publish round.
//! - A subscriber only ever receives rows inside its own scope.

use super::{
    snapshot_channel, GatewayError, GatewayResult, PersistenceGateway, SnapshotEvent,
    SnapshotPublisher, SnapshotStream, UpdateRequest, UpdateStatus,
};
use crate::model::item::{Item, ItemId, Scope};
use crate::repo::item_repo::{ItemRepository, SqliteItemRepository};
use log::{debug, error, info};
use rusqlite::Connection;

struct Subscriber {
    scope: Scope,
    publisher: SnapshotPublisher,
}

/// Gateway over one migrated SQLite connection.
pub struct SqliteGateway<'conn> {
    repo: SqliteItemRepository<'conn>,
    subscribers: Vec<Subscriber>,
}

impl<'conn> SqliteGateway<'conn> {
    pub fn try_new(conn: &'conn Connection) -> GatewayResult<Self> {
        Ok(Self {
            repo: SqliteItemRepository::try_new(conn)?,
            subscribers: Vec::new(),
        })
    }

    /// Repository used for out-of-band writes (create/delete forms).
    ///
    /// Call [`SqliteGateway::refresh`] afterwards so subscribers see them.
    pub fn repo(&self) -> &SqliteItemRepository<'conn> {
        &self.repo
    }

    /// Creates an item and notifies subscribers.
    pub fn create_item(&mut self, item: &Item) -> GatewayResult<ItemId> {
        let id = self.repo.create_item(item)?;
        self.publish_matching(&item.scope);
        Ok(id)
    }

    /// Soft-deletes an item and notifies every subscriber.
    pub fn delete_item(&mut self, id: ItemId) -> GatewayResult<()> {
        self.repo.soft_delete_item(id)?;
        self.refresh();
        Ok(())
    }

    /// Re-publishes a snapshot to every open subscriber.
    pub fn refresh(&mut self) {
        self.prune_closed();
        for subscriber in &self.subscribers {
            publish_snapshot(&self.repo, subscriber);
        }
    }

    /// Number of subscriptions that are still open.
    pub fn open_subscriptions(&mut self) -> usize {
        self.prune_closed();
        self.subscribers.len()
    }

    fn publish_matching(&mut self, item_scope: &Scope) {
        self.prune_closed();
        for subscriber in self
            .subscribers
            .iter()
            .filter(|subscriber| subscriber.scope.matches(item_scope))
        {
            publish_snapshot(&self.repo, subscriber);
        }
    }

    fn prune_closed(&mut self) {
        let before = self.subscribers.len();
        self.subscribers
            .retain(|subscriber| !subscriber.publisher.is_closed());
        let pruned = before - self.subscribers.len();
        if pruned > 0 {
            debug!("event=gateway_prune module=gateway status=ok pruned={pruned}");
        }
    }
}

impl PersistenceGateway for SqliteGateway<'_> {
    fn subscribe(&mut self, scope: &Scope) -> GatewayResult<SnapshotStream> {
        self.prune_closed();
        let items = self.repo.list_items(scope)?;
        let (publisher, stream) = snapshot_channel();
        info!(
            "event=gateway_subscribe module=gateway status=ok scope={scope} items={}",
            items.len()
        );
        publisher.publish(SnapshotEvent::Snapshot(items));
        self.subscribers.push(Subscriber {
            scope: scope.clone(),
            publisher,
        });
        Ok(stream)
    }

    fn update(&mut self, request: &UpdateRequest) -> GatewayResult<UpdateStatus> {
        if let Err(err) = self.repo.update_placement(request.item, &request.patch) {
            error!(
                "event=gateway_update module=gateway status=error request_id={} item_id={} error={err}",
                request.id, request.item
            );
            return Err(GatewayError::Repo(err));
        }
        debug!(
            "event=gateway_update module=gateway status=ok request_id={} item_id={}",
            request.id, request.item
        );
        self.publish_matching(&request.patch.scope);
        Ok(UpdateStatus::Applied)
    }
}

fn publish_snapshot(repo: &SqliteItemRepository<'_>, subscriber: &Subscriber) {
    let event = match repo.list_items(&subscriber.scope) {
        Ok(items) => SnapshotEvent::Snapshot(items),
        Err(err) => {
            error!(
                "event=gateway_publish module=gateway status=error scope={} error={err}",
                subscriber.scope
            );
            SnapshotEvent::failed(GatewayError::Repo(err))
        }
    };
    subscriber.publisher.publish(event);
}
