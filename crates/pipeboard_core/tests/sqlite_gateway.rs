use pipeboard_core::db::open_db_in_memory;
use pipeboard_core::{
    BoardConfig, BoardSession, ColumnKey, DropOutcome, DropTarget, GatewayError, Item,
    ItemPatch, ItemRepository, PersistenceGateway, PointerHalf, RepoError, RequestId, Scope,
    SnapshotEvent, SqliteGateway, UpdateRequest, UpdateStatus,
};

fn key(value: &str) -> ColumnKey {
    ColumnKey::parse(value).unwrap()
}

fn snapshot_titles(event: Option<SnapshotEvent>) -> Vec<String> {
    match event {
        Some(SnapshotEvent::Snapshot(items)) => items.into_iter().map(|item| item.title).collect(),
        other => panic!("expected snapshot, got {other:?}"),
    }
}

#[test]
fn subscribe_delivers_initial_sorted_snapshot() {
    let conn = open_db_in_memory().unwrap();
    let mut gateway = SqliteGateway::try_new(&conn).unwrap();
    let scope = Scope::tenant("acme");
    gateway
        .create_item(&Item::new("Second", key("BACKLOG"), 2.0, scope.clone()))
        .unwrap();
    gateway
        .create_item(&Item::new("First", key("WON"), 1.0, scope.clone()))
        .unwrap();

    let mut stream = gateway.subscribe(&scope).unwrap();

    assert_eq!(snapshot_titles(stream.try_next()), vec!["First", "Second"]);
    assert!(stream.try_next().is_none());
}

#[test]
fn update_publishes_only_to_matching_scopes() {
    let conn = open_db_in_memory().unwrap();
    let mut gateway = SqliteGateway::try_new(&conn).unwrap();
    let east = Scope::team("acme", "east");
    let item = Item::new("Survey", key("BACKLOG"), 1.0, east.clone());
    gateway.create_item(&item).unwrap();

    let mut east_stream = gateway.subscribe(&east).unwrap();
    let mut west_stream = gateway.subscribe(&Scope::team("acme", "west")).unwrap();
    let mut tenant_stream = gateway.subscribe(&Scope::tenant("acme")).unwrap();
    east_stream.try_next();
    west_stream.try_next();
    tenant_stream.try_next();

    let status = gateway
        .update(&UpdateRequest {
            id: RequestId(1),
            item: item.id,
            patch: ItemPatch::placement(key("WON"), 1000.0, east.clone()),
        })
        .unwrap();

    assert_eq!(status, UpdateStatus::Applied);
    assert_eq!(snapshot_titles(east_stream.try_next()), vec!["Survey"]);
    assert_eq!(snapshot_titles(tenant_stream.try_next()), vec!["Survey"]);
    assert!(west_stream.try_next().is_none());

    let stored = gateway.repo().get_item(item.id).unwrap().unwrap();
    assert_eq!(stored.column_key, key("WON"));
}

#[test]
fn failed_update_returns_repo_error_without_publishing() {
    let conn = open_db_in_memory().unwrap();
    let mut gateway = SqliteGateway::try_new(&conn).unwrap();
    let scope = Scope::tenant("acme");
    let mut stream = gateway.subscribe(&scope).unwrap();
    stream.try_next();

    let missing = Item::new("Ghost", key("BACKLOG"), 1.0, scope.clone());
    let err = gateway
        .update(&UpdateRequest {
            id: RequestId(7),
            item: missing.id,
            patch: ItemPatch::position_only(2.0, scope),
        })
        .unwrap_err();

    assert!(matches!(err, GatewayError::Repo(RepoError::NotFound(_))));
    assert!(stream.try_next().is_none());
}

#[test]
fn dropped_streams_are_pruned() {
    let conn = open_db_in_memory().unwrap();
    let mut gateway = SqliteGateway::try_new(&conn).unwrap();
    let scope = Scope::tenant("acme");

    let kept = gateway.subscribe(&scope).unwrap();
    let dropped = gateway.subscribe(&scope).unwrap();
    assert_eq!(gateway.open_subscriptions(), 2);

    drop(dropped);
    assert_eq!(gateway.open_subscriptions(), 1);
    drop(kept);
    assert_eq!(gateway.open_subscriptions(), 0);
}

#[test]
fn delete_refreshes_subscribers() {
    let conn = open_db_in_memory().unwrap();
    let mut gateway = SqliteGateway::try_new(&conn).unwrap();
    let scope = Scope::tenant("acme");
    let item = Item::new("Survey", key("BACKLOG"), 1.0, scope.clone());
    gateway.create_item(&item).unwrap();
    let mut stream = gateway.subscribe(&scope).unwrap();
    stream.try_next();

    gateway.delete_item(item.id).unwrap();

    assert!(snapshot_titles(stream.try_next()).is_empty());
}

#[test]
fn board_session_round_trips_through_sqlite() {
    let conn = open_db_in_memory().unwrap();
    let mut gateway = SqliteGateway::try_new(&conn).unwrap();
    let scope = Scope::tenant("acme");
    let x = Item::new("X", key("BACKLOG"), 1.0, scope.clone());
    let y = Item::new("Y", key("BACKLOG"), 2.0, scope.clone());
    let z = Item::new("Z", key("BACKLOG"), 3.0, scope.clone());
    for item in [&x, &y, &z] {
        gateway.create_item(item).unwrap();
    }

    let mut session = BoardSession::open(gateway, BoardConfig::default(), scope.clone()).unwrap();
    session.on_drag_start(x.id);
    let outcome = session.on_drag_end(
        x.id,
        Some(&DropTarget::Item {
            id: z.id,
            half: PointerHalf::Lower,
        }),
    );
    assert!(matches!(outcome, DropOutcome::Committed { .. }));

    session.on_drag_start(y.id);
    session.on_drag_end(y.id, Some(&DropTarget::Column(key("WON"))));

    let backlog = session
        .board()
        .column(&key("BACKLOG"))
        .iter()
        .map(|item| item.id)
        .collect::<Vec<_>>();
    assert_eq!(backlog, vec![z.id, x.id]);
    assert_eq!(session.board().column_of(y.id), Some(key("WON")));
    assert_eq!(session.pending_updates(), 0);
    assert!(session.last_error().is_none());

    let persisted = session.gateway().repo().list_items(&scope).unwrap();
    let stored_y = persisted.iter().find(|item| item.id == y.id).unwrap();
    assert_eq!(stored_y.column_key, key("WON"));
    assert_eq!(stored_y.position, 1000.0);
    let stored_x = persisted.iter().find(|item| item.id == x.id).unwrap();
    assert_eq!(stored_x.position, 1003.0);
}

#[test]
fn out_of_band_write_reaches_session_after_refresh() {
    let conn = open_db_in_memory().unwrap();
    let gateway = SqliteGateway::try_new(&conn).unwrap();
    let scope = Scope::tenant("acme");
    let mut session = BoardSession::open(gateway, BoardConfig::default(), scope.clone()).unwrap();
    assert!(session.board().is_empty());

    let item = Item::new("Inbound", key("QUALIFYING"), 500.0, scope);
    session.gateway().repo().create_item(&item).unwrap();
    assert!(session.pump().is_none());

    session.gateway_mut().refresh();
    session.pump();
    assert_eq!(session.board().column_of(item.id), Some(key("QUALIFYING")));
}
