use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

use postgres::{Client, NoTls};
use uuid::Uuid;

use playtree_core::{decode, NewItem, Path, PathStore, PathTransaction, PlaylistService};
use playtree_postgres::{ensure_schema, reset_playlist_for_tests, PostgresPathStore};

fn connect() -> Option<Rc<RefCell<Client>>> {
    let url = std::env::var("PLAYTREE_POSTGRES_URL").ok()?;
    let client = Client::connect(&url, NoTls).ok()?;
    Some(Rc::new(RefCell::new(client)))
}

fn ensure_schema_once(client: &Rc<RefCell<Client>>) {
    static ONCE: OnceLock<()> = OnceLock::new();
    ONCE.get_or_init(|| {
        let mut c = client.borrow_mut();
        ensure_schema(&mut c).unwrap();
    });
}

fn fresh_playlist(client: &Rc<RefCell<Client>>) -> String {
    let playlist = format!("test-{}", Uuid::new_v4());
    let mut c = client.borrow_mut();
    reset_playlist_for_tests(&mut c, &playlist).unwrap();
    playlist
}

#[test]
fn postgres_store_conformance() {
    let Some(client) = connect() else {
        return;
    };
    ensure_schema_once(&client);

    let mut store = PostgresPathStore::new(client);
    playtree_test_support::run_all(&mut store, &format!("pg-{}", Uuid::new_v4()));
}

#[test]
fn postgres_malformed_row_aborts_add() {
    let Some(client) = connect() else {
        return;
    };
    ensure_schema_once(&client);
    let playlist = fresh_playlist(&client);

    let mut service = PlaylistService::new(PostgresPathStore::new(client.clone()));
    service
        .add_items(&playlist, &[NewItem::track("A"), NewItem::track("B")], Some(5), false)
        .unwrap();
    {
        let mut c = client.borrow_mut();
        c.execute(
            "INSERT INTO playtree_paths (playlist_id, path) VALUES ($1, $2)",
            &[&playlist, &format!("{playlist}.track.C")],
        )
        .unwrap();
    }

    let err = service
        .add_items(&playlist, &[NewItem::track("D")], None, true)
        .unwrap_err();
    assert_eq!(err.status_code(), 500);

    let mut store = service.into_store();
    let mut tx = store.begin().unwrap();
    let rows = tx.fetch_ordered(&playlist).unwrap();
    assert_eq!(
        rows,
        vec![
            format!("{playlist}.track.A.1"),
            format!("{playlist}.track.B.2"),
            format!("{playlist}.track.C"),
        ]
    );
}

#[test]
fn postgres_deep_nesting_removes_whole_chain() {
    let Some(client) = connect() else {
        return;
    };
    ensure_schema_once(&client);
    let playlist = fresh_playlist(&client);

    let mut service = PlaylistService::new(PostgresPathStore::new(client));
    service
        .add_items(&playlist, &[NewItem::playlist("L0")], None, false)
        .unwrap();
    for depth in 1..20 {
        let parent = format!("L{}", depth - 1);
        service
            .add_items(
                &playlist,
                &[
                    NewItem::playlist(format!("L{depth}")).under(parent.clone()),
                    NewItem::track(format!("t{depth}")).under(parent),
                ],
                None,
                false,
            )
            .unwrap();
    }
    assert_eq!(service.remove_item(&playlist, "L0").unwrap(), 39);
    assert!(service.list_items(&playlist).unwrap().is_empty());
}

#[test]
fn postgres_cycle_through_root_keeps_siblings() {
    let Some(client) = connect() else {
        return;
    };
    ensure_schema_once(&client);
    let playlist = fresh_playlist(&client);

    let mut store = PostgresPathStore::new(client);
    {
        let rows: Vec<Path> = [
            format!("{playlist}.track.A.1"),
            format!("{playlist}.playlist.Q.2"),
            format!("{playlist}.track.C.3"),
            format!("Q.playlist.{playlist}.1"),
        ]
        .iter()
        .map(|raw| decode(raw).unwrap())
        .collect();
        let mut tx = store.begin().unwrap();
        tx.insert_paths(&playlist, &rows).unwrap();
        tx.commit().unwrap();
    }

    let mut service = PlaylistService::new(store);
    assert_eq!(service.remove_item(&playlist, "Q").unwrap(), 2);
    let ids: Vec<String> = service
        .playback_order(&playlist)
        .unwrap()
        .into_iter()
        .map(|node| format!("{}@{}", node.id, node.position))
        .collect();
    assert_eq!(ids, vec!["A@1", "C@2"]);
}
