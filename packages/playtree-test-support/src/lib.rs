//! Behaviour every `PathStore` backend must share.
//!
//! Each case works on its own playlist id derived from `namespace`, so suites can run against a
//! shared database.

use playtree_core::{
    decode, EngineConfig, Error, ItemKind, NewItem, Path, PathStore, PathTransaction,
    PlaylistService,
};

pub fn run_all<S: PathStore>(store: &mut S, namespace: &str) {
    add_then_rebalance(store, &format!("{namespace}-add"));
    delete_keeps_neighbours(store, &format!("{namespace}-delete"));
    nested_removal(store, &format!("{namespace}-nested"));
    listing_uses_string_order(store, &format!("{namespace}-order"));
    set_order(store, &format!("{namespace}-reorder"));
    failed_transaction_rolls_back(store, &format!("{namespace}-rollback"));
    update_swaps_positions(store, &format!("{namespace}-swap"));
    append_and_contains(store, &format!("{namespace}-append"));
    underscore_is_not_a_wildcard(store, &format!("{namespace}-wild"));
    playlists_are_isolated(store, &format!("{namespace}-iso"));
    root_cycle_keeps_siblings(store, &format!("{namespace}-rootcycle"));
    shared_playlist_survives(store, &format!("{namespace}-shared"));
    overflowing_append_is_refused(store, &format!("{namespace}-overflow"));
}

fn rows<S: PathStore>(store: &mut S, playlist: &str) -> Vec<String> {
    let mut tx = store.begin().unwrap();
    let rows = tx.fetch_ordered(playlist).unwrap();
    tx.commit().unwrap();
    rows
}

fn seed<S: PathStore>(store: &mut S, playlist: &str, raw: &[String]) {
    let paths: Vec<Path> = raw.iter().map(|r| decode(r).unwrap()).collect();
    let mut tx = store.begin().unwrap();
    tx.insert_paths(playlist, &paths).unwrap();
    tx.commit().unwrap();
}

pub fn add_then_rebalance<S: PathStore>(store: &mut S, playlist: &str) {
    let mut service = PlaylistService::new(&mut *store);
    service
        .add_items(
            playlist,
            &[NewItem::track("T1"), NewItem::track("T2")],
            None,
            false,
        )
        .unwrap();
    service
        .add_items(playlist, &[NewItem::track("T3")], None, true)
        .unwrap();
    assert_eq!(
        rows(store, playlist),
        vec![
            format!("{playlist}.track.T1.1"),
            format!("{playlist}.track.T2.2"),
            format!("{playlist}.track.T3.3"),
        ]
    );
}

pub fn delete_keeps_neighbours<S: PathStore>(store: &mut S, playlist: &str) {
    seed(
        store,
        playlist,
        &[
            format!("{playlist}.track.A.1"),
            format!("{playlist}.track.B.2"),
            format!("{playlist}.track.C.3"),
        ],
    );
    let config = EngineConfig {
        rebalance_on_remove: false,
        ..EngineConfig::default()
    };
    let mut service = PlaylistService::with_config(&mut *store, config);
    assert_eq!(service.remove_item(playlist, "B").unwrap(), 1);
    let ids: Vec<String> = service
        .list_items(playlist)
        .unwrap()
        .into_iter()
        .map(|node| node.id)
        .collect();
    assert_eq!(ids, vec!["A", "C"]);
}

pub fn nested_removal<S: PathStore>(store: &mut S, playlist: &str) {
    let mut service = PlaylistService::new(&mut *store);
    service
        .add_items(
            playlist,
            &[NewItem::track("A"), NewItem::playlist("Q"), NewItem::track("C")],
            None,
            false,
        )
        .unwrap();
    service
        .add_items(
            playlist,
            &[NewItem::track("X").under("Q"), NewItem::playlist("R").under("Q")],
            None,
            false,
        )
        .unwrap();
    service
        .add_items(playlist, &[NewItem::track("Y").under("R")], None, false)
        .unwrap();
    // Nesting Q under R is refused, but stored rows may still hold the cycle.
    let err = service
        .add_items(playlist, &[NewItem::playlist("Q").under("R")], None, false)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));
    seed(store, playlist, &["R.playlist.Q.2".to_string()]);

    let mut service = PlaylistService::new(&mut *store);
    assert_eq!(service.remove_item(playlist, "Q").unwrap(), 5);
    assert_eq!(
        rows(store, playlist),
        vec![format!("{playlist}.track.A.1"), format!("{playlist}.track.C.2")]
    );
}

pub fn listing_uses_string_order<S: PathStore>(store: &mut S, playlist: &str) {
    let mut service = PlaylistService::new(&mut *store);
    let items: Vec<NewItem> = (0..10).map(|_| NewItem::track("t")).collect();
    service.add_items(playlist, &items, None, false).unwrap();
    let listed: Vec<u64> = service
        .list_items(playlist)
        .unwrap()
        .into_iter()
        .map(|node| node.position)
        .collect();
    assert_eq!(listed, vec![1, 10, 2, 3, 4, 5, 6, 7, 8, 9]);

    let played: Vec<u64> = service
        .playback_order(playlist)
        .unwrap()
        .into_iter()
        .map(|node| node.position)
        .collect();
    assert_eq!(played, (1..=10).collect::<Vec<_>>());
}

pub fn set_order<S: PathStore>(store: &mut S, playlist: &str) {
    let mut service = PlaylistService::new(&mut *store);
    service
        .add_items(
            playlist,
            &[NewItem::track("A"), NewItem::track("B"), NewItem::track("C")],
            None,
            false,
        )
        .unwrap();
    service.set_order(playlist, &["C", "A"]).unwrap();
    let played: Vec<String> = service
        .playback_order(playlist)
        .unwrap()
        .into_iter()
        .map(|node| node.id)
        .collect();
    assert_eq!(played, vec!["C", "A", "B"]);
    assert!(matches!(
        service.set_order(playlist, &["missing"]),
        Err(Error::UnknownItem(_))
    ));
}

pub fn failed_transaction_rolls_back<S: PathStore>(store: &mut S, playlist: &str) {
    let existing = format!("{playlist}.track.A.1");
    seed(store, playlist, &[existing.clone()]);
    {
        let mut tx = store.begin().unwrap();
        tx.insert_paths(playlist, &[decode(&format!("{playlist}.track.B.2")).unwrap()])
            .unwrap();
        let dup = tx.insert_paths(playlist, &[decode(&existing).unwrap()]);
        assert!(matches!(dup, Err(Error::Storage(_))));
    }
    assert_eq!(rows(store, playlist), vec![existing]);
}

pub fn update_swaps_positions<S: PathStore>(store: &mut S, playlist: &str) {
    let a1 = format!("{playlist}.track.A.1");
    let b2 = format!("{playlist}.track.B.2");
    seed(store, playlist, &[a1.clone(), b2.clone()]);
    let moves = vec![
        (decode(&a1).unwrap(), decode(&format!("{playlist}.track.A.2")).unwrap()),
        (decode(&b2).unwrap(), decode(&format!("{playlist}.track.B.1")).unwrap()),
    ];
    let mut tx = store.begin().unwrap();
    tx.update_paths(playlist, &moves).unwrap();
    tx.commit().unwrap();
    assert_eq!(
        rows(store, playlist),
        vec![format!("{playlist}.track.A.2"), format!("{playlist}.track.B.1")]
    );
}

pub fn append_and_contains<S: PathStore>(store: &mut S, playlist: &str) {
    seed(
        store,
        playlist,
        &[
            format!("{playlist}.track.A.9"),
            format!("{playlist}.playlist.Q.10"),
            "Q.track.X.2".to_string(),
        ],
    );
    let mut tx = store.begin().unwrap();
    assert_eq!(tx.max_child_position(playlist, playlist).unwrap(), Some(10));
    assert_eq!(tx.max_child_position(playlist, "Q").unwrap(), Some(2));
    assert_eq!(tx.max_child_position(playlist, "R").unwrap(), None);
    assert!(tx.contains_item(playlist, ItemKind::Playlist, "Q").unwrap());
    assert!(!tx.contains_item(playlist, ItemKind::Track, "Q").unwrap());
    let path = tx
        .append_under_prefix(playlist, "Q", ItemKind::Track, "Y")
        .unwrap();
    assert_eq!(path.as_str(), "Q.track.Y.3");
    tx.commit().unwrap();

    let mut service = PlaylistService::new(&mut *store);
    let appended = service
        .append_item(playlist, None, ItemKind::Track, "B")
        .unwrap();
    assert_eq!(appended.as_str(), format!("{playlist}.track.B.11"));
}

pub fn underscore_is_not_a_wildcard<S: PathStore>(store: &mut S, playlist: &str) {
    seed(
        store,
        playlist,
        &[
            format!("{playlist}.playlist.Q_.1"),
            format!("{playlist}.playlist.QA.2"),
            "Q_.track.X.1".to_string(),
            "QA.track.Y.1".to_string(),
        ],
    );
    let mut tx = store.begin().unwrap();
    assert_eq!(tx.fetch_ordered_by_subtree(playlist, "Q_.").unwrap(), vec!["Q_.track.X.1"]);
    assert_eq!(tx.delete_subtree(playlist, "Q_").unwrap(), 2);
    tx.commit().unwrap();
    let mut left = rows(store, playlist);
    left.sort();
    let mut expected = vec![format!("{playlist}.playlist.QA.2"), "QA.track.Y.1".to_string()];
    expected.sort();
    assert_eq!(left, expected);
}

pub fn playlists_are_isolated<S: PathStore>(store: &mut S, playlist: &str) {
    let other = format!("{playlist}-other");
    let mut service = PlaylistService::new(&mut *store);
    service
        .add_items(playlist, &[NewItem::track("A")], None, false)
        .unwrap();
    service
        .add_items(&other, &[NewItem::track("A")], None, false)
        .unwrap();
    assert_eq!(service.clear_playlist(playlist).unwrap(), 1);
    assert!(service.list_items(playlist).unwrap().is_empty());
    assert_eq!(service.list_items(&other).unwrap().len(), 1);
}

pub fn root_cycle_keeps_siblings<S: PathStore>(store: &mut S, playlist: &str) {
    seed(
        store,
        playlist,
        &[
            format!("{playlist}.track.A.1"),
            format!("{playlist}.playlist.Q.2"),
            format!("{playlist}.track.C.3"),
            format!("Q.playlist.{playlist}.1"),
        ],
    );
    let mut service = PlaylistService::new(&mut *store);
    assert_eq!(service.remove_item(playlist, "Q").unwrap(), 2);
    assert_eq!(
        rows(store, playlist),
        vec![format!("{playlist}.track.A.1"), format!("{playlist}.track.C.2")]
    );
}

pub fn shared_playlist_survives<S: PathStore>(store: &mut S, playlist: &str) {
    seed(
        store,
        playlist,
        &[
            format!("{playlist}.playlist.Q.1"),
            "Q.track.X.1".to_string(),
            "Q.playlist.R.2".to_string(),
            "R.track.Y.1".to_string(),
            "R.playlist.Q.2".to_string(),
        ],
    );
    let mut tx = store.begin().unwrap();
    assert_eq!(tx.delete_subtree(playlist, "R").unwrap(), 3);
    tx.commit().unwrap();
    let mut left = rows(store, playlist);
    left.sort();
    let mut expected = vec![format!("{playlist}.playlist.Q.1"), "Q.track.X.1".to_string()];
    expected.sort();
    assert_eq!(left, expected);
}

pub fn overflowing_append_is_refused<S: PathStore>(store: &mut S, playlist: &str) {
    let last = format!("{playlist}.track.A.{}", u64::MAX);
    seed(store, playlist, &[last.clone()]);
    let mut service = PlaylistService::new(&mut *store);
    let err = service
        .append_item(playlist, None, ItemKind::Track, "B")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));
    let err = service
        .add_items(playlist, &[NewItem::track("B")], None, false)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));
    assert_eq!(rows(store, playlist), vec![last]);
}
