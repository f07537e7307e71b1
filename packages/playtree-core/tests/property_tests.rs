use proptest::prelude::*;
use playtree_core::{
    allocator, build, decode, encode, rebalance, ItemKind, NewItem, OrderedTree,
};

fn label() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,12}"
}

fn kind() -> impl Strategy<Value = ItemKind> {
    prop_oneof![Just(ItemKind::Track), Just(ItemKind::Playlist)]
}

proptest! {
    #[test]
    fn decode_inverts_encode(root in label(), kind in kind(), item in label(), position in any::<u64>()) {
        let path = encode(&root, kind, &item, position).unwrap();
        let back = decode(path.as_str()).unwrap();
        prop_assert_eq!(back.root(), root.as_str());
        prop_assert_eq!(back.kind(), kind);
        prop_assert_eq!(back.item(), item.as_str());
        prop_assert_eq!(back.position(), position);
    }

    #[test]
    fn appends_strictly_increase_from_existing_max(
        existing in prop::collection::btree_set(0u64..1_000, 0..20),
        added in 1usize..20,
    ) {
        let rows: Vec<String> = existing
            .iter()
            .enumerate()
            .map(|(i, pos)| format!("P.track.e{i}.{pos}"))
            .collect();
        let mut tree = build(&rows).unwrap();
        let max = existing.iter().max().copied().unwrap_or(0);
        let items: Vec<NewItem> = (0..added).map(|i| NewItem::track(format!("n{i}"))).collect();
        let created = allocator::add(&mut tree, "P", &items, None).unwrap();
        let positions: Vec<u64> = created.iter().map(|p| p.position()).collect();
        let expected: Vec<u64> = (1..=added as u64).map(|i| max + i).collect();
        prop_assert_eq!(positions, expected);
    }

    #[test]
    fn rebalance_yields_dense_positions_in_prior_order(
        positions in prop::collection::vec(0u64..50, 1..40),
    ) {
        let rows: Vec<String> = positions
            .iter()
            .enumerate()
            .map(|(i, pos)| format!("P.track.i{i:03}.{pos}"))
            .collect();
        let mut tree = build(&rows).unwrap();

        let mut before: Vec<(u64, String)> = tree
            .iter()
            .map(|(path, node)| (node.position, path.to_string()))
            .collect();
        before.sort();
        let order_before: Vec<String> = before
            .into_iter()
            .map(|(_, raw)| decode(&raw).unwrap().item().to_string())
            .collect();

        rebalance(&mut tree);
        tree.validate_invariants().unwrap();

        let mut after: Vec<(u64, String)> = tree
            .iter()
            .map(|(path, node)| (node.position, path.item().to_string()))
            .collect();
        after.sort();
        let dense: Vec<u64> = after.iter().map(|(pos, _)| *pos).collect();
        prop_assert_eq!(dense, (1..=positions.len() as u64).collect::<Vec<_>>());
        let order_after: Vec<String> = after.into_iter().map(|(_, item)| item).collect();
        prop_assert_eq!(order_after, order_before);
    }

    #[test]
    fn rebalance_is_idempotent(positions in prop::collection::vec(0u64..50, 0..30)) {
        let rows: Vec<String> = positions
            .iter()
            .enumerate()
            .map(|(i, pos)| format!("P.track.i{i}.{pos}"))
            .collect();
        let mut tree: OrderedTree = build(&rows).unwrap();
        rebalance(&mut tree);
        let once = tree.clone();
        prop_assert!(rebalance(&mut tree).is_empty());
        prop_assert_eq!(tree, once);
    }
}
