use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::node::{NewItem, Node, Position};
use crate::path::{encode, ItemKind, Path};
use crate::tree::OrderedTree;

/// Position the next appended child of `parent` should take.
pub fn next_position(tree: &OrderedTree, parent: &str) -> Result<Position> {
    position_after(tree.max_child_position(parent), parent)
}

/// One past `max`, or 1 for an empty sibling group.
pub fn position_after(max: Option<Position>, parent: &str) -> Result<Position> {
    match max {
        None => Ok(1),
        Some(max) => max.checked_add(1).ok_or_else(|| {
            Error::InvalidOperation(format!("no position left after {max} under {parent}"))
        }),
    }
}

/// Labels whose contents eventually include `parent`: `parent` itself, every playlist holding
/// it, and so on up to `playlist`.
pub fn ancestors_of(tree: &OrderedTree, playlist: &str, parent: &str) -> HashSet<String> {
    let mut seen = HashSet::from([playlist.to_string()]);
    let mut pending = vec![parent.to_string()];
    while let Some(label) = pending.pop() {
        if !seen.insert(label.clone()) {
            continue;
        }
        pending.extend(
            tree.entries_of(&label)
                .into_iter()
                .filter(|path| path.kind() == ItemKind::Playlist)
                .map(|path| path.root().to_string()),
        );
    }
    seen
}

/// Refuse to nest a playlist inside itself, directly or through its descendants.
pub fn check_acyclic(
    tree: &OrderedTree,
    playlist: &str,
    parent: &str,
    kind: ItemKind,
    item_id: &str,
) -> Result<()> {
    if kind == ItemKind::Playlist && ancestors_of(tree, playlist, parent).contains(item_id) {
        return Err(Error::InvalidOperation(format!(
            "playlist {item_id} cannot be nested inside {parent} of {playlist}"
        )));
    }
    Ok(())
}

/// Put `items` into the tree of `playlist` and return the paths created, in input order.
///
/// Each item is appended after the current maximum position of its parent, one after another,
/// so a batch receives strictly increasing positions. A lone item with `explicit` takes that
/// position verbatim instead, overwriting an identical path if one exists. Item ids are not
/// checked for existence; a parent other than `playlist` must be a nested playlist already in
/// the tree, and a nested playlist may not contain one of its ancestors.
pub fn add(
    tree: &mut OrderedTree,
    playlist: &str,
    items: &[NewItem],
    explicit: Option<Position>,
) -> Result<Vec<Path>> {
    let explicit = if items.len() == 1 { explicit } else { None };
    let mut created = Vec::with_capacity(items.len());
    for item in items {
        let parent = item.parent.as_deref().unwrap_or(playlist);
        if parent != playlist && !contains_playlist(tree, parent) {
            return Err(Error::UnknownItem(format!(
                "parent playlist {parent} is not part of {playlist}"
            )));
        }
        check_acyclic(tree, playlist, parent, item.kind, &item.id)?;
        let position = match explicit {
            Some(position) => position,
            None => next_position(tree, parent)?,
        };
        let path = encode(parent, item.kind, &item.id, position)?;
        tracing::debug!(%path, "allocated playlist entry");
        tree.put(path.clone(), Node::from_path(&path));
        created.push(path);
    }
    Ok(created)
}

fn contains_playlist(tree: &OrderedTree, label: &str) -> bool {
    tree.entries_of(label)
        .iter()
        .any(|path| path.kind() == ItemKind::Playlist)
}
