use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::node::Node;
use crate::path::Path;
use crate::tree::OrderedTree;

/// Paths re-keyed by a rebalance or reorder: `new path -> previous path`. Entries that kept
/// their path are absent.
pub type Relocations = BTreeMap<Path, Path>;

/// Renumber every sibling group of `tree` to `1..=n`, keeping relative order.
///
/// Siblings are grouped by parent label and stable-sorted by position; equal positions keep
/// their path order. The tree contents are replaced wholesale with the rebuilt entries.
pub fn rebalance(tree: &mut OrderedTree) -> Relocations {
    let mut groups: BTreeMap<String, Vec<(Path, Node)>> = BTreeMap::new();
    for (path, node) in std::mem::take(tree).into_entries() {
        groups
            .entry(path.root().to_string())
            .or_default()
            .push((path, node));
    }

    let mut rebuilt = Vec::new();
    let mut relocations = Relocations::new();
    for (_, mut siblings) in groups {
        siblings.sort_by_key(|(_, node)| node.position);
        renumber(siblings, &mut rebuilt, &mut relocations);
    }
    tracing::debug!(
        entries = rebuilt.len(),
        moved = relocations.len(),
        "rebalanced playlist tree"
    );
    tree.replace_all(rebuilt);
    relocations
}

/// Give the children of `parent` the positions `1..=n` in the order of `ordered`.
///
/// `ordered` must list every current child of `parent` exactly once.
pub fn reorder(tree: &mut OrderedTree, parent: &str, ordered: &[Path]) -> Result<Relocations> {
    let expected = tree.children_of(parent).count();
    if ordered.len() != expected {
        return Err(Error::InvalidOperation(format!(
            "reorder of {parent} lists {} entries, expected {expected}",
            ordered.len()
        )));
    }

    let mut siblings = Vec::with_capacity(ordered.len());
    for path in ordered {
        if !path.is_under(parent) {
            return Err(Error::UnexpectedKeyType(format!("{path} is not a child of {parent}")));
        }
        match tree.remove(path) {
            Some(node) => siblings.push((path.clone(), node)),
            None => return Err(Error::UnknownItem(path.to_string())),
        }
    }

    let mut rebuilt = Vec::with_capacity(siblings.len());
    let mut relocations = Relocations::new();
    renumber(siblings, &mut rebuilt, &mut relocations);
    for (path, node) in rebuilt {
        tree.put(path, node);
    }
    Ok(relocations)
}

fn renumber(siblings: Vec<(Path, Node)>, out: &mut Vec<(Path, Node)>, relocations: &mut Relocations) {
    for (index, (path, mut node)) in siblings.into_iter().enumerate() {
        let position = index as u64 + 1;
        node.position = position;
        let moved = path.with_position(position);
        if moved != path {
            relocations.insert(moved.clone(), path);
        }
        out.push((moved, node));
    }
}
