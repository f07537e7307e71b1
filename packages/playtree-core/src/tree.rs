use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

use crate::error::{Error, Result};
use crate::node::{Node, Position};
use crate::path::{prefix_of, ItemKind, Path};

/// In-memory view of one playlist: entries keyed by path, iterated in path-string order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderedTree {
    entries: BTreeMap<Path, Node>,
}

impl OrderedTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the node previously stored under `path`.
    pub fn put(&mut self, path: Path, node: Node) -> Option<Node> {
        self.entries.insert(path, node)
    }

    pub fn get(&self, path: &Path) -> Option<&Node> {
        self.entries.get(path)
    }

    pub fn remove(&mut self, path: &Path) -> Option<Node> {
        self.entries.remove(path)
    }

    /// Visit every entry in ascending path order, stopping at the first error.
    pub fn each<E, F>(&self, mut visit: F) -> std::result::Result<(), E>
    where
        F: FnMut(&Path, &Node) -> std::result::Result<(), E>,
    {
        for (path, node) in &self.entries {
            visit(path, node)?;
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Node)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys()
    }

    /// Drop every entry and take `entries` instead.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = (Path, Node)>) {
        self.entries = entries.into_iter().collect();
    }

    pub fn into_entries(self) -> impl Iterator<Item = (Path, Node)> {
        self.entries.into_iter()
    }

    /// Direct children of the collection labelled `parent`, as a range scan over the prefix.
    pub fn children_of<'a>(&'a self, parent: &str) -> impl Iterator<Item = (&'a Path, &'a Node)> + 'a {
        let prefix = prefix_of(parent);
        let start = prefix.clone();
        self.entries
            .range::<str, _>((Bound::Included(start.as_str()), Bound::Unbounded))
            .take_while(move |(path, _)| path.as_str().starts_with(prefix.as_str()))
    }

    pub fn max_child_position(&self, parent: &str) -> Option<Position> {
        self.children_of(parent).map(|(_, node)| node.position).max()
    }

    /// Every path, under any parent, whose item is `item_id`.
    pub fn entries_of(&self, item_id: &str) -> Vec<&Path> {
        self.entries
            .keys()
            .filter(|path| path.item() == item_id)
            .collect()
    }

    /// Labels whose rows may legally live in this tree: the playlist itself and every nested
    /// playlist it references.
    pub fn known_roots(&self, playlist: &str) -> HashSet<String> {
        let mut roots: HashSet<String> = self
            .entries
            .values()
            .filter(|node| node.kind == ItemKind::Playlist)
            .map(|node| node.id.clone())
            .collect();
        roots.insert(playlist.to_string());
        roots
    }

    /// Tracks in listening order: depth-first through nested playlists, siblings ordered by
    /// numeric position with the path as tie-break. A playlist reachable from itself is
    /// expanded once.
    pub fn playback_order(&self, root: &str) -> Vec<&Node> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.walk(root, &mut visited, &mut out);
        out
    }

    fn walk<'a>(&'a self, label: &str, visited: &mut HashSet<String>, out: &mut Vec<&'a Node>) {
        if !visited.insert(label.to_string()) {
            return;
        }
        let mut children: Vec<(&Path, &Node)> = self.children_of(label).collect();
        children.sort_by(|a, b| a.1.position.cmp(&b.1.position).then_with(|| a.0.cmp(b.0)));
        for (_, node) in children {
            match node.kind {
                ItemKind::Track => out.push(node),
                ItemKind::Playlist => self.walk(&node.id, visited, out),
            }
        }
    }

    /// Every node agrees with the key it is stored under.
    pub fn validate_invariants(&self) -> Result<()> {
        self.each(|path, node| {
            if node.matches(path) {
                Ok(())
            } else {
                Err(Error::UnexpectedValueType(format!(
                    "node {}:{}@{} (parent {}) stored under {}",
                    node.kind, node.id, node.position, node.parent_id, path
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::decode;

    fn tree_of(raw: &[&str]) -> OrderedTree {
        let mut tree = OrderedTree::new();
        for r in raw {
            let path = decode(r).unwrap();
            let node = Node::from_path(&path);
            tree.put(path, node);
        }
        tree
    }

    #[test]
    fn put_overwrites_identical_path() {
        let mut tree = tree_of(&["P.track.A.1"]);
        let path = decode("P.track.A.1").unwrap();
        let previous = tree.put(path.clone(), Node::from_path(&path));
        assert!(previous.is_some());
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn each_aborts_on_first_error() {
        let tree = tree_of(&["P.track.A.1", "P.track.B.2", "P.track.C.3"]);
        let mut seen = Vec::new();
        let res: std::result::Result<(), String> = tree.each(|path, _| {
            seen.push(path.item().to_string());
            if path.item() == "B" {
                Err("stop".into())
            } else {
                Ok(())
            }
        });
        assert_eq!(res, Err("stop".to_string()));
        assert_eq!(seen, vec!["A", "B"]);
    }

    #[test]
    fn children_of_does_not_match_label_prefixes() {
        let tree = tree_of(&["P.playlist.Q.1", "Q.track.X.1", "Q2.track.Y.1", "Q.track.Z.4"]);
        let items: Vec<&str> = tree.children_of("Q").map(|(p, _)| p.item()).collect();
        assert_eq!(items, vec!["X", "Z"]);
        assert_eq!(tree.max_child_position("Q"), Some(4));
        assert_eq!(tree.max_child_position("missing"), None);
    }

    #[test]
    fn playback_order_expands_nested_playlists_numerically() {
        let tree = tree_of(&[
            "P.track.A.10",
            "P.playlist.Q.2",
            "P.track.B.1",
            "Q.track.X.1",
            "Q.playlist.P.2",
        ]);
        let ids: Vec<&str> = tree.playback_order("P").into_iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "X", "A"]);
    }

    #[test]
    fn validate_invariants_flags_mismatched_node() {
        let mut tree = tree_of(&["P.track.A.1"]);
        let path = decode("P.track.B.2").unwrap();
        let mut node = Node::from_path(&path);
        node.position = 9;
        tree.put(path, node);
        assert!(matches!(
            tree.validate_invariants(),
            Err(Error::UnexpectedValueType(_))
        ));
    }
}
