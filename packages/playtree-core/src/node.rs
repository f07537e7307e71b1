#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::path::{ItemKind, Path};

/// Sibling position inside a parent collection.
pub type Position = u64;

/// One entry of a playlist: a track or a nested playlist.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub id: String,
    pub parent_id: String,
    pub kind: ItemKind,
    pub position: Position,
}

impl Node {
    pub fn from_path(path: &Path) -> Self {
        Self {
            id: path.item().to_string(),
            parent_id: path.root().to_string(),
            kind: path.kind(),
            position: path.position(),
        }
    }

    /// Whether the node carries the same identity and position as `path`.
    pub fn matches(&self, path: &Path) -> bool {
        self.id == path.item()
            && self.parent_id == path.root()
            && self.kind == path.kind()
            && self.position == path.position()
    }
}

/// Item requested for insertion into a playlist.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewItem {
    pub kind: ItemKind,
    pub id: String,
    /// Root label of the nested playlist to append into. `None` appends to the playlist root.
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<String>,
}

impl NewItem {
    pub fn track(id: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Track,
            id: id.into(),
            parent: None,
        }
    }

    pub fn playlist(id: impl Into<String>) -> Self {
        Self {
            kind: ItemKind::Playlist,
            id: id.into(),
            parent: None,
        }
    }

    pub fn under(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}
