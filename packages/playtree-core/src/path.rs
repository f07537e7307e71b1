use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const SEPARATOR: char = '.';
const COMPONENTS: usize = 4;

/// What a playlist entry points at.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ItemKind {
    Track,
    Playlist,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Track => "track",
            ItemKind::Playlist => "playlist",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "track" => Ok(ItemKind::Track),
            "playlist" => Ok(ItemKind::Playlist),
            other => Err(Error::InvalidPathFormat(format!("unknown item type: {other}"))),
        }
    }
}

/// Validated materialized path `<root>.<type>.<item>.<position>`.
///
/// Ordering, equality and hashing follow the encoded string, so a `BTreeMap<Path, _>` iterates
/// in the same order as `ORDER BY path` over the persisted rows. Positions are therefore not
/// compared numerically: `"P.track.T.10"` sorts before `"P.track.T.2"`.
#[derive(Clone, Debug)]
pub struct Path {
    encoded: String,
    root: String,
    kind: ItemKind,
    item: String,
    position: u64,
}

/// Checks a root or item label: non-empty, ltree-compatible characters only.
pub fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() {
        return Err(Error::InvalidPathFormat("empty label".into()));
    }
    if let Some(bad) = label
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(Error::InvalidPathFormat(format!(
            "label {label:?} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

fn parse_position(raw: &str, path: &str) -> Result<u64> {
    let canonical = !raw.is_empty()
        && raw.bytes().all(|b| b.is_ascii_digit())
        && (raw == "0" || !raw.starts_with('0'));
    if !canonical {
        return Err(Error::InvalidPathFormat(format!(
            "invalid position {raw:?} in {path}"
        )));
    }
    raw.parse::<u64>()
        .map_err(|_| Error::InvalidPathFormat(format!("position overflow in {path}")))
}

/// Build a path from its components.
pub fn encode(root: &str, kind: ItemKind, item: &str, position: u64) -> Result<Path> {
    Path::new(root, kind, item, position)
}

/// Parse a persisted path string.
pub fn decode(raw: &str) -> Result<Path> {
    let components: Vec<&str> = raw.split(SEPARATOR).collect();
    if components.len() != COMPONENTS {
        return Err(Error::InvalidPathFormat(raw.to_string()));
    }
    let root = components[0];
    let item = components[2];
    validate_label(root)?;
    validate_label(item)?;
    let kind: ItemKind = components[1].parse()?;
    let position = parse_position(components[3], raw)?;
    Ok(Path {
        encoded: raw.to_string(),
        root: root.to_string(),
        kind,
        item: item.to_string(),
        position,
    })
}

impl Path {
    pub fn new(root: &str, kind: ItemKind, item: &str, position: u64) -> Result<Self> {
        validate_label(root)?;
        validate_label(item)?;
        Ok(Self {
            encoded: format!("{root}.{kind}.{item}.{position}"),
            root: root.to_string(),
            kind,
            item: item.to_string(),
            position,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Same entry, different position. Labels are already validated.
    pub fn with_position(&self, position: u64) -> Path {
        Path {
            encoded: format!("{}.{}.{}.{}", self.root, self.kind, self.item, position),
            root: self.root.clone(),
            kind: self.kind,
            item: self.item.clone(),
            position,
        }
    }

    /// Whether this path is a direct child of the collection labelled `label`.
    pub fn is_under(&self, label: &str) -> bool {
        self.root == label
    }

    pub fn into_string(self) -> String {
        self.encoded
    }
}

/// Prefix matching every direct child of the collection labelled `label`.
pub fn prefix_of(label: &str) -> String {
    format!("{label}{SEPARATOR}")
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Path {}

impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state);
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encoded.cmp(&other.encoded)
    }
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

impl Borrow<str> for Path {
    fn borrow(&self) -> &str {
        &self.encoded
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.encoded
    }
}

#[cfg(feature = "serde")]
impl Serialize for Path {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encoded)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        decode(&raw).map_err(serde::de::Error::custom)
    }
}
