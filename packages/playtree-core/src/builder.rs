use crate::error::Result;
use crate::node::Node;
use crate::path::{decode, Path};
use crate::tree::OrderedTree;

/// Hydrate `tree` from persisted path rows of one playlist.
///
/// Rows are decoded up front. The first malformed row fails the whole fill with
/// `InvalidPathFormat` and leaves `tree` exactly as it was.
pub fn fill<I, S>(tree: &mut OrderedTree, rows: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let staged = rows
        .into_iter()
        .map(|row| decode(row.as_ref()))
        .collect::<Result<Vec<Path>>>()?;
    tracing::debug!(rows = staged.len(), "filling playlist tree");
    for path in staged {
        let node = Node::from_path(&path);
        tree.put(path, node);
    }
    Ok(())
}

/// Fresh tree from `rows`.
pub fn build<I, S>(rows: I) -> Result<OrderedTree>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tree = OrderedTree::new();
    fill(&mut tree, rows)?;
    Ok(tree)
}
