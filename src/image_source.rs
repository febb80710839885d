//! Deduplicated reflection path tree for the image-source method.
//!
//! Every traced ray yields a surface-index history. Many rays share the
//! same first few bounces, and each shared prefix corresponds to exactly
//! one candidate mirror-image source, so the histories are merged into a
//! tree keyed by surface index: one node per distinct prefix, siblings
//! ordered by index. Inserting a path touches one node per element, which
//! keeps insertion linear in path length no matter how many paths the tree
//! already holds.

use std::collections::BTreeMap;

/// One bounce of a ray's reflection history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathElement {
    /// Index of the reflecting surface in the scene's surface table
    pub index: u32,
    /// False when the ray terminated at this bounce
    pub keep_going: bool,
}

impl PathElement {
    pub fn new(index: u32, keep_going: bool) -> Self {
        Self { index, keep_going }
    }
}

/// A node of the path tree: one reflection, plus every continuation seen.
#[derive(Debug, Clone)]
pub struct TreeNode {
    element: PathElement,
    branches: BTreeMap<u32, TreeNode>,
}

impl TreeNode {
    fn new(element: PathElement) -> Self {
        Self {
            element,
            branches: BTreeMap::new(),
        }
    }

    pub fn element(&self) -> PathElement {
        self.element
    }

    /// Child nodes, ordered by surface index.
    pub fn branches(&self) -> &BTreeMap<u32, TreeNode> {
        &self.branches
    }
}

/// Prefix-merging tree over reflection histories.
///
/// Nodes are keyed by surface index. When two paths disagree about
/// `keep_going` at a shared prefix, the first inserted element wins; the
/// index is what identifies the mirror sequence.
#[derive(Debug, Clone, Default)]
pub struct ImageSourceTree {
    branches: BTreeMap<u32, TreeNode>,
}

impl ImageSourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one ray history into the tree. Pushing an empty path is a
    /// no-op.
    pub fn push(&mut self, path: &[PathElement]) {
        let mut branches = &mut self.branches;
        for element in path {
            let node = branches
                .entry(element.index)
                .or_insert_with(|| TreeNode::new(*element));
            branches = &mut node.branches;
        }
    }

    /// First-bounce nodes, ordered by surface index.
    pub fn branches(&self) -> &BTreeMap<u32, TreeNode> {
        &self.branches
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Total number of nodes, which is also the number of distinct
    /// prefixes merged so far.
    pub fn node_count(&self) -> usize {
        fn count(branches: &BTreeMap<u32, TreeNode>) -> usize {
            branches
                .values()
                .map(|node| 1 + count(&node.branches))
                .sum()
        }
        count(&self.branches)
    }

    /// Flattens the tree into every distinct prefix, in depth-first
    /// sibling-index order. Each returned path is one candidate
    /// image-source mirror sequence.
    pub fn distinct_paths(&self) -> Vec<Vec<PathElement>> {
        fn walk(
            branches: &BTreeMap<u32, TreeNode>,
            prefix: &mut Vec<PathElement>,
            paths: &mut Vec<Vec<PathElement>>,
        ) {
            for node in branches.values() {
                prefix.push(node.element);
                paths.push(prefix.clone());
                walk(&node.branches, prefix, paths);
                prefix.pop();
            }
        }

        let mut paths = Vec::new();
        let mut prefix = Vec::new();
        walk(&self.branches, &mut prefix, &mut paths);
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(elements: &[(u32, bool)]) -> Vec<PathElement> {
        elements
            .iter()
            .map(|&(index, keep_going)| PathElement::new(index, keep_going))
            .collect()
    }

    #[test]
    fn test_shared_prefixes_merge() {
        let mut tree = ImageSourceTree::new();
        tree.push(&path(&[(0, true), (0, true), (0, true)]));
        tree.push(&path(&[(0, true), (1, true), (0, true)]));

        // Both paths start at surface 0, so the root has a single branch.
        assert_eq!(tree.branches().len(), 1);

        let first = &tree.branches()[&0];
        let children: Vec<u32> = first.branches().keys().copied().collect();
        assert_eq!(children, vec![0, 1]);
    }

    #[test]
    fn test_push_empty_path_is_noop() {
        let mut tree = ImageSourceTree::new();
        tree.push(&[]);
        assert!(tree.is_empty());
        assert_eq!(tree.node_count(), 0);
    }

    #[test]
    fn test_distinct_paths_cover_every_prefix() {
        let mut tree = ImageSourceTree::new();
        tree.push(&path(&[(0, true), (0, true), (0, true)]));
        tree.push(&path(&[(0, true), (1, true), (0, true)]));

        let paths: Vec<Vec<u32>> = tree
            .distinct_paths()
            .iter()
            .map(|p| p.iter().map(|e| e.index).collect())
            .collect();

        assert_eq!(
            paths,
            vec![
                vec![0],
                vec![0, 0],
                vec![0, 0, 0],
                vec![0, 1],
                vec![0, 1, 0],
            ]
        );
        assert_eq!(tree.node_count(), 5);
    }

    #[test]
    fn test_first_insert_wins_on_flag_disagreement() {
        let mut tree = ImageSourceTree::new();
        tree.push(&path(&[(2, false)]));
        tree.push(&path(&[(2, true)]));

        assert_eq!(tree.node_count(), 1);
        assert!(!tree.branches()[&2].element().keep_going);
    }

    #[test]
    fn test_identical_paths_do_not_grow_the_tree() {
        let mut tree = ImageSourceTree::new();
        for _ in 0..10 {
            tree.push(&path(&[(3, true), (1, true)]));
        }
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_bulk_insert() {
        // Cheap deterministic generator so the test does not need an RNG
        // dependency.
        let mut state = 0x2545f491_u64;
        let mut next = move |bound: u64| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) % bound
        };

        let mut tree = ImageSourceTree::new();
        let mut pushed_elements = 0;
        for _ in 0..100_000 {
            let len = 1 + next(8) as usize;
            let history: Vec<PathElement> = (0..len)
                .map(|_| PathElement::new(next(32) as u32, true))
                .collect();
            pushed_elements += len;
            tree.push(&history);
        }

        let node_count = tree.node_count();
        assert!(node_count > 0);
        assert!(node_count <= pushed_elements);
        assert_eq!(tree.distinct_paths().len(), node_count);
    }
}
