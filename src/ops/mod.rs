//! Population-wide genetic operators: crossover, mutation and selection.
//!
//! Every operator is a pure transform over a whole forest (or fitness
//! vector); offspring are written into freshly allocated buffers so no
//! operator ever mutates a forest other code may still be reading.

pub mod crossover;
pub mod mutation;
pub mod selection;

pub use crossover::{Crossover, DefaultCrossover, LeafBiasedCrossover};
pub use mutation::{
    CombinedMutation, DeleteMutation, HoistMutation, InsertMutation, MultiConstMutation, Mutation,
    PointMutation, SingleConstMutation, SubtreeMutation,
};
pub use selection::{
    RankSelection, RouletteSelection, Selection, TournamentSelection, TruncationSelection,
};

use crate::tree::forest::TreeView;
use crate::tree::Node;

/// Replace the subtree rooted at `at` with `sub_nodes`/`sub_sizes`,
/// returning the new prefix sequence and size annotations. Ancestor sizes
/// along the path to the root are adjusted by the length delta; every other
/// node keeps its annotation, which is what makes subtree surgery O(tree)
/// instead of O(recursion).
pub(crate) fn splice(
    view: &TreeView<'_>,
    at: usize,
    sub_nodes: &[Node],
    sub_sizes: &[u16],
) -> (Vec<Node>, Vec<u16>) {
    let removed = view.sizes[at] as usize;
    let delta = sub_nodes.len() as i64 - removed as i64;

    let mut nodes = Vec::with_capacity(view.len() - removed + sub_nodes.len());
    nodes.extend_from_slice(&view.nodes[..at]);
    nodes.extend_from_slice(sub_nodes);
    nodes.extend_from_slice(&view.nodes[at + removed..]);

    let mut sizes = Vec::with_capacity(nodes.len());
    sizes.extend_from_slice(&view.sizes[..at]);
    sizes.extend_from_slice(sub_sizes);
    sizes.extend_from_slice(&view.sizes[at + removed..]);

    // ancestors of `at` are exactly the earlier nodes whose span covers it
    for k in 0..at {
        if k + view.sizes[k] as usize > at {
            sizes[k] = (view.sizes[k] as i64 + delta) as u16;
        }
    }

    (nodes, sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Func, Tree};

    #[test]
    fn test_splice_adjusts_ancestors() {
        // ((x0 + x1) * 2)
        let tree = Tree::from_nodes(
            2,
            1,
            vec![
                Node::Func(Func::Mul),
                Node::Func(Func::Add),
                Node::Var(0),
                Node::Var(1),
                Node::Const(2.0),
            ],
        )
        .unwrap();
        let view = TreeView {
            nodes: tree.nodes(),
            sizes: tree.sizes(),
            input_len: 2,
            output_len: 1,
        };
        // replace x1 (index 3) with (x0 - 1)
        let sub = [Node::Func(Func::Sub), Node::Var(0), Node::Const(1.0)];
        let sub_sizes = [3u16, 1, 1];
        let (nodes, sizes) = splice(&view, 3, &sub, &sub_sizes);
        let spliced = Tree::from_nodes(2, 1, nodes).unwrap();
        assert_eq!(spliced.sizes(), sizes.as_slice());
        assert_eq!(spliced.to_string(), "((x[0] + (x[0] - 1.00)) * 2.00)");
    }
}
