use crate::error::{Result, TreeGpError};
use crate::tree::descriptor::Descriptor;
use crate::tree::generator;
use crate::tree::node::Node;
use crate::tree::tree::Tree;
use rayon::prelude::*;
use std::fmt;

/// Filler written into the unused tail of every tree slot so buffers are
/// bit-reproducible across runs.
const PAD_NODE: Node = Node::Const(0.0);

/// A population of trees packed into shared buffers. Each tree occupies a
/// fixed-stride slot of `max_tree_len` entries in the `nodes`/`sizes`
/// buffers; `lens[i]` is the live prefix length of tree `i`. Population size
/// is fixed for the forest's lifetime; operators produce whole new forests
/// rather than editing one in place.
#[derive(Debug, Clone)]
pub struct Forest {
    input_len: usize,
    output_len: usize,
    max_tree_len: usize,
    nodes: Vec<Node>,
    sizes: Vec<u16>,
    lens: Vec<u16>,
}

/// Borrowed view of one tree inside a forest.
#[derive(Debug, Clone, Copy)]
pub struct TreeView<'a> {
    pub nodes: &'a [Node],
    pub sizes: &'a [u16],
    pub input_len: usize,
    pub output_len: usize,
}

impl<'a> TreeView<'a> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node index range of the subtree rooted at `i` (size-skip addressing).
    pub fn subtree_span(&self, i: usize) -> std::ops::Range<usize> {
        i..i + self.sizes[i] as usize
    }

    pub fn to_tree(&self) -> Tree {
        Tree::from_parts(
            self.input_len,
            self.output_len,
            self.nodes.to_vec(),
            self.sizes.to_vec(),
        )
    }
}

/// Mutable access to one tree slot; used by population-wide operators that
/// fill freshly allocated offspring buffers in parallel.
pub(crate) struct TreeSlot<'a> {
    pub nodes: &'a mut [Node],
    pub sizes: &'a mut [u16],
    pub len: &'a mut u16,
}

impl<'a> TreeSlot<'a> {
    /// Install a tree into this slot, padding the tail with the fixed filler.
    pub fn write(&mut self, nodes: &[Node], sizes: &[u16]) {
        debug_assert_eq!(nodes.len(), sizes.len());
        debug_assert!(nodes.len() <= self.nodes.len());
        self.nodes[..nodes.len()].copy_from_slice(nodes);
        self.sizes[..sizes.len()].copy_from_slice(sizes);
        for n in &mut self.nodes[nodes.len()..] {
            *n = PAD_NODE;
        }
        for s in &mut self.sizes[sizes.len()..] {
            *s = 0;
        }
        *self.len = nodes.len() as u16;
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }
}

impl Forest {
    /// Generate a random initial population conforming to `descriptor`.
    /// Bit-for-bit reproducible for a fixed `(pop_size, descriptor, seed)`,
    /// regardless of how many threads execute the generation.
    pub fn random_generate(pop_size: usize, descriptor: &Descriptor, seed: u64) -> Result<Forest> {
        if pop_size == 0 {
            return Err(TreeGpError::Generation(
                "pop_size must be positive".to_string(),
            ));
        }
        let mut forest = Forest::with_capacity(
            pop_size,
            descriptor.input_len,
            descriptor.output_len,
            descriptor.max_tree_len,
        );
        forest
            .par_slots()
            .enumerate()
            .try_for_each(|(lane, mut slot)| {
                let mut rng = generator::lane_rng(seed, lane as u64);
                generator::generate_into(&mut slot, descriptor, &mut rng)
            })?;
        Ok(forest)
    }

    /// Pack already-built trees into a forest. All trees must share the
    /// forest's input/output shape and fit within `max_tree_len`.
    pub fn from_trees(max_tree_len: usize, trees: &[Tree]) -> Result<Forest> {
        let first = trees.first().ok_or_else(|| {
            TreeGpError::Generation("cannot build a forest from zero trees".to_string())
        })?;
        let (input_len, output_len) = (first.input_len(), first.output_len());
        let mut forest = Forest::with_capacity(trees.len(), input_len, output_len, max_tree_len);
        for (i, tree) in trees.iter().enumerate() {
            if tree.input_len() != input_len || tree.output_len() != output_len {
                return Err(TreeGpError::Generation(format!(
                    "tree {i} has shape {}x{}, expected {input_len}x{output_len}",
                    tree.input_len(),
                    tree.output_len()
                )));
            }
            if tree.len() > max_tree_len {
                return Err(TreeGpError::Generation(format!(
                    "tree {i} has {} nodes, max_tree_len is {max_tree_len}",
                    tree.len()
                )));
            }
            forest.slot(i).write(tree.nodes(), tree.sizes());
        }
        Ok(forest)
    }

    /// Allocate an empty forest with every slot padded; callers fill slots.
    pub(crate) fn with_capacity(
        pop_size: usize,
        input_len: usize,
        output_len: usize,
        max_tree_len: usize,
    ) -> Forest {
        Forest {
            input_len,
            output_len,
            max_tree_len,
            nodes: vec![PAD_NODE; pop_size * max_tree_len],
            sizes: vec![0; pop_size * max_tree_len],
            lens: vec![0; pop_size],
        }
    }

    /// Empty offspring forest with the same shape parameters as `self`.
    pub(crate) fn same_shape(&self, pop_size: usize) -> Forest {
        Forest::with_capacity(pop_size, self.input_len, self.output_len, self.max_tree_len)
    }

    pub fn pop_size(&self) -> usize {
        self.lens.len()
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    pub fn max_tree_len(&self) -> usize {
        self.max_tree_len
    }

    /// Live length of tree `i`.
    pub fn tree_len(&self, i: usize) -> usize {
        self.lens[i] as usize
    }

    /// Borrowed view of tree `i`.
    pub fn view(&self, i: usize) -> TreeView<'_> {
        let start = i * self.max_tree_len;
        let len = self.lens[i] as usize;
        TreeView {
            nodes: &self.nodes[start..start + len],
            sizes: &self.sizes[start..start + len],
            input_len: self.input_len,
            output_len: self.output_len,
        }
    }

    /// Owned copy of tree `i`.
    pub fn tree(&self, i: usize) -> Tree {
        self.view(i).to_tree()
    }

    pub fn iter(&self) -> impl Iterator<Item = TreeView<'_>> {
        (0..self.pop_size()).map(move |i| self.view(i))
    }

    /// Build a new forest from `indices` into this one (breeding pool
    /// materialization after selection). Indices may repeat.
    pub fn gather(&self, indices: &[usize]) -> Result<Forest> {
        let mut out = self.same_shape(indices.len());
        for (dst, &src) in indices.iter().enumerate() {
            if src >= self.pop_size() {
                return Err(TreeGpError::Generation(format!(
                    "selection index {src} out of range (pop_size = {})",
                    self.pop_size()
                )));
            }
            let view = self.view(src);
            out.slot(dst).write(view.nodes, view.sizes);
        }
        Ok(out)
    }

    /// Mean live tree length across the population.
    pub fn mean_size(&self) -> f64 {
        if self.lens.is_empty() {
            return 0.0;
        }
        self.lens.iter().map(|&l| l as f64).sum::<f64>() / self.lens.len() as f64
    }

    pub(crate) fn slot(&mut self, i: usize) -> TreeSlot<'_> {
        let start = i * self.max_tree_len;
        TreeSlot {
            nodes: &mut self.nodes[start..start + self.max_tree_len],
            sizes: &mut self.sizes[start..start + self.max_tree_len],
            len: &mut self.lens[i],
        }
    }

    /// Parallel iterator over mutable tree slots, one contiguous chunk per
    /// lane; this is the write side of the double-buffered operator pattern.
    pub(crate) fn par_slots(&mut self) -> impl IndexedParallelIterator<Item = TreeSlot<'_>> {
        let stride = self.max_tree_len;
        self.nodes
            .par_chunks_mut(stride)
            .zip(self.sizes.par_chunks_mut(stride))
            .zip(self.lens.par_iter_mut())
            .map(|((nodes, sizes), len)| TreeSlot { nodes, sizes, len })
    }
}

impl PartialEq for Forest {
    /// Structural equality over live tree prefixes.
    fn eq(&self, other: &Self) -> bool {
        if self.pop_size() != other.pop_size()
            || self.input_len != other.input_len
            || self.output_len != other.output_len
            || self.max_tree_len != other.max_tree_len
            || self.lens != other.lens
        {
            return false;
        }
        (0..self.pop_size()).all(|i| {
            let a = self.view(i);
            let b = other.view(i);
            a.nodes == b.nodes && a.sizes == b.sizes
        })
    }
}

impl fmt::Display for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Forest(pop_size={}, mean_size={:.1}, max_tree_len={})",
            self.pop_size(),
            self.mean_size(),
            self.max_tree_len
        )
    }
}
