//! Batched expression evaluation.
//!
//! Every tree in a forest is executed against every input row as one uniform
//! population-wide operation: per (tree, row) the prefix sequence is walked
//! with an explicit operand stack, and the protected function table keeps the
//! whole batch total no matter how numerically degenerate an individual is.

use crate::error::{Result, TreeGpError};
use crate::tree::{Forest, Node};
use rayon::prelude::*;

/// Output tensor of a population-wide forward pass, laid out tree-major:
/// `pop_size × rows × output_len`. Accessors hide the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    data: Vec<f32>,
    pop_size: usize,
    rows: usize,
    output_len: usize,
}

impl Evaluation {
    pub fn pop_size(&self) -> usize {
        self.pop_size
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// Output of `tree` on `row` at `slot`.
    pub fn value(&self, tree: usize, row: usize, slot: usize) -> f32 {
        self.data[(tree * self.rows + row) * self.output_len + slot]
    }

    /// All outputs of one tree, row-major (`rows × output_len`).
    pub fn tree_outputs(&self, tree: usize) -> &[f32] {
        let chunk = self.rows * self.output_len;
        &self.data[tree * chunk..(tree + 1) * chunk]
    }
}

impl Forest {
    /// Evaluate every tree against every row of `inputs` (flat row-major,
    /// `rows × input_len`). Pure and deterministic; numeric-domain violations
    /// are contained per operation by the protected function table, so the
    /// result tensor is always complete.
    pub fn forward(&self, inputs: &[f32]) -> Result<Evaluation> {
        let input_len = self.input_len();
        if inputs.is_empty() || inputs.len() % input_len != 0 {
            return Err(TreeGpError::Evaluation(format!(
                "inputs length {} is not a positive multiple of input_len {}",
                inputs.len(),
                input_len
            )));
        }
        let rows = inputs.len() / input_len;
        let output_len = self.output_len();
        let chunk = rows * output_len;

        let mut data = vec![0.0f32; self.pop_size() * chunk];
        data.par_chunks_mut(chunk)
            .enumerate()
            .for_each(|(tree, out)| {
                let view = self.view(tree);
                let mut stack = Vec::with_capacity(view.len());
                for (row, row_out) in inputs.chunks_exact(input_len).zip(out.chunks_mut(output_len))
                {
                    eval_nodes(view.nodes, row, row_out, &mut stack);
                }
            });

        Ok(Evaluation {
            data,
            pop_size: self.pop_size(),
            rows,
            output_len,
        })
    }
}

/// Evaluate one prefix sequence on one input row.
///
/// Walks the nodes in reverse so every operand is on the stack before its
/// function is applied (equivalent to prefix-order evaluation with a value
/// stack). `Out(slot)` records its operand to `outputs[slot]` and passes the
/// value through; output slot 0 falls back to the root value when no Out node
/// wrote it.
pub(crate) fn eval_nodes(nodes: &[Node], row: &[f32], outputs: &mut [f32], stack: &mut Vec<f32>) {
    outputs.fill(0.0);
    stack.clear();
    let mut wrote_slot0 = false;

    for node in nodes.iter().rev() {
        match *node {
            Node::Var(idx) => stack.push(row[idx as usize]),
            Node::Const(v) => stack.push(v),
            Node::Out(slot) => {
                let v = stack.pop().unwrap_or(0.0);
                outputs[slot as usize] = v;
                if slot == 0 {
                    wrote_slot0 = true;
                }
                stack.push(v);
            }
            Node::Func(func) => {
                let arity = func.arity();
                let mut args = [0.0f32; 3];
                for a in args.iter_mut().take(arity) {
                    *a = stack.pop().unwrap_or(0.0);
                }
                stack.push(func.apply(&args[..arity]));
            }
        }
    }

    let root = stack.pop().unwrap_or(0.0);
    if !wrote_slot0 {
        if let Some(first) = outputs.first_mut() {
            *first = root;
        }
    }
}
