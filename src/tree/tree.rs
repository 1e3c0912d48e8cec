use crate::error::{Result, TreeGpError};
use crate::eval::eval_nodes;
use crate::tree::node::{Func, Node};
use std::fmt;

/// A single candidate program: a prefix (pre-order) node sequence with a
/// parallel subtree-size array. `sizes[i]` is `1 + Σ sizes(children of i)`,
/// so the subtree rooted at `i` spans `i..i + sizes[i]` and any consumer can
/// skip it in O(1) without recursion.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    input_len: usize,
    output_len: usize,
    nodes: Vec<Node>,
    sizes: Vec<u16>,
}

impl Tree {
    /// Build a tree from a prefix node sequence, computing subtree sizes and
    /// rejecting malformed encodings (dangling children, out-of-range Var
    /// index or Out slot).
    pub fn from_nodes(input_len: usize, output_len: usize, nodes: Vec<Node>) -> Result<Tree> {
        check_node_refs(&nodes, input_len, output_len)?;
        let mut sizes = vec![0u16; nodes.len()];
        fill_subtree_sizes(&nodes, &mut sizes)?;
        Ok(Tree {
            input_len,
            output_len,
            nodes,
            sizes,
        })
    }

    pub(crate) fn from_parts(
        input_len: usize,
        output_len: usize,
        nodes: Vec<Node>,
        sizes: Vec<u16>,
    ) -> Tree {
        debug_assert_eq!(nodes.len(), sizes.len());
        Tree {
            input_len,
            output_len,
            nodes,
            sizes,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn sizes(&self) -> &[u16] {
        &self.sizes
    }

    /// Node count of the subtree rooted at `i`.
    pub fn subtree_size(&self, i: usize) -> usize {
        self.sizes[i] as usize
    }

    /// Re-check prefix well-formedness and subtree-size consistency.
    pub fn validate(&self) -> Result<()> {
        check_node_refs(&self.nodes, self.input_len, self.output_len)?;
        let mut sizes = vec![0u16; self.nodes.len()];
        fill_subtree_sizes(&self.nodes, &mut sizes)?;
        if sizes != self.sizes {
            return Err(TreeGpError::InvalidTree(
                "subtree_size annotations do not match the node sequence".to_string(),
            ));
        }
        Ok(())
    }

    /// Evaluate the tree on a single input row.
    pub fn forward(&self, row: &[f32]) -> Result<Vec<f32>> {
        if row.len() != self.input_len {
            return Err(TreeGpError::Evaluation(format!(
                "input row has {} values, expected {}",
                row.len(),
                self.input_len
            )));
        }
        let mut outputs = vec![0.0f32; self.output_len];
        let mut stack = Vec::with_capacity(self.nodes.len());
        eval_nodes(&self.nodes, row, &mut outputs, &mut stack);
        Ok(outputs)
    }
}

/// Check Var indices and Out slots against the declared arities.
fn check_node_refs(nodes: &[Node], input_len: usize, output_len: usize) -> Result<()> {
    if nodes.is_empty() {
        return Err(TreeGpError::InvalidTree("tree has no nodes".to_string()));
    }
    for (i, node) in nodes.iter().enumerate() {
        match *node {
            Node::Var(idx) if idx as usize >= input_len => {
                return Err(TreeGpError::InvalidTree(format!(
                    "node {i}: input index {idx} out of range (input_len = {input_len})"
                )));
            }
            Node::Out(slot) if slot as usize >= output_len => {
                return Err(TreeGpError::InvalidTree(format!(
                    "node {i}: output slot {slot} out of range (output_len = {output_len})"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Fill `sizes[..nodes.len()]` with subtree sizes via a reverse
/// (child-before-parent) pass. Fails if the prefix encoding is malformed.
pub(crate) fn fill_subtree_sizes(nodes: &[Node], sizes: &mut [u16]) -> Result<()> {
    let mut stack: Vec<u16> = Vec::with_capacity(nodes.len());
    for i in (0..nodes.len()).rev() {
        let arity = nodes[i].arity();
        if stack.len() < arity {
            return Err(TreeGpError::InvalidTree(format!(
                "node {i} declares {arity} children but only {} subtrees follow",
                stack.len()
            )));
        }
        let mut size = 1u16;
        for _ in 0..arity {
            size += stack.pop().unwrap_or(0);
        }
        stack.push(size);
        sizes[i] = size;
    }
    if stack.len() != 1 || stack[0] as usize != nodes.len() {
        return Err(TreeGpError::InvalidTree(format!(
            "prefix sequence does not parse as a single tree of {} nodes",
            nodes.len()
        )));
    }
    Ok(())
}

impl fmt::Display for Tree {
    /// Infix rendering, e.g. `((x[0] + x[1]) * 2.00)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack: Vec<String> = Vec::with_capacity(self.nodes.len());
        for node in self.nodes.iter().rev() {
            match *node {
                Node::Var(idx) => stack.push(format!("x[{idx}]")),
                Node::Const(v) => stack.push(format!("{v:.2}")),
                Node::Out(slot) => {
                    let child = stack.pop().unwrap_or_default();
                    stack.push(format!("out[{slot}]:({child})"));
                }
                Node::Func(func) => {
                    let repr = match func {
                        Func::Add | Func::Sub | Func::Mul | Func::Div => {
                            let a = stack.pop().unwrap_or_default();
                            let b = stack.pop().unwrap_or_default();
                            format!("({a} {} {b})", func.name())
                        }
                        _ => {
                            let args: Vec<String> = (0..func.arity())
                                .map(|_| stack.pop().unwrap_or_default())
                                .collect();
                            format!("{}({})", func.name(), args.join(", "))
                        }
                    };
                    stack.push(repr);
                }
            }
        }
        write!(f, "{}", stack.pop().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_nodes_computes_sizes() {
        // (x0 + x1) * 2 in prefix order
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
        assert_eq!(tree.sizes(), &[5, 3, 1, 1, 1]);
        tree.validate().unwrap();
    }

    #[test]
    fn test_malformed_prefix_rejected() {
        // function node with a missing child
        assert!(Tree::from_nodes(1, 1, vec![Node::Func(Func::Add), Node::Var(0)]).is_err());
        // trailing unreachable node
        assert!(Tree::from_nodes(1, 1, vec![Node::Var(0), Node::Var(0)]).is_err());
        assert!(Tree::from_nodes(1, 1, vec![]).is_err());
    }

    #[test]
    fn test_out_of_range_refs_rejected() {
        assert!(Tree::from_nodes(1, 1, vec![Node::Var(3)]).is_err());
        assert!(Tree::from_nodes(1, 1, vec![Node::Out(2), Node::Var(0)]).is_err());
    }

    #[test]
    fn test_display_infix() {
        let tree = Tree::from_nodes(
            2,
            1,
            vec![Node::Func(Func::Sub), Node::Var(0), Node::Const(1.0)],
        )
        .unwrap();
        assert_eq!(tree.to_string(), "(x[0] - 1.00)");
    }

    #[test]
    fn test_forward_subtraction_order() {
        let tree = Tree::from_nodes(
            2,
            1,
            vec![Node::Func(Func::Sub), Node::Var(0), Node::Var(1)],
        )
        .unwrap();
        assert_eq!(tree.forward(&[5.0, 2.0]).unwrap(), vec![3.0]);
    }
}
