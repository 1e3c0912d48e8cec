use crate::error::{Result, TreeGpError};
use crate::ops::splice;
use crate::tree::forest::{TreeSlot, TreeView};
use crate::tree::generator::{generate_with_sizes, lane_rng};
use crate::tree::{Descriptor, Forest, Func, Node};
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;

/// Population-wide mutation: `apply` returns a same-size forest; trees that
/// are not mutated (rate gate, or an edit that will not fit `max_tree_len`)
/// are copied through unchanged.
pub trait Mutation: Send + Sync {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest>;
}

fn check_rate(rate: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(TreeGpError::Configuration(format!(
            "mutation_rate must be in [0, 1], got {rate}"
        )));
    }
    Ok(rate)
}

/// Double-buffered per-lane skeleton shared by every mutation variant.
fn mutate_forest<F>(forest: &Forest, rng: &mut StdRng, op: F) -> Result<Forest>
where
    F: Fn(&TreeView<'_>, &mut TreeSlot<'_>, &mut StdRng) -> Result<()> + Send + Sync,
{
    let base = rng.gen::<u64>();
    let mut offspring = forest.same_shape(forest.pop_size());
    offspring
        .par_slots()
        .enumerate()
        .try_for_each(|(lane, mut slot)| {
            let mut rng = lane_rng(base, lane as u64);
            let parent = forest.view(lane);
            op(&parent, &mut slot, &mut rng)
        })?;
    Ok(offspring)
}

fn copy_parent(parent: &TreeView<'_>, slot: &mut TreeSlot<'_>) {
    slot.write(parent.nodes, parent.sizes);
}

/// Regrow a uniformly chosen subtree via the random generator, under the
/// remaining-capacity budget so the result always fits `max_tree_len`.
/// The mutation descriptor is typically shallower than the generation one
/// (the original uses `descriptor.update(max_layer_cnt=3)` here).
#[derive(Debug, Clone)]
pub struct SubtreeMutation {
    mutation_rate: f64,
    descriptor: Descriptor,
}

impl SubtreeMutation {
    pub fn new(mutation_rate: f64, descriptor: Descriptor) -> Result<Self> {
        Ok(SubtreeMutation {
            mutation_rate: check_rate(mutation_rate)?,
            descriptor,
        })
    }
}

impl Mutation for SubtreeMutation {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        mutate_forest(forest, rng, |parent, slot, rng| {
            if rng.gen::<f64>() >= self.mutation_rate {
                copy_parent(parent, slot);
                return Ok(());
            }
            let at = rng.gen_range(0..parent.len());
            let budget = slot.capacity() - (parent.len() - parent.sizes[at] as usize);
            let capacity = budget.min(self.descriptor.max_tree_len).max(1);
            let (sub_nodes, sub_sizes) = generate_with_sizes(&self.descriptor, capacity, rng)?;
            let (nodes, sizes) = splice(parent, at, &sub_nodes, &sub_sizes);
            slot.write(&nodes, &sizes);
            Ok(())
        })
    }
}

/// Replace individual nodes with others of the same class: functions swap
/// within the same arity, inputs re-index, constants resample. Tree shape
/// and size annotations are untouched. The rate applies per node.
#[derive(Debug, Clone)]
pub struct PointMutation {
    mutation_rate: f64,
    descriptor: Descriptor,
}

impl PointMutation {
    pub fn new(mutation_rate: f64, descriptor: Descriptor) -> Result<Self> {
        Ok(PointMutation {
            mutation_rate: check_rate(mutation_rate)?,
            descriptor,
        })
    }
}

impl Mutation for PointMutation {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        let by_arity: Vec<Vec<Func>> = (0..=3).map(|a| self.descriptor.funcs_with_arity(a)).collect();
        mutate_forest(forest, rng, |parent, slot, rng| {
            let mut nodes = parent.nodes.to_vec();
            for node in &mut nodes {
                if rng.gen::<f64>() >= self.mutation_rate {
                    continue;
                }
                *node = match *node {
                    Node::Func(f) => {
                        let compatible = &by_arity[f.arity()];
                        if compatible.is_empty() {
                            Node::Func(f)
                        } else {
                            Node::Func(compatible[rng.gen_range(0..compatible.len())])
                        }
                    }
                    Node::Var(_) => Node::Var(rng.gen_range(0..parent.input_len) as u16),
                    Node::Const(_) => Node::Const(self.descriptor.sample_const(rng)),
                    Node::Out(_) => Node::Out(rng.gen_range(0..parent.output_len) as u16),
                };
            }
            slot.write(&nodes, parent.sizes);
            Ok(())
        })
    }
}

/// Replace the whole tree with one of its own proper subtrees; strictly
/// shrinks. Single-node trees have no proper subtree and copy through.
#[derive(Debug, Clone)]
pub struct HoistMutation {
    mutation_rate: f64,
}

impl HoistMutation {
    pub fn new(mutation_rate: f64) -> Result<Self> {
        Ok(HoistMutation {
            mutation_rate: check_rate(mutation_rate)?,
        })
    }
}

impl Mutation for HoistMutation {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        mutate_forest(forest, rng, |parent, slot, rng| {
            if parent.len() == 1 || rng.gen::<f64>() >= self.mutation_rate {
                copy_parent(parent, slot);
                return Ok(());
            }
            let at = rng.gen_range(1..parent.len());
            let span = parent.subtree_span(at);
            slot.write(&parent.nodes[span.clone()], &parent.sizes[span]);
            Ok(())
        })
    }
}

/// Wrap a uniformly chosen subtree in a freshly drawn function node, filling
/// the remaining child slots with generated leaves. Skipped (parent copied)
/// when the grown tree would exceed `max_tree_len`.
#[derive(Debug, Clone)]
pub struct InsertMutation {
    mutation_rate: f64,
    descriptor: Descriptor,
}

impl InsertMutation {
    pub fn new(mutation_rate: f64, descriptor: Descriptor) -> Result<Self> {
        Ok(InsertMutation {
            mutation_rate: check_rate(mutation_rate)?,
            descriptor,
        })
    }
}

impl Mutation for InsertMutation {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        mutate_forest(forest, rng, |parent, slot, rng| {
            if rng.gen::<f64>() >= self.mutation_rate {
                copy_parent(parent, slot);
                return Ok(());
            }
            let func = self.descriptor.sample_func(rng);
            if parent.len() + func.arity() > slot.capacity() {
                log::debug!("insert mutation skipped: tree at capacity");
                copy_parent(parent, slot);
                return Ok(());
            }
            let at = rng.gen_range(0..parent.len());
            let span = parent.subtree_span(at);

            let mut sub_nodes = Vec::with_capacity(span.len() + func.arity());
            let mut sub_sizes = Vec::with_capacity(span.len() + func.arity());
            sub_nodes.push(Node::Func(func));
            sub_sizes.push((span.len() + func.arity()) as u16);
            sub_nodes.extend_from_slice(&parent.nodes[span.clone()]);
            sub_sizes.extend_from_slice(&parent.sizes[span]);
            for _ in 1..func.arity() {
                sub_nodes.push(self.random_leaf(parent, rng));
                sub_sizes.push(1);
            }

            let (nodes, sizes) = splice(parent, at, &sub_nodes, &sub_sizes);
            slot.write(&nodes, &sizes);
            Ok(())
        })
    }
}

impl InsertMutation {
    fn random_leaf(&self, parent: &TreeView<'_>, rng: &mut StdRng) -> Node {
        if rng.gen::<f64>() < self.descriptor.const_prob {
            Node::Const(self.descriptor.sample_const(rng))
        } else {
            Node::Var(rng.gen_range(0..parent.input_len) as u16)
        }
    }
}

/// Promote a uniformly chosen child over its function parent, deleting the
/// parent and its other children. Leaf-only trees are copied unchanged.
#[derive(Debug, Clone)]
pub struct DeleteMutation {
    mutation_rate: f64,
}

impl DeleteMutation {
    pub fn new(mutation_rate: f64) -> Result<Self> {
        Ok(DeleteMutation {
            mutation_rate: check_rate(mutation_rate)?,
        })
    }
}

impl Mutation for DeleteMutation {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        mutate_forest(forest, rng, |parent, slot, rng| {
            if rng.gen::<f64>() >= self.mutation_rate {
                copy_parent(parent, slot);
                return Ok(());
            }
            let internals: Vec<usize> = (0..parent.len())
                .filter(|&i| parent.nodes[i].arity() > 0)
                .collect();
            if internals.is_empty() {
                copy_parent(parent, slot);
                return Ok(());
            }
            let at = internals[rng.gen_range(0..internals.len())];
            let arity = parent.nodes[at].arity();

            // walk to the chosen child using size-skip addressing
            let mut child = at + 1;
            for _ in 0..rng.gen_range(0..arity) {
                child += parent.sizes[child] as usize;
            }
            let span = parent.subtree_span(child);

            let (nodes, sizes) = splice(parent, at, &parent.nodes[span.clone()], &parent.sizes[span]);
            slot.write(&nodes, &sizes);
            Ok(())
        })
    }
}

/// Resample the value of one uniformly chosen Constant node, guaranteed to
/// change it; tree shape and length are untouched. Per-tree rate.
#[derive(Debug, Clone)]
pub struct SingleConstMutation {
    mutation_rate: f64,
    descriptor: Descriptor,
}

impl SingleConstMutation {
    pub fn new(mutation_rate: f64, descriptor: Descriptor) -> Result<Self> {
        Ok(SingleConstMutation {
            mutation_rate: check_rate(mutation_rate)?,
            descriptor,
        })
    }

    fn resample(&self, current: f32, rng: &mut StdRng) -> f32 {
        for _ in 0..8 {
            let v = self.descriptor.sample_const(rng);
            if v != current {
                return v;
            }
        }
        // pool may collapse onto the current value; fall back deterministically
        match self
            .descriptor
            .const_samples
            .iter()
            .copied()
            .find(|&v| v != current)
        {
            Some(v) => v,
            None => current + 1.0,
        }
    }
}

impl Mutation for SingleConstMutation {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        mutate_forest(forest, rng, |parent, slot, rng| {
            if rng.gen::<f64>() >= self.mutation_rate {
                copy_parent(parent, slot);
                return Ok(());
            }
            let consts: Vec<usize> = (0..parent.len())
                .filter(|&i| matches!(parent.nodes[i], Node::Const(_)))
                .collect();
            if consts.is_empty() {
                copy_parent(parent, slot);
                return Ok(());
            }
            let at = consts[rng.gen_range(0..consts.len())];
            let mut nodes = parent.nodes.to_vec();
            if let Node::Const(v) = nodes[at] {
                nodes[at] = Node::Const(self.resample(v, rng));
            }
            slot.write(&nodes, parent.sizes);
            Ok(())
        })
    }
}

/// Perturb Constant nodes with additive uniform noise in `[-noise, noise]`;
/// the rate applies per Constant node.
#[derive(Debug, Clone)]
pub struct MultiConstMutation {
    mutation_rate: f64,
    noise: f32,
}

impl MultiConstMutation {
    pub fn new(mutation_rate: f64, noise: f32) -> Result<Self> {
        if !noise.is_finite() || noise < 0.0 {
            return Err(TreeGpError::Configuration(format!(
                "noise must be finite and non-negative, got {noise}"
            )));
        }
        Ok(MultiConstMutation {
            mutation_rate: check_rate(mutation_rate)?,
            noise,
        })
    }
}

impl Mutation for MultiConstMutation {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        mutate_forest(forest, rng, |parent, slot, rng| {
            let mut nodes = parent.nodes.to_vec();
            for node in &mut nodes {
                if let Node::Const(v) = *node {
                    if rng.gen::<f64>() < self.mutation_rate {
                        let delta = self.noise * (rng.gen::<f32>() * 2.0 - 1.0);
                        *node = Node::Const(v + delta);
                    }
                }
            }
            slot.write(&nodes, parent.sizes);
            Ok(())
        })
    }
}

/// Apply a configured sequence of mutation operators, each gated by its own
/// rate. The population passes through the stages in order.
pub struct CombinedMutation {
    stages: Vec<Box<dyn Mutation>>,
}

impl CombinedMutation {
    pub fn new(stages: Vec<Box<dyn Mutation>>) -> Self {
        CombinedMutation { stages }
    }
}

impl Mutation for CombinedMutation {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        let mut current = forest.clone();
        for stage in &self.stages {
            current = stage.apply(&current, rng)?;
        }
        Ok(current)
    }
}
