use crate::error::{Result, TreeGpError};
use crate::ops::splice;
use crate::tree::forest::TreeView;
use crate::tree::generator::lane_rng;
use crate::tree::Forest;
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;

/// How many alternate subtree picks a breeding operator tries before giving
/// up and copying the recipient parent unchanged.
pub(crate) const MAX_SPLICE_RETRIES: usize = 8;

/// Population-wide subtree crossover: `apply` returns a forest of the same
/// population size, never fails on structural overflow (bounded retries then
/// parent copy), and is deterministic for a fixed RNG state.
pub trait Crossover: Send + Sync {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest>;
}

fn uniform_root(view: &TreeView<'_>, rng: &mut StdRng) -> usize {
    rng.gen_range(0..view.len())
}

/// For each output slot `i`, tree `i` is the recipient and a uniformly drawn
/// tree is the donor; a uniform subtree of the donor is spliced over a
/// uniform subtree of the recipient.
#[derive(Debug, Clone, Default)]
pub struct DefaultCrossover;

impl Crossover for DefaultCrossover {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        breed(forest, rng, uniform_root)
    }
}

/// Like [`DefaultCrossover`], but with probability `leaf_bias` the splice
/// points on both sides are leaves, which trades macro-structure churn for
/// fine-grained terminal shuffling.
#[derive(Debug, Clone)]
pub struct LeafBiasedCrossover {
    leaf_bias: f64,
}

impl LeafBiasedCrossover {
    pub fn new(leaf_bias: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&leaf_bias) {
            return Err(TreeGpError::Configuration(format!(
                "leaf_bias must be in [0, 1], got {leaf_bias}"
            )));
        }
        Ok(LeafBiasedCrossover { leaf_bias })
    }
}

impl Crossover for LeafBiasedCrossover {
    fn apply(&self, forest: &Forest, rng: &mut StdRng) -> Result<Forest> {
        let bias = self.leaf_bias;
        breed(forest, rng, move |view, rng| {
            if rng.gen::<f64>() < bias {
                let leaves: Vec<usize> = (0..view.len())
                    .filter(|&i| view.nodes[i].is_leaf())
                    .collect();
                if !leaves.is_empty() {
                    return leaves[rng.gen_range(0..leaves.len())];
                }
            }
            uniform_root(view, rng)
        })
    }
}

fn breed<F>(forest: &Forest, rng: &mut StdRng, pick: F) -> Result<Forest>
where
    F: Fn(&TreeView<'_>, &mut StdRng) -> usize + Send + Sync,
{
    let pop = forest.pop_size();
    let max_tree_len = forest.max_tree_len();
    let base = rng.gen::<u64>();

    let mut offspring = forest.same_shape(pop);
    offspring
        .par_slots()
        .enumerate()
        .for_each(|(lane, mut slot)| {
            let mut rng = lane_rng(base, lane as u64);
            let recipient = forest.view(lane);

            for _ in 0..=MAX_SPLICE_RETRIES {
                let donor = forest.view(rng.gen_range(0..pop));
                let at = pick(&recipient, &mut rng);
                let from = pick(&donor, &mut rng);
                let span = donor.subtree_span(from);
                let child_len = recipient.len() - recipient.sizes[at] as usize + span.len();
                if child_len <= max_tree_len {
                    let (nodes, sizes) =
                        splice(&recipient, at, &donor.nodes[span.clone()], &donor.sizes[span]);
                    slot.write(&nodes, &sizes);
                    return;
                }
            }
            // no feasible splice found; keep the recipient parent as-is
            log::debug!("crossover fallback: lane {lane} copies its parent unchanged");
            slot.write(recipient.nodes, recipient.sizes);
        });

    Ok(offspring)
}
