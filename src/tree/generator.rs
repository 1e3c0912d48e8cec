use crate::error::Result;
use crate::tree::descriptor::Descriptor;
use crate::tree::forest::TreeSlot;
use crate::tree::node::Node;
use crate::tree::tree::fill_subtree_sizes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Derive an independent RNG for one population lane. Seeding per lane keeps
/// every per-individual draw sequence independent of scheduling, so parallel
/// runs reproduce bit-for-bit under a fixed base seed.
pub(crate) fn lane_rng(base: u64, lane: u64) -> StdRng {
    // splitmix64 finalizer over (base, lane)
    let mut z = base ^ lane.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    StdRng::seed_from_u64(z ^ (z >> 31))
}

/// Pending position in the iterative construction worklist. `leaf_only`
/// entries are the forced children of Out nodes and skip both the function
/// and the output draw.
#[derive(Clone, Copy)]
struct Pending {
    depth: usize,
    leaf_only: bool,
}

/// Emit one random tree conforming to `descriptor` into at most `capacity`
/// prefix slots.
///
/// Worklist algorithm: pop a pending position, decide leaf vs. function
/// against `depth2leaf_probs[depth]`, and push each function child at
/// `depth + 1`. Whenever the remaining buffer budget cannot hold a sampled
/// function's children, the position deterministically degrades to a leaf,
/// which guarantees termination within `capacity` without retry loops.
pub(crate) fn generate_nodes(
    descriptor: &Descriptor,
    capacity: usize,
    rng: &mut StdRng,
) -> Vec<Node> {
    debug_assert!(capacity >= 1);
    let mut nodes: Vec<Node> = Vec::with_capacity(capacity);
    let mut pending: Vec<Pending> = vec![Pending {
        depth: 0,
        leaf_only: false,
    }];

    while let Some(p) = pending.pop() {
        // slots left for children after this node is emitted
        let budget = capacity - nodes.len() - 1 - pending.len();

        if !p.leaf_only && rng.gen::<f64>() >= descriptor.leaf_prob(p.depth) {
            let func = descriptor.sample_func(rng);
            if func.arity() <= budget {
                nodes.push(Node::Func(func));
                for _ in 0..func.arity() {
                    pending.push(Pending {
                        depth: p.depth + 1,
                        leaf_only: false,
                    });
                }
                continue;
            }
        }

        // leaf branch: Out -> Const -> Var
        if !p.leaf_only && budget >= 1 && rng.gen::<f64>() < descriptor.out_prob {
            let slot = rng.gen_range(0..descriptor.output_len) as u16;
            nodes.push(Node::Out(slot));
            pending.push(Pending {
                depth: p.depth + 1,
                leaf_only: true,
            });
        } else if rng.gen::<f64>() < descriptor.const_prob {
            nodes.push(Node::Const(descriptor.sample_const(rng)));
        } else {
            nodes.push(Node::Var(rng.gen_range(0..descriptor.input_len) as u16));
        }
    }

    nodes
}

/// Generate a tree plus its subtree-size annotations.
pub(crate) fn generate_with_sizes(
    descriptor: &Descriptor,
    capacity: usize,
    rng: &mut StdRng,
) -> Result<(Vec<Node>, Vec<u16>)> {
    let nodes = generate_nodes(descriptor, capacity, rng);
    let mut sizes = vec![0u16; nodes.len()];
    fill_subtree_sizes(&nodes, &mut sizes)?;
    Ok((nodes, sizes))
}

/// Fill one forest slot with a freshly generated tree.
pub(crate) fn generate_into(
    slot: &mut TreeSlot<'_>,
    descriptor: &Descriptor,
    rng: &mut StdRng,
) -> Result<()> {
    let capacity = slot.capacity().min(descriptor.max_tree_len);
    let (nodes, sizes) = generate_with_sizes(descriptor, capacity, rng)?;
    slot.write(&nodes, &sizes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::descriptor::DescriptorParams;
    use crate::tree::node::Func;
    use crate::tree::tree::Tree;

    fn descriptor(max_tree_len: usize) -> Descriptor {
        Descriptor::new(DescriptorParams {
            max_tree_len: Some(max_tree_len),
            input_len: Some(2),
            output_len: Some(1),
            using_funcs: Some(vec![Func::Add, Func::Sub, Func::Mul, Func::Div]),
            max_layer_cnt: Some(5),
            layer_leaf_prob: Some(0.2),
            const_samples: Some(vec![-1.0, 0.0, 1.0]),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_generated_trees_fit_and_validate() {
        let d = descriptor(16);
        for seed in 0..50 {
            let mut rng = lane_rng(seed, 0);
            let nodes = generate_nodes(&d, d.max_tree_len, &mut rng);
            assert!(!nodes.is_empty());
            assert!(nodes.len() <= d.max_tree_len);
            Tree::from_nodes(d.input_len, d.output_len, nodes).unwrap();
        }
    }

    #[test]
    fn test_capacity_one_forces_single_leaf() {
        let d = descriptor(16);
        let mut rng = lane_rng(7, 0);
        let nodes = generate_nodes(&d, 1, &mut rng);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_leaf());
    }

    #[test]
    fn test_lane_rng_streams_differ() {
        let mut a = lane_rng(42, 0);
        let mut b = lane_rng(42, 1);
        let xs: Vec<u32> = (0..8).map(|_| a.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.gen()).collect();
        assert_ne!(xs, ys);
    }
}
