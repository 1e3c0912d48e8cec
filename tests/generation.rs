use treegp::{Descriptor, DescriptorParams, Forest, Func};

fn descriptor(max_tree_len: usize) -> Descriptor {
    Descriptor::new(DescriptorParams {
        max_tree_len: Some(max_tree_len),
        input_len: Some(2),
        output_len: Some(1),
        using_funcs: Some(vec![Func::Add, Func::Sub, Func::Mul, Func::Div, Func::Sin]),
        max_layer_cnt: Some(6),
        layer_leaf_prob: Some(0.2),
        const_samples: Some(vec![-1.0, 0.0, 1.0]),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_generated_trees_fit_and_are_well_formed() {
    let d = descriptor(32);
    let forest = Forest::random_generate(200, &d, 42).unwrap();
    assert_eq!(forest.pop_size(), 200);
    for i in 0..forest.pop_size() {
        assert!(forest.tree_len(i) >= 1);
        assert!(forest.tree_len(i) <= 32);
        // subtree_size(n) == 1 + sum over children, checked by validate()
        forest.tree(i).validate().unwrap();
    }
}

#[test]
fn test_tiny_capacity_forces_leaves() {
    let d = descriptor(3);
    let forest = Forest::random_generate(100, &d, 7).unwrap();
    for i in 0..forest.pop_size() {
        assert!(forest.tree_len(i) <= 3);
        forest.tree(i).validate().unwrap();
    }
}

#[test]
fn test_generation_is_deterministic() {
    let d = descriptor(64);
    let a = Forest::random_generate(128, &d, 9001).unwrap();
    let b = Forest::random_generate(128, &d, 9001).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_different_seeds_differ() {
    let d = descriptor(64);
    let a = Forest::random_generate(128, &d, 1).unwrap();
    let b = Forest::random_generate(128, &d, 2).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_output_nodes_generate_valid_trees() {
    let d = Descriptor::new(DescriptorParams {
        max_tree_len: Some(32),
        input_len: Some(3),
        output_len: Some(2),
        out_prob: Some(0.3),
        using_funcs: Some(vec![Func::Add, Func::Mul]),
        max_layer_cnt: Some(4),
        layer_leaf_prob: Some(0.3),
        const_samples: Some(vec![0.5, 2.0]),
        ..Default::default()
    })
    .unwrap();
    let forest = Forest::random_generate(100, &d, 13).unwrap();
    for i in 0..forest.pop_size() {
        let tree = forest.tree(i);
        tree.validate().unwrap();
        let out = tree.forward(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(out.len(), 2);
    }
}

#[test]
fn test_zero_pop_size_rejected() {
    let d = descriptor(16);
    assert!(Forest::random_generate(0, &d, 0).is_err());
}
