use rand::rngs::StdRng;
use rand::SeedableRng;
use treegp::{
    CombinedMutation, Crossover, DefaultCrossover, DeleteMutation, Descriptor, DescriptorParams,
    Forest, Func, HoistMutation, InsertMutation, MultiConstMutation, Mutation, Node,
    PointMutation, RankSelection, RouletteSelection, Selection, SingleConstMutation,
    SubtreeMutation, TournamentSelection, Tree, TruncationSelection,
};

fn descriptor(max_tree_len: usize) -> Descriptor {
    Descriptor::new(DescriptorParams {
        max_tree_len: Some(max_tree_len),
        input_len: Some(2),
        output_len: Some(1),
        using_funcs: Some(vec![Func::Add, Func::Sub, Func::Mul, Func::Div]),
        max_layer_cnt: Some(4),
        layer_leaf_prob: Some(0.25),
        const_samples: Some(vec![-1.0, 0.0, 1.0]),
        ..Default::default()
    })
    .unwrap()
}

fn random_forest(pop: usize, max_tree_len: usize, seed: u64) -> Forest {
    Forest::random_generate(pop, &descriptor(max_tree_len), seed).unwrap()
}

fn assert_closed(forest: &Forest, max_tree_len: usize) {
    for i in 0..forest.pop_size() {
        assert!(forest.tree_len(i) <= max_tree_len);
        forest.tree(i).validate().unwrap();
    }
}

#[test]
fn test_crossover_closure_under_tight_budget() {
    let forest = random_forest(64, 8, 21);
    let child = DefaultCrossover
        .apply(&forest, &mut StdRng::seed_from_u64(5))
        .unwrap();
    assert_eq!(child.pop_size(), 64);
    assert_closed(&child, 8);
}

#[test]
fn test_selection_cardinality_all_variants() {
    let fitness: Vec<f64> = (0..40)
        .map(|i| match i % 7 {
            0 => f64::NAN,
            1 => f64::NEG_INFINITY,
            _ => (i as f64).sin() * 10.0,
        })
        .collect();

    let variants: Vec<Box<dyn Selection>> = vec![
        Box::new(TruncationSelection::new(0.3, 0.05).unwrap()),
        Box::new(RouletteSelection),
        Box::new(RankSelection),
        Box::new(TournamentSelection::new(5).unwrap()),
    ];
    for sel in &variants {
        let indices = sel.select(&fitness, &mut StdRng::seed_from_u64(3));
        assert_eq!(indices.len(), fitness.len());
        assert!(indices.iter().all(|&i| i < fitness.len()));
    }
}

#[test]
fn test_single_const_mutation_always_changes_the_constant() {
    // exactly one Constant node per tree
    let tree = Tree::from_nodes(
        2,
        1,
        vec![Node::Func(Func::Add), Node::Const(1.0), Node::Var(0)],
    )
    .unwrap();
    let forest = Forest::from_trees(8, &vec![tree.clone(); 16]).unwrap();

    let op = SingleConstMutation::new(1.0, descriptor(8)).unwrap();
    let mutated = op.apply(&forest, &mut StdRng::seed_from_u64(40)).unwrap();

    for i in 0..mutated.pop_size() {
        let m = mutated.tree(i);
        assert_eq!(m.len(), tree.len());
        assert_eq!(m.sizes(), tree.sizes());
        match (m.nodes()[1], tree.nodes()[1]) {
            (Node::Const(new), Node::Const(old)) => assert_ne!(new, old),
            _ => panic!("tree shape changed"),
        }
        assert_eq!(m.nodes()[0], tree.nodes()[0]);
        assert_eq!(m.nodes()[2], tree.nodes()[2]);
    }
}

#[test]
fn test_subtree_mutation_closure() {
    let forest = random_forest(64, 16, 8);
    let op = SubtreeMutation::new(1.0, descriptor(16)).unwrap();
    let mutated = op.apply(&forest, &mut StdRng::seed_from_u64(11)).unwrap();
    assert_eq!(mutated.pop_size(), 64);
    assert_closed(&mutated, 16);
}

#[test]
fn test_hoist_mutation_strictly_shrinks_multi_node_trees() {
    let forest = random_forest(64, 32, 15);
    let op = HoistMutation::new(1.0).unwrap();
    let mutated = op.apply(&forest, &mut StdRng::seed_from_u64(2)).unwrap();
    for i in 0..mutated.pop_size() {
        if forest.tree_len(i) > 1 {
            assert!(mutated.tree_len(i) < forest.tree_len(i));
        } else {
            assert_eq!(mutated.tree_len(i), 1);
        }
        mutated.tree(i).validate().unwrap();
    }
}

#[test]
fn test_point_mutation_preserves_shape() {
    let forest = random_forest(64, 32, 33);
    let op = PointMutation::new(1.0, descriptor(32)).unwrap();
    let mutated = op.apply(&forest, &mut StdRng::seed_from_u64(6)).unwrap();
    for i in 0..mutated.pop_size() {
        assert_eq!(mutated.tree_len(i), forest.tree_len(i));
        assert_eq!(mutated.tree(i).sizes(), forest.tree(i).sizes());
        mutated.tree(i).validate().unwrap();
    }
}

#[test]
fn test_insert_and_delete_mutations_stay_valid() {
    let forest = random_forest(64, 16, 44);
    let insert = InsertMutation::new(1.0, descriptor(16)).unwrap();
    let grown = insert.apply(&forest, &mut StdRng::seed_from_u64(7)).unwrap();
    assert_closed(&grown, 16);

    let delete = DeleteMutation::new(1.0).unwrap();
    let shrunk = delete.apply(&grown, &mut StdRng::seed_from_u64(8)).unwrap();
    assert_closed(&shrunk, 16);
    for i in 0..shrunk.pop_size() {
        assert!(shrunk.tree_len(i) <= grown.tree_len(i));
    }
}

#[test]
fn test_multi_const_mutation_only_touches_constants() {
    let forest = random_forest(32, 16, 50);
    let op = MultiConstMutation::new(1.0, 0.5).unwrap();
    let mutated = op.apply(&forest, &mut StdRng::seed_from_u64(9)).unwrap();
    for i in 0..mutated.pop_size() {
        let before = forest.tree(i);
        let after = mutated.tree(i);
        assert_eq!(before.len(), after.len());
        for (a, b) in before.nodes().iter().zip(after.nodes()) {
            match (a, b) {
                (Node::Const(_), Node::Const(_)) => {}
                _ => assert_eq!(a, b),
            }
        }
    }
}

#[test]
fn test_combined_mutation_applies_stages_in_order() {
    let forest = random_forest(32, 16, 60);
    let combined = CombinedMutation::new(vec![
        Box::new(SubtreeMutation::new(0.5, descriptor(16)).unwrap()),
        Box::new(SingleConstMutation::new(0.5, descriptor(16)).unwrap()),
        Box::new(HoistMutation::new(0.2).unwrap()),
    ]);
    let mutated = combined
        .apply(&forest, &mut StdRng::seed_from_u64(10))
        .unwrap();
    assert_eq!(mutated.pop_size(), 32);
    assert_closed(&mutated, 16);
}

#[test]
fn test_zero_rate_mutation_is_identity() {
    let forest = random_forest(32, 16, 70);
    let op = SubtreeMutation::new(0.0, descriptor(16)).unwrap();
    let mutated = op.apply(&forest, &mut StdRng::seed_from_u64(1)).unwrap();
    assert_eq!(mutated, forest);
}

#[test]
fn test_operators_are_deterministic_per_rng_state() {
    let forest = random_forest(32, 16, 80);
    let op = SubtreeMutation::new(0.7, descriptor(16)).unwrap();
    let a = op.apply(&forest, &mut StdRng::seed_from_u64(123)).unwrap();
    let b = op.apply(&forest, &mut StdRng::seed_from_u64(123)).unwrap();
    assert_eq!(a, b);
}
