use treegp::{
    CombinedMutation, DefaultCrossover, Descriptor, DescriptorParams, Forest, Func,
    GeneticProgramming, Problem, SingleConstMutation, StandardPipeline, SubtreeMutation,
    SymbolicRegression, TournamentSelection, TruncationSelection,
};

fn descriptor() -> Descriptor {
    Descriptor::new(DescriptorParams {
        max_tree_len: Some(32),
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

fn problem(seed: u64) -> SymbolicRegression {
    SymbolicRegression::from_func(|x| x[0] * x[0] + x[1], 2, 64, -2.0, 2.0, seed).unwrap()
}

/// Generate, evaluate, select via Tournament(5), breed via default
/// crossover + mutation for one generation; return the resulting forest.
fn one_generation(seed: u64) -> Forest {
    let descriptor = descriptor();
    let forest = Forest::random_generate(100, &descriptor, seed).unwrap();
    let problem = problem(seed);
    let fitness = problem.evaluate(&forest).unwrap();

    let mut gp = GeneticProgramming::new(
        forest,
        Box::new(TournamentSelection::new(5).unwrap()),
        Box::new(DefaultCrossover),
        Box::new(SubtreeMutation::new(0.2, descriptor).unwrap()),
        false,
        seed,
    );
    gp.step(&fitness).unwrap().clone()
}

#[test]
fn test_one_generation_reproduces_bit_for_bit() {
    let a = one_generation(2024);
    let b = one_generation(2024);
    assert_eq!(a, b);
    assert_eq!(a.pop_size(), 100);
    for i in 0..a.pop_size() {
        a.tree(i).validate().unwrap();
    }
}

#[test]
fn test_step_rejects_mismatched_fitness() {
    let d = descriptor();
    let forest = Forest::random_generate(10, &d, 1).unwrap();
    let mut gp = GeneticProgramming::new(
        forest,
        Box::new(TournamentSelection::new(3).unwrap()),
        Box::new(DefaultCrossover),
        Box::new(SubtreeMutation::new(0.2, d).unwrap()),
        false,
        1,
    );
    assert!(gp.step(&[0.0; 7]).is_err());
}

#[test]
fn test_truncation_elites_survive_breeding_unchanged() {
    let d = descriptor();
    let forest = Forest::random_generate(50, &d, 77).unwrap();
    let problem = problem(77);
    let fitness = problem.evaluate(&forest).unwrap();

    // best individual's index, to compare against slot 0 of the offspring
    let best = fitness
        .iter()
        .enumerate()
        .filter(|(_, f)| f.is_finite())
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap();
    let best_tree = forest.tree(best);

    let mut gp = GeneticProgramming::new(
        forest,
        Box::new(TruncationSelection::new(0.4, 0.1).unwrap()),
        Box::new(DefaultCrossover),
        Box::new(SubtreeMutation::new(1.0, d).unwrap()),
        false,
        5,
    );
    let next = gp.step(&fitness).unwrap();
    assert_eq!(next.tree(0), best_tree);
}

#[test]
fn test_elites_never_include_invalid_individuals() {
    let d = descriptor();
    let forest = Forest::random_generate(10, &d, 31).unwrap();
    let valid_tree = forest.tree(4);

    // a single finite entry; the elite rate alone would claim 5 slots
    let mut fitness = [f64::NAN; 10];
    fitness[4] = -1.0;

    let mut gp = GeneticProgramming::new(
        forest,
        Box::new(TruncationSelection::new(0.5, 0.5).unwrap()),
        Box::new(DefaultCrossover),
        Box::new(SubtreeMutation::new(1.0, d).unwrap()),
        false,
        9,
    );
    let next = gp.step(&fitness).unwrap();
    // only the one valid individual is carried over unchanged; breeding the
    // rest from it keeps every offspring well-formed
    assert_eq!(next.tree(0), valid_tree);
    for i in 0..next.pop_size() {
        next.tree(i).validate().unwrap();
    }
}

#[test]
fn test_pipeline_improves_or_holds_best_fitness() {
    let d = descriptor();
    let forest = Forest::random_generate(200, &d, 3).unwrap();
    let mutation = CombinedMutation::new(vec![
        Box::new(SubtreeMutation::new(0.2, d.clone()).unwrap()),
        Box::new(SingleConstMutation::new(0.2, d.clone()).unwrap()),
    ]);
    let gp = GeneticProgramming::new(
        forest,
        Box::new(TruncationSelection::new(0.3, 0.02).unwrap()),
        Box::new(DefaultCrossover),
        Box::new(mutation),
        true,
        3,
    );
    let mut pipeline = StandardPipeline::new(gp, problem(3), 10);
    let best = pipeline.run().unwrap();

    assert!(best.fitness.is_finite());
    assert_eq!(pipeline.history().len(), 10);
    let firsts: Vec<f64> = pipeline.history().iter().map(|s| s.best_fitness).collect();
    // recorded best never regresses below the first generation's best
    assert!(best.fitness >= firsts[0]);
    // pareto front was fed and is non-empty
    assert!(!pipeline.algorithm().pareto_front().unwrap().is_empty());
}

#[test]
fn test_pipeline_runs_are_reproducible() {
    let run = |seed: u64| {
        let d = descriptor();
        let forest = Forest::random_generate(100, &d, seed).unwrap();
        let gp = GeneticProgramming::new(
            forest,
            Box::new(TournamentSelection::new(5).unwrap()),
            Box::new(DefaultCrossover),
            Box::new(SubtreeMutation::new(0.2, d).unwrap()),
            false,
            seed,
        );
        let mut pipeline = StandardPipeline::new(gp, problem(seed), 5);
        let best = pipeline.run().unwrap();
        (best.fitness, best.tree, pipeline.algorithm().forest().clone())
    };
    let (fa, ta, foresta) = run(11);
    let (fb, tb, forestb) = run(11);
    assert_eq!(fa, fb);
    assert_eq!(ta, tb);
    assert_eq!(foresta, forestb);
}
