use anyhow::Context;
use treegp::{
    Descriptor, DescriptorParams, DefaultCrossover, Forest, GeneticProgramming, RunConfig,
    StandardPipeline, SubtreeMutation, SymbolicRegression, TruncationSelection,
};

/// Benchmark target: x0^4/(x0^4+1) + x1^4/(x1^4+1).
fn target(x: &[f32]) -> f32 {
    let a = x[0].powi(4);
    let b = x[1].powi(4);
    a / (a + 1.0) + b / (b + 1.0)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => RunConfig::load(&path).with_context(|| format!("loading {path}"))?,
        None => RunConfig::default(),
    };

    let problem = SymbolicRegression::from_func(
        target,
        2,
        config.num_data,
        config.lower_bound,
        config.upper_bound,
        config.seed,
    )?;

    let descriptor = Descriptor::new(DescriptorParams {
        max_tree_len: Some(config.max_tree_len),
        input_len: Some(2),
        output_len: Some(1),
        const_prob: Some(config.const_prob),
        using_funcs: Some(config.using_funcs.clone()),
        max_layer_cnt: Some(config.max_layer_cnt),
        layer_leaf_prob: Some(config.layer_leaf_prob),
        const_samples: Some(config.const_samples.clone()),
        ..Default::default()
    })?;

    let forest = Forest::random_generate(config.population_size, &descriptor, config.seed)?;
    log::info!("initial {forest}");

    let mutation_descriptor = descriptor.update(DescriptorParams {
        max_layer_cnt: Some(config.mutation_layer_cnt),
        ..Default::default()
    })?;

    let algorithm = GeneticProgramming::new(
        forest,
        Box::new(TruncationSelection::new(
            config.survival_rate,
            config.elite_rate,
        )?),
        Box::new(DefaultCrossover),
        Box::new(SubtreeMutation::new(
            config.mutation_rate,
            mutation_descriptor,
        )?),
        config.enable_pareto_front,
        config.seed,
    );

    let mut pipeline = StandardPipeline::new(algorithm, problem, config.generation_limit);
    let best = pipeline.run()?;

    println!(
        "best program (generation {}, fitness {:.6}):\n  {}",
        best.generation, best.fitness, best.tree
    );

    if let Some(front) = pipeline.algorithm().pareto_front() {
        println!("pareto front ({} entries):", front.len());
        for entry in front.entries() {
            println!("  size {:3}  fitness {:.6}  {}", entry.size, entry.fitness, entry.tree);
        }
    }

    if let Some(path) = &config.summary_path {
        let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
        serde_json::to_writer_pretty(file, pipeline.history())?;
        log::info!("run summary written to {path}");
    }

    Ok(())
}
