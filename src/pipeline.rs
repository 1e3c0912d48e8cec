use crate::algorithm::GeneticProgramming;
use crate::error::{Result, TreeGpError};
use crate::problem::Problem;
use crate::tree::Tree;
use serde::Serialize;

/// Per-generation summary recorded by the pipeline; serializable so runs can
/// dump their history to disk.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub mean_tree_size: f64,
    pub invalid_count: usize,
}

/// Best individual seen across a whole run.
#[derive(Debug, Clone)]
pub struct BestIndividual {
    pub tree: Tree,
    pub fitness: f64,
    pub generation: usize,
}

/// The outer generation loop: evaluate → select → breed until the generation
/// limit or an optional fitness target. Lives outside the core operators;
/// they expose no loop of their own.
pub struct StandardPipeline<P: Problem> {
    algorithm: GeneticProgramming,
    problem: P,
    generation_limit: usize,
    fitness_target: Option<f64>,
    history: Vec<GenerationStats>,
    best: Option<BestIndividual>,
}

impl<P: Problem> StandardPipeline<P> {
    pub fn new(algorithm: GeneticProgramming, problem: P, generation_limit: usize) -> Self {
        StandardPipeline {
            algorithm,
            problem,
            generation_limit,
            fitness_target: None,
            history: Vec::new(),
            best: None,
        }
    }

    /// Stop early once the best fitness reaches `target`.
    pub fn with_fitness_target(mut self, target: f64) -> Self {
        self.fitness_target = Some(target);
        self
    }

    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    pub fn algorithm(&self) -> &GeneticProgramming {
        &self.algorithm
    }

    /// Run the loop and return the best individual seen.
    pub fn run(&mut self) -> Result<BestIndividual> {
        for generation in 0..self.generation_limit {
            let fitness = self.problem.evaluate(self.algorithm.forest())?;
            let stats = self.record(generation, &fitness);
            log::info!(
                "generation {}: best {:.6}, mean {:.6}, mean size {:.1}, invalid {}",
                stats.generation,
                stats.best_fitness,
                stats.mean_fitness,
                stats.mean_tree_size,
                stats.invalid_count
            );

            let reached_target = self
                .fitness_target
                .is_some_and(|t| stats.best_fitness >= t);
            if reached_target || generation == self.generation_limit - 1 {
                break;
            }

            self.algorithm.step(&fitness)?;
        }

        self.best.clone().ok_or_else(|| {
            TreeGpError::Generation("no valid individual was ever evaluated".to_string())
        })
    }

    fn record(&mut self, generation: usize, fitness: &[f64]) -> GenerationStats {
        let forest = self.algorithm.forest();
        let valid: Vec<f64> = fitness.iter().copied().filter(|f| f.is_finite()).collect();
        let invalid_count = fitness.len() - valid.len();

        let best_idx = fitness
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_finite())
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i);

        if let Some(i) = best_idx {
            let improved = self.best.as_ref().map_or(true, |b| fitness[i] > b.fitness);
            if improved {
                self.best = Some(BestIndividual {
                    tree: forest.tree(i),
                    fitness: fitness[i],
                    generation,
                });
            }
        }

        let best_fitness = best_idx.map_or(f64::NEG_INFINITY, |i| fitness[i]);
        let mean_fitness = if valid.is_empty() {
            f64::NEG_INFINITY
        } else {
            valid.iter().sum::<f64>() / valid.len() as f64
        };

        let stats = GenerationStats {
            generation,
            best_fitness,
            mean_fitness,
            mean_tree_size: forest.mean_size(),
            invalid_count,
        };
        self.history.push(stats.clone());
        stats
    }
}
