//! The breeding state machine: Evaluate → Select → Breed, driven one step at
//! a time by an external orchestrator. The core never loops on its own and
//! never decides termination.

pub mod pareto;

pub use pareto::{ParetoEntry, ParetoFront};

use crate::error::{Result, TreeGpError};
use crate::ops::{Crossover, Mutation, Selection};
use crate::tree::Forest;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// One genetic-programming population plus its breeding operators. Each
/// [`step`](GeneticProgramming::step) consumes the caller-supplied fitness of
/// the current forest and replaces it with the next generation.
pub struct GeneticProgramming {
    forest: Forest,
    selection: Box<dyn Selection>,
    crossover: Box<dyn Crossover>,
    mutation: Box<dyn Mutation>,
    pareto_front: Option<ParetoFront>,
    rng: StdRng,
}

impl GeneticProgramming {
    pub fn new(
        initial_forest: Forest,
        selection: Box<dyn Selection>,
        crossover: Box<dyn Crossover>,
        mutation: Box<dyn Mutation>,
        enable_pareto_front: bool,
        seed: u64,
    ) -> Self {
        GeneticProgramming {
            forest: initial_forest,
            selection,
            crossover,
            mutation,
            pareto_front: enable_pareto_front.then(ParetoFront::new),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn pareto_front(&self) -> Option<&ParetoFront> {
        self.pareto_front.as_ref()
    }

    /// Breed the next generation from `fitness` (one value per tree of the
    /// current forest): select a breeding pool, cross it, mutate it, then
    /// reinstate the selection's elites unchanged. The previous forest is
    /// replaced wholesale; a reference to the new one is returned.
    pub fn step(&mut self, fitness: &[f64]) -> Result<&Forest> {
        let pop = self.forest.pop_size();
        if fitness.len() != pop {
            return Err(TreeGpError::Generation(format!(
                "fitness has {} entries for a population of {pop}",
                fitness.len()
            )));
        }

        if let Some(front) = &mut self.pareto_front {
            for (i, &f) in fitness.iter().enumerate() {
                if f.is_finite() {
                    front.try_add(f, self.forest.tree(i));
                }
            }
        }

        let indices = self.selection.select(fitness, &mut self.rng);
        if indices.len() != pop {
            return Err(TreeGpError::Generation(format!(
                "selection returned {} indices for a population of {pop}",
                indices.len()
            )));
        }

        let pool = self.forest.gather(&indices)?;
        let crossed = self.crossover.apply(&pool, &mut self.rng)?;
        let mut next = self.mutation.apply(&crossed, &mut self.rng)?;

        // elites lead the selection result; carry them over untouched
        let elites = self.selection.elite_count(fitness);
        for (slot_idx, &src) in indices.iter().take(elites).enumerate() {
            let view = self.forest.view(src);
            next.slot(slot_idx).write(view.nodes, view.sizes);
        }

        self.forest = next;
        Ok(&self.forest)
    }
}
