use crate::tree::Tree;

/// A non-dominated (fitness, size) entry: maximize fitness, minimize the
/// program length. Tracking the front gives the accuracy/complexity
/// trade-off curve of the run for free.
#[derive(Debug, Clone)]
pub struct ParetoEntry {
    pub fitness: f64,
    pub size: usize,
    pub tree: Tree,
}

/// Check whether `(fitness_a, size_a)` dominates `(fitness_b, size_b)`:
/// no worse in both objectives and strictly better in at least one.
pub fn dominates(fitness_a: f64, size_a: usize, fitness_b: f64, size_b: usize) -> bool {
    if fitness_a < fitness_b || size_a > size_b {
        return false;
    }
    fitness_a > fitness_b || size_a < size_b
}

/// Running Pareto front over (fitness, tree size), fed one generation at a
/// time. Non-finite fitness entries are invalid and never enter the front.
#[derive(Debug, Clone, Default)]
pub struct ParetoFront {
    entries: Vec<ParetoEntry>,
}

impl ParetoFront {
    pub fn new() -> Self {
        ParetoFront::default()
    }

    /// Offer a candidate; it enters the front iff nothing dominates it, and
    /// evicts the entries it dominates.
    pub fn try_add(&mut self, fitness: f64, tree: Tree) -> bool {
        if !fitness.is_finite() {
            return false;
        }
        let size = tree.len();
        if self
            .entries
            .iter()
            .any(|e| dominates(e.fitness, e.size, fitness, size) || (e.fitness == fitness && e.size == size))
        {
            return false;
        }
        self.entries
            .retain(|e| !dominates(fitness, size, e.fitness, e.size));
        self.entries.push(ParetoEntry {
            fitness,
            size,
            tree,
        });
        true
    }

    pub fn entries(&self) -> &[ParetoEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
