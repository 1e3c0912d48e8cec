use crate::error::{Result, TreeGpError};
use rand::rngs::StdRng;
use rand::Rng;

/// Population-wide selection: maps `pop_size` fitness values to `pop_size`
/// indices into the evaluated forest (sampling with replacement, except
/// elites). Non-finite fitness entries are invalid individuals: they are
/// excluded from elites and carry zero selection weight, but remain legal
/// targets when nothing finite exists.
pub trait Selection: Send + Sync {
    fn select(&self, fitness: &[f64], rng: &mut StdRng) -> Vec<usize>;

    /// How many leading indices of `select`'s result are elites the breeder
    /// must carry over unchanged. Never exceeds the number of finite
    /// fitness entries.
    fn elite_count(&self, _fitness: &[f64]) -> usize {
        0
    }
}

/// Indices sorted by fitness, best first, invalid entries last.
fn ranked_indices(fitness: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..fitness.len()).collect();
    idx.sort_by(|&a, &b| {
        match (fitness[a].is_finite(), fitness[b].is_finite()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => std::cmp::Ordering::Equal,
            (true, true) => fitness[b]
                .partial_cmp(&fitness[a])
                .unwrap_or(std::cmp::Ordering::Equal),
        }
    });
    idx
}

/// Draw an index from a cumulative weight table.
fn sample_cumulative(cumulative: &[f64], rng: &mut StdRng) -> usize {
    let total = *cumulative.last().unwrap_or(&0.0);
    let r = rng.gen::<f64>() * total;
    cumulative.partition_point(|&c| c <= r).min(cumulative.len() - 1)
}

/// Keep the top `survival_rate` fraction by fitness and refill the
/// population by resampling survivors with replacement; the top `elite_rate`
/// fraction leads the result and is preserved unmutated by the breeder.
#[derive(Debug, Clone)]
pub struct TruncationSelection {
    survival_rate: f64,
    elite_rate: f64,
}

impl TruncationSelection {
    pub fn new(survival_rate: f64, elite_rate: f64) -> Result<Self> {
        for (name, v) in [("survival_rate", survival_rate), ("elite_rate", elite_rate)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(TreeGpError::Configuration(format!(
                    "{name} must be in [0, 1], got {v}"
                )));
            }
        }
        Ok(TruncationSelection {
            survival_rate,
            elite_rate,
        })
    }
}

impl Selection for TruncationSelection {
    fn select(&self, fitness: &[f64], rng: &mut StdRng) -> Vec<usize> {
        let pop = fitness.len();
        let ranked = ranked_indices(fitness);
        let finite = fitness.iter().filter(|f| f.is_finite()).count();
        // invalid entries carry zero weight; they survive only when nothing
        // finite exists at all
        let survivors = ((pop as f64 * self.survival_rate).ceil() as usize)
            .clamp(1, pop)
            .min(finite.max(1));
        let elites = self.elite_count(fitness);

        let mut out = Vec::with_capacity(pop);
        out.extend_from_slice(&ranked[..elites]);
        while out.len() < pop {
            out.push(ranked[rng.gen_range(0..survivors)]);
        }
        out
    }

    fn elite_count(&self, fitness: &[f64]) -> usize {
        let finite = fitness.iter().filter(|f| f.is_finite()).count();
        ((fitness.len() as f64 * self.elite_rate).round() as usize).min(finite)
    }
}

/// Probability proportional to fitness shifted into the non-negative range.
/// Degenerates to a uniform draw when every weight is zero (all-equal or
/// all-invalid populations).
#[derive(Debug, Clone, Default)]
pub struct RouletteSelection;

impl Selection for RouletteSelection {
    fn select(&self, fitness: &[f64], rng: &mut StdRng) -> Vec<usize> {
        let pop = fitness.len();
        let shift = fitness
            .iter()
            .copied()
            .filter(|f| f.is_finite())
            .fold(f64::INFINITY, f64::min);

        let mut acc = 0.0;
        let cumulative: Vec<f64> = fitness
            .iter()
            .map(|&f| {
                if f.is_finite() {
                    acc += f - shift;
                }
                acc
            })
            .collect();

        if acc <= 0.0 {
            return (0..pop).map(|_| rng.gen_range(0..pop)).collect();
        }
        (0..pop)
            .map(|_| sample_cumulative(&cumulative, rng))
            .collect()
    }
}

/// Probability proportional to rank position rather than raw fitness, which
/// keeps outlier fitness values from monopolizing the breeding pool.
#[derive(Debug, Clone, Default)]
pub struct RankSelection;

impl Selection for RankSelection {
    fn select(&self, fitness: &[f64], rng: &mut StdRng) -> Vec<usize> {
        let pop = fitness.len();
        let ranked = ranked_indices(fitness);

        // weight n for the best, descending to 1; invalid entries weigh 0
        let mut weights = vec![0.0f64; pop];
        let valid = fitness.iter().filter(|f| f.is_finite()).count();
        for (pos, &i) in ranked.iter().take(valid).enumerate() {
            weights[i] = (valid - pos) as f64;
        }

        let mut acc = 0.0;
        let cumulative: Vec<f64> = weights
            .iter()
            .map(|&w| {
                acc += w;
                acc
            })
            .collect();

        if acc <= 0.0 {
            return (0..pop).map(|_| rng.gen_range(0..pop)).collect();
        }
        (0..pop)
            .map(|_| sample_cumulative(&cumulative, rng))
            .collect()
    }
}

/// Repeatedly sample `tournament_size` individuals uniformly with
/// replacement and keep the best, `pop_size` times.
#[derive(Debug, Clone)]
pub struct TournamentSelection {
    tournament_size: usize,
}

impl TournamentSelection {
    pub fn new(tournament_size: usize) -> Result<Self> {
        if tournament_size == 0 {
            return Err(TreeGpError::Configuration(
                "tournament_size must be positive".to_string(),
            ));
        }
        Ok(TournamentSelection { tournament_size })
    }
}

impl Selection for TournamentSelection {
    fn select(&self, fitness: &[f64], rng: &mut StdRng) -> Vec<usize> {
        let pop = fitness.len();
        (0..pop)
            .map(|_| {
                let mut best = rng.gen_range(0..pop);
                for _ in 1..self.tournament_size {
                    let challenger = rng.gen_range(0..pop);
                    let beats = fitness[challenger].is_finite()
                        && (!fitness[best].is_finite() || fitness[challenger] > fitness[best]);
                    if beats {
                        best = challenger;
                    }
                }
                best
            })
            .collect()
    }
}
