//! Problem collaborators: they score a forest, the core never constrains how.

pub mod symbolic_regression;

pub use symbolic_regression::SymbolicRegression;

use crate::error::Result;
use crate::tree::Forest;

/// External fitness supplier. The contract is shape-only: one finite-or-not
/// `f64` per tree; non-finite entries mark invalid individuals.
pub trait Problem: Send + Sync {
    fn evaluate(&self, forest: &Forest) -> Result<Vec<f64>>;

    fn input_len(&self) -> usize;

    fn output_len(&self) -> usize;
}
