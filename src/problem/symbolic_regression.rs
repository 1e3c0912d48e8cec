use crate::error::{Result, TreeGpError};
use crate::problem::Problem;
use crate::tree::Forest;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Symbolic-regression problem: a fixed dataset of input rows and labels;
/// fitness is the negated mean squared error of a tree's outputs, so higher
/// is better and a perfect fit scores 0. Trees that go numerically
/// degenerate (non-finite loss) get `-inf` fitness and are thereby invalid.
pub struct SymbolicRegression {
    inputs: Vec<f32>,
    labels: Vec<f32>,
    rows: usize,
    input_len: usize,
    output_len: usize,
}

impl SymbolicRegression {
    /// Build from explicit row-major data: `inputs` is `rows × input_len`,
    /// `labels` is `rows × output_len`.
    pub fn from_data(
        inputs: Vec<f32>,
        labels: Vec<f32>,
        input_len: usize,
        output_len: usize,
    ) -> Result<Self> {
        if input_len == 0 || output_len == 0 {
            return Err(TreeGpError::Configuration(
                "input_len and output_len must be positive".to_string(),
            ));
        }
        if inputs.is_empty() || inputs.len() % input_len != 0 {
            return Err(TreeGpError::Configuration(format!(
                "inputs length {} is not a positive multiple of input_len {input_len}",
                inputs.len()
            )));
        }
        let rows = inputs.len() / input_len;
        if labels.len() != rows * output_len {
            return Err(TreeGpError::Configuration(format!(
                "labels length {} does not match {rows} rows × output_len {output_len}",
                labels.len()
            )));
        }
        Ok(SymbolicRegression {
            inputs,
            labels,
            rows,
            input_len,
            output_len,
        })
    }

    /// Sample `num_data` rows uniformly from `[lower, upper]^num_inputs` and
    /// label them with `target`.
    pub fn from_func<F>(
        target: F,
        num_inputs: usize,
        num_data: usize,
        lower: f32,
        upper: f32,
        seed: u64,
    ) -> Result<Self>
    where
        F: Fn(&[f32]) -> f32,
    {
        if num_inputs == 0 || num_data == 0 {
            return Err(TreeGpError::Configuration(
                "num_inputs and num_data must be positive".to_string(),
            ));
        }
        if !(lower < upper) {
            return Err(TreeGpError::Configuration(format!(
                "invalid sampling bounds [{lower}, {upper}]"
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut inputs = Vec::with_capacity(num_data * num_inputs);
        let mut labels = Vec::with_capacity(num_data);
        for _ in 0..num_data {
            let start = inputs.len();
            for _ in 0..num_inputs {
                inputs.push(lower + rng.gen::<f32>() * (upper - lower));
            }
            labels.push(target(&inputs[start..]));
        }
        SymbolicRegression::from_data(inputs, labels, num_inputs, 1)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn inputs(&self) -> &[f32] {
        &self.inputs
    }
}

impl Problem for SymbolicRegression {
    fn evaluate(&self, forest: &Forest) -> Result<Vec<f64>> {
        if forest.input_len() != self.input_len || forest.output_len() != self.output_len {
            return Err(TreeGpError::Evaluation(format!(
                "forest shape {}x{} does not match problem shape {}x{}",
                forest.input_len(),
                forest.output_len(),
                self.input_len,
                self.output_len
            )));
        }
        let evaluation = forest.forward(&self.inputs)?;
        let n = (self.rows * self.output_len) as f64;

        Ok((0..forest.pop_size())
            .map(|tree| {
                let outputs = evaluation.tree_outputs(tree);
                let sse: f64 = outputs
                    .iter()
                    .zip(&self.labels)
                    .map(|(&y, &t)| {
                        let e = (y - t) as f64;
                        e * e
                    })
                    .sum();
                let mse = sse / n;
                if mse.is_finite() {
                    -mse
                } else {
                    f64::NEG_INFINITY
                }
            })
            .collect())
    }

    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.output_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_validation() {
        assert!(SymbolicRegression::from_data(vec![1.0, 2.0, 3.0], vec![0.0], 2, 1).is_err());
        assert!(SymbolicRegression::from_data(vec![1.0, 2.0], vec![0.0, 0.0], 2, 1).is_err());
        assert!(SymbolicRegression::from_data(vec![1.0, 2.0], vec![0.0], 2, 1).is_ok());
    }

    #[test]
    fn test_from_func_reproducible() {
        let f = |x: &[f32]| x[0] * 2.0;
        let a = SymbolicRegression::from_func(f, 1, 10, -1.0, 1.0, 3).unwrap();
        let b = SymbolicRegression::from_func(f, 1, 10, -1.0, 1.0, 3).unwrap();
        assert_eq!(a.inputs(), b.inputs());
    }
}
