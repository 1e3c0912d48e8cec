use crate::error::{Result, TreeGpError};
use crate::tree::node::Func;
use rand::Rng;
use serde::{Deserialize, Serialize};

const PROB_TOL: f64 = 1e-6;

/// Raw parameter set for building a [`Descriptor`]. Every field is optional;
/// each derived field can be supplied explicitly or resolved from its
/// aggregate group (`depth2leaf_probs` from `max_layer_cnt` +
/// `layer_leaf_prob`, `roulette_funcs` from `using_funcs` + `func_weights`,
/// `const_samples` from `const_range` + `sample_cnt`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptorParams {
    pub max_tree_len: Option<usize>,
    pub input_len: Option<usize>,
    pub output_len: Option<usize>,
    pub const_prob: Option<f64>,
    pub out_prob: Option<f64>,
    pub depth2leaf_probs: Option<Vec<f64>>,
    pub max_layer_cnt: Option<usize>,
    pub layer_leaf_prob: Option<f64>,
    pub roulette_funcs: Option<Vec<f64>>,
    pub using_funcs: Option<Vec<Func>>,
    pub func_weights: Option<Vec<f64>>,
    pub const_samples: Option<Vec<f32>>,
    pub const_range: Option<(f32, f32)>,
    pub sample_cnt: Option<usize>,
}

impl DescriptorParams {
    /// Merge `overrides` on top of `self`, field by field. Overriding an
    /// aggregate parameter clears the explicit tensor derived from it so the
    /// tensor is recomputed instead of carried stale.
    fn merged(&self, overrides: &DescriptorParams) -> DescriptorParams {
        let mut base = self.clone();

        if (overrides.max_layer_cnt.is_some() || overrides.layer_leaf_prob.is_some())
            && overrides.depth2leaf_probs.is_none()
        {
            base.depth2leaf_probs = None;
        }
        if (overrides.using_funcs.is_some() || overrides.func_weights.is_some())
            && overrides.roulette_funcs.is_none()
        {
            base.roulette_funcs = None;
        }
        if (overrides.const_range.is_some() || overrides.sample_cnt.is_some())
            && overrides.const_samples.is_none()
        {
            base.const_samples = None;
        }

        DescriptorParams {
            max_tree_len: overrides.max_tree_len.or(base.max_tree_len),
            input_len: overrides.input_len.or(base.input_len),
            output_len: overrides.output_len.or(base.output_len),
            const_prob: overrides.const_prob.or(base.const_prob),
            out_prob: overrides.out_prob.or(base.out_prob),
            depth2leaf_probs: overrides
                .depth2leaf_probs
                .clone()
                .or(base.depth2leaf_probs),
            max_layer_cnt: overrides.max_layer_cnt.or(base.max_layer_cnt),
            layer_leaf_prob: overrides.layer_leaf_prob.or(base.layer_leaf_prob),
            roulette_funcs: overrides.roulette_funcs.clone().or(base.roulette_funcs),
            using_funcs: overrides.using_funcs.clone().or(base.using_funcs),
            func_weights: overrides.func_weights.clone().or(base.func_weights),
            const_samples: overrides.const_samples.clone().or(base.const_samples),
            const_range: overrides.const_range.or(base.const_range),
            sample_cnt: overrides.sample_cnt.or(base.sample_cnt),
        }
    }
}

/// Immutable configuration governing random tree generation. Built once per
/// experiment; never mutated, only replaced via [`Descriptor::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    params: DescriptorParams,
    pub max_tree_len: usize,
    pub input_len: usize,
    pub output_len: usize,
    pub const_prob: f64,
    pub out_prob: f64,
    /// Probability that a node at depth `d` terminates as a leaf;
    /// non-decreasing, 1.0 at (and beyond) the last entry.
    pub depth2leaf_probs: Vec<f64>,
    /// Enabled function set, parallel to `roulette_funcs`.
    pub funcs: Vec<Func>,
    /// Cumulative selection distribution over `funcs`, ending at 1.0.
    pub roulette_funcs: Vec<f64>,
    /// Literal pool for Constant nodes.
    pub const_samples: Vec<f32>,
}

impl Descriptor {
    pub fn new(params: DescriptorParams) -> Result<Descriptor> {
        let max_tree_len = require_positive(params.max_tree_len, "max_tree_len")?;
        if max_tree_len > u16::MAX as usize {
            return Err(TreeGpError::Configuration(format!(
                "max_tree_len {max_tree_len} exceeds the node index range ({})",
                u16::MAX
            )));
        }
        let input_len = require_positive(params.input_len, "input_len")?;
        let output_len = require_positive(params.output_len.or(Some(1)), "output_len")?;

        let const_prob = params.const_prob.unwrap_or(0.5);
        let out_prob = params.out_prob.unwrap_or(0.0);
        check_prob(const_prob, "const_prob")?;
        check_prob(out_prob, "out_prob")?;

        let depth2leaf_probs = resolve_depth2leaf(&params)?;
        let (funcs, roulette_funcs) = resolve_roulette(&params)?;
        let const_samples = resolve_const_samples(&params)?;

        Ok(Descriptor {
            params,
            max_tree_len,
            input_len,
            output_len,
            const_prob,
            out_prob,
            depth2leaf_probs,
            funcs,
            roulette_funcs,
            const_samples,
        })
    }

    /// Return a new Descriptor with `overrides` merged in and every derived
    /// field recomputed. `self` is left untouched.
    pub fn update(&self, overrides: DescriptorParams) -> Result<Descriptor> {
        Descriptor::new(self.params.merged(&overrides))
    }

    /// Leaf probability at `depth`; 1.0 beyond the configured table.
    pub fn leaf_prob(&self, depth: usize) -> f64 {
        self.depth2leaf_probs
            .get(depth)
            .copied()
            .unwrap_or(1.0)
    }

    /// Draw a function according to the roulette distribution.
    pub fn sample_func<R: Rng>(&self, rng: &mut R) -> Func {
        let r = rng.gen::<f64>();
        let idx = self
            .roulette_funcs
            .iter()
            .position(|&c| r < c)
            .unwrap_or(self.funcs.len() - 1);
        self.funcs[idx]
    }

    /// Draw a constant from the literal pool.
    pub fn sample_const<R: Rng>(&self, rng: &mut R) -> f32 {
        self.const_samples[rng.gen_range(0..self.const_samples.len())]
    }

    /// Functions in the enabled set with the given arity.
    pub fn funcs_with_arity(&self, arity: usize) -> Vec<Func> {
        self.funcs
            .iter()
            .copied()
            .filter(|f| f.arity() == arity)
            .collect()
    }

    /// Largest arity in the enabled set.
    pub fn max_arity(&self) -> usize {
        self.funcs.iter().map(|f| f.arity()).max().unwrap_or(0)
    }
}

fn require_positive(value: Option<usize>, name: &str) -> Result<usize> {
    match value {
        Some(v) if v > 0 => Ok(v),
        Some(_) => Err(TreeGpError::Configuration(format!(
            "{name} must be positive"
        ))),
        None => Err(TreeGpError::Configuration(format!("{name} is required"))),
    }
}

fn check_prob(p: f64, name: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(TreeGpError::Configuration(format!(
            "{name} must be in [0, 1], got {p}"
        )));
    }
    Ok(())
}

fn resolve_depth2leaf(params: &DescriptorParams) -> Result<Vec<f64>> {
    let probs = if let Some(probs) = &params.depth2leaf_probs {
        probs.clone()
    } else {
        match (params.max_layer_cnt, params.layer_leaf_prob) {
            (Some(layers), Some(p)) if layers > 0 => {
                check_prob(p, "layer_leaf_prob")?;
                let mut probs = vec![p; layers];
                probs.push(1.0);
                probs
            }
            (Some(0), _) => {
                return Err(TreeGpError::Configuration(
                    "max_layer_cnt must be positive".to_string(),
                ))
            }
            _ => {
                return Err(TreeGpError::Configuration(
                    "either depth2leaf_probs or (max_layer_cnt, layer_leaf_prob) is required"
                        .to_string(),
                ))
            }
        }
    };

    if probs.is_empty() {
        return Err(TreeGpError::Configuration(
            "depth2leaf_probs must not be empty".to_string(),
        ));
    }
    for (d, &p) in probs.iter().enumerate() {
        check_prob(p, "depth2leaf_probs")?;
        if d > 0 && p < probs[d - 1] {
            return Err(TreeGpError::Configuration(
                "depth2leaf_probs must be non-decreasing".to_string(),
            ));
        }
    }
    if (probs[probs.len() - 1] - 1.0).abs() > PROB_TOL {
        return Err(TreeGpError::Configuration(
            "depth2leaf_probs must reach 1.0 at the maximum depth".to_string(),
        ));
    }
    Ok(probs)
}

fn resolve_roulette(params: &DescriptorParams) -> Result<(Vec<Func>, Vec<f64>)> {
    let funcs = match &params.using_funcs {
        Some(funcs) if !funcs.is_empty() => funcs.clone(),
        Some(_) => {
            return Err(TreeGpError::Configuration(
                "using_funcs must not be empty".to_string(),
            ))
        }
        None => {
            return Err(TreeGpError::Configuration(
                "either roulette_funcs or using_funcs is required".to_string(),
            ))
        }
    };

    let roulette = if let Some(roulette) = &params.roulette_funcs {
        if roulette.len() != funcs.len() {
            return Err(TreeGpError::Configuration(
                "roulette_funcs length must match using_funcs".to_string(),
            ));
        }
        for (i, &c) in roulette.iter().enumerate() {
            check_prob(c, "roulette_funcs")?;
            if i > 0 && c < roulette[i - 1] {
                return Err(TreeGpError::Configuration(
                    "roulette_funcs must be non-decreasing".to_string(),
                ));
            }
        }
        if (roulette[roulette.len() - 1] - 1.0).abs() > PROB_TOL {
            return Err(TreeGpError::Configuration(
                "roulette_funcs must end at 1.0".to_string(),
            ));
        }
        roulette.clone()
    } else {
        let weights = match &params.func_weights {
            Some(w) => {
                if w.len() != funcs.len() {
                    return Err(TreeGpError::Configuration(
                        "func_weights length must match using_funcs".to_string(),
                    ));
                }
                if w.iter().any(|&x| x < 0.0) {
                    return Err(TreeGpError::Configuration(
                        "func_weights must be non-negative".to_string(),
                    ));
                }
                w.clone()
            }
            None => vec![1.0; funcs.len()],
        };
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(TreeGpError::Configuration(
                "func_weights must have a positive sum".to_string(),
            ));
        }
        let mut acc = 0.0;
        let mut roulette: Vec<f64> = weights
            .iter()
            .map(|w| {
                acc += w / total;
                acc
            })
            .collect();
        // pin the tail against accumulated float error
        let last = roulette.len() - 1;
        roulette[last] = 1.0;
        roulette
    };

    Ok((funcs, roulette))
}

fn resolve_const_samples(params: &DescriptorParams) -> Result<Vec<f32>> {
    if let Some(samples) = &params.const_samples {
        if samples.is_empty() {
            return Err(TreeGpError::Configuration(
                "const_samples must not be empty".to_string(),
            ));
        }
        return Ok(samples.clone());
    }

    match (params.const_range, params.sample_cnt) {
        (Some((lo, hi)), Some(cnt)) if cnt > 0 => {
            if lo > hi {
                return Err(TreeGpError::Configuration(
                    "const_range lower bound must not exceed upper bound".to_string(),
                ));
            }
            if cnt == 1 {
                return Ok(vec![(lo + hi) / 2.0]);
            }
            let step = (hi - lo) / (cnt - 1) as f32;
            Ok((0..cnt).map(|i| lo + step * i as f32).collect())
        }
        (Some(_), Some(_)) => Err(TreeGpError::Configuration(
            "sample_cnt must be positive".to_string(),
        )),
        _ => Err(TreeGpError::Configuration(
            "either const_samples or (const_range, sample_cnt) is required".to_string(),
        )),
    }
}
