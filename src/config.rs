use crate::error::{Result, TreeGpError};
use crate::tree::Func;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Run configuration for the demo binary, loadable from TOML. Descriptor and
/// operator constructors re-validate their own parameter groups; this only
/// checks what the pipeline itself needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub population_size: usize,
    pub generation_limit: usize,
    pub seed: u64,

    pub max_tree_len: usize,
    pub max_layer_cnt: usize,
    pub layer_leaf_prob: f64,
    pub const_prob: f64,
    pub using_funcs: Vec<Func>,
    pub const_samples: Vec<f32>,

    pub mutation_rate: f64,
    /// Layer count for the mutation descriptor; shallower than generation.
    pub mutation_layer_cnt: usize,
    pub survival_rate: f64,
    pub elite_rate: f64,

    pub num_data: usize,
    pub lower_bound: f32,
    pub upper_bound: f32,

    pub enable_pareto_front: bool,
    /// Where to write the JSON run summary; `None` skips the dump.
    pub summary_path: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            population_size: 1000,
            generation_limit: 50,
            seed: 0,
            max_tree_len: 128,
            max_layer_cnt: 6,
            layer_leaf_prob: 0.2,
            const_prob: 0.5,
            using_funcs: vec![Func::Add, Func::Sub, Func::Mul, Func::Div],
            const_samples: vec![-1.0, 0.0, 1.0],
            mutation_rate: 0.2,
            mutation_layer_cnt: 3,
            survival_rate: 0.3,
            elite_rate: 0.01,
            num_data: 1000,
            lower_bound: -5.0,
            upper_bound: 5.0,
            enable_pareto_front: true,
            summary_path: None,
        }
    }
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RunConfig> {
        let text = std::fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size < 2 {
            return Err(TreeGpError::Configuration(
                "population_size must be at least 2".to_string(),
            ));
        }
        if self.generation_limit == 0 {
            return Err(TreeGpError::Configuration(
                "generation_limit must be positive".to_string(),
            ));
        }
        if self.num_data == 0 {
            return Err(TreeGpError::Configuration(
                "num_data must be positive".to_string(),
            ));
        }
        if !(self.lower_bound < self.upper_bound) {
            return Err(TreeGpError::Configuration(format!(
                "sampling bounds [{}, {}] are empty",
                self.lower_bound, self.upper_bound
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RunConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: RunConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.population_size, config.population_size);
        assert_eq!(parsed.using_funcs, config.using_funcs);
    }

    #[test]
    fn test_bad_values_rejected() {
        let mut config = RunConfig::default();
        config.population_size = 1;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.lower_bound = 1.0;
        config.upper_bound = -1.0;
        assert!(config.validate().is_err());
    }
}
