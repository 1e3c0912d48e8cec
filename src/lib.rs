//! Batched genetic programming over flat-buffer expression trees.
//!
//! Candidate programs are prefix node sequences annotated with subtree
//! sizes, packed population-wide into fixed-stride buffers so generation,
//! breeding and evaluation all run as uniform data-parallel transforms with
//! no per-individual control flow. Shape divergence between trees is handled
//! by size-skip addressing, not recursion.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod eval;
pub mod ops;
pub mod pipeline;
pub mod problem;
pub mod tree;

pub use algorithm::{GeneticProgramming, ParetoFront};
pub use config::RunConfig;
pub use error::{Result, TreeGpError};
pub use eval::Evaluation;
pub use ops::{
    CombinedMutation, Crossover, DefaultCrossover, DeleteMutation, HoistMutation, InsertMutation,
    LeafBiasedCrossover, MultiConstMutation, Mutation, PointMutation, RankSelection,
    RouletteSelection, Selection, SingleConstMutation, SubtreeMutation, TournamentSelection,
    TruncationSelection,
};
pub use pipeline::{BestIndividual, GenerationStats, StandardPipeline};
pub use problem::{Problem, SymbolicRegression};
pub use tree::{Descriptor, DescriptorParams, Forest, Func, Node, Tree};
