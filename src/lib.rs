//! Solution evolution - Generational search over candidate solutions.
//!
//! This crate evolves populations of candidate solutions, one population per
//! sub-problem. Each generation keeps elites, breeds mutants and crossover
//! offspring from a diversity-pruned pool, and fills the remaining slots with
//! immigrants generated from fresh context. Content synthesis, embeddings,
//! fitness and persistence are external collaborators behind async traits.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Candidate, lineage and generation types plus configuration
//! - `compute`: Similarity clustering and the evolution engine
//!
//! # Example
//!
//! ```rust
//! use solution_evolution::schema::EvolutionConfig;
//!
//! let config = EvolutionConfig {
//!     population_size: 10,
//!     elite_fraction: 0.2,
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//!
//! let budget = config.budget();
//! assert_eq!(budget.elite_limit, 2);
//! assert_eq!(budget.mutation_count, 4);
//! assert_eq!(budget.crossover_count, 1);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{
    EvolutionCoordinator, EvolutionEngine, EvolutionError, EvolutionRng, GenerationArchive,
};
pub use schema::{Candidate, EvolutionConfig, Generation, SubProblemId};
