//! Generational evolution of candidate-solution populations.
//!
//! Each sub-problem owns an append-only history of fixed-size generations.
//! One evolution step turns the latest generation into the next one by
//! combining:
//!
//! - **Elites** (`elites`): niche elites (best per similarity cluster) and
//!   top-N elites carried over unchanged
//! - **Pruning** (`pruning`): a per-cluster cap on the breeding pool
//! - **Selection** (`selection`): tournament selection of parents
//! - **Variation** (`variation`): mutation, crossover and immigration, each
//!   delegating content synthesis to an external collaborator
//! - **Evolver** (`evolver`): the ordered phases of one step plus the
//!   [`EvolutionEngine`] that loads, evolves and commits
//! - **Coordinator** (`coordinator`): concurrent steps across sub-problems
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use solution_evolution::compute::evolution::{
//!     CandidateGenerator, CandidateSynthesizer, EvolutionCoordinator, EvolutionEngine,
//!     EvolutionRng, GenerationArchive,
//! };
//! use solution_evolution::schema::{EvolutionConfig, SubProblemId};
//!
//! # async fn run(
//! #     synthesizer: Arc<dyn CandidateSynthesizer>,
//! #     generator: Arc<dyn CandidateGenerator>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(GenerationArchive::new());
//! let config = EvolutionConfig::default();
//! let mut rng = EvolutionRng::from_seed_option(config.random_seed);
//!
//! let engine = EvolutionEngine::new(config, synthesizer, generator, store)?;
//! let coordinator = EvolutionCoordinator::new(Arc::new(engine));
//! let report = coordinator
//!     .run(&[SubProblemId(0), SubProblemId(1)], &mut rng)
//!     .await;
//! for (sub_problem, error) in report.failed() {
//!     eprintln!("{}: {}", sub_problem, error);
//! }
//! # Ok(())
//! # }
//! ```

mod archive;
mod collaborators;
mod coordinator;
mod elites;
mod error;
mod evolver;
mod pruning;
mod rng;
mod selection;
mod variation;

#[cfg(test)]
pub(crate) mod testing;

pub use archive::{ArchiveError, GenerationArchive};
pub use collaborators::{
    CandidateGenerator, CandidateSynthesizer, EmbeddingProvider, ImmigrantBatch,
    ImmigrationContext, MemoryStore,
};
pub use coordinator::{CoordinatorReport, EvolutionCoordinator, SubProblemOutcome};
pub use elites::{EliteSelection, niche_elites, select_elites, top_elites};
pub use error::{BoxError, EvolutionError, EvolutionResult, SynthesisOperation};
pub use evolver::{EvolutionEngine, EvolutionPhase, EvolvedGeneration, PopulationEvolver, StepReport};
pub use pruning::prune_clusters;
pub use rng::EvolutionRng;
pub use selection::{BreedingPool, ParentSelector};
pub use variation::{
    CrossoverPlan, MutationPlan, VariationOperators, choose_mutation_rate, plan_crossovers,
    plan_mutations,
};
