//! One generation step for one sub-population.
//!
//! The step runs its phases strictly in order because each phase's capacity
//! depends on how many slots earlier phases filled:
//!
//! 1. **Init**: optionally re-cluster the previous generation.
//! 2. **EliteSelection**: niche elites, then top-N elites.
//! 3. **Pruning**: cap each cluster's share of the breeding pool.
//! 4. **Mutation**: mutants of tournament-selected parents.
//! 5. **Crossover**: offspring of two distinct tournament-selected parents.
//! 6. **Immigration**: wholly new candidates fill the remaining slots.
//! 7. **Commit**: the assembled generation must be exactly `population_size`.
//!
//! Any error before Commit aborts the step; nothing is written to the store.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::collaborators::{CandidateGenerator, CandidateSynthesizer, EmbeddingProvider, MemoryStore};
use super::elites::select_elites;
use super::error::{EvolutionError, EvolutionResult};
use super::pruning::prune_clusters;
use super::rng::EvolutionRng;
use super::selection::{BreedingPool, ParentSelector};
use super::variation::{VariationOperators, plan_crossovers, plan_mutations};
use crate::compute::clustering::{ClusterStats, SimilarityClusterer};
use crate::schema::{Candidate, EvolutionConfig, Generation, SubProblemId};

/// Current phase of a generation step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Loading and clustering the previous generation.
    #[default]
    Init,
    /// Carrying elites over.
    EliteSelection,
    /// Building the breeding pool.
    Pruning,
    /// Creating mutants.
    Mutation,
    /// Creating crossover offspring.
    Crossover,
    /// Generating immigrants.
    Immigration,
    /// Checking and handing over the new generation.
    Commit,
}

/// Summary of one completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Sub-problem evolved.
    pub sub_problem: SubProblemId,
    /// Index of the new generation.
    pub generation_index: usize,
    /// Niche elites carried over.
    pub niche_elites: usize,
    /// Top-N elites carried over.
    pub top_elites: usize,
    /// Mutants created.
    pub mutants: usize,
    /// Crossover offspring created.
    pub crossovers: usize,
    /// Immigrants generated.
    pub immigrants: usize,
    /// Clusters found in the previous generation.
    pub clusters: usize,
    /// Breeding pool size after pruning.
    pub breeding_pool: usize,
}

/// A new generation together with its step report.
#[derive(Debug, Clone)]
pub struct EvolvedGeneration {
    pub generation: Generation,
    pub report: StepReport,
}

/// Accumulates the next generation while enforcing its capacity.
struct GenerationBuilder {
    index: usize,
    capacity: usize,
    candidates: Vec<Candidate>,
    phase: EvolutionPhase,
}

impl GenerationBuilder {
    fn new(index: usize, capacity: usize) -> Self {
        Self {
            index,
            capacity,
            candidates: Vec::with_capacity(capacity),
            phase: EvolutionPhase::Init,
        }
    }

    fn enter(&mut self, phase: EvolutionPhase) {
        log::debug!(
            "Generation {}: entering {:?} with {} of {} slots filled",
            self.index,
            phase,
            self.candidates.len(),
            self.capacity
        );
        self.phase = phase;
    }

    fn remaining(&self) -> EvolutionResult<usize> {
        self.capacity
            .checked_sub(self.candidates.len())
            .ok_or_else(|| {
                EvolutionError::CapacityViolation(format!(
                    "{} candidates exceed capacity {} during {:?}",
                    self.candidates.len(),
                    self.capacity,
                    self.phase
                ))
            })
    }

    fn extend(&mut self, candidates: Vec<Candidate>) -> EvolutionResult<()> {
        let remaining = self.remaining()?;
        if candidates.len() > remaining {
            return Err(EvolutionError::CapacityViolation(format!(
                "{:?} produced {} candidates with only {} slots left",
                self.phase,
                candidates.len(),
                remaining
            )));
        }
        self.candidates.extend(candidates);
        Ok(())
    }

    fn titles(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.title.clone()).collect()
    }

    fn finish(mut self) -> EvolutionResult<Generation> {
        self.enter(EvolutionPhase::Commit);
        if self.candidates.len() != self.capacity {
            return Err(EvolutionError::CapacityViolation(format!(
                "generation {} has {} candidates, expected {}",
                self.index,
                self.candidates.len(),
                self.capacity
            )));
        }
        Ok(Generation::new(self.index, self.candidates))
    }
}

/// Builds the next generation of one sub-population.
pub struct PopulationEvolver<'a> {
    config: &'a EvolutionConfig,
    synthesizer: &'a dyn CandidateSynthesizer,
    generator: &'a dyn CandidateGenerator,
    clusterer: Option<&'a SimilarityClusterer>,
}

impl<'a> PopulationEvolver<'a> {
    /// Create an evolver that uses the previous generation's existing groups.
    pub fn new(
        config: &'a EvolutionConfig,
        synthesizer: &'a dyn CandidateSynthesizer,
        generator: &'a dyn CandidateGenerator,
    ) -> Self {
        Self {
            config,
            synthesizer,
            generator,
            clusterer: None,
        }
    }

    /// Re-cluster the previous generation during Init.
    pub fn with_clusterer(mut self, clusterer: Option<&'a SimilarityClusterer>) -> Self {
        self.clusterer = clusterer;
        self
    }

    /// Produce the generation following `previous`.
    ///
    /// `previous` is a working copy; cluster assignments made during Init
    /// live only on it.
    pub async fn evolve(
        &self,
        sub_problem: SubProblemId,
        mut previous: Generation,
        rng: &mut EvolutionRng,
    ) -> EvolutionResult<EvolvedGeneration> {
        let budget = self.config.budget();
        let mut builder = GenerationBuilder::new(previous.index + 1, budget.population_size);
        log::info!(
            "Evolving {} from generation {} ({} candidates)",
            sub_problem,
            previous.index,
            previous.len()
        );

        // Init
        let clusters = match self.clusterer {
            Some(clusterer) => clusterer.assign(&mut previous.candidates).await,
            None => ClusterStats::from_candidates(&previous.candidates),
        }
        .cluster_count;
        let active = previous.active_indices();

        builder.enter(EvolutionPhase::EliteSelection);
        let mut used_titles = HashSet::new();
        let elites = select_elites(
            &previous.candidates,
            &active,
            self.config.elite_fitness_floor,
            budget.elite_limit,
            builder.remaining()?,
            &mut used_titles,
        );
        builder.extend(
            elites
                .positions()
                .map(|p| previous.candidates[p].clone())
                .collect(),
        )?;
        log::info!(
            "Carried over {} niche elites and {} top elites",
            elites.niche.len(),
            elites.top.len()
        );

        builder.enter(EvolutionPhase::Pruning);
        let members = prune_clusters(
            &previous.candidates,
            &active,
            self.config.per_cluster_breeding_cap,
        );
        let pool = BreedingPool::new(&previous.candidates, members);
        let selector = ParentSelector::new(self.config.tournament_size);
        let operators = VariationOperators::new(self.synthesizer, self.generator, builder.index);

        builder.enter(EvolutionPhase::Mutation);
        let mutation_count = budget.mutation_count.min(builder.remaining()?);
        let plans = plan_mutations(
            &pool,
            &selector,
            &self.config.mutation_rate_probabilities,
            mutation_count,
            rng,
        )?;
        let mutants = operators.mutate_all(&previous, &plans).await?;
        let mutant_count = mutants.len();
        builder.extend(mutants)?;

        builder.enter(EvolutionPhase::Crossover);
        let crossover_count = budget.crossover_count.min(builder.remaining()?);
        if crossover_count < budget.crossover_count {
            log::debug!(
                "Crossover count clamped from {} to {}",
                budget.crossover_count,
                crossover_count
            );
        }
        let plans = plan_crossovers(
            &pool,
            &selector,
            self.config.crossover_mutation_probability,
            crossover_count,
            rng,
        )?;
        let offspring = operators.crossover_all(&previous, &plans).await?;
        let offspring_count = offspring.len();
        builder.extend(offspring)?;

        builder.enter(EvolutionPhase::Immigration);
        let immigration_count = builder.remaining()?;
        if immigration_count < budget.planned_immigration_count {
            log::warn!(
                "Only {} immigrant slots left for {}, {} planned",
                immigration_count,
                sub_problem,
                budget.planned_immigration_count
            );
        }
        let immigrants = operators
            .immigrate(
                sub_problem,
                builder.titles(),
                immigration_count,
                self.config.max_immigration_batches,
            )
            .await?;
        let immigrant_count = immigrants.len();
        builder.extend(immigrants)?;

        let generation = builder.finish()?;
        log::info!(
            "New generation {} for {} has {} candidates",
            generation.index,
            sub_problem,
            generation.len()
        );

        let report = StepReport {
            sub_problem,
            generation_index: generation.index,
            niche_elites: elites.niche.len(),
            top_elites: elites.top.len(),
            mutants: mutant_count,
            crossovers: offspring_count,
            immigrants: immigrant_count,
            clusters,
            breeding_pool: pool.len(),
        };
        Ok(EvolvedGeneration { generation, report })
    }
}

/// Evolution engine holding the injected collaborators.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    synthesizer: Arc<dyn CandidateSynthesizer>,
    generator: Arc<dyn CandidateGenerator>,
    store: Arc<dyn MemoryStore>,
    clusterer: Option<SimilarityClusterer>,
}

impl EvolutionEngine {
    /// Create an engine after validating `config`.
    pub fn new(
        config: EvolutionConfig,
        synthesizer: Arc<dyn CandidateSynthesizer>,
        generator: Arc<dyn CandidateGenerator>,
        store: Arc<dyn MemoryStore>,
    ) -> EvolutionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            synthesizer,
            generator,
            store,
            clusterer: None,
        })
    }

    /// Cluster each previous generation with embeddings from `provider`.
    pub fn with_embeddings(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.clusterer = Some(SimilarityClusterer::new(
            provider,
            self.config.clustering.clone(),
        ));
        self
    }

    /// Use a preconfigured clusterer.
    pub fn with_clusterer(mut self, clusterer: SimilarityClusterer) -> Self {
        self.clusterer = Some(clusterer);
        self
    }

    /// Get configuration.
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Evolve one sub-problem by one generation and commit the result.
    pub async fn evolve_sub_problem(
        &self,
        sub_problem: SubProblemId,
        rng: &mut EvolutionRng,
    ) -> EvolutionResult<StepReport> {
        let previous = self
            .store
            .latest_generation(sub_problem)
            .await
            .map_err(|e| EvolutionError::Store(e.to_string()))?
            .ok_or(EvolutionError::MissingGeneration(sub_problem))?;

        let evolver = PopulationEvolver::new(
            &self.config,
            self.synthesizer.as_ref(),
            self.generator.as_ref(),
        )
        .with_clusterer(self.clusterer.as_ref());
        let EvolvedGeneration { generation, report } =
            evolver.evolve(sub_problem, previous, rng).await?;

        self.store
            .append_generation(sub_problem, generation)
            .await
            .map_err(|e| EvolutionError::Store(e.to_string()))?;
        Ok(report)
    }
}
