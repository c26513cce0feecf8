//! Variation operators: mutation, crossover and immigration.
//!
//! Content synthesis is delegated to external capabilities; these operators
//! decide what to ask for and stamp lineage on the results. All random draws
//! happen while planning, before any synthesis call is issued, so calls
//! within a phase can run concurrently without sharing the random source.

use futures::future::try_join_all;
use rand::Rng;

use super::collaborators::{CandidateGenerator, CandidateSynthesizer, ImmigrationContext};
use super::error::{EvolutionError, EvolutionResult, SynthesisOperation};
use super::selection::{BreedingPool, ParentSelector};
use crate::schema::{
    Candidate, Generation, Lineage, MutationRate, MutationRateProbabilities, SubProblemId,
};

/// Pick a mutation intensity according to the configured split.
pub fn choose_mutation_rate<R: Rng + ?Sized>(
    probabilities: &MutationRateProbabilities,
    rng: &mut R,
) -> MutationRate {
    let roll: f64 = rng.r#gen();
    if roll < probabilities.low {
        MutationRate::Low
    } else if roll < probabilities.low + probabilities.medium {
        MutationRate::Medium
    } else {
        MutationRate::High
    }
}

/// A planned mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationPlan {
    /// Parent position in the previous generation.
    pub parent: usize,
    /// Requested intensity.
    pub rate: MutationRate,
}

/// A planned crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossoverPlan {
    /// First parent position in the previous generation.
    pub parent_a: usize,
    /// Second parent position, always different from `parent_a`.
    pub parent_b: usize,
    /// Whether the offspring is additionally mutated at low rate.
    pub mutate_offspring: bool,
}

/// Draw parents and intensities for `count` mutations.
pub fn plan_mutations<R: Rng + ?Sized>(
    pool: &BreedingPool<'_>,
    selector: &ParentSelector,
    probabilities: &MutationRateProbabilities,
    count: usize,
    rng: &mut R,
) -> EvolutionResult<Vec<MutationPlan>> {
    (0..count)
        .map(|_| {
            let parent = selector.select(pool, rng)?;
            let rate = choose_mutation_rate(probabilities, rng);
            Ok(MutationPlan { parent, rate })
        })
        .collect()
}

/// Draw parent pairs and offspring mutation flags for `count` crossovers.
pub fn plan_crossovers<R: Rng + ?Sized>(
    pool: &BreedingPool<'_>,
    selector: &ParentSelector,
    mutation_probability: f64,
    count: usize,
    rng: &mut R,
) -> EvolutionResult<Vec<CrossoverPlan>> {
    (0..count)
        .map(|_| {
            let parent_a = selector.select(pool, rng)?;
            let parent_b = selector.select_excluding(pool, parent_a, rng)?;
            let mutate_offspring = rng.gen_bool(mutation_probability);
            Ok(CrossoverPlan {
                parent_a,
                parent_b,
                mutate_offspring,
            })
        })
        .collect()
}

/// Operators producing candidates for one new generation.
pub struct VariationOperators<'a> {
    synthesizer: &'a dyn CandidateSynthesizer,
    generator: &'a dyn CandidateGenerator,
    /// Index of the generation being built.
    generation: usize,
}

impl<'a> VariationOperators<'a> {
    /// Create operators for the generation with index `generation`.
    pub fn new(
        synthesizer: &'a dyn CandidateSynthesizer,
        generator: &'a dyn CandidateGenerator,
        generation: usize,
    ) -> Self {
        Self {
            synthesizer,
            generator,
            generation,
        }
    }

    /// Mutate one candidate of `previous`.
    pub async fn mutate(
        &self,
        previous: &Generation,
        plan: MutationPlan,
    ) -> EvolutionResult<Candidate> {
        let parent = &previous.candidates[plan.parent];
        log::debug!("Mutating '{}' at {} rate", parent.title, plan.rate);

        let mutant = self
            .synthesizer
            .mutate(parent, plan.rate)
            .await
            .map_err(|e| EvolutionError::synthesis(SynthesisOperation::Mutation, e))?;

        let lineage = Lineage::mutant(previous.parent_ref(plan.parent), plan.rate, self.generation);
        Ok(fresh(mutant, lineage))
    }

    /// Recombine two candidates of `previous`, optionally mutating the offspring.
    pub async fn crossover(
        &self,
        previous: &Generation,
        plan: CrossoverPlan,
    ) -> EvolutionResult<Candidate> {
        let parent_a = &previous.candidates[plan.parent_a];
        let parent_b = &previous.candidates[plan.parent_b];
        log::debug!("Recombining '{}' with '{}'", parent_a.title, parent_b.title);

        let mut offspring = self
            .synthesizer
            .recombine(parent_a, parent_b)
            .await
            .map_err(|e| EvolutionError::synthesis(SynthesisOperation::Crossover, e))?;

        let mutation_rate = if plan.mutate_offspring {
            offspring = self
                .synthesizer
                .mutate(&offspring, MutationRate::Low)
                .await
                .map_err(|e| EvolutionError::synthesis(SynthesisOperation::Mutation, e))?;
            Some(MutationRate::Low)
        } else {
            None
        };

        let lineage = Lineage::offspring(
            previous.parent_ref(plan.parent_a),
            previous.parent_ref(plan.parent_b),
            mutation_rate,
            self.generation,
        );
        Ok(fresh(offspring, lineage))
    }

    /// Run every mutation plan concurrently. Results keep plan order.
    pub async fn mutate_all(
        &self,
        previous: &Generation,
        plans: &[MutationPlan],
    ) -> EvolutionResult<Vec<Candidate>> {
        try_join_all(plans.iter().map(|&plan| self.mutate(previous, plan))).await
    }

    /// Run every crossover plan concurrently. Results keep plan order.
    pub async fn crossover_all(
        &self,
        previous: &Generation,
        plans: &[CrossoverPlan],
    ) -> EvolutionResult<Vec<Candidate>> {
        try_join_all(plans.iter().map(|&plan| self.crossover(previous, plan))).await
    }

    /// Generate exactly `count` immigrants in batches.
    ///
    /// Each call receives every title already placed or generated so far.
    /// Batches that add nothing count against `max_empty_batches`.
    pub async fn immigrate(
        &self,
        sub_problem: SubProblemId,
        mut seen_titles: Vec<String>,
        count: usize,
        max_empty_batches: usize,
    ) -> EvolutionResult<Vec<Candidate>> {
        let mut immigrants: Vec<Candidate> = Vec::with_capacity(count);
        let mut empty_batches = 0;

        while immigrants.len() < count {
            let context = ImmigrationContext {
                sub_problem,
                generation: self.generation,
                wanted: count - immigrants.len(),
            };
            let batch = self
                .generator
                .generate(&context, &seen_titles)
                .await
                .map_err(|e| EvolutionError::synthesis(SynthesisOperation::Immigration, e))?;

            if batch.candidates.is_empty() {
                empty_batches += 1;
                if empty_batches >= max_empty_batches {
                    return Err(EvolutionError::SynthesisFailure {
                        operation: SynthesisOperation::Immigration,
                        message: format!(
                            "generator returned {} empty batches with {} of {} immigrants produced",
                            empty_batches,
                            immigrants.len(),
                            count
                        ),
                    });
                }
                continue;
            }

            log::debug!("Received {} new candidates", batch.candidates.len());
            for candidate in batch.candidates {
                seen_titles.push(candidate.title.clone());
                let lineage = Lineage::immigrant(batch.seed_context.clone(), self.generation);
                immigrants.push(fresh(candidate, lineage));
            }
        }

        immigrants.truncate(count);
        Ok(immigrants)
    }
}

/// Strip per-generation annotations from a newly created candidate.
fn fresh(mut candidate: Candidate, lineage: Lineage) -> Candidate {
    candidate.fitness = None;
    candidate.similarity_group = None;
    candidate.reaped = false;
    candidate.lineage = lineage;
    candidate
}
