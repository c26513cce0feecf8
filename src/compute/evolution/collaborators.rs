//! Contracts for the external capabilities an evolution step calls.
//!
//! Implementations own their transport, retry, backoff and timeouts. The
//! engine only distinguishes success from failure.

use async_trait::async_trait;

use super::error::BoxError;
use crate::schema::{Candidate, Generation, MutationRate, SubProblemId};

/// Produces embedding vectors used for similarity clustering.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one candidate.
    async fn embed(&self, candidate: &Candidate) -> Result<Vec<f32>, BoxError>;
}

/// Synthesizes variants of existing candidates.
///
/// Lineage on returned candidates is overwritten by the caller.
#[async_trait]
pub trait CandidateSynthesizer: Send + Sync {
    /// Produce a mutated copy of `candidate` at the given intensity.
    async fn mutate(&self, candidate: &Candidate, rate: MutationRate)
    -> Result<Candidate, BoxError>;

    /// Produce one offspring combining `parent_a` and `parent_b`.
    async fn recombine(
        &self,
        parent_a: &Candidate,
        parent_b: &Candidate,
    ) -> Result<Candidate, BoxError>;
}

/// What an immigration call is generating for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmigrationContext {
    /// Sub-problem being evolved.
    pub sub_problem: SubProblemId,
    /// Index of the generation under construction.
    pub generation: usize,
    /// Immigrants still needed.
    pub wanted: usize,
}

/// A batch of wholly new candidates.
#[derive(Debug, Clone, Default)]
pub struct ImmigrantBatch {
    /// Generated candidates.
    pub candidates: Vec<Candidate>,
    /// Fresh context (e.g. source URLs) the batch was generated from.
    pub seed_context: Vec<String>,
}

/// Generates candidates from fresh context unrelated to the current population.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    /// Generate a batch. `already_seen_titles` lists titles the batch should avoid.
    async fn generate(
        &self,
        context: &ImmigrationContext,
        already_seen_titles: &[String],
    ) -> Result<ImmigrantBatch, BoxError>;
}

/// Persistence boundary. Appends are all-or-nothing.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Latest committed generation for a sub-problem.
    async fn latest_generation(&self, sub_problem: SubProblemId)
    -> Result<Option<Generation>, BoxError>;

    /// Append a generation. Its `index` must equal the current history length.
    async fn append_generation(
        &self,
        sub_problem: SubProblemId,
        generation: Generation,
    ) -> Result<(), BoxError>;
}
