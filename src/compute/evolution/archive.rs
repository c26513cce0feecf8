//! In-memory generation history for each sub-problem.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::collaborators::MemoryStore;
use super::error::BoxError;
use crate::schema::{Candidate, Generation, ParentRef, SubProblemId};

/// Archive errors.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("{0} already has a seed generation")]
    AlreadySeeded(SubProblemId),
    #[error("{sub_problem} expects generation {expected}, got {found}")]
    OutOfOrder {
        sub_problem: SubProblemId,
        expected: usize,
        found: usize,
    },
    #[error("{sub_problem} has no candidate at {reference}")]
    UnknownCandidate {
        sub_problem: SubProblemId,
        reference: ParentRef,
    },
}

/// Append-only generation histories kept in memory.
///
/// Appends must arrive in index order, so a retried step whose generation
/// was already committed is rejected instead of duplicated.
#[derive(Debug, Default)]
pub struct GenerationArchive {
    histories: RwLock<HashMap<SubProblemId, Vec<Generation>>>,
}

impl GenerationArchive {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the externally supplied generation 0 for a sub-problem.
    pub async fn seed(
        &self,
        sub_problem: SubProblemId,
        candidates: Vec<Candidate>,
    ) -> Result<(), ArchiveError> {
        let mut histories = self.histories.write().await;
        let history = histories.entry(sub_problem).or_default();
        if !history.is_empty() {
            return Err(ArchiveError::AlreadySeeded(sub_problem));
        }
        log::debug!("Seeded {} with {} candidates", sub_problem, candidates.len());
        history.push(Generation::new(0, candidates));
        Ok(())
    }

    /// Every committed generation of a sub-problem, oldest first.
    pub async fn generations(&self, sub_problem: SubProblemId) -> Vec<Generation> {
        self.histories
            .read()
            .await
            .get(&sub_problem)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of committed generations.
    pub async fn generation_count(&self, sub_problem: SubProblemId) -> usize {
        self.histories
            .read()
            .await
            .get(&sub_problem)
            .map_or(0, Vec::len)
    }

    /// Sub-problems with at least one generation, in id order.
    pub async fn sub_problems(&self) -> Vec<SubProblemId> {
        let mut ids: Vec<_> = self.histories.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Look up a candidate by lineage reference.
    pub async fn get(&self, sub_problem: SubProblemId, reference: ParentRef) -> Option<Candidate> {
        self.histories
            .read()
            .await
            .get(&sub_problem)?
            .get(reference.generation)?
            .candidates
            .get(reference.index)
            .cloned()
    }

    /// Resolve the parents recorded in a candidate's lineage.
    pub async fn parents(&self, sub_problem: SubProblemId, candidate: &Candidate) -> Vec<Candidate> {
        let mut parents = Vec::new();
        for reference in [candidate.lineage.parent_a, candidate.lineage.parent_b]
            .into_iter()
            .flatten()
        {
            if let Some(parent) = self.get(sub_problem, reference).await {
                parents.push(parent);
            }
        }
        parents
    }

    /// Attach an externally computed rating to a committed candidate.
    pub async fn rate(
        &self,
        sub_problem: SubProblemId,
        reference: ParentRef,
        fitness: f64,
    ) -> Result<(), ArchiveError> {
        let mut histories = self.histories.write().await;
        let candidate = histories
            .get_mut(&sub_problem)
            .and_then(|h| h.get_mut(reference.generation))
            .and_then(|g| g.candidates.get_mut(reference.index))
            .ok_or(ArchiveError::UnknownCandidate {
                sub_problem,
                reference,
            })?;
        candidate.fitness = Some(fitness);
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for GenerationArchive {
    async fn latest_generation(
        &self,
        sub_problem: SubProblemId,
    ) -> Result<Option<Generation>, BoxError> {
        Ok(self
            .histories
            .read()
            .await
            .get(&sub_problem)
            .and_then(|h| h.last())
            .cloned())
    }

    async fn append_generation(
        &self,
        sub_problem: SubProblemId,
        generation: Generation,
    ) -> Result<(), BoxError> {
        let mut histories = self.histories.write().await;
        let history = histories.entry(sub_problem).or_default();
        if generation.index != history.len() {
            return Err(Box::new(ArchiveError::OutOfOrder {
                sub_problem,
                expected: history.len(),
                found: generation.index,
            }));
        }
        log::debug!(
            "Committed generation {} for {}",
            generation.index,
            sub_problem
        );
        history.push(generation);
        Ok(())
    }
}
