//! Tournament parent selection.

use rand::Rng;
use rand::seq::index::sample;

use super::error::{EvolutionError, EvolutionResult};
use crate::schema::Candidate;

/// Candidates eligible to become parents.
#[derive(Debug, Clone)]
pub struct BreedingPool<'a> {
    generation: &'a [Candidate],
    members: Vec<usize>,
}

impl<'a> BreedingPool<'a> {
    /// Create a pool over `members` (positions in `generation`).
    pub fn new(generation: &'a [Candidate], members: Vec<usize>) -> Self {
        Self {
            generation,
            members,
        }
    }

    /// Number of members.
    #[inline]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the pool is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member positions.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Candidate at a generation position.
    #[inline]
    pub fn candidate(&self, position: usize) -> &'a Candidate {
        &self.generation[position]
    }
}

/// Tournament selection over a breeding pool by fitness.
#[derive(Debug, Clone, Copy)]
pub struct ParentSelector {
    tournament_size: usize,
}

impl ParentSelector {
    /// Create with a tournament size.
    pub fn new(tournament_size: usize) -> Self {
        Self { tournament_size }
    }

    /// Draw `tournament_size` distinct members and return the fittest.
    ///
    /// Returns the winner's position in the generation.
    pub fn select<R: Rng + ?Sized>(
        &self,
        pool: &BreedingPool<'_>,
        rng: &mut R,
    ) -> EvolutionResult<usize> {
        if pool.len() < self.tournament_size || pool.is_empty() {
            return Err(EvolutionError::InsufficientPopulation(format!(
                "breeding pool of {} cannot hold a tournament of {}",
                pool.len(),
                self.tournament_size
            )));
        }
        Ok(self.tournament(pool, pool.members(), self.tournament_size, rng))
    }

    /// Select a parent different from `excluded`.
    ///
    /// Draws only among the other members; the tournament shrinks when fewer
    /// than `tournament_size` of them remain.
    pub fn select_excluding<R: Rng + ?Sized>(
        &self,
        pool: &BreedingPool<'_>,
        excluded: usize,
        rng: &mut R,
    ) -> EvolutionResult<usize> {
        let others: Vec<usize> = pool
            .members()
            .iter()
            .copied()
            .filter(|&p| p != excluded)
            .collect();
        if others.is_empty() {
            return Err(EvolutionError::InsufficientPopulation(format!(
                "crossover needs 2 distinct parents, breeding pool has {}",
                pool.len()
            )));
        }
        let size = self.tournament_size.min(others.len());
        Ok(self.tournament(pool, &others, size, rng))
    }

    fn tournament<R: Rng + ?Sized>(
        &self,
        pool: &BreedingPool<'_>,
        entrants: &[usize],
        size: usize,
        rng: &mut R,
    ) -> usize {
        let mut winner = None;
        let mut best = f64::NEG_INFINITY;
        for drawn in sample(rng, entrants.len(), size) {
            let position = entrants[drawn];
            let fitness = pool.candidate(position).rank_fitness();
            // Strict comparison keeps the first-drawn on ties
            if winner.is_none() || fitness > best {
                winner = Some(position);
                best = fitness;
            }
        }
        winner.unwrap_or(entrants[0])
    }
}
