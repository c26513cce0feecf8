//! Candidate and generation types for evolving solution populations.
//!
//! A [`Candidate`] is one proposed solution for a sub-problem. Candidates are
//! grouped into fixed-size [`Generation`]s which are appended, never rewritten,
//! to a sub-problem's history.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a sub-problem whose population is evolved independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubProblemId(pub usize);

impl fmt::Display for SubProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-problem {}", self.0)
    }
}

/// One proposed solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Opaque identifier, stable within a generation.
    pub id: String,
    /// Title. Used as the de-duplication key for elite carry-over.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Free-form domain attributes (benefits, obstacles, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Externally computed rating (e.g. Elo). Read-only for the engine.
    #[serde(default)]
    pub fitness: Option<f64>,
    /// Cluster assignment for the generation this candidate lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_group: Option<SimilarityGroup>,
    /// Provenance, written once at creation.
    #[serde(default)]
    pub lineage: Lineage,
    /// Set by an upstream reaping stage; reaped candidates do not breed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reaped: bool,
}

impl Candidate {
    /// Create an unrated candidate.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            attributes: BTreeMap::new(),
            fitness: None,
            similarity_group: None,
            lineage: Lineage::default(),
            reaped: false,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the fitness.
    pub fn with_fitness(mut self, fitness: f64) -> Self {
        self.fitness = Some(fitness);
        self
    }

    /// Set the similarity group.
    pub fn with_group(mut self, cluster_index: usize, cluster_size: usize) -> Self {
        self.similarity_group = Some(SimilarityGroup {
            cluster_index,
            cluster_size,
        });
        self
    }

    /// Whether this candidate takes part in elite selection and breeding.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.reaped
    }

    /// Cluster index, if clustered.
    #[inline]
    pub fn cluster_index(&self) -> Option<usize> {
        self.similarity_group.map(|g| g.cluster_index)
    }

    /// Fitness used for ordering. Unrated candidates rank below everything.
    #[inline]
    pub fn rank_fitness(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }
}

/// Cluster membership computed for a single generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityGroup {
    /// Cluster index in discovery order.
    pub cluster_index: usize,
    /// Number of members in the cluster.
    pub cluster_size: usize,
}

/// Intensity of a requested mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationRate {
    Low,
    Medium,
    High,
}

impl fmt::Display for MutationRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(name)
    }
}

/// Reference to a candidate in a committed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    /// Generation index.
    pub generation: usize,
    /// Position within that generation.
    pub index: usize,
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.generation, self.index)
    }
}

/// Provenance of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lineage {
    /// First (or only) parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_a: Option<ParentRef>,
    /// Second parent, for crossover offspring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_b: Option<ParentRef>,
    /// Mutation applied at creation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_rate: Option<MutationRate>,
    /// Generation the candidate was created for.
    #[serde(default)]
    pub generation: usize,
    /// Fresh context an immigrant was generated from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seed_context: Vec<String>,
}

impl Lineage {
    /// Lineage of a mutant.
    pub fn mutant(parent: ParentRef, rate: MutationRate, generation: usize) -> Self {
        Self {
            parent_a: Some(parent),
            mutation_rate: Some(rate),
            generation,
            ..Default::default()
        }
    }

    /// Lineage of a crossover offspring.
    pub fn offspring(
        parent_a: ParentRef,
        parent_b: ParentRef,
        mutation_rate: Option<MutationRate>,
        generation: usize,
    ) -> Self {
        Self {
            parent_a: Some(parent_a),
            parent_b: Some(parent_b),
            mutation_rate,
            generation,
            seed_context: Vec::new(),
        }
    }

    /// Lineage of an immigrant.
    pub fn immigrant(seed_context: Vec<String>, generation: usize) -> Self {
        Self {
            generation,
            seed_context,
            ..Default::default()
        }
    }
}

/// One committed snapshot of a sub-problem's population.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Generation {
    /// Position in the sub-problem's history. Index 0 is the seed generation.
    pub index: usize,
    /// Candidates in order.
    pub candidates: Vec<Candidate>,
}

impl Generation {
    /// Create a generation.
    pub fn new(index: usize, candidates: Vec<Candidate>) -> Self {
        Self { index, candidates }
    }

    /// Number of candidates.
    #[inline]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the generation has no candidates.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Positions of candidates that are not reaped.
    pub fn active_indices(&self) -> Vec<usize> {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_active())
            .map(|(i, _)| i)
            .collect()
    }

    /// Reference to the candidate at `index` in this generation.
    #[inline]
    pub fn parent_ref(&self, index: usize) -> ParentRef {
        ParentRef {
            generation: self.index,
            index,
        }
    }

    /// Remove every cluster assignment.
    pub fn clear_similarity_groups(&mut self) {
        for candidate in &mut self.candidates {
            candidate.similarity_group = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_ref_display() {
        let r = ParentRef {
            generation: 3,
            index: 17,
        };
        assert_eq!(r.to_string(), "3:17");
    }

    #[test]
    fn test_active_indices_skip_reaped() {
        let mut reaped = Candidate::new("b", "B");
        reaped.reaped = true;
        let generation = Generation::new(
            0,
            vec![Candidate::new("a", "A"), reaped, Candidate::new("c", "C")],
        );
        assert_eq!(generation.active_indices(), vec![0, 2]);
    }

    #[test]
    fn test_candidate_defaults_from_minimal_json() {
        let json = r#"{"id": "x", "title": "Community gardens"}"#;
        let candidate: Candidate = serde_json::from_str(json).unwrap();
        assert_eq!(candidate.fitness, None);
        assert!(candidate.similarity_group.is_none());
        assert!(!candidate.reaped);
        assert_eq!(candidate.lineage, Lineage::default());
    }

    #[test]
    fn test_mutation_rate_serialization() {
        let json = serde_json::to_string(&MutationRate::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }

    #[test]
    fn test_unrated_ranks_lowest() {
        let unrated = Candidate::new("a", "A");
        let rated = Candidate::new("b", "B").with_fitness(-1000.0);
        assert!(unrated.rank_fitness() < rated.rank_fitness());
    }
}
