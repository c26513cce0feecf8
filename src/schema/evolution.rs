//! Evolution configuration types for generation-to-generation population steps.
//!
//! All fractions are relative to `population_size`. They are not required to
//! sum to one: immigration absorbs whatever capacity remains after elites,
//! mutants and crossover offspring are placed.

use serde::{Deserialize, Serialize};

/// Top-level configuration for evolving sub-problem populations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Exact number of candidates in every generation produced.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Fraction of the population carried over as top-N elites.
    #[serde(default = "default_elite_fraction")]
    pub elite_fraction: f64,
    /// Minimum fitness for a candidate to qualify as a niche elite.
    #[serde(default = "default_elite_fitness_floor")]
    pub elite_fitness_floor: f64,
    /// Fraction of the population produced by mutation.
    #[serde(default = "default_mutation_offspring_fraction")]
    pub mutation_offspring_fraction: f64,
    /// Fraction of the population produced by crossover.
    #[serde(default = "default_crossover_fraction")]
    pub crossover_fraction: f64,
    /// Planned fraction of immigrants. Immigration always fills the remaining
    /// capacity; this only flags configurations that starve novelty.
    #[serde(default = "default_immigration_fraction")]
    pub immigration_fraction: f64,
    /// Probability that a crossover offspring is additionally mutated at low rate.
    #[serde(default = "default_crossover_mutation_probability")]
    pub crossover_mutation_probability: f64,
    /// Split between mutation intensities.
    #[serde(default)]
    pub mutation_rate_probabilities: MutationRateProbabilities,
    /// Candidates drawn per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Maximum members per cluster admitted to the breeding pool.
    #[serde(default = "default_per_cluster_breeding_cap")]
    pub per_cluster_breeding_cap: usize,
    /// Similarity clustering settings.
    #[serde(default)]
    pub clustering: ClusteringConfig,
    /// Sub-population steps run at the same time.
    #[serde(default = "default_max_concurrent_sub_populations")]
    pub max_concurrent_sub_populations: usize,
    /// Sub-problems processed per coordinator run (first N). `None` processes all.
    #[serde(default = "default_max_sub_problems")]
    pub max_sub_problems: Option<usize>,
    /// Generator calls allowed to come back without new candidates before
    /// immigration gives up.
    #[serde(default = "default_max_immigration_batches")]
    pub max_immigration_batches: usize,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            elite_fraction: default_elite_fraction(),
            elite_fitness_floor: default_elite_fitness_floor(),
            mutation_offspring_fraction: default_mutation_offspring_fraction(),
            crossover_fraction: default_crossover_fraction(),
            immigration_fraction: default_immigration_fraction(),
            crossover_mutation_probability: default_crossover_mutation_probability(),
            mutation_rate_probabilities: MutationRateProbabilities::default(),
            tournament_size: default_tournament_size(),
            per_cluster_breeding_cap: default_per_cluster_breeding_cap(),
            clustering: ClusteringConfig::default(),
            max_concurrent_sub_populations: default_max_concurrent_sub_populations(),
            max_sub_problems: default_max_sub_problems(),
            max_immigration_batches: default_max_immigration_batches(),
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    80
}
fn default_elite_fraction() -> f64 {
    0.1
}
fn default_elite_fitness_floor() -> f64 {
    850.0
}
fn default_mutation_offspring_fraction() -> f64 {
    0.4
}
fn default_crossover_fraction() -> f64 {
    0.1
}
fn default_immigration_fraction() -> f64 {
    0.4
}
fn default_crossover_mutation_probability() -> f64 {
    0.1
}
fn default_tournament_size() -> usize {
    7
}
fn default_per_cluster_breeding_cap() -> usize {
    5
}
fn default_max_concurrent_sub_populations() -> usize {
    7
}
fn default_max_sub_problems() -> Option<usize> {
    Some(7)
}
fn default_max_immigration_batches() -> usize {
    10
}

/// Probabilities of each mutation intensity. Must sum to one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MutationRateProbabilities {
    /// Probability of a low-rate mutation.
    pub low: f64,
    /// Probability of a medium-rate mutation.
    pub medium: f64,
    /// Probability of a high-rate mutation.
    pub high: f64,
}

impl Default for MutationRateProbabilities {
    fn default() -> Self {
        Self {
            low: 0.4,
            medium: 0.4,
            high: 0.2,
        }
    }
}

/// Similarity clustering configuration.
///
/// Radius and minimum points are tuned for a specific embedding model and
/// population size; they have no universally good values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Neighborhood radius in projected space.
    #[serde(default = "default_cluster_radius")]
    pub radius: f64,
    /// Neighbors (including the point itself) required for a core point.
    #[serde(default = "default_cluster_min_points")]
    pub min_points: usize,
    /// Dimensionality after projection.
    #[serde(default = "default_projection_dimensions")]
    pub projection_dimensions: usize,
    /// Power iterations per principal component.
    #[serde(default = "default_power_iterations")]
    pub power_iterations: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            radius: default_cluster_radius(),
            min_points: default_cluster_min_points(),
            projection_dimensions: default_projection_dimensions(),
            power_iterations: default_power_iterations(),
        }
    }
}

fn default_cluster_radius() -> f64 {
    0.07
}
fn default_cluster_min_points() -> usize {
    12
}
fn default_projection_dimensions() -> usize {
    2
}
fn default_power_iterations() -> usize {
    200
}

/// Per-generation slot plan derived from the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationBudget {
    /// Target generation size.
    pub population_size: usize,
    /// Upper bound on top-N elites.
    pub elite_limit: usize,
    /// Mutants requested before clamping.
    pub mutation_count: usize,
    /// Crossover offspring requested before clamping.
    pub crossover_count: usize,
    /// Immigrants planned by `immigration_fraction`.
    pub planned_immigration_count: usize,
}

impl EvolutionConfig {
    /// Slot plan for one generation.
    pub fn budget(&self) -> GenerationBudget {
        let size = self.population_size;
        GenerationBudget {
            population_size: size,
            elite_limit: fraction_of(size, self.elite_fraction),
            mutation_count: fraction_of(size, self.mutation_offspring_fraction),
            crossover_count: fraction_of(size, self.crossover_fraction),
            planned_immigration_count: fraction_of(size, self.immigration_fraction),
        }
    }
}

/// `floor(size * fraction)`.
fn fraction_of(size: usize, fraction: f64) -> usize {
    (size as f64 * fraction).floor() as usize
}

// ============================================================================
// Validation
// ============================================================================

/// Evolution configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("{name} must be within [0, 1], got {value}")]
    FractionOutOfRange { name: &'static str, value: f64 },
    #[error("Mutation rate probabilities must sum to 1, got {0}")]
    MutationRatesNotNormalized(f64),
    #[error("Tournament size must be positive")]
    InvalidTournamentSize,
    #[error("Per-cluster breeding cap must be positive")]
    InvalidBreedingCap,
    #[error("Invalid clustering parameters: {0}")]
    InvalidClustering(String),
    #[error("Maximum concurrent sub-populations must be positive")]
    InvalidConcurrency,
    #[error("Maximum immigration batches must be positive")]
    InvalidImmigrationBatches,
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }

        let probabilities = &self.mutation_rate_probabilities;
        let fractions = [
            ("elite_fraction", self.elite_fraction),
            ("mutation_offspring_fraction", self.mutation_offspring_fraction),
            ("crossover_fraction", self.crossover_fraction),
            ("immigration_fraction", self.immigration_fraction),
            (
                "crossover_mutation_probability",
                self.crossover_mutation_probability,
            ),
            ("mutation_rate_probabilities.low", probabilities.low),
            ("mutation_rate_probabilities.medium", probabilities.medium),
            ("mutation_rate_probabilities.high", probabilities.high),
        ];
        for (name, value) in fractions {
            // NaN fails the range check too
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::FractionOutOfRange { name, value });
            }
        }

        let total = probabilities.low + probabilities.medium + probabilities.high;
        if (total - 1.0).abs() > 1e-6 {
            return Err(ConfigError::MutationRatesNotNormalized(total));
        }

        if self.tournament_size == 0 {
            return Err(ConfigError::InvalidTournamentSize);
        }
        if self.per_cluster_breeding_cap == 0 {
            return Err(ConfigError::InvalidBreedingCap);
        }

        let clustering = &self.clustering;
        if clustering.radius.is_nan() || clustering.radius <= 0.0 {
            return Err(ConfigError::InvalidClustering(format!(
                "radius must be positive, got {}",
                clustering.radius
            )));
        }
        if clustering.min_points == 0 {
            return Err(ConfigError::InvalidClustering(
                "min_points must be positive".to_string(),
            ));
        }
        if clustering.projection_dimensions == 0 {
            return Err(ConfigError::InvalidClustering(
                "projection_dimensions must be positive".to_string(),
            ));
        }
        if clustering.power_iterations == 0 {
            return Err(ConfigError::InvalidClustering(
                "power_iterations must be positive".to_string(),
            ));
        }

        if self.max_concurrent_sub_populations == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.max_immigration_batches == 0 {
            return Err(ConfigError::InvalidImmigrationBatches);
        }

        Ok(())
    }
}
