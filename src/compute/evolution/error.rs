//! Error taxonomy for evolution steps.

use std::fmt;

use crate::schema::{ConfigError, SubProblemId};

/// Boxed error returned by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for evolution operations.
pub type EvolutionResult<T> = Result<T, EvolutionError>;

/// Synthesis capability that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOperation {
    Mutation,
    Crossover,
    Immigration,
}

impl fmt::Display for SynthesisOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mutation => "mutation",
            Self::Crossover => "crossover",
            Self::Immigration => "immigration",
        };
        f.write_str(name)
    }
}

/// Errors raised while clustering or evolving a sub-population.
///
/// `EmbeddingFailure` and `ClusteringFailure` are recovered inside the step.
/// Every other variant aborts the step without committing a generation.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Synthesis failed during {operation}: {message}")]
    SynthesisFailure {
        operation: SynthesisOperation,
        message: String,
    },
    #[error("Embedding failed for candidate '{candidate}': {message}")]
    EmbeddingFailure { candidate: String, message: String },
    #[error("Clustering failed: {0}")]
    ClusteringFailure(String),
    #[error("Capacity violation: {0}")]
    CapacityViolation(String),
    #[error("Insufficient population: {0}")]
    InsufficientPopulation(String),
    #[error("Memory store failed: {0}")]
    Store(String),
    #[error("No generation to evolve for {0}")]
    MissingGeneration(SubProblemId),
    #[error("Sub-population task aborted: {0}")]
    TaskAborted(String),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl EvolutionError {
    /// Wrap a collaborator error raised by a synthesis call.
    pub fn synthesis(operation: SynthesisOperation, source: BoxError) -> Self {
        Self::SynthesisFailure {
            operation,
            message: source.to_string(),
        }
    }

    /// Whether the error is handled inside the step rather than aborting it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingFailure { .. } | Self::ClusteringFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_message() {
        let err = EvolutionError::synthesis(SynthesisOperation::Mutation, "model timed out".into());
        assert_eq!(
            err.to_string(),
            "Synthesis failed during mutation: model timed out"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable_variants() {
        assert!(EvolutionError::ClusteringFailure("rank".into()).is_recoverable());
        assert!(
            EvolutionError::EmbeddingFailure {
                candidate: "x".into(),
                message: "y".into()
            }
            .is_recoverable()
        );
        assert!(!EvolutionError::CapacityViolation("z".into()).is_recoverable());
    }
}
