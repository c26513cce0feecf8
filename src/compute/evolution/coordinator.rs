//! Concurrent evolution of many sub-populations.
//!
//! Each sub-problem's step runs as its own task. A failing step is logged
//! and reported; it never cancels or rolls back its siblings.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use super::error::EvolutionError;
use super::evolver::{EvolutionEngine, StepReport};
use super::rng::EvolutionRng;
use crate::schema::SubProblemId;

/// Result of one sub-problem's step.
#[derive(Debug)]
pub struct SubProblemOutcome {
    pub sub_problem: SubProblemId,
    pub result: Result<StepReport, EvolutionError>,
}

/// Per-sub-problem outcomes of a coordinator run, in request order.
#[derive(Debug, Default)]
pub struct CoordinatorReport {
    pub outcomes: Vec<SubProblemOutcome>,
}

impl CoordinatorReport {
    /// Reports of committed steps.
    pub fn succeeded(&self) -> impl Iterator<Item = &StepReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// Sub-problems whose step failed, with the error.
    pub fn failed(&self) -> impl Iterator<Item = (SubProblemId, &EvolutionError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.sub_problem, e)))
    }

    /// Whether every step committed.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Runs one evolution step per sub-problem concurrently.
pub struct EvolutionCoordinator {
    engine: Arc<EvolutionEngine>,
}

impl EvolutionCoordinator {
    /// Create a coordinator around a shared engine.
    pub fn new(engine: Arc<EvolutionEngine>) -> Self {
        Self { engine }
    }

    /// Get the engine.
    pub fn engine(&self) -> &EvolutionEngine {
        &self.engine
    }

    /// Evolve each of `sub_problems` by one generation.
    ///
    /// At most `max_sub_problems` are processed, taken in the given order, and
    /// at most `max_concurrent_sub_populations` run at once. Every task gets
    /// its own generator forked from `rng` in sub-problem order, so results
    /// do not depend on completion order.
    pub async fn run(
        &self,
        sub_problems: &[SubProblemId],
        rng: &mut EvolutionRng,
    ) -> CoordinatorReport {
        let config = self.engine.config();
        let limit = config.max_sub_problems.unwrap_or(sub_problems.len());
        let selected = &sub_problems[..sub_problems.len().min(limit)];
        if selected.len() < sub_problems.len() {
            log::info!(
                "Evolving the first {} of {} sub-problems",
                selected.len(),
                sub_problems.len()
            );
        }

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_sub_populations));
        let handles: Vec<_> = selected
            .iter()
            .map(|&sub_problem| {
                let engine = Arc::clone(&self.engine);
                let semaphore = Arc::clone(&semaphore);
                let mut task_rng = rng.fork();
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| EvolutionError::TaskAborted(e.to_string()))?;
                    engine.evolve_sub_problem(sub_problem, &mut task_rng).await
                })
            })
            .collect();

        let results = join_all(handles).await;

        let outcomes = selected
            .iter()
            .zip(results)
            .map(|(&sub_problem, joined)| {
                let result = joined
                    .unwrap_or_else(|e| Err(EvolutionError::TaskAborted(e.to_string())));
                match &result {
                    Ok(report) => log::info!(
                        "{} advanced to generation {}",
                        sub_problem,
                        report.generation_index
                    ),
                    Err(e) => log::error!("{} not advanced: {}", sub_problem, e),
                }
                SubProblemOutcome {
                    sub_problem,
                    result,
                }
            })
            .collect();

        CoordinatorReport { outcomes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::SynthesisOperation;
    use crate::compute::evolution::testing::{
        CountingStore, ScriptedGenerator, ScriptedSynthesizer, rated_generation,
    };
    use crate::schema::{Candidate, EvolutionConfig};

    fn config() -> EvolutionConfig {
        EvolutionConfig {
            population_size: 10,
            elite_fraction: 0.2,
            tournament_size: 3,
            max_concurrent_sub_populations: 2,
            max_sub_problems: None,
            ..Default::default()
        }
    }

    fn poisoned_generation() -> Vec<Candidate> {
        (1..=10)
            .map(|i| {
                Candidate::new(format!("p{}", i), format!("poison {}", i)).with_fitness(i as f64)
            })
            .collect()
    }

    async fn coordinator(
        config: EvolutionConfig,
        seeds: Vec<(SubProblemId, Vec<Candidate>)>,
    ) -> (EvolutionCoordinator, Arc<CountingStore>) {
        let store = Arc::new(CountingStore::new());
        for (sub_problem, candidates) in seeds {
            store.archive().seed(sub_problem, candidates).await.unwrap();
        }
        let engine = EvolutionEngine::new(
            config,
            Arc::new(ScriptedSynthesizer::new().failing_on("poison")),
            Arc::new(ScriptedGenerator::new(3)),
            store.clone(),
        )
        .unwrap();
        (EvolutionCoordinator::new(Arc::new(engine)), store)
    }

    #[tokio::test]
    async fn test_failed_sub_population_does_not_block_others() {
        let ids = [SubProblemId(0), SubProblemId(1), SubProblemId(2)];
        let (coordinator, store) = coordinator(
            config(),
            vec![
                (ids[0], rated_generation(0, 10).candidates),
                (ids[1], poisoned_generation()),
                (ids[2], rated_generation(0, 10).candidates),
            ],
        )
        .await;

        let report = coordinator.run(&ids, &mut EvolutionRng::new(1)).await;

        assert_eq!(report.succeeded().count(), 2);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, SubProblemId(1));
        assert!(matches!(
            failed[0].1,
            EvolutionError::SynthesisFailure {
                operation: SynthesisOperation::Mutation,
                ..
            }
        ));

        assert_eq!(store.archive().generation_count(ids[0]).await, 2);
        assert_eq!(store.archive().generation_count(ids[1]).await, 1);
        assert_eq!(store.archive().generation_count(ids[2]).await, 2);
        assert_eq!(store.appends(ids[0]), 1);
        assert_eq!(store.appends(ids[1]), 0);
    }

    #[tokio::test]
    async fn test_outcomes_follow_request_order() {
        let ids = [SubProblemId(5), SubProblemId(3), SubProblemId(4)];
        let seeds = ids
            .iter()
            .map(|&id| (id, rated_generation(0, 10).candidates))
            .collect();
        let (coordinator, _) = coordinator(config(), seeds).await;

        let report = coordinator.run(&ids, &mut EvolutionRng::new(2)).await;
        let order: Vec<_> = report.outcomes.iter().map(|o| o.sub_problem).collect();
        assert_eq!(order, ids);
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn test_sub_problem_cap() {
        let ids: Vec<_> = (0..4).map(SubProblemId).collect();
        let seeds = ids
            .iter()
            .map(|&id| (id, rated_generation(0, 10).candidates))
            .collect();
        let config = EvolutionConfig {
            max_sub_problems: Some(2),
            ..config()
        };
        let (coordinator, store) = coordinator(config, seeds).await;

        let report = coordinator.run(&ids, &mut EvolutionRng::new(3)).await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(store.archive().generation_count(ids[1]).await, 2);
        assert_eq!(store.archive().generation_count(ids[2]).await, 1);
        assert_eq!(store.archive().generation_count(ids[3]).await, 1);
    }

    #[tokio::test]
    async fn test_missing_history_is_reported() {
        let (coordinator, _) =
            coordinator(config(), vec![(SubProblemId(0), rated_generation(0, 10).candidates)])
                .await;
        let report = coordinator
            .run(&[SubProblemId(0), SubProblemId(9)], &mut EvolutionRng::new(4))
            .await;
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert!(matches!(
            failed[0].1,
            EvolutionError::MissingGeneration(SubProblemId(9))
        ));
    }

    #[tokio::test]
    async fn test_runs_are_reproducible() {
        let ids = [SubProblemId(0), SubProblemId(1)];
        let mut latest = Vec::new();
        for _ in 0..2 {
            let seeds = ids
                .iter()
                .map(|&id| (id, rated_generation(0, 10).candidates))
                .collect();
            let (coordinator, store) = coordinator(config(), seeds).await;
            coordinator.run(&ids, &mut EvolutionRng::new(77)).await;
            latest.push(store.archive().generations(ids[1]).await);
        }
        assert_eq!(latest[0], latest[1]);
    }
}
