//! Scripted collaborators for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::archive::GenerationArchive;
use super::collaborators::{
    CandidateGenerator, CandidateSynthesizer, EmbeddingProvider, ImmigrantBatch,
    ImmigrationContext, MemoryStore,
};
use super::error::BoxError;
use crate::schema::{Candidate, Generation, MutationRate, SubProblemId};

/// Generation of `n` unclustered candidates titled "candidate 1".."candidate n"
/// with fitness equal to their number.
pub fn rated_generation(index: usize, n: usize) -> Generation {
    Generation::new(
        index,
        (1..=n)
            .map(|i| Candidate::new(format!("c{}", i), format!("candidate {}", i)).with_fitness(i as f64))
            .collect(),
    )
}

/// Embeddings looked up by title. Unknown titles fail.
#[derive(Debug, Default)]
pub struct TableEmbeddings {
    table: HashMap<String, Vec<f32>>,
}

impl TableEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, title: impl Into<String>, vector: Vec<f32>) -> Self {
        self.table.insert(title.into(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbeddings {
    async fn embed(&self, candidate: &Candidate) -> Result<Vec<f32>, BoxError> {
        self.table
            .get(&candidate.title)
            .cloned()
            .ok_or_else(|| format!("no embedding for '{}'", candidate.title).into())
    }
}

/// Deterministic synthesizer deriving new titles from its inputs.
#[derive(Debug, Default)]
pub struct ScriptedSynthesizer {
    failing_prefix: Option<String>,
    mutations: AtomicUsize,
    recombinations: AtomicUsize,
}

impl ScriptedSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every mutation of a candidate whose title starts with `prefix`.
    pub fn failing_on(mut self, prefix: impl Into<String>) -> Self {
        self.failing_prefix = Some(prefix.into());
        self
    }

    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn recombinations(&self) -> usize {
        self.recombinations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateSynthesizer for ScriptedSynthesizer {
    async fn mutate(&self, candidate: &Candidate, rate: MutationRate) -> Result<Candidate, BoxError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if let Some(prefix) = &self.failing_prefix
            && candidate.title.starts_with(prefix.as_str())
        {
            return Err(format!("model refused to mutate '{}'", candidate.title).into());
        }
        Ok(Candidate::new(
            format!("{}-{}", candidate.id, rate),
            format!("{} ~{}", candidate.title, rate),
        )
        .with_description(candidate.description.clone())
        .with_fitness(candidate.rank_fitness()))
    }

    async fn recombine(
        &self,
        parent_a: &Candidate,
        parent_b: &Candidate,
    ) -> Result<Candidate, BoxError> {
        self.recombinations.fetch_add(1, Ordering::SeqCst);
        Ok(Candidate::new(
            format!("{}x{}", parent_a.id, parent_b.id),
            format!("{} + {}", parent_a.title, parent_b.title),
        ))
    }
}

/// Generator returning fixed-size batches of fresh candidates.
#[derive(Debug)]
pub struct ScriptedGenerator {
    batch_size: usize,
    calls: AtomicUsize,
    seen_title_counts: Mutex<Vec<usize>>,
}

impl ScriptedGenerator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            calls: AtomicUsize::new(0),
            seen_title_counts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of already-seen titles passed on each call.
    pub fn seen_title_counts(&self) -> Vec<usize> {
        self.seen_title_counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CandidateGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        context: &ImmigrationContext,
        already_seen_titles: &[String],
    ) -> Result<ImmigrantBatch, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_title_counts
            .lock()
            .unwrap()
            .push(already_seen_titles.len());

        let offset = already_seen_titles.len();
        let candidates = (0..self.batch_size)
            .map(|i| {
                let n = offset + i;
                Candidate::new(
                    format!("{}-{}-{}", context.sub_problem.0, context.generation, n),
                    format!("immigrant {} of generation {}", n, context.generation),
                )
            })
            .collect();
        Ok(ImmigrantBatch {
            candidates,
            seed_context: vec![format!(
                "https://news.example.org/{}/{}",
                context.sub_problem.0, offset
            )],
        })
    }
}

/// Archive that counts append calls per sub-problem.
#[derive(Debug, Default)]
pub struct CountingStore {
    archive: GenerationArchive,
    appends: Mutex<HashMap<SubProblemId, usize>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archive(&self) -> &GenerationArchive {
        &self.archive
    }

    pub fn appends(&self, sub_problem: SubProblemId) -> usize {
        self.appends
            .lock()
            .unwrap()
            .get(&sub_problem)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MemoryStore for CountingStore {
    async fn latest_generation(
        &self,
        sub_problem: SubProblemId,
    ) -> Result<Option<Generation>, BoxError> {
        self.archive.latest_generation(sub_problem).await
    }

    async fn append_generation(
        &self,
        sub_problem: SubProblemId,
        generation: Generation,
    ) -> Result<(), BoxError> {
        *self.appends.lock().unwrap().entry(sub_problem).or_insert(0) += 1;
        self.archive.append_generation(sub_problem, generation).await
    }
}
