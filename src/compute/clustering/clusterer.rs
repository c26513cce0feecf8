//! Similarity clustering of a generation's candidates.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;

use super::dbscan::dbscan;
use super::pca::{PcaProjection, Projection};
use crate::compute::evolution::{EmbeddingProvider, EvolutionError, EvolutionResult};
use crate::schema::{Candidate, ClusteringConfig, SimilarityGroup};

/// Candidates judged similar, valid for one generation only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// Index in discovery order.
    pub index: usize,
    /// Positions of the members within the generation.
    pub members: Vec<usize>,
}

/// Groups candidates into similarity clusters from their embeddings.
pub struct SimilarityClusterer {
    provider: Arc<dyn EmbeddingProvider>,
    projection: Box<dyn Projection>,
    config: ClusteringConfig,
}

impl SimilarityClusterer {
    /// Create a clusterer using principal-component projection.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: ClusteringConfig) -> Self {
        let projection = Box::new(PcaProjection::new(config.power_iterations));
        Self {
            provider,
            projection,
            config,
        }
    }

    /// Replace the projection step.
    pub fn with_projection(mut self, projection: Box<dyn Projection>) -> Self {
        self.projection = projection;
        self
    }

    /// Clustering configuration.
    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Embed every candidate concurrently.
    ///
    /// Failed embeddings are logged and come back as `None`; those candidates
    /// stay in the generation but take no part in clustering.
    pub async fn embed_all(&self, candidates: &[Candidate]) -> Vec<Option<Vec<f32>>> {
        let results = join_all(candidates.iter().map(|c| self.provider.embed(c))).await;

        results
            .into_iter()
            .zip(candidates)
            .map(|(result, candidate)| match result {
                Ok(vector) => Some(vector),
                Err(e) => {
                    let err = EvolutionError::EmbeddingFailure {
                        candidate: candidate.title.clone(),
                        message: e.to_string(),
                    };
                    log::warn!("{}", err);
                    None
                }
            })
            .collect()
    }

    /// Cluster the candidates that have vectors.
    ///
    /// Clusters smaller than two members are dropped and indices are assigned
    /// to the remaining ones in discovery order.
    pub fn cluster_vectors(&self, vectors: &[Option<Vec<f32>>]) -> EvolutionResult<Vec<Cluster>> {
        let (positions, embedded): (Vec<usize>, Vec<Vec<f32>>) = vectors
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v.clone())))
            .unzip();

        if embedded.len() < 2 {
            return Ok(Vec::new());
        }

        let projected = self
            .projection
            .project(&embedded, self.config.projection_dimensions)
            .map_err(|e| EvolutionError::ClusteringFailure(e.to_string()))?;

        let groups = dbscan(&projected, self.config.radius, self.config.min_points);

        Ok(groups
            .into_iter()
            .filter(|group| group.len() > 1)
            .enumerate()
            .map(|(index, group)| Cluster {
                index,
                members: group.into_iter().map(|i| positions[i]).collect(),
            })
            .collect())
    }

    /// Embed and cluster a generation's candidates.
    pub async fn cluster(&self, candidates: &[Candidate]) -> EvolutionResult<Vec<Cluster>> {
        let vectors = self.embed_all(candidates).await;
        self.cluster_vectors(&vectors)
    }

    /// Run a full clustering pass: clear old groups, cluster, assign.
    ///
    /// A clustering failure leaves every candidate unclustered.
    pub async fn assign(&self, candidates: &mut [Candidate]) -> ClusterStats {
        for candidate in candidates.iter_mut() {
            candidate.similarity_group = None;
        }

        match self.cluster(candidates).await {
            Ok(clusters) => assign_clusters(candidates, &clusters),
            Err(e) => log::warn!("{}; continuing without clusters", e),
        }

        let stats = ClusterStats::from_candidates(candidates);
        stats.log();
        stats
    }
}

/// Write cluster membership onto the candidates.
pub fn assign_clusters(candidates: &mut [Candidate], clusters: &[Cluster]) {
    for cluster in clusters {
        let group = SimilarityGroup {
            cluster_index: cluster.index,
            cluster_size: cluster.members.len(),
        };
        for &member in &cluster.members {
            if let Some(candidate) = candidates.get_mut(member) {
                log::debug!("Clustered candidate: {}", candidate.title);
                candidate.similarity_group = Some(group);
            }
        }
    }
}

/// Summary of a generation's cluster assignments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterStats {
    /// Number of clusters.
    pub cluster_count: usize,
    /// Members per cluster index.
    pub sizes: BTreeMap<usize, usize>,
    /// Candidates without a cluster.
    pub unclustered: usize,
}

impl ClusterStats {
    /// Compute statistics from assigned groups.
    pub fn from_candidates(candidates: &[Candidate]) -> Self {
        let mut stats = Self::default();
        for candidate in candidates {
            match candidate.cluster_index() {
                Some(index) => {
                    *stats.sizes.entry(index).or_insert(0) += 1;
                    stats.cluster_count = stats.cluster_count.max(index + 1);
                }
                None => stats.unclustered += 1,
            }
        }
        stats
    }

    fn log(&self) {
        log::info!("Total clusters: {}", self.cluster_count);
        log::info!("Candidates per cluster: {:?}", self.sizes);
        log::info!("Candidates not in any cluster: {}", self.unclustered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::testing::TableEmbeddings;

    fn clusterer(embeddings: TableEmbeddings, min_points: usize) -> SimilarityClusterer {
        let config = ClusteringConfig {
            radius: 0.5,
            min_points,
            ..Default::default()
        };
        SimilarityClusterer::new(Arc::new(embeddings), config)
    }

    fn candidates(titles: &[&str]) -> Vec<Candidate> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| Candidate::new(i.to_string(), *t))
            .collect()
    }

    fn two_topic_embeddings() -> TableEmbeddings {
        TableEmbeddings::new()
            .with("solar a", vec![10.0, 0.0, 0.0])
            .with("solar b", vec![10.1, 0.0, 0.0])
            .with("solar c", vec![10.0, 0.1, 0.0])
            .with("transit a", vec![-10.0, 0.0, 0.0])
            .with("transit b", vec![-10.1, 0.0, 0.1])
            .with("lonely", vec![0.0, 40.0, 0.0])
    }

    #[tokio::test]
    async fn test_assigns_groups_in_discovery_order() {
        let clusterer = clusterer(two_topic_embeddings(), 2);
        let mut population = candidates(&[
            "solar a",
            "transit a",
            "solar b",
            "lonely",
            "transit b",
            "solar c",
        ]);

        let stats = clusterer.assign(&mut population).await;

        assert_eq!(stats.cluster_count, 2);
        assert_eq!(stats.unclustered, 1);
        assert_eq!(population[0].cluster_index(), Some(0));
        assert_eq!(population[2].cluster_index(), Some(0));
        assert_eq!(population[5].cluster_index(), Some(0));
        assert_eq!(population[1].cluster_index(), Some(1));
        assert_eq!(population[4].cluster_index(), Some(1));
        assert_eq!(population[3].similarity_group, None);
        assert_eq!(population[0].similarity_group.unwrap().cluster_size, 3);
        assert_eq!(population[1].similarity_group.unwrap().cluster_size, 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_excludes_only_that_candidate() {
        // "unknown" has no embedding and must stay unclustered
        let clusterer = clusterer(two_topic_embeddings(), 2);
        let mut population = candidates(&["solar a", "unknown", "solar b", "transit a", "transit b"]);

        let stats = clusterer.assign(&mut population).await;

        assert_eq!(population.len(), 5);
        assert_eq!(population[1].similarity_group, None);
        assert_eq!(population[0].cluster_index(), Some(0));
        assert_eq!(population[2].cluster_index(), Some(0));
        assert_eq!(stats.cluster_count, 2);
    }

    #[tokio::test]
    async fn test_clustering_failure_clears_groups() {
        let embeddings = TableEmbeddings::new()
            .with("a", vec![1.0, 2.0])
            .with("b", vec![1.0, 2.0, 3.0]);
        let clusterer = clusterer(embeddings, 2);
        let mut population = vec![
            Candidate::new("0", "a").with_group(4, 2),
            Candidate::new("1", "b").with_group(4, 2),
        ];

        let stats = clusterer.assign(&mut population).await;

        assert_eq!(stats.cluster_count, 0);
        assert!(population.iter().all(|c| c.similarity_group.is_none()));
    }

    #[tokio::test]
    async fn test_clustering_is_deterministic() {
        let clusterer = clusterer(two_topic_embeddings(), 2);
        let population = candidates(&["solar a", "transit a", "solar b", "transit b", "solar c"]);
        let first = clusterer.cluster(&population).await.unwrap();
        let second = clusterer.cluster(&population).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_vector_yields_no_clusters() {
        let clusterer = clusterer(TableEmbeddings::new(), 1);
        let clusters = clusterer.cluster_vectors(&[Some(vec![1.0, 2.0]), None]).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_singleton_groups_dropped() {
        // min_points of 1 makes every isolated point its own group
        let clusterer = clusterer(TableEmbeddings::new(), 1);
        let vectors = vec![
            Some(vec![0.0, 0.0]),
            Some(vec![100.0, 0.0]),
            Some(vec![100.1, 0.0]),
        ];
        let clusters = clusterer.cluster_vectors(&vectors).unwrap();
        assert_eq!(
            clusters,
            vec![Cluster {
                index: 0,
                members: vec![1, 2]
            }]
        );
    }

    #[test]
    fn test_stats_from_candidates() {
        let population = vec![
            Candidate::new("0", "a").with_group(0, 2),
            Candidate::new("1", "b").with_group(1, 1),
            Candidate::new("2", "c").with_group(0, 2),
            Candidate::new("3", "d"),
        ];
        let stats = ClusterStats::from_candidates(&population);
        assert_eq!(stats.cluster_count, 2);
        assert_eq!(stats.sizes.get(&0), Some(&2));
        assert_eq!(stats.unclustered, 1);
    }
}
