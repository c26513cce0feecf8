//! Similarity clustering for niche preservation.
//!
//! Candidates are embedded by an external provider, projected onto a few
//! principal components and grouped by density. The resulting clusters are
//! only meaningful for the generation they were computed for.

mod clusterer;
mod dbscan;
mod pca;

pub use clusterer::{Cluster, ClusterStats, SimilarityClusterer, assign_clusters};
pub use dbscan::dbscan;
pub use pca::{PcaProjection, Projection, ProjectionError};
