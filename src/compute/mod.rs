//! Compute module - Clustering and evolution of candidate populations.

pub mod clustering;
pub mod evolution;
