//! Schema module - Candidate data model and evolution configuration.

mod candidate;
mod evolution;

pub use candidate::*;
pub use evolution::*;
