//! Seedable random source for selection and variation.
//!
//! Every stochastic decision in a step draws from an explicit generator so
//! that runs can be replayed from a seed.

use rand::prelude::*;

/// Random number generator wrapper for evolution steps.
#[derive(Debug, Clone)]
pub struct EvolutionRng {
    rng: StdRng,
}

impl EvolutionRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create from an optional seed, falling back to entropy.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::random, Self::new)
    }

    /// Generate next u64 for seeding child RNGs.
    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    /// Independent child generator seeded from this one.
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_seed())
    }
}

impl RngCore for EvolutionRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}
