//! Sampling primitives backing the random value generators.
//!
//! Every node that draws randomness owns its distribution instance, seeded
//! from the builder-level [`SeedSource`]. There is no process-global RNG, so
//! two graphs built with the same seed produce identical streams.

use std::cell::Cell;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::error::Error;

/// Maximum rejection attempts before a truncated normal draw falls back to
/// clamping.
const NORMAL_REJECTION_CAP: u32 = 100;

/// Minimal sampling surface used by the value nodes.
pub trait Distribution {
    /// Uniformly-weighted index in `[0, bound)`.
    fn next_int(&mut self, bound: usize) -> usize;

    /// Integer in `[start, end)`.
    fn next_long(&mut self, start: i64, end: i64) -> i64;

    /// Float in `[start, end)`.
    fn next_double(&mut self, start: f64, end: f64) -> f64;

    /// Coin flip.
    fn next_bool(&mut self) -> bool;

    /// Rewind to the state at construction, replaying the same draws.
    fn reset(&mut self);
}

/// Hands out per-node seeds derived from one base seed.
///
/// Uses the golden-ratio multiplier so consecutive node seeds are spread
/// across the seed space rather than adjacent.
#[derive(Debug)]
pub(crate) struct SeedSource {
    base: u64,
    counter: Cell<u64>,
}

impl SeedSource {
    pub(crate) fn new(base: u64) -> Self {
        Self {
            base,
            counter: Cell::new(0),
        }
    }

    pub(crate) fn next_seed(&self) -> u64 {
        let index = self.counter.get();
        self.counter.set(index + 1);
        self.base
            .wrapping_add(index.wrapping_mul(0x9E3779B97F4A7C15))
    }
}

/// Standard uniform PRNG draws.
pub struct UniformDistribution {
    rng: StdRng,
    seed: u64,
}

impl UniformDistribution {
    /// Create a uniform distribution with its own seeded RNG.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }
}

impl Distribution for UniformDistribution {
    fn next_int(&mut self, bound: usize) -> usize {
        self.rng.random_range(0..bound)
    }

    fn next_long(&mut self, start: i64, end: i64) -> i64 {
        self.rng.random_range(start..end)
    }

    fn next_double(&mut self, start: f64, end: f64) -> f64 {
        self.rng.random_range(start..end)
    }

    fn next_bool(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

/// Truncated normal distribution.
///
/// The configured `(mean, std_dev)` shape lives on the configured
/// `[start, end)` domain; draws for a requested interval are rescaled from
/// that domain, so one bell shape serves ranges of any width. Samples
/// falling outside the domain are rejected and redrawn; after
/// [`NORMAL_REJECTION_CAP`] attempts the draw is clamped instead.
pub struct NormalDistribution {
    mean: f64,
    std_dev: f64,
    start: f64,
    end: f64,
    rng: StdRng,
    seed: u64,
    spare: Option<f64>,
}

impl NormalDistribution {
    /// Create a normal distribution with the default shape: mean 0.5,
    /// standard deviation 0.125, domain `[0, 1)`.
    pub fn new(seed: u64) -> Self {
        Self {
            mean: 0.5,
            std_dev: 0.125,
            start: 0.0,
            end: 1.0,
            rng: StdRng::seed_from_u64(seed),
            seed,
            spare: None,
        }
    }

    /// Create a normal distribution with an explicit shape and domain.
    pub fn with_params(
        mean: f64,
        std_dev: f64,
        start: f64,
        end: f64,
        seed: u64,
    ) -> Result<Self, Error> {
        if !(std_dev > 0.0) {
            return Err(Error::InvalidRange(format!(
                "normal distribution standard deviation must be positive, got {std_dev}"
            )));
        }
        if !(start < end) {
            return Err(Error::InvalidRange(format!(
                "normal distribution bounds must be increasing, got {start}..{end}"
            )));
        }
        Ok(Self {
            mean,
            std_dev,
            start,
            end,
            rng: StdRng::seed_from_u64(seed),
            seed,
            spare: None,
        })
    }

    /// One draw from the untruncated normal via Box-Muller.
    fn standard_sample(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return self.mean + self.std_dev * z;
        }
        let mut u: f64 = self.rng.random();
        while u <= f64::MIN_POSITIVE {
            u = self.rng.random();
        }
        let v: f64 = self.rng.random();
        let radius = (-2.0 * u.ln()).sqrt();
        let theta = std::f64::consts::TAU * v;
        self.spare = Some(radius * theta.sin());
        self.mean + self.std_dev * radius * theta.cos()
    }

    /// Draw within the configured domain, rejecting out-of-domain samples
    /// up to the cap.
    fn domain_sample(&mut self) -> f64 {
        for _ in 0..NORMAL_REJECTION_CAP {
            let x = self.standard_sample();
            if x >= self.start && x < self.end {
                return x;
            }
        }
        warn!(
            mean = self.mean,
            std_dev = self.std_dev,
            "truncated normal exceeded {NORMAL_REJECTION_CAP} rejections, clamping"
        );
        self.standard_sample()
            .clamp(self.start, self.end.next_down())
    }
}

impl Distribution for NormalDistribution {
    fn next_int(&mut self, bound: usize) -> usize {
        self.next_long(0, bound as i64) as usize
    }

    fn next_long(&mut self, start: i64, end: i64) -> i64 {
        let sampled = self.next_double(start as f64, end as f64).floor() as i64;
        sampled.clamp(start, end - 1)
    }

    fn next_double(&mut self, start: f64, end: f64) -> f64 {
        let x = self.domain_sample();
        let scaled = start + (x - self.start) / (self.end - self.start) * (end - start);
        scaled.clamp(start, end.next_down())
    }

    fn next_bool(&mut self) -> bool {
        self.next_double(0.0, 1.0) < 0.5
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.spare = None;
    }
}
