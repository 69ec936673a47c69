// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Seedable random number generation for sampling and projections.

use std::f64::consts::PI;

use log::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::errors::{LshError, Result};
use crate::progress::CancelToken;

/// Seed used when a generator is never explicitly initialized.
pub const DEFAULT_SEED: u64 = 0x5eed_15b5_1b5e_ed00;

/// Smallest magnitude allowed for the denominator of a Cauchy draw.
const CAUCHY_FLOOR: f64 = 1e-7;

/// Reproducible random generator for the mining engine.
///
/// All draws advance a single stream, so the same seed always yields the
/// same sequence of tuples and projections.
#[derive(Clone, Debug)]
pub struct LshRng {
    rng: Pcg64,
}

impl Default for LshRng {
    fn default() -> Self {
        LshRng::seeded(DEFAULT_SEED)
    }
}

impl LshRng {
    pub fn seeded(seed: u64) -> Self {
        LshRng {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Re-initialize the generator from a seed.
    pub fn init(&mut self, seed: u64) {
        debug!("seeding generator with {}", seed);
        self.rng = Pcg64::seed_from_u64(seed);
    }

    /// Draw an integer uniformly from `[0, max)`.
    pub fn draw_uniform_int(&mut self, max: u64) -> Result<u64> {
        if max == 0 {
            return Err(LshError::InvalidParameter(
                "uniform integer range [0, 0) is empty".into(),
            ));
        }
        Ok(self.rng.random_range(0..max))
    }

    /// Draw a full-width random integer.
    pub fn draw_u64(&mut self) -> u64 {
        self.rng.random()
    }

    /// Draw a 32-bit random integer.
    pub fn draw_u32(&mut self) -> u32 {
        self.rng.random()
    }

    /// Draw a real number uniformly from `[lo, hi)`.
    pub fn draw_uniform(&mut self, lo: f64, hi: f64) -> f64 {
        let u: f64 = self.rng.random();
        lo + u * (hi - lo)
    }

    /// Draw from the standard normal distribution (Box-Muller).
    pub fn draw_gaussian(&mut self) -> f64 {
        let mut u1: f64 = self.rng.random();
        while u1 <= f64::MIN_POSITIVE {
            u1 = self.rng.random();
        }
        let u2: f64 = self.rng.random();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Draw from the standard Cauchy distribution, as a ratio of two normals.
    pub fn draw_cauchy(&mut self) -> f64 {
        let a = self.draw_gaussian();
        let mut b = self.draw_gaussian();
        if b.abs() < CAUCHY_FLOOR {
            b = CAUCHY_FLOOR;
        }
        a / b
    }
}

/// Context carried through mining and clustering calls.
#[derive(Clone, Debug, Default)]
pub struct LshContext {
    pub rng: LshRng,
    pub cancel: CancelToken,
}

impl LshContext {
    pub fn seeded(seed: u64) -> Self {
        LshContext {
            rng: LshRng::seeded(seed),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Re-seed the context's generator.
    pub fn init(&mut self, seed: u64) {
        self.rng.init(seed);
    }
}

#[test]
fn test_same_seed_same_stream() {
    let mut a = LshRng::seeded(42);
    let mut b = LshRng::seeded(7);
    b.init(42);
    for _ in 0..100 {
        assert_eq!(a.draw_u64(), b.draw_u64());
    }
    assert_eq!(a.draw_gaussian(), b.draw_gaussian());
    assert_eq!(a.draw_cauchy(), b.draw_cauchy());
}

#[test]
fn test_default_is_deterministic() {
    let mut a = LshRng::default();
    let mut b = LshRng::default();
    assert_eq!(
        a.draw_uniform_int(1000).unwrap(),
        b.draw_uniform_int(1000).unwrap()
    );
}

#[test]
fn test_uniform_ranges() {
    let mut rng = LshRng::seeded(3);
    for _ in 0..1000 {
        let i = rng.draw_uniform_int(7).unwrap();
        assert!(i < 7);
        let x = rng.draw_uniform(2.0, 3.0);
        assert!((2.0..3.0).contains(&x));
    }
}

#[test]
fn test_uniform_int_empty_range() {
    let mut rng = LshRng::seeded(3);
    assert!(matches!(
        rng.draw_uniform_int(0),
        Err(LshError::InvalidParameter(_))
    ));
}

#[test]
fn test_gaussian_moments() {
    let mut rng = LshRng::seeded(11);
    let n = 20000;
    let draws: Vec<f64> = (0..n).map(|_| rng.draw_gaussian()).collect();
    let mean = draws.iter().sum::<f64>() / n as f64;
    let var = draws.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
    assert!(mean.abs() < 0.05, "mean {}", mean);
    assert!((var - 1.0).abs() < 0.05, "variance {}", var);
}

#[test]
fn test_cauchy_median() {
    let mut rng = LshRng::seeded(5);
    let mut draws: Vec<f64> = (0..20001).map(|_| rng.draw_cauchy()).collect();
    assert!(draws.iter().all(|x| x.is_finite()));
    draws.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = draws[draws.len() / 2];
    // quartiles of the standard Cauchy are -1 and 1
    let q3 = draws[draws.len() * 3 / 4];
    assert!(median.abs() < 0.05, "median {}", median);
    assert!((q3 - 1.0).abs() < 0.1, "upper quartile {}", q3);
}
