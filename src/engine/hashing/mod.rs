// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Locality-sensitive tuple families and the bucket table they hash into.
//!
//! A tuple family is drawn once per mining repetition and maps each row to a
//! short [Signature].  Rows with equal signatures land in the same bucket of
//! the [BucketTable]; the signature is reduced to a bucket index by a pair of
//! universal hash functions (one picks the slot, the other verifies it).

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::random::LshRng;
use crate::sparse::{Row, Weight};

mod table;

pub use table::BucketTable;

/// A sampled tuple: `tuple_size` hash values for one row.
pub type Signature = Vec<u64>;

/// Largest prime below 2^64, modulus of the universal hashes.
const PRIME64: u64 = 18_446_744_073_709_551_557;

/// Trait for families of locality-sensitive tuple functions.
pub trait TupleFamily: Sync {
    type Weight: Weight;

    /// Number of values in each signature.
    fn tuple_size(&self) -> usize;

    /// Compute the signature of a row, or `None` if the row has nothing to sample.
    fn signature(&self, row: &Row<Self::Weight>) -> Option<Signature>;
}

/// Second-level universal hashing of signatures into bucket indices.
#[derive(Clone, Debug)]
pub struct UniversalHash {
    a: Vec<u64>,
    b: Vec<u64>,
}

impl UniversalHash {
    /// Draw coefficients for signatures of a given length.
    pub fn draw(rng: &mut LshRng, tuple_size: usize) -> Self {
        let mut a = Vec::with_capacity(tuple_size);
        let mut b = Vec::with_capacity(tuple_size);
        for _ in 0..tuple_size {
            a.push(rng.draw_u32() as u64);
            b.push(rng.draw_u32() as u64);
        }
        UniversalHash { a, b }
    }

    /// Hash a signature, returning the slot hash and the verification hash.
    pub fn hash(&self, sig: &[u64]) -> (u64, u64) {
        debug_assert_eq!(sig.len(), self.a.len());
        let mut slot: u128 = 0;
        let mut check: u128 = 0;
        for (i, v) in sig.iter().enumerate() {
            slot += self.a[i] as u128 * *v as u128;
            check += self.b[i] as u128 * *v as u128;
        }
        (
            (slot % PRIME64 as u128) as u64,
            (check % PRIME64 as u128) as u64,
        )
    }
}

/// SplitMix64 finalizer.
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Pseudo-random rank of an element under a sampling function.
fn rank(seed: u64, element: u64) -> u64 {
    mix64(seed ^ mix64(element))
}

/// Weighted sampling of integer-weighted rows (the L1 regime).
///
/// Each function picks the `(key, occurrence)` element with the smallest
/// rank from the row's expanded multiset, where a key with total weight `w`
/// (repeated entries summed) contributes occurrences `0..min(w, max_value)`.  Rows sharing elements
/// pick the same sample, and each entry is chosen with probability
/// proportional to its clamped weight.  With `max_value = 1` this is
/// min-hashing of the row's key set.
#[derive(Clone, Debug)]
pub struct WeightedSampling {
    seeds: Vec<u64>,
    max_value: u32,
}

impl WeightedSampling {
    pub fn draw(rng: &mut LshRng, tuple_size: usize, max_value: u32) -> Self {
        WeightedSampling {
            seeds: (0..tuple_size).map(|_| rng.draw_u64()).collect(),
            max_value,
        }
    }

    /// Clamped occurrence count of each distinct key; repeated keys add up.
    fn occurrences(&self, row: &Row<u32>) -> Vec<(u32, u32)> {
        let mut totals: Vec<(u32, u32)> = row.iter().map(|e| (e.key, e.weight)).collect();
        totals.sort_unstable_by_key(|&(k, _)| k);
        totals.dedup_by(|next, kept| {
            if next.0 == kept.0 {
                kept.1 = kept.1.saturating_add(next.1);
                true
            } else {
                false
            }
        });
        for t in &mut totals {
            t.1 = t.1.min(self.max_value);
        }
        totals
    }

    fn sample(&self, seed: u64, totals: &[(u32, u32)]) -> Option<u64> {
        let mut best: Option<(u64, u64)> = None;
        for &(key, n) in totals {
            for occ in 0..n {
                let elt = ((key as u64) << 32) | occ as u64;
                let cand = (rank(seed, elt), elt);
                if best.map_or(true, |b| cand < b) {
                    best = Some(cand);
                }
            }
        }
        best.map(|(_r, elt)| elt)
    }
}

impl TupleFamily for WeightedSampling {
    type Weight = u32;

    fn tuple_size(&self) -> usize {
        self.seeds.len()
    }

    fn signature(&self, row: &Row<u32>) -> Option<Signature> {
        let totals = self.occurrences(row);
        let mut sig = Vec::with_capacity(self.seeds.len());
        for seed in &self.seeds {
            sig.push(self.sample(*seed, &totals)?);
        }
        Some(sig)
    }
}

/// Stable distributions for random projections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StableDistribution {
    /// 1-stable; collisions track L1 distance.
    Cauchy,
    /// 2-stable; collisions track Euclidean distance.
    Gaussian,
}

impl StableDistribution {
    pub fn draw(&self, rng: &mut LshRng) -> f64 {
        match self {
            StableDistribution::Cauchy => rng.draw_cauchy(),
            StableDistribution::Gaussian => rng.draw_gaussian(),
        }
    }
}

/// Quantized random projections of real-valued rows (the Lp regime).
#[derive(Clone, Debug)]
pub struct StableProjection {
    proj: Array2<f64>,
    offsets: Vec<f64>,
    width: f64,
}

impl StableProjection {
    pub fn draw(
        rng: &mut LshRng,
        tuple_size: usize,
        dim: usize,
        width: f64,
        dist: StableDistribution,
    ) -> Self {
        let mut proj = Array2::zeros((tuple_size, dim));
        let mut offsets = Vec::with_capacity(tuple_size);
        for i in 0..tuple_size {
            for j in 0..dim {
                proj[(i, j)] = dist.draw(rng);
            }
            offsets.push(rng.draw_uniform(0.0, width));
        }
        StableProjection {
            proj,
            offsets,
            width,
        }
    }
}

impl TupleFamily for StableProjection {
    type Weight = f64;

    fn tuple_size(&self) -> usize {
        self.offsets.len()
    }

    fn signature(&self, row: &Row<f64>) -> Option<Signature> {
        if row.is_empty() {
            return None;
        }
        let sig = self
            .offsets
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let dot: f64 = row
                    .iter()
                    .map(|e| e.weight * self.proj[(i, e.key as usize)])
                    .sum();
                ((dot + b) / self.width).floor() as i64 as u64
            })
            .collect();
        Some(sig)
    }
}

#[cfg(test)]
fn list_row(entries: &[(u32, u32)]) -> Row<u32> {
    let mut row = Row::new();
    for (k, w) in entries {
        row.push_unchecked(*k, *w);
    }
    row
}

#[test]
fn test_universal_hash_deterministic() {
    let mut rng = LshRng::seeded(1);
    let uh = UniversalHash::draw(&mut rng, 3);
    let h1 = uh.hash(&[1, 2, 3]);
    let h2 = uh.hash(&[1, 2, 3]);
    assert_eq!(h1, h2);
    assert!(h1.0 < PRIME64 && h1.1 < PRIME64);
    assert_ne!(uh.hash(&[1, 2, 4]), h1);
}

#[test]
fn test_weighted_identical_rows() {
    let mut rng = LshRng::seeded(2);
    let fam = WeightedSampling::draw(&mut rng, 4, 10);
    let a = list_row(&[(1, 3), (7, 2)]);
    let b = list_row(&[(7, 2), (1, 3)]);
    assert_eq!(fam.signature(&a), fam.signature(&b));
    assert_eq!(fam.tuple_size(), 4);
}

#[test]
fn test_weighted_disjoint_rows() {
    let mut rng = LshRng::seeded(2);
    let fam = WeightedSampling::draw(&mut rng, 2, 10);
    let a = list_row(&[(1, 3), (2, 1)]);
    let b = list_row(&[(5, 1)]);
    let sa = fam.signature(&a).unwrap();
    let sb = fam.signature(&b).unwrap();
    // samples always come from the row's own keys
    assert!(sa.iter().all(|v| [1, 2].contains(&(v >> 32))));
    assert!(sb.iter().all(|v| v >> 32 == 5));
}

#[test]
fn test_weighted_empty_rows() {
    let mut rng = LshRng::seeded(2);
    let fam = WeightedSampling::draw(&mut rng, 2, 10);
    assert_eq!(fam.signature(&list_row(&[])), None);
    assert_eq!(fam.signature(&list_row(&[(3, 0)])), None);
}

#[test]
fn test_weighted_duplicate_keys_add_up() {
    let mut rng = LshRng::seeded(21);
    let split = list_row(&[(1, 3), (1, 2), (2, 5)]);
    let summed = list_row(&[(1, 5), (2, 5)]);
    for _ in 0..500 {
        let fam = WeightedSampling::draw(&mut rng, 1, 50);
        assert_eq!(fam.signature(&split), fam.signature(&summed));
    }

    // the cap applies to the key's total, not to each entry
    let split = list_row(&[(1, 3), (1, 3), (4, 1)]);
    let capped = list_row(&[(1, 4), (4, 1)]);
    for _ in 0..500 {
        let fam = WeightedSampling::draw(&mut rng, 2, 4);
        assert_eq!(fam.signature(&split), fam.signature(&capped));
    }
}

#[test]
fn test_weighted_selection_follows_weight() {
    let mut rng = LshRng::seeded(9);
    let row = list_row(&[(1, 9), (2, 1)]);
    let mut heavy = 0;
    for _ in 0..2000 {
        let fam = WeightedSampling::draw(&mut rng, 1, 50);
        let sig = fam.signature(&row).unwrap();
        if sig[0] >> 32 == 1 {
            heavy += 1;
        }
    }
    // expected 1800 of 2000
    assert!(heavy > 1700 && heavy < 1900, "heavy key chosen {} times", heavy);
}

#[test]
fn test_weighted_max_value_caps() {
    let mut rng = LshRng::seeded(4);
    let row = list_row(&[(1, 1000), (2, 1)]);
    let mut heavy = 0;
    for _ in 0..2000 {
        let fam = WeightedSampling::draw(&mut rng, 1, 1);
        if fam.signature(&row).unwrap()[0] >> 32 == 1 {
            heavy += 1;
        }
    }
    // capped at one occurrence each, so an even split
    assert!(heavy > 900 && heavy < 1100, "heavy key chosen {} times", heavy);
}

#[test]
fn test_projection_signature() {
    let mut rng = LshRng::seeded(8);
    let fam = StableProjection::draw(&mut rng, 5, 4, 2.0, StableDistribution::Gaussian);
    let mut a = Row::new();
    a.push_unchecked(0, 1.0);
    a.push_unchecked(3, -0.5);
    let sa = fam.signature(&a).unwrap();
    assert_eq!(sa.len(), 5);
    assert_eq!(fam.signature(&a.clone()), Some(sa));
    assert_eq!(fam.signature(&Row::new()), None);
}

#[test]
fn test_projection_near_rows_collide_more() {
    let mut rng = LshRng::seeded(12);
    let mut base = Row::new();
    base.push_unchecked(0, 1.0);
    base.push_unchecked(1, 2.0);
    let mut near = Row::new();
    near.push_unchecked(0, 1.05);
    near.push_unchecked(1, 2.0);
    let mut far = Row::new();
    far.push_unchecked(0, 9.0);
    far.push_unchecked(1, -6.0);
    let (mut n_near, mut n_far) = (0, 0);
    for _ in 0..300 {
        let fam = StableProjection::draw(&mut rng, 2, 2, 4.0, StableDistribution::Cauchy);
        let s = fam.signature(&base);
        if fam.signature(&near) == s {
            n_near += 1;
        }
        if fam.signature(&far) == s {
            n_far += 1;
        }
    }
    assert!(n_near > n_far, "near {} far {}", n_near, n_far);
}
