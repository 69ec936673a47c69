// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Collision accounting across mining repetitions.

use std::collections::HashMap;

use log::*;
use rustc_hash::FxBuildHasher;

use crate::errors::Result;
use crate::sparse::{ListStore, Row};

/// Trait for accumulators of bucket collisions.
pub(super) trait CollisionCounter {
    fn create(n_rows: usize, max_value: u32) -> Self;

    /// Record one multi-row bucket from a repetition.  Row ids are ascending.
    fn record_bucket(&mut self, rows: &[u32]);

    /// Number of nonzero counts.
    fn nnz(&self) -> usize;

    /// Finish the counting into a store of mined topics.
    fn finish(self) -> Result<ListStore>;
}

fn clamp(count: u32, max_value: u32) -> u32 {
    count.min(max_value)
}

/// Accumulate per-row neighbourhoods: how often each row collided, and with whom.
pub(super) struct NeighbourhoodCounter {
    max_value: u32,
    hits: Vec<u32>,
    pairs: Vec<HashMap<u32, u32, FxBuildHasher>>,
}

impl CollisionCounter for NeighbourhoodCounter {
    fn create(n_rows: usize, max_value: u32) -> Self {
        NeighbourhoodCounter {
            max_value,
            hits: vec![0; n_rows],
            pairs: vec![HashMap::with_hasher(FxBuildHasher); n_rows],
        }
    }

    fn record_bucket(&mut self, rows: &[u32]) {
        for &i in rows {
            self.hits[i as usize] += 1;
            let nbrs = &mut self.pairs[i as usize];
            for &j in rows {
                if j != i {
                    *nbrs.entry(j).or_default() += 1;
                }
            }
        }
    }

    fn nnz(&self) -> usize {
        self.pairs.iter().map(|p| p.len()).sum()
    }

    fn finish(self) -> Result<ListStore> {
        let n = self.hits.len();
        debug!(
            "assembling neighbourhood topics from {} pair counts",
            self.nnz()
        );
        let mut out = ListStore::create(0, n)?;
        for (i, (hits, nbrs)) in self.hits.into_iter().zip(self.pairs).enumerate() {
            if hits == 0 {
                continue;
            }
            let mut nbrs: Vec<(u32, u32)> = nbrs.into_iter().collect();
            nbrs.sort_unstable();
            let mut row = Row::with_capacity(nbrs.len() + 1);
            row.push_unchecked(i as u32, clamp(hits, self.max_value));
            for (j, c) in nbrs {
                row.push_unchecked(j, clamp(c, self.max_value));
            }
            out.push_built_row(row);
        }
        Ok(out)
    }
}

/// Accumulate distinct bucket contents and how often each appeared.
pub(super) struct BucketSetCounter {
    n_rows: usize,
    max_value: u32,
    index: HashMap<Vec<u32>, usize, FxBuildHasher>,
    sets: Vec<(Vec<u32>, u32)>,
}

impl CollisionCounter for BucketSetCounter {
    fn create(n_rows: usize, max_value: u32) -> Self {
        BucketSetCounter {
            n_rows,
            max_value,
            index: HashMap::with_hasher(FxBuildHasher),
            sets: Vec::new(),
        }
    }

    fn record_bucket(&mut self, rows: &[u32]) {
        if let Some(&pos) = self.index.get(rows) {
            self.sets[pos].1 += 1;
        } else {
            self.index.insert(rows.to_vec(), self.sets.len());
            self.sets.push((rows.to_vec(), 1));
        }
    }

    fn nnz(&self) -> usize {
        self.sets.iter().map(|(s, _)| s.len()).sum()
    }

    fn finish(self) -> Result<ListStore> {
        debug!("assembling {} bucket topics", self.sets.len());
        let mut out = ListStore::create(0, self.n_rows)?;
        for (set, count) in self.sets {
            let w = clamp(count, self.max_value);
            let mut row = Row::with_capacity(set.len());
            for k in set {
                row.push_unchecked(k, w);
            }
            out.push_built_row(row);
        }
        Ok(out)
    }
}

#[test]
fn test_neighbourhood_counts() {
    let mut acc = NeighbourhoodCounter::create(5, 10);
    acc.record_bucket(&[0, 2, 3]);
    acc.record_bucket(&[0, 2]);
    acc.record_bucket(&[1, 4]);
    assert_eq!(acc.nnz(), 8);
    let topics = acc.finish().unwrap();
    assert_eq!(topics.dim(), 5);
    assert_eq!(topics.size(), 5);
    let r0: Vec<(u32, u32)> = topics[0].iter().map(|e| (e.key, e.weight)).collect();
    assert_eq!(r0, vec![(0, 2), (2, 2), (3, 1)]);
    let r3: Vec<(u32, u32)> = topics[3].iter().map(|e| (e.key, e.weight)).collect();
    assert_eq!(r3, vec![(3, 1), (0, 1), (2, 1)]);
}

#[test]
fn test_neighbourhood_skips_quiet_rows() {
    let mut acc = NeighbourhoodCounter::create(4, 10);
    acc.record_bucket(&[1, 3]);
    let topics = acc.finish().unwrap();
    assert_eq!(topics.size(), 2);
    assert_eq!(topics[0].keys().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(topics[1].keys().collect::<Vec<_>>(), vec![3, 1]);
}

#[test]
fn test_neighbourhood_clamps() {
    let mut acc = NeighbourhoodCounter::create(2, 3);
    for _ in 0..7 {
        acc.record_bucket(&[0, 1]);
    }
    let topics = acc.finish().unwrap();
    assert!(topics[0].iter().all(|e| e.weight == 3));
}

#[test]
fn test_bucket_sets() {
    let mut acc = BucketSetCounter::create(6, 2);
    acc.record_bucket(&[1, 4]);
    acc.record_bucket(&[0, 2, 5]);
    acc.record_bucket(&[1, 4]);
    acc.record_bucket(&[1, 4]);
    assert_eq!(acc.nnz(), 5);
    let topics = acc.finish().unwrap();
    assert_eq!(topics.dim(), 6);
    assert_eq!(topics.size(), 2);
    let r0: Vec<(u32, u32)> = topics[0].iter().map(|e| (e.key, e.weight)).collect();
    assert_eq!(r0, vec![(1, 2), (4, 2)]);
    assert_eq!(topics[1].keys().collect::<Vec<_>>(), vec![0, 2, 5]);
    assert!(topics[1].iter().all(|e| e.weight == 1));
}
