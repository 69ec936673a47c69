// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

use std::mem::take;

use log::*;

use crate::errors::{LshError, Result};

use super::UniversalHash;

#[derive(Clone, Debug, Default)]
struct Bucket {
    check: u64,
    rows: Vec<u32>,
}

/// Fixed-size open-addressing table of row buckets.
///
/// A bucket is owned by the first signature whose check hash lands in it;
/// other signatures probe linearly for the next free or matching slot.
pub struct BucketTable {
    buckets: Vec<Bucket>,
    used: Vec<usize>,
}

impl BucketTable {
    pub fn new(table_size: usize) -> Self {
        debug!("allocating bucket table with {} slots", table_size);
        BucketTable {
            buckets: vec![Bucket::default(); table_size],
            used: Vec::new(),
        }
    }

    pub fn table_size(&self) -> usize {
        self.buckets.len()
    }

    /// Number of slots currently owned.
    pub fn n_used(&self) -> usize {
        self.used.len()
    }

    /// Store a row under a signature, returning the slot it landed in.
    pub fn store(&mut self, row: u32, sig: &[u64], hash: &UniversalHash) -> Result<usize> {
        let (slot, check) = hash.hash(sig);
        self.store_hashed(row, slot, check)
    }

    fn store_hashed(&mut self, row: u32, slot: u64, check: u64) -> Result<usize> {
        let n = self.buckets.len();
        if n == 0 {
            return Err(LshError::TableFull(0));
        }
        let mut idx = (slot % n as u64) as usize;
        for _ in 0..n {
            let bucket = &mut self.buckets[idx];
            if bucket.rows.is_empty() {
                bucket.check = check;
                bucket.rows.push(row);
                self.used.push(idx);
                return Ok(idx);
            } else if bucket.check == check {
                bucket.rows.push(row);
                return Ok(idx);
            }
            idx = (idx + 1) % n;
        }
        Err(LshError::TableFull(n))
    }

    /// Take the contents of every owned slot in order of first use, resetting the table.
    pub fn drain(&mut self) -> Vec<Vec<u32>> {
        let used = take(&mut self.used);
        used.into_iter()
            .map(|i| {
                let bucket = &mut self.buckets[i];
                bucket.check = 0;
                take(&mut bucket.rows)
            })
            .collect()
    }
}

#[test]
fn test_same_check_shares_bucket() {
    let mut table = BucketTable::new(8);
    let a = table.store_hashed(0, 3, 77).unwrap();
    let b = table.store_hashed(1, 3, 77).unwrap();
    assert_eq!(a, 3);
    assert_eq!(a, b);
    assert_eq!(table.n_used(), 1);
}

#[test]
fn test_probe_past_foreign_bucket() {
    let mut table = BucketTable::new(8);
    table.store_hashed(0, 7, 1).unwrap();
    // same slot, different owner: wraps around to slot 0
    let idx = table.store_hashed(1, 15, 2).unwrap();
    assert_eq!(idx, 0);
    assert_eq!(table.drain(), vec![vec![0], vec![1]]);
}

#[test]
fn test_table_full() {
    let mut table = BucketTable::new(2);
    table.store_hashed(0, 0, 1).unwrap();
    table.store_hashed(1, 0, 2).unwrap();
    let res = table.store_hashed(2, 0, 3);
    assert!(matches!(res, Err(LshError::TableFull(2))));
}

#[test]
fn test_drain_resets() {
    let mut table = BucketTable::new(4);
    table.store_hashed(0, 1, 5).unwrap();
    table.store_hashed(3, 1, 5).unwrap();
    table.store_hashed(2, 2, 6).unwrap();
    assert_eq!(table.drain(), vec![vec![0, 3], vec![2]]);
    assert_eq!(table.n_used(), 0);
    assert!(table.drain().is_empty());
    // the slot is free for a new owner
    assert_eq!(table.store_hashed(4, 1, 9).unwrap(), 1);
}

#[test]
fn test_store_signature() {
    let mut rng = crate::random::LshRng::seeded(3);
    let hash = UniversalHash::draw(&mut rng, 2);
    let mut table = BucketTable::new(64);
    let a = table.store(0, &[10, 20], &hash).unwrap();
    let b = table.store(1, &[10, 20], &hash).unwrap();
    assert_eq!(a, b);
    assert_eq!(table.drain(), vec![vec![0, 1]]);
}
