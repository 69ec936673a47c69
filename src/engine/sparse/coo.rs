// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sparse coordinate (row, column, value) triplets.

use crate::errors::{LshError, Result};

use super::{SparseStore, Weight};

/// Coordinate triplets for a sparse store.
#[derive(Debug, Clone, PartialEq)]
pub struct Triplets<W> {
    pub row: Vec<u32>,
    pub col: Vec<u32>,
    pub val: Vec<W>,
}

impl<W> Triplets<W> {
    pub fn len(&self) -> usize {
        self.row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row.is_empty()
    }
}

/// Builder for coordinate triplets.
pub struct TripletBuilder<W> {
    row: Vec<u32>,
    col: Vec<u32>,
    val: Vec<W>,
}

impl<W: Weight> TripletBuilder<W> {
    /// Initialize a builder with a specified capacity.
    pub fn with_capacity(cap: usize) -> Self {
        TripletBuilder {
            row: Vec::with_capacity(cap),
            col: Vec::with_capacity(cap),
            val: Vec::with_capacity(cap),
        }
    }

    pub fn add_entry(&mut self, row: u32, col: u32, val: W) {
        self.row.push(row);
        self.col.push(col);
        self.val.push(val);
    }

    /// Finish the triplets.
    pub fn finish(self) -> Triplets<W> {
        Triplets {
            row: self.row,
            col: self.col,
            val: self.val,
        }
    }
}

impl<W: Weight> SparseStore<W> {
    /// Build a store from coordinate triplets.
    ///
    /// Entries are appended to their rows in triplet order.
    pub fn from_triplets(
        size: usize,
        dim: usize,
        rows: &[u32],
        cols: &[u32],
        vals: &[W],
    ) -> Result<Self> {
        if rows.len() != cols.len() || rows.len() != vals.len() {
            return Err(LshError::InvalidParameter(format!(
                "triplet length mismatch: {} rows, {} columns, {} values",
                rows.len(),
                cols.len(),
                vals.len()
            )));
        }
        let mut store = Self::create(size, dim)?;
        for i in 0..rows.len() {
            store.push(rows[i] as usize, cols[i], vals[i])?;
        }
        Ok(store)
    }

    /// Extract the store's entries as coordinate triplets, in row order.
    pub fn to_triplets(&self) -> Triplets<W> {
        let mut bld = TripletBuilder::with_capacity(self.nnz());
        for (i, row) in self.rows().enumerate() {
            for e in row {
                bld.add_entry(i as u32, e.key, e.weight);
            }
        }
        bld.finish()
    }
}

#[test]
fn test_from_triplets() {
    let store =
        SparseStore::<u32>::from_triplets(3, 5, &[0, 2, 0], &[4, 1, 2], &[7, 1, 2]).unwrap();
    assert_eq!(store.size(), 3);
    assert_eq!(store[0].keys().collect::<Vec<_>>(), vec![4, 2]);
    assert!(store[1].is_empty());
    assert_eq!(store[2].get(1), Some(1));
}

#[test]
fn test_triplet_mismatch() {
    let res = SparseStore::<f64>::from_triplets(1, 5, &[0, 0], &[1], &[1.0, 2.0]);
    assert!(matches!(res, Err(LshError::InvalidParameter(_))));
}

#[test]
fn test_triplet_out_of_range() {
    let res = SparseStore::<u32>::from_triplets(1, 5, &[1], &[1], &[1]);
    assert!(matches!(res, Err(LshError::OutOfRange(_))));
    let res = SparseStore::<u32>::from_triplets(1, 5, &[0], &[5], &[1]);
    assert!(matches!(res, Err(LshError::OutOfRange(_))));
}

#[test]
fn test_to_triplets() {
    let store =
        SparseStore::<u32>::from_triplets(2, 5, &[1, 0, 1], &[3, 0, 4], &[2, 1, 5]).unwrap();
    let trip = store.to_triplets();
    assert_eq!(trip.row, vec![0, 1, 1]);
    assert_eq!(trip.col, vec![0, 3, 4]);
    assert_eq!(trip.val, vec![1, 2, 5]);
    let back = SparseStore::from_triplets(2, 5, &trip.row, &trip.col, &trip.val).unwrap();
    assert_eq!(back, store);
}
