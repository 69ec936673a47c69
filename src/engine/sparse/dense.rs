// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Dense array conversion.

use log::*;
use ndarray::{Array2, ArrayView2};

use crate::errors::Result;

use super::{Row, SparseStore, Weight};

impl<W: Weight> SparseStore<W> {
    /// Convert the store to a dense `size × dim` array.
    ///
    /// Repeated keys in a row are summed.
    pub fn to_dense(&self) -> Array2<f64> {
        debug!("densifying {}x{} store", self.size(), self.dim());
        let mut arr = Array2::zeros((self.size(), self.dim()));
        for (i, row) in self.rows().enumerate() {
            for e in row {
                arr[(i, e.key as usize)] += e.weight.to_f64();
            }
        }
        arr
    }

    /// Build a store from a dense array, omitting zero entries.
    pub fn from_dense(arr: ArrayView2<'_, W>) -> Result<Self> {
        let (n, dim) = arr.dim();
        let mut rows = Vec::with_capacity(n);
        for arow in arr.rows() {
            let mut row = Row::new();
            for (j, v) in arow.iter().enumerate() {
                if !v.is_zero() {
                    row.push_unchecked(j as u32, *v);
                }
            }
            rows.push(row);
        }
        Self::from_rows(dim, rows)
    }
}

#[test]
fn test_dense_round_trip() {
    let arr = ndarray::array![[0u32, 3, 0], [1, 0, 0], [0, 0, 0]];
    let store = SparseStore::from_dense(arr.view()).unwrap();
    assert_eq!(store.size(), 3);
    assert_eq!(store.dim(), 3);
    assert_eq!(store.nnz(), 2);
    assert!(store[2].is_empty());
    let dense = store.to_dense();
    assert_eq!(dense, arr.mapv(|v| v as f64));
}

#[test]
fn test_dense_sums_duplicates() {
    let mut store = SparseStore::<f64>::create(1, 2).unwrap();
    store.push(0, 1, 0.5).unwrap();
    store.push(0, 1, 1.0).unwrap();
    let dense = store.to_dense();
    assert_eq!(dense[(0, 1)], 1.5);
    assert_eq!(dense[(0, 0)], 0.0);
}
