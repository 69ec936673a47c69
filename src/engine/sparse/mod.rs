// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sparse list store.
//!
//! A store is a sequence of rows, each row an insertion-ordered list of
//! `(key, weight)` entries, plus a declared dimensionality bounding the keys.
//! The same container serves integer frequency lists ([ListStore]) and
//! real-valued vectors ([VectorStore]).

use std::fmt::{Debug, Display};
use std::ops::Index;
use std::str::FromStr;

use ::arrow::datatypes::{ArrowPrimitiveType, Float64Type, UInt32Type};
use log::*;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{LshError, Result};

mod arrow_rows;
mod coo;
mod dense;

pub use arrow_rows::ArrowRowConsumer;
pub use coo::{TripletBuilder, Triplets};

/// Largest supported dimensionality (keys are 32-bit).
pub const MAX_DIM: u64 = 1 << 32;

/// Trait for the weight types a store can hold.
pub trait Weight:
    Copy + Default + PartialOrd + Debug + Display + FromStr + Send + Sync + 'static
{
    /// Arrow type used when exporting the weights.
    type Arrow: ArrowPrimitiveType<Native = Self>;

    /// Convert the weight to a float.
    fn to_f64(self) -> f64;

    /// Check whether a weight may be stored.
    fn is_valid(self) -> bool;

    /// Total-order key for sorting by weight.
    fn ordered(self) -> OrderedFloat<f64> {
        OrderedFloat(self.to_f64())
    }

    fn is_zero(self) -> bool {
        self.to_f64() == 0.0
    }
}

impl Weight for u32 {
    type Arrow = UInt32Type;

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn is_valid(self) -> bool {
        true
    }

    fn is_zero(self) -> bool {
        self == 0
    }
}

impl Weight for f64 {
    type Arrow = Float64Type;

    fn to_f64(self) -> f64 {
        self
    }

    fn is_valid(self) -> bool {
        !self.is_nan()
    }
}

/// A single entry in a row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entry<W> {
    pub key: u32,
    pub weight: W,
}

impl<W> Entry<W> {
    pub fn new(key: u32, weight: W) -> Self {
        Entry { key, weight }
    }
}

/// A sparse row.  Keys are not deduplicated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row<W> {
    entries: Vec<Entry<W>>,
}

impl<W: Weight> Row<W> {
    pub fn new() -> Self {
        Row {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Row {
            entries: Vec::with_capacity(cap),
        }
    }

    pub fn from_entries(entries: Vec<Entry<W>>) -> Self {
        Row { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry<W>] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<Entry<W>> {
        &mut self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry<W>> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    /// Get the weight of the first entry with a key.
    pub fn get(&self, key: u32) -> Option<W> {
        self.entries.iter().find(|e| e.key == key).map(|e| e.weight)
    }

    /// The distinct keys of the row, in ascending order.
    pub fn distinct_keys(&self) -> Vec<u32> {
        let mut keys: Vec<u32> = self.keys().collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Sum of the entry weights.
    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|e| e.weight.to_f64()).sum()
    }

    pub(crate) fn push_unchecked(&mut self, key: u32, weight: W) {
        self.entries.push(Entry { key, weight });
    }

    /// Reorder entries by decreasing weight, keeping ties in place.
    pub fn sort_by_weight_desc(&mut self) {
        self.entries
            .sort_by(|a, b| b.weight.ordered().cmp(&a.weight.ordered()));
    }
}

impl<'a, W> IntoIterator for &'a Row<W> {
    type Item = &'a Entry<W>;
    type IntoIter = std::slice::Iter<'a, Entry<W>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Sparse store of weighted rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseStore<W> {
    dim: usize,
    rows: Vec<Row<W>>,
}

/// Store of integer frequency lists.
pub type ListStore = SparseStore<u32>;
/// Store of real-valued sparse vectors.
pub type VectorStore = SparseStore<f64>;

fn check_dim(dim: usize) -> Result<()> {
    if dim as u64 > MAX_DIM {
        Err(LshError::InvalidDimension(format!(
            "dimension {} exceeds the 32-bit key space",
            dim
        )))
    } else {
        Ok(())
    }
}

impl<W: Weight> SparseStore<W> {
    /// Create a store with `size` empty rows.
    pub fn create(size: usize, dim: usize) -> Result<Self> {
        check_dim(dim)?;
        Ok(SparseStore {
            dim,
            rows: vec![Row::new(); size],
        })
    }

    /// Create a store from pre-built rows, checking the keys against `dim`.
    pub fn from_rows(dim: usize, rows: Vec<Row<W>>) -> Result<Self> {
        check_dim(dim)?;
        let store = SparseStore { dim, rows };
        for (i, row) in store.rows.iter().enumerate() {
            for e in row {
                store.check_entry(i, e.key, e.weight)?;
            }
        }
        Ok(store)
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Declared dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total number of entries.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Row::len).sum()
    }

    pub fn row(&self, row: usize) -> Option<&Row<W>> {
        self.rows.get(row)
    }

    /// Iterate over the rows in store order.
    pub fn rows(&self) -> std::slice::Iter<'_, Row<W>> {
        self.rows.iter()
    }

    pub(crate) fn rows_slice(&self) -> &[Row<W>] {
        &self.rows
    }

    fn check_entry(&self, row: usize, key: u32, weight: W) -> Result<()> {
        if key as usize >= self.dim {
            return Err(LshError::OutOfRange(format!(
                "key {} in row {} exceeds dimension {}",
                key, row, self.dim
            )));
        }
        if !weight.is_valid() {
            return Err(LshError::InvalidParameter(format!(
                "invalid weight {} for key {} in row {}",
                weight, key, row
            )));
        }
        Ok(())
    }

    /// Append an entry to a row.
    pub fn push(&mut self, row: usize, key: u32, weight: W) -> Result<()> {
        if row >= self.rows.len() {
            return Err(LshError::OutOfRange(format!(
                "row {} exceeds store size {}",
                row,
                self.rows.len()
            )));
        }
        self.check_entry(row, key, weight)?;
        self.rows[row].push_unchecked(key, weight);
        Ok(())
    }

    /// Append a new row, returning its index.  Nothing is added if any entry is invalid.
    pub fn push_row<I: IntoIterator<Item = (u32, W)>>(&mut self, entries: I) -> Result<usize> {
        let idx = self.rows.len();
        let mut row = Row::new();
        for (key, weight) in entries {
            self.check_entry(idx, key, weight)?;
            row.push_unchecked(key, weight);
        }
        self.rows.push(row);
        Ok(idx)
    }

    pub(crate) fn push_built_row(&mut self, row: Row<W>) {
        debug_assert!(row.keys().all(|k| (k as usize) < self.dim));
        self.rows.push(row);
    }

    /// Remove rows with fewer than `min_size` entries.
    pub fn delete_smallest(&mut self, min_size: usize) {
        let before = self.rows.len();
        self.rows.retain(|r| r.len() >= min_size);
        debug!(
            "removed {} rows with fewer than {} entries",
            before - self.rows.len(),
            min_size
        );
    }

    /// Remove rows with more than `max_size` entries.
    pub fn delete_largest(&mut self, max_size: usize) {
        let before = self.rows.len();
        self.rows.retain(|r| r.len() <= max_size);
        debug!(
            "removed {} rows with more than {} entries",
            before - self.rows.len(),
            max_size
        );
    }

    /// Apply a transformation to every row in place.
    pub fn apply_to_all<F>(&mut self, func: F)
    where
        F: Fn(&mut Row<W>) + Sync + Send,
    {
        self.rows.par_iter_mut().for_each(|r| func(r));
    }

    /// Append the rows of another store with the same dimensionality.
    pub fn append(&mut self, other: SparseStore<W>) -> Result<()> {
        if other.dim != self.dim {
            return Err(LshError::InvalidDimension(format!(
                "cannot append store of dimension {} to store of dimension {}",
                other.dim, self.dim
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Compute the inverted file: one row per key, listing the rows that contain it.
    pub fn transpose(&self) -> SparseStore<W> {
        let mut rows = vec![Row::new(); self.dim];
        for (i, row) in self.rows.iter().enumerate() {
            for e in row {
                rows[e.key as usize].push_unchecked(i as u32, e.weight);
            }
        }
        debug!(
            "transposed {}x{} store with {} entries",
            self.rows.len(),
            self.dim,
            self.nnz()
        );
        SparseStore {
            dim: self.rows.len(),
            rows,
        }
    }
}

impl ListStore {
    /// Convert integer frequencies to real values.
    pub fn to_vectors(&self) -> VectorStore {
        let rows = self
            .rows
            .iter()
            .map(|r| {
                Row::from_entries(
                    r.iter()
                        .map(|e| Entry::new(e.key, e.weight as f64))
                        .collect(),
                )
            })
            .collect();
        SparseStore {
            dim: self.dim,
            rows,
        }
    }
}

impl VectorStore {
    /// Convert real values to integer frequencies by multiplying and rounding.
    ///
    /// Entries that round to zero are dropped.
    pub fn scale_to_lists(&self, factor: f64) -> Result<ListStore> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(LshError::InvalidParameter(format!(
                "scale factor {} must be positive",
                factor
            )));
        }
        let mut rows = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            let mut out = Row::with_capacity(row.len());
            for e in row {
                let v = (e.weight * factor).round();
                if v < 0.0 || v > u32::MAX as f64 {
                    return Err(LshError::InvalidParameter(format!(
                        "scaled weight {} for key {} in row {} is not a valid frequency",
                        v, e.key, i
                    )));
                }
                if v > 0.0 {
                    out.push_unchecked(e.key, v as u32);
                }
            }
            rows.push(out);
        }
        Ok(SparseStore {
            dim: self.dim,
            rows,
        })
    }
}

impl<W> Index<usize> for SparseStore<W> {
    type Output = Row<W>;

    fn index(&self, index: usize) -> &Row<W> {
        &self.rows[index]
    }
}

impl<'a, W> IntoIterator for &'a SparseStore<W> {
    type Item = &'a Row<W>;
    type IntoIter = std::slice::Iter<'a, Row<W>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
fn sample_store() -> ListStore {
    let mut store = ListStore::create(4, 10).unwrap();
    store.push(0, 1, 3).unwrap();
    store.push(0, 2, 1).unwrap();
    store.push(1, 1, 2).unwrap();
    store.push(1, 2, 4).unwrap();
    store.push(2, 5, 1).unwrap();
    store.push(3, 1, 1).unwrap();
    store
}

#[test]
fn test_create_empty() {
    let store = ListStore::create(3, 7).unwrap();
    assert_eq!(store.size(), 3);
    assert_eq!(store.dim(), 7);
    assert_eq!(store.nnz(), 0);
    assert!(store.rows().all(Row::is_empty));
}

#[test]
fn test_create_too_wide() {
    let res = ListStore::create(1, (MAX_DIM + 1) as usize);
    assert!(matches!(res, Err(LshError::InvalidDimension(_))));
}

#[test]
fn test_push_bounds() {
    let mut store = sample_store();
    assert!(matches!(store.push(4, 1, 1), Err(LshError::OutOfRange(_))));
    assert!(matches!(store.push(0, 10, 1), Err(LshError::OutOfRange(_))));
    assert_eq!(store.nnz(), 6);
}

#[test]
fn test_push_duplicate_key() {
    let mut store = sample_store();
    store.push(0, 1, 5).unwrap();
    let row = &store[0];
    assert_eq!(row.len(), 3);
    assert_eq!(row.get(1), Some(3));
    assert_eq!(row.distinct_keys(), vec![1, 2]);
}

#[test]
fn test_push_nan() {
    let mut store = VectorStore::create(1, 4).unwrap();
    assert!(matches!(
        store.push(0, 1, f64::NAN),
        Err(LshError::InvalidParameter(_))
    ));
    store.push(0, 1, -2.5).unwrap();
    assert_eq!(store[0].get(1), Some(-2.5));
}

#[test]
fn test_push_row_atomic() {
    let mut store = sample_store();
    let res = store.push_row(vec![(1, 1), (12, 1)]);
    assert!(res.is_err());
    assert_eq!(store.size(), 4);
    let idx = store.push_row(vec![(3, 2), (4, 1)]).unwrap();
    assert_eq!(idx, 4);
    assert_eq!(store[4].keys().collect::<Vec<_>>(), vec![3, 4]);
}

#[test]
fn test_delete_smallest() {
    let mut store = sample_store();
    store.delete_smallest(2);
    assert_eq!(store.size(), 2);
    assert_eq!(store[0].get(1), Some(3));
    assert_eq!(store[1].get(2), Some(4));
}

#[test]
fn test_delete_smallest_idempotent() {
    let mut once = sample_store();
    once.delete_smallest(2);
    let mut twice = once.clone();
    twice.delete_smallest(2);
    assert_eq!(once, twice);
}

#[test]
fn test_delete_largest_to_empty() {
    let mut store = sample_store();
    store.delete_largest(0);
    assert_eq!(store.size(), 0);
    assert!(store.is_empty());
}

#[test]
fn test_apply_to_all() {
    let mut store = sample_store();
    store.apply_to_all(Row::sort_by_weight_desc);
    assert_eq!(store[1].keys().collect::<Vec<_>>(), vec![2, 1]);
    assert_eq!(store[0].keys().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_sort_stable_ties() {
    let mut row: Row<u32> = Row::new();
    row.push_unchecked(4, 1);
    row.push_unchecked(2, 3);
    row.push_unchecked(9, 1);
    row.push_unchecked(1, 3);
    row.sort_by_weight_desc();
    assert_eq!(row.keys().collect::<Vec<_>>(), vec![2, 1, 4, 9]);
}

#[test]
fn test_transpose() {
    let store = sample_store();
    let inv = store.transpose();
    assert_eq!(inv.size(), 10);
    assert_eq!(inv.dim(), 4);
    assert_eq!(inv[1].keys().collect::<Vec<_>>(), vec![0, 1, 3]);
    assert_eq!(inv[1].get(1), Some(2));
    assert_eq!(inv[5].keys().collect::<Vec<_>>(), vec![2]);
    assert!(inv[0].is_empty());
    assert_eq!(inv.transpose(), store);
}

#[test]
fn test_append_dims() {
    let mut store = sample_store();
    let other = ListStore::create(2, 10).unwrap();
    store.append(other).unwrap();
    assert_eq!(store.size(), 6);
    let wrong = ListStore::create(1, 11).unwrap();
    assert!(matches!(
        store.append(wrong),
        Err(LshError::InvalidDimension(_))
    ));
}

#[test]
fn test_rows_restartable() {
    let store = sample_store();
    let first: usize = store.rows().map(Row::len).sum();
    let second: usize = store.rows().map(Row::len).sum();
    assert_eq!(first, second);
    assert_eq!(first, store.nnz());
}

#[test]
fn test_scale_to_lists() {
    let mut store = VectorStore::create(1, 4).unwrap();
    store.push(0, 0, 0.25).unwrap();
    store.push(0, 3, 0.001).unwrap();
    let lists = store.scale_to_lists(100.0).unwrap();
    assert_eq!(lists[0].entries(), &[Entry::new(0, 25)]);
    assert!(store.scale_to_lists(0.0).is_err());
}
