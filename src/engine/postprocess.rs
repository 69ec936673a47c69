// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Post-processing of mined and clustered stores.

use log::*;
use ndarray::{Array1, Array2, Axis};

use crate::errors::{LshError, Result};
use crate::sparse::{Row, SparseStore, VectorStore, Weight};

/// Reorder a row's entries by descending weight, keeping ties in their original order.
pub fn sort_by_frequency_back<W: Weight>(row: &mut Row<W>) {
    row.sort_by_weight_desc();
}

/// Keep only rows with between `min_size` and `max_size` entries (inclusive).
pub fn cutoff<W: Weight>(store: &mut SparseStore<W>, min_size: usize, max_size: usize) {
    store.delete_smallest(min_size);
    store.delete_largest(max_size);
}

/// Compute the mean vector of each labeled group of rows.
///
/// `labels` holds one cluster label per row; labels must cover `0..=max`
/// without gaps.  Row `c` of the result is the centroid of cluster `c`,
/// with zero components omitted.
pub fn centers_from_labels<W: Weight>(
    store: &SparseStore<W>,
    labels: &[i64],
) -> Result<VectorStore> {
    if labels.len() != store.size() {
        return Err(LshError::InvalidLabeling(format!(
            "{} labels for {} rows",
            labels.len(),
            store.size()
        )));
    }
    if let Some((i, l)) = labels.iter().enumerate().find(|(_, l)| **l < 0) {
        return Err(LshError::InvalidLabeling(format!(
            "row {} has negative label {}",
            i, l
        )));
    }

    let n_clusters = match labels.iter().max() {
        None => 0,
        // n rows cover at most n contiguous labels
        Some(&m) if m as u64 >= labels.len() as u64 => {
            return Err(LshError::InvalidLabeling(format!(
                "label {} exceeds the {} labeled rows, so labels have gaps",
                m,
                labels.len()
            )));
        }
        Some(&m) => m as usize + 1,
    };
    let mut counts = Array1::<f64>::zeros(n_clusters);
    let mut sums = Array2::<f64>::zeros((n_clusters, store.dim()));
    for (row, &l) in store.rows().zip(labels) {
        let c = l as usize;
        counts[c] += 1.0;
        for e in row {
            sums[(c, e.key as usize)] += e.weight.to_f64();
        }
    }
    if let Some(c) = counts.iter().position(|n| *n == 0.0) {
        return Err(LshError::InvalidLabeling(format!(
            "labels are not contiguous: no row has label {}",
            c
        )));
    }

    sums /= &counts.insert_axis(Axis(1));
    debug!(
        "computed {} centers over {} dimensions",
        n_clusters,
        store.dim()
    );
    VectorStore::from_dense(sums.view())
}

#[cfg(test)]
use crate::sparse::ListStore;

#[test]
fn test_sort_row() {
    let mut row = Row::from_entries(vec![
        crate::sparse::Entry::new(3, 1u32),
        crate::sparse::Entry::new(1, 5),
        crate::sparse::Entry::new(8, 1),
    ]);
    sort_by_frequency_back(&mut row);
    assert_eq!(row.keys().collect::<Vec<_>>(), vec![1, 3, 8]);
}

#[test]
fn test_cutoff_idempotent() {
    let mut store = ListStore::create(0, 5).unwrap();
    store.push_row(vec![(0, 1)]).unwrap();
    store.push_row(vec![(0, 1), (1, 1)]).unwrap();
    store.push_row(vec![(0, 1), (1, 1), (2, 1), (3, 1)]).unwrap();
    cutoff(&mut store, 2, 3);
    assert_eq!(store.size(), 1);
    let once = store.clone();
    cutoff(&mut store, 2, 3);
    assert_eq!(store, once);
}

#[test]
fn test_centers() {
    let mut store = ListStore::create(0, 4).unwrap();
    store.push_row(vec![(0, 2), (1, 4)]).unwrap();
    store.push_row(vec![(3, 1)]).unwrap();
    store.push_row(vec![(0, 4)]).unwrap();
    let centers = centers_from_labels(&store, &[0, 1, 0]).unwrap();
    assert_eq!(centers.size(), 2);
    assert_eq!(centers.dim(), 4);
    let c0: Vec<(u32, f64)> = centers[0].iter().map(|e| (e.key, e.weight)).collect();
    assert_eq!(c0, vec![(0, 3.0), (1, 2.0)]);
    let c1: Vec<(u32, f64)> = centers[1].iter().map(|e| (e.key, e.weight)).collect();
    assert_eq!(c1, vec![(3, 1.0)]);
}

#[test]
fn test_centers_bad_labels() {
    let mut store = ListStore::create(0, 4).unwrap();
    store.push_row(vec![(0, 2)]).unwrap();
    store.push_row(vec![(3, 1)]).unwrap();
    for labels in [&[0i64][..], &[0, -1], &[0, 2]] {
        let res = centers_from_labels(&store, labels);
        assert!(matches!(res, Err(LshError::InvalidLabeling(_))));
    }
}

#[test]
fn test_centers_huge_label() {
    let mut store = ListStore::create(0, 4).unwrap();
    store.push_row(vec![(0, 2)]).unwrap();
    store.push_row(vec![(3, 1)]).unwrap();
    let res = centers_from_labels(&store, &[0, i64::MAX]);
    assert!(matches!(res, Err(LshError::InvalidLabeling(_))));
}

#[test]
fn test_centers_empty() {
    let store = VectorStore::create(0, 3).unwrap();
    let centers = centers_from_labels(&store, &[]).unwrap();
    assert!(centers.is_empty());
    assert_eq!(centers.dim(), 3);
}
