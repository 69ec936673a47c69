// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Overlap measures and single-linkage merging.

use serde::{Deserialize, Serialize};

/// Similarity of two topics' key sets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overlap {
    /// Shared keys over the size of the smaller set.
    #[default]
    MinSize,
    /// Shared keys over the size of the union.
    Jaccard,
}

impl Overlap {
    /// Compute the overlap of two ascending, deduplicated key lists.
    pub fn measure(&self, a: &[u32], b: &[u32]) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let shared = intersection_size(a, b);
        let denom = match self {
            Overlap::MinSize => a.len().min(b.len()),
            Overlap::Jaccard => a.len() + b.len() - shared,
        };
        shared as f64 / denom as f64
    }
}

fn intersection_size(a: &[u32], b: &[u32]) -> usize {
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            i += 1;
        } else if a[i] > b[j] {
            j += 1;
        } else {
            n += 1;
            i += 1;
            j += 1;
        }
    }
    n
}

/// Disjoint-set forest over topic indices.
pub(super) struct Linkage {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl Linkage {
    pub fn new(n: usize) -> Self {
        Linkage {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            // path halving
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the clusters of two topics, returning `false` if they were already linked.
    pub fn merge(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }

    /// Group indices by cluster; groups are ascending and ordered by their smallest member.
    pub fn groups(&mut self) -> Vec<Vec<u32>> {
        let n = self.parent.len();
        let mut slot = vec![usize::MAX; n];
        let mut groups: Vec<Vec<u32>> = Vec::new();
        for i in 0..n {
            let r = self.find(i);
            if slot[r] == usize::MAX {
                slot[r] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot[r]].push(i as u32);
        }
        groups
    }
}

#[test]
fn test_overlap_measures() {
    let a = [1, 2, 3, 4];
    let b = [3, 4, 5];
    assert_eq!(Overlap::MinSize.measure(&a, &b), 2.0 / 3.0);
    assert_eq!(Overlap::Jaccard.measure(&a, &b), 2.0 / 5.0);
    assert_eq!(Overlap::MinSize.measure(&a, &[]), 0.0);
    assert_eq!(Overlap::Jaccard.measure(&b, &b), 1.0);
}

#[test]
fn test_linkage_groups() {
    let mut link = Linkage::new(6);
    assert!(link.merge(4, 1));
    assert!(link.merge(5, 3));
    assert!(link.merge(1, 5));
    assert!(!link.merge(3, 4));
    assert_eq!(link.groups(), vec![vec![0], vec![1, 3, 4, 5], vec![2]]);
}
