// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Bucket-driven single-linkage clustering of mined topics (mhlink).
//!
//! Topics are min-hashed on their key sets; only topics that share a bucket
//! in some repetition are ever compared.  Candidate pairs whose overlap
//! reaches the threshold are linked, and each sufficiently large connected
//! group becomes one cluster.

use std::cmp::Reverse;

use hashbrown::HashSet;
use log::*;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::{Deserialize, Serialize};

use crate::check_positive;
use crate::errors::{LshError, Result};
use crate::hashing::WeightedSampling;
use crate::mining::{scan_buckets, MiningParams, TopicMode};
use crate::parallel::{maybe_fuse, Parallelism};
use crate::random::LshContext;
use crate::sparse::{ListStore, Row};

mod linkage;

use linkage::Linkage;
pub use linkage::Overlap;

/// How member weights combine in a cluster's representative row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Add weights (saturating).
    #[default]
    Sum,
    /// Keep the largest weight.
    Max,
}

impl MergePolicy {
    fn combine(&self, a: u32, b: u32) -> u32 {
        match self {
            MergePolicy::Sum => a.saturating_add(b),
            MergePolicy::Max => a.max(b),
        }
    }
}

/// Parameters for mhlink clustering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    pub tuple_size: usize,
    pub num_tuples: usize,
    pub table_size: usize,
    pub threshold: f64,
    pub min_cluster_size: usize,
    pub overlap: Overlap,
    pub merge: MergePolicy,
    pub parallelism: Parallelism,
}

impl Default for ClusterParams {
    fn default() -> Self {
        ClusterParams {
            tuple_size: 3,
            num_tuples: 255,
            table_size: 1 << 20,
            threshold: 0.7,
            min_cluster_size: 3,
            overlap: Overlap::default(),
            merge: MergePolicy::default(),
            parallelism: Parallelism::default(),
        }
    }
}

impl ClusterParams {
    pub fn validate(&self) -> Result<()> {
        check_positive!(self.tuple_size, "tuple_size");
        check_positive!(self.num_tuples, "num_tuples");
        check_positive!(self.table_size, "table_size");
        check_positive!(self.min_cluster_size, "min_cluster_size");
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(LshError::InvalidParameter(format!(
                "threshold {} must be in (0, 1]",
                self.threshold
            )));
        }
        Ok(())
    }

    fn hashing(&self) -> MiningParams {
        MiningParams {
            tuple_size: self.tuple_size,
            num_tuples: self.num_tuples,
            table_size: self.table_size,
            max_value: 1,
            topics: TopicMode::Buckets,
            parallelism: self.parallelism,
        }
    }
}

/// Result of clustering: one representative row per cluster, and its member topics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub clusters: ListStore,
    pub members: Vec<Vec<u32>>,
}

/// Cluster mined topics by bucket-driven single linkage.
pub fn mhlink(
    topics: &ListStore,
    params: &ClusterParams,
    ctx: &mut LshContext,
) -> Result<Clustering> {
    params.validate()?;
    let n = topics.size();
    info!(
        "clustering {} topics (threshold {}, {:?} overlap)",
        n, params.threshold, params.overlap
    );

    let pairs = candidate_pairs(topics, params, ctx)?;
    let keys: Vec<Vec<u32>> = topics
        .rows_slice()
        .par_iter()
        .map(Row::distinct_keys)
        .collect();

    let overlap = params.overlap;
    let scores = maybe_fuse(pairs.par_iter().map(|&(i, j)| {
        let ov = overlap.measure(&keys[i as usize], &keys[j as usize]);
        (OrderedFloat(ov), i, j)
    }));
    let mut scored: Vec<(OrderedFloat<f64>, u32, u32)> = scores
        .filter(|(ov, _, _)| ov.0 >= params.threshold)
        .collect();
    scored.sort_unstable_by_key(|&(ov, i, j)| (Reverse(ov), i, j));
    debug!(
        "{} of {} candidate pairs reach the threshold",
        scored.len(),
        pairs.len()
    );

    let mut link = Linkage::new(n);
    let mut n_merges = 0;
    for (_ov, i, j) in scored {
        if link.merge(i as usize, j as usize) {
            n_merges += 1;
        }
    }
    debug!("performed {} merges", n_merges);

    let members: Vec<Vec<u32>> = link
        .groups()
        .into_iter()
        .filter(|g| g.len() >= params.min_cluster_size)
        .collect();

    let mut clusters = ListStore::create(0, topics.dim())?;
    for group in &members {
        clusters.push_built_row(representative(topics, group, params.merge));
    }
    info!(
        "kept {} clusters of at least {} topics",
        clusters.size(),
        params.min_cluster_size
    );

    Ok(Clustering { clusters, members })
}

/// Find the distinct pairs of topics that shared a bucket in some repetition.
fn candidate_pairs(
    topics: &ListStore,
    params: &ClusterParams,
    ctx: &mut LshContext,
) -> Result<Vec<(u32, u32)>> {
    let tuple_size = params.tuple_size;
    let mut seen: HashSet<(u32, u32), FxBuildHasher> = HashSet::with_hasher(FxBuildHasher);
    scan_buckets(
        topics,
        &params.hashing(),
        ctx,
        |rng| WeightedSampling::draw(rng, tuple_size, 1),
        |bucket| {
            for (x, &i) in bucket.iter().enumerate() {
                for &j in &bucket[x + 1..] {
                    seen.insert((i, j));
                }
            }
        },
    )?;
    let mut pairs: Vec<(u32, u32)> = seen.into_iter().collect();
    pairs.sort_unstable();
    debug!("found {} candidate pairs", pairs.len());
    Ok(pairs)
}

/// Union of the members' entries, heaviest first.
fn representative(topics: &ListStore, group: &[u32], policy: MergePolicy) -> Row<u32> {
    let mut acc: FxHashMap<u32, u32> = FxHashMap::default();
    for &m in group {
        for e in &topics[m as usize] {
            acc.entry(e.key)
                .and_modify(|w| *w = policy.combine(*w, e.weight))
                .or_insert(e.weight);
        }
    }
    let mut entries: Vec<(u32, u32)> = acc.into_iter().collect();
    entries.sort_unstable();
    let mut row = Row::with_capacity(entries.len());
    for (k, w) in entries {
        row.push_unchecked(k, w);
    }
    row.sort_by_weight_desc();
    row
}

#[cfg(test)]
fn topic_store(dim: usize, rows: &[&[(u32, u32)]]) -> ListStore {
    let mut store = ListStore::create(0, dim).unwrap();
    for r in rows {
        store.push_row(r.iter().copied()).unwrap();
    }
    store
}

#[cfg(test)]
fn params(threshold: f64, min_size: usize) -> ClusterParams {
    ClusterParams {
        num_tuples: 100,
        table_size: 1024,
        threshold,
        min_cluster_size: min_size,
        ..Default::default()
    }
}

#[test]
fn test_params_validate() {
    assert!(ClusterParams::default().validate().is_ok());
    for t in [0.0, -0.5, 1.5, f64::NAN] {
        let p = ClusterParams {
            threshold: t,
            ..Default::default()
        };
        assert!(matches!(p.validate(), Err(LshError::InvalidParameter(_))));
    }
    let p = ClusterParams {
        min_cluster_size: 0,
        ..Default::default()
    };
    assert!(p.validate().is_err());
    let p = ClusterParams {
        threshold: 1.0,
        ..Default::default()
    };
    assert!(p.validate().is_ok());
}

#[test]
fn test_empty_input() {
    let topics = ListStore::create(0, 4).unwrap();
    let res = mhlink(&topics, &ClusterParams::default(), &mut LshContext::seeded(1)).unwrap();
    assert!(res.clusters.is_empty());
    assert!(res.members.is_empty());
    assert_eq!(res.clusters.dim(), 4);
}

#[test]
fn test_identical_topics_merge() {
    let topics = topic_store(
        10,
        &[
            &[(0, 4), (1, 2), (3, 1)],
            &[(7, 1), (8, 1)],
            &[(1, 3), (3, 2), (0, 1)],
            &[(3, 5), (0, 1), (1, 1)],
        ],
    );
    let res = mhlink(&topics, &params(0.9, 2), &mut LshContext::seeded(4)).unwrap();
    assert_eq!(res.members, vec![vec![0, 2, 3]]);
    let row: Vec<(u32, u32)> = res.clusters[0].iter().map(|e| (e.key, e.weight)).collect();
    assert_eq!(row, vec![(3, 8), (0, 6), (1, 6)]);
}

#[test]
fn test_merge_policy_max() {
    let topics = topic_store(5, &[&[(0, 4), (1, 2)], &[(1, 3), (0, 1)]]);
    let p = ClusterParams {
        merge: MergePolicy::Max,
        ..params(1.0, 2)
    };
    let res = mhlink(&topics, &p, &mut LshContext::seeded(4)).unwrap();
    let row: Vec<(u32, u32)> = res.clusters[0].iter().map(|e| (e.key, e.weight)).collect();
    assert_eq!(row, vec![(0, 4), (1, 3)]);
}

#[test]
fn test_min_cluster_size_discards() {
    let topics = topic_store(6, &[&[(0, 1), (1, 1)], &[(0, 1), (1, 1)], &[(4, 1), (5, 1)]]);
    let res = mhlink(&topics, &params(0.5, 3), &mut LshContext::seeded(2)).unwrap();
    assert!(res.clusters.is_empty());
    let res = mhlink(&topics, &params(0.5, 1), &mut LshContext::seeded(2)).unwrap();
    assert_eq!(res.members, vec![vec![0, 1], vec![2]]);
}

#[test]
fn test_deterministic() {
    let topics = topic_store(
        12,
        &[
            &[(0, 1), (1, 1), (2, 1), (3, 1)],
            &[(1, 1), (2, 1), (3, 1), (4, 1)],
            &[(2, 1), (3, 1), (4, 1), (5, 1)],
            &[(8, 1), (9, 1), (10, 1)],
            &[(9, 1), (10, 1), (11, 1)],
        ],
    );
    let p = params(0.5, 2);
    let a = mhlink(&topics, &p, &mut LshContext::seeded(11)).unwrap();
    let b = mhlink(&topics, &p, &mut LshContext::seeded(11)).unwrap();
    assert_eq!(a, b);
}
