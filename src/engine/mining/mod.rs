// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sampled-LSH mining of co-occurring rows.
//!
//! Each repetition draws a fresh tuple family, hashes every row's signature
//! into the bucket table, and feeds the multi-row buckets to a collision
//! counter.  The counter's output is a store of mined topics whose keys are
//! input row ids.

use log::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::check_positive;
use crate::errors::{LshError, Result};
use crate::hashing::{
    BucketTable, Signature, StableDistribution, StableProjection, TupleFamily, UniversalHash,
    WeightedSampling,
};
use crate::parallel::{maybe_fuse, Parallelism};
use crate::progress::ProgressHandle;
use crate::random::{LshContext, LshRng};
use crate::sparse::{ListStore, SparseStore, VectorStore, MAX_DIM};

mod accum;

use accum::{BucketSetCounter, CollisionCounter, NeighbourhoodCounter};

/// How collisions are turned into mined topics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicMode {
    /// One topic per colliding row, listing itself and its co-colliding rows.
    #[default]
    Neighbourhood,
    /// One topic per distinct multi-row bucket.
    Buckets,
}

/// Parameters shared by both mining regimes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningParams {
    pub tuple_size: usize,
    pub num_tuples: usize,
    pub table_size: usize,
    pub max_value: u32,
    pub topics: TopicMode,
    pub parallelism: Parallelism,
}

impl Default for MiningParams {
    fn default() -> Self {
        MiningParams {
            tuple_size: 3,
            num_tuples: 100,
            table_size: 1 << 19,
            max_value: 255,
            topics: TopicMode::default(),
            parallelism: Parallelism::default(),
        }
    }
}

impl MiningParams {
    pub fn validate(&self) -> Result<()> {
        check_positive!(self.tuple_size, "tuple_size");
        check_positive!(self.num_tuples, "num_tuples");
        check_positive!(self.table_size, "table_size");
        check_positive!(self.max_value, "max_value");
        Ok(())
    }
}

/// Parameters for stable-projection mining.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LpParams {
    /// Quantization width of each projection.
    pub width: f64,
    pub distribution: StableDistribution,
}

impl Default for LpParams {
    fn default() -> Self {
        LpParams {
            width: 3.0,
            distribution: StableDistribution::Cauchy,
        }
    }
}

impl LpParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(LshError::InvalidParameter(format!(
                "width {} must be a positive number",
                self.width
            )));
        }
        Ok(())
    }
}

/// Mine co-occurring rows of an integer-weighted store by weighted sampling.
pub fn mine_l1(
    store: &ListStore,
    params: &MiningParams,
    ctx: &mut LshContext,
) -> Result<ListStore> {
    params.validate()?;
    let (tuple_size, max_value) = (params.tuple_size, params.max_value);
    info!(
        "mining {} lists with {} tuples of size {}",
        store.size(),
        params.num_tuples,
        tuple_size
    );
    run_mining(store, params, ctx, |rng| {
        WeightedSampling::draw(rng, tuple_size, max_value)
    })
}

/// Mine near-duplicate rows of a real-valued store by stable projections.
pub fn mine_lp(
    store: &VectorStore,
    params: &MiningParams,
    lp: &LpParams,
    ctx: &mut LshContext,
) -> Result<ListStore> {
    params.validate()?;
    lp.validate()?;
    let (tuple_size, dim) = (params.tuple_size, store.dim());
    let (width, dist) = (lp.width, lp.distribution);
    info!(
        "mining {} vectors with {} {:?} projections of size {} (width {})",
        store.size(),
        params.num_tuples,
        dist,
        tuple_size,
        width
    );
    run_mining(store, params, ctx, |rng| {
        StableProjection::draw(rng, tuple_size, dim, width, dist)
    })
}

fn run_mining<F, D>(
    store: &SparseStore<F::Weight>,
    params: &MiningParams,
    ctx: &mut LshContext,
    draw: D,
) -> Result<ListStore>
where
    F: TupleFamily,
    D: FnMut(&mut LshRng) -> F,
{
    match params.topics {
        TopicMode::Neighbourhood => {
            count_collisions::<F, D, NeighbourhoodCounter>(store, params, ctx, draw)
        }
        TopicMode::Buckets => count_collisions::<F, D, BucketSetCounter>(store, params, ctx, draw),
    }
}

fn count_collisions<F, D, C>(
    store: &SparseStore<F::Weight>,
    params: &MiningParams,
    ctx: &mut LshContext,
    draw: D,
) -> Result<ListStore>
where
    F: TupleFamily,
    D: FnMut(&mut LshRng) -> F,
    C: CollisionCounter,
{
    let mut counter = C::create(store.size(), params.max_value);
    let n_buckets = scan_buckets(store, params, ctx, draw, |bucket| {
        counter.record_bucket(bucket)
    })?;
    debug!(
        "found {} colliding buckets with {} counts",
        n_buckets,
        counter.nnz()
    );
    counter.finish()
}

/// Hash every row for `num_tuples` repetitions and visit each multi-row bucket.
///
/// Buckets are visited in order of first use within a repetition, and list
/// their rows in ascending order.  Returns the number of buckets visited.
pub(crate) fn scan_buckets<F, D, V>(
    store: &SparseStore<F::Weight>,
    params: &MiningParams,
    ctx: &mut LshContext,
    mut draw: D,
    mut visit: V,
) -> Result<usize>
where
    F: TupleFamily,
    D: FnMut(&mut LshRng) -> F,
    V: FnMut(&[u32]),
{
    let n = store.size();
    if n as u64 > MAX_DIM {
        return Err(LshError::InvalidDimension(format!(
            "{} rows do not fit the 32-bit topic key space",
            n
        )));
    }

    // universal hash coefficients come first in the draw order
    let hash = UniversalHash::draw(&mut ctx.rng, params.tuple_size);
    if n == 0 {
        return Ok(0);
    }

    let mut table = BucketTable::new(params.table_size);
    let pb = ProgressHandle::new("hashing", params.num_tuples);
    let mut n_buckets = 0;
    for _rep in 0..params.num_tuples {
        ctx.cancel.check()?;
        let family = draw(&mut ctx.rng);
        let sigs = signatures(store, &family, params.parallelism);

        for (i, sig) in sigs.iter().enumerate() {
            if let Some(sig) = sig {
                table.store(i as u32, sig, &hash)?;
            }
        }
        for bucket in table.drain() {
            if bucket.len() > 1 {
                visit(&bucket);
                n_buckets += 1;
            }
        }
        pb.tick();
    }
    pb.finish();
    Ok(n_buckets)
}

fn signatures<F: TupleFamily>(
    store: &SparseStore<F::Weight>,
    family: &F,
    par: Parallelism,
) -> Vec<Option<Signature>> {
    match par {
        Parallelism::Sequential => store.rows().map(|r| family.signature(r)).collect(),
        Parallelism::Rows => {
            maybe_fuse(store.rows_slice().par_iter().map(|r| family.signature(r))).collect()
        }
    }
}

#[cfg(test)]
fn scenario() -> ListStore {
    let mut store = ListStore::create(4, 10).unwrap();
    store.push(0, 1, 3).unwrap();
    store.push(0, 2, 1).unwrap();
    store.push(1, 1, 2).unwrap();
    store.push(1, 2, 4).unwrap();
    store.push(2, 5, 1).unwrap();
    store.push(3, 1, 1).unwrap();
    store.push(3, 2, 1).unwrap();
    store
}

#[cfg(test)]
fn scenario_params() -> MiningParams {
    MiningParams {
        tuple_size: 2,
        num_tuples: 50,
        table_size: 1024,
        max_value: 50,
        ..Default::default()
    }
}

#[test]
fn test_params_validate() {
    assert!(MiningParams::default().validate().is_ok());
    for bad in [
        MiningParams {
            tuple_size: 0,
            ..Default::default()
        },
        MiningParams {
            num_tuples: 0,
            ..Default::default()
        },
        MiningParams {
            table_size: 0,
            ..Default::default()
        },
    ] {
        assert!(matches!(bad.validate(), Err(LshError::InvalidParameter(_))));
    }
    let lp = LpParams {
        width: -1.0,
        ..Default::default()
    };
    assert!(lp.validate().is_err());
}

#[test]
fn test_params_json_defaults() {
    let params: MiningParams =
        serde_json::from_str(r#"{"num_tuples": 7, "topics": "buckets"}"#).unwrap();
    assert_eq!(params.num_tuples, 7);
    assert_eq!(params.tuple_size, 3);
    assert_eq!(params.topics, TopicMode::Buckets);
}

#[test]
fn test_mine_rejects_bad_params() {
    let mut ctx = LshContext::seeded(1);
    let params = MiningParams {
        num_tuples: 0,
        ..Default::default()
    };
    let res = mine_l1(&scenario(), &params, &mut ctx);
    assert!(matches!(res, Err(LshError::InvalidParameter(_))));
}

#[test]
fn test_mine_scenario() {
    let mut ctx = LshContext::seeded(42);
    let topics = mine_l1(&scenario(), &scenario_params(), &mut ctx).unwrap();
    assert_eq!(topics.dim(), 4);
    assert!(topics.size() >= 2);
    for row in &topics {
        assert!(row.keys().all(|k| k != 2));
        assert!(row.iter().all(|e| e.weight >= 1 && e.weight <= 50));
    }
    let firsts: Vec<u32> = topics.rows().filter_map(|r| r.keys().next()).collect();
    assert!(firsts.contains(&0));
    assert!(firsts.contains(&1));
}

#[test]
fn test_mine_deterministic() {
    let store = scenario();
    let params = scenario_params();
    let a = mine_l1(&store, &params, &mut LshContext::seeded(42)).unwrap();
    let b = mine_l1(&store, &params, &mut LshContext::seeded(42)).unwrap();
    assert_eq!(a, b);
    let seq = MiningParams {
        parallelism: Parallelism::Sequential,
        ..params
    };
    let c = mine_l1(&store, &seq, &mut LshContext::seeded(42)).unwrap();
    assert_eq!(a, c);
}

#[test]
fn test_mine_bucket_topics() {
    let mut ctx = LshContext::seeded(42);
    let params = MiningParams {
        topics: TopicMode::Buckets,
        ..scenario_params()
    };
    let topics = mine_l1(&scenario(), &params, &mut ctx).unwrap();
    assert!(!topics.is_empty());
    for row in &topics {
        assert!(row.len() >= 2);
        assert!(row.keys().all(|k| k != 2));
    }
}

#[test]
fn test_mine_empty_inputs() {
    let mut ctx = LshContext::seeded(3);
    let empty = ListStore::create(0, 5).unwrap();
    let out = mine_l1(&empty, &MiningParams::default(), &mut ctx).unwrap();
    assert_eq!(out.size(), 0);
    assert_eq!(out.dim(), 0);

    let blank = ListStore::create(3, 5).unwrap();
    let out = mine_l1(&blank, &scenario_params(), &mut ctx).unwrap();
    assert!(out.is_empty());
    assert_eq!(out.dim(), 3);
}

#[test]
fn test_mine_cancelled() {
    let mut ctx = LshContext::seeded(3);
    ctx.cancel.cancel();
    let res = mine_l1(&scenario(), &scenario_params(), &mut ctx);
    assert!(matches!(res, Err(LshError::Cancelled)));
}

#[test]
fn test_mine_table_full() {
    let mut store = ListStore::create(3, 3).unwrap();
    for i in 0..3 {
        store.push(i, i as u32, 1).unwrap();
    }
    let params = MiningParams {
        table_size: 2,
        ..scenario_params()
    };
    let res = mine_l1(&store, &params, &mut LshContext::seeded(5));
    assert!(matches!(res, Err(LshError::TableFull(2))));
}

#[test]
fn test_mine_lp_duplicates() {
    let mut store = VectorStore::create(4, 3).unwrap();
    for i in [0, 2] {
        store.push(i, 0, 0.5).unwrap();
        store.push(i, 2, 1.5).unwrap();
    }
    store.push(1, 1, 40.0).unwrap();
    let params = MiningParams {
        tuple_size: 4,
        num_tuples: 20,
        table_size: 256,
        ..Default::default()
    };
    let lp = LpParams {
        width: 1.0,
        distribution: StableDistribution::Gaussian,
    };
    let topics = mine_lp(&store, &params, &lp, &mut LshContext::seeded(9)).unwrap();
    // identical vectors always collide; row 3 is empty
    assert_eq!(topics.size(), 2);
    let r0: Vec<(u32, u32)> = topics[0].iter().map(|e| (e.key, e.weight)).collect();
    assert_eq!(r0, vec![(0, 20), (2, 20)]);
    assert_eq!(topics[1].keys().collect::<Vec<_>>(), vec![2, 0]);
}
