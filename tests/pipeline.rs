// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Mining and clustering end to end.

mod common;

use slsh::postprocess::centers_from_labels;
use slsh::{
    mhlink, mine_l1, mine_lp, CancelToken, ClusterParams, ListStore, LpParams, LshContext,
    LshError, MiningParams, Overlap, Parallelism, StableDistribution, TopicMode, VectorStore,
};

use common::{init, pair_count, scenario, scenario_params};

fn cluster_params(threshold: f64, min_size: usize) -> ClusterParams {
    ClusterParams {
        threshold,
        min_cluster_size: min_size,
        table_size: 1024,
        ..Default::default()
    }
}

#[test]
fn test_scenario_mining() {
    init();
    let store = scenario();
    let topics = mine_l1(&store, &scenario_params(), &mut LshContext::seeded(42)).unwrap();
    assert_eq!(topics.dim(), store.size());

    let firsts: Vec<u32> = topics.rows().filter_map(|r| r.keys().next()).collect();
    assert!(firsts.contains(&0));
    assert!(firsts.contains(&1));
    assert!(!firsts.contains(&2));
    for row in &topics {
        assert!(row.keys().all(|k| [0, 1, 3].contains(&k)));
        assert!(row.iter().all(|e| e.weight <= 50));
    }
    assert!(pair_count(&topics, 0, 1) > 0);
    assert!(pair_count(&topics, 0, 3) > 0 && pair_count(&topics, 1, 3) > 0);
    assert_eq!(pair_count(&topics, 0, 1), pair_count(&topics, 1, 0));
}

#[test]
fn test_scenario_clustering() {
    init();
    let mut ctx = LshContext::seeded(42);
    let topics = mine_l1(&scenario(), &scenario_params(), &mut ctx).unwrap();
    let result = mhlink(&topics, &cluster_params(0.5, 2), &mut ctx).unwrap();

    assert_eq!(result.clusters.size(), 1);
    assert_eq!(result.members.len(), 1);
    assert_eq!(result.members[0].len(), topics.size());
    let row = &result.clusters[0];
    assert!(row.keys().all(|k| [0, 1, 3].contains(&k)));
    let weights: Vec<u32> = row.iter().map(|e| e.weight).collect();
    assert!(weights.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_pipeline_deterministic() {
    init();
    let store = scenario();
    let run = |par: Parallelism| {
        let mut ctx = LshContext::seeded(7);
        let params = MiningParams {
            parallelism: par,
            ..scenario_params()
        };
        let topics = mine_l1(&store, &params, &mut ctx).unwrap();
        let clusters = mhlink(&topics, &cluster_params(0.5, 2), &mut ctx).unwrap();
        (topics, clusters)
    };
    let a = run(Parallelism::Rows);
    let b = run(Parallelism::Rows);
    let c = run(Parallelism::Sequential);
    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[test]
fn test_collision_monotonicity() {
    init();
    let store = scenario();
    let short = MiningParams {
        num_tuples: 10,
        ..scenario_params()
    };
    let long = MiningParams {
        num_tuples: 20,
        ..scenario_params()
    };
    let t_short = mine_l1(&store, &short, &mut LshContext::seeded(42)).unwrap();
    let t_long = mine_l1(&store, &long, &mut LshContext::seeded(42)).unwrap();
    for a in 0..4 {
        for b in 0..4 {
            if a != b {
                assert!(pair_count(&t_long, a, b) >= pair_count(&t_short, a, b));
            }
        }
    }
}

#[test]
fn test_threshold_inclusive() {
    init();
    let mut topics = ListStore::create(0, 4).unwrap();
    topics.push_row(vec![(0, 1), (1, 1)]).unwrap();
    topics.push_row(vec![(1, 1), (2, 1)]).unwrap();
    let params = ClusterParams {
        tuple_size: 1,
        num_tuples: 100,
        ..cluster_params(0.5, 2)
    };

    let res = mhlink(&topics, &params, &mut LshContext::seeded(3)).unwrap();
    assert_eq!(res.members, vec![vec![0, 1]]);

    let strict = ClusterParams {
        threshold: 0.51,
        ..params.clone()
    };
    let res = mhlink(&topics, &strict, &mut LshContext::seeded(3)).unwrap();
    assert!(res.clusters.is_empty());

    let jaccard = ClusterParams {
        overlap: Overlap::Jaccard,
        threshold: 1.0 / 3.0,
        ..params
    };
    let res = mhlink(&topics, &jaccard, &mut LshContext::seeded(3)).unwrap();
    assert_eq!(res.members, vec![vec![0, 1]]);
}

#[test]
fn test_bucket_topics_cluster() {
    init();
    let mut ctx = LshContext::seeded(42);
    let params = MiningParams {
        topics: TopicMode::Buckets,
        ..scenario_params()
    };
    let topics = mine_l1(&scenario(), &params, &mut ctx).unwrap();
    assert!(topics.rows().all(|r| r.len() >= 2));
    let res = mhlink(&topics, &cluster_params(0.5, 1), &mut ctx).unwrap();
    assert!(!res.clusters.is_empty());
    assert!(res.clusters.rows().all(|r| r.keys().all(|k| k != 2)));
}

#[test]
fn test_transposed_items() {
    init();
    // items 1 and 2 always appear together, item 5 alone
    let items = scenario().transpose();
    let topics = mine_l1(&items, &scenario_params(), &mut LshContext::seeded(42)).unwrap();
    assert_eq!(topics.dim(), 10);
    assert_eq!(topics.size(), 2);
    assert_eq!(topics[0].keys().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(topics[1].keys().collect::<Vec<_>>(), vec![2, 1]);
}

#[test]
fn test_cancellation() {
    init();
    let cancel = CancelToken::new();
    let mut ctx = LshContext::seeded(1).with_cancel(cancel.clone());
    cancel.cancel();
    let res = mhlink(&scenario(), &cluster_params(0.5, 2), &mut ctx);
    assert!(matches!(res, Err(LshError::Cancelled)));
}

#[test]
fn test_lp_near_duplicates() {
    init();
    let mut store = VectorStore::create(0, 5).unwrap();
    store.push_row(vec![(0, 1.0), (3, 2.0)]).unwrap();
    store.push_row(vec![(1, 50.0), (4, -30.0)]).unwrap();
    store.push_row(vec![(0, 1.0), (3, 2.0)]).unwrap();
    store.push_row(vec![(0, 1.0), (3, 2.0)]).unwrap();
    let params = MiningParams {
        tuple_size: 4,
        num_tuples: 30,
        table_size: 512,
        ..Default::default()
    };
    for dist in [StableDistribution::Cauchy, StableDistribution::Gaussian] {
        let lp = LpParams {
            width: 2.0,
            distribution: dist,
        };
        let mut ctx = LshContext::seeded(17);
        let topics = mine_lp(&store, &params, &lp, &mut ctx).unwrap();
        assert_eq!(topics.size(), 3);
        assert_eq!(topics[0].keys().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert!(topics[0].iter().all(|e| e.weight == 30));

        let clusters = mhlink(&topics, &cluster_params(0.9, 3), &mut ctx).unwrap();
        assert_eq!(clusters.members, vec![vec![0, 1, 2]]);
    }
}

#[test]
fn test_centers_of_clusters() {
    init();
    let mut store = ListStore::create(0, 3).unwrap();
    store.push_row(vec![(0, 2)]).unwrap();
    store.push_row(vec![(0, 4), (2, 2)]).unwrap();
    store.push_row(vec![(1, 9)]).unwrap();
    let centers = centers_from_labels(&store, &[1, 1, 0]).unwrap();
    assert_eq!(centers.size(), 2);
    assert_eq!(centers[0].get(1), Some(9.0));
    assert_eq!(centers[1].get(0), Some(3.0));
    assert_eq!(centers[1].get(2), Some(1.0));
}
