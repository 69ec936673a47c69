// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Store persistence and interchange.

mod common;

use std::fs;

use tempfile::tempdir;

use slsh::persistence::{load_json, load_lists, load_vectors, save, save_json};
use slsh::sparse::Triplets;
use slsh::{
    mhlink, mine_l1, ClusterParams, Clustering, ListStore, LshContext, LshError, VectorStore,
};

use common::{init, scenario, scenario_params};

#[test]
fn test_text_round_trip() {
    init();
    let store = scenario();
    let dir = tempdir().unwrap();
    let path = dir.path().join("scenario.txt");
    save(&path, &store).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("# dim 10"));
    assert_eq!(lines.next(), Some("2 1:3 2:1"));

    let back = load_lists(&path).unwrap();
    assert_eq!(back.size(), store.size());
    assert_eq!(back.dim(), store.dim());
    assert_eq!(back, store);
}

#[test]
fn test_vector_round_trip() {
    init();
    let mut store = VectorStore::create(0, 6).unwrap();
    store.push_row(vec![(5, 0.125), (0, -3.5)]).unwrap();
    store.push_row(vec![]).unwrap();
    store.push_row(vec![(2, 1e-3)]).unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("vectors.txt");
    save(&path, &store).unwrap();
    assert_eq!(load_vectors(&path).unwrap(), store);
}

#[test]
fn test_save_to_missing_directory() {
    init();
    let dir = tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("out.txt");
    let res = save(&path, &scenario());
    assert!(matches!(res, Err(LshError::Io(_))));
}

#[test]
fn test_mined_topics_round_trip() {
    init();
    let mut ctx = LshContext::seeded(42);
    let topics = mine_l1(&scenario(), &scenario_params(), &mut ctx).unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("topics.txt");
    save(&path, &topics).unwrap();
    let back = load_lists(&path).unwrap();
    assert_eq!(back, topics);
}

#[test]
fn test_clustering_json() {
    init();
    let mut ctx = LshContext::seeded(42);
    let topics = mine_l1(&scenario(), &scenario_params(), &mut ctx).unwrap();
    let params = ClusterParams {
        threshold: 0.5,
        min_cluster_size: 2,
        table_size: 1024,
        ..Default::default()
    };
    let result = mhlink(&topics, &params, &mut ctx).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("clusters.json");
    save_json(&path, &result).unwrap();
    let back: Clustering = load_json(&path).unwrap();
    assert_eq!(back, result);

    let ppath = dir.path().join("params.json");
    save_json(&ppath, &params).unwrap();
    let pback: ClusterParams = load_json(&ppath).unwrap();
    assert_eq!(pback, params);
}

#[test]
fn test_interchange_formats() {
    init();
    let store = scenario();

    let arr = store.to_arrow().unwrap();
    assert_eq!(ListStore::from_arrow(&arr).unwrap(), store);

    let dense = store.to_dense();
    assert_eq!(dense.dim(), (4, 10));
    assert_eq!(dense[(1, 2)], 4.0);

    let Triplets { row, col, val } = store.to_triplets();
    assert_eq!(row.len(), store.nnz());
    let back = ListStore::from_triplets(store.size(), store.dim(), &row, &col, &val).unwrap();
    assert_eq!(back, store);
}
