// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

#![allow(dead_code)]

use std::sync::Once;

use slsh::{ListStore, MiningParams};

static INIT: Once = Once::new();

pub fn init() {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or("debug");

        // don't panic if called multiple times across binaries
        let _ = env_logger::Builder::from_env(env).is_test(true).try_init();
    });
}

/// Four rows over ten items: rows 0, 1 and 3 share items 1 and 2.
pub fn scenario() -> ListStore {
    let mut store = ListStore::create(0, 10).unwrap();
    store.push_row(vec![(1, 3), (2, 1)]).unwrap();
    store.push_row(vec![(1, 2), (2, 4)]).unwrap();
    store.push_row(vec![(5, 1)]).unwrap();
    store.push_row(vec![(1, 1), (2, 1)]).unwrap();
    store
}

pub fn scenario_params() -> MiningParams {
    MiningParams {
        tuple_size: 2,
        num_tuples: 50,
        table_size: 1024,
        max_value: 50,
        ..Default::default()
    }
}

/// Number of repetitions in which two rows collided, read from neighbourhood topics.
pub fn pair_count(topics: &ListStore, a: u32, b: u32) -> u32 {
    topics
        .rows()
        .find(|r| r.keys().next() == Some(a))
        .and_then(|r| r.iter().skip(1).find(|e| e.key == b))
        .map_or(0, |e| e.weight)
}
