// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sampled locality-sensitive hashing for mining co-occurring items.
//!
//! The engine mines sparse weighted lists for rows whose contents collide
//! under random tuple sampling ([mining]), and clusters the mined topics by
//! bucket-driven single linkage ([cluster]).

pub mod cluster;
pub mod errors;
pub mod hashing;
pub mod mining;
pub mod parallel;
pub mod persistence;
pub mod postprocess;
pub mod progress;
pub mod random;
pub mod sparse;

pub use cluster::{mhlink, ClusterParams, Clustering, MergePolicy, Overlap};
pub use errors::{LshError, Result};
pub use hashing::StableDistribution;
pub use mining::{mine_l1, mine_lp, LpParams, MiningParams, TopicMode};
pub use parallel::Parallelism;
pub use progress::CancelToken;
pub use random::{LshContext, LshRng};
pub use sparse::{Entry, ListStore, Row, SparseStore, VectorStore};
