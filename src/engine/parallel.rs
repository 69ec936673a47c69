// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

use log::*;
use serde::{Deserialize, Serialize};

#[cfg(feature = "fuse-parallel")]
use rayon::iter::PanicFuse;
use rayon::{current_num_threads, iter::ParallelIterator, ThreadPoolBuilder};

use crate::errors::{LshError, Result};

/// How signature computation is spread over threads.
///
/// Random parameters are always drawn on the calling thread before any
/// work fans out, so both settings produce identical output for a given
/// seed regardless of the thread count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parallelism {
    /// Compute every row's signature on the calling thread.
    Sequential,
    /// Compute signatures in parallel over rows on the rayon pool.
    #[default]
    Rows,
}

/// Configure the global thread pool.
pub fn init_thread_pool(n_threads: usize) -> Result<()> {
    debug!("initializing mining thread pool with {} threads", n_threads);
    ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
        .map_err(|e| LshError::InvalidParameter(format!("thread pool initialization: {}", e)))
}

pub fn thread_count() -> usize {
    current_num_threads()
}

#[cfg(not(feature = "fuse-parallel"))]
pub fn maybe_fuse<I: ParallelIterator>(iter: I) -> I {
    iter
}

#[cfg(feature = "fuse-parallel")]
pub fn maybe_fuse<I: ParallelIterator>(iter: I) -> PanicFuse<I> {
    iter.panic_fuse()
}
