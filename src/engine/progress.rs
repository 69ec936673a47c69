// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};

use log::*;

use crate::errors::{LshError, Result};

const UPDATE_SECS: f64 = 0.5;

/// Shared flag for cooperative cancellation of long-running jobs.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.  Jobs notice at their next check.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Fail with [LshError::Cancelled] if cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(LshError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Copy)]
struct UpdateState {
    count: usize,
    time: f64,
    rate: f64,
}

/// Throttled progress reporting through the `log` facade.
pub(crate) struct ProgressHandle {
    label: String,
    total: usize,
    start: Instant,
    count: AtomicUsize,
    last_update: RwLock<Option<UpdateState>>,
}

impl ProgressHandle {
    pub fn new(label: &str, total: usize) -> Self {
        ProgressHandle {
            label: label.to_string(),
            total,
            count: AtomicUsize::new(0),
            start: Instant::now(),
            last_update: RwLock::new(None),
        }
    }

    pub fn tick(&self) {
        self.advance(1);
    }

    pub fn advance(&self, n: usize) {
        let count = self.count.fetch_add(n, Ordering::Relaxed) + n;

        let last_update = match self.last_update.read() {
            Ok(lock) => *lock,
            Err(_) => return,
        };

        let thresh = if let Some(lu) = last_update {
            // bail early if the rate estimate says we don't need to update
            let n = (count - lu.count) as f64;
            if n / lu.rate < UPDATE_SECS * 0.95 {
                return;
            }

            lu.time
        } else {
            0.0
        };

        let time = self.start.elapsed().as_secs_f64();
        if time < thresh + UPDATE_SECS {
            return;
        }

        // if someone else is writing, they've handled it
        if let Ok(mut lock) = self.last_update.try_write() {
            *lock = Some(UpdateState {
                count,
                time,
                rate: count as f64 / time,
            });
            info!("{}: {}/{} ({:.1}s)", self.label, count, self.total, time);
        }
    }

    /// Report completion.
    pub fn finish(&self) {
        let count = self.count.load(Ordering::Relaxed);
        debug!(
            "{}: finished {}/{} in {:.2}s",
            self.label,
            count,
            self.total,
            self.start.elapsed().as_secs_f64()
        );
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

#[test]
fn test_cancel_token_shared() {
    let token = CancelToken::new();
    let other = token.clone();
    assert!(token.check().is_ok());
    other.cancel();
    assert!(token.is_cancelled());
    assert!(matches!(token.check(), Err(LshError::Cancelled)));
}

#[test]
fn test_progress_counts() {
    let pb = ProgressHandle::new("test", 10);
    for _ in 0..10 {
        pb.tick();
    }
    pb.advance(5);
    assert_eq!(pb.count(), 15);
    pb.finish();
}
