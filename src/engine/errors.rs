// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Error types for the mining engine.

use arrow::error::ArrowError;
use thiserror::Error;

/// Errors raised by the store, the mining engine and the clusterer.
#[derive(Error, Debug)]
pub enum LshError {
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("index out of range: {0}")]
    OutOfRange(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid labeling: {0}")]
    InvalidLabeling(String),
    #[error("hash table with {0} buckets is full")]
    TableFull(usize),
    #[error("operation cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

pub type Result<T> = std::result::Result<T, LshError>;

/// Fail with [LshError::InvalidParameter] unless a size parameter is positive.
#[macro_export]
macro_rules! check_positive {
    ($val:expr, $name:expr) => {
        if $val == 0 {
            return Err($crate::errors::LshError::InvalidParameter(format!(
                "{} must be positive",
                $name
            )));
        }
    };
}

/// Turn an option into a result, building the error from a format string.
#[macro_export]
macro_rules! ok_or_err {
    ($opt:expr, $variant:ident, $($arg:expr),*) => {
        $opt.ok_or_else(|| $crate::errors::LshError::$variant(format!($($arg),*)))
    };
}

#[test]
fn test_error_messages() {
    let err = LshError::OutOfRange("key 12 >= dim 10".into());
    assert_eq!(format!("{}", err), "index out of range: key 12 >= dim 10");
    let err = LshError::TableFull(8);
    assert_eq!(format!("{}", err), "hash table with 8 buckets is full");
}

#[test]
fn test_ok_or_err() {
    fn lookup(v: Option<u32>) -> Result<u32> {
        ok_or_err!(v, OutOfRange, "missing value {}", 3)
    }
    assert_eq!(lookup(Some(4)).unwrap(), 4);
    match lookup(None) {
        Err(LshError::OutOfRange(msg)) => assert_eq!(msg, "missing value 3"),
        r => panic!("unexpected result {:?}", r),
    }
}
