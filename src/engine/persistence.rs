// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Text and JSON persistence of sparse stores.
//!
//! The text format has one row per line: the number of entries followed by
//! `key:weight` pairs, separated by whitespace.  An optional `# dim N` first
//! line records the store dimension; without it the dimension is one past
//! the largest key.  Blank lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::*;
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::{LshError, Result};
use crate::sparse::{ListStore, Row, SparseStore, VectorStore, Weight};

const DIM_HEADER: &str = "# dim";

/// Load integer frequency lists from a text file.
pub fn load_lists<P: AsRef<Path>>(path: P) -> Result<ListStore> {
    load(path.as_ref())
}

/// Load real-valued vectors from a text file.
pub fn load_vectors<P: AsRef<Path>>(path: P) -> Result<VectorStore> {
    load(path.as_ref())
}

fn parse_err(line: usize, message: String) -> LshError {
    LshError::Parse { line, message }
}

fn load<W: Weight>(path: &Path) -> Result<SparseStore<W>> {
    debug!("loading store from {}", path.display());
    let reader = BufReader::new(File::open(path)?);
    let mut dim: Option<usize> = None;
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let lno = i + 1;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if let Some(rest) = text.strip_prefix(DIM_HEADER) {
            if !rows.is_empty() || dim.is_some() {
                return Err(parse_err(lno, "dimension header must come first".into()));
            }
            let d = rest
                .trim()
                .parse()
                .map_err(|_| parse_err(lno, format!("invalid dimension '{}'", rest.trim())))?;
            dim = Some(d);
            continue;
        }
        rows.push(parse_row(lno, text)?);
    }

    let dim = match dim {
        Some(d) => d,
        None => rows
            .iter()
            .flat_map(Row::keys)
            .max()
            .map_or(0, |k| k as usize + 1),
    };
    info!(
        "loaded {} rows of dimension {} from {}",
        rows.len(),
        dim,
        path.display()
    );
    SparseStore::from_rows(dim, rows)
}

fn parse_row<W: Weight>(lno: usize, text: &str) -> Result<Row<W>> {
    let mut fields = text.split_whitespace();
    let len: usize = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| parse_err(lno, "row must start with its length".into()))?;
    let mut row = Row::with_capacity(len);
    for field in fields {
        let (k, w) = field
            .split_once(':')
            .ok_or_else(|| parse_err(lno, format!("expected key:weight, found '{}'", field)))?;
        let key: u32 = k
            .parse()
            .map_err(|_| parse_err(lno, format!("invalid key '{}'", k)))?;
        let weight: W = w
            .parse()
            .map_err(|_| parse_err(lno, format!("invalid weight '{}'", w)))?;
        row.push_unchecked(key, weight);
    }
    if row.len() != len {
        return Err(parse_err(
            lno,
            format!("row declares {} entries but has {}", len, row.len()),
        ));
    }
    Ok(row)
}

/// Save a store in the text format, with a dimension header.
pub fn save<W: Weight, P: AsRef<Path>>(path: P, store: &SparseStore<W>) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{} {}", DIM_HEADER, store.dim())?;
    for row in store {
        write!(out, "{}", row.len())?;
        for e in row {
            write!(out, " {}:{}", e.key, e.weight)?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    info!("saved {} rows to {}", store.size(), path.display());
    Ok(())
}

/// Save any serializable value (a store, a clustering, parameters) as JSON.
pub fn save_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let out = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer(out, value).map_err(std::io::Error::from)?;
    Ok(())
}

/// Load a value saved with [save_json].
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    serde_json::from_reader(reader).map_err(|e| parse_err(e.line(), e.to_string()))
}

#[cfg(test)]
fn write_text(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_infers_dim() {
    let file = write_text("2 1:3 2:1\n\n1 5:1\n0\n");
    let store = load_lists(file.path()).unwrap();
    assert_eq!(store.size(), 3);
    assert_eq!(store.dim(), 6);
    assert_eq!(store[0].get(1), Some(3));
    assert!(store[2].is_empty());
}

#[test]
fn test_load_header_dim() {
    let file = write_text("# dim 20\n1 3:0.5\n");
    let store = load_vectors(file.path()).unwrap();
    assert_eq!(store.dim(), 20);
    assert_eq!(store[0].get(3), Some(0.5));
}

#[test]
fn test_load_header_too_small() {
    let file = write_text("# dim 2\n1 3:1\n");
    let res = load_lists(file.path());
    assert!(matches!(res, Err(LshError::OutOfRange(_))));
}

#[test]
fn test_load_malformed() {
    for (text, bad_line) in [
        ("1 2:1\n2 3:1\n", 2),
        ("1 2:1\n\n1 3-1\n", 3),
        ("x 2:1\n", 1),
        ("1 2:-4\n", 1),
    ] {
        let file = write_text(text);
        match load_lists(file.path()) {
            Err(LshError::Parse { line, .. }) => assert_eq!(line, bad_line, "input {:?}", text),
            r => panic!("unexpected result {:?} for {:?}", r, text),
        }
    }
}

#[test]
fn test_load_missing() {
    let dir = tempfile::tempdir().unwrap();
    let res = load_lists(dir.path().join("missing.txt"));
    assert!(matches!(res, Err(LshError::Io(_))));
}

#[test]
fn test_save_round_trip() {
    let mut store = ListStore::create(0, 12).unwrap();
    store.push_row(vec![(4, 2), (1, 7)]).unwrap();
    store.push_row(vec![]).unwrap();
    store.push_row(vec![(11, 1)]).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.txt");
    save(&path, &store).unwrap();
    let back = load_lists(&path).unwrap();
    assert_eq!(back, store);
}

#[test]
fn test_json_round_trip() {
    let mut store = VectorStore::create(0, 3).unwrap();
    store.push_row(vec![(2, -1.25)]).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    save_json(&path, &store).unwrap();
    let back: VectorStore = load_json(&path).unwrap();
    assert_eq!(back, store);
}
