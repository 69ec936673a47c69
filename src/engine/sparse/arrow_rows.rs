// This file is part of sampled-lsh.
// Copyright (C) 2024-2026 The sampled-lsh developers.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Conversion between sparse stores and Arrow list arrays.
//!
//! Rows are exported as a `LargeList<Struct<index: UInt32, value: W>>`, with
//! the store dimension recorded in the metadata of the index field.

use std::{collections::HashMap, collections::LinkedList, marker::PhantomData, sync::Arc};

use arrow::{
    array::{Array, AsArray, LargeListArray, PrimitiveBuilder, StructArray, UInt32Builder},
    buffer::OffsetBuffer,
    compute::concat,
    datatypes::{ArrowPrimitiveType, UInt32Type},
};
use arrow_schema::{DataType, Field, Fields};
use log::*;
use rayon::iter::plumbing::{Consumer, Folder, Reducer};
use rayon::prelude::*;

use crate::errors::{LshError, Result};
use crate::ok_or_err;

use super::{Row, SparseStore, Weight};

const DIM_KEY: &str = "slsh.dimension";

pub type RowChunks = LinkedList<LargeListArray>;

/// Rayon consumer that collects sparse rows into chunked Arrow list arrays.
pub struct ArrowRowConsumer<W: Weight> {
    dimension: usize,
    lengths: Vec<usize>,
    col_bld: UInt32Builder,
    val_bld: PrimitiveBuilder<W::Arrow>,
    _weight: PhantomData<W>,
}

impl<W: Weight> ArrowRowConsumer<W> {
    pub fn new(dim: usize) -> Self {
        ArrowRowConsumer {
            dimension: dim,
            lengths: Vec::new(),
            col_bld: UInt32Builder::new(),
            val_bld: PrimitiveBuilder::new(),
            _weight: PhantomData,
        }
    }
}

fn row_fields<W: Weight>(dim: usize) -> Fields {
    let meta = HashMap::from([(DIM_KEY.to_string(), dim.to_string())]);
    Fields::from(vec![
        Field::new("index", DataType::UInt32, false).with_metadata(meta),
        Field::new("value", <W::Arrow as ArrowPrimitiveType>::DATA_TYPE, false),
    ])
}

impl<'a, W: Weight> Consumer<&'a Row<W>> for ArrowRowConsumer<W> {
    type Folder = Self;
    type Reducer = Self;
    type Result = RowChunks;

    fn split_at(self, _index: usize) -> (Self, Self, Self::Reducer) {
        let left = ArrowRowConsumer::new(self.dimension);
        let right = ArrowRowConsumer::new(self.dimension);
        (left, right, self)
    }

    fn into_folder(self) -> Self::Folder {
        self
    }

    fn full(&self) -> bool {
        false
    }
}

impl<'a, W: Weight> Folder<&'a Row<W>> for ArrowRowConsumer<W> {
    type Result = RowChunks;

    fn consume(mut self, item: &'a Row<W>) -> Self {
        for e in item {
            self.col_bld.append_value(e.key);
            self.val_bld.append_value(e.weight);
        }
        self.lengths.push(item.len());
        self
    }

    fn complete(mut self) -> Self::Result {
        let struct_fields = row_fields::<W>(self.dimension);
        let list_field = Field::new("rows", DataType::Struct(struct_fields.clone()), false);
        let sa = StructArray::new(
            struct_fields,
            vec![
                Arc::new(self.col_bld.finish()),
                Arc::new(self.val_bld.finish()),
            ],
            None,
        );
        let list = LargeListArray::new(
            Arc::new(list_field),
            OffsetBuffer::from_lengths(self.lengths),
            Arc::new(sa),
            None,
        );
        let mut result = LinkedList::new();
        result.push_back(list);
        result
    }

    fn full(&self) -> bool {
        false
    }
}

impl<W: Weight> Reducer<RowChunks> for ArrowRowConsumer<W> {
    fn reduce(self, mut left: RowChunks, mut right: RowChunks) -> RowChunks {
        left.append(&mut right);
        left
    }
}

impl<W: Weight> SparseStore<W> {
    /// Export the store as an Arrow list array.
    pub fn to_arrow(&self) -> Result<LargeListArray> {
        let chunks = self
            .rows_slice()
            .par_iter()
            .drive(ArrowRowConsumer::<W>::new(self.dim()));
        debug!(
            "collected {} rows in {} arrow chunks",
            self.size(),
            chunks.len()
        );
        // even an empty store yields one (empty) chunk
        let arrays: Vec<&dyn Array> = chunks.iter().map(|c| c as &dyn Array).collect();
        let merged = concat(&arrays)?;
        Ok(merged.as_list::<i64>().clone())
    }

    /// Import a store from an Arrow list array produced by [SparseStore::to_arrow].
    pub fn from_arrow(array: &LargeListArray) -> Result<Self> {
        let rows: &StructArray = array.values().as_struct_opt().ok_or_else(|| {
            LshError::InvalidParameter(format!(
                "invalid element type {}, expected Struct",
                array.values().data_type()
            ))
        })?;
        if rows.num_columns() != 2 {
            return Err(LshError::InvalidParameter(
                "row entries must have 2 fields".into(),
            ));
        }
        let idx_f = &rows.fields()[0];
        let dim: usize = ok_or_err!(
            idx_f.metadata().get(DIM_KEY).and_then(|s| s.parse().ok()),
            InvalidDimension,
            "index field has no valid {} metadata",
            DIM_KEY
        )?;
        let keys = rows
            .column(0)
            .as_primitive_opt::<UInt32Type>()
            .ok_or_else(|| {
                LshError::InvalidParameter(format!(
                    "invalid index type {}, expected UInt32",
                    rows.column(0).data_type()
                ))
            })?;
        let vals = rows
            .column(1)
            .as_primitive_opt::<W::Arrow>()
            .ok_or_else(|| {
                LshError::InvalidParameter(format!(
                    "invalid value type {}, expected {}",
                    rows.column(1).data_type(),
                    <W::Arrow as ArrowPrimitiveType>::DATA_TYPE
                ))
            })?;

        let offsets = array.value_offsets();
        let mut out = Vec::with_capacity(array.len());
        for i in 0..array.len() {
            let (start, end) = (offsets[i] as usize, offsets[i + 1] as usize);
            let mut row = Row::with_capacity(end - start);
            for j in start..end {
                row.push_unchecked(keys.value(j), vals.value(j));
            }
            out.push(row);
        }
        Self::from_rows(dim, out)
    }
}

#[test]
fn test_arrow_round_trip() {
    let mut store = SparseStore::<f64>::create(0, 8).unwrap();
    for i in 0..500u32 {
        store
            .push_row((0..(i % 5)).map(|k| (k + (i % 3), (i * k) as f64 / 4.0)))
            .unwrap();
    }
    let arr = store.to_arrow().unwrap();
    assert_eq!(arr.len(), 500);
    let back = SparseStore::<f64>::from_arrow(&arr).unwrap();
    assert_eq!(back, store);
}

#[test]
fn test_arrow_empty() {
    let store = SparseStore::<u32>::create(0, 3).unwrap();
    let arr = store.to_arrow().unwrap();
    assert_eq!(arr.len(), 0);
    let back = SparseStore::<u32>::from_arrow(&arr).unwrap();
    assert_eq!(back.dim(), 3);
    assert_eq!(back.size(), 0);
}

#[test]
fn test_arrow_wrong_weight_type() {
    let mut store = SparseStore::<u32>::create(1, 3).unwrap();
    store.push(0, 2, 9).unwrap();
    let arr = store.to_arrow().unwrap();
    let res = SparseStore::<f64>::from_arrow(&arr);
    assert!(matches!(res, Err(LshError::InvalidParameter(_))));
}
