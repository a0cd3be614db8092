// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Auxiliary wire types shared by several messages.

use bytes::Bytes;
use spartan_common::id::TileId;
use spartan_common::status::{SpartanError, SpartanResult};

use crate::marshal::impl_marshal;

/// Half-open stepped range `[start, stop)` over one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slice {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Slice {
    pub const fn new(start: i64, stop: i64) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    pub const fn with_step(start: i64, stop: i64, step: i64) -> Self {
        Self { start, stop, step }
    }

    /// Number of indices selected, assuming the slice is valid.
    pub fn len(&self) -> i64 {
        if self.step <= 0 || self.stop <= self.start {
            return 0;
        }
        (self.stop - self.start - 1) / self.step + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl_marshal!(Slice { start, stop, step });

/// One `Slice` per dimension. Empty means the whole tile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SubSlice {
    pub slices: Vec<Slice>,
}

impl SubSlice {
    pub fn new(slices: Vec<Slice>) -> Self {
        Self { slices }
    }

    pub fn whole() -> Self {
        Self::default()
    }

    pub fn is_whole(&self) -> bool {
        self.slices.is_empty()
    }
}

impl From<Vec<Slice>> for SubSlice {
    fn from(slices: Vec<Slice>) -> Self {
        Self { slices }
    }
}

impl_marshal!(SubSlice { slices });

/// A chunk of an array: dtype tag, sparse flag, dense shape and payload.
///
/// Dense payloads are row-major with little-endian elements. Sparse
/// payloads are opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub dtype: String,
    pub sparse: bool,
    pub shape: Vec<i64>,
    pub data: Bytes,
}

impl Tile {
    pub fn dense(dtype: impl Into<String>, shape: Vec<i64>, data: impl Into<Bytes>) -> Self {
        Self {
            dtype: dtype.into(),
            sparse: false,
            shape,
            data: data.into(),
        }
    }

    pub fn sparse(dtype: impl Into<String>, shape: Vec<i64>, data: impl Into<Bytes>) -> Self {
        Self {
            dtype: dtype.into(),
            sparse: true,
            shape,
            data: data.into(),
        }
    }

    /// Product of the shape. A zero-dimensional tile holds one element.
    /// `None` if the product overflows.
    pub fn num_elements(&self) -> Option<i64> {
        self.shape.iter().try_fold(1i64, |acc, &d| acc.checked_mul(d))
    }
}

impl_marshal!(Tile {
    dtype,
    sparse,
    shape,
    data,
});

/// Resource usage and tile changelog reported in every heartbeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStatus {
    pub total_physical_memory: i64,
    pub num_processors: i32,
    pub mem_usage: f64,
    pub cpu_usage: f64,
    /// Seconds since the Unix epoch.
    pub last_report_time: f64,
    pub kernel_remain_tiles: Vec<TileId>,
    pub new_tiles: Vec<TileId>,
}

impl_marshal!(WorkerStatus {
    total_physical_memory,
    num_processors,
    mem_usage,
    cpu_usage,
    last_report_time,
    kernel_remain_tiles,
    new_tiles,
});

/// Merge operation applied by `update`. Codes match the array library's
/// reducer numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Reducer {
    Add = 0,
    Multiply = 1,
    Maximum = 2,
    Minimum = 3,
    Replace = 7,
}

impl Reducer {
    pub fn from_code(code: i32) -> SpartanResult<Self> {
        match code {
            0 => Ok(Self::Add),
            1 => Ok(Self::Multiply),
            2 => Ok(Self::Maximum),
            3 => Ok(Self::Minimum),
            7 => Ok(Self::Replace),
            other => Err(SpartanError::serialization_error(format!(
                "unknown reducer code {other}"
            ))),
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Multiply => "multiply",
            Self::Maximum => "maximum",
            Self::Minimum => "minimum",
            Self::Replace => "replace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::Marshal;

    #[test]
    fn test_slice_len() {
        assert_eq!(Slice::new(0, 5).len(), 5);
        assert_eq!(Slice::with_step(0, 5, 2).len(), 3);
        assert_eq!(Slice::with_step(1, 10, 3).len(), 3);
        assert!(Slice::new(4, 4).is_empty());
        assert!(Slice::with_step(0, 4, 0).is_empty());
        assert_eq!(Slice::with_step(0, 5, i64::MAX).len(), 1);
        assert_eq!(Slice::with_step(i64::MAX - 2, i64::MAX, i64::MAX).len(), 1);
    }

    #[test]
    fn test_num_elements() {
        let tile = Tile::dense("float64", vec![3, 4], vec![0u8; 96]);
        assert_eq!(tile.num_elements(), Some(12));
        let scalar = Tile::dense("int32", vec![], vec![0u8; 4]);
        assert_eq!(scalar.num_elements(), Some(1));
        let huge = Tile::dense("float64", vec![1 << 32, 1 << 32], Vec::new());
        assert_eq!(huge.num_elements(), None);
    }

    #[test]
    fn test_reducer_codes() {
        for reducer in [
            Reducer::Add,
            Reducer::Multiply,
            Reducer::Maximum,
            Reducer::Minimum,
            Reducer::Replace,
        ] {
            assert_eq!(Reducer::from_code(reducer.code()).unwrap(), reducer);
        }
        assert!(Reducer::from_code(4).unwrap_err().is_serialization_error());
        assert!(Reducer::from_code(-1).unwrap_err().is_serialization_error());
    }

    #[test]
    fn test_tile_field_order() {
        let tile = Tile::sparse("int8", vec![2], vec![1u8, 2]);
        let bytes = tile.to_bytes();
        // dtype length + "int8" + sparse flag
        assert_eq!(&bytes[..9], &[4, 0, 0, 0, b'i', b'n', b't', b'8', 1]);
        assert_eq!(Tile::from_bytes(bytes).unwrap(), tile);
    }

    #[test]
    fn test_worker_status_roundtrip() {
        let status = WorkerStatus {
            total_physical_memory: i64::MAX,
            num_processors: 64,
            mem_usage: 0.25,
            cpu_usage: 1.5,
            last_report_time: 1_700_000_000.5,
            kernel_remain_tiles: vec![TileId::new(0, 1)],
            new_tiles: vec![TileId::new(0, 2), TileId::new(0, 3)],
        };
        assert_eq!(WorkerStatus::from_bytes(status.to_bytes()).unwrap(), status);
    }
}
