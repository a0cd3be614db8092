// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Region addressing and reducers over dense tile payloads.
//!
//! Dense payloads are row-major with little-endian elements whose width
//! comes from the dtype tag. Sparse payloads and unknown dtypes are opaque:
//! they only support whole-tile reads and whole-tile `Replace`.

use bytes::Bytes;
use spartan_common::status::{SpartanError, SpartanResult};
use spartan_proto::{Reducer, SubSlice, Tile};

/// Element types the reducers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl DType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "int8" => Self::Int8,
            "uint8" => Self::UInt8,
            "int16" => Self::Int16,
            "uint16" => Self::UInt16,
            "int32" => Self::Int32,
            "uint32" => Self::UInt32,
            "int64" => Self::Int64,
            "uint64" => Self::UInt64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    /// Element width in bytes.
    pub fn width(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }
}

/// One resolved dimension of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dim {
    start: i64,
    step: i64,
    len: i64,
}

/// Validate `subslice` against `shape`. Missing trailing slices select the
/// whole dimension.
fn resolve(shape: &[i64], subslice: &SubSlice) -> SpartanResult<Vec<Dim>> {
    if subslice.slices.len() > shape.len() {
        return Err(SpartanError::shape_error(format!(
            "{} slices for a {}-dimensional tile",
            subslice.slices.len(),
            shape.len()
        )));
    }
    shape
        .iter()
        .enumerate()
        .map(|(axis, &extent)| match subslice.slices.get(axis) {
            None => Ok(Dim {
                start: 0,
                step: 1,
                len: extent,
            }),
            Some(s) => {
                if s.step <= 0 || s.start < 0 || s.start > s.stop || s.stop > extent {
                    return Err(SpartanError::shape_error(format!(
                        "slice {}:{}:{} out of bounds for axis {axis} of extent {extent}",
                        s.start, s.stop, s.step
                    )));
                }
                Ok(Dim {
                    start: s.start,
                    step: s.step,
                    len: s.len(),
                })
            }
        })
        .collect()
}

/// Checks that `tile` is a dense tile of a known dtype whose payload
/// matches its shape.
fn dense_dtype(tile: &Tile) -> SpartanResult<DType> {
    if tile.sparse {
        return Err(SpartanError::shape_error(
            "sparse tiles only support whole-tile access",
        ));
    }
    let dtype = DType::from_name(&tile.dtype).ok_or_else(|| {
        SpartanError::shape_error(format!(
            "dtype '{}' only supports whole-tile access",
            tile.dtype
        ))
    })?;
    if tile.shape.iter().any(|&d| d < 0) {
        return Err(SpartanError::shape_error(format!(
            "negative extent in shape {:?}",
            tile.shape
        )));
    }
    let expected = tile
        .num_elements()
        .and_then(|n| usize::try_from(n).ok())
        .and_then(|n| n.checked_mul(dtype.width()))
        .ok_or_else(|| {
            SpartanError::shape_error(format!(
                "shape {:?} of {} overflows the addressable size",
                tile.shape, tile.dtype
            ))
        })?;
    if tile.data.len() != expected {
        return Err(SpartanError::shape_error(format!(
            "payload is {} bytes, shape {:?} of {} needs {expected}",
            tile.data.len(),
            tile.shape,
            tile.dtype
        )));
    }
    Ok(dtype)
}

/// Flat element offsets of the region, in row-major region order.
fn element_offsets(shape: &[i64], dims: &[Dim]) -> SpartanResult<Vec<usize>> {
    if dims.iter().any(|d| d.len == 0) {
        return Ok(Vec::new());
    }
    let overflow = || SpartanError::shape_error(format!("region of shape {shape:?} overflows"));
    let mut strides = vec![1i64; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1]
            .checked_mul(shape[axis + 1])
            .ok_or_else(overflow)?;
    }
    let count = dims
        .iter()
        .try_fold(1i64, |acc, d| acc.checked_mul(d.len))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(overflow)?;
    let mut offsets = Vec::with_capacity(count);
    let mut index = vec![0i64; dims.len()];
    loop {
        let offset: i64 = dims
            .iter()
            .zip(&index)
            .zip(&strides)
            .map(|((d, &i), &stride)| (d.start + i * d.step) * stride)
            .sum();
        offsets.push(offset as usize);

        // Odometer increment, last axis fastest.
        let mut axis = dims.len();
        loop {
            if axis == 0 {
                return Ok(offsets);
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < dims[axis].len {
                break;
            }
            index[axis] = 0;
        }
    }
}

/// Copy out the selected region as a self-describing tile.
pub fn extract(tile: &Tile, subslice: &SubSlice) -> SpartanResult<Tile> {
    if subslice.is_whole() {
        return Ok(tile.clone());
    }
    let dtype = dense_dtype(tile)?;
    let dims = resolve(&tile.shape, subslice)?;
    let width = dtype.width();
    let offsets = element_offsets(&tile.shape, &dims)?;
    let mut out = Vec::with_capacity(offsets.len() * width);
    for off in offsets {
        out.extend_from_slice(&tile.data[off * width..(off + 1) * width]);
    }
    Ok(Tile {
        dtype: tile.dtype.clone(),
        sparse: false,
        shape: dims.iter().map(|d| d.len).collect(),
        data: out.into(),
    })
}

/// Merge `payload` into the selected region and return the new tile
/// payload. `payload` must hold exactly one element per selected index.
pub fn merge(
    tile: &Tile,
    region: &SubSlice,
    payload: &Bytes,
    reducer: Reducer,
) -> SpartanResult<Bytes> {
    if tile.sparse || DType::from_name(&tile.dtype).is_none() {
        if !region.is_whole() || reducer != Reducer::Replace {
            return Err(SpartanError::shape_error(format!(
                "{} tile of dtype '{}' only supports whole-tile replace, got {}",
                if tile.sparse { "sparse" } else { "opaque" },
                tile.dtype,
                reducer.as_str()
            )));
        }
        if !tile.sparse && payload.len() != tile.data.len() {
            return Err(SpartanError::shape_error(format!(
                "replace payload is {} bytes, tile holds {}",
                payload.len(),
                tile.data.len()
            )));
        }
        return Ok(payload.clone());
    }

    let dtype = dense_dtype(tile)?;
    let dims = resolve(&tile.shape, region)?;
    let width = dtype.width();
    let offsets = element_offsets(&tile.shape, &dims)?;
    if payload.len() != offsets.len() * width {
        return Err(SpartanError::shape_error(format!(
            "update payload is {} bytes, region of {} elements needs {}",
            payload.len(),
            offsets.len(),
            offsets.len() * width
        )));
    }

    let mut data = tile.data.to_vec();
    match dtype {
        DType::Bool => reduce_into::<bool>(&mut data, payload, &offsets, reducer),
        DType::Int8 => reduce_into::<i8>(&mut data, payload, &offsets, reducer),
        DType::UInt8 => reduce_into::<u8>(&mut data, payload, &offsets, reducer),
        DType::Int16 => reduce_into::<i16>(&mut data, payload, &offsets, reducer),
        DType::UInt16 => reduce_into::<u16>(&mut data, payload, &offsets, reducer),
        DType::Int32 => reduce_into::<i32>(&mut data, payload, &offsets, reducer),
        DType::UInt32 => reduce_into::<u32>(&mut data, payload, &offsets, reducer),
        DType::Int64 => reduce_into::<i64>(&mut data, payload, &offsets, reducer),
        DType::UInt64 => reduce_into::<u64>(&mut data, payload, &offsets, reducer),
        DType::Float32 => reduce_into::<f32>(&mut data, payload, &offsets, reducer),
        DType::Float64 => reduce_into::<f64>(&mut data, payload, &offsets, reducer),
    }
    Ok(data.into())
}

trait Element: Copy {
    const WIDTH: usize;
    fn load(bytes: &[u8]) -> Self;
    fn store(self, bytes: &mut [u8]);
    fn reduce(self, other: Self, reducer: Reducer) -> Self;
}

fn reduce_into<T: Element>(data: &mut [u8], payload: &[u8], offsets: &[usize], reducer: Reducer) {
    let w = T::WIDTH;
    for (k, &off) in offsets.iter().enumerate() {
        let slot = &mut data[off * w..(off + 1) * w];
        let incoming = T::load(&payload[k * w..(k + 1) * w]);
        T::load(slot).reduce(incoming, reducer).store(slot);
    }
}

macro_rules! int_element {
    ($($ty:ty),+) => {$(
        impl Element for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn load(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }

            fn store(self, bytes: &mut [u8]) {
                bytes.copy_from_slice(&self.to_le_bytes());
            }

            fn reduce(self, other: Self, reducer: Reducer) -> Self {
                match reducer {
                    Reducer::Add => self.wrapping_add(other),
                    Reducer::Multiply => self.wrapping_mul(other),
                    Reducer::Maximum => self.max(other),
                    Reducer::Minimum => self.min(other),
                    Reducer::Replace => other,
                }
            }
        }
    )+};
}

// NaN propagates through maximum/minimum.
macro_rules! float_element {
    ($($ty:ty),+) => {$(
        impl Element for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn load(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_le_bytes(raw)
            }

            fn store(self, bytes: &mut [u8]) {
                bytes.copy_from_slice(&self.to_le_bytes());
            }

            fn reduce(self, other: Self, reducer: Reducer) -> Self {
                match reducer {
                    Reducer::Add => self + other,
                    Reducer::Multiply => self * other,
                    Reducer::Maximum => if self > other || self.is_nan() { self } else { other },
                    Reducer::Minimum => if self < other || self.is_nan() { self } else { other },
                    Reducer::Replace => other,
                }
            }
        }
    )+};
}

int_element!(i8, u8, i16, u16, i32, u32, i64, u64);
float_element!(f32, f64);

impl Element for bool {
    const WIDTH: usize = 1;

    fn load(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn store(self, bytes: &mut [u8]) {
        bytes[0] = u8::from(self);
    }

    fn reduce(self, other: Self, reducer: Reducer) -> Self {
        match reducer {
            Reducer::Add | Reducer::Maximum => self | other,
            Reducer::Multiply | Reducer::Minimum => self & other,
            Reducer::Replace => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spartan_proto::Slice;

    fn f64_tile(shape: Vec<i64>, values: &[f64]) -> Tile {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Tile::dense("float64", shape, data)
    }

    fn f64s(bytes: &[u8]) -> Vec<f64> {
        bytes.chunks_exact(8).map(f64::load).collect()
    }

    fn i32_bytes(values: &[i32]) -> Bytes {
        values
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect::<Vec<u8>>()
            .into()
    }

    fn arange(shape: Vec<i64>) -> Tile {
        let n: i64 = shape.iter().product();
        let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
        f64_tile(shape, &values)
    }

    #[test]
    fn test_extract_2d_stepped() {
        let tile = arange(vec![3, 4]);
        let region = SubSlice::new(vec![Slice::new(1, 3), Slice::with_step(0, 4, 2)]);
        let out = extract(&tile, &region).unwrap();
        assert_eq!(out.shape, vec![2, 2]);
        assert_eq!(f64s(&out.data), vec![4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn test_extract_trailing_dims_whole() {
        let tile = arange(vec![3, 2]);
        let out = extract(&tile, &SubSlice::new(vec![Slice::new(2, 3)])).unwrap();
        assert_eq!(out.shape, vec![1, 2]);
        assert_eq!(f64s(&out.data), vec![4.0, 5.0]);
    }

    #[test]
    fn test_extract_whole_is_shared() {
        let tile = arange(vec![4]);
        let out = extract(&tile, &SubSlice::whole()).unwrap();
        assert_eq!(out.data.as_ptr(), tile.data.as_ptr());
    }

    #[test]
    fn test_empty_region() {
        let tile = arange(vec![4]);
        let out = extract(&tile, &SubSlice::new(vec![Slice::new(2, 2)])).unwrap();
        assert_eq!(out.shape, vec![0]);
        assert!(out.data.is_empty());
    }

    #[test]
    fn test_bad_slices() {
        let tile = arange(vec![4]);
        for slices in [
            vec![Slice::new(0, 5)],
            vec![Slice::new(3, 2)],
            vec![Slice::new(-1, 2)],
            vec![Slice::with_step(0, 2, 0)],
            vec![Slice::new(0, 1), Slice::new(0, 1)],
        ] {
            let err = extract(&tile, &SubSlice::new(slices)).unwrap_err();
            assert!(err.is_shape_error());
        }
    }

    #[test]
    fn test_step_larger_than_extent() {
        let tile = arange(vec![8]);
        let region = SubSlice::new(vec![Slice::with_step(0, 5, i64::MAX)]);
        let out = extract(&tile, &region).unwrap();
        assert_eq!(out.shape, vec![1]);
        assert_eq!(f64s(&out.data), vec![0.0]);

        let payload = f64_tile(vec![1], &[10.0]).data;
        let data = merge(&tile, &region, &payload, Reducer::Add).unwrap();
        assert_eq!(f64s(&data)[..2], [10.0, 1.0]);
    }

    #[test]
    fn test_overflowing_shape_is_shape_error() {
        let tile = Tile::dense("float64", vec![1 << 32, 1 << 32], Vec::new());
        let region = SubSlice::new(vec![Slice::new(0, 1)]);
        assert!(extract(&tile, &region).unwrap_err().is_shape_error());
        let err = merge(&tile, &region, &Bytes::new(), Reducer::Replace).unwrap_err();
        assert!(err.is_shape_error());

        let tile = Tile::dense("float64", vec![i64::MAX, 2], Vec::new());
        assert!(extract(&tile, &region).unwrap_err().is_shape_error());
    }

    #[test]
    fn test_sum_update_on_prefix() {
        let tile = f64_tile(vec![8], &[1.0; 8]);
        let region = SubSlice::new(vec![Slice::new(0, 5)]);
        let payload: Bytes = [2.0f64; 5]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect::<Vec<u8>>()
            .into();
        let data = merge(&tile, &region, &payload, Reducer::Add).unwrap();
        assert_eq!(f64s(&data), vec![3.0, 3.0, 3.0, 3.0, 3.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_integer_reducers_wrap() {
        let tile = Tile::dense("int32", vec![3], i32_bytes(&[i32::MAX, 5, -4]));
        let payload = i32_bytes(&[1, 7, -9]);
        let whole = SubSlice::whole();
        let sum = merge(&tile, &whole, &payload, Reducer::Add).unwrap();
        assert_eq!(sum, i32_bytes(&[i32::MIN, 12, -13]));
        let max = merge(&tile, &whole, &payload, Reducer::Maximum).unwrap();
        assert_eq!(max, i32_bytes(&[i32::MAX, 7, -4]));
        let min = merge(&tile, &whole, &payload, Reducer::Minimum).unwrap();
        assert_eq!(min, i32_bytes(&[1, 5, -9]));
        let mul = merge(&tile, &whole, &payload, Reducer::Multiply).unwrap();
        assert_eq!(mul, i32_bytes(&[i32::MAX, 35, 36]));
    }

    #[test]
    fn test_float_max_propagates_nan() {
        let tile = f64_tile(vec![2], &[f64::NAN, 1.0]);
        let payload = f64_tile(vec![2], &[0.0, f64::NAN]).data;
        let data = merge(&tile, &SubSlice::whole(), &payload, Reducer::Maximum).unwrap();
        assert!(f64s(&data).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_bool_reducers() {
        let tile = Tile::dense("bool", vec![2], vec![1u8, 0]);
        let payload = Bytes::from_static(&[0, 1]);
        let or = merge(&tile, &SubSlice::whole(), &payload, Reducer::Add).unwrap();
        assert_eq!(or.as_ref(), &[1, 1]);
        let and = merge(&tile, &SubSlice::whole(), &payload, Reducer::Multiply).unwrap();
        assert_eq!(and.as_ref(), &[0, 0]);
    }

    #[test]
    fn test_payload_size_mismatch() {
        let tile = arange(vec![4]);
        let payload = Bytes::from(vec![0u8; 16]);
        let err = merge(&tile, &SubSlice::new(vec![Slice::new(0, 3)]), &payload, Reducer::Add)
            .unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_sparse_rules() {
        let tile = Tile::sparse("float64", vec![4], vec![9u8; 5]);
        assert!(extract(&tile, &SubSlice::new(vec![Slice::new(0, 1)]))
            .unwrap_err()
            .is_shape_error());
        let payload = Bytes::from_static(b"new sparse body");
        assert!(merge(&tile, &SubSlice::whole(), &payload, Reducer::Add)
            .unwrap_err()
            .is_shape_error());
        let data = merge(&tile, &SubSlice::whole(), &payload, Reducer::Replace).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn test_unknown_dtype_whole_replace_only() {
        let tile = Tile::dense("complex128", vec![1], vec![0u8; 16]);
        let payload = Bytes::from(vec![1u8; 16]);
        assert_eq!(
            merge(&tile, &SubSlice::whole(), &payload, Reducer::Replace).unwrap(),
            payload
        );
        assert!(merge(&tile, &SubSlice::whole(), &Bytes::from(vec![1u8; 8]), Reducer::Replace)
            .unwrap_err()
            .is_shape_error());
        assert!(merge(&tile, &SubSlice::whole(), &payload, Reducer::Add)
            .unwrap_err()
            .is_shape_error());
    }

    #[test]
    fn test_zero_dimensional_tile() {
        let tile = f64_tile(vec![], &[2.5]);
        let payload = f64_tile(vec![], &[4.0]).data;
        let data = merge(&tile, &SubSlice::whole(), &payload, Reducer::Multiply).unwrap();
        assert_eq!(f64s(&data), vec![10.0]);
    }

    #[test]
    fn test_dtype_names() {
        for name in ["bool", "int8", "uint16", "int64", "float32", "float64"] {
            assert_eq!(DType::from_name(name).unwrap().as_str(), name);
        }
        assert_eq!(DType::Float32.width(), 4);
        assert!(DType::from_name("object").is_none());
    }
}
