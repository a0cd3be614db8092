// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Tile builders and payload helpers.

use bytes::Bytes;
use spartan_proto::Tile;

/// Little-endian bytes of `values`.
pub fn f64_bytes(values: &[f64]) -> Bytes {
    values
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect::<Vec<u8>>()
        .into()
}

/// Decode little-endian `f64`s.
pub fn f64_values(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}

pub fn i32_bytes(values: &[i32]) -> Bytes {
    values
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect::<Vec<u8>>()
        .into()
}

pub fn i32_values(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn f64_tile(shape: Vec<i64>, values: &[f64]) -> Tile {
    Tile::dense("float64", shape, f64_bytes(values))
}

pub fn i32_tile(shape: Vec<i64>, values: &[i32]) -> Tile {
    Tile::dense("int32", shape, i32_bytes(values))
}

/// `float64` tile holding `0, 1, 2, ...` in row-major order.
pub fn arange_f64_tile(shape: Vec<i64>) -> Tile {
    let n: i64 = shape.iter().product();
    let values: Vec<f64> = (0..n).map(|i| i as f64).collect();
    f64_tile(shape, &values)
}

/// `float64` tile with uniformly random values in `[0, 1)`.
pub fn random_f64_tile(shape: Vec<i64>) -> Tile {
    let n: i64 = shape.iter().product();
    let values: Vec<f64> = (0..n).map(|_| rand::random::<f64>()).collect();
    f64_tile(shape, &values)
}

/// A sparse tile with an opaque payload.
pub fn opaque_sparse_tile(len: usize) -> Tile {
    let payload: Vec<u8> = (0..len).map(|_| rand::random::<u8>()).collect();
    Tile::sparse("float64", vec![len as i64], payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arange() {
        let tile = arange_f64_tile(vec![2, 3]);
        assert_eq!(tile.num_elements(), Some(6));
        assert_eq!(f64_values(&tile.data), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_i32_bytes() {
        let tile = i32_tile(vec![3], &[-1, 0, i32::MAX]);
        assert_eq!(tile.data.len(), 12);
        assert_eq!(i32_values(&tile.data), vec![-1, 0, i32::MAX]);
    }

    #[test]
    fn test_random_tile_size() {
        let tile = random_f64_tile(vec![4, 4]);
        assert_eq!(tile.data.len(), 128);
        assert!(f64_values(&tile.data).iter().all(|v| (0.0..1.0).contains(v)));
    }
}
