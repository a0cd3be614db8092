// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Round-trip tests over the whole message catalog, with boundary values.

use std::collections::BTreeMap;
use std::fmt::Debug;

use bytes::Bytes;
use spartan_common::id::TileId;
use spartan_proto::*;

fn assert_roundtrip<M: Marshal + PartialEq + Debug>(msg: M) {
    let encoded = msg.to_bytes();
    let decoded = M::from_bytes(encoded.clone()).unwrap();
    assert_eq!(decoded, msg);
    // Encoding is deterministic.
    assert_eq!(decoded.to_bytes(), encoded);
}

fn status(new_tiles: Vec<TileId>) -> WorkerStatus {
    WorkerStatus {
        total_physical_memory: 16 << 30,
        num_processors: 8,
        mem_usage: 0.5,
        cpu_usage: 0.0,
        last_report_time: 0.0,
        kernel_remain_tiles: vec![],
        new_tiles,
    }
}

#[test]
fn test_catalog_roundtrip() {
    assert_roundtrip(EmptyMessage);
    assert_roundtrip(RegisterReq {
        host: String::new(),
        worker_status: status(vec![]),
    });
    assert_roundtrip(RegisterReq {
        host: "10.0.0.3:7001".to_string(),
        worker_status: status(vec![TileId::new(i32::MAX, i32::MAX)]),
    });

    let mut peers = BTreeMap::new();
    peers.insert(0, "a:1".to_string());
    peers.insert(i32::MAX, String::new());
    assert_roundtrip(InitializeReq { id: 0, peers });
    assert_roundtrip(InitializeReq::default());

    assert_roundtrip(CreateTileReq {
        tile_id: TileId::unset(2),
        data: Tile::dense("float64", vec![2, 2], vec![0u8; 32]),
    });
    assert_roundtrip(CreateTileReq {
        tile_id: TileId::new(0, 0),
        data: Tile::sparse("", vec![], Bytes::new()),
    });

    assert_roundtrip(TileIdMessage::new(TileId::nil()));
    assert_roundtrip(GetReq {
        id: TileId::new(1, 2),
        subslice: SubSlice::new(vec![Slice::new(0, 5), Slice::with_step(i64::MIN, i64::MAX, 3)]),
    });
    assert_roundtrip(GetReq::default());
    assert_roundtrip(GetResp {
        id: TileId::new(1, 2),
        data: Bytes::from_static(b"\x00\x01\x02"),
    });
    assert_roundtrip(UpdateReq {
        id: TileId::new(0, 1),
        region: SubSlice::whole(),
        data: Bytes::new(),
        reducer: Reducer::Replace.code(),
    });
    assert_roundtrip(DestroyReq { ids: vec![] });
    assert_roundtrip(DestroyReq {
        ids: (0..100).map(|i| TileId::new(i % 3, i)).collect(),
    });
    assert_roundtrip(RunKernelReq {
        tile_ids: vec![TileId::new(0, 1)],
        kernel: Bytes::from_static(b"kernel body"),
    });
    assert_roundtrip(RunKernelResp::default());
    assert_roundtrip(HeartbeatReq {
        worker_id: i32::MAX,
        worker_status: status(vec![TileId::new(0, 1), TileId::new(0, 2)]),
    });
    assert_roundtrip(UpdateAndStealTileReq {
        worker_id: 1,
        old_tile_id: TileId::new(0, 3),
        new_tile_id: TileId::new(1, 7),
    });
    assert_roundtrip(TileInfoResp {
        dtype: "float32".to_string(),
        sparse: true,
    });
    assert_roundtrip(true);
    assert_roundtrip(false);
}

#[test]
fn test_truncation_fails_at_every_prefix() {
    let msg = HeartbeatReq {
        worker_id: 3,
        worker_status: status(vec![TileId::new(3, 9)]),
    };
    let encoded = msg.to_bytes();
    for cut in 0..encoded.len() {
        let err = HeartbeatReq::from_bytes(encoded.slice(..cut)).unwrap_err();
        assert!(err.is_serialization_error(), "prefix {cut} decoded");
    }
}

#[test]
fn test_trailing_bytes_fail() {
    let mut raw = TileIdMessage::new(TileId::new(0, 1)).to_bytes().to_vec();
    raw.push(0xAB);
    let err = TileIdMessage::from_bytes(Bytes::from(raw)).unwrap_err();
    assert!(err.is_serialization_error());
}

#[test]
fn test_encoded_kernel_request_is_shareable() {
    let req = RunKernelReq {
        tile_ids: vec![TileId::new(0, 1), TileId::new(1, 1)],
        kernel: Bytes::from(vec![7u8; 1024]),
    };
    let encoded = req.to_bytes();
    let a = RunKernelReq::from_bytes(encoded.clone()).unwrap();
    let b = RunKernelReq::from_bytes(encoded).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.kernel.len(), 1024);
}
