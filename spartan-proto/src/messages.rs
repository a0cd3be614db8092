// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Request and reply messages exchanged between master, workers and peers.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use spartan_common::id::{TileId, WorkerId};
use spartan_common::status::SpartanResult;

use crate::marshal::{impl_marshal, Marshal};
use crate::types::{SubSlice, Tile, WorkerStatus};

/// Reply (or request) with no fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyMessage;

impl Marshal for EmptyMessage {
    fn encode(&self, _buf: &mut BytesMut) {}

    fn decode(_buf: &mut Bytes) -> SpartanResult<Self> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterReq {
    pub host: String,
    pub worker_status: WorkerStatus,
}

impl_marshal!(RegisterReq { host, worker_status });

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitializeReq {
    pub id: WorkerId,
    pub peers: BTreeMap<WorkerId, String>,
}

impl_marshal!(InitializeReq { id, peers });

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTileReq {
    pub tile_id: TileId,
    pub data: Tile,
}

impl_marshal!(CreateTileReq { tile_id, data });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TileIdMessage {
    pub tile_id: TileId,
}

impl TileIdMessage {
    pub fn new(tile_id: TileId) -> Self {
        Self { tile_id }
    }
}

impl_marshal!(TileIdMessage { tile_id });

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetReq {
    pub id: TileId,
    pub subslice: SubSlice,
}

impl_marshal!(GetReq { id, subslice });

/// `data` is an encoded `Tile` for `get` and raw element bytes for
/// `get_flatten`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetResp {
    pub id: TileId,
    pub data: Bytes,
}

impl_marshal!(GetResp { id, data });

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReq {
    pub id: TileId,
    pub region: SubSlice,
    pub data: Bytes,
    pub reducer: i32,
}

impl_marshal!(UpdateReq {
    id,
    region,
    data,
    reducer,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestroyReq {
    pub ids: Vec<TileId>,
}

impl_marshal!(DestroyReq { ids });

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunKernelReq {
    pub tile_ids: Vec<TileId>,
    pub kernel: Bytes,
}

impl_marshal!(RunKernelReq { tile_ids, kernel });

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunKernelResp {
    pub result: Bytes,
}

impl_marshal!(RunKernelResp { result });

#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatReq {
    pub worker_id: WorkerId,
    pub worker_status: WorkerStatus,
}

impl_marshal!(HeartbeatReq {
    worker_id,
    worker_status,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateAndStealTileReq {
    pub worker_id: WorkerId,
    pub old_tile_id: TileId,
    pub new_tile_id: TileId,
}

impl_marshal!(UpdateAndStealTileReq {
    worker_id,
    old_tile_id,
    new_tile_id,
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileInfoResp {
    pub dtype: String,
    pub sparse: bool,
}

impl_marshal!(TileInfoResp { dtype, sparse });
