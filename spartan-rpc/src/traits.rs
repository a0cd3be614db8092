// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Async traits for the transport seam and the two service clients.

use std::sync::Arc;

use bytes::Bytes;
use spartan_common::id::WorkerId;
use spartan_common::status::SpartanResult;
use spartan_proto::{
    CreateTileReq, DestroyReq, EmptyMessage, GetReq, GetResp, HeartbeatReq, InitializeReq,
    RegisterReq, RunKernelReq, RunKernelResp, TileIdMessage, TileInfoResp, UpdateAndStealTileReq,
    UpdateReq,
};

/// One request/response exchange with a remote service.
///
/// Implementations report transport failures as `RemoteUnreachable` and
/// pass handler errors through unchanged.
#[async_trait::async_trait]
pub trait RpcEndpoint: Send + Sync {
    async fn call(&self, method: &str, payload: Bytes) -> SpartanResult<Bytes>;
}

#[async_trait::async_trait]
impl<T: RpcEndpoint + ?Sized> RpcEndpoint for Arc<T> {
    async fn call(&self, method: &str, payload: Bytes) -> SpartanResult<Bytes> {
        (**self).call(method, payload).await
    }
}

/// Calls a worker makes on the master.
#[async_trait::async_trait]
pub trait MasterClient: Send + Sync {
    async fn register(&self, req: RegisterReq) -> SpartanResult<EmptyMessage>;
    async fn heartbeat(&self, req: HeartbeatReq) -> SpartanResult<EmptyMessage>;
    async fn update_and_steal_tile(
        &self,
        req: UpdateAndStealTileReq,
    ) -> SpartanResult<TileIdMessage>;
}

/// Calls served by a worker, issued by the master or by peer workers.
#[async_trait::async_trait]
pub trait WorkerClient: Send + Sync {
    // ── Lifecycle ─────────────────────────────────────────────────
    async fn initialize(&self, req: InitializeReq) -> SpartanResult<EmptyMessage>;
    async fn shutdown(&self, req: EmptyMessage) -> SpartanResult<EmptyMessage>;

    // ── Tile access ───────────────────────────────────────────────
    async fn get_tile_info(&self, req: TileIdMessage) -> SpartanResult<TileInfoResp>;
    async fn create(&self, req: CreateTileReq) -> SpartanResult<TileIdMessage>;
    async fn destroy(&self, req: DestroyReq) -> SpartanResult<EmptyMessage>;
    async fn update(&self, req: UpdateReq) -> SpartanResult<EmptyMessage>;
    async fn get(&self, req: GetReq) -> SpartanResult<GetResp>;
    async fn get_flatten(&self, req: GetReq) -> SpartanResult<GetResp>;

    // ── Kernels ───────────────────────────────────────────────────
    async fn cancel_tile(&self, req: TileIdMessage) -> SpartanResult<bool>;
    async fn run_kernel(&self, req: RunKernelReq) -> SpartanResult<RunKernelResp>;
}

/// Opens a client for a peer worker. Called lazily on first use of a peer.
#[async_trait::async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(
        &self,
        worker_id: WorkerId,
        address: &str,
    ) -> SpartanResult<Arc<dyn WorkerClient>>;
}
