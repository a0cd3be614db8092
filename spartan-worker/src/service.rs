// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! RPC surface of a worker.
//!
//! Each `handle_*` method takes the decoded request and delegates to the
//! [`Worker`]. The [`RpcEndpoint`] impl is the method table: it decodes the
//! payload, calls the handler and encodes the reply. A payload that fails
//! to decode is rejected before any handler runs.

use std::sync::Arc;

use bytes::Bytes;
use spartan_common::status::{SpartanError, SpartanResult};
use spartan_proto::{
    CreateTileReq, DestroyReq, EmptyMessage, GetReq, GetResp, InitializeReq, Marshal,
    RunKernelReq, RunKernelResp, TileIdMessage, TileInfoResp, UpdateReq,
};
use spartan_rpc::{RpcEndpoint, WorkerMethod};

use crate::worker::Worker;

pub struct WorkerServiceImpl {
    pub worker: Arc<Worker>,
}

impl WorkerServiceImpl {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    pub async fn handle_initialize(&self, request: InitializeReq) -> SpartanResult<EmptyMessage> {
        tracing::debug!(id = request.id, peers = request.peers.len(), "Initialize received");
        self.worker.initialize(request)?;
        Ok(EmptyMessage)
    }

    pub async fn handle_shutdown(&self, _request: EmptyMessage) -> SpartanResult<EmptyMessage> {
        self.worker.shutdown();
        Ok(EmptyMessage)
    }

    // ─── Tile access ─────────────────────────────────────────────────

    pub async fn handle_get_tile_info(
        &self,
        request: TileIdMessage,
    ) -> SpartanResult<TileInfoResp> {
        self.worker.get_tile_info(&request.tile_id)
    }

    pub async fn handle_create(&self, request: CreateTileReq) -> SpartanResult<TileIdMessage> {
        let id = self.worker.create(request)?;
        Ok(TileIdMessage::new(id))
    }

    pub async fn handle_destroy(&self, request: DestroyReq) -> SpartanResult<EmptyMessage> {
        self.worker.destroy(request)?;
        Ok(EmptyMessage)
    }

    pub async fn handle_update(&self, request: UpdateReq) -> SpartanResult<EmptyMessage> {
        self.worker.update(request)?;
        Ok(EmptyMessage)
    }

    pub async fn handle_get(&self, request: GetReq) -> SpartanResult<GetResp> {
        tracing::debug!(tile_id = %request.id, "Get received");
        self.worker.get(request)
    }

    pub async fn handle_get_flatten(&self, request: GetReq) -> SpartanResult<GetResp> {
        tracing::debug!(tile_id = %request.id, "GetFlatten received");
        self.worker.get_flatten(request)
    }

    // ─── Kernels ─────────────────────────────────────────────────────

    pub async fn handle_cancel_tile(&self, request: TileIdMessage) -> SpartanResult<bool> {
        Ok(self.worker.cancel_tile(&request.tile_id))
    }

    pub async fn handle_run_kernel(&self, request: RunKernelReq) -> SpartanResult<RunKernelResp> {
        tracing::debug!(tiles = request.tile_ids.len(), "RunKernel received");
        let result = self.worker.run_kernel(request).await?;
        Ok(RunKernelResp { result })
    }
}

macro_rules! route {
    ($self:ident, $payload:ident, $handler:ident) => {{
        let request = Marshal::from_bytes($payload)?;
        let reply = $self.$handler(request).await?;
        Ok(Marshal::to_bytes(&reply))
    }};
}

#[async_trait::async_trait]
impl RpcEndpoint for WorkerServiceImpl {
    async fn call(&self, method: &str, payload: Bytes) -> SpartanResult<Bytes> {
        let Some(method) = WorkerMethod::from_str_name(method) else {
            tracing::warn!(method, "Unknown worker method");
            return Err(SpartanError::invalid_argument(format!(
                "unknown worker method {method:?}"
            )));
        };
        match method {
            WorkerMethod::Initialize => route!(self, payload, handle_initialize),
            WorkerMethod::GetTileInfo => route!(self, payload, handle_get_tile_info),
            WorkerMethod::Create => route!(self, payload, handle_create),
            WorkerMethod::Destroy => route!(self, payload, handle_destroy),
            WorkerMethod::Update => route!(self, payload, handle_update),
            WorkerMethod::Get => route!(self, payload, handle_get),
            WorkerMethod::GetFlatten => route!(self, payload, handle_get_flatten),
            WorkerMethod::CancelTile => route!(self, payload, handle_cancel_tile),
            WorkerMethod::RunKernel => route!(self, payload, handle_run_kernel),
            WorkerMethod::Shutdown => route!(self, payload, handle_shutdown),
        }
    }
}
