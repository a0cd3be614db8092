// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Typed clients over an [`RpcEndpoint`], plus the retry policy used for
//! application-level retries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use spartan_common::config::WorkerConfig;
use spartan_common::status::SpartanResult;
use spartan_proto::{
    CreateTileReq, DestroyReq, EmptyMessage, GetReq, GetResp, HeartbeatReq, InitializeReq,
    Marshal, RegisterReq, RunKernelReq, RunKernelResp, TileIdMessage, TileInfoResp,
    UpdateAndStealTileReq, UpdateReq,
};
use spartan_util::backoff::ExponentialBackoff;

use crate::method::{MasterMethod, WorkerMethod};
use crate::traits::{MasterClient, RpcEndpoint, WorkerClient};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Registration retry policy from the worker configuration.
    pub fn from_worker_config(config: &WorkerConfig) -> Self {
        Self {
            max_attempts: config.register_max_attempts,
            initial_delay: Duration::from_millis(config.register_initial_backoff_ms),
            max_delay: Duration::from_millis(config.register_max_backoff_ms),
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.initial_delay,
            self.multiplier,
            self.max_delay,
            self.max_attempts,
        )
    }
}

/// Per-client call counters.
#[derive(Debug, Default)]
pub struct CallStats {
    total_calls: AtomicU64,
    failed_calls: AtomicU64,
}

impl CallStats {
    fn record(&self, ok: bool) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }

    pub fn failed_calls(&self) -> u64 {
        self.failed_calls.load(Ordering::Relaxed)
    }
}

/// Encode `req`, send it, decode the reply as `Resp`.
async fn unary<E, Req, Resp>(
    endpoint: &E,
    stats: &CallStats,
    method: &'static str,
    req: &Req,
) -> SpartanResult<Resp>
where
    E: RpcEndpoint + ?Sized,
    Req: Marshal + Sync,
    Resp: Marshal,
{
    let result = match endpoint.call(method, req.to_bytes()).await {
        Ok(reply) => Resp::from_bytes(reply),
        Err(e) => Err(e),
    };
    stats.record(result.is_ok());
    if let Err(e) = &result {
        tracing::debug!(method, error = %e, "RPC failed");
    }
    result
}

/// Worker service client over any endpoint.
pub struct WorkerRpcClient<E> {
    endpoint: E,
    stats: CallStats,
}

impl<E: RpcEndpoint> WorkerRpcClient<E> {
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint,
            stats: CallStats::default(),
        }
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }
}

/// Master service client over any endpoint.
pub struct MasterRpcClient<E> {
    endpoint: E,
    stats: CallStats,
}

impl<E: RpcEndpoint> MasterRpcClient<E> {
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint,
            stats: CallStats::default(),
        }
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }
}

macro_rules! impl_rpc {
    ($self:ident, $method:expr, $req:expr) => {
        unary(&$self.endpoint, &$self.stats, $method.as_str(), &$req).await
    };
}

#[async_trait::async_trait]
impl<E: RpcEndpoint> WorkerClient for WorkerRpcClient<E> {
    async fn initialize(&self, req: InitializeReq) -> SpartanResult<EmptyMessage> {
        impl_rpc!(self, WorkerMethod::Initialize, req)
    }

    async fn shutdown(&self, req: EmptyMessage) -> SpartanResult<EmptyMessage> {
        impl_rpc!(self, WorkerMethod::Shutdown, req)
    }

    async fn get_tile_info(&self, req: TileIdMessage) -> SpartanResult<TileInfoResp> {
        impl_rpc!(self, WorkerMethod::GetTileInfo, req)
    }

    async fn create(&self, req: CreateTileReq) -> SpartanResult<TileIdMessage> {
        impl_rpc!(self, WorkerMethod::Create, req)
    }

    async fn destroy(&self, req: DestroyReq) -> SpartanResult<EmptyMessage> {
        impl_rpc!(self, WorkerMethod::Destroy, req)
    }

    async fn update(&self, req: UpdateReq) -> SpartanResult<EmptyMessage> {
        impl_rpc!(self, WorkerMethod::Update, req)
    }

    async fn get(&self, req: GetReq) -> SpartanResult<GetResp> {
        impl_rpc!(self, WorkerMethod::Get, req)
    }

    async fn get_flatten(&self, req: GetReq) -> SpartanResult<GetResp> {
        impl_rpc!(self, WorkerMethod::GetFlatten, req)
    }

    async fn cancel_tile(&self, req: TileIdMessage) -> SpartanResult<bool> {
        impl_rpc!(self, WorkerMethod::CancelTile, req)
    }

    async fn run_kernel(&self, req: RunKernelReq) -> SpartanResult<RunKernelResp> {
        impl_rpc!(self, WorkerMethod::RunKernel, req)
    }
}

#[async_trait::async_trait]
impl<E: RpcEndpoint> MasterClient for MasterRpcClient<E> {
    async fn register(&self, req: RegisterReq) -> SpartanResult<EmptyMessage> {
        impl_rpc!(self, MasterMethod::Register, req)
    }

    async fn heartbeat(&self, req: HeartbeatReq) -> SpartanResult<EmptyMessage> {
        impl_rpc!(self, MasterMethod::Heartbeat, req)
    }

    async fn update_and_steal_tile(
        &self,
        req: UpdateAndStealTileReq,
    ) -> SpartanResult<TileIdMessage> {
        impl_rpc!(self, MasterMethod::UpdateAndStealTile, req)
    }
}
