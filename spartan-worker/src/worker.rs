// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! The worker context object shared by every handler.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use spartan_common::config::WorkerConfig;
use spartan_common::constants::UNASSIGNED_WORKER_ID;
use spartan_common::id::{TileId, WorkerId};
use spartan_common::status::{SpartanError, SpartanResult};
use spartan_proto::{
    CreateTileReq, DestroyReq, GetReq, GetResp, InitializeReq, Marshal, Reducer, RunKernelReq,
    SubSlice, Tile, TileInfoResp, UpdateReq,
};
use spartan_rpc::{MasterClient, PeerConnector};
use tokio::task::JoinHandle;

use crate::kernel::{KernelContext, KernelExecutor, KernelRegistry, UnconfiguredExecutor};
use crate::lifecycle::{Lifecycle, WorkerState};
use crate::peers::PeerRegistry;
use crate::status_tracker::StatusTracker;
use crate::tile_store::{CreateMode, TileStore};
use crate::usage::{SystemUsageProvider, UsageProvider};

/// Everything a worker is constructed from.
pub struct WorkerOptions {
    pub config: WorkerConfig,
    pub master: Arc<dyn MasterClient>,
    pub connector: Arc<dyn PeerConnector>,
    pub executor: Arc<dyn KernelExecutor>,
    pub usage: Arc<dyn UsageProvider>,
}

impl WorkerOptions {
    pub fn new(
        config: WorkerConfig,
        master: Arc<dyn MasterClient>,
        connector: Arc<dyn PeerConnector>,
    ) -> Self {
        Self {
            config,
            master,
            connector,
            executor: Arc::new(UnconfiguredExecutor),
            usage: Arc::new(SystemUsageProvider),
        }
    }

    pub fn with_executor(mut self, executor: impl KernelExecutor + 'static) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    pub fn with_usage_provider(mut self, usage: impl UsageProvider + 'static) -> Self {
        self.usage = Arc::new(usage);
        self
    }
}

/// A worker node: tile directory, status, kernels and peers.
///
/// Each component has its own lock. No lock is held across a network call
/// or an engine invocation.
pub struct Worker {
    config: WorkerConfig,
    lifecycle: Lifecycle,
    worker_id: AtomicI32,
    store: TileStore,
    status: StatusTracker,
    kernels: KernelRegistry,
    peers: PeerRegistry,
    master: Arc<dyn MasterClient>,
    executor: Arc<dyn KernelExecutor>,
    pub(crate) usage: Arc<dyn UsageProvider>,
    init_lock: Mutex<()>,
    pub(crate) heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Fails with `InvalidArgument` if the configuration does not validate.
    pub fn new(options: WorkerOptions) -> SpartanResult<Arc<Self>> {
        options
            .config
            .validate()
            .map_err(SpartanError::invalid_argument)?;
        Ok(Arc::new(Self {
            config: options.config,
            lifecycle: Lifecycle::new(),
            worker_id: AtomicI32::new(UNASSIGNED_WORKER_ID),
            store: TileStore::new(),
            status: StatusTracker::new(),
            kernels: KernelRegistry::new(),
            peers: PeerRegistry::new(options.connector),
            master: options.master,
            executor: options.executor,
            usage: options.usage,
            init_lock: Mutex::new(()),
            heartbeat_task: Mutex::new(None),
        }))
    }

    // ─── Accessors ───────────────────────────────────────────────────

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.current()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Index assigned at initialize time, `-1` before that.
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id.load(Ordering::Acquire)
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    pub fn kernels(&self) -> &KernelRegistry {
        &self.kernels
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn master(&self) -> &Arc<dyn MasterClient> {
        &self.master
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Accept identity and peer table from the master and start serving.
    pub fn initialize(self: &Arc<Self>, req: InitializeReq) -> SpartanResult<()> {
        let _init = self.init_lock.lock();
        self.lifecycle.require(WorkerState::Registered)?;
        if req.id < 0 {
            return Err(SpartanError::invalid_argument(format!(
                "invalid worker id {}",
                req.id
            )));
        }
        self.worker_id.store(req.id, Ordering::Release);
        let num_peers = req.peers.len();
        self.peers.set_addresses(req.peers);
        self.lifecycle
            .transition(WorkerState::Registered, WorkerState::Ready)?;
        tracing::info!(worker_id = req.id, num_peers, "Worker initialized");
        self.spawn_heartbeat();
        Ok(())
    }

    /// Stop serving tile RPCs. In-flight requests run to completion.
    pub fn shutdown(&self) {
        if self.lifecycle.stop() {
            tracing::info!(
                worker_id = self.worker_id(),
                num_tiles = self.store.len(),
                "Worker shutting down"
            );
        }
    }

    // ─── Tile operations ─────────────────────────────────────────────

    /// Store a tile. An unset id gets a freshly allocated one; a concrete id
    /// must belong to this worker and must not have been issued before.
    /// Returns the id the tile is stored under.
    pub fn create(&self, req: CreateTileReq) -> SpartanResult<TileId> {
        self.lifecycle.require(WorkerState::Ready)?;
        let worker_id = self.worker_id();
        let id = if req.tile_id.is_unset() {
            self.store.allocate_id(worker_id)?
        } else {
            if req.tile_id.worker != worker_id {
                return Err(SpartanError::invalid_argument(format!(
                    "tile {} does not belong to worker {worker_id}",
                    req.tile_id
                )));
            }
            self.store.claim_id(req.tile_id)?;
            req.tile_id
        };
        self.store
            .create_with(id, req.data, CreateMode::Fresh, |id| {
                self.status.record_new_tile(id)
            })?;
        tracing::debug!(tile_id = %id, "Created tile");
        Ok(id)
    }

    /// The selected region, encoded as a `Tile`.
    pub fn get(&self, req: GetReq) -> SpartanResult<GetResp> {
        self.lifecycle.require(WorkerState::Ready)?;
        let tile = self.store.get(&req.id, &req.subslice)?;
        Ok(GetResp {
            id: req.id,
            data: tile.to_bytes(),
        })
    }

    /// The selected region as raw row-major element bytes.
    pub fn get_flatten(&self, req: GetReq) -> SpartanResult<GetResp> {
        self.lifecycle.require(WorkerState::Ready)?;
        let data = self.store.get_flatten(&req.id, &req.subslice)?;
        Ok(GetResp { id: req.id, data })
    }

    pub fn update(&self, req: UpdateReq) -> SpartanResult<()> {
        self.lifecycle.require(WorkerState::Ready)?;
        let reducer = Reducer::from_code(req.reducer)?;
        self.store.update(&req.id, &req.region, &req.data, reducer)?;
        tracing::debug!(tile_id = %req.id, reducer = reducer.as_str(), "Updated tile");
        Ok(())
    }

    /// Remove tiles. Absent ids are ignored.
    pub fn destroy(&self, req: DestroyReq) -> SpartanResult<()> {
        self.lifecycle.require(WorkerState::Ready)?;
        let removed = self
            .store
            .destroy_with(&req.ids, |removed| self.status.forget_tiles(removed));
        tracing::debug!(
            requested = req.ids.len(),
            removed = removed.len(),
            "Destroyed tiles"
        );
        Ok(())
    }

    pub fn get_tile_info(&self, id: &TileId) -> SpartanResult<TileInfoResp> {
        self.lifecycle.require(WorkerState::Ready)?;
        self.store.tile_info(id)
    }

    // ─── Kernels ─────────────────────────────────────────────────────

    /// Signal every running kernel that references `id`. Never fails.
    pub fn cancel_tile(&self, id: &TileId) -> bool {
        if self.state() != WorkerState::Ready {
            return false;
        }
        let signalled = self.kernels.cancel_tile(id);
        tracing::debug!(tile_id = %id, signalled, "Cancel requested");
        signalled
    }

    /// Run the engine over the locally owned subset of `req.tile_ids`.
    /// Returns empty bytes without invoking the engine if that subset is
    /// empty.
    pub async fn run_kernel(self: &Arc<Self>, req: RunKernelReq) -> SpartanResult<Bytes> {
        self.lifecycle.require(WorkerState::Ready)?;
        let owned = self.store.owned_subset(&req.tile_ids);
        if owned.is_empty() {
            tracing::debug!(requested = req.tile_ids.len(), "No local tiles; kernel skipped");
            return Ok(Bytes::new());
        }

        let guard = self.kernels.register(owned.clone());
        let ctx = KernelContext::new(
            Arc::clone(self),
            owned,
            guard.cancel_flag(),
            tokio::runtime::Handle::current(),
        );
        let executor = Arc::clone(&self.executor);
        let kernel = req.kernel;
        let result = tokio::task::spawn_blocking(move || executor.execute(&kernel, &ctx)).await;
        drop(guard);

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Kernel failed");
                Err(SpartanError::execution_error(format!("kernel failed: {e}")))
            }
            Err(join_error) => {
                let what = if join_error.is_panic() {
                    "kernel panicked"
                } else {
                    "kernel task was cancelled"
                };
                tracing::warn!(error = %join_error, "{what}");
                Err(SpartanError::execution_error(what))
            }
        }
    }

    /// Read a region of any tile: locally if owned, otherwise from the
    /// worker named in the id.
    pub async fn fetch_tile(&self, id: &TileId, subslice: &SubSlice) -> SpartanResult<Tile> {
        if self.store.contains(id) {
            return self.store.get(id, subslice);
        }
        let peer = self.peers.client(id.worker).await?;
        let reply = peer
            .get(GetReq {
                id: *id,
                subslice: subslice.clone(),
            })
            .await;
        match reply {
            Ok(resp) => Tile::from_bytes(resp.data),
            Err(e) => {
                if e.is_remote_unreachable() {
                    self.peers.evict(id.worker);
                }
                Err(e)
            }
        }
    }
}
