// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Kernel execution seam and the registry of running kernels.
//!
//! The compute engine is external. It receives the kernel body and a
//! [`KernelContext`] exposing the tiles it may touch, and returns opaque
//! result bytes. Engines run on a blocking thread; the context bridges back
//! into the runtime for peer calls.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use spartan_common::id::{TileId, WorkerId};
use spartan_common::status::{SpartanError, SpartanResult};
use spartan_proto::{CreateTileReq, Reducer, SubSlice, Tile, UpdateReq};
use tokio::runtime::Handle;

use crate::steal::StealOutcome;
use crate::worker::Worker;

/// The compute engine.
pub trait KernelExecutor: Send + Sync {
    fn execute(&self, kernel: &Bytes, ctx: &KernelContext) -> SpartanResult<Bytes>;
}

impl<F> KernelExecutor for F
where
    F: Fn(&Bytes, &KernelContext) -> SpartanResult<Bytes> + Send + Sync,
{
    fn execute(&self, kernel: &Bytes, ctx: &KernelContext) -> SpartanResult<Bytes> {
        self(kernel, ctx)
    }
}

/// Installed when no engine was configured; every kernel fails.
#[derive(Debug, Default)]
pub struct UnconfiguredExecutor;

impl KernelExecutor for UnconfiguredExecutor {
    fn execute(&self, _kernel: &Bytes, _ctx: &KernelContext) -> SpartanResult<Bytes> {
        Err(SpartanError::execution_error("no kernel executor configured"))
    }
}

/// A cooperative cancellation flag.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct RunningKernel {
    tile_ids: Vec<TileId>,
    cancel: CancelFlag,
}

/// Kernels currently executing, with the tiles each one references.
#[derive(Default)]
pub struct KernelRegistry {
    running: Mutex<HashMap<u64, RunningKernel>>,
    next_id: AtomicU64,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a kernel until the returned guard drops.
    pub fn register(&self, tile_ids: Vec<TileId>) -> KernelGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelFlag::default();
        self.running.lock().insert(
            id,
            RunningKernel {
                tile_ids,
                cancel: cancel.clone(),
            },
        );
        KernelGuard {
            registry: self,
            id,
            cancel,
        }
    }

    /// Signal every running kernel that references `tile_id`.
    pub fn cancel_tile(&self, tile_id: &TileId) -> bool {
        let running = self.running.lock();
        let mut signalled = false;
        for kernel in running.values() {
            if kernel.tile_ids.contains(tile_id) {
                kernel.cancel.cancel();
                signalled = true;
            }
        }
        signalled
    }

    /// Distinct ids referenced by running kernels, sorted.
    pub fn remaining_tiles(&self) -> Vec<TileId> {
        self.running
            .lock()
            .values()
            .flat_map(|k| k.tile_ids.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn num_running(&self) -> usize {
        self.running.lock().len()
    }
}

/// Removes its kernel from the registry on drop, including on panic or
/// early return.
pub struct KernelGuard<'a> {
    registry: &'a KernelRegistry,
    id: u64,
    cancel: CancelFlag,
}

impl KernelGuard<'_> {
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }
}

impl Drop for KernelGuard<'_> {
    fn drop(&mut self) {
        self.registry.running.lock().remove(&self.id);
    }
}

/// What a kernel can do while it runs.
pub struct KernelContext {
    worker: Arc<Worker>,
    tile_ids: Vec<TileId>,
    cancel: CancelFlag,
    handle: Handle,
}

impl KernelContext {
    pub(crate) fn new(
        worker: Arc<Worker>,
        tile_ids: Vec<TileId>,
        cancel: CancelFlag,
        handle: Handle,
    ) -> Self {
        Self {
            worker,
            tile_ids,
            cancel,
            handle,
        }
    }

    /// The locally owned tiles this kernel was started on.
    pub fn tile_ids(&self) -> &[TileId] {
        &self.tile_ids
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker.worker_id()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Read a region of a local tile.
    pub fn get_tile(&self, id: &TileId, subslice: &SubSlice) -> SpartanResult<Tile> {
        self.worker.store().get(id, subslice)
    }

    /// Store a result tile under a fresh id. The id is reported in the next
    /// heartbeat like any other create.
    pub fn create_tile(&self, tile: Tile) -> SpartanResult<TileId> {
        self.worker.create(CreateTileReq {
            tile_id: TileId::unset(self.worker_id()),
            data: tile,
        })
    }

    pub fn update_tile(
        &self,
        id: TileId,
        region: SubSlice,
        data: Bytes,
        reducer: Reducer,
    ) -> SpartanResult<()> {
        self.worker.update(UpdateReq {
            id,
            region,
            data,
            reducer: reducer.code(),
        })
    }

    /// Read a region of any tile, asking the owning peer if it is not local.
    pub fn fetch(&self, id: &TileId, subslice: &SubSlice) -> SpartanResult<Tile> {
        self.handle.block_on(self.worker.fetch_tile(id, subslice))
    }

    /// Take over ownership of a remote tile.
    pub fn steal(&self, id: TileId) -> SpartanResult<StealOutcome> {
        self.handle.block_on(self.worker.steal(id))
    }
}
