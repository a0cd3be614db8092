// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! The worker's local tile directory.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use spartan_common::id::{TileId, WorkerId};
use spartan_common::status::{SpartanError, SpartanResult};
use spartan_proto::{Reducer, SubSlice, Tile, TileInfoResp};

use crate::region;

/// How `create` treats an id that is already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// A present id is an `AlreadyExists` failure.
    Fresh,
    /// Overwrite. Used when a steal re-creates a tile under its new id.
    Recreate,
}

/// Thread-safe `TileId -> Tile` map plus the local id generator.
///
/// The map lock is held only for map access; region copies and reducers
/// run on a cloned `Tile`, except `update`, which merges under the lock so
/// concurrent updates of one id serialize.
pub struct TileStore {
    tiles: Mutex<HashMap<TileId, Tile>>,
    next_local_id: AtomicI32,
}

impl TileStore {
    pub fn new() -> Self {
        Self {
            tiles: Mutex::new(HashMap::new()),
            next_local_id: AtomicI32::new(0),
        }
    }

    /// Allocate a fresh id for `worker`. Local ids are never reused.
    pub fn allocate_id(&self, worker: WorkerId) -> SpartanResult<TileId> {
        self.next_local_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < i32::MAX).then(|| n + 1)
            })
            .map(|local| TileId::new(worker, local))
            .map_err(|_| SpartanError::state_error("local tile id space exhausted"))
    }

    /// Reserve an externally chosen id. Its local part must not have been
    /// issued yet; the generator moves past it.
    pub fn claim_id(&self, id: TileId) -> SpartanResult<()> {
        if id.local_id < 0 {
            return Err(SpartanError::invalid_argument(format!(
                "invalid local id in {id}"
            )));
        }
        let Some(next) = id.local_id.checked_add(1) else {
            return Err(SpartanError::state_error("local tile id space exhausted"));
        };
        self.next_local_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (id.local_id >= n).then_some(next)
            })
            .map(|_| ())
            .map_err(|_| {
                SpartanError::already_exists(format!("tile id {id} was already issued"))
            })
    }

    pub fn create(&self, id: TileId, tile: Tile, mode: CreateMode) -> SpartanResult<()> {
        self.create_with(id, tile, mode, |_| {})
    }

    /// Like [`create`](Self::create), running `on_insert` under the map lock
    /// once the tile is in place.
    pub fn create_with(
        &self,
        id: TileId,
        tile: Tile,
        mode: CreateMode,
        on_insert: impl FnOnce(TileId),
    ) -> SpartanResult<()> {
        let mut tiles = self.tiles.lock();
        if mode == CreateMode::Fresh && tiles.contains_key(&id) {
            return Err(SpartanError::already_exists(format!("tile {id}")));
        }
        tiles.insert(id, tile);
        on_insert(id);
        Ok(())
    }

    /// Region of a tile as a self-describing `Tile`. Empty `subslice`
    /// returns the stored tile without copying the payload.
    pub fn get(&self, id: &TileId, subslice: &SubSlice) -> SpartanResult<Tile> {
        let tile = self.get_whole(id)?;
        region::extract(&tile, subslice)
    }

    /// Contiguous element bytes of a region, row-major.
    pub fn get_flatten(&self, id: &TileId, subslice: &SubSlice) -> SpartanResult<Bytes> {
        Ok(self.get(id, subslice)?.data)
    }

    fn get_whole(&self, id: &TileId) -> SpartanResult<Tile> {
        self.tiles
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| SpartanError::not_found(format!("tile {id}")))
    }

    pub fn update(
        &self,
        id: &TileId,
        region: &SubSlice,
        data: &Bytes,
        reducer: Reducer,
    ) -> SpartanResult<()> {
        let mut tiles = self.tiles.lock();
        let tile = tiles
            .get_mut(id)
            .ok_or_else(|| SpartanError::not_found(format!("tile {id}")))?;
        tile.data = region::merge(tile, region, data, reducer)?;
        Ok(())
    }

    /// Remove every present id. Returns the ids that were removed.
    pub fn destroy(&self, ids: &[TileId]) -> Vec<TileId> {
        self.destroy_with(ids, |_| {})
    }

    /// Like [`destroy`](Self::destroy), running `on_remove` with the removed
    /// ids before the map lock is released.
    pub fn destroy_with(
        &self,
        ids: &[TileId],
        on_remove: impl FnOnce(&[TileId]),
    ) -> Vec<TileId> {
        let mut tiles = self.tiles.lock();
        let removed: Vec<TileId> = ids
            .iter()
            .filter(|id| tiles.remove(*id).is_some())
            .copied()
            .collect();
        on_remove(&removed);
        removed
    }

    pub fn tile_info(&self, id: &TileId) -> SpartanResult<TileInfoResp> {
        self.tiles
            .lock()
            .get(id)
            .map(|t| TileInfoResp {
                dtype: t.dtype.clone(),
                sparse: t.sparse,
            })
            .ok_or_else(|| SpartanError::not_found(format!("tile {id}")))
    }

    pub fn contains(&self, id: &TileId) -> bool {
        self.tiles.lock().contains_key(id)
    }

    /// The ids present locally, in request order, without duplicates.
    pub fn owned_subset(&self, ids: &[TileId]) -> Vec<TileId> {
        let tiles = self.tiles.lock();
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| tiles.contains_key(*id) && seen.insert(**id))
            .copied()
            .collect()
    }

    pub fn ids(&self) -> Vec<TileId> {
        self.tiles.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tiles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TileStore {
    fn default() -> Self {
        Self::new()
    }
}
