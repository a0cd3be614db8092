// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Taking over ownership of a remote tile.
//!
//! The thief copies the tile from its owner, stores the copy under a fresh
//! local id, then asks the master to swap the authoritative id. The master
//! decides the winner; the thief only reacts to the reply.

use spartan_common::id::TileId;
use spartan_common::status::SpartanResult;
use spartan_proto::{DestroyReq, GetReq, Marshal, SubSlice, Tile, UpdateAndStealTileReq};

use crate::lifecycle::WorkerState;
use crate::tile_store::CreateMode;
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StealOutcome {
    /// This worker now owns the tile under the contained id.
    Won(TileId),
    /// Another claim landed first; `winner` is the authoritative id.
    Lost { winner: TileId },
}

impl StealOutcome {
    /// The id to use for the tile from now on, whoever owns it.
    pub fn current_id(&self) -> TileId {
        match *self {
            Self::Won(id) => id,
            Self::Lost { winner } => winner,
        }
    }
}

impl Worker {
    pub async fn steal(&self, old_id: TileId) -> SpartanResult<StealOutcome> {
        self.lifecycle().require(WorkerState::Ready)?;
        let worker_id = self.worker_id();
        if old_id.worker == worker_id && self.store().contains(&old_id) {
            return Ok(StealOutcome::Won(old_id));
        }

        let owner = self.peers().client(old_id.worker).await?;
        let fetched = owner
            .get(GetReq {
                id: old_id,
                subslice: SubSlice::whole(),
            })
            .await;
        let resp = match fetched {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_remote_unreachable() {
                    self.peers().evict(old_id.worker);
                }
                return Err(e);
            }
        };
        let tile = Tile::from_bytes(resp.data)?;

        let new_id = self.store().allocate_id(worker_id)?;
        self.store().create(new_id, tile, CreateMode::Recreate)?;
        tracing::debug!(old_id = %old_id, new_id = %new_id, "Copied tile for steal");

        let reply = self
            .master()
            .update_and_steal_tile(UpdateAndStealTileReq {
                worker_id,
                old_tile_id: old_id,
                new_tile_id: new_id,
            })
            .await;

        match reply {
            Ok(msg) if msg.tile_id == new_id => {
                tracing::info!(old_id = %old_id, new_id = %new_id, "Steal won");
                if let Err(e) = owner.destroy(DestroyReq { ids: vec![old_id] }).await {
                    tracing::warn!(
                        old_id = %old_id,
                        error = %e,
                        "Failed to destroy stolen tile on previous owner"
                    );
                }
                Ok(StealOutcome::Won(new_id))
            }
            Ok(msg) => {
                self.store().destroy(&[new_id]);
                tracing::info!(old_id = %old_id, winner = %msg.tile_id, "Steal lost");
                Ok(StealOutcome::Lost {
                    winner: msg.tile_id,
                })
            }
            Err(e) if e.is_remote_unreachable() => {
                // The master may already point at the copy.
                tracing::warn!(
                    old_id = %old_id,
                    new_id = %new_id,
                    error = %e,
                    "Steal outcome unknown; keeping local copy"
                );
                Err(e)
            }
            Err(e) => {
                self.store().destroy(&[new_id]);
                tracing::warn!(old_id = %old_id, error = %e, "Steal rejected");
                Err(e)
            }
        }
    }
}
