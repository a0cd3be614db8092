// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Global tile ownership directory.
//!
//! Maps each authoritative tile id to its owning worker. A steal replaces
//! the authoritative id with the thief's id and leaves a forwarding entry
//! from the old id, so stale ids can still be resolved.

use std::collections::HashMap;

use parking_lot::RwLock;
use spartan_common::id::{TileId, WorkerId};
use spartan_common::status::{SpartanError, SpartanResult};

#[derive(Default)]
struct Inner {
    /// Authoritative id -> owner.
    owners: HashMap<TileId, WorkerId>,
    /// Superseded id -> the id that replaced it.
    forwards: HashMap<TileId, TileId>,
}

impl Inner {
    /// Follow forwarding entries from `id` to the newest generation.
    fn follow(&self, mut id: TileId) -> TileId {
        // A chain never has more hops than there are forwards.
        for _ in 0..=self.forwards.len() {
            match self.forwards.get(&id) {
                Some(next) => id = *next,
                None => break,
            }
        }
        id
    }
}

#[derive(Default)]
pub struct TileOwnershipDirectory {
    inner: RwLock<Inner>,
}

impl TileOwnershipDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tile reported in a heartbeat. Ids that were already
    /// superseded by a steal are ignored.
    pub fn register_tile(&self, id: TileId, owner: WorkerId) {
        let mut inner = self.inner.write();
        if inner.forwards.contains_key(&id) {
            tracing::debug!(tile_id = %id, "Ignoring report of superseded tile");
            return;
        }
        inner.owners.insert(id, owner);
    }

    /// Compare-and-swap `old_id` for `new_id`, owned by `worker`.
    ///
    /// Returns `new_id` if the swap happened, otherwise the current
    /// authoritative id for the tile. `NotFound` if `old_id` was never known.
    pub fn update_and_steal(
        &self,
        worker: WorkerId,
        old_id: TileId,
        new_id: TileId,
    ) -> SpartanResult<TileId> {
        let mut inner = self.inner.write();
        if inner.owners.remove(&old_id).is_some() {
            inner.owners.insert(new_id, worker);
            inner.forwards.insert(old_id, new_id);
            tracing::info!(old_id = %old_id, new_id = %new_id, worker, "Tile ownership moved");
            return Ok(new_id);
        }
        if !inner.forwards.contains_key(&old_id) {
            return Err(SpartanError::not_found(format!("unknown tile {old_id}")));
        }
        let winner = inner.follow(old_id);
        if winner != new_id {
            inner.owners.remove(&new_id);
            tracing::debug!(
                old_id = %old_id,
                rejected = %new_id,
                winner = %winner,
                "Steal rejected"
            );
        }
        Ok(winner)
    }

    /// The current generation of `id` and its owner.
    pub fn resolve(&self, id: &TileId) -> Option<(TileId, WorkerId)> {
        let inner = self.inner.read();
        let current = inner.follow(*id);
        inner.owners.get(&current).map(|owner| (current, *owner))
    }

    pub fn owner(&self, id: &TileId) -> Option<WorkerId> {
        self.resolve(id).map(|(_, owner)| owner)
    }

    /// Number of authoritative tiles.
    pub fn len(&self) -> usize {
        self.inner.read().owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_forwards(&self) -> usize {
        self.inner.read().forwards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_steal_moves_owner_and_forwards() {
        let dir = TileOwnershipDirectory::new();
        let old = TileId::new(0, 3);
        let new = TileId::new(1, 7);
        dir.register_tile(old, 0);

        assert_eq!(dir.update_and_steal(1, old, new).unwrap(), new);
        assert_eq!(dir.resolve(&old), Some((new, 1)));
        assert_eq!(dir.resolve(&new), Some((new, 1)));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.num_forwards(), 1);
    }

    #[test]
    fn test_retried_steal_is_idempotent() {
        let dir = TileOwnershipDirectory::new();
        let old = TileId::new(0, 3);
        let new = TileId::new(1, 7);
        dir.register_tile(old, 0);
        dir.update_and_steal(1, old, new).unwrap();
        assert_eq!(dir.update_and_steal(1, old, new).unwrap(), new);
        assert_eq!(dir.owner(&new), Some(1));
    }

    #[test]
    fn test_losing_claim_gets_winner() {
        let dir = TileOwnershipDirectory::new();
        let old = TileId::new(0, 3);
        dir.register_tile(old, 0);
        let first = TileId::new(1, 7);
        let second = TileId::new(2, 4);
        dir.register_tile(second, 2);

        dir.update_and_steal(1, old, first).unwrap();
        assert_eq!(dir.update_and_steal(2, old, second).unwrap(), first);
        assert_eq!(dir.owner(&second), None);
    }

    #[test]
    fn test_chained_steals_resolve_to_latest() {
        let dir = TileOwnershipDirectory::new();
        let a = TileId::new(0, 0);
        let b = TileId::new(1, 0);
        let c = TileId::new(2, 0);
        dir.register_tile(a, 0);
        dir.update_and_steal(1, a, b).unwrap();
        dir.update_and_steal(2, b, c).unwrap();
        assert_eq!(dir.resolve(&a), Some((c, 2)));

        // A stale report of `a` does not resurrect it.
        dir.register_tile(a, 0);
        assert_eq!(dir.resolve(&a), Some((c, 2)));
    }

    #[test]
    fn test_unknown_tile() {
        let dir = TileOwnershipDirectory::new();
        let err = dir
            .update_and_steal(1, TileId::new(0, 0), TileId::new(1, 0))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(dir.is_empty());
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let dir = Arc::new(TileOwnershipDirectory::new());
        let old = TileId::new(0, 0);
        dir.register_tile(old, 0);

        let handles: Vec<_> = (1..=8)
            .map(|w| {
                let dir = Arc::clone(&dir);
                std::thread::spawn(move || {
                    let new = TileId::new(w, 0);
                    dir.update_and_steal(w, old, new).unwrap() == new
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(dir.len(), 1);
    }
}
