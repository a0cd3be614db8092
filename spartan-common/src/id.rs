// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Tile identifiers.
//!
//! A `TileId` is the pair `(worker, local_id)`: the index of the worker that
//! allocated it and a per-worker sequence number. Ids are never reused, so a
//! `TileId` names one generation of one tile for the lifetime of a cluster.

use std::fmt;

use crate::constants::{UNASSIGNED_WORKER_ID, UNSET_LOCAL_ID};

/// Worker index assigned by the master at initialize time.
pub type WorkerId = i32;

/// Globally unique tile identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub worker: WorkerId,
    pub local_id: i32,
}

impl TileId {
    pub const fn new(worker: WorkerId, local_id: i32) -> Self {
        Self { worker, local_id }
    }

    /// The nil id `(-1, -1)`.
    pub const fn nil() -> Self {
        Self {
            worker: UNASSIGNED_WORKER_ID,
            local_id: UNSET_LOCAL_ID,
        }
    }

    /// An id for `worker` whose local part has not been assigned yet.
    pub const fn unset(worker: WorkerId) -> Self {
        Self {
            worker,
            local_id: UNSET_LOCAL_ID,
        }
    }

    /// Returns true if the local part is the unset sentinel.
    pub fn is_unset(&self) -> bool {
        self.local_id == UNSET_LOCAL_ID
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::nil()
    }
}

impl Default for TileId {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Debug for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileId({}.{})", self.worker, self.local_id)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T({}.{})", self.worker, self.local_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;
    use std::hash::{Hash, Hasher};

    fn hash_of(id: &TileId) -> u64 {
        let mut h = DefaultHasher::new();
        id.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_structural_equality_and_hash() {
        let a = TileId::new(2, 17);
        let b = TileId::new(2, 17);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, TileId::new(17, 2));
        assert_ne!(a, TileId::new(2, 18));
    }

    #[test]
    fn test_swapped_fields_are_distinct_keys() {
        // A xor-style hash collides on swapped fields; the set must still
        // keep them apart.
        let mut set = HashSet::new();
        set.insert(TileId::new(1, 2));
        set.insert(TileId::new(2, 1));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_unset_never_equals_assigned() {
        for worker in [0, 1, 7] {
            let unset = TileId::unset(worker);
            assert!(unset.is_unset());
            for local in 0..64 {
                assert_ne!(unset, TileId::new(worker, local));
            }
        }
    }

    #[test]
    fn test_nil_default() {
        let id = TileId::default();
        assert!(id.is_nil());
        assert!(id.is_unset());
        assert!(!TileId::new(0, 0).is_nil());
    }

    #[test]
    fn test_display() {
        assert_eq!(TileId::new(0, 3).to_string(), "T(0.3)");
        assert_eq!(format!("{:?}", TileId::new(1, 7)), "TileId(1.7)");
    }
}
