// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Master-side bookkeeping for the Spartan worker protocol.
//!
//! Assigns worker ids, collects heartbeats and keeps the authoritative
//! tile ownership directory that arbitrates steals.

pub mod ownership;
pub mod service;
pub mod worker_manager;

pub use ownership::TileOwnershipDirectory;
pub use service::{MasterServiceImpl, TileLocation};
pub use worker_manager::{WorkerEntry, WorkerManager};
