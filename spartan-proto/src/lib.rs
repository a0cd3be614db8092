// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Wire message catalog for Spartan RPCs.
//!
//! Every message is a plain owned record with a fixed field order, encoded
//! by the deterministic codec in [`marshal`].

pub mod marshal;
pub mod messages;
pub mod types;

pub use marshal::Marshal;
pub use messages::*;
pub use types::{Reducer, Slice, SubSlice, Tile, WorkerStatus};
