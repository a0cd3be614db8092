// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Utility library for Spartan.
//!
//! Provides logging setup, wall-clock helpers and exponential backoff.

pub mod backoff;
pub mod logging;
pub mod time;
