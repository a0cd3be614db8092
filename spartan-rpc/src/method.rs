// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Method names used on the wire.

use std::fmt;

macro_rules! method_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            pub fn from_str_name(s: &str) -> Option<Self> {
                match s {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

method_enum!(
    /// Methods served by a worker.
    WorkerMethod {
        Initialize => "initialize",
        GetTileInfo => "get_tile_info",
        Create => "create",
        Destroy => "destroy",
        Update => "update",
        Get => "get",
        GetFlatten => "get_flatten",
        CancelTile => "cancel_tile",
        RunKernel => "run_kernel",
        Shutdown => "shutdown",
    }
);

method_enum!(
    /// Methods served by the master.
    MasterMethod {
        Register => "register",
        Heartbeat => "heartbeat",
        UpdateAndStealTile => "update_and_steal_tile",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for m in WorkerMethod::ALL {
            assert_eq!(WorkerMethod::from_str_name(m.as_str()), Some(*m));
        }
        for m in MasterMethod::ALL {
            assert_eq!(MasterMethod::from_str_name(m.as_str()), Some(*m));
        }
        assert_eq!(WorkerMethod::ALL.len(), 10);
        assert_eq!(WorkerMethod::from_str_name("steal"), None);
        assert_eq!(MasterMethod::UpdateAndStealTile.to_string(), "update_and_steal_tile");
    }
}
