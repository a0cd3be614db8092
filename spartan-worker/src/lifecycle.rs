// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Worker lifecycle: `Uninit -> Registered -> Ready -> Stopped`.

use std::fmt;

use spartan_common::status::{SpartanError, SpartanResult};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Uninit,
    Registered,
    Ready,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninit => "UNINIT",
            Self::Registered => "REGISTERED",
            Self::Ready => "READY",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state, observable through a watch channel.
pub struct Lifecycle {
    state: watch::Sender<WorkerState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(WorkerState::Uninit);
        Self { state }
    }

    pub fn current(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Move `from -> to` atomically. Fails with `StateError` naming the
    /// actual state if the worker is not in `from`.
    pub fn transition(&self, from: WorkerState, to: WorkerState) -> SpartanResult<()> {
        let mut actual = from;
        let moved = self.state.send_if_modified(|state| {
            actual = *state;
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::info!(from = %from, to = %to, "Worker state transition");
            Ok(())
        } else {
            Err(SpartanError::state_error(format!(
                "expected worker state {from}, found {actual}"
            )))
        }
    }

    pub fn require(&self, expected: WorkerState) -> SpartanResult<()> {
        let actual = self.current();
        if actual == expected {
            Ok(())
        } else {
            Err(SpartanError::state_error(format!(
                "worker is {actual}, operation requires {expected}"
            )))
        }
    }

    /// Enter `Stopped` from any state. Returns false if already stopped.
    pub fn stop(&self) -> bool {
        let previous = self.state.send_replace(WorkerState::Stopped);
        if previous != WorkerState::Stopped {
            tracing::info!(from = %previous, "Worker stopped");
            true
        } else {
            false
        }
    }

    /// Resolve once the state is `Stopped`.
    pub async fn wait_stopped(&self) {
        let mut rx = self.subscribe();
        loop {
            if *rx.borrow_and_update() == WorkerState::Stopped {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_happy_path() {
        let lc = Lifecycle::new();
        lc.transition(WorkerState::Uninit, WorkerState::Registered)
            .unwrap();
        lc.transition(WorkerState::Registered, WorkerState::Ready)
            .unwrap();
        lc.require(WorkerState::Ready).unwrap();
        assert!(lc.stop());
        assert!(!lc.stop());
        assert_eq!(lc.current(), WorkerState::Stopped);
    }

    #[test]
    fn test_wrong_source_state() {
        let lc = Lifecycle::new();
        let err = lc
            .transition(WorkerState::Registered, WorkerState::Ready)
            .unwrap_err();
        assert!(err.is_state_error());
        assert!(err.message.contains("UNINIT"));
        assert_eq!(lc.current(), WorkerState::Uninit);
        assert!(lc.require(WorkerState::Ready).unwrap_err().is_state_error());
    }

    #[tokio::test]
    async fn test_wait_stopped() {
        let lc = Arc::new(Lifecycle::new());
        let waiter = {
            let lc = Arc::clone(&lc);
            tokio::spawn(async move { lc.wait_stopped().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        lc.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
