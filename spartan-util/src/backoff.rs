// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Bounded exponential backoff.
//!
//! Used for application-level retries (worker registration). Socket-level
//! retries belong to the transport.

use std::time::Duration;

/// Exponential backoff calculator with an attempt budget.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    current_delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
            current_delay: initial_delay,
            max_attempts,
            attempts: 0,
        }
    }

    /// Record a failed attempt and return how long to wait before the next
    /// one, or `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            return None;
        }
        let delay = self.current_delay;
        let next = Duration::from_secs_f64(self.current_delay.as_secs_f64() * self.multiplier);
        self.current_delay = next.min(self.max_delay);
        Some(delay)
    }

    /// Like `next_delay`, with random jitter of up to +50% (still capped).
    pub fn next_delay_with_jitter(&mut self) -> Option<Duration> {
        let delay = self.next_delay()?;
        let jitter_factor = 1.0 + rand::random::<f64>() * 0.5;
        Some(Duration::from_secs_f64(delay.as_secs_f64() * jitter_factor).min(self.max_delay))
    }

    /// Number of failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.current_delay = self.initial_delay;
        self.attempts = 0;
    }
}
