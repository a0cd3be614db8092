// Copyright 2024 The Ray Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0

//! Host resource sampling for heartbeats.

/// Usage figures carried in `WorkerStatus`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceUsage {
    pub total_physical_memory: i64,
    pub num_processors: i32,
    /// Fraction of physical memory in use, `0.0..=1.0`.
    pub mem_usage: f64,
    /// One-minute load average divided by the processor count.
    pub cpu_usage: f64,
}

pub trait UsageProvider: Send + Sync {
    fn sample(&self) -> ResourceUsage;
}

/// Reads `/proc/meminfo` and `/proc/loadavg`. Anything unreadable reports
/// as zero.
#[derive(Debug, Default)]
pub struct SystemUsageProvider;

impl UsageProvider for SystemUsageProvider {
    fn sample(&self) -> ResourceUsage {
        let num_processors = std::thread::available_parallelism()
            .map(|n| n.get() as i32)
            .unwrap_or(0);
        let (total_kb, available_kb) = std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|s| parse_meminfo(&s))
            .unwrap_or((0, 0));
        let load = std::fs::read_to_string("/proc/loadavg")
            .ok()
            .and_then(|s| parse_loadavg(&s))
            .unwrap_or(0.0);

        let mem_usage = if total_kb > 0 {
            (1.0 - available_kb as f64 / total_kb as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let cpu_usage = if num_processors > 0 {
            load / f64::from(num_processors)
        } else {
            0.0
        };
        ResourceUsage {
            total_physical_memory: total_kb.saturating_mul(1024),
            num_processors,
            mem_usage,
            cpu_usage,
        }
    }
}

/// Fixed figures, for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticUsageProvider(pub ResourceUsage);

impl UsageProvider for StaticUsageProvider {
    fn sample(&self) -> ResourceUsage {
        self.0
    }
}

/// `(MemTotal, MemAvailable)` in kB.
fn parse_meminfo(text: &str) -> Option<(i64, i64)> {
    let field = |name: &str| {
        text.lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|v| v.parse::<i64>().ok())
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:").or_else(|| field("MemFree:"))?;
    Some((total, available))
}

fn parse_loadavg(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let text = "MemTotal:       16316412 kB\n\
                    MemFree:         1024 kB\n\
                    MemAvailable:    8158206 kB\n";
        assert_eq!(parse_meminfo(text), Some((16316412, 8158206)));
        assert_eq!(parse_meminfo("MemTotal: 10 kB\nMemFree: 4 kB\n"), Some((10, 4)));
        assert_eq!(parse_meminfo("garbage"), None);
    }

    #[test]
    fn test_parse_loadavg() {
        assert_eq!(parse_loadavg("0.52 0.58 0.59 1/467 12345\n"), Some(0.52));
        assert_eq!(parse_loadavg(""), None);
    }

    #[test]
    fn test_system_sample_is_sane() {
        let usage = SystemUsageProvider.sample();
        assert!(usage.total_physical_memory >= 0);
        assert!((0.0..=1.0).contains(&usage.mem_usage));
        assert!(usage.cpu_usage >= 0.0);
    }
}
