// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Device configuration and protocol limits.

use crate::error::{RxpError, RxpResult};
use crate::poll::iterations_for;
use std::time::Duration;

/// Largest job payload accepted by the engine.
pub const RXP_MAX_JOB_LENGTH: usize = 16384;

/// Matches reported per response.
pub const MAX_MATCHES: usize = 254;

/// Size of one match tuple on the wire.
pub const MATCH_TUPLE_SIZE: usize = 8;

/// Size of the response header on the wire.
pub const RESPONSE_HEADER_SIZE: usize = 16;

/// Output buffer needed for a full match list.
pub const MAX_SIZE_MATCH_RESP: usize = MAX_MATCHES * MATCH_TUPLE_SIZE;

/// Default rule-database region per engine (128 MiB).
pub const MAX_DB_SIZE: usize = 1 << 27;

/// Upper bound on queues; one bit each in the active mask.
pub const MAX_QUEUES_LIMIT: usize = 32;

pub const DEFAULT_MAX_QUEUES: usize = 4;
pub const DEFAULT_SLOTS_PER_QUEUE: usize = 64;

const RXP_INITIALIZATION_TIMEOUT_MS: u64 = 60_000;
const POLL_CSR_FOR_VALUE_TIMEOUT_MS: u64 = 3_000;

/// Register polling budgets.
///
/// `init` bounds the engine reset poll; `poll` bounds every other CSR wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub init: Duration,
    pub poll: Duration,
    /// Wait after an INIT pulse before polling.
    pub settle: Duration,
    /// Delay between consecutive reads.
    pub interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            init: Duration::from_millis(RXP_INITIALIZATION_TIMEOUT_MS),
            poll: Duration::from_millis(POLL_CSR_FOR_VALUE_TIMEOUT_MS),
            settle: Duration::from_millis(20),
            interval: Duration::from_millis(1),
        }
    }
}

impl Timeouts {
    /// Read budget for the engine init poll.
    pub fn init_iterations(&self) -> u32 {
        iterations_for(self.init, self.interval)
    }

    /// Read budget for steady-state polls.
    pub fn poll_iterations(&self) -> u32 {
        iterations_for(self.poll, self.interval)
    }

    pub fn set_init(&mut self, init: Duration) {
        self.init = init;
    }

    pub fn set_poll(&mut self, poll: Duration) {
        self.poll = poll;
    }

    pub fn set_settle(&mut self, settle: Duration) {
        self.settle = settle;
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }
}

/// Device tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub max_queues: usize,
    pub slots_per_queue: usize,
    /// Bytes per rule-database region.
    pub database_size: usize,
    /// Back database regions with huge pages (Linux only).
    pub huge_pages: bool,
    pub timeouts: Timeouts,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_queues: DEFAULT_MAX_QUEUES,
            slots_per_queue: DEFAULT_SLOTS_PER_QUEUE,
            database_size: MAX_DB_SIZE,
            huge_pages: true,
            timeouts: Timeouts::default(),
        }
    }
}

impl DeviceConfig {
    /// Set the number of queues that may be open at once.
    pub fn set_max_queues(&mut self, max_queues: usize) {
        self.max_queues = max_queues;
    }

    /// Set the number of job slots per queue.
    pub fn set_slots_per_queue(&mut self, slots: usize) {
        self.slots_per_queue = slots;
    }

    pub fn set_database_size(&mut self, size: usize) {
        self.database_size = size;
    }

    pub fn set_huge_pages(&mut self, huge_pages: bool) {
        self.huge_pages = huge_pages;
    }

    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.timeouts = timeouts;
    }

    pub fn validate(&self) -> RxpResult<()> {
        if self.max_queues == 0 || self.max_queues > MAX_QUEUES_LIMIT {
            return Err(RxpError::InvalidArgument(format!(
                "max_queues {} outside 1..={}",
                self.max_queues, MAX_QUEUES_LIMIT
            )));
        }
        if self.slots_per_queue == 0 {
            return Err(RxpError::InvalidArgument(
                "slots_per_queue must be at least 1".into(),
            ));
        }
        if self.database_size == 0 {
            return Err(RxpError::InvalidArgument(
                "database_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database_size, 128 * 1024 * 1024);
        assert_eq!(config.timeouts.init_iterations(), 60_000);
        assert_eq!(config.timeouts.poll_iterations(), 3_000);
        assert_eq!(MAX_SIZE_MATCH_RESP, 2032);
    }

    #[test]
    fn test_validate() {
        let mut config = DeviceConfig::default();
        config.set_max_queues(33);
        assert!(config.validate().is_err());
        config.set_max_queues(32);
        assert!(config.validate().is_ok());
        config.set_slots_per_queue(0);
        assert!(config.validate().is_err());
        config.set_slots_per_queue(1);
        config.set_database_size(0);
        assert!(matches!(
            config.validate(),
            Err(RxpError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_timeout_setters() {
        let mut t = Timeouts::default();
        t.set_poll(Duration::from_millis(10));
        t.set_interval(Duration::from_millis(2));
        assert_eq!(t.poll_iterations(), 5);
    }
}
