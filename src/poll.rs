// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Bounded register polling.
//!
//! [`poll`] is a pure loop over a reader, a predicate and a [`Clock`]. Engine
//! code supplies CSR reads; tests supply a scripted reader and a clock that
//! never sleeps.

use std::sync::Mutex;
use std::time::Duration;

/// Source of delays between polls.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Returns immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClock;

impl Clock for NoopClock {
    fn sleep(&self, _duration: Duration) {}
}

/// Records every requested sleep without waiting.
#[derive(Debug, Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for RecordingClock {
    fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(duration);
    }
}

/// A satisfied poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Zero-based index of the read that satisfied the predicate.
    pub cycles: u32,
    /// The satisfying value.
    pub value: u32,
}

/// Why a poll gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError<E> {
    /// Every read failed the predicate.
    Timeout { iterations: u32, last: u32 },
    /// The reader failed.
    Read(E),
}

/// Read until `predicate` holds, at most `max_iterations` times.
///
/// Sleeps `interval` after each unsatisfied read. With `max_iterations == 0`
/// nothing is read and the poll times out with `last == 0`.
pub fn poll<E, R, F>(
    mut read: R,
    predicate: F,
    max_iterations: u32,
    interval: Duration,
    clock: &dyn Clock,
) -> Result<PollOutcome, PollError<E>>
where
    R: FnMut() -> Result<u32, E>,
    F: Fn(u32) -> bool,
{
    let mut last = 0;
    for cycle in 0..max_iterations {
        last = read().map_err(PollError::Read)?;
        if predicate(last) {
            return Ok(PollOutcome {
                cycles: cycle,
                value: last,
            });
        }
        clock.sleep(interval);
    }
    Err(PollError::Timeout {
        iterations: max_iterations,
        last,
    })
}

/// Iterations that fit in `timeout` at one read per `interval`.
pub fn iterations_for(timeout: Duration, interval: Duration) -> u32 {
    if interval.is_zero() {
        return 1;
    }
    let n = timeout.as_nanos() / interval.as_nanos();
    u32::try_from(n).unwrap_or(u32::MAX).max(1)
}
