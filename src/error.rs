// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Error types for RXP operations.

use crate::rof::RofEntryType;
use thiserror::Error;

/// Errors that can occur while driving the RXP engines.
#[derive(Debug, Error)]
pub enum RxpError {
    /// Transport failure reading or writing a CSR.
    #[error("register I/O failed on engine {engine} at {address:#06x}: {reason}")]
    RegisterIo {
        engine: u8,
        address: u32,
        reason: String,
    },

    /// The engine did not report init-done in time.
    #[error("engine {engine} init timed out (status {status:#010x})")]
    InitTimeout { engine: u8, status: u32 },

    /// The rule memories did not report init-done in time.
    #[error("engine {engine} rule memory init timed out (RTRU status {status:#010x})")]
    RtruInitTimeout { engine: u8, status: u32 },

    /// A rule batch was not accepted or committed in time.
    #[error("engine {engine} rule flush timed out waiting for {stage} (last value {last:#010x})")]
    RuleFlushTimeout {
        engine: u8,
        stage: &'static str,
        last: u32,
    },

    /// Generic CSR poll that ran out of iterations.
    #[error("poll of {address:#06x} timed out after {iterations} reads (expected {expected:#x}, mask {mask:#x}, last {last:#x})")]
    PollTimeout {
        address: u32,
        expected: u32,
        mask: u32,
        iterations: u32,
        last: u32,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Rule entry addresses a register block other than main or RTRU.
    #[error("invalid register block {0:#06x} in rule entry")]
    InvalidRegisterBlock(u16),

    /// Unknown rule entry type code.
    #[error("invalid ROF entry type {0}")]
    InvalidRofEntryType(u8),

    /// Malformed rule file.
    #[error("ROF parse error at entry {index}: {reason}")]
    RofParse { index: usize, reason: String },

    /// Engine has not completed initialization.
    #[error("engine {engine} not initialized (status {status:#010x})")]
    EngineNotReady { engine: u8, status: u32 },

    /// A check entry in the rule program did not hold against live hardware.
    #[error("rule check {kind} failed at {address:#010x}: register holds {actual:#x}, entry value {expected:#x}")]
    RuleVerificationFailed {
        kind: RofEntryType,
        address: u32,
        expected: u64,
        actual: u32,
    },

    /// Allocation, registration or slot setup failed.
    #[error("resources exhausted: {0}")]
    ResourceExhausted(String),

    /// Every queue id on the device is taken.
    #[error("too many open queues (max {max})")]
    TooManyQueues { max: usize },

    /// The device released its rule databases after the last queue closed.
    #[error("device closed")]
    DeviceClosed,

    /// No adapter found on the system.
    #[error("no RXP capable adapter found")]
    NoDeviceFound,

    /// Adapter lacks a required capability.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The engine's identifier CSR does not read as an RXP.
    #[error("engine {engine} identifier {ident:#06x} is not an RXP")]
    UnexpectedIdentifier { engine: u8, ident: u32 },

    /// The completion interface reported an error for a job.
    #[error("completion error on slot {slot}: {reason}")]
    CompletionError { slot: usize, reason: String },

    /// Posting a work descriptor failed.
    #[error("work submission failed: {0}")]
    SubmitFailed(String),

    /// I/O error from system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RxpError {
    /// POSIX-style negative status code, as returned by the C driver API.
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidArgument(_)
            | Self::InvalidRegisterBlock(_)
            | Self::InvalidRofEntryType(_)
            | Self::RofParse { .. }
            | Self::RuleVerificationFailed { .. } => -libc::EINVAL,
            Self::EngineNotReady { .. } | Self::TooManyQueues { .. } => -libc::EBUSY,
            Self::InitTimeout { .. }
            | Self::RtruInitTimeout { .. }
            | Self::RuleFlushTimeout { .. }
            | Self::PollTimeout { .. } => -libc::ETIMEDOUT,
            Self::ResourceExhausted(_) => -libc::ENOMEM,
            Self::NoDeviceFound => -libc::ENODEV,
            Self::Unsupported(_) => -libc::ENOTSUP,
            Self::RegisterIo { .. } | Self::Io(_) => -libc::EIO,
            Self::DeviceClosed
            | Self::UnexpectedIdentifier { .. }
            | Self::CompletionError { .. }
            | Self::SubmitFailed(_) => -1,
        }
    }

    /// True for the poll-timeout family.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::InitTimeout { .. }
                | Self::RtruInitTimeout { .. }
                | Self::RuleFlushTimeout { .. }
                | Self::PollTimeout { .. }
        )
    }
}

/// Result type alias for RXP operations.
pub type RxpResult<T> = Result<T, RxpError>;
