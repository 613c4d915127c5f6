// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Platform seams.
//!
//! The driver never touches hardware directly. CSR access, DMA registration
//! and job posting go through the traits in this module, implemented by the
//! platform glue or by [`crate::sim`].

use crate::descriptor::WorkDescriptor;
use crate::error::{RxpError, RxpResult};

/// Number of RXP engines behind one adapter.
pub const ENGINES_PER_DEVICE: usize = 2;

/// One of the two RXP engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(u8);

impl EngineId {
    pub const ALL: [EngineId; ENGINES_PER_DEVICE] = [EngineId(0), EngineId(1)];

    pub fn new(id: u8) -> RxpResult<Self> {
        if usize::from(id) < ENGINES_PER_DEVICE {
            Ok(Self(id))
        } else {
            Err(RxpError::InvalidArgument(format!(
                "engine {} out of range (0..{})",
                id, ENGINES_PER_DEVICE
            )))
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32-bit CSR access to an engine.
pub trait RegisterPort {
    fn read(&self, engine: EngineId, address: u32) -> RxpResult<u32>;
    fn write(&self, engine: EngineId, address: u32, value: u32) -> RxpResult<()>;
}

impl<P: RegisterPort + ?Sized> RegisterPort for &P {
    fn read(&self, engine: EngineId, address: u32) -> RxpResult<u32> {
        (**self).read(engine, address)
    }

    fn write(&self, engine: EngineId, address: u32, value: u32) -> RxpResult<()> {
        (**self).write(engine, address, value)
    }
}

/// Key returned by a DMA registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryKey(pub u32);

/// Hardware identifier for a posted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WorkId(pub u32);

/// Completion state of a posted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Output and metadata buffers hold the response.
    Ready,
    Pending,
}

/// Per-queue submission and completion channel.
///
/// A context owns `num_sqs` send queues; the job queue maps one send queue to
/// each slot. Dropping the context closes it.
pub trait JobContext: Send {
    /// Register a buffer for DMA.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + len` must stay valid for reads and writes until the key is
    /// passed to [`JobContext::deregister_buffer`].
    unsafe fn register_buffer(&self, ptr: *mut u8, len: usize) -> RxpResult<MemoryKey>;

    fn deregister_buffer(&self, key: MemoryKey) -> RxpResult<()>;

    /// Post a job on send queue `sq`.
    fn send_work(&self, sq: usize, work: &WorkDescriptor) -> RxpResult<WorkId>;

    /// Query the completion of `work` posted on `sq`.
    fn poll(&self, sq: usize, work: WorkId) -> RxpResult<Completion>;
}

/// Identification reported by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub pci_address: String,
    pub firmware: String,
    /// Regex offload capability bit.
    pub regex_offload: bool,
}

/// A NIC exposing the RXP engines.
pub trait Adapter: RegisterPort + Send + Sync {
    type Context: JobContext;

    fn info(&self) -> AdapterInfo;

    fn supports_regex(&self) -> bool {
        self.info().regex_offload
    }

    /// Register a rule-database region.
    ///
    /// # Safety
    ///
    /// The region must stay mapped until [`Adapter::deregister_memory`] is
    /// called with the returned key.
    unsafe fn register_memory(&self, ptr: *mut u8, len: usize) -> RxpResult<MemoryKey>;

    fn deregister_memory(&self, key: MemoryKey) -> RxpResult<()>;

    /// Point `engine` at a registered rule database.
    fn set_database(&self, engine: EngineId, key: MemoryKey, offset: u64) -> RxpResult<()>;

    /// Stop the engine fetching from its database.
    fn stop_engine(&self, engine: EngineId) -> RxpResult<()>;

    fn resume_engine(&self, engine: EngineId) -> RxpResult<()>;

    fn open_job_context(&self, num_sqs: usize) -> RxpResult<Self::Context>;
}
