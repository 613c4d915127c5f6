// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! # RXP Regex Accelerator Rust Bindings
//!
//! This crate drives the RXP regular-expression engines behind a NIC's regex
//! offload. It covers the control plane and the job path:
//!
//! - bringing both engines out of reset and initializing their rule memories
//! - streaming a compiled rule database (ROF) through the runtime rule-update
//!   FIFO and verifying it against live registers
//! - submitting match jobs through a fixed ring of slots per queue and
//!   collecting responses, including out-of-order completions
//!
//! Hardware access goes through the [`Adapter`] and [`JobContext`] traits.
//! The crate ships a software model, [`sim::SimAdapter`], used by the tests,
//! benchmarks and demo.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Reset, RTRU init, enable/disable, counters |
//! | [`loader`] | Batched rule programming and check entries |
//! | [`queue`] | Job slots, submit/poll/read |
//! | [`device`] | Adapter ownership, database regions, queue bookkeeping |
//! | [`fastpath`] | Burst enqueue/dequeue keyed by user id |
//!
//! ## Example
//!
//! ```rust
//! use rxp_rust::sim::SimAdapter;
//! use rxp_rust::{Device, DeviceConfig, EngineId, Job, ProgramMode, Responses, RofEntry, RofEntryType, RxpError};
//!
//! fn main() -> Result<(), RxpError> {
//!     let sim = SimAdapter::new();
//!     sim.add_pattern(1, b"evil");
//!
//!     let mut config = DeviceConfig::default();
//!     config.set_database_size(1 << 20);
//!     config.set_huge_pages(false);
//!     let device = Device::init(vec![sim], config)?;
//!
//!     let rules = [RofEntry::new(RofEntryType::Instruction, 0, 0x1)];
//!     for engine in EngineId::ALL {
//!         device.program_rules(engine, &rules, ProgramMode::Full)?;
//!     }
//!
//!     let mut queue = device.open_queue()?;
//!     queue.submit(&[Job::new(7, b"some evil payload")])?;
//!
//!     let mut buf = vec![0u8; 4096];
//!     while queue.unread_responses() == 0 {
//!         queue.poll()?;
//!     }
//!     let read = queue.read_responses(&mut buf)?;
//!     for response in Responses::new(&buf[..read.bytes]) {
//!         println!("job {}: {} matches", response.header.job_id, response.header.match_count);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Support
//!
//! Rule-database regions use huge-page `mmap` on Linux and fall back to the
//! heap elsewhere. Everything else is platform independent.

pub mod config;
pub mod csr;
pub mod descriptor;
pub mod device;
pub mod engine;
pub mod error;
pub mod fastpath;
pub mod loader;
pub mod poll;
pub mod port;
pub mod queue;
pub mod rof;
pub mod sim;

// Re-exports for convenient access
pub use config::{DeviceConfig, Timeouts};
pub use descriptor::{Job, JobCtrl, MatchTuple, ResponseHeader, WorkDescriptor};
pub use device::Device;
pub use engine::{EngineControl, EngineState, EngineStats, InitReport};
pub use error::{RxpError, RxpResult};
pub use fastpath::{FastPath, RegexMatch, RegexOp, RegexResult};
pub use loader::{LoadReport, ProgramMode, RuleLoader};
pub use port::{Adapter, AdapterInfo, Completion, EngineId, JobContext, MemoryKey, RegisterPort, WorkId};
pub use queue::{Queue, QueueStatus, ReadSummary, Response, Responses};
pub use rof::{RofEntry, RofEntryType};
