// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Software model of an RXP adapter.
//!
//! [`SimAdapter`] implements the register protocol closely enough to drive
//! the engine control, rule loader and queue code without hardware:
//!
//! - INIT pulses on the main and RTRU control registers start countdowns;
//!   the matching done bits appear after a configurable number of status
//!   reads (or never, to exercise timeouts).
//! - RTRU writes land in a FIFO; a GO pulse starts an update that commits
//!   the FIFO to rule memory when `UPDATE_DONE` is reported. `RTRU_COUNT`
//!   holds the committed entry count and `CHECKSUM_0` a CRC32 over them.
//! - Jobs are matched against literal patterns registered with
//!   [`SimAdapter::add_pattern`]. Completions can be held back and released
//!   in any order.
//!
//! Handles are cheap clones sharing one state, so a test can hand an adapter
//! to a device and keep inspecting it.

use crate::config::MAX_MATCHES;
use crate::csr::*;
use crate::descriptor::{MatchTuple, ResponseHeader, WorkDescriptor};
use crate::error::{RxpError, RxpResult};
use crate::port::{
    Adapter, AdapterInfo, Completion, EngineId, JobContext, MemoryKey, RegisterPort, WorkId,
    ENGINES_PER_DEVICE,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const SIM_IDENTIFIER: u32 = 0x0001_0000 | RXP_IDENTIFIER;
const SIM_REVISION: u32 = 0x0005_0001;
const SIM_MAX_MATCHES: u32 = 254;
const SIM_DDOS_THRESHOLD: u32 = 100;
const DEFAULT_RTRU_CAPACITY: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Countdown {
    Idle,
    Pending(u32),
    Never,
}

impl Countdown {
    fn start(delay: Option<u32>) -> Self {
        delay.map_or(Self::Never, Self::Pending)
    }

    /// Advance by one status read. True when the operation completes.
    fn tick(&mut self) -> bool {
        match *self {
            Self::Pending(0) => {
                *self = Self::Idle;
                true
            }
            Self::Pending(n) => {
                *self = Self::Pending(n - 1);
                false
            }
            Self::Idle | Self::Never => false,
        }
    }
}

#[derive(Debug)]
struct SimEngine {
    regs: HashMap<u32, u32>,
    init: Countdown,
    rtru_init: Countdown,
    update: Countdown,
    fifo: Vec<(u32, u64)>,
    committed: Vec<(u32, u64)>,
    batch_sizes: Vec<usize>,
    max_fifo: usize,
    rtru_init_runs: usize,
    database: Option<(MemoryKey, u64)>,
    stopped: bool,
}

impl SimEngine {
    fn new() -> Self {
        let mut regs = HashMap::new();
        regs.insert(CSR_IDENTIFIER, SIM_IDENTIFIER);
        regs.insert(CSR_REVISION, SIM_REVISION);
        regs.insert(
            CSR_CAPABILITY_5,
            (SIM_MAX_MATCHES << 16) | SIM_DDOS_THRESHOLD,
        );
        Self {
            regs,
            init: Countdown::Idle,
            rtru_init: Countdown::Idle,
            update: Countdown::Idle,
            fifo: Vec::new(),
            committed: Vec::new(),
            batch_sizes: Vec::new(),
            max_fifo: 0,
            rtru_init_runs: 0,
            database: None,
            stopped: false,
        }
    }

    fn reg(&self, address: u32) -> u32 {
        self.regs.get(&address).copied().unwrap_or(0)
    }

    fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for (address, value) in &self.committed {
            hasher.update(&address.to_le_bytes());
            hasher.update(&value.to_le_bytes());
        }
        hasher.finalize()
    }

    /// Registers computed from model state rather than stored.
    fn derived(&self, address: u32, capacity: u32) -> Option<u32> {
        match address {
            RTRU_CSR_CAPABILITY => Some(capacity),
            RTRU_CSR_FIFO_STAT => Some(self.fifo.len() as u32),
            RTRU_CSR_RTRU_COUNT => Some(self.committed.len() as u32),
            RTRU_CSR_CHECKSUM_0 => Some(self.checksum()),
            _ => None,
        }
    }

    fn add(&mut self, address: u32, delta: u32) {
        let v = self.reg(address).wrapping_add(delta);
        self.regs.insert(address, v);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    ptr: usize,
    len: usize,
}

impl Region {
    fn contains(&self, addr: u64, len: u32) -> bool {
        let start = self.ptr as u64;
        addr >= start && addr + u64::from(len) <= start + self.len as u64
    }
}

#[derive(Debug)]
struct SimState {
    info: AdapterInfo,
    engines: Vec<SimEngine>,
    init_delay: Option<u32>,
    rtru_init_delay: Option<u32>,
    update_delay: Option<u32>,
    rtru_capacity: u32,

    reads: u64,
    write_log: Option<Vec<(EngineId, u32, u32)>>,
    read_faults: HashSet<(EngineId, u32)>,
    write_faults: HashSet<(EngineId, u32)>,

    next_key: u32,
    regions: HashMap<u32, Region>,
    fail_memory_registration: bool,

    patterns: Vec<(u32, Vec<u8>)>,
    next_work_id: u32,
    hold_completions: bool,
    held: Vec<WorkId>,
    forced_match_count: Option<u8>,
    open_contexts: usize,
    live_buffers: usize,
    fail_open_context: bool,
    fail_buffer_registration_after: Option<usize>,
    fail_send_after: Option<usize>,
    fail_poll: bool,
}

impl SimState {
    fn new() -> Self {
        Self {
            info: AdapterInfo {
                name: "sim-rxp0".into(),
                pci_address: "0000:00:00.0".into(),
                firmware: "sim".into(),
                regex_offload: true,
            },
            engines: (0..ENGINES_PER_DEVICE).map(|_| SimEngine::new()).collect(),
            init_delay: Some(1),
            rtru_init_delay: Some(1),
            update_delay: Some(1),
            rtru_capacity: DEFAULT_RTRU_CAPACITY,
            reads: 0,
            write_log: None,
            read_faults: HashSet::new(),
            write_faults: HashSet::new(),
            next_key: 1,
            regions: HashMap::new(),
            fail_memory_registration: false,
            patterns: Vec::new(),
            next_work_id: 1,
            hold_completions: false,
            held: Vec::new(),
            forced_match_count: None,
            open_contexts: 0,
            live_buffers: 0,
            fail_open_context: false,
            fail_buffer_registration_after: None,
            fail_send_after: None,
            fail_poll: false,
        }
    }

    fn read(&mut self, engine: EngineId, address: u32) -> u32 {
        let capacity = self.rtru_capacity;
        let e = &mut self.engines[engine.index()];
        match address {
            CSR_STATUS => {
                if e.init.tick() {
                    let status = e.reg(CSR_STATUS) | StatusFlags::INIT_DONE.bits();
                    e.regs.insert(CSR_STATUS, status);
                }
                let mut status = StatusFlags::from_bits_retain(e.reg(CSR_STATUS));
                let going = status.contains(StatusFlags::INIT_DONE)
                    && e.reg(CSR_CTRL) & CtrlFlags::GO.bits() != 0;
                status.set(StatusFlags::GOING, going);
                status.set(StatusFlags::IDLE, !going);
                status.bits()
            }
            RTRU_CSR_STATUS => {
                let mut status = RtruStatusFlags::from_bits_retain(e.reg(RTRU_CSR_STATUS));
                if e.rtru_init.tick() {
                    status |= RtruInitMode::from_ctrl(e.reg(RTRU_CSR_CTRL)).done_bits();
                }
                if e.update.tick() {
                    let batch: Vec<_> = e.fifo.drain(..).collect();
                    e.committed.extend(batch);
                    status |= RtruStatusFlags::UPDATE_DONE;
                }
                e.regs.insert(RTRU_CSR_STATUS, status.bits());
                status.bits()
            }
            _ => e.derived(address, capacity).unwrap_or_else(|| e.reg(address)),
        }
    }

    fn write(&mut self, engine: EngineId, address: u32, value: u32) {
        let init_delay = self.init_delay;
        let rtru_init_delay = self.rtru_init_delay;
        let update_delay = self.update_delay;
        let e = &mut self.engines[engine.index()];
        let old = e.reg(address);
        e.regs.insert(address, value);
        let rising = |bits: u32| old & bits == 0 && value & bits != 0;

        match address {
            CSR_CTRL if rising(CtrlFlags::INIT.bits()) => {
                let status = e.reg(CSR_STATUS) & !StatusFlags::INIT_DONE.bits();
                e.regs.insert(CSR_STATUS, status);
                e.init = Countdown::start(init_delay);
            }
            RTRU_CSR_CTRL => {
                if rising(RtruCtrlFlags::INIT.bits()) {
                    e.rtru_init_runs += 1;
                    let status = RtruStatusFlags::from_bits_retain(e.reg(RTRU_CSR_STATUS))
                        - RtruInitMode::ImL1L2Em.done_bits();
                    e.regs.insert(RTRU_CSR_STATUS, status.bits());
                    // Rule memory starts empty after an init.
                    e.fifo.clear();
                    e.committed.clear();
                    e.rtru_init = Countdown::start(rtru_init_delay);
                }
                if rising(RtruCtrlFlags::GO.bits()) {
                    let status = e.reg(RTRU_CSR_STATUS) & !RtruStatusFlags::UPDATE_DONE.bits();
                    e.regs.insert(RTRU_CSR_STATUS, status);
                    e.batch_sizes.push(e.fifo.len());
                    e.update = Countdown::start(update_delay);
                }
            }
            RTRU_CSR_ADDR => {
                let data = (u64::from(e.reg(RTRU_CSR_DATA_1)) << 32) | u64::from(e.reg(RTRU_CSR_DATA_0));
                e.fifo.push((value, data));
                e.max_fifo = e.max_fifo.max(e.fifo.len());
            }
            _ => {}
        }
    }

    fn allocate_key(&mut self) -> MemoryKey {
        let key = MemoryKey(self.next_key);
        self.next_key += 1;
        key
    }

    fn find_matches(&self, data: &[u8]) -> Vec<MatchTuple> {
        let mut found = Vec::new();
        for start in 0..data.len() {
            for (rule_id, pattern) in &self.patterns {
                if !pattern.is_empty() && data[start..].starts_with(pattern) {
                    found.push(MatchTuple {
                        rule_id: *rule_id,
                        start_offset: start as u16,
                        length: pattern.len() as u16,
                    });
                }
            }
        }
        found
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated adapter with two RXP engines.
#[derive(Debug, Clone)]
pub struct SimAdapter {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SimAdapter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }

    // Protocol timing

    /// Status reads that miss INIT_DONE after an INIT pulse; `None` never completes.
    pub fn set_init_delay(&self, reads: Option<u32>) {
        self.lock().init_delay = reads;
    }

    pub fn set_rtru_init_delay(&self, reads: Option<u32>) {
        self.lock().rtru_init_delay = reads;
    }

    pub fn set_update_delay(&self, reads: Option<u32>) {
        self.lock().update_delay = reads;
    }

    /// RTRU FIFO depth reported in the capability register.
    pub fn set_rtru_capacity(&self, capacity: u32) {
        self.lock().rtru_capacity = capacity;
    }

    pub fn set_regex_offload(&self, supported: bool) {
        self.lock().info.regex_offload = supported;
    }

    // Register inspection

    /// Read a register without side effects.
    pub fn peek(&self, engine: EngineId, address: u32) -> u32 {
        let s = self.lock();
        let e = &s.engines[engine.index()];
        e.derived(address, s.rtru_capacity)
            .unwrap_or_else(|| e.reg(address))
    }

    /// Store a register without side effects.
    pub fn poke(&self, engine: EngineId, address: u32, value: u32) {
        self.lock().engines[engine.index()]
            .regs
            .insert(address, value);
    }

    pub fn read_count(&self) -> u64 {
        self.lock().reads
    }

    /// Start or stop recording register writes. Starting clears the log.
    pub fn record_writes(&self, on: bool) {
        self.lock().write_log = on.then(Vec::new);
    }

    pub fn write_log(&self) -> Vec<(EngineId, u32, u32)> {
        self.lock().write_log.clone().unwrap_or_default()
    }

    pub fn rtru_init_runs(&self, engine: EngineId) -> usize {
        self.lock().engines[engine.index()].rtru_init_runs
    }

    /// Entry count of every GO pulse so far.
    pub fn batch_sizes(&self, engine: EngineId) -> Vec<usize> {
        self.lock().engines[engine.index()].batch_sizes.clone()
    }

    pub fn max_fifo_fill(&self, engine: EngineId) -> usize {
        self.lock().engines[engine.index()].max_fifo
    }

    /// `(address, value)` pairs committed to rule memory.
    pub fn committed(&self, engine: EngineId) -> Vec<(u32, u64)> {
        self.lock().engines[engine.index()].committed.clone()
    }

    pub fn engine_enabled(&self, engine: EngineId) -> bool {
        self.peek(engine, CSR_CTRL) & CtrlFlags::GO.bits() != 0
    }

    pub fn engine_stopped(&self, engine: EngineId) -> bool {
        self.lock().engines[engine.index()].stopped
    }

    pub fn database(&self, engine: EngineId) -> Option<(MemoryKey, u64)> {
        self.lock().engines[engine.index()].database
    }

    // Resource accounting

    /// Rule-database regions currently registered.
    pub fn registered_regions(&self) -> usize {
        self.lock().regions.len()
    }

    pub fn open_contexts(&self) -> usize {
        self.lock().open_contexts
    }

    /// Job buffers registered across all contexts.
    pub fn live_buffers(&self) -> usize {
        self.lock().live_buffers
    }

    // Fault injection

    pub fn fail_reads_at(&self, engine: EngineId, address: u32) {
        self.lock().read_faults.insert((engine, address));
    }

    pub fn fail_writes_at(&self, engine: EngineId, address: u32) {
        self.lock().write_faults.insert((engine, address));
    }

    pub fn clear_register_faults(&self) {
        let mut s = self.lock();
        s.read_faults.clear();
        s.write_faults.clear();
    }

    pub fn fail_memory_registration(&self, fail: bool) {
        self.lock().fail_memory_registration = fail;
    }

    pub fn fail_open_context(&self, fail: bool) {
        self.lock().fail_open_context = fail;
    }

    /// Fail the job-buffer registration after `n` more succeed.
    pub fn fail_buffer_registration_after(&self, n: Option<usize>) {
        self.lock().fail_buffer_registration_after = n;
    }

    /// Fail the job post after `n` more succeed.
    pub fn fail_send_after(&self, n: Option<usize>) {
        self.lock().fail_send_after = n;
    }

    pub fn fail_poll(&self, fail: bool) {
        self.lock().fail_poll = fail;
    }

    /// Report this match count in every response header.
    pub fn force_match_count(&self, count: Option<u8>) {
        self.lock().forced_match_count = count;
    }

    // Job engine

    /// Match `pattern` literally, reporting `rule_id`.
    pub fn add_pattern(&self, rule_id: u32, pattern: &[u8]) {
        self.lock().patterns.push((rule_id, pattern.to_vec()));
    }

    /// While set, newly posted jobs stay pending until released.
    pub fn hold_completions(&self, hold: bool) {
        self.lock().hold_completions = hold;
    }

    /// Held work ids in posting order.
    pub fn held(&self) -> Vec<WorkId> {
        self.lock().held.clone()
    }

    pub fn release(&self, work: WorkId) {
        self.lock().held.retain(|w| *w != work);
    }

    pub fn release_all(&self) {
        self.lock().held.clear();
    }
}

impl RegisterPort for SimAdapter {
    fn read(&self, engine: EngineId, address: u32) -> RxpResult<u32> {
        let mut s = self.lock();
        if s.read_faults.contains(&(engine, address)) {
            return Err(RxpError::RegisterIo {
                engine: engine.as_u8(),
                address,
                reason: "injected read fault".into(),
            });
        }
        s.reads += 1;
        Ok(s.read(engine, address))
    }

    fn write(&self, engine: EngineId, address: u32, value: u32) -> RxpResult<()> {
        let mut s = self.lock();
        if s.write_faults.contains(&(engine, address)) {
            return Err(RxpError::RegisterIo {
                engine: engine.as_u8(),
                address,
                reason: "injected write fault".into(),
            });
        }
        if let Some(log) = s.write_log.as_mut() {
            log.push((engine, address, value));
        }
        s.write(engine, address, value);
        Ok(())
    }
}

impl Adapter for SimAdapter {
    type Context = SimJobContext;

    fn info(&self) -> AdapterInfo {
        self.lock().info.clone()
    }

    unsafe fn register_memory(&self, ptr: *mut u8, len: usize) -> RxpResult<MemoryKey> {
        let mut s = self.lock();
        if s.fail_memory_registration {
            return Err(RxpError::ResourceExhausted(
                "injected memory registration fault".into(),
            ));
        }
        let key = s.allocate_key();
        s.regions.insert(
            key.0,
            Region {
                ptr: ptr as usize,
                len,
            },
        );
        Ok(key)
    }

    fn deregister_memory(&self, key: MemoryKey) -> RxpResult<()> {
        self.lock()
            .regions
            .remove(&key.0)
            .map(|_| ())
            .ok_or_else(|| RxpError::InvalidArgument(format!("unknown memory key {}", key.0)))
    }

    fn set_database(&self, engine: EngineId, key: MemoryKey, offset: u64) -> RxpResult<()> {
        let mut s = self.lock();
        let region = s
            .regions
            .get(&key.0)
            .copied()
            .ok_or_else(|| RxpError::InvalidArgument(format!("unknown memory key {}", key.0)))?;
        if offset >= region.len as u64 {
            return Err(RxpError::InvalidArgument(format!(
                "database offset {:#x} beyond region of {:#x} bytes",
                offset, region.len
            )));
        }
        s.engines[engine.index()].database = Some((key, offset));
        Ok(())
    }

    fn stop_engine(&self, engine: EngineId) -> RxpResult<()> {
        self.lock().engines[engine.index()].stopped = true;
        Ok(())
    }

    fn resume_engine(&self, engine: EngineId) -> RxpResult<()> {
        self.lock().engines[engine.index()].stopped = false;
        Ok(())
    }

    fn open_job_context(&self, num_sqs: usize) -> RxpResult<SimJobContext> {
        let mut s = self.lock();
        if s.fail_open_context {
            return Err(RxpError::ResourceExhausted(
                "injected job context fault".into(),
            ));
        }
        s.open_contexts += 1;
        Ok(SimJobContext {
            shared: Arc::clone(&self.state),
            inner: Mutex::new(ContextState {
                buffers: HashMap::new(),
                in_flight: vec![None; num_sqs],
            }),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    work: WorkId,
    desc: WorkDescriptor,
    done: bool,
}

#[derive(Debug)]
struct ContextState {
    buffers: HashMap<u32, Region>,
    in_flight: Vec<Option<InFlight>>,
}

/// Job context of a [`SimAdapter`].
#[derive(Debug)]
pub struct SimJobContext {
    shared: Arc<Mutex<SimState>>,
    inner: Mutex<ContextState>,
}

impl SimJobContext {
    fn inner(&self) -> MutexGuard<'_, ContextState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the match job and write the response into its buffers.
    fn complete(
        shared: &SimState,
        buffers: &HashMap<u32, Region>,
        sq: usize,
        job: &InFlight,
    ) -> RxpResult<(usize, usize)> {
        let desc = &job.desc;
        let region = |key: MemoryKey, addr: u64, len: u32| {
            buffers
                .get(&key.0)
                .filter(|r| r.contains(addr, len))
                .copied()
                .ok_or_else(|| RxpError::CompletionError {
                    slot: sq,
                    reason: format!("segment {:#x}+{} outside key {}", addr, len, key.0),
                })
        };
        region(desc.input.key, desc.input.addr, desc.input.len)?;
        region(desc.output.key, desc.output.addr, desc.output.len)?;
        let meta = buffers
            .get(&desc.metadata_key.0)
            .copied()
            .filter(|r| r.len >= ResponseHeader::SIZE)
            .ok_or_else(|| RxpError::CompletionError {
                slot: sq,
                reason: "metadata buffer not registered".into(),
            })?;

        // SAFETY: every segment lies inside a buffer registered through
        // `register_buffer`, whose contract keeps it valid until deregistered.
        let (input, output, metadata) = unsafe {
            (
                std::slice::from_raw_parts(desc.input.addr as *const u8, desc.input.len as usize),
                std::slice::from_raw_parts_mut(
                    desc.output.addr as *mut u8,
                    desc.output.len as usize,
                ),
                std::slice::from_raw_parts_mut(meta.ptr as *mut u8, meta.len),
            )
        };

        let found = shared.find_matches(input);
        let reported = found
            .len()
            .min(MAX_MATCHES)
            .min(output.len() / MatchTuple::SIZE);
        for (i, tuple) in found.iter().take(reported).enumerate() {
            tuple.write_to(&mut output[i * MatchTuple::SIZE..]);
        }
        let header = ResponseHeader {
            job_id: job.work.0,
            detected_match_count: found.len().min(usize::from(u8::MAX)) as u8,
            match_count: shared.forced_match_count.unwrap_or(reported as u8),
            ..ResponseHeader::default()
        };
        header.write_to(metadata);
        Ok((input.len(), reported))
    }
}

impl JobContext for SimJobContext {
    unsafe fn register_buffer(&self, ptr: *mut u8, len: usize) -> RxpResult<MemoryKey> {
        let mut s = lock(&self.shared);
        if let Some(n) = s.fail_buffer_registration_after.as_mut() {
            if *n == 0 {
                return Err(RxpError::ResourceExhausted(
                    "injected buffer registration fault".into(),
                ));
            }
            *n -= 1;
        }
        let key = s.allocate_key();
        s.live_buffers += 1;
        self.inner().buffers.insert(
            key.0,
            Region {
                ptr: ptr as usize,
                len,
            },
        );
        Ok(key)
    }

    fn deregister_buffer(&self, key: MemoryKey) -> RxpResult<()> {
        if self.inner().buffers.remove(&key.0).is_none() {
            return Err(RxpError::InvalidArgument(format!(
                "unknown buffer key {}",
                key.0
            )));
        }
        lock(&self.shared).live_buffers -= 1;
        Ok(())
    }

    fn send_work(&self, sq: usize, work: &WorkDescriptor) -> RxpResult<WorkId> {
        let mut s = lock(&self.shared);
        let mut inner = self.inner();
        if sq >= inner.in_flight.len() {
            return Err(RxpError::SubmitFailed(format!("send queue {} out of range", sq)));
        }
        if let Some(n) = s.fail_send_after.as_mut() {
            if *n == 0 {
                return Err(RxpError::SubmitFailed("injected send fault".into()));
            }
            *n -= 1;
        }
        if matches!(inner.in_flight[sq], Some(InFlight { done: false, .. })) {
            return Err(RxpError::SubmitFailed(format!(
                "send queue {} already has a job in flight",
                sq
            )));
        }
        let id = WorkId(s.next_work_id);
        s.next_work_id = s.next_work_id.wrapping_add(1).max(1);
        if s.hold_completions {
            s.held.push(id);
        }
        inner.in_flight[sq] = Some(InFlight {
            work: id,
            desc: *work,
            done: false,
        });
        Ok(id)
    }

    fn poll(&self, sq: usize, work: WorkId) -> RxpResult<Completion> {
        let mut s = lock(&self.shared);
        let mut inner = self.inner();
        if s.fail_poll {
            return Err(RxpError::CompletionError {
                slot: sq,
                reason: "injected poll fault".into(),
            });
        }
        let job = match inner.in_flight.get(sq).copied().flatten() {
            Some(job) if job.work == work => job,
            _ => {
                return Err(RxpError::CompletionError {
                    slot: sq,
                    reason: format!("no job with work id {} on send queue", work.0),
                })
            }
        };
        if job.done {
            return Ok(Completion::Ready);
        }
        if s.held.contains(&work) {
            return Ok(Completion::Pending);
        }

        let (bytes, matches) = Self::complete(&s, &inner.buffers, sq, &job)?;
        if let Some(slot) = inner.in_flight[sq].as_mut() {
            slot.done = true;
        }
        let e = &mut s.engines[0];
        e.add(CSR_JOB_COUNT, 1);
        e.add(CSR_RESPONSE_COUNT, 1);
        e.add(CSR_MATCH_COUNT, matches as u32);
        e.add(CSR_JOB_BYTE_COUNT0, bytes as u32);
        Ok(Completion::Ready)
    }
}

impl Drop for SimJobContext {
    fn drop(&mut self) {
        let leaked = self.inner().buffers.len();
        let mut s = lock(&self.shared);
        s.open_contexts -= 1;
        s.live_buffers -= leaked;
    }
}
