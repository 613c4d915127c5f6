// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! RXP device lifecycle.
//!
//! A [`Device`] owns the adapter, one rule-database region per engine and the
//! open-queue bookkeeping. Queues borrow the device, so it outlives all of
//! them. The first queue to open enables both engines; the last one to close
//! disables them and releases the database regions, after which the device
//! refuses new queues.
//!
//! # Platform Support
//!
//! On Linux the database regions are anonymous shared mappings populated up
//! front and, unless disabled in [`DeviceConfig`], backed by huge pages.
//! Elsewhere they are plain zeroed heap allocations.

use crate::config::DeviceConfig;
use crate::engine::EngineControl;
use crate::error::{RxpError, RxpResult};
use crate::loader::{LoadReport, ProgramMode, RuleLoader};
use crate::poll::{Clock, SystemClock};
use crate::port::{Adapter, EngineId, MemoryKey};
use crate::queue::{open_slots, release_slots, Queue};
use crate::rof::RofEntry;
use scopeguard::ScopeGuard;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(not(target_os = "linux"))]
use std::alloc::{alloc_zeroed, dealloc, Layout};

#[cfg(not(target_os = "linux"))]
const PAGE_SIZE: usize = 4096;

/// Zeroed memory region backing a rule database.
struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: MappedRegion uniquely owns its mapping; access to the bytes goes
// through the device mutex.
unsafe impl Send for MappedRegion {}

impl MappedRegion {
    #[cfg(target_os = "linux")]
    fn map(len: usize, huge_pages: bool) -> RxpResult<Self> {
        let mut flags = libc::MAP_SHARED | libc::MAP_ANONYMOUS | libc::MAP_POPULATE;
        if huge_pages {
            flags |= libc::MAP_HUGETLB;
        }
        // SAFETY: anonymous mapping with no address hint; the result is checked.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                flags,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(RxpError::ResourceExhausted(format!(
                "mmap of {} byte rule database failed: {}",
                len,
                std::io::Error::last_os_error()
            )));
        }
        let ptr = NonNull::new(ptr as *mut u8).ok_or_else(|| {
            RxpError::ResourceExhausted("mmap returned a null mapping".into())
        })?;
        Ok(Self { ptr, len })
    }

    #[cfg(not(target_os = "linux"))]
    fn map(len: usize, huge_pages: bool) -> RxpResult<Self> {
        if huge_pages {
            log::debug!("Huge pages unavailable on this platform, using heap");
        }
        let layout = Self::layout(len)?;
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            RxpError::ResourceExhausted(format!("failed to allocate {} byte rule database", len))
        })?;
        Ok(Self { ptr, len })
    }

    #[cfg(not(target_os = "linux"))]
    fn layout(len: usize) -> RxpResult<Layout> {
        Layout::from_size_align(len.max(1), PAGE_SIZE)
            .map_err(|e| RxpError::ResourceExhausted(format!("database layout: {}", e)))
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is a live, zero-initialized region of len bytes and
        // &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MappedRegion {
    #[cfg(target_os = "linux")]
    fn drop(&mut self) {
        // SAFETY: ptr and len describe the mapping created in `map`.
        let ret = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len) };
        if ret != 0 {
            log::warn!(
                "munmap of rule database failed: {}",
                std::io::Error::last_os_error()
            );
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn drop(&mut self) {
        if let Ok(layout) = Self::layout(self.len) {
            // SAFETY: allocated in `map` with this layout.
            unsafe { dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

/// A rule-database region registered with the adapter.
pub struct RuleDatabase {
    region: MappedRegion,
    key: MemoryKey,
}

impl RuleDatabase {
    fn create<A: Adapter>(adapter: &A, config: &DeviceConfig) -> RxpResult<Self> {
        let region = MappedRegion::map(config.database_size, config.huge_pages)?;
        // SAFETY: the region stays mapped until after `release` deregisters it.
        let key = unsafe { adapter.register_memory(region.ptr.as_ptr(), region.len) }?;
        Ok(Self { region, key })
    }

    #[inline]
    pub fn key(&self) -> MemoryKey {
        self.key
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.region.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.region.len == 0
    }

    /// Deregister, then unmap.
    fn release<A: Adapter>(self, adapter: &A) {
        if let Err(e) = adapter.deregister_memory(self.key) {
            log::warn!("Failed to deregister rule database {}: {}", self.key.0, e);
        }
    }
}

fn release_databases<A: Adapter>(adapter: &A, databases: Vec<RuleDatabase>) {
    for db in databases.into_iter().rev() {
        db.release(adapter);
    }
}

struct QueueBook {
    /// One bit per open queue id.
    active: u32,
    open: usize,
    /// `None` once released by the last queue close.
    databases: Option<Vec<RuleDatabase>>,
}

/// An initialized RXP adapter.
pub struct Device<A: Adapter> {
    adapter: A,
    config: DeviceConfig,
    clock: Box<dyn Clock + Send + Sync>,
    book: Mutex<QueueBook>,
}

impl<A: Adapter> Device<A> {
    /// Take the first of `adapters` and prepare it for rule programming.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `adapters` is empty (`NoDeviceFound`)
    /// - the adapter lacks regex offload (`Unsupported`)
    /// - a database region cannot be mapped or registered
    /// - an engine does not identify as an RXP
    ///
    /// Everything acquired before the failure is released in reverse order.
    pub fn init(adapters: Vec<A>, config: DeviceConfig) -> RxpResult<Self> {
        Self::init_with_clock(adapters, config, Box::new(SystemClock))
    }

    /// As [`Self::init`], with the clock used for every register poll.
    pub fn init_with_clock(
        adapters: Vec<A>,
        config: DeviceConfig,
        clock: Box<dyn Clock + Send + Sync>,
    ) -> RxpResult<Self> {
        config.validate()?;
        for (i, adapter) in adapters.iter().enumerate() {
            let info = adapter.info();
            log::info!(
                "Adapter {}: {} at {} (firmware {}, regex offload {})",
                i,
                info.name,
                info.pci_address,
                info.firmware,
                if info.regex_offload { "yes" } else { "no" }
            );
        }
        let adapter = adapters.into_iter().next().ok_or(RxpError::NoDeviceFound)?;
        if !adapter.supports_regex() {
            return Err(RxpError::Unsupported(format!(
                "{} has no regex offload",
                adapter.info().name
            )));
        }

        let mut databases = scopeguard::guard(Vec::new(), |dbs| release_databases(&adapter, dbs));
        for engine in EngineId::ALL {
            databases.push(RuleDatabase::create(&adapter, &config)?);
            log::debug!(
                "Rule database for engine {} registered ({} bytes)",
                engine,
                config.database_size
            );
        }
        for engine in EngineId::ALL {
            EngineControl::new(&adapter, engine, config.timeouts, &*clock).identify()?;
        }
        let databases = ScopeGuard::into_inner(databases);

        log::info!(
            "RXP device ready ({} queues x {} slots)",
            config.max_queues,
            config.slots_per_queue
        );
        Ok(Self {
            adapter,
            config,
            clock,
            book: Mutex::new(QueueBook {
                active: 0,
                open: 0,
                databases: Some(databases),
            }),
        })
    }

    fn book(&self) -> MutexGuard<'_, QueueBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    #[inline]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Control-plane view of one engine.
    pub fn engine(&self, engine: EngineId) -> EngineControl<'_, A> {
        EngineControl::new(&self.adapter, engine, self.config.timeouts, &*self.clock)
    }

    /// Program a rule database into `engine`.
    ///
    /// Not serialized against job traffic; quiesce the engine's queues first.
    pub fn program_rules(
        &self,
        engine: EngineId,
        entries: &[RofEntry],
        mode: ProgramMode,
    ) -> RxpResult<LoadReport> {
        RuleLoader::new(self.engine(engine)).load(entries, mode)
    }

    pub fn open_queues(&self) -> usize {
        self.book().open
    }

    /// True once the database regions have been released.
    pub fn is_closed(&self) -> bool {
        self.book().databases.is_none()
    }

    /// Open a job queue with `slots_per_queue` slots.
    ///
    /// # Errors
    ///
    /// - `TooManyQueues` when `max_queues` are open
    /// - `DeviceClosed` after the last queue has closed
    /// - `ResourceExhausted` if the job context or slot buffers cannot be set up
    pub fn open_queue(&self) -> RxpResult<Queue<'_, A>> {
        let mut book = self.book();
        if book.open >= self.config.max_queues {
            log::warn!("Queue open refused ({} open)", book.open);
            return Err(RxpError::TooManyQueues {
                max: self.config.max_queues,
            });
        }
        if book.databases.is_none() {
            return Err(RxpError::DeviceClosed);
        }
        let id = (!book.active).trailing_zeros() as usize;

        let slots_per_queue = self.config.slots_per_queue;
        let exhausted =
            |e: RxpError| RxpError::ResourceExhausted(format!("queue {}: {}", id, e));
        let ctx = self
            .adapter
            .open_job_context(slots_per_queue)
            .map_err(exhausted)?;
        let slots = open_slots(&ctx, slots_per_queue).map_err(exhausted)?;

        if book.open == 0 {
            if let Err(e) = self.enable_engines() {
                release_slots(&ctx, slots);
                return Err(e);
            }
        }
        book.active |= 1 << id;
        book.open += 1;
        log::info!("Opened queue {} ({} open)", id, book.open);
        Ok(Queue::new(self, id, ctx, slots))
    }

    fn enable_engines(&self) -> RxpResult<()> {
        for (i, engine) in EngineId::ALL.into_iter().enumerate() {
            if let Err(e) = self.engine(engine).enable() {
                for enabled in &EngineId::ALL[..i] {
                    let _ = self.engine(*enabled).disable();
                }
                return Err(e);
            }
        }
        log::info!("RXP engines enabled");
        Ok(())
    }

    /// Called by a queue after releasing its slots and context.
    pub(crate) fn queue_closed(&self, id: usize) {
        let mut book = self.book();
        book.active &= !(1 << id);
        book.open = book.open.saturating_sub(1);
        log::info!("Closed queue {} ({} open)", id, book.open);
        if book.open > 0 {
            return;
        }

        for engine in EngineId::ALL {
            if let Err(e) = self.engine(engine).disable() {
                log::warn!("Failed to disable RXP engine {}: {}", engine, e);
            }
        }
        if let Some(dbs) = book.databases.take() {
            release_databases(&self.adapter, dbs);
            log::info!("RXP engines disabled, rule databases released");
        }
    }

    /// Run `f` over the engine's database region.
    pub fn with_database<R>(
        &self,
        engine: EngineId,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> RxpResult<R> {
        let mut book = self.book();
        let db = book
            .databases
            .as_mut()
            .and_then(|dbs| dbs.get_mut(engine.index()))
            .ok_or(RxpError::DeviceClosed)?;
        Ok(f(db.region.as_mut_slice()))
    }

    /// Point the engine at its database region.
    pub fn set_database(&self, engine: EngineId) -> RxpResult<()> {
        let book = self.book();
        let key = book
            .databases
            .as_ref()
            .and_then(|dbs| dbs.get(engine.index()))
            .map(RuleDatabase::key)
            .ok_or(RxpError::DeviceClosed)?;
        self.adapter.set_database(engine, key, 0)?;
        log::debug!("Engine {} database set to key {}", engine, key.0);
        Ok(())
    }

    /// Stop the engine, then point it at its database region.
    pub fn update_database(&self, engine: EngineId) -> RxpResult<()> {
        self.adapter.stop_engine(engine)?;
        self.set_database(engine)
    }

    /// Restart an engine stopped by [`Self::update_database`].
    pub fn resume_engine(&self, engine: EngineId) -> RxpResult<()> {
        self.adapter.resume_engine(engine)
    }

    pub fn csr_read(&self, engine: EngineId, address: u32) -> RxpResult<u32> {
        self.adapter.read(engine, address)
    }

    pub fn csr_write(&self, engine: EngineId, address: u32, value: u32) -> RxpResult<()> {
        self.adapter.write(engine, address, value)
    }
}

impl<A: Adapter> Drop for Device<A> {
    fn drop(&mut self) {
        let databases = self
            .book
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .databases
            .take();
        if let Some(dbs) = databases {
            release_databases(&self.adapter, dbs);
        }
    }
}
