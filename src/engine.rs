// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Engine control: reset, rule-memory init, enable/disable and readout.
//!
//! All state lives in the engine's CSRs. [`EngineControl`] is a short-lived
//! view over a [`RegisterPort`] and keeps no mirror of its own.

use crate::config::Timeouts;
use crate::csr::*;
use crate::error::{RxpError, RxpResult};
use crate::poll::{poll, Clock, PollError, PollOutcome};
use crate::port::{EngineId, RegisterPort};

/// Engine state as derived from CTRL and STATUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Reset,
    /// INIT held in CTRL.
    Initializing,
    /// Initialized and processing jobs.
    Ready,
    /// Initialized with GO clear.
    Disabled,
}

/// Result of a successful [`EngineControl::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    /// Zero-based read count of the INIT_DONE poll.
    pub init_cycles: u32,
    /// Zero-based read count of the deciding RTRU init poll.
    pub rtru_cycles: u32,
    /// Value written to MAX_MATCH.
    pub max_matches: u32,
    /// Value written to MAX_PREFIX.
    pub ddos_threshold: u32,
}

/// Main-block counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub core_clock_count: u32,
    pub write_count: u32,
    pub job_count: u32,
    pub job_error_count: u32,
    pub job_byte_count: u64,
    pub response_count: u32,
    pub match_count: u32,
    pub ddos_count: u32,
}

/// Control-plane operations on one engine.
pub struct EngineControl<'a, P: RegisterPort + ?Sized> {
    port: &'a P,
    engine: EngineId,
    timeouts: Timeouts,
    clock: &'a dyn Clock,
}

impl<'a, P: RegisterPort + ?Sized> EngineControl<'a, P> {
    pub fn new(port: &'a P, engine: EngineId, timeouts: Timeouts, clock: &'a dyn Clock) -> Self {
        Self {
            port,
            engine,
            timeouts,
            clock,
        }
    }

    #[inline]
    pub fn engine(&self) -> EngineId {
        self.engine
    }

    #[inline]
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    #[inline]
    pub fn read(&self, address: u32) -> RxpResult<u32> {
        self.port.read(self.engine, address)
    }

    #[inline]
    pub fn write(&self, address: u32, value: u32) -> RxpResult<()> {
        self.port.write(self.engine, address, value)
    }

    fn update(&self, address: u32, f: impl FnOnce(u32) -> u32) -> RxpResult<()> {
        let value = self.read(address)?;
        self.write(address, f(value))
    }

    fn set_bits(&self, address: u32, bits: u32) -> RxpResult<()> {
        self.update(address, |v| v | bits)
    }

    fn clear_bits(&self, address: u32, bits: u32) -> RxpResult<()> {
        self.update(address, |v| v & !bits)
    }

    pub(crate) fn sleep(&self, duration: std::time::Duration) {
        self.clock.sleep(duration);
    }

    /// Poll `address` until `(value & mask) == expected`.
    pub fn poll_for(
        &self,
        address: u32,
        expected: u32,
        mask: u32,
        iterations: u32,
    ) -> RxpResult<PollOutcome> {
        poll(
            || self.read(address),
            |v| v & mask == expected,
            iterations,
            self.timeouts.interval,
            self.clock,
        )
        .map_err(|e| match e {
            PollError::Read(err) => err,
            PollError::Timeout { iterations, last } => RxpError::PollTimeout {
                address,
                expected,
                mask,
                iterations,
                last,
            },
        })
    }

    /// Reset the engine and its rule memories.
    ///
    /// Leaves GO untouched; the engine stays disabled until [`Self::enable`].
    pub fn init(&self) -> RxpResult<InitReport> {
        let engine = self.engine.as_u8();
        log::debug!("Initializing RXP engine {}", engine);

        let ctrl = self.read(CSR_CTRL)?;
        if ctrl & CtrlFlags::INIT.bits() != 0 {
            self.write(CSR_CTRL, ctrl & !CtrlFlags::INIT.bits())?;
        }
        self.set_bits(CSR_CTRL, CtrlFlags::INIT.bits())?;
        self.clear_bits(CSR_CTRL, CtrlFlags::INIT.bits())?;
        self.sleep(self.timeouts.settle);

        let done = StatusFlags::INIT_DONE.bits();
        let outcome = self
            .poll_for(CSR_STATUS, done, done, self.timeouts.init_iterations())
            .map_err(|e| match e {
                RxpError::PollTimeout { last, .. } => RxpError::InitTimeout {
                    engine,
                    status: last,
                },
                other => other,
            })?;
        log::debug!(
            "RXP engine {} init done after {} cycles",
            engine,
            outcome.cycles
        );
        self.clear_bits(CSR_CTRL, CtrlFlags::INIT.bits())?;

        // The first RTRU init after a reset does not reliably report done.
        if let Err(e) = self.init_rtru() {
            log::debug!("RXP engine {} first RTRU init: {}", engine, e);
        }
        let rtru_cycles = self.init_rtru()?;

        let cap = self.read(CSR_CAPABILITY_5)?;
        let max_matches = cap >> 16;
        let ddos_threshold = cap & 0xFFFF;
        self.write(CSR_MAX_MATCH, max_matches)?;
        self.write(CSR_MAX_PREFIX, ddos_threshold)?;
        self.write(CSR_MAX_LATENCY, 0)?;
        self.write(CSR_MAX_PRI_THREAD, 0)?;

        log::info!(
            "RXP engine {} initialized (max matches {}, DDOS threshold {})",
            engine,
            max_matches,
            ddos_threshold
        );
        Ok(InitReport {
            init_cycles: outcome.cycles,
            rtru_cycles,
            max_matches,
            ddos_threshold,
        })
    }

    /// Initialize instruction memory and the L1/L2 caches.
    ///
    /// External memory is left untouched. Polls with the init budget, like the
    /// engine reset. Returns the zero-based poll count.
    pub fn init_rtru(&self) -> RxpResult<u32> {
        let engine = self.engine.as_u8();
        let init = RtruCtrlFlags::INIT.bits();

        let ctrl = self.read(RTRU_CSR_CTRL)?;
        if ctrl & init != 0 {
            self.write(RTRU_CSR_CTRL, ctrl & !init)?;
        }
        self.set_bits(RTRU_CSR_CTRL, init)?;
        self.clear_bits(RTRU_CSR_CTRL, init)?;
        let mode = RtruInitMode::ImL1L2;
        self.update(RTRU_CSR_CTRL, |v| {
            (v & !RtruCtrlFlags::INIT_MODE.bits()) | mode.ctrl_bits()
        })?;
        self.sleep(self.timeouts.settle);

        let expected = mode.done_bits().bits();
        let outcome = self
            .poll_for(
                RTRU_CSR_STATUS,
                expected,
                expected,
                self.timeouts.init_iterations(),
            )
            .map_err(|e| match e {
                RxpError::PollTimeout { last, .. } => RxpError::RtruInitTimeout {
                    engine,
                    status: last,
                },
                other => other,
            })?;
        log::debug!(
            "RXP engine {} RTRU init done after {} cycles",
            engine,
            outcome.cycles
        );
        self.clear_bits(RTRU_CSR_CTRL, init)?;
        Ok(outcome.cycles)
    }

    /// Set GO.
    pub fn enable(&self) -> RxpResult<()> {
        self.set_bits(CSR_CTRL, CtrlFlags::GO.bits())?;
        log::debug!("RXP engine {} enabled", self.engine);
        Ok(())
    }

    /// Clear GO.
    pub fn disable(&self) -> RxpResult<()> {
        self.clear_bits(CSR_CTRL, CtrlFlags::GO.bits())?;
        log::debug!("RXP engine {} disabled", self.engine);
        Ok(())
    }

    pub fn status(&self) -> RxpResult<StatusFlags> {
        Ok(StatusFlags::from_bits_retain(self.read(CSR_STATUS)?))
    }

    pub fn state(&self) -> RxpResult<EngineState> {
        let ctrl = CtrlFlags::from_bits_retain(self.read(CSR_CTRL)?);
        if ctrl.contains(CtrlFlags::INIT) {
            return Ok(EngineState::Initializing);
        }
        let status = self.status()?;
        Ok(if !status.contains(StatusFlags::INIT_DONE) {
            EngineState::Reset
        } else if ctrl.contains(CtrlFlags::GO) {
            EngineState::Ready
        } else {
            EngineState::Disabled
        })
    }

    /// Read and check the identifier register.
    pub fn identify(&self) -> RxpResult<u32> {
        let ident = self.read(CSR_IDENTIFIER)?;
        if ident & 0xFFFF != RXP_IDENTIFIER {
            return Err(RxpError::UnexpectedIdentifier {
                engine: self.engine.as_u8(),
                ident,
            });
        }
        log::debug!(
            "RXP engine {} identifier {:#010x}, revision {:#010x}",
            self.engine,
            ident,
            self.read(CSR_REVISION)?
        );
        Ok(ident)
    }

    pub fn stats(&self) -> RxpResult<EngineStats> {
        let low = self.read(CSR_JOB_BYTE_COUNT0)?;
        let high = self.read(CSR_JOB_BYTE_COUNT1)?;
        Ok(EngineStats {
            core_clock_count: self.read(CSR_CORE_CLK_COUNT)?,
            write_count: self.read(CSR_WRITE_COUNT)?,
            job_count: self.read(CSR_JOB_COUNT)?,
            job_error_count: self.read(CSR_JOB_ERROR_COUNT)?,
            job_byte_count: (u64::from(high) << 32) | u64::from(low),
            response_count: self.read(CSR_RESPONSE_COUNT)?,
            match_count: self.read(CSR_MATCH_COUNT)?,
            ddos_count: self.read(CSR_JOB_DDOS_COUNT)?,
        })
    }

    /// Read the main, RTRU and statistics blocks, logging each at trace level.
    pub fn dump_csrs(&self) -> RxpResult<Vec<(u32, u32)>> {
        let mut out = Vec::new();
        for (name, base) in [
            ("main", CSR_BASE_ADDRESS),
            ("rtru", RTRU_CSR_BASE_ADDRESS),
            ("stats", STATS_CSR_BASE_ADDRESS),
        ] {
            for index in 0..=CSR_BLOCK_REGISTERS {
                let address = base + index * CSR_WIDTH;
                let value = self.read(address)?;
                log::trace!(
                    "RXP engine {} {} csr[{:2}] {:#06x} = {:#010x}",
                    self.engine,
                    name,
                    index,
                    address,
                    value
                );
                out.push((address, value));
            }
        }
        Ok(out)
    }
}
