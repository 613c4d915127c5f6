// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Rule database programming through the RTRU FIFO.
//!
//! Write entries are buffered into batches no larger than the FIFO depth
//! reported by the RTRU capability register. Each batch is pushed entry by
//! entry, the FIFO fill level is confirmed, and a GO pulse commits it to
//! rule memory. A check entry first commits whatever is pending, so it
//! always observes every write that precedes it in the program.
//!
//! Nothing is rolled back on failure: batches committed before an error stay
//! programmed.

use crate::csr::*;
use crate::engine::EngineControl;
use crate::error::{RxpError, RxpResult};
use crate::port::RegisterPort;
use crate::rof::RofEntry;

/// How a program relates to the rules already in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramMode {
    /// Reset the engine first, then program from scratch.
    Full,
    /// Apply on top of the current rule memory.
    Incremental,
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// FIFO commits issued.
    pub batches: usize,
    pub entries_written: usize,
    pub checks_passed: usize,
}

/// Streams rule programs into one engine.
pub struct RuleLoader<'a, P: RegisterPort + ?Sized> {
    ctl: EngineControl<'a, P>,
}

impl<'a, P: RegisterPort + ?Sized> RuleLoader<'a, P> {
    pub fn new(ctl: EngineControl<'a, P>) -> Self {
        Self { ctl }
    }

    /// The engine control this loader drives.
    pub fn control(&self) -> &EngineControl<'a, P> {
        &self.ctl
    }

    /// RTRU FIFO depth.
    pub fn fifo_capacity(&self) -> RxpResult<usize> {
        Ok((self.ctl.read(RTRU_CSR_CAPABILITY)? & 0xFF) as usize)
    }

    /// Program `entries` into the engine.
    pub fn load(&self, entries: &[RofEntry], mode: ProgramMode) -> RxpResult<LoadReport> {
        let engine = self.ctl.engine().as_u8();
        if entries.is_empty() {
            return Err(RxpError::InvalidArgument(
                "rule program has no entries".into(),
            ));
        }

        if mode == ProgramMode::Full {
            self.ctl.init()?;
        }

        let status = self.ctl.read(CSR_STATUS)?;
        if status & StatusFlags::INIT_DONE.bits() == 0 {
            return Err(RxpError::EngineNotReady { engine, status });
        }

        let capacity = self.fifo_capacity()?;
        if capacity == 0 {
            return Err(RxpError::InvalidArgument(format!(
                "engine {} reports a zero-depth RTRU FIFO",
                engine
            )));
        }
        log::debug!(
            "Loading {} ROF entries into engine {} ({:?}, FIFO depth {})",
            entries.len(),
            engine,
            mode,
            capacity
        );

        let mut report = LoadReport::default();
        let mut pending: Option<usize> = None;
        for (i, entry) in entries.iter().enumerate() {
            if entry.kind.is_write() {
                let start = *pending.get_or_insert(i);
                if i + 1 - start == capacity {
                    self.flush(&entries[start..=i], &mut report)?;
                    pending = None;
                }
            } else {
                if let Some(start) = pending.take() {
                    self.flush(&entries[start..i], &mut report)?;
                }
                self.check(entry)?;
                report.checks_passed += 1;
            }
        }
        if let Some(start) = pending {
            self.flush(&entries[start..], &mut report)?;
        }

        log::info!(
            "Engine {} programmed: {} entries in {} batches, {} checks passed",
            engine,
            report.entries_written,
            report.batches,
            report.checks_passed
        );
        Ok(report)
    }

    fn flush(&self, batch: &[RofEntry], report: &mut LoadReport) -> RxpResult<()> {
        let engine = self.ctl.engine().as_u8();
        for entry in batch {
            self.ctl.write(RTRU_CSR_DATA_0, entry.data_low())?;
            self.ctl.write(RTRU_CSR_DATA_1, entry.data_high())?;
            self.ctl.write(RTRU_CSR_ADDR, entry.address)?;
        }

        let iterations = self.ctl.timeouts().poll_iterations();
        let timeout = |stage: &'static str| {
            move |e: RxpError| match e {
                RxpError::PollTimeout { last, .. } => RxpError::RuleFlushTimeout {
                    engine,
                    stage,
                    last,
                },
                other => other,
            }
        };

        self.ctl
            .poll_for(RTRU_CSR_FIFO_STAT, batch.len() as u32, !0, iterations)
            .map_err(timeout("FIFO fill"))?;

        let go = RtruCtrlFlags::GO.bits();
        let ctrl = self.ctl.read(RTRU_CSR_CTRL)?;
        self.ctl.write(RTRU_CSR_CTRL, ctrl | go)?;

        let done = RtruStatusFlags::UPDATE_DONE.bits();
        let outcome = self
            .ctl
            .poll_for(RTRU_CSR_STATUS, done, done, iterations)
            .map_err(timeout("update done"))?;

        let ctrl = self.ctl.read(RTRU_CSR_CTRL)?;
        self.ctl.write(RTRU_CSR_CTRL, ctrl & !go)?;

        report.batches += 1;
        report.entries_written += batch.len();
        log::trace!(
            "Engine {} committed {} rule entries after {} cycles",
            engine,
            batch.len(),
            outcome.cycles
        );
        Ok(())
    }

    fn check(&self, entry: &RofEntry) -> RxpResult<()> {
        let target = RegisterRef::decode(entry.address)?;
        let actual = self.ctl.read(target.address())?;
        if !entry.kind.holds(actual, entry.value) {
            log::warn!(
                "Engine {} rule check {} at {:#010x} failed: {:#x} vs {:#x}",
                self.ctl.engine(),
                entry.kind,
                entry.address,
                actual,
                entry.value
            );
            return Err(RxpError::RuleVerificationFailed {
                kind: entry.kind,
                address: entry.address,
                expected: entry.value,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::poll::NoopClock;
    use crate::port::EngineId;
    use crate::rof::RofEntryType;
    use crate::sim::SimAdapter;
    use std::time::Duration;

    fn e0() -> EngineId {
        EngineId::ALL[0]
    }

    fn writes(n: usize) -> Vec<RofEntry> {
        (0..n)
            .map(|i| RofEntry::new(RofEntryType::Instruction, i as u32, (i as u64) << 32 | 0xAB))
            .collect()
    }

    fn loader(sim: &SimAdapter) -> RuleLoader<'_, SimAdapter> {
        RuleLoader::new(EngineControl::new(
            sim,
            e0(),
            Timeouts::default(),
            &NoopClock,
        ))
    }

    #[test]
    fn test_batches_respect_fifo_capacity() {
        let sim = SimAdapter::new();
        sim.set_rtru_capacity(4);
        let report = loader(&sim)
            .load(&writes(10), ProgramMode::Full)
            .unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.entries_written, 10);
        assert_eq!(sim.batch_sizes(e0()), vec![4, 4, 2]);
        assert_eq!(sim.max_fifo_fill(e0()), 4);
        assert_eq!(sim.committed(e0()).len(), 10);
    }

    #[test]
    fn test_exact_multiple_of_capacity() {
        let sim = SimAdapter::new();
        sim.set_rtru_capacity(5);
        let report = loader(&sim)
            .load(&writes(10), ProgramMode::Full)
            .unwrap();
        assert_eq!(report.batches, 2);
        assert_eq!(sim.batch_sizes(e0()), vec![5, 5]);
    }

    #[test]
    fn test_check_observes_preceding_writes() {
        let sim = SimAdapter::new();
        sim.set_rtru_capacity(8);
        let mut program = writes(3);
        // RTRU_COUNT (RTRU block, index 21) holds the committed entry count.
        program.push(RofEntry::new(RofEntryType::Equal, 0x0001_0015, 3));
        program.extend(writes(2));
        program.push(RofEntry::new(RofEntryType::GreaterOrEqual, 0x0001_0015, 5));
        program.push(RofEntry::new(RofEntryType::LessOrEqual, 0x0001_0015, 6));

        let report = loader(&sim).load(&program, ProgramMode::Full).unwrap();
        assert_eq!(report.checks_passed, 3);
        assert_eq!(report.batches, 2);
        assert_eq!(sim.batch_sizes(e0()), vec![3, 2]);
    }

    #[test]
    fn test_equal_check_against_main_block() {
        let sim = SimAdapter::new();
        sim.poke(e0(), CSR_SCRATCH_1, 0x77);
        let index = CSR_SCRATCH_1 / CSR_WIDTH;
        let ok = [RofEntry::new(RofEntryType::Equal, index, 0x77)];
        assert!(matches!(
            loader(&sim).load(&ok, ProgramMode::Incremental),
            Err(RxpError::EngineNotReady { engine: 0, .. })
        ));

        let report = loader(&sim).load(&ok, ProgramMode::Full).unwrap();
        assert_eq!(report.checks_passed, 1);
        assert_eq!(report.batches, 0);

        let bad = [RofEntry::new(RofEntryType::Equal, index, 0x78)];
        match loader(&sim).load(&bad, ProgramMode::Incremental) {
            Err(RxpError::RuleVerificationFailed {
                kind,
                expected,
                actual,
                ..
            }) => {
                assert_eq!(kind, RofEntryType::Equal);
                assert_eq!(expected, 0x78);
                assert_eq!(actual, 0x77);
            }
            other => panic!("expected verification failure, got {:?}", other),
        }
    }

    #[test]
    fn test_checksum_check() {
        let sim = SimAdapter::new();
        let program = writes(6);
        loader(&sim).load(&program, ProgramMode::Full).unwrap();
        let checksum = sim.peek(e0(), RTRU_CSR_CHECKSUM_0);

        let check = [RofEntry::new(
            RofEntryType::Checksum,
            0x0001_0010,
            u64::from(checksum),
        )];
        assert!(loader(&sim).load(&check, ProgramMode::Incremental).is_ok());
    }

    #[test]
    fn test_invalid_register_block() {
        let sim = SimAdapter::new();
        let program = [RofEntry::new(RofEntryType::Equal, 0x0002_0000, 0)];
        assert!(matches!(
            loader(&sim).load(&program, ProgramMode::Full),
            Err(RxpError::InvalidRegisterBlock(2))
        ));
    }

    #[test]
    fn test_empty_program_touches_nothing() {
        let sim = SimAdapter::new();
        sim.record_writes(true);
        assert!(matches!(
            loader(&sim).load(&[], ProgramMode::Full),
            Err(RxpError::InvalidArgument(_))
        ));
        assert!(sim.write_log().is_empty());
        assert_eq!(sim.read_count(), 0);
    }

    #[test]
    fn test_zero_capacity() {
        let sim = SimAdapter::new();
        sim.set_rtru_capacity(0);
        assert!(matches!(
            loader(&sim).load(&writes(1), ProgramMode::Full),
            Err(RxpError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_update_timeout_keeps_earlier_batches() {
        let sim = SimAdapter::new();
        sim.set_rtru_capacity(2);
        let mut t = Timeouts::default();
        t.set_poll(Duration::from_millis(5));
        let l = RuleLoader::new(EngineControl::new(&sim, e0(), t, &NoopClock));
        l.load(&writes(2), ProgramMode::Full).unwrap();

        sim.set_update_delay(None);
        let err = l.load(&writes(4), ProgramMode::Incremental).unwrap_err();
        assert!(matches!(
            err,
            RxpError::RuleFlushTimeout {
                stage: "update done",
                ..
            }
        ));
        assert_eq!(sim.committed(e0()).len(), 2);
    }

    #[test]
    fn test_failed_check_keeps_flushed_writes() {
        let sim = SimAdapter::new();
        sim.set_rtru_capacity(2);
        let mut program = writes(3);
        program.push(RofEntry::new(RofEntryType::Equal, 0x0001_0015, 4));
        program.extend(writes(2));

        let err = loader(&sim).load(&program, ProgramMode::Full).unwrap_err();
        assert!(matches!(
            err,
            RxpError::RuleVerificationFailed {
                kind: RofEntryType::Equal,
                expected: 4,
                actual: 3,
                ..
            }
        ));
        assert_eq!(sim.batch_sizes(e0()), vec![2, 1]);
        let flushed: Vec<_> = writes(3).iter().map(|e| (e.address, e.value)).collect();
        assert_eq!(sim.committed(e0()), flushed);
    }

    #[test]
    fn test_flush_write_order() {
        let sim = SimAdapter::new();
        let l = loader(&sim);
        l.load(&writes(1), ProgramMode::Full).unwrap();
        sim.record_writes(true);
        let entry = RofEntry::new(RofEntryType::InternalMem, 0x40, 0x1111_2222_3333_4444);
        l.load(&[entry], ProgramMode::Incremental).unwrap();

        let log = sim.write_log();
        assert_eq!(log[0], (e0(), RTRU_CSR_DATA_0, 0x3333_4444));
        assert_eq!(log[1], (e0(), RTRU_CSR_DATA_1, 0x1111_2222));
        assert_eq!(log[2], (e0(), RTRU_CSR_ADDR, 0x40));
        assert_eq!(log[3].1, RTRU_CSR_CTRL);
        assert_ne!(log[3].2 & RtruCtrlFlags::GO.bits(), 0);
        assert_eq!(log[4].1, RTRU_CSR_CTRL);
        assert_eq!(log[4].2 & RtruCtrlFlags::GO.bits(), 0);
    }
}
