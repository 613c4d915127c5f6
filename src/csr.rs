// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! RXP control and status register map.
//!
//! Every block is a flat array of 4-byte registers. Offsets are relative to
//! the engine's CSR window, as seen through the register access port.
//!
//! | Block      | Base     |
//! |------------|----------|
//! | Main       | `0x0000` |
//! | RTRU       | `0x0100` |
//! | Statistics | `0x0200` |
//! | Royalty    | `0x0600` |

use crate::error::{RxpError, RxpResult};
use bitflags::bitflags;

/// Width of one CSR in bytes.
pub const CSR_WIDTH: u32 = 4;

pub const CSR_BASE_ADDRESS: u32 = 0x0000;
pub const RTRU_CSR_BASE_ADDRESS: u32 = 0x0100;
pub const STATS_CSR_BASE_ADDRESS: u32 = 0x0200;
pub const ROYALTY_CSR_BASE_ADDRESS: u32 = 0x0600;

/// Value expected in the low 16 bits of [`CSR_IDENTIFIER`] ("RT").
pub const RXP_IDENTIFIER: u32 = 0x5254;

/// Highest register index dumped per block by the debug helpers.
pub const CSR_BLOCK_REGISTERS: u32 = 31;

const fn main_csr(index: u32) -> u32 {
    CSR_BASE_ADDRESS + CSR_WIDTH * index
}

const fn rtru_csr(index: u32) -> u32 {
    RTRU_CSR_BASE_ADDRESS + CSR_WIDTH * index
}

// Main CSRs
pub const CSR_IDENTIFIER: u32 = main_csr(0);
pub const CSR_REVISION: u32 = main_csr(1);
pub const CSR_CAPABILITY_0: u32 = main_csr(2);
pub const CSR_CAPABILITY_1: u32 = main_csr(3);
pub const CSR_CAPABILITY_2: u32 = main_csr(4);
pub const CSR_CAPABILITY_3: u32 = main_csr(5);
pub const CSR_CAPABILITY_4: u32 = main_csr(6);
/// Max matches (high half) and DDOS/prefix threshold (low half).
pub const CSR_CAPABILITY_5: u32 = main_csr(7);
pub const CSR_CAPABILITY_6: u32 = main_csr(8);
pub const CSR_CAPABILITY_7: u32 = main_csr(9);
pub const CSR_STATUS: u32 = main_csr(10);
pub const CSR_FIFO_STATUS_0: u32 = main_csr(11);
pub const CSR_FIFO_STATUS_1: u32 = main_csr(12);
pub const CSR_JOB_DDOS_COUNT: u32 = main_csr(13);
// 14 + 15 reserved
pub const CSR_CORE_CLK_COUNT: u32 = main_csr(16);
pub const CSR_WRITE_COUNT: u32 = main_csr(17);
pub const CSR_JOB_COUNT: u32 = main_csr(18);
pub const CSR_JOB_ERROR_COUNT: u32 = main_csr(19);
pub const CSR_JOB_BYTE_COUNT0: u32 = main_csr(20);
pub const CSR_JOB_BYTE_COUNT1: u32 = main_csr(21);
pub const CSR_RESPONSE_COUNT: u32 = main_csr(22);
pub const CSR_MATCH_COUNT: u32 = main_csr(23);
pub const CSR_CTRL: u32 = main_csr(24);
pub const CSR_MAX_MATCH: u32 = main_csr(25);
pub const CSR_MAX_PREFIX: u32 = main_csr(26);
pub const CSR_MAX_PRI_THREAD: u32 = main_csr(27);
pub const CSR_MAX_LATENCY: u32 = main_csr(28);
pub const CSR_SCRATCH_1: u32 = main_csr(29);
pub const CSR_CLUSTER_MASK: u32 = main_csr(30);
pub const CSR_INTRA_CLUSTER_MASK: u32 = main_csr(31);

// Runtime rule update CSRs
// 0 + 1 reserved
/// FIFO depth in the low byte.
pub const RTRU_CSR_CAPABILITY: u32 = rtru_csr(2);
// 3-9 reserved
pub const RTRU_CSR_STATUS: u32 = rtru_csr(10);
pub const RTRU_CSR_FIFO_STAT: u32 = rtru_csr(11);
// 12-15 reserved
pub const RTRU_CSR_CHECKSUM_0: u32 = rtru_csr(16);
pub const RTRU_CSR_CHECKSUM_1: u32 = rtru_csr(17);
pub const RTRU_CSR_CHECKSUM_2: u32 = rtru_csr(18);
// 19 + 20 reserved
pub const RTRU_CSR_RTRU_COUNT: u32 = rtru_csr(21);
pub const RTRU_CSR_ROF_REV: u32 = rtru_csr(22);
// 23 reserved
pub const RTRU_CSR_CTRL: u32 = rtru_csr(24);
pub const RTRU_CSR_ADDR: u32 = rtru_csr(25);
pub const RTRU_CSR_DATA_0: u32 = rtru_csr(26);
pub const RTRU_CSR_DATA_1: u32 = rtru_csr(27);
// 28-31 reserved

// Statistics CSRs
pub const STATS_CSR_CLUSTER: u32 = STATS_CSR_BASE_ADDRESS;
pub const STATS_CSR_L2_CACHE: u32 = STATS_CSR_BASE_ADDRESS + CSR_WIDTH * 24;
pub const STATS_CSR_MPFE_FIFO: u32 = STATS_CSR_BASE_ADDRESS + CSR_WIDTH * 25;
pub const STATS_CSR_PE: u32 = STATS_CSR_BASE_ADDRESS + CSR_WIDTH * 28;
pub const STATS_CSR_CP: u32 = STATS_CSR_BASE_ADDRESS + CSR_WIDTH * 30;
pub const STATS_CSR_DP: u32 = STATS_CSR_BASE_ADDRESS + CSR_WIDTH * 31;

// Royalty / licensing CSRs
pub const ROYALTY_CSR_IDENT: u32 = ROYALTY_CSR_BASE_ADDRESS;
/// "RXPL"
pub const ROYALTY_IDENTIFIER: u32 = 0x4c50_5852;
pub const ROYALTY_CSR_CAPABILITY: u32 = ROYALTY_CSR_BASE_ADDRESS + CSR_WIDTH * 2;
pub const ROYALTY_CSR_STATUS: u32 = ROYALTY_CSR_BASE_ADDRESS + CSR_WIDTH * 10;

bitflags! {
    /// Main control register ([`CSR_CTRL`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CtrlFlags: u32 {
        /// Pulsed to reset and initialize the engine.
        const INIT = 0x0001;
        /// Engine processes jobs while set.
        const GO = 0x0008;
    }
}

bitflags! {
    /// Main status register ([`CSR_STATUS`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u32 {
        const INIT_DONE = 0x0001;
        const GOING = 0x0008;
        const IDLE = 0x0040;
        const TRACKER_OK = 0x0080;
        const TRIAL_TIMEOUT = 0x0100;
    }
}

bitflags! {
    /// RTRU control register ([`RTRU_CSR_CTRL`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RtruCtrlFlags: u32 {
        const INIT = 0x0001;
        /// Commit the FIFO contents to rule memory.
        const GO = 0x0002;
        const SIP = 0x0004;
        /// Two-bit init mode field, see [`RtruInitMode`].
        const INIT_MODE = 0x0030;
    }
}

bitflags! {
    /// RTRU status register ([`RTRU_CSR_STATUS`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RtruStatusFlags: u32 {
        const UPDATE_DONE = 0x0002;
        const IM_INIT_DONE = 0x0010;
        const L1C_INIT_DONE = 0x0020;
        const L2C_INIT_DONE = 0x0040;
        const EM_INIT_DONE = 0x0080;
    }
}

/// Memory tiers initialized by an RTRU init pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RtruInitMode {
    /// Instruction memory, L1, L2 and external memory.
    ImL1L2Em = 0,
    /// Instruction memory, L1 and L2.
    ImL1L2 = 1,
    L1L2 = 2,
    /// External memory only.
    Em = 3,
}

impl RtruInitMode {
    const SHIFT: u32 = 4;

    /// Field value positioned for the RTRU control register.
    #[inline]
    pub const fn ctrl_bits(self) -> u32 {
        (self as u32) << Self::SHIFT
    }

    /// Decode the mode field of an RTRU control value.
    pub fn from_ctrl(ctrl: u32) -> Self {
        match (ctrl & RtruCtrlFlags::INIT_MODE.bits()) >> Self::SHIFT {
            0 => Self::ImL1L2Em,
            1 => Self::ImL1L2,
            2 => Self::L1L2,
            _ => Self::Em,
        }
    }

    /// Done bits the RTRU status register reports once this mode completes.
    pub fn done_bits(self) -> RtruStatusFlags {
        match self {
            Self::ImL1L2Em => {
                RtruStatusFlags::IM_INIT_DONE
                    | RtruStatusFlags::L1C_INIT_DONE
                    | RtruStatusFlags::L2C_INIT_DONE
                    | RtruStatusFlags::EM_INIT_DONE
            }
            Self::ImL1L2 => {
                RtruStatusFlags::IM_INIT_DONE
                    | RtruStatusFlags::L1C_INIT_DONE
                    | RtruStatusFlags::L2C_INIT_DONE
            }
            Self::L1L2 => RtruStatusFlags::L1C_INIT_DONE | RtruStatusFlags::L2C_INIT_DONE,
            Self::Em => RtruStatusFlags::EM_INIT_DONE,
        }
    }
}

/// Register block selectable from a rule program check entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterBlock {
    Main,
    Rtru,
}

impl RegisterBlock {
    /// Decode the block selector carried in the high half of a check address.
    pub fn from_raw(raw: u16) -> RxpResult<Self> {
        match raw {
            0 => Ok(Self::Main),
            1 => Ok(Self::Rtru),
            other => Err(RxpError::InvalidRegisterBlock(other)),
        }
    }

    /// Base CSR offset of the block.
    #[inline]
    pub const fn base(self) -> u32 {
        match self {
            Self::Main => CSR_BASE_ADDRESS,
            Self::Rtru => RTRU_CSR_BASE_ADDRESS,
        }
    }
}

/// A check entry's target: block selector plus register index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRef {
    pub block: RegisterBlock,
    pub index: u16,
}

impl RegisterRef {
    /// Decode `block << 16 | index`.
    pub fn decode(raw: u32) -> RxpResult<Self> {
        let block = RegisterBlock::from_raw((raw >> 16) as u16)?;
        Ok(Self {
            block,
            index: (raw & 0xFFFF) as u16,
        })
    }

    /// CSR offset addressed by this reference.
    #[inline]
    pub fn address(&self) -> u32 {
        self.block.base() + u32::from(self.index) * CSR_WIDTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_offsets() {
        assert_eq!(CSR_STATUS, 0x28);
        assert_eq!(CSR_CTRL, 0x60);
        assert_eq!(CSR_MAX_LATENCY, 0x70);
        assert_eq!(RTRU_CSR_CAPABILITY, 0x108);
        assert_eq!(RTRU_CSR_FIFO_STAT, 0x12C);
        assert_eq!(RTRU_CSR_CTRL, 0x160);
        assert_eq!(RTRU_CSR_DATA_1, 0x16C);
    }

    #[test]
    fn test_register_block_from_raw() {
        assert_eq!(RegisterBlock::from_raw(0).unwrap(), RegisterBlock::Main);
        assert_eq!(RegisterBlock::from_raw(1).unwrap(), RegisterBlock::Rtru);
        assert!(matches!(
            RegisterBlock::from_raw(2),
            Err(RxpError::InvalidRegisterBlock(2))
        ));
    }

    #[test]
    fn test_register_ref_decode() {
        let main = RegisterRef::decode(10).unwrap();
        assert_eq!(main.address(), CSR_STATUS);

        let rtru = RegisterRef::decode(0x0001_0010).unwrap();
        assert_eq!(rtru.address(), RTRU_CSR_CHECKSUM_0);

        assert!(RegisterRef::decode(0x0007_0000).is_err());
    }

    #[test]
    fn test_rtru_init_mode() {
        assert_eq!(RtruInitMode::ImL1L2.ctrl_bits(), 0x10);
        assert_eq!(RtruInitMode::from_ctrl(0x11), RtruInitMode::ImL1L2);
        assert!(!RtruInitMode::ImL1L2
            .done_bits()
            .contains(RtruStatusFlags::EM_INIT_DONE));
        assert!(RtruInitMode::ImL1L2Em
            .done_bits()
            .contains(RtruStatusFlags::EM_INIT_DONE));
    }
}
