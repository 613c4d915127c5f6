// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! RXP job descriptors and response wire format.
//!
//! A job is posted as a [`WorkDescriptor`]: a control segment carrying the
//! rule subsets and control bits, plus data segments for the input payload
//! and the match output buffer. The engine answers with a 16-byte
//! [`ResponseHeader`] in the metadata buffer and up to 254 [`MatchTuple`]s in
//! the output buffer. All wire fields are little-endian.

use crate::port::MemoryKey;
use bitflags::bitflags;

bitflags! {
    /// Job control bits forwarded to the engine.
    ///
    /// Applications pass a 16-bit control word; only the bits below reach
    /// the control segment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct JobCtrl: u16 {
        /// Control segment bit 2, passed through unmodified.
        const SEG_BIT2 = 0x0004;
        /// Control segment bit 3, passed through unmodified.
        const SEG_BIT3 = 0x0008;
        /// High-priority match mode.
        const HPM_ENABLE = 0x0100;
    }
}

impl JobCtrl {
    /// Bits of an application control word that reach the hardware.
    pub const HW_MASK: u16 = 0x010C;

    /// Extract the forwarded bits from an application control word.
    #[inline]
    pub const fn from_app(ctrl: u16) -> Self {
        Self::from_bits_truncate((ctrl & 0x000C) | (ctrl & 0x0100))
    }
}

/// Control segment of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSegment {
    /// Rule subset ids to match against.
    pub subset: [u16; 4],
    pub ctrl: JobCtrl,
}

/// A registered buffer range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataSegment {
    pub addr: u64,
    pub len: u32,
    pub key: MemoryKey,
}

impl DataSegment {
    #[inline]
    pub fn new(addr: *const u8, len: usize, key: MemoryKey) -> Self {
        Self {
            addr: addr as u64,
            len: len as u32,
            key,
        }
    }
}

/// Everything the job context needs to post one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkDescriptor {
    pub ctrl: ControlSegment,
    pub input: DataSegment,
    /// Match tuple buffer; its length is always the full match capacity.
    pub output: DataSegment,
    /// Key of the 16-byte response metadata buffer.
    pub metadata_key: MemoryKey,
}

/// A job handed to [`crate::queue::Queue::submit`].
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    /// Application id, echoed in the response header.
    pub job_id: u32,
    /// Application control word, see [`JobCtrl::from_app`].
    pub ctrl: u16,
    pub subset: [u16; 4],
    pub data: &'a [u8],
}

impl<'a> Job<'a> {
    pub fn new(job_id: u32, data: &'a [u8]) -> Self {
        Self {
            job_id,
            ctrl: 0,
            subset: [1, 0, 0, 0],
            data,
        }
    }

    pub fn with_subset(mut self, subset: [u16; 4]) -> Self {
        self.subset = subset;
        self
    }

    pub fn with_ctrl(mut self, ctrl: u16) -> Self {
        self.ctrl = ctrl;
        self
    }
}

/// 16-byte response metadata.
///
/// # Layout
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0 | 4 | job_id |
/// | 4 | 2 | status |
/// | 6 | 1 | detected_match_count |
/// | 7 | 1 | match_count |
/// | 8 | 2 | primary_thread_count |
/// | 10 | 2 | instruction_count |
/// | 12 | 2 | latency_count |
/// | 14 | 2 | pmi_min_byte_ptr |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ResponseHeader {
    pub job_id: u32,
    pub status: u16,
    /// Matches found, possibly more than were reported.
    pub detected_match_count: u8,
    /// Match tuples that follow the header.
    pub match_count: u8,
    pub primary_thread_count: u16,
    pub instruction_count: u16,
    pub latency_count: u16,
    pub pmi_min_byte_ptr: u16,
}

impl ResponseHeader {
    pub const SIZE: usize = 16;

    /// Decode from the first 16 bytes of `buf`.
    pub fn read_from(buf: &[u8]) -> Option<Self> {
        let b = buf.get(..Self::SIZE)?;
        let u16_at = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        Some(Self {
            job_id: u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            status: u16_at(4),
            detected_match_count: b[6],
            match_count: b[7],
            primary_thread_count: u16_at(8),
            instruction_count: u16_at(10),
            latency_count: u16_at(12),
            pmi_min_byte_ptr: u16_at(14),
        })
    }

    /// Encode into the first 16 bytes of `buf`. Returns false if it is too short.
    pub fn write_to(&self, buf: &mut [u8]) -> bool {
        let Some(b) = buf.get_mut(..Self::SIZE) else {
            return false;
        };
        b[0..4].copy_from_slice(&self.job_id.to_le_bytes());
        b[4..6].copy_from_slice(&self.status.to_le_bytes());
        b[6] = self.detected_match_count;
        b[7] = self.match_count;
        b[8..10].copy_from_slice(&self.primary_thread_count.to_le_bytes());
        b[10..12].copy_from_slice(&self.instruction_count.to_le_bytes());
        b[12..14].copy_from_slice(&self.latency_count.to_le_bytes());
        b[14..16].copy_from_slice(&self.pmi_min_byte_ptr.to_le_bytes());
        true
    }

    /// Bytes of this response on the wire, header included.
    #[inline]
    pub fn wire_len(&self) -> usize {
        Self::SIZE + usize::from(self.match_count) * MatchTuple::SIZE
    }
}

/// One reported match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct MatchTuple {
    pub rule_id: u32,
    /// Byte offset of the match within the job payload.
    pub start_offset: u16,
    pub length: u16,
}

impl MatchTuple {
    pub const SIZE: usize = 8;

    pub fn read_from(buf: &[u8]) -> Option<Self> {
        let b = buf.get(..Self::SIZE)?;
        Some(Self {
            rule_id: u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            start_offset: u16::from_le_bytes([b[4], b[5]]),
            length: u16::from_le_bytes([b[6], b[7]]),
        })
    }

    pub fn write_to(&self, buf: &mut [u8]) -> bool {
        let Some(b) = buf.get_mut(..Self::SIZE) else {
            return false;
        };
        b[0..4].copy_from_slice(&self.rule_id.to_le_bytes());
        b[4..6].copy_from_slice(&self.start_offset.to_le_bytes());
        b[6..8].copy_from_slice(&self.length.to_le_bytes());
        true
    }
}

// Wire sizes
const _: () = assert!(std::mem::size_of::<ResponseHeader>() == ResponseHeader::SIZE);
const _: () = assert!(std::mem::size_of::<MatchTuple>() == MatchTuple::SIZE);
const _: () = assert!(ResponseHeader::SIZE == crate::config::RESPONSE_HEADER_SIZE);
const _: () = assert!(MatchTuple::SIZE == crate::config::MATCH_TUPLE_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ctrl_truncation() {
        assert_eq!(JobCtrl::from_app(0xFFFF).bits(), JobCtrl::HW_MASK);
        assert_eq!(JobCtrl::from_app(0x0003), JobCtrl::empty());
        assert_eq!(
            JobCtrl::from_app(0x0104),
            JobCtrl::SEG_BIT2 | JobCtrl::HPM_ENABLE
        );
        assert_eq!(JobCtrl::from_app(0x0208), JobCtrl::SEG_BIT3);
    }

    #[test]
    fn test_response_header_layout() {
        let header = ResponseHeader {
            job_id: 0x0403_0201,
            status: 0x0605,
            detected_match_count: 7,
            match_count: 3,
            primary_thread_count: 0x0A09,
            instruction_count: 0x0C0B,
            latency_count: 0x0E0D,
            pmi_min_byte_ptr: 0x100F,
        };
        let mut buf = [0u8; 16];
        assert!(header.write_to(&mut buf));
        assert_eq!(
            buf,
            [1, 2, 3, 4, 5, 6, 7, 3, 9, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10]
        );
        assert_eq!(ResponseHeader::read_from(&buf), Some(header));
        assert_eq!(header.wire_len(), 16 + 3 * 8);
    }

    #[test]
    fn test_short_buffers() {
        assert!(ResponseHeader::read_from(&[0u8; 15]).is_none());
        assert!(!ResponseHeader::default().write_to(&mut [0u8; 8]));
        assert!(MatchTuple::read_from(&[0u8; 7]).is_none());
    }

    #[test]
    fn test_match_tuple_layout() {
        let tuple = MatchTuple {
            rule_id: 42,
            start_offset: 0x0102,
            length: 5,
        };
        let mut buf = [0u8; 8];
        assert!(tuple.write_to(&mut buf));
        assert_eq!(buf, [42, 0, 0, 0, 0x02, 0x01, 5, 0]);
        assert_eq!(MatchTuple::read_from(&buf), Some(tuple));
    }

    #[test]
    fn test_job_builder() {
        let data = b"abc";
        let job = Job::new(9, data).with_subset([2, 3, 0, 0]).with_ctrl(0x0100);
        assert_eq!(job.subset, [2, 3, 0, 0]);
        assert_eq!(JobCtrl::from_app(job.ctrl), JobCtrl::HPM_ENABLE);
    }
}
