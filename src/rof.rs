// RXP Regex Accelerator Rust Bindings
// Copyright 2025 Henk-Jan Lebbink
// SPDX-License-Identifier: MIT

//! Rule object format (ROF) entries.
//!
//! A compiled rule database is a flat sequence of entries. Write entries
//! (`INST`, `IM`, `EM`) are streamed into the RTRU FIFO; check entries compare
//! a live CSR against the entry value once the preceding writes are committed.
//!
//! Two encodings are accepted:
//!
//! - binary: 16-byte little-endian records `{type: u8, pad: [u8; 3], address: u32, value: u64}`
//! - text: one `type,address,value` line per entry, the type in decimal and
//!   address and value in hex (the `0x` prefix is optional). `#` starts a comment.

use crate::error::{RxpError, RxpResult};
use std::path::Path;

/// Size of one binary entry in bytes.
pub const ROF_ENTRY_SIZE: usize = 16;

/// ROF entry type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RofEntryType {
    /// Rule instruction write.
    Instruction = 0,

    /// Register must equal the entry value.
    Equal = 1,

    /// Register must be greater than or equal to the entry value.
    GreaterOrEqual = 2,

    /// Register must be less than or equal to the entry value.
    LessOrEqual = 3,

    /// Rule-memory checksum must equal the entry value.
    Checksum = 4,

    /// Checksum excluding external memory.
    ChecksumExtMem = 5,

    /// Internal memory write.
    InternalMem = 6,

    /// External memory write.
    ExternalMem = 7,
}

impl RofEntryType {
    /// Returns the type code as a u8 value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns a human-readable name for the type.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Instruction => "INST",
            Self::Equal => "EQ",
            Self::GreaterOrEqual => "GTE",
            Self::LessOrEqual => "LTE",
            Self::Checksum => "CHECKSUM",
            Self::ChecksumExtMem => "CHECKSUM_EX_EM",
            Self::InternalMem => "IM",
            Self::ExternalMem => "EM",
        }
    }

    /// Entries that are streamed into the rule-update FIFO.
    #[inline]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Instruction | Self::InternalMem | Self::ExternalMem)
    }

    /// Entries that verify a register against the entry value.
    #[inline]
    pub const fn is_check(self) -> bool {
        !self.is_write()
    }

    /// Whether `register` satisfies a check of this type against `value`.
    ///
    /// The register is zero-extended to 64 bits before comparing. Write
    /// types never satisfy a check.
    pub fn holds(self, register: u32, value: u64) -> bool {
        let register = u64::from(register);
        match self {
            Self::Equal | Self::Checksum | Self::ChecksumExtMem => register == value,
            Self::GreaterOrEqual => register >= value,
            Self::LessOrEqual => register <= value,
            Self::Instruction | Self::InternalMem | Self::ExternalMem => false,
        }
    }
}

impl TryFrom<u8> for RofEntryType {
    type Error = RxpError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Instruction,
            1 => Self::Equal,
            2 => Self::GreaterOrEqual,
            3 => Self::LessOrEqual,
            4 => Self::Checksum,
            5 => Self::ChecksumExtMem,
            6 => Self::InternalMem,
            7 => Self::ExternalMem,
            other => return Err(RxpError::InvalidRofEntryType(other)),
        })
    }
}

impl std::fmt::Display for RofEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#04x})", self.name(), self.as_u8())
    }
}

/// One rule program entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RofEntry {
    pub kind: RofEntryType,
    /// RTRU address for writes, `block << 16 | index` for checks.
    pub address: u32,
    pub value: u64,
}

impl RofEntry {
    #[inline]
    pub const fn new(kind: RofEntryType, address: u32, value: u64) -> Self {
        Self {
            kind,
            address,
            value,
        }
    }

    /// Low half of the value, written to RTRU `DATA_0`.
    #[inline]
    pub const fn data_low(&self) -> u32 {
        self.value as u32
    }

    /// High half of the value, written to RTRU `DATA_1`.
    #[inline]
    pub const fn data_high(&self) -> u32 {
        (self.value >> 32) as u32
    }

    /// Encode into the 16-byte binary record.
    pub fn to_bytes(&self) -> [u8; ROF_ENTRY_SIZE] {
        let mut out = [0u8; ROF_ENTRY_SIZE];
        out[0] = self.kind.as_u8();
        out[4..8].copy_from_slice(&self.address.to_le_bytes());
        out[8..16].copy_from_slice(&self.value.to_le_bytes());
        out
    }

    fn from_record(index: usize, record: &[u8]) -> RxpResult<Self> {
        let kind = RofEntryType::try_from(record[0]).map_err(|_| RxpError::RofParse {
            index,
            reason: format!("unknown entry type {}", record[0]),
        })?;
        let mut address = [0u8; 4];
        address.copy_from_slice(&record[4..8]);
        let mut value = [0u8; 8];
        value.copy_from_slice(&record[8..16]);
        Ok(Self::new(
            kind,
            u32::from_le_bytes(address),
            u64::from_le_bytes(value),
        ))
    }
}

/// Parse a binary rule program.
pub fn parse_binary(bytes: &[u8]) -> RxpResult<Vec<RofEntry>> {
    if bytes.len() % ROF_ENTRY_SIZE != 0 {
        return Err(RxpError::RofParse {
            index: bytes.len() / ROF_ENTRY_SIZE,
            reason: format!(
                "trailing {} bytes, records are {} bytes",
                bytes.len() % ROF_ENTRY_SIZE,
                ROF_ENTRY_SIZE
            ),
        });
    }
    bytes
        .chunks_exact(ROF_ENTRY_SIZE)
        .enumerate()
        .map(|(index, record)| RofEntry::from_record(index, record))
        .collect()
}

/// Encode entries into the binary format.
pub fn encode(entries: &[RofEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * ROF_ENTRY_SIZE);
    for entry in entries {
        out.extend_from_slice(&entry.to_bytes());
    }
    out
}

fn parse_hex(field: &str) -> Option<u64> {
    let digits = field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field);
    u64::from_str_radix(digits, 16).ok()
}

/// Parse a text rule program.
///
/// Error indices count entries, not lines.
pub fn parse_text(text: &str) -> RxpResult<Vec<RofEntry>> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let index = entries.len();
        let parse_err = |reason: String| RxpError::RofParse { index, reason };

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(parse_err(format!(
                "expected 3 fields, found {} in {:?}",
                fields.len(),
                line
            )));
        }

        let code: u8 = fields[0]
            .parse()
            .map_err(|_| parse_err(format!("bad entry type {:?}", fields[0])))?;
        let kind = RofEntryType::try_from(code)
            .map_err(|_| parse_err(format!("unknown entry type {}", code)))?;
        let address = parse_hex(fields[1])
            .and_then(|a| u32::try_from(a).ok())
            .ok_or_else(|| parse_err(format!("bad address {:?}", fields[1])))?;
        let value =
            parse_hex(fields[2]).ok_or_else(|| parse_err(format!("bad value {:?}", fields[2])))?;

        entries.push(RofEntry::new(kind, address, value));
    }
    Ok(entries)
}

/// Read a rule program from disk.
///
/// Files containing a NUL byte are parsed as binary, anything else as text.
pub fn read_file(path: &Path) -> RxpResult<Vec<RofEntry>> {
    let bytes = std::fs::read(path)?;
    let entries = if bytes.contains(&0) {
        parse_binary(&bytes)?
    } else {
        let text = std::str::from_utf8(&bytes).map_err(|e| RxpError::RofParse {
            index: 0,
            reason: format!("{} is not valid text: {}", path.display(), e),
        })?;
        parse_text(text)?
    };
    log::debug!("Read {} ROF entries from {}", entries.len(), path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_values() {
        assert_eq!(RofEntryType::Instruction.as_u8(), 0);
        assert_eq!(RofEntryType::Equal.as_u8(), 1);
        assert_eq!(RofEntryType::Checksum.as_u8(), 4);
        assert_eq!(RofEntryType::ExternalMem.as_u8(), 7);
        assert!(matches!(
            RofEntryType::try_from(8),
            Err(RxpError::InvalidRofEntryType(8))
        ));
    }

    #[test]
    fn test_entry_type_display() {
        assert_eq!(format!("{}", RofEntryType::Equal), "EQ (0x01)");
        assert_eq!(
            format!("{}", RofEntryType::ChecksumExtMem),
            "CHECKSUM_EX_EM (0x05)"
        );
    }

    #[test]
    fn test_write_and_check_kinds() {
        let writes: Vec<_> = (0..8u8)
            .filter_map(|c| RofEntryType::try_from(c).ok())
            .filter(|k| k.is_write())
            .collect();
        assert_eq!(
            writes,
            vec![
                RofEntryType::Instruction,
                RofEntryType::InternalMem,
                RofEntryType::ExternalMem
            ]
        );
        assert!(RofEntryType::LessOrEqual.is_check());
    }

    #[test]
    fn test_holds() {
        assert!(RofEntryType::Equal.holds(5, 5));
        assert!(!RofEntryType::Equal.holds(5, 6));
        assert!(RofEntryType::GreaterOrEqual.holds(7, 5));
        assert!(!RofEntryType::GreaterOrEqual.holds(4, 5));
        assert!(RofEntryType::LessOrEqual.holds(4, 5));
        // Value wider than any register can hold.
        assert!(!RofEntryType::Equal.holds(u32::MAX, 1 << 32));
        assert!(RofEntryType::LessOrEqual.holds(u32::MAX, 1 << 32));
        assert!(!RofEntryType::Instruction.holds(0, 0));
    }

    #[test]
    fn test_binary_layout() {
        let entry = RofEntry::new(RofEntryType::InternalMem, 0x1234, 0x1122_3344_5566_7788);
        let bytes = entry.to_bytes();
        assert_eq!(bytes[0], 6);
        assert_eq!(&bytes[1..4], &[0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0x34, 0x12, 0, 0]);
        assert_eq!(bytes[8], 0x88);
        assert_eq!(bytes[15], 0x11);
        assert_eq!(entry.data_low(), 0x5566_7788);
        assert_eq!(entry.data_high(), 0x1122_3344);

        let parsed = parse_binary(&encode(&[entry, entry])).unwrap();
        assert_eq!(parsed, vec![entry, entry]);
    }

    #[test]
    fn test_binary_rejects_partial_record() {
        let mut bytes = encode(&[RofEntry::new(RofEntryType::Instruction, 0, 0)]);
        bytes.push(0);
        assert!(matches!(
            parse_binary(&bytes),
            Err(RxpError::RofParse { index: 1, .. })
        ));
    }

    #[test]
    fn test_binary_rejects_unknown_type() {
        let mut bytes = encode(&[RofEntry::new(RofEntryType::Instruction, 0, 0)]);
        bytes[0] = 9;
        assert!(matches!(
            parse_binary(&bytes),
            Err(RxpError::RofParse { index: 0, .. })
        ));
    }

    #[test]
    fn test_parse_text() {
        let text = "\
# rules v1
0,0x10,0xdeadbeef
6, 20, 0x1 # inline comment

1,0x0001000a,2
";
        let entries = parse_text(text).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            RofEntry::new(RofEntryType::Instruction, 0x10, 0xdead_beef)
        );
        assert_eq!(entries[1], RofEntry::new(RofEntryType::InternalMem, 0x20, 1));
        assert_eq!(entries[2].kind, RofEntryType::Equal);
        assert_eq!(entries[2].address, 0x0001_000a);
    }

    #[test]
    fn test_parse_text_errors() {
        assert!(matches!(
            parse_text("0,1,2\n0,1\n"),
            Err(RxpError::RofParse { index: 1, .. })
        ));
        assert!(parse_text("9,1,2").is_err());
        assert!(parse_text("0,zz,2").is_err());
        assert!(parse_text("0,0x100000000,2").is_err());
        assert!(parse_text("# only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_read_file_binary_and_text() {
        let dir = std::env::temp_dir();
        let bin = dir.join(format!("rxp_rof_test_{}.bin", std::process::id()));
        let txt = dir.join(format!("rxp_rof_test_{}.txt", std::process::id()));
        let entries = vec![
            RofEntry::new(RofEntryType::Instruction, 1, 2),
            RofEntry::new(RofEntryType::Equal, 0x0001_0015, 1),
        ];
        std::fs::write(&bin, encode(&entries)).unwrap();
        std::fs::write(&txt, "0,1,2\n1,0x00010015,1\n").unwrap();

        assert_eq!(read_file(&bin).unwrap(), entries);
        assert_eq!(read_file(&txt).unwrap(), entries);

        let _ = std::fs::remove_file(&bin);
        let _ = std::fs::remove_file(&txt);
    }
}
