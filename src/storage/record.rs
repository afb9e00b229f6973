// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! On-disk record codec.
//!
//! ## Record layout
//!
//! ```text
//! [RecordHeader: 28 bytes]
//!   crc        : u32 (LE) — CRC-32 (IEEE) over the three fields below,
//!                           then the key bytes, then the value bytes
//!   timestamp  : u64 (LE) — unix seconds at write time
//!   key_len    : u64 (LE)
//!   value_len  : u64 (LE) — 0 ⇒ tombstone
//!
//! [key bytes   : key_len bytes]
//! [value bytes : value_len bytes]
//! ```
//!
//! All integers are fixed-width little-endian; no varints. A deletion is a
//! regular record with `value_len = 0` — the CRC still covers the (empty)
//! value. Zero-length keys are reserved and never produced.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::Utc;
use crc32fast::Hasher;

use crate::error::{CaskError, Result};

/// Total size of the fixed header preceding the key bytes.
pub const RECORD_HEADER_SIZE: u64 = 4 + 8 + 8 + 8;

/// Upper bound on `key_len + value_len`. Larger widths in a header are
/// impossible for files this store writes and are treated as corruption.
const MAX_PAYLOAD_LEN: u64 = 1 << 32;

/// One unit of the append-only log: a key paired with its value bytes, or a
/// tombstone when the value is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Unix seconds at which the record was created.
    pub timestamp: u64,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    /// Build an insert record stamped with the current wall clock.
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { timestamp: Utc::now().timestamp() as u64, key, value }
    }

    /// Build a deletion record for `key`.
    pub fn tombstone(key: Vec<u8>) -> Self {
        Self::new(key, Vec::new())
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }

    /// Total encoded size: header + key + value.
    pub fn encoded_len(&self) -> u64 {
        RECORD_HEADER_SIZE + self.key.len() as u64 + self.value.len() as u64
    }

    /// CRC-32 (IEEE) over `timestamp‖key_len‖value_len‖key‖value`, with the
    /// integer fields framed little-endian.
    pub fn checksum(&self) -> u32 {
        checksum(
            self.timestamp,
            self.key.len() as u64,
            self.value.len() as u64,
            &self.key,
            &self.value,
        )
    }

    /// Serialize into a single buffer, ready for one `write_all`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        buf.extend_from_slice(&self.checksum().to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u64).to_le_bytes());
        buf.extend_from_slice(&(self.value.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
        buf
    }

    /// Read the next record from `r`.
    ///
    /// Returns `Ok(None)` on clean end-of-segment (EOF before any header
    /// byte). A header cut short, impossible field widths, a payload cut
    /// short, or a CRC mismatch all return [`CaskError::Corrupt`]; replay
    /// treats these as the truncation point of the segment. Other I/O
    /// failures surface unchanged as [`CaskError::Io`].
    pub fn decode<R: Read>(r: &mut R) -> Result<Option<Record>> {
        let mut header = [0u8; RECORD_HEADER_SIZE as usize];
        let filled = read_full(r, &mut header)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < header.len() {
            return Err(CaskError::Corrupt("truncated record header".into()));
        }

        let mut h = &header[..];
        let crc = h.read_u32::<LittleEndian>()?;
        let timestamp = h.read_u64::<LittleEndian>()?;
        let key_len = h.read_u64::<LittleEndian>()?;
        let value_len = h.read_u64::<LittleEndian>()?;

        if key_len == 0 {
            return Err(CaskError::Corrupt("record with zero-length key".into()));
        }
        let payload_len = key_len
            .checked_add(value_len)
            .filter(|&n| n <= MAX_PAYLOAD_LEN)
            .ok_or_else(|| {
                CaskError::Corrupt(format!(
                    "impossible record widths: key_len={key_len} value_len={value_len}"
                ))
            })?;

        let mut payload = vec![0u8; payload_len as usize];
        r.read_exact(&mut payload).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                CaskError::Corrupt("record payload cut short".into())
            } else {
                CaskError::Io(e)
            }
        })?;

        let value = payload.split_off(key_len as usize);
        let key = payload;

        if checksum(timestamp, key_len, value_len, &key, &value) != crc {
            return Err(CaskError::Corrupt("record CRC mismatch".into()));
        }

        Ok(Some(Record { timestamp, key, value }))
    }
}

fn checksum(timestamp: u64, key_len: u64, value_len: u64, key: &[u8], value: &[u8]) -> u32 {
    let mut meta = [0u8; 24];
    meta[0..8].copy_from_slice(&timestamp.to_le_bytes());
    meta[8..16].copy_from_slice(&key_len.to_le_bytes());
    meta[16..24].copy_from_slice(&value_len.to_le_bytes());

    let mut hasher = Hasher::new();
    hasher.update(&meta);
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

/// Read until `buf` is full or EOF. Returns the number of bytes read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CaskError::Io(e)),
        }
    }
    Ok(filled)
}
