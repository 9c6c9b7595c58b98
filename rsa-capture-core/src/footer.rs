// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decodes the 28-byte per-frame trailer that follows each R3F frame's samples.

use crate::error::{frame_error, Result};
use crate::io::ByteReader;

/// Size, in bytes, of one frame footer.
pub const FOOTER_SIZE: usize = 28;

/// Sentinel value for a trigger/time-sync index meaning "no event in this frame".
pub const NO_EVENT: u16 = 0xFFFF;

/// Per-frame trailer: identifiers, trigger indices, and a hardware timestamp.
///
/// `frame_status` is kept as the full 16-bit field as read from the stream. The original
/// capture tool formatted only the low 8 bits when printing status; those are the bits
/// documented as meaningful (see [`Footer::status_bits`]), but all 16 bits are preserved here
/// since the upper 8 are still part of the wire format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footer {
    pub reserved: [u16; 3],
    pub frame_id: u32,
    pub trigger2_idx: u16,
    pub trigger1_idx: u16,
    pub time_sync_idx: u16,
    pub frame_status: u16,
    pub timestamp: u64,
}

impl Footer {
    /// Returns the 8 low-order bits of `frame_status`, the ones the original tooling
    /// documented and displayed.
    pub fn status_bits(&self) -> u8 {
        (self.frame_status & 0x00FF) as u8
    }

    /// True if `idx` denotes a real sample offset within a frame of `sample_size` samples
    /// rather than the "no event" sentinel.
    pub fn is_valid_index(idx: u16, sample_size: i32) -> bool {
        idx != NO_EVENT && (idx as i64) < sample_size as i64
    }
}

/// Parses a footer from an exactly [`FOOTER_SIZE`]-byte block.
pub fn parse_footer(buf: &[u8]) -> Result<Footer> {
    if buf.len() < FOOTER_SIZE {
        return frame_error("footer buffer shorter than 28 bytes");
    }

    let mut r = ByteReader::new(buf);

    let mut reserved = [0u16; 3];
    for slot in reserved.iter_mut() {
        *slot = r.read_u16()?;
    }

    // Bytes 6-7 are reserved and ignored; skip past them to the frame_id at byte 8.
    r.seek(8);
    let frame_id = r.read_u32()?;
    let trigger2_idx = r.read_u16()?;
    let trigger1_idx = r.read_u16()?;
    let time_sync_idx = r.read_u16()?;
    let frame_status = r.read_u16()?;
    let timestamp = r.read_u64()?;

    Ok(Footer {
        reserved,
        frame_id,
        trigger2_idx,
        trigger1_idx,
        time_sync_idx,
        frame_status,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_footer(frame_id: u32) -> Vec<u8> {
        let mut buf = vec![0u8; FOOTER_SIZE];
        buf[8..12].copy_from_slice(&frame_id.to_le_bytes());
        buf[12..14].copy_from_slice(&NO_EVENT.to_le_bytes());
        buf[14..16].copy_from_slice(&100u16.to_le_bytes());
        buf[16..18].copy_from_slice(&NO_EVENT.to_le_bytes());
        buf[18..20].copy_from_slice(&0b1010_1010u16.to_le_bytes());
        buf[20..28].copy_from_slice(&123_456_789u64.to_le_bytes());
        buf
    }

    #[test]
    fn parses_fields() {
        let buf = synthetic_footer(42);
        let footer = parse_footer(&buf).unwrap();
        assert_eq!(footer.frame_id, 42);
        assert_eq!(footer.trigger1_idx, 100);
        assert_eq!(footer.trigger2_idx, NO_EVENT);
        assert_eq!(footer.timestamp, 123_456_789);
        assert_eq!(footer.status_bits(), 0b1010_1010);
    }

    #[test]
    fn sentinel_index_is_invalid() {
        assert!(!Footer::is_valid_index(NO_EVENT, 8178));
        assert!(Footer::is_valid_index(100, 8178));
        assert!(!Footer::is_valid_index(8178, 8178));
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(parse_footer(&[0u8; 10]).is_err());
    }
}
