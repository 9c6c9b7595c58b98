// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decodes the 16 KiB metadata block shared by `.r3f` and `.r3h` files into four value records:
//! [`VersionInfo`], [`InstrumentState`], [`DataFormat`], and [`ChannelCorrection`].
//!
//! All offsets below are fixed by the file format, not derived from any preceding field.

use crate::error::{header_error, Result};
use crate::io::{read_f32_table, ByteReader, ByteWriter};

/// Size, in bytes, of the header block at the start of every `.r3f`/`.r3h` file.
pub const HEADER_SIZE: usize = 16384;

/// Maximum number of rows in a channel correction table.
pub const TABLE_MAX_ENTRIES: u32 = 501;

/// Sentinel value for `DataFormat::data_type` that denotes 2 bytes per sample.
const DATA_TYPE_TWO_BYTE_SENTINEL: u32 = 161;

/// File and device identification, and the four version 4-tuples.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionInfo {
    pub file_id: String,
    pub endian_marker: u32,
    pub file_format_version: [u8; 4],
    pub api_version: [u8; 4],
    pub fx3_version: [u8; 4],
    pub fpga_version: [u8; 4],
    pub device_serial: String,
}

/// Instrument configuration at the time of capture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstrumentState {
    pub reference_level: f64,
    pub center_frequency: f64,
    pub temperature: f64,
    pub alignment: u32,
    pub freq_reference: u32,
    pub trig_mode: u32,
    pub trig_source: u32,
    pub trig_trans: u32,
    pub trig_level: f64,
}

/// A reference timestamp: year, month, day, hour, minute, second, subsecond.
pub type RefTime = [i32; 7];

/// Frame layout and sample-rate metadata.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataFormat {
    /// Bytes per ADC sample. The raw `161` sentinel is normalized to `2` on parse.
    pub data_type: u32,
    pub frame_offset: u32,
    pub frame_size: u32,
    pub sample_offset: u32,
    /// Samples per frame. Fixed at [`crate::reader::SAMPLES_PER_FRAME`] for R3F.
    pub sample_size: i32,
    pub non_sample_offset: u32,
    pub non_sample_size: u32,
    pub if_center_frequency: f64,
    pub sample_rate: f64,
    pub bandwidth: f64,
    pub corrected: u32,
    pub time_type: u32,
    pub ref_time: RefTime,
    pub clock_samples: u64,
    pub time_sample_rate: u64,
}

/// Per-channel amplitude/phase correction tables, plus ADC scale and path delay.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelCorrection {
    pub adc_scale: f64,
    pub path_delay: f64,
    pub correction_type: u32,
    pub table_entries: u32,
    /// Monotonic frequency axis, Hz. Same length as `amp_table` and `phase_table`.
    pub freq_table: Vec<f32>,
    /// Amplitude correction, dB.
    pub amp_table: Vec<f32>,
    /// Phase correction, degrees.
    pub phase_table: Vec<f32>,
}

/// The four records decoded from one 16 KiB header block.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub version_info: VersionInfo,
    pub instrument_state: InstrumentState,
    pub data_format: DataFormat,
    pub channel_correction: ChannelCorrection,
}

/// Parses a complete header from an exactly [`HEADER_SIZE`]-byte block.
pub fn parse_header(buf: &[u8]) -> Result<Header> {
    if buf.len() < HEADER_SIZE {
        return header_error("header buffer shorter than 16384 bytes");
    }

    Ok(Header {
        version_info: parse_version_info(buf)?,
        instrument_state: parse_instrument_state(buf)?,
        data_format: parse_data_format(buf)?,
        channel_correction: parse_channel_correction(buf)?,
    })
}

fn read_version_tuple(r: &mut ByteReader<'_>) -> Result<[u8; 4]> {
    let b = r.read_bytes(4)?;
    Ok([b[0], b[1], b[2], b[3]])
}

fn parse_version_info(buf: &[u8]) -> Result<VersionInfo> {
    let mut r = ByteReader::new(buf);

    r.seek(0);
    let file_id = r.read_ascii(27)?;

    r.seek(512);
    let endian_marker = r.read_u32()?;
    let file_format_version = read_version_tuple(&mut r)?;
    let api_version = read_version_tuple(&mut r)?;
    let fx3_version = read_version_tuple(&mut r)?;
    let fpga_version = read_version_tuple(&mut r)?;
    let device_serial = r.read_ascii(64)?;

    Ok(VersionInfo {
        file_id,
        endian_marker,
        file_format_version,
        api_version,
        fx3_version,
        fpga_version,
        device_serial,
    })
}

fn parse_instrument_state(buf: &[u8]) -> Result<InstrumentState> {
    let mut r = ByteReader::new(buf);
    r.seek(1024);

    Ok(InstrumentState {
        reference_level: r.read_f64()?,
        center_frequency: r.read_f64()?,
        temperature: r.read_f64()?,
        alignment: r.read_u32()?,
        freq_reference: r.read_u32()?,
        trig_mode: r.read_u32()?,
        trig_source: r.read_u32()?,
        trig_trans: r.read_u32()?,
        trig_level: r.read_f64()?,
    })
}

fn parse_data_format(buf: &[u8]) -> Result<DataFormat> {
    let mut r = ByteReader::new(buf);
    r.seek(2048);

    let mut data_type = r.read_u32()?;
    if data_type == DATA_TYPE_TWO_BYTE_SENTINEL {
        log::debug!("normalizing data_type sentinel {DATA_TYPE_TWO_BYTE_SENTINEL} to 2");
        data_type = 2;
    }

    let frame_offset = r.read_u32()?;
    let frame_size = r.read_u32()?;
    let sample_offset = r.read_u32()?;
    let sample_size = r.read_i32()?;
    let non_sample_offset = r.read_u32()?;
    let non_sample_size = r.read_u32()?;
    let if_center_frequency = r.read_f64()?;
    let sample_rate = r.read_f64()?;
    let bandwidth = r.read_f64()?;
    let corrected = r.read_u32()?;
    let time_type = r.read_u32()?;

    let mut ref_time: RefTime = [0; 7];
    for slot in ref_time.iter_mut() {
        *slot = r.read_i32()?;
    }

    let clock_samples = r.read_u64()?;
    let time_sample_rate = r.read_u64()?;

    if frame_size != 0 && sample_offset + (sample_size as u32) * 2 + non_sample_size != frame_size
    {
        return header_error("frame_size != sample_offset + sample_size*2 + non_sample_size");
    }

    Ok(DataFormat {
        data_type,
        frame_offset,
        frame_size,
        sample_offset,
        sample_size,
        non_sample_offset,
        non_sample_size,
        if_center_frequency,
        sample_rate,
        bandwidth,
        corrected,
        time_type,
        ref_time,
        clock_samples,
        time_sample_rate,
    })
}

fn parse_channel_correction(buf: &[u8]) -> Result<ChannelCorrection> {
    let mut r = ByteReader::new(buf);

    r.seek(3072);
    let adc_scale = r.read_f64()?;
    let path_delay = r.read_f64()?;

    r.seek(4096);
    let correction_type = r.read_u32()?;

    r.seek(4352);
    let table_entries = r.read_u32()?;

    if table_entries > TABLE_MAX_ENTRIES {
        return header_error("table_entries exceeds 501");
    }
    let n = table_entries as usize;

    let freq_index = 4356;
    let slab = TABLE_MAX_ENTRIES as usize * 4;
    let phase_index = freq_index + slab;
    let amp_index = phase_index + slab;

    let freq_slab = buf
        .get(freq_index..freq_index + slab)
        .ok_or(crate::error::CaptureError::MalformedHeader("short freq table"))?;
    let phase_slab = buf
        .get(phase_index..phase_index + slab)
        .ok_or(crate::error::CaptureError::MalformedHeader("short phase table"))?;
    let amp_slab = buf
        .get(amp_index..amp_index + n * 4)
        .ok_or(crate::error::CaptureError::MalformedHeader("short amp table"))?;

    let freq_table = read_f32_table(freq_slab, n)?;
    let phase_table = read_f32_table(phase_slab, n)?;
    let amp_table = read_f32_table(amp_slab, n)?;

    Ok(ChannelCorrection {
        adc_scale,
        path_delay,
        correction_type,
        table_entries,
        freq_table,
        amp_table,
        phase_table,
    })
}

fn encode_version_tuple(w: &mut ByteWriter<'_>, v: [u8; 4]) {
    w.write_bytes(&v);
}

fn encode_version_info(w: &mut ByteWriter<'_>, v: &VersionInfo) {
    w.seek(0);
    w.write_ascii(&v.file_id, 27);

    w.seek(512);
    w.write_u32(v.endian_marker);
    encode_version_tuple(w, v.file_format_version);
    encode_version_tuple(w, v.api_version);
    encode_version_tuple(w, v.fx3_version);
    encode_version_tuple(w, v.fpga_version);
    w.write_ascii(&v.device_serial, 64);
}

fn encode_instrument_state(w: &mut ByteWriter<'_>, s: &InstrumentState) {
    w.seek(1024);
    w.write_f64(s.reference_level);
    w.write_f64(s.center_frequency);
    w.write_f64(s.temperature);
    w.write_u32(s.alignment);
    w.write_u32(s.freq_reference);
    w.write_u32(s.trig_mode);
    w.write_u32(s.trig_source);
    w.write_u32(s.trig_trans);
    w.write_f64(s.trig_level);
}

fn encode_data_format(w: &mut ByteWriter<'_>, d: &DataFormat) {
    w.seek(2048);
    w.write_u32(d.data_type);
    w.write_u32(d.frame_offset);
    w.write_u32(d.frame_size);
    w.write_u32(d.sample_offset);
    w.write_i32(d.sample_size);
    w.write_u32(d.non_sample_offset);
    w.write_u32(d.non_sample_size);
    w.write_f64(d.if_center_frequency);
    w.write_f64(d.sample_rate);
    w.write_f64(d.bandwidth);
    w.write_u32(d.corrected);
    w.write_u32(d.time_type);
    for &v in &d.ref_time {
        w.write_i32(v);
    }
    w.write_u64(d.clock_samples);
    w.write_u64(d.time_sample_rate);
}

fn encode_channel_correction(w: &mut ByteWriter<'_>, c: &ChannelCorrection) {
    w.seek(3072);
    w.write_f64(c.adc_scale);
    w.write_f64(c.path_delay);

    w.seek(4096);
    w.write_u32(c.correction_type);

    w.seek(4352);
    w.write_u32(c.table_entries);

    let slab = TABLE_MAX_ENTRIES as usize * 4;
    let freq_index = 4356;
    let phase_index = freq_index + slab;
    let amp_index = phase_index + slab;

    w.seek(freq_index);
    for &f in &c.freq_table {
        w.write_f32(f);
    }
    w.seek(phase_index);
    for &p in &c.phase_table {
        w.write_f32(p);
    }
    w.seek(amp_index);
    for &a in &c.amp_table {
        w.write_f32(a);
    }
}

/// Re-encodes a parsed [`Header`] back into a [`HEADER_SIZE`]-byte block at the documented
/// offsets, the inverse of [`parse_header`] for every field that is a straight pass-through.
///
/// `data_type` is written as already normalized: the raw `161` sentinel recorded on disk by some
/// captures (see [`parse_data_format`]) is not recoverable once parsed, so a capture whose
/// on-disk `data_type` was the sentinel will not round-trip byte-for-byte at that one field.
pub fn encode_header(header: &Header) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_SIZE];
    {
        let mut w = ByteWriter::new(&mut buf);
        encode_version_info(&mut w, &header.version_info);
        encode_instrument_state(&mut w, &header.instrument_state);
        encode_data_format(&mut w, &header.data_format);
        encode_channel_correction(&mut w, &header.channel_correction);
    }
    buf
}

/// Synthetic header fixtures shared with other modules' tests (reader chunking tests need a
/// realistic on-disk header to open a capture against).
#[cfg(test)]
pub(crate) mod tests_support {
    pub fn synthetic_header_bytes() -> Vec<u8> {
        super::tests::synthetic_header()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn synthetic_header() -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];

        buf[0..7].copy_from_slice(b"RSA306\0");

        buf[512..516].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        buf[516..520].copy_from_slice(&[1, 2, 3, 4]);
        buf[520..524].copy_from_slice(&[5, 6, 7, 8]);
        buf[524..528].copy_from_slice(&[9, 10, 11, 12]);
        buf[528..532].copy_from_slice(&[13, 14, 15, 16]);
        buf[532..538].copy_from_slice(b"SN0001");

        buf[1024..1032].copy_from_slice(&(-10.0f64).to_le_bytes());
        buf[1032..1040].copy_from_slice(&(101.9e6f64).to_le_bytes());
        buf[1040..1048].copy_from_slice(&(25.0f64).to_le_bytes());
        buf[1068..1076].copy_from_slice(&(-30.0f64).to_le_bytes());

        buf[2048..2052].copy_from_slice(&161u32.to_le_bytes());
        buf[2052..2056].copy_from_slice(&16384u32.to_le_bytes());
        buf[2056..2060].copy_from_slice(&(28 + 8178 * 2 + 28u32).to_le_bytes());
        buf[2060..2064].copy_from_slice(&28u32.to_le_bytes());
        buf[2064..2068].copy_from_slice(&8178i32.to_le_bytes());
        buf[2068..2072].copy_from_slice(&(28 + 8178 * 2u32).to_le_bytes());
        buf[2072..2076].copy_from_slice(&28u32.to_le_bytes());
        buf[2076..2084].copy_from_slice(&(28e6f64).to_le_bytes());
        buf[2084..2092].copy_from_slice(&(112e6f64).to_le_bytes());
        buf[2144..2152].copy_from_slice(&112_000_000u64.to_le_bytes());

        buf[3072..3080].copy_from_slice(&(1.0 / 4096.0f64).to_le_bytes());

        buf[4352..4356].copy_from_slice(&3u32.to_le_bytes());
        let freq_index = 4356;
        let phase_index = freq_index + 501 * 4;
        let amp_index = phase_index + 501 * 4;
        for (i, f) in [10e6f32, 20e6f32, 30e6f32].iter().enumerate() {
            buf[freq_index + i * 4..freq_index + i * 4 + 4].copy_from_slice(&f.to_le_bytes());
        }
        for (i, a) in [0.1f32, 0.2f32, 0.3f32].iter().enumerate() {
            buf[amp_index + i * 4..amp_index + i * 4 + 4].copy_from_slice(&a.to_le_bytes());
        }
        for (i, p) in [1.0f32, 2.0f32, 3.0f32].iter().enumerate() {
            buf[phase_index + i * 4..phase_index + i * 4 + 4].copy_from_slice(&p.to_le_bytes());
        }

        buf
    }

    #[test]
    fn parses_data_type_sentinel() {
        let buf = synthetic_header();
        let header = parse_header(&buf).unwrap();
        assert_eq!(header.data_format.data_type, 2);
    }

    #[test]
    fn parses_version_info_strings() {
        let buf = synthetic_header();
        let header = parse_header(&buf).unwrap();
        assert_eq!(header.version_info.file_id, "RSA306");
        assert_eq!(header.version_info.device_serial, "SN0001");
        assert_eq!(header.version_info.file_format_version, [1, 2, 3, 4]);
    }

    #[test]
    fn parses_correction_tables_with_matching_lengths() {
        let buf = synthetic_header();
        let header = parse_header(&buf).unwrap();
        let cc = &header.channel_correction;
        assert_eq!(cc.table_entries, 3);
        assert_eq!(cc.freq_table, vec![10e6, 20e6, 30e6]);
        assert_eq!(cc.amp_table, vec![0.1, 0.2, 0.3]);
        assert_eq!(cc.phase_table, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn rejects_oversized_table_entries() {
        let mut buf = synthetic_header();
        buf[4352..4356].copy_from_slice(&502u32.to_le_bytes());
        assert!(parse_header(&buf).is_err());
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = vec![0u8; 100];
        assert!(parse_header(&buf).is_err());
    }

    #[test]
    fn rejects_frame_size_mismatch() {
        let mut buf = synthetic_header();
        buf[2056..2060].copy_from_slice(&99999u32.to_le_bytes());
        assert!(parse_header(&buf).is_err());
    }

    #[test]
    fn encode_round_trips_to_original_bytes_except_normalized_data_type() {
        let original = synthetic_header();
        let header = parse_header(&original).unwrap();
        let encoded = encode_header(&header);

        // data_type was normalized from the 161 sentinel to 2 on parse, so that one field does
        // not round-trip byte-for-byte; every other field does.
        let mut expected = original.clone();
        expected[2048..2052].copy_from_slice(&2u32.to_le_bytes());
        assert_eq!(encoded, expected);

        assert_eq!(parse_header(&encoded).unwrap(), header);
    }
}
