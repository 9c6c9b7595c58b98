// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reader for `.r3f` files: a single file holding the 16 KiB header followed by fixed-size
//! frames, each frame pairing a run of ADC samples with a 28-byte footer.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{config_error, frame_error, io_or_frame_error, io_or_header_error, CaptureError, Result};
use crate::footer::{parse_footer, Footer, FOOTER_SIZE};
use crate::header::{parse_header, Header, HEADER_SIZE};
use crate::reader::{Block, FrameSource, Reslicer, SAMPLES_PER_FRAME};

/// Reads a `.r3f` capture: the 16 KiB header followed by `N` frames of `frame_size` bytes each.
///
/// The first frame on disk is an instrument calibration frame and is always skipped; it carries
/// no ADC samples of interest to a consumer.
pub struct R3fReader {
    file: BufReader<File>,
    header: Header,
    frame_offset: u64,
    frame_size: u64,
    sample_offset: usize,
    sample_size: usize,
    non_sample_offset: usize,
    num_frames: u64,
}

impl R3fReader {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| CaptureError::Io { pos: 0, source: e })?;
        let file_len = file
            .metadata()
            .map_err(|e| CaptureError::Io { pos: 0, source: e })?
            .len();

        let mut file = BufReader::new(file);
        let mut header_buf = vec![0u8; HEADER_SIZE];
        if let Err(e) = file.read_exact(&mut header_buf) {
            return io_or_header_error(0, e);
        }
        let header = parse_header(&header_buf)?;

        let frame_offset = header.data_format.frame_offset as u64;
        let frame_size = header.data_format.frame_size as u64;
        if frame_size == 0 {
            return frame_error("frame_size is zero");
        }

        let sample_offset = header.data_format.sample_offset as usize;
        let sample_size = header.data_format.sample_size as usize;
        let non_sample_offset = sample_offset + sample_size * 2;

        let total_frames = (file_len.saturating_sub(frame_offset)) / frame_size;
        let num_frames = total_frames.saturating_sub(1);
        log::debug!(
            "opened r3f capture: {num_frames} payload frames of {frame_size} bytes, sample_rate={} Hz",
            header.data_format.sample_rate
        );

        Ok(R3fReader {
            file,
            header,
            frame_offset,
            frame_size,
            sample_offset,
            sample_size,
            non_sample_offset,
            num_frames,
        })
    }

    fn frame_position(&self, index: u64) -> u64 {
        self.frame_offset + (index + 1) * self.frame_size
    }

    /// Reads native frame `index` (0-based, after the skipped calibration frame).
    fn read_frame(&mut self, index: u64) -> Result<(Vec<i16>, Footer)> {
        let pos = self.frame_position(index);
        self.file
            .seek(SeekFrom::Start(pos))
            .map_err(|e| CaptureError::Io { pos, source: e })?;

        let mut buf = vec![0u8; self.frame_size as usize];
        if let Err(e) = self.file.read_exact(&mut buf) {
            return io_or_frame_error(pos, e);
        }

        let sample_bytes = &buf[self.sample_offset..self.sample_offset + self.sample_size * 2];
        let samples = sample_bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();

        let footer_bytes = &buf[self.non_sample_offset..self.non_sample_offset + FOOTER_SIZE];
        let footer = parse_footer(footer_bytes)?;

        Ok((samples, footer))
    }
}

impl FrameSource for R3fReader {
    fn header(&self) -> &Header {
        &self.header
    }

    fn read_all(&mut self) -> Result<Vec<i16>> {
        let mut out = Vec::with_capacity(self.num_frames as usize * self.sample_size);
        for i in 0..self.num_frames {
            let (samples, _) = self.read_frame(i)?;
            out.extend(samples);
        }
        Ok(out)
    }

    fn read_blocks<'a>(
        &'a mut self,
        samples_per_block: usize,
        short_allowed: bool,
        with_metadata: bool,
    ) -> Result<Box<dyn Iterator<Item = Result<Block>> + 'a>> {
        if samples_per_block == 0 {
            return config_error("samples_per_block must be greater than zero");
        }

        if with_metadata {
            if samples_per_block % SAMPLES_PER_FRAME != 0 {
                return config_error(
                    "with_metadata requires samples_per_block to be a multiple of the native frame size",
                );
            }
            let frames_per_block = samples_per_block / SAMPLES_PER_FRAME;
            Ok(Box::new(MetaBlocks {
                reader: self,
                next_frame: 0,
                frames_per_block: frames_per_block as u64,
                short_allowed,
                done: false,
            }))
        }
        else {
            Ok(Box::new(PlainBlocks {
                reader: self,
                next_frame: 0,
                block_size: samples_per_block,
                short_allowed,
                ready: VecDeque::new(),
                reslicer: Reslicer::new(),
                finished: false,
            }))
        }
    }
}

struct PlainBlocks<'a> {
    reader: &'a mut R3fReader,
    next_frame: u64,
    block_size: usize,
    short_allowed: bool,
    ready: VecDeque<Vec<i16>>,
    reslicer: Reslicer,
    finished: bool,
}

impl<'a> Iterator for PlainBlocks<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(block) = self.ready.pop_front() {
                return Some(Ok(Block::Samples(block)));
            }
            if self.finished {
                return None;
            }
            if self.next_frame >= self.reader.num_frames {
                self.finished = true;
                if let Some(tail) = self.reslicer.finish(self.short_allowed) {
                    log::debug!("r3f reader: yielding short trailing block of {} samples", tail.len());
                    return Some(Ok(Block::Samples(tail)));
                }
                return None;
            }

            let (samples, _) = match self.reader.read_frame(self.next_frame) {
                Ok(v) => v,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            };
            self.next_frame += 1;

            let mut drained = Vec::new();
            self.reslicer.push(&samples, self.block_size, &mut drained);
            self.ready.extend(drained);
        }
    }
}

struct MetaBlocks<'a> {
    reader: &'a mut R3fReader,
    next_frame: u64,
    frames_per_block: u64,
    short_allowed: bool,
    done: bool,
}

impl<'a> Iterator for MetaBlocks<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let remaining = self.reader.num_frames.saturating_sub(self.next_frame);
        if remaining == 0 {
            self.done = true;
            return None;
        }

        let take = if remaining >= self.frames_per_block {
            self.frames_per_block
        }
        else if self.short_allowed {
            remaining
        }
        else {
            self.done = true;
            return None;
        };

        let mut samples = Vec::new();
        let mut footers = Vec::with_capacity(take as usize);
        for _ in 0..take {
            match self.reader.read_frame(self.next_frame) {
                Ok((s, f)) => {
                    samples.extend(s);
                    footers.push(f);
                    self.next_frame += 1;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        Some(Ok(Block::WithFooters(samples, footers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_synthetic_capture(path: &Path, num_payload_frames: usize) {
        let header_buf = crate::header::tests_support::synthetic_header_bytes();
        let sample_offset = 28usize;
        let sample_size = 8178usize;
        let frame_size = sample_offset + sample_size * 2 + FOOTER_SIZE;

        let mut f = File::create(path).unwrap();
        f.write_all(&header_buf).unwrap();

        // Frame 0 is the skipped calibration frame; write `num_payload_frames` more after it.
        for frame_idx in 0..(num_payload_frames + 1) {
            let mut frame = vec![0u8; frame_size];
            for (i, slot) in frame[sample_offset..sample_offset + sample_size * 2]
                .chunks_exact_mut(2)
                .enumerate()
            {
                let v = (frame_idx * 1000 + i) as i16;
                slot.copy_from_slice(&v.to_le_bytes());
            }
            let footer_start = sample_offset + sample_size * 2;
            frame[footer_start + 8..footer_start + 12]
                .copy_from_slice(&(frame_idx as u32).to_le_bytes());
            f.write_all(&frame).unwrap();
        }
    }

    #[test]
    fn skips_calibration_frame_and_counts_frames() {
        let dir = std::env::temp_dir().join("rsa_capture_test_r3f_count");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.r3f");
        write_synthetic_capture(&path, 3);

        let reader = R3fReader::open(&path).unwrap();
        assert_eq!(reader.num_frames, 3);
    }

    #[test]
    fn read_all_concatenates_payload_frames_only() {
        let dir = std::env::temp_dir().join("rsa_capture_test_r3f_all");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.r3f");
        write_synthetic_capture(&path, 2);

        let mut reader = R3fReader::open(&path).unwrap();
        let all = reader.read_all().unwrap();
        assert_eq!(all.len(), 2 * 8178);
        // First payload frame (native index 0, on-disk frame 1) starts at value 1000.
        assert_eq!(all[0], 1000);
    }

    #[test]
    fn with_metadata_requires_multiple_of_native_frame_size() {
        let dir = std::env::temp_dir().join("rsa_capture_test_r3f_meta_cfg");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.r3f");
        write_synthetic_capture(&path, 1);

        let mut reader = R3fReader::open(&path).unwrap();
        assert!(reader.read_blocks(100, true, true).is_err());
    }

    #[test]
    fn with_metadata_binds_footers_to_samples() {
        let dir = std::env::temp_dir().join("rsa_capture_test_r3f_meta_ok");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.r3f");
        write_synthetic_capture(&path, 2);

        let mut reader = R3fReader::open(&path).unwrap();
        let blocks: Vec<_> = reader
            .read_blocks(8178, true, true)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            Block::WithFooters(samples, footers) => {
                assert_eq!(samples.len(), 8178);
                assert_eq!(footers.len(), 1);
                assert_eq!(footers[0].frame_id, 1);
            }
            _ => panic!("expected WithFooters"),
        }
    }

    #[test]
    fn without_metadata_reslices_across_frame_boundaries() {
        let dir = std::env::temp_dir().join("rsa_capture_test_r3f_reslice");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.r3f");
        write_synthetic_capture(&path, 2);

        let mut reader = R3fReader::open(&path).unwrap();
        let blocks: Vec<_> = reader
            .read_blocks(5000, true, false)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let total: usize = blocks.iter().map(|b| b.samples().len()).sum();
        assert_eq!(total, 2 * 8178);
        assert_eq!(blocks[0].samples().len(), 5000);
    }
}
