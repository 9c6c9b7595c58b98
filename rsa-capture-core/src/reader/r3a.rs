// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reader for the `.r3a`/`.r3h` pair: a flat stream of raw ADC samples (`.r3a`) alongside a
//! header-only sibling (`.r3h`) carrying the same 16 KiB metadata block as an `.r3f` file.
//!
//! There is no per-sample framing or footer in this format, so metadata-bound blocks are not
//! available: requesting them is a fatal configuration error.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{config_error, io_or_header_error, CaptureError, Result};
use crate::header::{parse_header, Header, HEADER_SIZE};
use crate::reader::{Block, FrameSource};

pub struct R3aReader {
    samples: BufReader<File>,
    header: Header,
}

/// Derives the sibling path for a `.r3a`/`.r3h` pair by swapping the last extension character.
fn sibling_path(path: &Path, want_ext: &str) -> PathBuf {
    path.with_extension(want_ext)
}

impl R3aReader {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(OsStr::to_str).unwrap_or("");

        let (samples_path, header_path) = match ext {
            "r3a" => (path.to_path_buf(), sibling_path(path, "r3h")),
            "r3h" => (sibling_path(path, "r3a"), path.to_path_buf()),
            _ => return Err(CaptureError::InvalidExtension),
        };

        if !header_path.exists() {
            return Err(CaptureError::MissingSibling(header_path.display().to_string()));
        }
        if !samples_path.exists() {
            return Err(CaptureError::MissingSibling(samples_path.display().to_string()));
        }

        let mut header_file =
            File::open(&header_path).map_err(|e| CaptureError::Io { pos: 0, source: e })?;
        let mut header_buf = vec![0u8; HEADER_SIZE];
        if let Err(e) = header_file.read_exact(&mut header_buf) {
            return io_or_header_error(0, e);
        }
        let header = parse_header(&header_buf)?;

        let samples_file =
            File::open(&samples_path).map_err(|e| CaptureError::Io { pos: 0, source: e })?;

        log::debug!(
            "opened r3a pair: samples={}, header={}",
            samples_path.display(),
            header_path.display()
        );

        Ok(R3aReader { samples: BufReader::new(samples_file), header })
    }
}

impl FrameSource for R3aReader {
    fn header(&self) -> &Header {
        &self.header
    }

    fn read_all(&mut self) -> Result<Vec<i16>> {
        let mut bytes = Vec::new();
        self.samples
            .read_to_end(&mut bytes)
            .map_err(|e| CaptureError::Io { pos: 0, source: e })?;
        Ok(bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    fn read_blocks<'a>(
        &'a mut self,
        samples_per_block: usize,
        short_allowed: bool,
        with_metadata: bool,
    ) -> Result<Box<dyn Iterator<Item = Result<Block>> + 'a>> {
        if with_metadata {
            return config_error("R3A captures carry no per-sample footer; with_metadata must be false");
        }
        if samples_per_block == 0 {
            return config_error("samples_per_block must be greater than zero");
        }

        Ok(Box::new(RawBlocks {
            samples: &mut self.samples,
            block_size: samples_per_block,
            short_allowed,
            done: false,
        }))
    }
}

struct RawBlocks<'a> {
    samples: &'a mut BufReader<File>,
    block_size: usize,
    short_allowed: bool,
    done: bool,
}

impl<'a> Iterator for RawBlocks<'a> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut byte_buf = vec![0u8; self.block_size * 2];
        let mut filled = 0;
        loop {
            match self.samples.read(&mut byte_buf[filled..]) {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    if filled == byte_buf.len() {
                        break;
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(CaptureError::Io { pos: 0, source: e }));
                }
            }
        }

        if filled == byte_buf.len() {
            let samples = byte_buf
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect();
            return Some(Ok(Block::Samples(samples)));
        }

        self.done = true;
        if filled == 0 || !self.short_allowed {
            return None;
        }
        if filled % 2 != 0 {
            return Some(Err(CaptureError::MalformedFrame(
                "trailing odd byte in raw sample stream",
            )));
        }

        let samples = byte_buf[..filled]
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        Some(Ok(Block::Samples(samples)))
    }
}
