// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Opens `.r3f` and `.r3a`/`.r3h` captures and streams their ADC samples.
//!
//! The reader is a small interface — [`FrameSource`] — implemented by two concrete structs,
//! [`r3f::R3fReader`] and [`r3a::R3aReader`], rather than a base/subclass hierarchy. [`open`]
//! dispatches on the path's extension and returns a boxed trait object.

mod r3a;
mod r3f;

pub use r3a::R3aReader;
pub use r3f::R3fReader;

use std::path::Path;

use crate::error::{CaptureError, Result};
use crate::footer::Footer;
use crate::header::Header;

/// Native frame payload size for the R3F codec: samples per frame.
pub const SAMPLES_PER_FRAME: usize = 8178;

/// One emitted unit of work from [`FrameSource::read_blocks`].
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    /// A re-sliced run of ADC samples with no footer binding.
    Samples(Vec<i16>),
    /// One or more native R3F frames' worth of samples, each paired with its footer in order.
    WithFooters(Vec<i16>, Vec<Footer>),
}

impl Block {
    /// Borrows the ADC samples regardless of which variant this is.
    pub fn samples(&self) -> &[i16] {
        match self {
            Block::Samples(s) => s,
            Block::WithFooters(s, _) => s,
        }
    }
}

/// Common interface implemented by every concrete capture reader.
///
/// `read_blocks` returns a lazy, boxed iterator: dropping it closes the underlying file, per the
/// `Open -> Streaming -> Closed` state machine in the capture format's design (closed on EOF, a
/// fatal error, or consumer drop).
pub trait FrameSource {
    /// The four decoded header records for this capture.
    fn header(&self) -> &Header;

    /// Reads every ADC sample in the capture into one contiguous sequence.
    fn read_all(&mut self) -> Result<Vec<i16>>;

    /// Returns a lazy sequence of [`Block`]s of `samples_per_block` samples each.
    ///
    /// `with_metadata` requests a [`Block::WithFooters`] stream; it is only supported by R3F
    /// captures and only when `samples_per_block` is a multiple of [`SAMPLES_PER_FRAME`].
    fn read_blocks<'a>(
        &'a mut self,
        samples_per_block: usize,
        short_allowed: bool,
        with_metadata: bool,
    ) -> Result<Box<dyn Iterator<Item = Result<Block>> + 'a>>;
}

/// Opens a capture, dispatching on the path's extension.
///
/// `.r3f` opens a combined header+frame file. `.r3a`/`.r3h` opens a raw-sample file with its
/// sibling header file (whichever of the pair is named, the other is derived by swapping the
/// last extension character).
pub fn open(path: impl AsRef<Path>) -> Result<Box<dyn FrameSource>> {
    let path = path.as_ref();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        "r3f" => Ok(Box::new(R3fReader::open(path)?)),
        "r3a" | "r3h" => Ok(Box::new(R3aReader::open(path)?)),
        _ => Err(CaptureError::InvalidExtension),
    }
}

/// Re-slices a run of concatenated native reads into fixed-size blocks, carrying any surplus
/// samples over to the next call. Used by [`r3f::R3fReader`]'s metadata-free `PlainBlocks` path,
/// which decodes one native frame's worth of samples at a time and re-chunks them to the
/// caller's requested block size. R3A's raw stream has no native framing to decode around, so it
/// reads fixed-size byte chunks directly instead of going through this type.
pub(crate) struct Reslicer {
    leftover: Vec<i16>,
}

impl Reslicer {
    pub fn new() -> Self {
        Reslicer { leftover: Vec::new() }
    }

    /// Appends freshly read samples and drains as many `block_size`-sized blocks as are ready.
    pub fn push(&mut self, fresh: &[i16], block_size: usize, out: &mut Vec<Vec<i16>>) {
        self.leftover.extend_from_slice(fresh);

        let mut start = 0;
        while self.leftover.len() - start >= block_size {
            out.push(self.leftover[start..start + block_size].to_vec());
            start += block_size;
        }
        self.leftover.drain(0..start);
    }

    /// Called once at end of stream. Returns the final short block if `short_allowed` and any
    /// samples remain.
    pub fn finish(&mut self, short_allowed: bool) -> Option<Vec<i16>> {
        if short_allowed && !self.leftover.is_empty() {
            Some(std::mem::take(&mut self.leftover))
        }
        else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reslicer_reassembles_exact_multiples() {
        let mut r = Reslicer::new();
        let mut out = Vec::new();
        r.push(&[1, 2, 3, 4, 5], 2, &mut out);
        assert_eq!(out, vec![vec![1, 2], vec![3, 4]]);
        assert_eq!(r.leftover, vec![5]);
    }

    #[test]
    fn reslicer_finish_short_allowed() {
        let mut r = Reslicer::new();
        let mut out = Vec::new();
        r.push(&[1, 2, 3], 2, &mut out);
        assert_eq!(out, vec![vec![1, 2]]);
        assert_eq!(r.finish(true), Some(vec![3]));
    }

    #[test]
    fn reslicer_finish_short_disallowed() {
        let mut r = Reslicer::new();
        let mut out = Vec::new();
        r.push(&[1, 2, 3], 2, &mut out);
        assert_eq!(r.finish(false), None);
    }
}
