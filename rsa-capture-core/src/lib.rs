// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reader and streaming DSP pipeline for Tektronix RSA306-class IF capture files.
//!
//! [`reader`] decodes the `.r3f` and `.r3a`/`.r3h` capture formats into a lazy stream of ADC
//! samples, optionally paired with their per-frame footers. [`dsp`] turns that stream into
//! baseband IQ, demodulated audio, or a calibration-corrected spectrum via a chain of
//! chunk-stateful operators: a polyphase resampler, a Kaiser-window FIR designer, an
//! internal-heterodyne mixer, and an FM demodulator.
//!
//! Everything here is single-threaded and cooperative: each stage is a synchronous
//! "consume one chunk, produce one chunk" call, and there is no internal work queue or runtime.

pub mod dsp;
pub mod error;
pub mod footer;
pub mod header;
mod io;
pub mod reader;

pub use error::{CaptureError, Result};
pub use footer::Footer;
pub use header::Header;
pub use reader::{open, Block, FrameSource};
