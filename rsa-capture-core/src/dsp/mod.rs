// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The streaming DSP pipeline: FIR filter design, a polyphase rational resampler, an
//! internal-heterodyne passband-to-baseband mixer, and an FM demodulator.
//!
//! Every stage here is a synchronous "consume one chunk, produce one chunk" operator. None of
//! them spawn threads or hold a runtime; the caller drives them one call at a time and is free to
//! run independent pipelines on independent threads.

pub mod demod;
pub mod fir;
pub mod mixer;
pub mod resampler;

pub use demod::FmDemodulator;
pub use fir::{default_anti_alias_taps, design_fir, BandEdges, FirFilter};
pub use mixer::{Mixer, PostProc};
pub use resampler::PolyphaseResampler;

use num_complex::Complex;

/// A sample type a resampler or mixer can carry: real (demodulated audio) or complex (IQ).
///
/// Delay lines and accumulators only ever need zero, scale-by-a-real-gain, and add, so rather
/// than requiring `num_traits::Float`-style bounds this crate defines the narrow surface the
/// pipeline actually uses and implements it for the two sample types in play.
pub trait Sample: Copy {
    fn zero() -> Self;
    fn scaled(self, gain: f64) -> Self;
    fn add(self, other: Self) -> Self;
}

impl Sample for f32 {
    fn zero() -> Self {
        0.0
    }

    fn scaled(self, gain: f64) -> Self {
        (self as f64 * gain) as f32
    }

    fn add(self, other: Self) -> Self {
        self + other
    }
}

impl Sample for Complex<f32> {
    fn zero() -> Self {
        Complex::new(0.0, 0.0)
    }

    fn scaled(self, gain: f64) -> Self {
        Complex::new((self.re as f64 * gain) as f32, (self.im as f64 * gain) as f32)
    }

    fn add(self, other: Self) -> Self {
        self + other
    }
}
