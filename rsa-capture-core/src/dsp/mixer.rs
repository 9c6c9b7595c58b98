// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Internal-heterodyne passband-to-baseband converter: mixes a real IF-band chunk down to
//! complex baseband and feeds the result into exactly one post-processor.

use num_complex::Complex;

use crate::dsp::fir::FirFilter;
use crate::dsp::resampler::PolyphaseResampler;
use crate::error::{config_error, Result};

/// The post-processing stage a [`Mixer`] feeds its mixed baseband chunk into. Construction
/// enforces "exactly one of filter or resampler" through the type itself rather than a runtime
/// check on two optional fields.
pub enum PostProc {
    Filter(FirFilter<Complex<f32>>),
    Resampler(PolyphaseResampler<Complex<f32>>),
}

impl PostProc {
    fn process(&mut self, chunk: &[Complex<f32>]) -> Result<Vec<Complex<f32>>> {
        match self {
            PostProc::Filter(f) => Ok(f.process(chunk)),
            PostProc::Resampler(r) => r.process(chunk),
        }
    }
}

/// Mixes a chunk of `N` real samples down to baseband at heterodyne frequency `fh`, maintaining
/// phase continuity across calls, then hands the mixed chunk to `post`.
pub struct Mixer {
    chunk_size: usize,
    sample_rate: f64,
    heterodyne_freq: f64,
    lo_table: Vec<Complex<f32>>,
    phase_accum: f64,
    post: PostProc,
}

impl Mixer {
    /// `initial_phase` is φ₀, the fixed phase offset folded into the precomputed local
    /// oscillator table. The per-chunk accumulated phase Δ starts at zero and grows by
    /// `ωh·N/Fs` (mod 2π) after every call.
    pub fn new(
        chunk_size: usize,
        sample_rate: f64,
        heterodyne_freq: f64,
        initial_phase: f64,
        post: PostProc,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return config_error("mixer chunk_size must be greater than zero");
        }

        let omega = 2.0 * std::f64::consts::PI * heterodyne_freq;
        let lo_table = (0..chunk_size)
            .map(|n| {
                let theta = omega * n as f64 / sample_rate + initial_phase;
                Complex::new(theta.cos() as f32, theta.sin() as f32)
            })
            .collect();

        Ok(Mixer { chunk_size, sample_rate, heterodyne_freq, lo_table, phase_accum: 0.0, post })
    }

    /// Mixes `input` (length `chunk_size`, real IF samples) to baseband and returns the
    /// post-processor's output view for this call.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<Complex<f32>>> {
        if input.len() != self.chunk_size {
            return config_error("mixer input length does not match the configured chunk_size");
        }

        let delta = self.phase_accum;
        let (dc, ds) = (delta.cos() as f32, delta.sin() as f32);
        let continuation = Complex::new(dc, ds);

        let mixed: Vec<Complex<f32>> = input
            .iter()
            .zip(self.lo_table.iter())
            .map(|(&x, &lo)| lo * continuation * x)
            .collect();

        let two_pi = 2.0 * std::f64::consts::PI;
        let omega = two_pi * self.heterodyne_freq;
        self.phase_accum =
            (self.phase_accum + omega * self.chunk_size as f64 / self.sample_rate).rem_euclid(two_pi);

        self.post.process(&mixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_chunk_size() {
        let filter = FirFilter::<Complex<f32>>::new(vec![1.0]);
        let mut mixer = Mixer::new(4, 1e6, 1e3, 0.0, PostProc::Filter(filter)).unwrap();
        assert!(mixer.process(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn phase_continuation_matches_closed_form_at_chunk_boundaries() {
        let filter = FirFilter::<Complex<f32>>::new(vec![1.0]);
        let mut mixer = Mixer::new(8, 1e6, 50e3, 0.0, PostProc::Filter(filter)).unwrap();

        let input = vec![1.0f32; 8];
        mixer.process(&input).unwrap();

        let expected_delta =
            (2.0 * std::f64::consts::PI * 50e3 * 8.0 / 1e6).rem_euclid(2.0 * std::f64::consts::PI);
        assert!((mixer.phase_accum - expected_delta).abs() < 1e-9);
    }

    #[test]
    fn unity_filter_preserves_mixed_dc_amplitude() {
        let filter = FirFilter::<Complex<f32>>::new(vec![1.0]);
        // Zero heterodyne frequency: the mixer degenerates to a pure real-to-complex cast.
        let mut mixer = Mixer::new(4, 1e6, 0.0, 0.0, PostProc::Filter(filter)).unwrap();
        let out = mixer.process(&[2.0, 2.0, 2.0, 2.0]).unwrap();
        for sample in out {
            assert!((sample.re - 2.0).abs() < 1e-5);
            assert!(sample.im.abs() < 1e-5);
        }
    }
}
