// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kaiser-window FIR synthesis for low-/high-/band-pass/-stop filters, with optional
//! antisymmetric (Type III/IV) designs via frequency-domain sampling.

use std::collections::VecDeque;

use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::dsp::Sample;
use crate::error::{domain_error, Result};

/// Band edge(s) for the FIR designer: either a single transition (low-/high-pass) or a pair of
/// transitions bracketing a passband/stopband (band-pass/-stop).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BandEdges {
    Single(f64),
    Pair(f64, f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BandType {
    LowPass,
    HighPass,
    BandPass,
    BandStop,
}

fn infer_band_type(fp: BandEdges, fs: BandEdges) -> Result<BandType> {
    match (fp, fs) {
        (BandEdges::Single(fp), BandEdges::Single(fs)) => {
            Ok(if fs > fp { BandType::LowPass } else { BandType::HighPass })
        }
        (BandEdges::Pair(fp0, _), BandEdges::Pair(fs0, _)) => {
            Ok(if fs0 < fp0 { BandType::BandPass } else { BandType::BandStop })
        }
        _ => domain_error("fp and fs must both be scalar or both be a pair"),
    }
}

/// Zeroth-order modified Bessel function of the first kind, via its power series.
fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half_x_sq = (x / 2.0) * (x / 2.0);
    for k in 1..=32 {
        term *= half_x_sq / (k as f64 * k as f64);
        sum += term;
        if term < sum * 1e-16 {
            break;
        }
    }
    sum
}

/// Kaiser window shape parameter from the desired stopband attenuation, in dB.
fn kaiser_beta(ripple_db: f64) -> f64 {
    if ripple_db > 50.0 {
        0.1102 * (ripple_db - 8.7)
    }
    else if ripple_db >= 21.0 {
        0.5842 * (ripple_db - 21.0).powf(0.4) + 0.07886 * (ripple_db - 21.0)
    }
    else {
        0.0
    }
}

fn kaiser_window(length: usize, beta: f64) -> Vec<f64> {
    if length == 1 {
        return vec![1.0];
    }
    let m = (length - 1) as f64;
    let denom = bessel_i0(beta);
    (0..length)
        .map(|n| {
            let r = (2.0 * n as f64 / m - 1.0).clamp(-1.0, 1.0);
            bessel_i0(beta * (1.0 - r * r).sqrt()) / denom
        })
        .collect()
}

/// Smaller of the two transition widths bracketing the passband; used by the Kaiser order
/// formula to size the filter. For a pair of edges this also resolves the degenerate band-stop
/// transition-width formula seen in some implementations by taking each side's transition as
/// the absolute distance between its matching passband and stopband edge.
fn transition_width(fp: BandEdges, fs: BandEdges) -> f64 {
    match (fp, fs) {
        (BandEdges::Single(fp), BandEdges::Single(fs)) => (fs - fp).abs(),
        (BandEdges::Pair(fp0, fp1), BandEdges::Pair(fs0, fs1)) => {
            let left = (fp0 - fs0).abs();
            let right = (fp1 - fs1).abs();
            left.min(right)
        }
    }
}

fn filter_length(ripple_db: f64, delta_f: f64, sample_rate: f64, odd_length: bool) -> usize {
    let delta_omega = 2.0 * std::f64::consts::PI * delta_f / sample_rate;
    let n = ((ripple_db - 7.95) / (2.285 * delta_omega)).ceil().max(1.0) as usize;
    if odd_length && n % 2 == 0 {
        n + 1
    }
    else {
        n
    }
}

fn validate_edges(fp: BandEdges, fs: BandEdges, sample_rate: f64) -> Result<()> {
    let nyquist = sample_rate / 2.0;
    let edges: Vec<f64> = match (fp, fs) {
        (BandEdges::Single(a), BandEdges::Single(b)) => vec![a, b],
        (BandEdges::Pair(a0, a1), BandEdges::Pair(b0, b1)) => vec![a0, a1, b0, b1],
        _ => return domain_error("fp and fs must both be scalar or both be a pair"),
    };
    for e in edges {
        if !(0.0..=nyquist).contains(&e) {
            return domain_error("band edge outside [0, Fs/2]");
        }
    }
    if transition_width(fp, fs) <= 0.0 {
        return domain_error("degenerate transition band (fp == fs)");
    }
    Ok(())
}

fn ideal_lowpass(n: usize, m: f64, fc_norm: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64 - m;
            if t == 0.0 {
                2.0 * fc_norm
            }
            else {
                (2.0 * std::f64::consts::PI * fc_norm * t).sin() / (std::f64::consts::PI * t)
            }
        })
        .collect()
}

fn symmetric_response(btype: BandType, fp: BandEdges, fs: BandEdges, sample_rate: f64, n: usize) -> Vec<f64> {
    let m = (n - 1) as f64 / 2.0;

    let cutoff = |a: f64, b: f64| (a + b) / 2.0 / sample_rate;

    match (btype, fp, fs) {
        (BandType::LowPass, BandEdges::Single(fp), BandEdges::Single(fs)) => {
            ideal_lowpass(n, m, cutoff(fp, fs))
        }
        (BandType::HighPass, BandEdges::Single(fp), BandEdges::Single(fs)) => {
            let lp = ideal_lowpass(n, m, cutoff(fp, fs));
            spectral_invert(&lp, n, m)
        }
        (BandType::BandPass, BandEdges::Pair(fp0, fp1), BandEdges::Pair(fs0, fs1)) => {
            let lo = ideal_lowpass(n, m, cutoff(fp0, fs0));
            let hi = ideal_lowpass(n, m, cutoff(fp1, fs1));
            hi.iter().zip(lo.iter()).map(|(h, l)| h - l).collect()
        }
        (BandType::BandStop, BandEdges::Pair(fp0, fp1), BandEdges::Pair(fs0, fs1)) => {
            let lo = ideal_lowpass(n, m, cutoff(fp0, fs0));
            let hi = ideal_lowpass(n, m, cutoff(fp1, fs1));
            let bp: Vec<f64> = hi.iter().zip(lo.iter()).map(|(h, l)| h - l).collect();
            spectral_invert(&bp, n, m)
        }
        _ => unreachable!("band type and edge shape are always matched by infer_band_type"),
    }
}

fn spectral_invert(h: &[f64], n: usize, m: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let allpass = if (i as f64 - m).abs() < 1e-9 { 1.0 } else { 0.0 };
            allpass - h[i]
        })
        .collect()
}

/// Piecewise-linear magnitude knots used by the frequency-sampling (antisymmetric) branch.
fn antisymmetric_template(btype: BandType, fp: BandEdges, fs: BandEdges, sample_rate: f64) -> (Vec<f64>, Vec<f64>) {
    let nyquist = sample_rate / 2.0;
    match (btype, fp, fs) {
        (BandType::LowPass, BandEdges::Single(fp), BandEdges::Single(fs)) => {
            (vec![0.0, fp, fs, nyquist], vec![1.0, 1.0, 0.0, 0.0])
        }
        (BandType::HighPass, BandEdges::Single(fp), BandEdges::Single(fs)) => {
            (vec![0.0, fs, fp, nyquist], vec![0.0, 0.0, 1.0, 1.0])
        }
        (BandType::BandPass, BandEdges::Pair(fp0, fp1), BandEdges::Pair(fs0, fs1)) => {
            (vec![0.0, fs0, fp0, fp1, fs1, nyquist], vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0])
        }
        (BandType::BandStop, BandEdges::Pair(fp0, fp1), BandEdges::Pair(fs0, fs1)) => {
            (vec![0.0, fp0, fs0, fs1, fp1, nyquist], vec![1.0, 1.0, 0.0, 0.0, 1.0, 1.0])
        }
        _ => unreachable!("band type and edge shape are always matched by infer_band_type"),
    }
}

fn interp_linear(knots_x: &[f64], knots_y: &[f64], x: f64) -> f64 {
    if x <= knots_x[0] {
        return knots_y[0];
    }
    for w in knots_x.windows(2).zip(knots_y.windows(2)) {
        let ((x0, x1), (y0, y1)) = ((w.0[0], w.0[1]), (w.1[0], w.1[1]));
        if x >= x0 && x <= x1 {
            if (x1 - x0).abs() < 1e-12 {
                return y1;
            }
            let t = (x - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    *knots_y.last().unwrap()
}

/// Builds a Type III/IV impulse response by sampling the piecewise-linear magnitude template at
/// 512 points across `[0, Fs/2]`, mirroring it into a purely-imaginary odd spectrum, and
/// inverse-transforming it. The central `n` samples are windowed with the same Kaiser window
/// used by the symmetric branch to control ripple in the truncation.
fn antisymmetric_response(
    btype: BandType,
    fp: BandEdges,
    fs: BandEdges,
    sample_rate: f64,
    n: usize,
    beta: f64,
) -> Vec<f64> {
    const K: usize = 512;
    let (knots_x, knots_y) = antisymmetric_template(btype, fp, fs, sample_rate);

    let nyquist = sample_rate / 2.0;
    let mag: Vec<f64> = (0..K)
        .map(|k| {
            let f = k as f64 * nyquist / (K - 1) as f64;
            interp_linear(&knots_x, &knots_y, f)
        })
        .collect();

    let total = 2 * K;
    let mut spectrum = vec![Complex64::new(0.0, 0.0); total];
    for k in 1..K {
        spectrum[k] = Complex64::new(0.0, mag[k]);
        spectrum[total - k] = Complex64::new(0.0, -mag[k]);
    }

    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(total);
    ifft.process(&mut spectrum);

    // `process` produces an unnormalized inverse transform; scale by 1/total and fftshift so the
    // response is centered before truncating to the requested length.
    let scale = 1.0 / total as f64;
    let mut centered = vec![0.0f64; total];
    for (i, c) in spectrum.iter().enumerate() {
        let shifted = (i + total / 2) % total;
        centered[shifted] = c.re * scale;
    }

    let start = total / 2 - n / 2;
    let window = kaiser_window(n, beta);
    (0..n).map(|i| centered[start + i] * window[i]).collect()
}

/// Designs a real FIR filter by Kaiser-window synthesis.
///
/// `fp`/`fs` are the passband/stopband edges in Hz; `ripple_db` is the desired stop-band
/// attenuation (and, by Kaiser design, approximate pass-band ripple) in dB. When `antisymmetric`
/// is set the result is a Type III (odd length) or Type IV (even length) filter built by
/// frequency-domain sampling rather than a windowed ideal response; the caller is responsible
/// for requesting a length compatible with the chosen type via `odd_length`.
pub fn design_fir(
    fp: BandEdges,
    fs: BandEdges,
    ripple_db: f64,
    sample_rate: f64,
    odd_length: bool,
    antisymmetric: bool,
) -> Result<Vec<f64>> {
    validate_edges(fp, fs, sample_rate)?;
    let btype = infer_band_type(fp, fs)?;

    let delta_f = transition_width(fp, fs);
    let n = filter_length(ripple_db, delta_f, sample_rate, odd_length);
    let beta = kaiser_beta(ripple_db);

    if antisymmetric {
        Ok(antisymmetric_response(btype, fp, fs, sample_rate, n, beta))
    }
    else {
        let window = kaiser_window(n, beta);
        let ideal = symmetric_response(btype, fp, fs, sample_rate, n);
        Ok(ideal.iter().zip(window.iter()).map(|(h, w)| h * w).collect())
    }
}

/// A single-rate direct-form FIR filter with a delay line that persists across calls.
///
/// Used as the non-decimating alternative to a [`crate::dsp::PolyphaseResampler`] wherever a
/// pipeline stage needs "exactly one of filter or resampler" as its post-processor.
pub struct FirFilter<T: Sample> {
    taps: Vec<f64>,
    delay: VecDeque<T>,
}

impl<T: Sample> FirFilter<T> {
    pub fn new(taps: Vec<f64>) -> Self {
        let len = taps.len();
        FirFilter { taps, delay: VecDeque::from(vec![T::zero(); len]) }
    }

    /// Filters `input` sample by sample, returning one output sample per input sample.
    pub fn process(&mut self, input: &[T]) -> Vec<T> {
        input
            .iter()
            .map(|&x| {
                self.delay.push_front(x);
                self.delay.pop_back();
                let mut acc = T::zero();
                for (&tap, &sample) in self.taps.iter().zip(self.delay.iter()) {
                    acc = acc.add(sample.scaled(tap));
                }
                acc
            })
            .collect()
    }
}

/// The fixed 32-tap Kaiser(β=2.23) low-pass used by the legacy one-shot IQ conversion path: a
/// 40 MHz cutoff anti-alias/anti-image filter with no accompanying resampler.
pub fn default_anti_alias_taps(sample_rate: f64) -> Vec<f64> {
    const TAPS: usize = 32;
    const BETA: f64 = 2.23;
    const CUTOFF_HZ: f64 = 40e6;

    let m = (TAPS - 1) as f64 / 2.0;
    let fc_norm = CUTOFF_HZ / sample_rate;
    let ideal = ideal_lowpass(TAPS, m, fc_norm);
    let window = kaiser_window(TAPS, BETA);
    ideal.iter().zip(window.iter()).map(|(h, w)| h * w).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn freq_response_db(taps: &[f64], sample_rate: f64, freq: f64) -> f64 {
        let omega = 2.0 * std::f64::consts::PI * freq / sample_rate;
        let mut re = 0.0;
        let mut im = 0.0;
        for (n, &h) in taps.iter().enumerate() {
            re += h * (omega * n as f64).cos();
            im -= h * (omega * n as f64).sin();
        }
        20.0 * (re * re + im * im).sqrt().max(1e-300).log10()
    }

    #[test]
    fn lowpass_meets_ripple_budget() {
        let taps = design_fir(BandEdges::Single(75e3), BandEdges::Single(100e3), 60.0, 56e6, true, false).unwrap();
        assert!(freq_response_db(&taps, 56e6, 10e3) >= -1.0);
        assert!(freq_response_db(&taps, 56e6, 150e3) <= -40.0);
    }

    #[test]
    fn highpass_inverts_lowpass_at_dc() {
        let taps = design_fir(BandEdges::Single(20e3), BandEdges::Single(10e3), 50.0, 1e6, true, false).unwrap();
        assert!(freq_response_db(&taps, 1e6, 0.0) <= -20.0);
    }

    #[test]
    fn bandpass_passes_center_and_attenuates_edges() {
        let taps =
            design_fir(BandEdges::Pair(20e3, 30e3), BandEdges::Pair(10e3, 40e3), 50.0, 1e6, true, false).unwrap();
        assert!(freq_response_db(&taps, 1e6, 25e3) >= -3.0);
        assert!(freq_response_db(&taps, 1e6, 0.0) <= -20.0);
    }

    #[test]
    fn bandstop_attenuates_center_and_passes_edges() {
        let taps =
            design_fir(BandEdges::Pair(10e3, 40e3), BandEdges::Pair(20e3, 30e3), 50.0, 1e6, true, false).unwrap();
        assert!(freq_response_db(&taps, 1e6, 25e3) <= -20.0);
        assert!(freq_response_db(&taps, 1e6, 0.0) >= -3.0);
    }

    #[test]
    fn rejects_edges_outside_nyquist() {
        assert!(design_fir(BandEdges::Single(1e6), BandEdges::Single(2e6), 40.0, 2e6, false, false).is_err());
    }

    #[test]
    fn rejects_degenerate_transition() {
        assert!(design_fir(BandEdges::Single(100e3), BandEdges::Single(100e3), 40.0, 1e6, false, false).is_err());
    }

    #[test]
    fn antisymmetric_branch_produces_requested_length() {
        let taps =
            design_fir(BandEdges::Single(75e3), BandEdges::Single(100e3), 40.0, 1e6, true, true).unwrap();
        assert!(!taps.is_empty());
    }

    #[test]
    fn fir_filter_passes_dc_through_a_unity_gain_average() {
        let mut filter = FirFilter::<f32>::new(vec![0.5, 0.5]);
        let out = filter.process(&[1.0, 1.0, 1.0, 1.0]);
        // First sample sees one zero in the delay line, the rest see steady-state unity input.
        assert_eq!(out, vec![0.5, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn default_anti_alias_taps_has_32_taps() {
        let taps = default_anti_alias_taps(112e6);
        assert_eq!(taps.len(), 32);
    }
}
