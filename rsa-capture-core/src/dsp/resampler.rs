// rsa-capture
// Copyright (c) 2026 The rsa-capture Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A chunk-stateful rational-rate polyphase resampler: `Fs2 = p·Fs1/q`.
//!
//! The prototype FIR `b` is decomposed into `q` polyphase branches (branch `i` holds taps
//! `b[i], b[i+q], b[i+2q], …`), each with its own delay line. A rotary commutator distributes
//! incoming samples across the branches; an output is computed once enough input has been fed in
//! to saturate every branch touched since the previous output, then the commutator keeps running
//! ahead to the next output's threshold. Under heavy decimation (`p ≪ q`) this means many input
//! samples land in their branches before a single output is produced, and a unity-gain impulse
//! fed through the resampler surfaces as the branch-0 polyphase component of `b` (`b[0], b[q],
//! b[2q], …`) rather than the full tap sequence, since only the branch the impulse first lands in
//! ever sees a nonzero sample.

use std::collections::VecDeque;

use crate::dsp::Sample;
use crate::error::{config_error, Result};

pub struct PolyphaseResampler<T: Sample> {
    p: usize,
    q: usize,
    chunk_size_in: usize,
    chunk_size_out: usize,
    branch_taps: Vec<Vec<f64>>,
    branch_delay: Vec<VecDeque<T>>,
    m_in: usize,
}

impl<T: Sample> PolyphaseResampler<T> {
    /// Builds a resampler for ratio `p/q` (already in lowest terms) around prototype FIR `b`,
    /// fixing the input/output chunk sizes the caller will use on every [`process`] call.
    ///
    /// [`process`]: Self::process
    pub fn new(
        p: usize,
        q: usize,
        prototype: &[f64],
        chunk_size_in: usize,
        chunk_size_out: usize,
    ) -> Result<Self> {
        if p == 0 || q == 0 {
            return config_error("resampler ratio p/q must be nonzero");
        }
        if (p * chunk_size_in) % q != 0 {
            return config_error("p * chunk_size_in must be divisible by q");
        }
        if chunk_size_out != p * chunk_size_in / q {
            return config_error("chunk_size_out must equal p * chunk_size_in / q");
        }

        let mut branch_taps = vec![Vec::new(); q];
        for (idx, &coef) in prototype.iter().enumerate() {
            branch_taps[idx % q].push(coef);
        }
        let branch_delay = branch_taps
            .iter()
            .map(|taps| VecDeque::from(vec![T::zero(); taps.len()]))
            .collect();

        log::debug!(
            "built polyphase resampler: ratio {p}/{q}, {q} branches, {} taps/branch",
            prototype.len() / q + 1
        );

        Ok(PolyphaseResampler { p, q, chunk_size_in, chunk_size_out, branch_taps, branch_delay, m_in: 0 })
    }

    fn push(&mut self, branch: usize, sample: T) {
        let cap = self.branch_taps[branch].len();
        if cap == 0 {
            return;
        }
        let dq = &mut self.branch_delay[branch];
        dq.push_front(sample);
        if dq.len() > cap {
            dq.pop_back();
        }
    }

    fn advance_commutator(&mut self) {
        let diff = (self.m_in as i64 - self.p as i64).rem_euclid(self.q as i64);
        self.m_in = diff as usize;
    }

    fn branch_dot(&self, branch: usize) -> T {
        let taps = &self.branch_taps[branch];
        let dq = &self.branch_delay[branch];
        let mut acc = T::zero();
        for (&tap, &sample) in taps.iter().zip(dq.iter()) {
            acc = acc.add(sample.scaled(tap));
        }
        acc
    }

    /// Processes exactly `chunk_size_in` input samples and returns exactly `chunk_size_out`
    /// output samples, carrying delay-line and commutator state into the next call.
    ///
    /// Output `j` (0-based) is computed only once every input sample that could possibly
    /// contribute to it has been fed to the commutator, i.e. once `i` has reached
    /// `(j+1)·q/p`; under heavy decimation (`p ≪ q`) this feeds many samples into their
    /// respective branches before the single output for the call is produced.
    pub fn process(&mut self, input: &[T]) -> Result<Vec<T>> {
        if input.len() != self.chunk_size_in {
            return config_error("input length does not match the configured chunk_size_in");
        }

        let mut i = 0usize;
        let mut output = Vec::with_capacity(self.chunk_size_out);

        for j in 0..self.chunk_size_out {
            while i * self.p < (j + 1) * self.q {
                self.push(self.m_in, input[i]);
                self.advance_commutator();
                i += 1;
            }

            let mut acc = T::zero();
            for b in 0..self.q {
                acc = acc.add(self.branch_dot(b));
            }
            output.push(acc.scaled(self.p as f64));
        }

        while i < self.chunk_size_in {
            self.push(self.m_in, input[i]);
            self.advance_commutator();
            i += 1;
        }

        Ok(output)
    }

    pub fn chunk_size_in(&self) -> usize {
        self.chunk_size_in
    }

    pub fn chunk_size_out(&self) -> usize {
        self.chunk_size_out
    }
}
