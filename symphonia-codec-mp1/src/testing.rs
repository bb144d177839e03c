// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bitstream construction, filter instrumentation, and PCM capture for tests.

use crate::synthesis::{PcmSink, SynthesisFilter};

/// An MSB-first bit writer.
#[derive(Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    n_bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Write the `width` least-significant bits of `value`.
    pub fn write(&mut self, value: u32, width: u32) {
        for i in (0..width).rev() {
            if self.n_bits % 8 == 0 {
                self.buf.push(0);
            }

            if (value >> i) & 1 != 0 {
                let last = self.buf.len() - 1;
                self.buf[last] |= 0x80 >> (self.n_bits % 8);
            }

            self.n_bits += 1;
        }
    }

    /// The number of bits written.
    pub fn n_bits(&self) -> usize {
        self.n_bits
    }

    /// Returns the written bytes. The last byte is zero padded.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// A synthesis filter that records injected samples instead of synthesizing them.
#[derive(Default)]
pub struct RecordingFilter {
    /// Samples injected since the last pass.
    pub staged: Vec<(usize, f32)>,
    /// Samples injected during each completed pass.
    pub passes: Vec<Vec<(usize, f32)>>,
}

impl RecordingFilter {
    /// Complete a pass without a sink.
    pub fn end_pass(&mut self) {
        self.passes.push(std::mem::take(&mut self.staged));
    }
}

impl SynthesisFilter for RecordingFilter {
    fn inject(&mut self, sample: f32, subband: usize) {
        self.staged.push((subband, sample));
    }

    fn synthesize(&mut self, _out: &mut dyn PcmSink) {
        self.end_pass();
    }
}

/// A two channel sink that captures every appended PCM sample.
#[derive(Default)]
pub struct PcmRecorder {
    pub chans: [Vec<f32>; 2],
}

impl PcmSink for PcmRecorder {
    fn append(&mut self, channel: usize, samples: &[f32]) {
        self.chans[channel].extend_from_slice(samples);
    }
}
