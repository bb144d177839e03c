// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `synthesis` module defines the synthesis filter and PCM sink contracts consumed by the
//! layer 1 frame decoder, and implements the polyphase synthesis filterbank of the MPEG audio
//! standard.

use std::f64;

use symphonia_core::audio::{AudioBuffer, Signal};

use lazy_static::lazy_static;

/// Synthesis window D[i], defined in Table B.3 of ISO/IEC 11172-3.
#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
const SYNTHESIS_D: [f32; 512] = [
     0.000000000, -0.000015259, -0.000015259, -0.000015259,
    -0.000015259, -0.000015259, -0.000015259, -0.000030518,
    -0.000030518, -0.000030518, -0.000030518, -0.000045776,
    -0.000045776, -0.000061035, -0.000061035, -0.000076294,
    -0.000076294, -0.000091553, -0.000106812, -0.000106812,
    -0.000122070, -0.000137329, -0.000152588, -0.000167847,
    -0.000198364, -0.000213623, -0.000244141, -0.000259399,
    -0.000289917, -0.000320435, -0.000366211, -0.000396729,
    -0.000442505, -0.000473022, -0.000534058, -0.000579834,
    -0.000625610, -0.000686646, -0.000747681, -0.000808716,
    -0.000885010, -0.000961304, -0.001037598, -0.001113892,
    -0.001205444, -0.001296997, -0.001388550, -0.001480103,
    -0.001586914, -0.001693726, -0.001785278, -0.001907349,
    -0.002014160, -0.002120972, -0.002243042, -0.002349854,
    -0.002456665, -0.002578735, -0.002685547, -0.002792358,
    -0.002899170, -0.002990723, -0.003082275, -0.003173828,
     0.003250122,  0.003326416,  0.003387451,  0.003433228,
     0.003463745,  0.003479004,  0.003479004,  0.003463745,
     0.003417969,  0.003372192,  0.003280640,  0.003173828,
     0.003051758,  0.002883911,  0.002700806,  0.002487183,
     0.002227783,  0.001937866,  0.001617432,  0.001266479,
     0.000869751,  0.000442505, -0.000030518, -0.000549316,
    -0.001098633, -0.001693726, -0.002334595, -0.003005981,
    -0.003723145, -0.004486084, -0.005294800, -0.006118774,
    -0.007003784, -0.007919312, -0.008865356, -0.009841919,
    -0.010848999, -0.011886597, -0.012939453, -0.014022827,
    -0.015121460, -0.016235352, -0.017349243, -0.018463135,
    -0.019577026, -0.020690918, -0.021789551, -0.022857666,
    -0.023910522, -0.024932861, -0.025909424, -0.026840210,
    -0.027725220, -0.028533936, -0.029281616, -0.029937744,
    -0.030532837, -0.031005859, -0.031387329, -0.031661987,
    -0.031814575, -0.031845093, -0.031738281, -0.031478882,
     0.031082153,  0.030517578,  0.029785156,  0.028884888,
     0.027801514,  0.026535034,  0.025085449,  0.023422241,
     0.021575928,  0.019531250,  0.017257690,  0.014801025,
     0.012115479,  0.009231567,  0.006134033,  0.002822876,
    -0.000686646, -0.004394531, -0.008316040, -0.012420654,
    -0.016708374, -0.021179199, -0.025817871, -0.030609131,
    -0.035552979, -0.040634155, -0.045837402, -0.051132202,
    -0.056533813, -0.061996460, -0.067520142, -0.073059082,
    -0.078628540, -0.084182739, -0.089706421, -0.095169067,
    -0.100540161, -0.105819702, -0.110946655, -0.115921021,
    -0.120697021, -0.125259399, -0.129562378, -0.133590698,
    -0.137298584, -0.140670776, -0.143676758, -0.146255493,
    -0.148422241, -0.150115967, -0.151306152, -0.151962280,
    -0.152069092, -0.151596069, -0.150497437, -0.148773193,
    -0.146362305, -0.143264771, -0.139450073, -0.134887695,
    -0.129577637, -0.123474121, -0.116577148, -0.108856201,
     0.100311279,  0.090927124,  0.080688477,  0.069595337,
     0.057617187,  0.044784546,  0.031082153,  0.016510010,
     0.001068115, -0.015228271, -0.032379150, -0.050354004,
    -0.069168091, -0.088775635, -0.109161377, -0.130310059,
    -0.152206421, -0.174789429, -0.198059082, -0.221984863,
    -0.246505737, -0.271591187, -0.297210693, -0.323318481,
    -0.349868774, -0.376800537, -0.404083252, -0.431655884,
    -0.459472656, -0.487472534, -0.515609741, -0.543823242,
    -0.572036743, -0.600219727, -0.628295898, -0.656219482,
    -0.683914185, -0.711318970, -0.738372803, -0.765029907,
    -0.791213989, -0.816864014, -0.841949463, -0.866363525,
    -0.890090942, -0.913055420, -0.935195923, -0.956481934,
    -0.976852417, -0.996246338, -1.014617920, -1.031936646,
    -1.048156738, -1.063217163, -1.077117920, -1.089782715,
    -1.101211548, -1.111373901, -1.120223999, -1.127746582,
    -1.133926392, -1.138763428, -1.142211914, -1.144287109,
     1.144989014,  1.144287109,  1.142211914,  1.138763428,
     1.133926392,  1.127746582,  1.120223999,  1.111373901,
     1.101211548,  1.089782715,  1.077117920,  1.063217163,
     1.048156738,  1.031936646,  1.014617920,  0.996246338,
     0.976852417,  0.956481934,  0.935195923,  0.913055420,
     0.890090942,  0.866363525,  0.841949463,  0.816864014,
     0.791213989,  0.765029907,  0.738372803,  0.711318970,
     0.683914185,  0.656219482,  0.628295898,  0.600219727,
     0.572036743,  0.543823242,  0.515609741,  0.487472534,
     0.459472656,  0.431655884,  0.404083252,  0.376800537,
     0.349868774,  0.323318481,  0.297210693,  0.271591187,
     0.246505737,  0.221984863,  0.198059082,  0.174789429,
     0.152206421,  0.130310059,  0.109161377,  0.088775635,
     0.069168091,  0.050354004,  0.032379150,  0.015228271,
    -0.001068115, -0.016510010, -0.031082153, -0.044784546,
    -0.057617187, -0.069595337, -0.080688477, -0.090927124,
     0.100311279,  0.108856201,  0.116577148,  0.123474121,
     0.129577637,  0.134887695,  0.139450073,  0.143264771,
     0.146362305,  0.148773193,  0.150497437,  0.151596069,
     0.152069092,  0.151962280,  0.151306152,  0.150115967,
     0.148422241,  0.146255493,  0.143676758,  0.140670776,
     0.137298584,  0.133590698,  0.129562378,  0.125259399,
     0.120697021,  0.115921021,  0.110946655,  0.105819702,
     0.100540161,  0.095169067,  0.089706421,  0.084182739,
     0.078628540,  0.073059082,  0.067520142,  0.061996460,
     0.056533813,  0.051132202,  0.045837402,  0.040634155,
     0.035552979,  0.030609131,  0.025817871,  0.021179199,
     0.016708374,  0.012420654,  0.008316040,  0.004394531,
     0.000686646, -0.002822876, -0.006134033, -0.009231567,
    -0.012115479, -0.014801025, -0.017257690, -0.019531250,
    -0.021575928, -0.023422241, -0.025085449, -0.026535034,
    -0.027801514, -0.028884888, -0.029785156, -0.030517578,
     0.031082153,  0.031478882,  0.031738281,  0.031845093,
     0.031814575,  0.031661987,  0.031387329,  0.031005859,
     0.030532837,  0.029937744,  0.029281616,  0.028533936,
     0.027725220,  0.026840210,  0.025909424,  0.024932861,
     0.023910522,  0.022857666,  0.021789551,  0.020690918,
     0.019577026,  0.018463135,  0.017349243,  0.016235352,
     0.015121460,  0.014022827,  0.012939453,  0.011886597,
     0.010848999,  0.009841919,  0.008865356,  0.007919312,
     0.007003784,  0.006118774,  0.005294800,  0.004486084,
     0.003723145,  0.003005981,  0.002334595,  0.001693726,
     0.001098633,  0.000549316,  0.000030518, -0.000442505,
    -0.000869751, -0.001266479, -0.001617432, -0.001937866,
    -0.002227783, -0.002487183, -0.002700806, -0.002883911,
    -0.003051758, -0.003173828, -0.003280640, -0.003372192,
    -0.003417969, -0.003463745, -0.003479004, -0.003479004,
    -0.003463745, -0.003433228, -0.003387451, -0.003326416,
     0.003250122,  0.003173828,  0.003082275,  0.002990723,
     0.002899170,  0.002792358,  0.002685547,  0.002578735,
     0.002456665,  0.002349854,  0.002243042,  0.002120972,
     0.002014160,  0.001907349,  0.001785278,  0.001693726,
     0.001586914,  0.001480103,  0.001388550,  0.001296997,
     0.001205444,  0.001113892,  0.001037598,  0.000961304,
     0.000885010,  0.000808716,  0.000747681,  0.000686646,
     0.000625610,  0.000579834,  0.000534058,  0.000473022,
     0.000442505,  0.000396729,  0.000366211,  0.000320435,
     0.000289917,  0.000259399,  0.000244141,  0.000213623,
     0.000198364,  0.000167847,  0.000152588,  0.000137329,
     0.000122070,  0.000106812,  0.000106812,  0.000091553,
     0.000076294,  0.000076294,  0.000061035,  0.000061035,
     0.000045776,  0.000045776,  0.000030518,  0.000030518,
     0.000030518,  0.000030518,  0.000015259,  0.000015259,
     0.000015259,  0.000015259,  0.000015259,  0.000015259,
];

lazy_static! {
    /// Matrixing coefficients, N[i][k] = cos((16 + i)(2k + 1)pi / 64), as defined in section
    /// 2.4.3.2.2 of ISO/IEC 11172-3.
    static ref SYNTHESIS_N: [[f32; 32]; 64] = {
        let mut n = [[0f32; 32]; 64];

        for (i, row) in n.iter_mut().enumerate() {
            for (k, coeff) in row.iter_mut().enumerate() {
                let angle = ((16 + i) * (2 * k + 1)) as f64 * f64::consts::PI / 64.0;
                *coeff = angle.cos() as f32;
            }
        }

        n
    };
}

/// An append-only sink of PCM samples.
pub trait PcmSink {
    /// Appends a block of PCM samples to the given channel.
    fn append(&mut self, channel: usize, samples: &[f32]);
}

/// A synthesis filter transforms one sub-band sample per sub-band into a block of 32 PCM samples.
pub trait SynthesisFilter {
    /// Stages a frequency-domain sample for the given sub-band. Sub-bands past the last are
    /// ignored.
    fn inject(&mut self, sample: f32, subband: usize);

    /// Synthesizes the staged sub-band samples and appends the resulting PCM samples to `out`.
    /// Called exactly once per pass over all sub-bands.
    fn synthesize(&mut self, out: &mut dyn PcmSink);
}

/// `AudioBufferSink` writes PCM samples, in order, into the rendered frames of an `AudioBuffer`.
///
/// The frames to be written must be rendered before the sink is created. Samples for a channel the
/// buffer does not have, or in excess of the rendered frames, are discarded.
pub struct AudioBufferSink<'a> {
    buf: &'a mut AudioBuffer<f32>,
    written: [usize; 2],
}

impl<'a> AudioBufferSink<'a> {
    pub fn new(buf: &'a mut AudioBuffer<f32>) -> Self {
        AudioBufferSink { buf, written: [0; 2] }
    }

    /// Gets the number of samples written into a channel.
    pub fn written(&self, channel: usize) -> usize {
        self.written.get(channel).copied().unwrap_or(0)
    }
}

impl PcmSink for AudioBufferSink<'_> {
    fn append(&mut self, channel: usize, samples: &[f32]) {
        if channel >= self.buf.spec().channels.count() || channel >= self.written.len() {
            return;
        }

        let start = self.written[channel];
        let end = start + samples.len();

        if let Some(dst) = self.buf.chan_mut(channel).get_mut(start..end) {
            dst.copy_from_slice(samples);
            self.written[channel] = end;
        }
    }
}

/// `PolyphaseFilter` maintains the persistent state of sub-band synthesis for one channel.
pub struct PolyphaseFilter {
    channel: usize,
    s_vec: [f32; 32],
    v_vec: [[f32; 64]; 16],
    v_front: usize,
}

impl PolyphaseFilter {
    /// Instantiate a synthesis filter that emits PCM samples into `channel` of the sink.
    pub fn new(channel: usize) -> Self {
        PolyphaseFilter { channel, s_vec: [0f32; 32], v_vec: [[0f32; 64]; 16], v_front: 0 }
    }

    /// Gets the channel the filter emits PCM samples into.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Clears all staged samples and the filter history.
    pub fn reset(&mut self) {
        self.s_vec = [0f32; 32];
        self.v_vec = [[0f32; 64]; 16];
        self.v_front = 0;
    }

    /// Synthesize one block of 32 PCM samples from the staged sub-band samples.
    fn synthesize_block(&mut self) -> [f32; 32] {
        // Matrixing. The newest 64 sample slot of the V FIFO is computed from the 32 sub-band
        // samples.
        let v_vec = &mut self.v_vec[self.v_front];

        for (v, row) in v_vec.iter_mut().zip(SYNTHESIS_N.iter()) {
            *v = row.iter().zip(&self.s_vec).map(|(n, s)| n * s).sum();
        }

        // Windowing. The U vector of the standard interleaves the first half of even slots with
        // the second half of odd slots, starting at the front of the FIFO. Rather than building
        // U, accumulate the windowed slots directly into the output block.
        let mut o_vec = [0f32; 32];

        for j in 0..8 {
            let v_start = self.v_front + (j << 1);

            let v0 = &self.v_vec[(v_start + 0) & 0xf][0..32];
            let v1 = &self.v_vec[(v_start + 1) & 0xf][32..64];

            let d = &SYNTHESIS_D[j << 6..(j + 1) << 6];

            for i in 0..32 {
                o_vec[i] += v0[i] * d[i] + v1[i] * d[i + 32];
            }
        }

        // Advance the FIFO such that the current front becomes the second slot.
        self.v_front = (self.v_front + 15) & 0xf;

        for o in o_vec.iter_mut() {
            *o = o.clamp(-1.0, 1.0);
        }

        o_vec
    }
}

impl SynthesisFilter for PolyphaseFilter {
    #[inline(always)]
    fn inject(&mut self, sample: f32, subband: usize) {
        if let Some(s) = self.s_vec.get_mut(subband) {
            *s = sample;
        }
    }

    fn synthesize(&mut self, out: &mut dyn PcmSink) {
        let pcm = self.synthesize_block();

        // Sub-bands that are not injected during the next pass must contribute silence.
        self.s_vec = [0f32; 32];

        out.append(self.channel, &pcm);
    }
}

#[cfg(test)]
mod tests {
    use symphonia_core::audio::{AudioBuffer, Layout, Signal, SignalSpec};

    use super::{AudioBufferSink, PcmSink, PolyphaseFilter, SynthesisFilter};
    use crate::testing::PcmRecorder;

    #[test]
    fn verify_silence_in_silence_out() {
        let mut filter = PolyphaseFilter::new(1);
        let mut out = PcmRecorder::default();

        for _ in 0..4 {
            filter.synthesize(&mut out);
        }

        assert!(out.chans[0].is_empty());
        assert_eq!(out.chans[1].len(), 4 * 32);
        assert!(out.chans[1].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn verify_impulse_response_length() {
        let mut filter = PolyphaseFilter::new(0);
        let mut out = PcmRecorder::default();

        filter.inject(0.5, 3);

        // The V FIFO holds 16 slots, so an impulse influences exactly 16 output blocks.
        for _ in 0..17 {
            filter.synthesize(&mut out);
        }

        let pcm = &out.chans[0];

        assert!(pcm[..16 * 32].iter().any(|&s| s != 0.0));
        assert!(pcm[16 * 32..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn verify_linearity() {
        let mut a = PolyphaseFilter::new(0);
        let mut b = PolyphaseFilter::new(0);
        let mut ab = PolyphaseFilter::new(0);

        let mut out_a = PcmRecorder::default();
        let mut out_b = PcmRecorder::default();
        let mut out_ab = PcmRecorder::default();

        for block in 0..20 {
            let x = 0.001 * block as f32;
            let y = -0.002 * (block % 7) as f32;

            a.inject(x, 0);
            b.inject(y, 5);
            ab.inject(x, 0);
            ab.inject(y, 5);

            a.synthesize(&mut out_a);
            b.synthesize(&mut out_b);
            ab.synthesize(&mut out_ab);
        }

        for ((sa, sb), sab) in out_a.chans[0].iter().zip(&out_b.chans[0]).zip(&out_ab.chans[0]) {
            assert!((sa + sb - sab).abs() < 1e-5);
        }
    }

    #[test]
    fn verify_output_is_clamped() {
        let mut filter = PolyphaseFilter::new(0);
        let mut out = PcmRecorder::default();

        for _ in 0..16 {
            for sb in 0..32 {
                filter.inject(1000.0, sb);
            }
            filter.synthesize(&mut out);
        }

        assert!(out.chans[0].iter().all(|&s| s >= -1.0 && s <= 1.0));
        assert!(out.chans[0].iter().any(|&s| s.abs() == 1.0));
    }

    #[test]
    fn verify_reset() {
        let mut filter = PolyphaseFilter::new(0);
        let mut out = PcmRecorder::default();

        filter.inject(0.25, 0);
        filter.synthesize(&mut out);
        filter.reset();

        let mut after_reset = PcmRecorder::default();
        filter.synthesize(&mut after_reset);

        assert!(out.chans[0].iter().any(|&s| s != 0.0));
        assert!(after_reset.chans[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn verify_out_of_range_subband_is_ignored() {
        let mut filter = PolyphaseFilter::new(0);
        let mut out = PcmRecorder::default();

        filter.inject(0.5, 32);
        filter.inject(0.5, usize::MAX);
        filter.synthesize(&mut out);

        assert_eq!(out.chans[0].len(), 32);
        assert!(out.chans[0].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn verify_audio_buffer_sink() {
        let mut buf = AudioBuffer::<f32>::new(4, SignalSpec::new_with_layout(44_100, Layout::Stereo));
        buf.render_reserved(Some(3));

        let mut sink = AudioBufferSink::new(&mut buf);

        sink.append(0, &[0.5, 0.25]);
        sink.append(1, &[-0.5]);
        sink.append(0, &[0.125]);

        // Overflowing the rendered frames, and channels the buffer does not have, are discarded.
        sink.append(0, &[1.0]);
        sink.append(1, &[1.0, 1.0, 1.0]);
        sink.append(2, &[1.0]);

        assert_eq!(sink.written(0), 3);
        assert_eq!(sink.written(1), 1);
        assert_eq!(sink.written(2), 0);

        assert_eq!(buf.frames(), 3);
        assert_eq!(buf.chan(0), &[0.5, 0.25, 0.125]);
        assert_eq!(buf.chan(1)[0], -0.5);
    }

    #[test]
    fn verify_filter_into_mono_audio_buffer() {
        let mut buf = AudioBuffer::<f32>::new(64, SignalSpec::new_with_layout(32_000, Layout::Mono));
        buf.render_reserved(Some(64));

        let mut left = PolyphaseFilter::new(0);
        let mut right = PolyphaseFilter::new(1);

        let mut sink = AudioBufferSink::new(&mut buf);

        for _ in 0..2 {
            left.inject(0.5, 0);
            right.inject(0.5, 0);
            left.synthesize(&mut sink);
            // A filter for a channel the buffer lacks must not panic.
            right.synthesize(&mut sink);
        }

        assert_eq!(sink.written(0), 64);
        assert_eq!(sink.written(1), 0);
        assert!(buf.chan(0).iter().any(|&s| s != 0.0));
    }
}
