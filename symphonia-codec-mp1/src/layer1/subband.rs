// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use symphonia_core::errors::Result;
use symphonia_core::io::ReadBitsLtr;

use log::warn;

use crate::checksum::Crc16;
use crate::common::{OutputChannels, GRANULES_PER_FRAME};
use crate::synthesis::SynthesisFilter;

use super::tables::{requantization, SCALEFACTORS, SCALEFACTOR_RESERVED};

/// A bit allocation of 15 is forbidden in layer 1.
const ALLOCATION_ILLEGAL: u32 = 15;

/// The stereo coding of a sub-band.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubbandKind {
    /// One channel.
    Mono,
    /// Two independently coded channels.
    Stereo,
    /// One coded magnitude shared by both channels, each with its own scale factor.
    IntensityStereo,
}

/// The allocation, requantization parameters, scale factor, and most recently read sample of one
/// coded channel of a sub-band.
#[derive(Copy, Clone, Debug, Default)]
struct Quantizer {
    allocation: u32,
    sample_len: u32,
    factor: f32,
    offset: f32,
    scalefactor: f32,
    sample: u32,
}

impl Quantizer {
    #[inline(always)]
    fn is_allocated(&self) -> bool {
        self.allocation != 0
    }

    fn set_allocation(&mut self, allocation: u32) {
        self.allocation = allocation;

        if allocation != 0 {
            let (factor, offset) = requantization(allocation);

            self.sample_len = allocation + 1;
            self.factor = factor;
            self.offset = offset;
        }
    }

    fn read_scalefactor<B: ReadBitsLtr>(&mut self, bs: &mut B) -> Result<()> {
        if self.is_allocated() {
            self.scalefactor = read_scalefactor(bs)?;
        }
        Ok(())
    }

    fn read_sample<B: ReadBitsLtr>(&mut self, bs: &mut B) -> Result<()> {
        if self.is_allocated() {
            self.sample = bs.read_bits_leq32(self.sample_len)?;
        }
        Ok(())
    }

    /// Requantize the pending sample without applying the scale factor.
    #[inline(always)]
    fn requantize(&self) -> f32 {
        if self.is_allocated() {
            self.sample as f32 * self.factor + self.offset
        }
        else {
            0.0
        }
    }

    /// Requantize and rescale the pending sample.
    #[inline(always)]
    fn dequantize(&self) -> f32 {
        if self.is_allocated() {
            self.requantize() * self.scalefactor
        }
        else {
            0.0
        }
    }
}

#[derive(Clone, Debug)]
enum Coding {
    Mono(Quantizer),
    Stereo([Quantizer; 2]),
    IntensityStereo { quant: Quantizer, scalefactor2: f32 },
}

/// The decoding state of one sub-band over the course of a single frame.
///
/// The frame decoder drives every sub-band through the same protocol. Once per frame, the bit
/// allocation, scale factor selection, and scale factors are read. Then, for each of the 12
/// granules, a sample is read and subsequently put into the synthesis filter(s). All reads take
/// the bitstream by mutable reference since sub-bands interleave their fields in one bitstream.
#[derive(Clone, Debug)]
pub struct Subband {
    index: usize,
    granule: usize,
    coding: Coding,
}

impl Subband {
    fn new(index: usize, coding: Coding) -> Self {
        debug_assert!(index < 32);
        Subband { index, granule: 0, coding }
    }

    /// Instantiate a single channel sub-band.
    pub(crate) fn mono(index: usize) -> Self {
        Self::new(index, Coding::Mono(Default::default()))
    }

    /// Instantiate a sub-band with two independently coded channels.
    pub(crate) fn stereo(index: usize) -> Self {
        Self::new(index, Coding::Stereo(Default::default()))
    }

    /// Instantiate an intensity stereo coded sub-band.
    pub(crate) fn intensity_stereo(index: usize) -> Self {
        Self::new(index, Coding::IntensityStereo { quant: Default::default(), scalefactor2: 0.0 })
    }

    /// Gets the sub-band index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Gets the stereo coding of the sub-band.
    pub fn kind(&self) -> SubbandKind {
        match self.coding {
            Coding::Mono(_) => SubbandKind::Mono,
            Coding::Stereo(_) => SubbandKind::Stereo,
            Coding::IntensityStereo { .. } => SubbandKind::IntensityStereo,
        }
    }

    /// Gets the number of samples read since the last granule boundary.
    pub fn granule(&self) -> usize {
        self.granule
    }

    /// Read the bit allocation(s) of the sub-band, and fold them into the CRC, if provided.
    pub fn read_allocation<B: ReadBitsLtr>(
        &mut self,
        bs: &mut B,
        mut crc: Option<&mut Crc16>,
    ) -> Result<()> {
        match &mut self.coding {
            Coding::Mono(quant) | Coding::IntensityStereo { quant, .. } => {
                quant.set_allocation(read_allocation(bs, crc, self.index)?);
            }
            Coding::Stereo(quants) => {
                for quant in quants.iter_mut() {
                    quant.set_allocation(read_allocation(bs, crc.as_deref_mut(), self.index)?);
                }
            }
        }
        Ok(())
    }

    /// Scale factor selection information is only transmitted in layer 2.
    pub fn read_scalefactor_selection<B: ReadBitsLtr>(&mut self, _bs: &mut B) -> Result<()> {
        Ok(())
    }

    /// Read the scale factor(s) of every allocated channel of the sub-band.
    pub fn read_scalefactor<B: ReadBitsLtr>(&mut self, bs: &mut B) -> Result<()> {
        match &mut self.coding {
            Coding::Mono(quant) => quant.read_scalefactor(bs)?,
            Coding::Stereo(quants) => {
                for quant in quants.iter_mut() {
                    quant.read_scalefactor(bs)?;
                }
            }
            Coding::IntensityStereo { quant, scalefactor2 } => {
                if quant.is_allocated() {
                    quant.scalefactor = read_scalefactor(bs)?;
                    *scalefactor2 = read_scalefactor(bs)?;
                }
            }
        }
        Ok(())
    }

    /// Read the next sample of every allocated channel of the sub-band. Returns true after the
    /// last granule of the frame was read.
    pub fn read_sample_data<B: ReadBitsLtr>(&mut self, bs: &mut B) -> Result<bool> {
        match &mut self.coding {
            Coding::Mono(quant) | Coding::IntensityStereo { quant, .. } => quant.read_sample(bs)?,
            Coding::Stereo(quants) => {
                for quant in quants.iter_mut() {
                    quant.read_sample(bs)?;
                }
            }
        }

        self.granule += 1;

        if self.granule == GRANULES_PER_FRAME {
            self.granule = 0;
            Ok(true)
        }
        else {
            Ok(false)
        }
    }

    /// Dequantize the pending sample(s) and inject them into the synthesis filter(s) selected by
    /// `channels`. Unallocated channels inject silence. Returns true when the filters are ready to
    /// synthesize, which, for layer 1, is always.
    pub fn put_next_sample<F: SynthesisFilter>(
        &self,
        channels: OutputChannels,
        filter1: &mut F,
        filter2: &mut F,
    ) -> bool {
        let sb = self.index;

        match &self.coding {
            Coding::Mono(quant) => {
                // A mono source has no right channel.
                if channels != OutputChannels::Right {
                    filter1.inject(quant.dequantize(), sb);
                }
            }
            Coding::Stereo([left, right]) => {
                if channels != OutputChannels::Right {
                    filter1.inject(left.dequantize(), sb);
                }

                match channels {
                    OutputChannels::Both => filter2.inject(right.dequantize(), sb),
                    OutputChannels::Right => filter1.inject(right.dequantize(), sb),
                    OutputChannels::Left => (),
                }
            }
            Coding::IntensityStereo { quant, scalefactor2 } => {
                let sample = quant.requantize();

                match channels {
                    OutputChannels::Both => {
                        filter1.inject(sample * quant.scalefactor, sb);
                        filter2.inject(sample * scalefactor2, sb);
                    }
                    OutputChannels::Left => filter1.inject(sample * quant.scalefactor, sb),
                    OutputChannels::Right => filter1.inject(sample * scalefactor2, sb),
                }
            }
        }

        true
    }
}

/// Read a 4-bit bit allocation. The illegal allocation is tolerated.
fn read_allocation<B: ReadBitsLtr>(bs: &mut B, crc: Option<&mut Crc16>, sb: usize) -> Result<u32> {
    let allocation = bs.read_bits_leq32(4)?;

    if let Some(crc) = crc {
        crc.add_bits(allocation, 4);
    }

    if allocation == ALLOCATION_ILLEGAL {
        warn!("mp1: illegal bit allocation in sub-band {}", sb);
    }

    Ok(allocation)
}

/// Read a 6-bit scale factor index and return the scale factor.
fn read_scalefactor<B: ReadBitsLtr>(bs: &mut B) -> Result<f32> {
    let index = bs.read_bits_leq32(6)? as usize;

    if index == SCALEFACTOR_RESERVED {
        warn!("mp1: reserved scale factor index");
    }

    Ok(SCALEFACTORS[index])
}

#[cfg(test)]
mod tests {
    use symphonia_core::io::{BitReaderLtr, FiniteBitStream};

    use super::super::tables::{FACTOR, OFFSET, SCALEFACTORS};
    use super::*;
    use crate::testing::{BitWriter, RecordingFilter};

    /// Run all 12 granules of a sub-band, returning the injections of each filter per granule.
    fn run_granules(
        subband: &mut Subband,
        bs: &mut BitReaderLtr<'_>,
        channels: OutputChannels,
    ) -> (RecordingFilter, RecordingFilter) {
        let mut filter1 = RecordingFilter::default();
        let mut filter2 = RecordingFilter::default();

        for granule in 0..12 {
            let done = subband.read_sample_data(bs).unwrap();
            assert_eq!(done, granule == 11);

            assert!(subband.put_next_sample(channels, &mut filter1, &mut filter2));

            filter1.end_pass();
            filter2.end_pass();
        }

        (filter1, filter2)
    }

    #[test]
    fn verify_mono_decode() {
        let mut w = BitWriter::new();
        w.write(4, 4);
        w.write(3, 6);
        for i in 0..12 {
            w.write(i + 10, 5);
        }
        let buf = w.into_bytes();

        let mut bs = BitReaderLtr::new(&buf);
        let mut subband = Subband::mono(7);

        subband.read_allocation(&mut bs, None).unwrap();
        subband.read_scalefactor_selection(&mut bs).unwrap();
        subband.read_scalefactor(&mut bs).unwrap();

        let (filter1, filter2) = run_granules(&mut subband, &mut bs, OutputChannels::Both);

        for (i, pass) in filter1.passes.iter().enumerate() {
            let expected = ((i as u32 + 10) as f32 * FACTOR[4] + OFFSET[4]) * SCALEFACTORS[3];
            assert_eq!(pass, &vec![(7, expected)]);
        }

        assert!(filter2.passes.iter().all(|pass| pass.is_empty()));

        // All bits were consumed, and only the padding is left.
        assert_eq!(bs.bits_left(), (8 * buf.len() - (4 + 6 + 12 * 5)) as u64);
    }

    #[test]
    fn verify_unallocated_is_silent_and_reads_nothing() {
        for subband in [Subband::mono(2), Subband::stereo(2), Subband::intensity_stereo(2)] {
            let mut subband = subband;

            // Zero allocations followed by a canary pattern.
            let mut w = BitWriter::new();
            let n_alloc_bits = if subband.kind() == SubbandKind::Stereo { 8 } else { 4 };
            w.write(0, n_alloc_bits);
            w.write(0xff, 8);
            let buf = w.into_bytes();

            let mut bs = BitReaderLtr::new(&buf);

            subband.read_allocation(&mut bs, None).unwrap();
            let after_alloc = bs.bits_left();

            subband.read_scalefactor(&mut bs).unwrap();
            assert_eq!(bs.bits_left(), after_alloc);

            let (filter1, filter2) = run_granules(&mut subband, &mut bs, OutputChannels::Both);
            assert_eq!(bs.bits_left(), after_alloc);

            assert_eq!(filter1.passes.len(), 12);
            assert!(filter1.passes.iter().all(|pass| pass == &vec![(2, 0.0)]));

            if subband.kind() == SubbandKind::Mono {
                assert!(filter2.passes.iter().all(|pass| pass.is_empty()));
            }
            else {
                assert!(filter2.passes.iter().all(|pass| pass == &vec![(2, 0.0)]));
            }
        }
    }

    #[test]
    fn verify_stereo_channels_are_independent() {
        // Left channel allocation 2, right channel unallocated.
        let mut w = BitWriter::new();
        w.write(2, 4);
        w.write(0, 4);
        w.write(6, 6);
        for _ in 0..12 {
            w.write(5, 3);
        }
        let buf = w.into_bytes();

        let mut bs = BitReaderLtr::new(&buf);
        let mut subband = Subband::stereo(0);

        subband.read_allocation(&mut bs, None).unwrap();
        subband.read_scalefactor(&mut bs).unwrap();

        let (filter1, filter2) = run_granules(&mut subband, &mut bs, OutputChannels::Both);

        let left = (5.0 * FACTOR[2] + OFFSET[2]) * SCALEFACTORS[6];

        assert!(filter1.passes.iter().all(|pass| pass == &vec![(0, left)]));
        assert!(filter2.passes.iter().all(|pass| pass == &vec![(0, 0.0)]));
        assert_eq!(bs.bits_left(), (8 * buf.len() - (8 + 6 + 12 * 3)) as u64);
    }

    #[test]
    fn verify_stereo_field_order() {
        // Both channels allocated: allocations, then scale factors, then interleaved samples.
        let mut w = BitWriter::new();
        w.write(1, 4);
        w.write(3, 4);
        w.write(3, 6);
        w.write(9, 6);
        for _ in 0..12 {
            w.write(1, 2);
            w.write(12, 4);
        }
        let buf = w.into_bytes();

        let mut bs = BitReaderLtr::new(&buf);
        let mut subband = Subband::stereo(4);

        subband.read_allocation(&mut bs, None).unwrap();
        subband.read_scalefactor(&mut bs).unwrap();

        let left = (1.0 * FACTOR[1] + OFFSET[1]) * SCALEFACTORS[3];
        let right = (12.0 * FACTOR[3] + OFFSET[3]) * SCALEFACTORS[9];

        let (filter1, filter2) = run_granules(&mut subband, &mut bs, OutputChannels::Both);

        assert!(filter1.passes.iter().all(|pass| pass == &vec![(4, left)]));
        assert!(filter2.passes.iter().all(|pass| pass == &vec![(4, right)]));
        assert_eq!(bs.bits_left(), (8 * buf.len() - (8 + 12 + 12 * 6)) as u64);
    }

    /// Decode one granule of a sub-band with both channels allocated, the first channel scaled by
    /// 1.0 and the second by 0.5, and return the injections into each filter.
    fn route(kind: SubbandKind, channels: OutputChannels) -> (Vec<(usize, f32)>, Vec<(usize, f32)>) {
        let mut w = BitWriter::new();

        let mut subband = match kind {
            SubbandKind::Mono => {
                w.write(1, 4);
                w.write(3, 6);
                w.write(2, 2);
                Subband::mono(1)
            }
            SubbandKind::Stereo => {
                w.write(1, 4);
                w.write(1, 4);
                w.write(3, 6);
                w.write(6, 6);
                w.write(2, 2);
                w.write(2, 2);
                Subband::stereo(1)
            }
            SubbandKind::IntensityStereo => {
                w.write(1, 4);
                w.write(3, 6);
                w.write(6, 6);
                w.write(2, 2);
                Subband::intensity_stereo(1)
            }
        };

        let buf = w.into_bytes();
        let mut bs = BitReaderLtr::new(&buf);

        subband.read_allocation(&mut bs, None).unwrap();
        subband.read_scalefactor(&mut bs).unwrap();
        subband.read_sample_data(&mut bs).unwrap();

        let mut filter1 = RecordingFilter::default();
        let mut filter2 = RecordingFilter::default();

        subband.put_next_sample(channels, &mut filter1, &mut filter2);

        (filter1.staged, filter2.staged)
    }

    #[test]
    fn verify_routing() {
        // Raw sample 2 of allocation 1 requantizes to 2/3.
        let a = 2.0 * FACTOR[1] + OFFSET[1];
        let b = a * SCALEFACTORS[6];

        use OutputChannels::*;
        use SubbandKind::*;

        assert_eq!(route(Mono, Both), (vec![(1, a)], vec![]));
        assert_eq!(route(Mono, Left), (vec![(1, a)], vec![]));
        assert_eq!(route(Mono, Right), (vec![], vec![]));

        assert_eq!(route(Stereo, Both), (vec![(1, a)], vec![(1, b)]));
        assert_eq!(route(Stereo, Left), (vec![(1, a)], vec![]));
        assert_eq!(route(Stereo, Right), (vec![(1, b)], vec![]));

        assert_eq!(route(IntensityStereo, Both), (vec![(1, a)], vec![(1, b)]));
        assert_eq!(route(IntensityStereo, Left), (vec![(1, a)], vec![]));
        assert_eq!(route(IntensityStereo, Right), (vec![(1, b)], vec![]));
    }

    #[test]
    fn verify_intensity_stereo_scaling() {
        let mut w = BitWriter::new();
        w.write(6, 4);
        w.write(1, 6);
        w.write(5, 6);
        for _ in 0..12 {
            w.write(100, 7);
        }
        let buf = w.into_bytes();

        let mut bs = BitReaderLtr::new(&buf);
        let mut subband = Subband::intensity_stereo(20);

        subband.read_allocation(&mut bs, None).unwrap();
        subband.read_scalefactor(&mut bs).unwrap();

        let (filter1, filter2) = run_granules(&mut subband, &mut bs, OutputChannels::Both);

        // One magnitude, one sample read per granule, steered by two scale factors.
        assert_eq!(bs.bits_left(), (8 * buf.len() - (4 + 12 + 12 * 7)) as u64);

        let expected = SCALEFACTORS[1] / SCALEFACTORS[5];

        for (p1, p2) in filter1.passes.iter().zip(&filter2.passes) {
            let (v1, v2) = (p1[0].1, p2[0].1);
            assert!(v2 != 0.0);
            assert!((v1 / v2 - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn verify_illegal_allocation_is_tolerated() {
        let mut w = BitWriter::new();
        w.write(15, 4);
        w.write(3, 6);
        for _ in 0..12 {
            w.write(0xffff, 16);
        }
        let buf = w.into_bytes();

        let mut bs = BitReaderLtr::new(&buf);
        let mut subband = Subband::mono(0);

        subband.read_allocation(&mut bs, None).unwrap();
        subband.read_scalefactor(&mut bs).unwrap();

        let (filter1, _) = run_granules(&mut subband, &mut bs, OutputChannels::Left);

        // The illegal allocation reads 16-bit samples which requantize to silence.
        assert_eq!(bs.bits_left(), (8 * buf.len() - (4 + 6 + 12 * 16)) as u64);
        assert!(filter1.passes.iter().all(|pass| pass == &vec![(0, 0.0)]));
    }

    #[test]
    fn verify_granule_counter_wraps() {
        let buf = [0u8; 4];
        let mut bs = BitReaderLtr::new(&buf);

        // An unallocated sub-band reads no bits, so the counter is exercised in isolation.
        let mut subband = Subband::mono(0);
        subband.read_allocation(&mut bs, None).unwrap();

        for i in 1..=12 {
            let done = subband.read_sample_data(&mut bs).unwrap();
            assert_eq!(done, i == 12);
            assert_eq!(subband.granule(), i % 12);
        }

        assert!(!subband.read_sample_data(&mut bs).unwrap());
        assert_eq!(subband.granule(), 1);
    }

    #[test]
    fn verify_allocation_folds_into_crc() {
        let mut w = BitWriter::new();
        w.write(0x9, 4);
        w.write(0xf, 4);
        let buf = w.into_bytes();

        let mut bs = BitReaderLtr::new(&buf);
        let mut crc = Crc16::new();

        let mut subband = Subband::stereo(0);
        subband.read_allocation(&mut bs, Some(&mut crc)).unwrap();

        let mut expected = Crc16::new();
        expected.add_bits(0x9, 4);
        expected.add_bits(0xf, 4);

        assert_eq!(crc.checksum(), expected.checksum());
    }

    #[test]
    fn verify_exhausted_bitstream_is_an_error() {
        let mut w = BitWriter::new();
        w.write(14, 4);
        w.write(3, 6);
        let buf = w.into_bytes();

        let mut bs = BitReaderLtr::new(&buf);
        let mut subband = Subband::mono(0);

        subband.read_allocation(&mut bs, None).unwrap();
        subband.read_scalefactor(&mut bs).unwrap();

        assert!(subband.read_sample_data(&mut bs).is_err());
    }
}
