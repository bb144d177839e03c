// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use symphonia_core::errors::{decode_error, Result};
use symphonia_core::io::ReadBitsLtr;

use log::{trace, warn};

use crate::checksum::Crc16;
use crate::common::{ChannelMode, FrameHeader, OutputChannels, MAX_SUBBANDS};
use crate::synthesis::{PcmSink, SynthesisFilter};

mod subband;
pub mod tables;

pub use subband::{Subband, SubbandKind};

/// The phases of decoding a layer 1 frame, in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameState {
    Init,
    Allocate,
    ScaleSelect,
    ScaleFactors,
    SampleLoop,
    Done,
}

/// The outcome of decoding a frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was decoded and synthesized.
    Decoded,
    /// The frame failed its checksum. Scale factors and samples were not read, and nothing was
    /// synthesized.
    Muted,
}

/// Instantiate the sub-bands of a frame. Mono frames only code mono sub-bands, joint stereo frames
/// code stereo sub-bands below the intensity stereo bound and intensity stereo sub-bands from the
/// bound onwards, and all other frames only code stereo sub-bands.
pub fn create_subbands(header: &FrameHeader) -> Result<Vec<Subband>> {
    let n_subbands = header.subband_count();

    if n_subbands == 0 || n_subbands > MAX_SUBBANDS {
        return decode_error("mp1: invalid sub-band count");
    }

    let subbands = match header.channel_mode {
        ChannelMode::Mono => (0..n_subbands).map(Subband::mono).collect(),
        ChannelMode::JointStereo { .. } => {
            let bound = header.intensity_stereo_bound();

            (0..bound)
                .map(Subband::stereo)
                .chain((bound..n_subbands).map(Subband::intensity_stereo))
                .collect()
        }
        ChannelMode::Stereo | ChannelMode::DualMono => {
            (0..n_subbands).map(Subband::stereo).collect()
        }
    };

    Ok(subbands)
}

/// `Layer1` decodes the audio data of a MPEG audio layer 1 frame.
///
/// The decoder binds the bitstream, the frame header, two synthesis filters, and a PCM sink for
/// the duration of a frame. The bitstream must be positioned at the first bit of audio data (after
/// the header and CRC word), and, after a frame is decoded, will be positioned at the last bit of
/// the audio data.
pub struct Layer1<'a, B: ReadBitsLtr, F: SynthesisFilter> {
    bs: &'a mut B,
    header: &'a FrameHeader,
    filter1: &'a mut F,
    filter2: &'a mut F,
    out: &'a mut dyn PcmSink,
    channels: OutputChannels,
    crc: Option<Crc16>,
    verify: bool,
    state: FrameState,
    subbands: Vec<Subband>,
}

impl<'a, B: ReadBitsLtr, F: SynthesisFilter> Layer1<'a, B, F> {
    /// Instantiate a frame decoder. The second filter only receives samples if the frame is not
    /// mono and both channels are selected.
    pub fn new(
        bs: &'a mut B,
        header: &'a FrameHeader,
        filter1: &'a mut F,
        filter2: &'a mut F,
        out: &'a mut dyn PcmSink,
        channels: OutputChannels,
    ) -> Self {
        Layer1 {
            bs,
            header,
            filter1,
            filter2,
            out,
            channels,
            crc: Some(Crc16::new()),
            verify: false,
            state: FrameState::Init,
            subbands: Vec::with_capacity(MAX_SUBBANDS),
        }
    }

    /// Enables or disables computing the CRC over the protected fields of the frame. Enabled by
    /// default.
    pub fn with_crc(mut self, enable: bool) -> Self {
        self.crc = if enable { Some(Crc16::new()) } else { None };
        self
    }

    /// If enabled, a frame whose transmitted checksum does not match the computed checksum is
    /// muted. Disabled by default.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Gets the current decoding phase.
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Gets the CRC computed over the protected fields of the last frame, if enabled.
    pub fn crc(&self) -> Option<&Crc16> {
        self.crc.as_ref()
    }

    /// Gets the sub-bands of the last frame.
    pub fn subbands(&self) -> &[Subband] {
        &self.subbands
    }

    /// Decode one frame.
    pub fn decode_frame(&mut self) -> Result<FrameStatus> {
        self.state = FrameState::Init;
        self.subbands = create_subbands(self.header)?;

        // The CRC protects the last 16 bits of the header word followed by the bit allocations.
        if let Some(crc) = &mut self.crc {
            crc.reset();
            crc.add_bits(self.header.word & 0xffff, 16);
        }

        self.enter(FrameState::Allocate);
        self.read_allocation()?;

        self.enter(FrameState::ScaleSelect);
        self.read_scalefactor_selection()?;

        if !self.is_checksum_accepted() {
            warn!("mp1: crc mismatch, muting frame");
            self.enter(FrameState::Done);
            return Ok(FrameStatus::Muted);
        }

        self.enter(FrameState::ScaleFactors);
        self.read_scalefactors()?;

        self.enter(FrameState::SampleLoop);
        self.read_sample_data()?;

        self.enter(FrameState::Done);

        Ok(FrameStatus::Decoded)
    }

    fn enter(&mut self, state: FrameState) {
        trace!("mp1: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Unless verification is enabled, a frame is always accepted when the CRC is computed. This
    /// matches the behaviour of the reference decoders, which never mute a frame.
    fn is_checksum_accepted(&self) -> bool {
        if self.crc.is_some() && !self.verify {
            return true;
        }
        self.header.checksum_ok(self.crc.as_ref())
    }

    fn read_allocation(&mut self) -> Result<()> {
        for subband in self.subbands.iter_mut() {
            subband.read_allocation(&mut *self.bs, self.crc.as_mut())?;
        }
        Ok(())
    }

    fn read_scalefactor_selection(&mut self) -> Result<()> {
        for subband in self.subbands.iter_mut() {
            subband.read_scalefactor_selection(&mut *self.bs)?;
        }
        Ok(())
    }

    fn read_scalefactors(&mut self) -> Result<()> {
        for subband in self.subbands.iter_mut() {
            subband.read_scalefactor(&mut *self.bs)?;
        }
        Ok(())
    }

    fn read_sample_data(&mut self) -> Result<()> {
        let synthesize_both =
            self.channels == OutputChannels::Both && self.header.channel_mode != ChannelMode::Mono;

        // Samples are read until every sub-band reaches the granule boundary. Each read is followed
        // by writes into the filters until the sub-bands signal the filters are ready. In layer 1
        // both signals are uniform across sub-bands, the read loop runs 12 times, and the write
        // loop runs once per read.
        loop {
            let mut read_ready = false;

            for subband in self.subbands.iter_mut() {
                read_ready = subband.read_sample_data(&mut *self.bs)?;
            }

            loop {
                let mut write_ready = false;

                for subband in self.subbands.iter() {
                    write_ready = subband.put_next_sample(
                        self.channels,
                        &mut *self.filter1,
                        &mut *self.filter2,
                    );
                }

                self.filter1.synthesize(&mut *self.out);

                if synthesize_both {
                    self.filter2.synthesize(&mut *self.out);
                }

                if write_ready {
                    break;
                }
            }

            if read_ready {
                break;
            }
        }

        Ok(())
    }
}
