// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use symphonia_core::audio::{Layout, SignalSpec};

use crate::checksum::Crc16;

/// The maximum number of sub-bands in a MPEG audio frame.
pub const MAX_SUBBANDS: usize = 32;

/// The number of samples per sub-band in a layer 1 frame.
pub const GRANULES_PER_FRAME: usize = 12;

/// The MPEG audio version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MpegVersion {
    /// Version 2.5
    Mpeg2p5,
    /// Version 2
    Mpeg2,
    /// Version 1
    Mpeg1,
}

/// The channel mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelMode {
    /// Single mono audio channel.
    Mono,
    /// Dual mono audio channels. Decoded exactly like `Stereo`.
    DualMono,
    /// Stereo channels.
    Stereo,
    /// Joint Stereo encoded channels. Sub-bands in the range `bound..32` are intensity stereo
    /// coded.
    JointStereo { bound: usize },
}

impl ChannelMode {
    /// Gets the number of channels.
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}

/// Selects which channel(s) of the decoded audio are synthesized.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum OutputChannels {
    /// Synthesize both channels. The second channel is routed into the second synthesis filter.
    #[default]
    Both,
    /// Synthesize only the left channel into the first synthesis filter.
    Left,
    /// Synthesize only the right channel into the first synthesis filter.
    Right,
}

/// A MPEG audio layer 1 frame header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// The raw header word.
    pub word: u32,
    pub version: MpegVersion,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channel_mode: ChannelMode,
    pub has_padding: bool,
    /// The checksum transmitted after the header, if the frame is protected.
    pub crc: Option<u16>,
    /// The number of coded sub-bands. Always 32 for layer 1 frames read from a stream.
    pub n_subbands: usize,
    /// The frame size in bytes, excluding the header word.
    pub frame_size: usize,
}

impl FrameHeader {
    /// Returns true if this a MPEG1 frame, false otherwise.
    #[inline(always)]
    pub fn is_mpeg1(&self) -> bool {
        self.version == MpegVersion::Mpeg1
    }

    /// Returns the number of channels.
    #[inline(always)]
    pub fn n_channels(&self) -> usize {
        self.channel_mode.count()
    }

    /// Returns true if the frame is protected by a CRC word.
    #[inline(always)]
    pub fn has_crc(&self) -> bool {
        self.crc.is_some()
    }

    /// Returns the number of coded sub-bands.
    #[inline(always)]
    pub fn subband_count(&self) -> usize {
        self.n_subbands
    }

    /// Returns the first intensity stereo coded sub-band. For channel modes other than joint
    /// stereo this is the sub-band count, meaning no sub-band is intensity stereo coded.
    #[inline(always)]
    pub fn intensity_stereo_bound(&self) -> usize {
        match self.channel_mode {
            ChannelMode::JointStereo { bound } => bound.min(self.n_subbands),
            _ => self.n_subbands,
        }
    }

    /// Returns the number of channels synthesized for a channel selection. Selecting a single
    /// channel, or decoding a mono frame, yields one output channel.
    pub fn n_output_channels(&self, channels: OutputChannels) -> usize {
        match (self.channel_mode, channels) {
            (ChannelMode::Mono, _) => 1,
            (_, OutputChannels::Both) => 2,
            _ => 1,
        }
    }

    /// Returns a signal specification for the synthesized audio of a channel selection.
    pub fn spec(&self, channels: OutputChannels) -> SignalSpec {
        let layout = match self.n_output_channels(channels) {
            1 => Layout::Mono,
            _ => Layout::Stereo,
        };

        SignalSpec::new_with_layout(self.sample_rate, layout)
    }

    /// Returns the number of samples per channel a layer 1 frame decodes to.
    #[inline(always)]
    pub fn n_frames(&self) -> usize {
        GRANULES_PER_FRAME * MAX_SUBBANDS
    }

    /// Returns true if the transmitted checksum matches the computed checksum. Unprotected frames
    /// always pass. A protected frame fails if there is no computed checksum to compare against.
    pub fn checksum_ok(&self, computed: Option<&Crc16>) -> bool {
        match (self.crc, computed) {
            (None, _) => true,
            (Some(expected), Some(crc)) => crc.checksum() == expected,
            (Some(_), None) => false,
        }
    }
}
