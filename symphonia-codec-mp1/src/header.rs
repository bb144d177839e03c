// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use symphonia_core::errors::{decode_error, unsupported_error, Result};
use symphonia_core::io::ReadBytes;

use log::debug;

use crate::common::*;

/// The length in bytes of a MPEG frame header word.
pub const MPEG_HEADER_LEN: usize = 4;

/// The length in bytes of the CRC word following the header of a protected frame.
pub const MPEG_CRC_LEN: usize = 2;

/// Bit-rate lookup table for MPEG version 1 layer 1.
const BIT_RATES_MPEG1_L1: [u32; 15] = [
    0, 32_000, 64_000, 96_000, 128_000, 160_000, 192_000, 224_000, 256_000, 288_000, 320_000,
    352_000, 384_000, 416_000, 448_000,
];

/// Bit-rate lookup table for MPEG version 2 & 2.5 audio layer 1.
const BIT_RATES_MPEG2_L1: [u32; 15] = [
    0, 32_000, 48_000, 56_000, 64_000, 80_000, 96_000, 112_000, 128_000, 144_000, 160_000, 176_000,
    192_000, 224_000, 256_000,
];

/// Returns true if the provided frame header word is synced.
#[inline(always)]
pub fn is_frame_header_word_synced(sync: u32) -> bool {
    (sync & 0xffe0_0000) == 0xffe0_0000
}

/// Parse a layer 1 frame header word.
pub fn parse_frame_header(header: u32) -> Result<FrameHeader> {
    // The MPEG audio header is structured as follows:
    //
    // 0b1111_1111 0b111v_vlly 0brrrr_hhpx 0bmmmm_coee
    // where:
    //     vv   = version, ll = layer      , y = crc
    //     rrrr = bitrate, hh = sample rate, p = padding , x  = private bit
    //     mmmm = mode   , c  = copyright  , o = original, ee = emphasis

    if !is_frame_header_word_synced(header) {
        return decode_error("mp1: frame header is not synced");
    }

    let version = match (header & 0x18_0000) >> 19 {
        0b00 => MpegVersion::Mpeg2p5,
        0b10 => MpegVersion::Mpeg2,
        0b11 => MpegVersion::Mpeg1,
        _ => return decode_error("mp1: invalid MPEG version"),
    };

    match (header & 0x6_0000) >> 17 {
        0b11 => (),
        0b00 => return decode_error("mp1: invalid MPEG layer"),
        _ => return unsupported_error("mp1: only layer 1 is supported"),
    }

    let bitrate = match ((header & 0xf000) >> 12, version) {
        // "Free" bit-rate. Note, this is NOT variable bit-rate.
        (0b0000, _) => return unsupported_error("mp1: free bit-rate is not supported"),
        // Invalid bit-rate.
        (0b1111, _) => return decode_error("mp1: invalid bit-rate"),
        (i, MpegVersion::Mpeg1) => BIT_RATES_MPEG1_L1[i as usize],
        (i, _) => BIT_RATES_MPEG2_L1[i as usize],
    };

    let sample_rate = match ((header & 0xc00) >> 10, version) {
        (0b00, MpegVersion::Mpeg1) => 44_100,
        (0b01, MpegVersion::Mpeg1) => 48_000,
        (0b10, MpegVersion::Mpeg1) => 32_000,
        (0b00, MpegVersion::Mpeg2) => 22_050,
        (0b01, MpegVersion::Mpeg2) => 24_000,
        (0b10, MpegVersion::Mpeg2) => 16_000,
        (0b00, MpegVersion::Mpeg2p5) => 11_025,
        (0b01, MpegVersion::Mpeg2p5) => 12_000,
        (0b10, MpegVersion::Mpeg2p5) => 8_000,
        _ => return decode_error("mp1: invalid sample rate"),
    };

    let channel_mode = match (header & 0xc0) >> 6 {
        0b00 => ChannelMode::Stereo,
        0b10 => ChannelMode::DualMono,
        0b11 => ChannelMode::Mono,
        // The mode extension bits indicate the sub-band from which intensity stereo coding is
        // applied: 4, 8, 12, or 16.
        _ => ChannelMode::JointStereo { bound: ((1 + ((header & 0x30) >> 4)) << 2) as usize },
    };

    let has_padding = header & 0x200 != 0;

    // A layer 1 frame is 12 * bitrate / sample_rate slots long, plus 1 slot of padding. A slot is
    // 4 bytes.
    let frame_size_slots = (12 * bitrate / sample_rate) as usize + usize::from(has_padding);

    // The frame size in bytes, excluding the header.
    let frame_size = (frame_size_slots << 2) - MPEG_HEADER_LEN;

    Ok(FrameHeader {
        word: header,
        version,
        bitrate,
        sample_rate,
        channel_mode,
        has_padding,
        crc: None,
        n_subbands: MAX_SUBBANDS,
        frame_size,
    })
}

/// Read a layer 1 frame header from the current location in the stream without any frame
/// synchronization. If the frame is protected, the transmitted CRC word is read as well.
pub fn read_frame_header<B: ReadBytes>(reader: &mut B) -> Result<FrameHeader> {
    let mut header = parse_frame_header(reader.read_be_u32()?)?;

    // The protection bit is active low.
    if header.word & 0x1_0000 == 0 {
        header.crc = Some(reader.read_be_u16()?);
    }

    debug!(
        "mp1: {} Hz, {} bps, {:?}, frame size {} bytes",
        header.sample_rate, header.bitrate, header.channel_mode, header.frame_size
    );

    Ok(header)
}
