// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Symphonia crates. Please see the workspace Cargo.toml for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]

// Shared modules.
mod checksum;
mod common;
mod header;

// Decoder modules.
#[cfg(feature = "mp1")]
mod decoder;
#[cfg(feature = "mp1")]
mod layer1;
#[cfg(feature = "mp1")]
mod synthesis;

#[cfg(all(test, feature = "mp1"))]
mod testing;

pub use checksum::Crc16;
pub use common::{ChannelMode, FrameHeader, MpegVersion, OutputChannels};
pub use common::{GRANULES_PER_FRAME, MAX_SUBBANDS};
pub use header::{parse_frame_header, read_frame_header, MPEG_CRC_LEN, MPEG_HEADER_LEN};

#[cfg(feature = "mp1")]
pub use decoder::Mp1Decoder;
#[cfg(feature = "mp1")]
pub use layer1::tables;
#[cfg(feature = "mp1")]
pub use layer1::{create_subbands, FrameState, FrameStatus, Layer1, Subband, SubbandKind};
#[cfg(feature = "mp1")]
pub use synthesis::{AudioBufferSink, PcmSink, PolyphaseFilter, SynthesisFilter};
