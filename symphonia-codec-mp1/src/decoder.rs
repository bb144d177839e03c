// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use symphonia_core::audio::{AsAudioBufferRef, AudioBuffer, AudioBufferRef, Signal};
use symphonia_core::codecs::{CodecDescriptor, CodecParameters, CODEC_TYPE_MP1};
use symphonia_core::codecs::{Decoder, DecoderOptions, FinalizeResult};
use symphonia_core::errors::{decode_error, unsupported_error, Result};
use symphonia_core::formats::Packet;
use symphonia_core::io::{BitReaderLtr, FiniteStream};
use symphonia_core::support_codec;

use crate::common::OutputChannels;
use crate::header::{self, MPEG_CRC_LEN};
use crate::layer1::{FrameStatus, Layer1};
use crate::synthesis::{AudioBufferSink, PolyphaseFilter};

/// MPEG1 and MPEG2 audio layer 1 decoder.
///
/// Each packet must contain exactly one frame: the header, the CRC word if the frame is protected,
/// and the audio data. The synthesis filter state persists between packets.
pub struct Mp1Decoder {
    params: CodecParameters,
    options: DecoderOptions,
    channels: OutputChannels,
    filters: [PolyphaseFilter; 2],
    buf: AudioBuffer<f32>,
    n_muted: u64,
}

impl Mp1Decoder {
    /// Select the channel(s) to synthesize. Both channels are synthesized by default. A single
    /// selected channel is always output as the first channel of a mono buffer.
    pub fn with_output_channels(mut self, channels: OutputChannels) -> Self {
        self.channels = channels;
        self
    }

    /// Gets the output channel selection.
    pub fn output_channels(&self) -> OutputChannels {
        self.channels
    }

    fn decode_inner(&mut self, packet: &Packet) -> Result<()> {
        let mut reader = packet.as_buf_reader();

        let header = header::read_frame_header(&mut reader)?;

        // The packet should be the size stated in the header.
        let audio_data_len = match header.crc {
            Some(_) => header.frame_size.checked_sub(MPEG_CRC_LEN),
            None => Some(header.frame_size),
        };

        if audio_data_len != Some(reader.bytes_available() as usize) {
            return decode_error("mp1: invalid packet length");
        }

        let spec = header.spec(self.channels);

        // The audio buffer can only be created after the first frame header is read.
        if self.buf.is_unused() {
            self.buf = AudioBuffer::new(header.n_frames() as u64, spec);
        }
        else if self.buf.spec() != &spec {
            return decode_error("mp1: invalid audio buffer signal spec for packet");
        }

        self.buf.clear();
        self.buf.render_reserved(Some(header.n_frames()));

        let mut bs = BitReaderLtr::new(reader.read_buf_bytes_available_ref());

        let [filter1, filter2] = &mut self.filters;
        let mut sink = AudioBufferSink::new(&mut self.buf);

        let status = Layer1::new(&mut bs, &header, filter1, filter2, &mut sink, self.channels)
            .with_verify(self.options.verify)
            .decode_frame()?;

        // A muted frame is replaced by silence to maintain the timeline.
        if status == FrameStatus::Muted {
            self.n_muted += 1;
            self.buf.clear();
            self.buf.render_silence(Some(header.n_frames()));
        }

        self.buf.trim(packet.trim_start() as usize, packet.trim_end() as usize);

        Ok(())
    }
}

impl Decoder for Mp1Decoder {
    fn try_new(params: &CodecParameters, options: &DecoderOptions) -> Result<Self> {
        // This decoder only supports MP1.
        if params.codec != CODEC_TYPE_MP1 {
            return unsupported_error("mp1: invalid codec type");
        }

        Ok(Mp1Decoder {
            params: params.clone(),
            options: *options,
            channels: OutputChannels::Both,
            filters: [PolyphaseFilter::new(0), PolyphaseFilter::new(1)],
            buf: AudioBuffer::unused(),
            n_muted: 0,
        })
    }

    fn supported_codecs() -> &'static [CodecDescriptor] {
        &[support_codec!(CODEC_TYPE_MP1, "mp1", "MPEG Audio Layer 1")]
    }

    fn codec_params(&self) -> &CodecParameters {
        &self.params
    }

    fn reset(&mut self) {
        // Fully reset the synthesis filter state.
        for filter in self.filters.iter_mut() {
            filter.reset();
        }
    }

    fn decode(&mut self, packet: &Packet) -> Result<AudioBufferRef<'_>> {
        if let Err(e) = self.decode_inner(packet) {
            self.buf.clear();
            Err(e)
        }
        else {
            Ok(self.buf.as_audio_buffer_ref())
        }
    }

    fn finalize(&mut self) -> FinalizeResult {
        // Only a verifying decoder checks every protected frame.
        let verify_ok = if self.options.verify { Some(self.n_muted == 0) } else { None };

        FinalizeResult { verify_ok }
    }

    fn last_decoded(&self) -> AudioBufferRef<'_> {
        self.buf.as_audio_buffer_ref()
    }
}
