//! AV1 encoder using rav1e

use super::{Encoder, Packet, Received, SendStatus, VideoEncoderConfig};
use crate::frame::EncoderFrame;
use crate::{Error, MediaKind, Rational, Result};
use rav1e::prelude::{
    ChromaSamplePosition, ChromaSampling, Config, Context, EncoderStatus, FrameType, PixelRange,
    SpeedSettings, Tune,
};
use std::collections::{BTreeMap, VecDeque};

/// AV1 encoder using rav1e
pub struct Av1Encoder {
    context: Context<u8>,
    time_base: Rational,
    /// pts of frames still inside the encoder, keyed by rav1e input frame number
    in_flight: BTreeMap<u64, i64>,
    /// pts in submission order; packets take their dts from the front
    decode_order: VecDeque<i64>,
    frames_sent: u64,
    flushed: bool,
}

impl Av1Encoder {
    /// Create a new AV1 encoder
    pub fn new(config: &VideoEncoderConfig) -> Result<Self> {
        // Map quality (0-100) to quantizer (255-0)
        // Higher quality = lower quantizer
        let quantizer = ((100 - config.quality.min(100)) as usize * 255) / 100;
        let min_quantizer = (quantizer.saturating_sub(10)) as u8;

        let enc_config = rav1e::config::EncoderConfig {
            width: config.width as usize,
            height: config.height as usize,
            speed_settings: SpeedSettings::from_preset(config.speed.min(10)),
            time_base: rav1e::prelude::Rational::new(1, config.fps as u64),
            bit_depth: 8,
            chroma_sampling: ChromaSampling::Cs420,
            chroma_sample_position: ChromaSamplePosition::Unknown,
            pixel_range: PixelRange::Limited,
            still_picture: false,
            error_resilient: false,
            min_key_frame_interval: 0,
            max_key_frame_interval: config.keyframe_interval as u64,
            low_latency: config.low_latency,
            quantizer,
            min_quantizer,
            bitrate: 0,
            tune: Tune::Psychovisual,
            ..Default::default()
        };

        let rav1e_config = Config::new()
            .with_encoder_config(enc_config)
            .with_threads(0);

        let context = rav1e_config
            .new_context()
            .map_err(|e| Error::CodecOpen(format!("Failed to create AV1 context: {}", e)))?;

        Ok(Self {
            context,
            time_base: Rational::new(1, config.fps as i64),
            in_flight: BTreeMap::new(),
            decode_order: VecDeque::new(),
            frames_sent: 0,
            flushed: false,
        })
    }

    fn to_packet(&mut self, pkt: rav1e::Packet<u8>) -> Result<Packet> {
        let pts = self.in_flight.remove(&pkt.input_frameno).ok_or_else(|| {
            Error::Encode(format!(
                "AV1 encoder returned unknown frame {}",
                pkt.input_frameno
            ))
        })?;
        let dts = self.decode_order.pop_front().unwrap_or(pts);

        Ok(Packet {
            data: pkt.data,
            pts,
            dts,
            duration: 1,
            is_keyframe: pkt.frame_type == FrameType::KEY,
            stream_index: 0,
        })
    }
}

impl Encoder for Av1Encoder {
    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn time_base(&self) -> Rational {
        self.time_base
    }

    fn send_frame(&mut self, frame: Option<EncoderFrame>) -> Result<SendStatus> {
        if self.flushed {
            return Err(Error::Encode(
                "frame submitted to AV1 encoder after end of stream".to_string(),
            ));
        }

        let frame = match frame {
            Some(EncoderFrame::Video(frame)) => frame,
            Some(EncoderFrame::Audio(_)) => {
                return Err(Error::Encode(
                    "audio frame submitted to AV1 encoder".to_string(),
                ))
            }
            None => {
                self.context.flush();
                self.flushed = true;
                return Ok(SendStatus::Accepted);
            }
        };

        let mut yuv_frame = self.context.new_frame();
        for (i, plane) in yuv_frame.planes.iter_mut().enumerate() {
            plane.copy_from_raw_u8(&frame.planes[i], frame.stride(i), 1);
        }

        match self.context.send_frame(yuv_frame) {
            Ok(()) => {
                self.in_flight.insert(self.frames_sent, frame.pts);
                self.decode_order.push_back(frame.pts);
                self.frames_sent += 1;
                Ok(SendStatus::Accepted)
            }
            Err(EncoderStatus::EnoughData) => Ok(SendStatus::NotReady),
            Err(e) => Err(Error::Encode(format!("Failed to send frame: {}", e))),
        }
    }

    fn receive_packet(&mut self) -> Result<Received> {
        loop {
            match self.context.receive_packet() {
                Ok(pkt) => return Ok(Received::Packet(self.to_packet(pkt)?)),
                Err(EncoderStatus::Encoded) => continue,
                Err(EncoderStatus::NeedMoreData) => return Ok(Received::Pending),
                Err(EncoderStatus::LimitReached) => return Ok(Received::EndOfStream),
                Err(e) => {
                    return Err(Error::Encode(format!("AV1 encoding error: {}", e)));
                }
            }
        }
    }

    fn codec_config(&self) -> Option<Vec<u8>> {
        Some(self.context.container_sequence_header())
    }
}
