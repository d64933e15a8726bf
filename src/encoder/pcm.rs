//! Uncompressed float PCM "encoder"
//!
//! Packs each frame as little-endian IEEE floats. Used for Matroska output
//! when lossless audio is wanted or libopus is not compiled in.

use super::{AudioEncoderConfig, Encoder, Packet, Received, SendStatus};
use crate::frame::EncoderFrame;
use crate::{Error, MediaKind, Rational, Result};

/// Samples per channel in each PCM block
pub const PCM_FRAME_SIZE: usize = 1024;

/// PCM encoder
pub struct PcmEncoder {
    sample_rate: u32,
    channels: u16,
    pending: Option<Packet>,
    flushed: bool,
}

impl PcmEncoder {
    pub fn new(config: &AudioEncoderConfig) -> Result<Self> {
        if config.channels == 0 {
            return Err(Error::Configuration(
                "PCM needs at least one channel".to_string(),
            ));
        }
        Ok(Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            pending: None,
            flushed: false,
        })
    }
}

impl Encoder for PcmEncoder {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn time_base(&self) -> Rational {
        Rational::new(1, self.sample_rate as i64)
    }

    fn frame_size(&self) -> Option<usize> {
        Some(PCM_FRAME_SIZE)
    }

    fn send_frame(&mut self, frame: Option<EncoderFrame>) -> Result<SendStatus> {
        if self.flushed {
            return Err(Error::Encode(
                "frame submitted to PCM encoder after end of stream".to_string(),
            ));
        }
        if self.pending.is_some() {
            return Ok(SendStatus::NotReady);
        }

        let frame = match frame {
            Some(EncoderFrame::Audio(frame)) => frame,
            Some(EncoderFrame::Video(_)) => {
                return Err(Error::Encode(
                    "video frame submitted to PCM encoder".to_string(),
                ))
            }
            None => {
                self.flushed = true;
                return Ok(SendStatus::Accepted);
            }
        };

        if frame.channels != self.channels {
            return Err(Error::Encode(format!(
                "PCM expects {} channels, got {}",
                self.channels, frame.channels
            )));
        }

        let data = frame
            .samples
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        self.pending = Some(Packet {
            data,
            pts: frame.pts,
            dts: frame.pts,
            duration: frame.nb_samples() as i64,
            is_keyframe: true,
            stream_index: 0,
        });
        Ok(SendStatus::Accepted)
    }

    fn receive_packet(&mut self) -> Result<Received> {
        if let Some(packet) = self.pending.take() {
            return Ok(Received::Packet(packet));
        }
        if self.flushed {
            Ok(Received::EndOfStream)
        } else {
            Ok(Received::Pending)
        }
    }
}
