//! Opus encoder using libopus (audiopus)

use super::{AudioEncoderConfig, Encoder, Packet, Received, SendStatus};
use crate::frame::EncoderFrame;
use crate::{Error, MediaKind, Rational, Result};
use audiopus::coder::Encoder as LibOpusEncoder;
use audiopus::{Application, Bitrate, Channels, SampleRate};

/// Frame duration handed to libopus
const FRAME_DURATION_MS: u32 = 20;

/// Largest packet libopus will produce
const MAX_PACKET_SIZE: usize = 4000;

/// OpusHead pre-skip and CodecDelay are expressed at this rate
const OPUS_HEAD_RATE: u64 = 48_000;

/// Opus encoder
pub struct OpusEncoder {
    encoder: LibOpusEncoder,
    sample_rate: u32,
    channels: u16,
    frame_size: usize,
    /// Encoder lookahead converted to 48 kHz samples
    pre_skip: u16,
    buffer: Vec<u8>,
    pending: Option<Packet>,
    flushed: bool,
}

impl OpusEncoder {
    /// Create a new Opus encoder
    pub fn new(config: &AudioEncoderConfig) -> Result<Self> {
        let sample_rate = match config.sample_rate {
            8000 => SampleRate::Hz8000,
            12000 => SampleRate::Hz12000,
            16000 => SampleRate::Hz16000,
            24000 => SampleRate::Hz24000,
            48000 => SampleRate::Hz48000,
            other => {
                return Err(Error::Configuration(format!(
                    "requested sample rate ({} Hz) is not supported by Opus",
                    other
                )))
            }
        };

        let channels = match config.channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            other => {
                return Err(Error::Configuration(format!(
                    "Opus supports 1 or 2 channels, got {}",
                    other
                )))
            }
        };

        let mut encoder = LibOpusEncoder::new(sample_rate, channels, Application::Audio)
            .map_err(|e| Error::CodecOpen(format!("Failed to create Opus encoder: {}", e)))?;
        encoder
            .set_bitrate(Bitrate::BitsPerSecond(config.bitrate as i32))
            .map_err(|e| Error::CodecOpen(format!("Failed to set Opus bitrate: {}", e)))?;
        let lookahead = encoder
            .lookahead()
            .map_err(|e| Error::CodecOpen(format!("Failed to query Opus lookahead: {}", e)))?;
        let pre_skip = pre_skip_for(lookahead as u32, config.sample_rate)?;

        Ok(Self {
            encoder,
            sample_rate: config.sample_rate,
            channels: config.channels,
            frame_size: (config.sample_rate * FRAME_DURATION_MS / 1000) as usize,
            pre_skip,
            buffer: vec![0; MAX_PACKET_SIZE],
            pending: None,
            flushed: false,
        })
    }
}

/// Scale a lookahead in input-rate samples to the 48 kHz pre-skip
fn pre_skip_for(lookahead: u32, sample_rate: u32) -> Result<u16> {
    let samples = lookahead as u64 * OPUS_HEAD_RATE / sample_rate as u64;
    u16::try_from(samples).map_err(|_| {
        Error::CodecOpen(format!("Opus lookahead of {} samples is out of range", lookahead))
    })
}

impl Encoder for OpusEncoder {
    fn kind(&self) -> MediaKind {
        MediaKind::Audio
    }

    fn time_base(&self) -> Rational {
        Rational::new(1, self.sample_rate as i64)
    }

    fn frame_size(&self) -> Option<usize> {
        Some(self.frame_size)
    }

    fn send_frame(&mut self, frame: Option<EncoderFrame>) -> Result<SendStatus> {
        if self.flushed {
            return Err(Error::Encode(
                "frame submitted to Opus encoder after end of stream".to_string(),
            ));
        }
        if self.pending.is_some() {
            return Ok(SendStatus::NotReady);
        }

        let frame = match frame {
            Some(EncoderFrame::Audio(frame)) => frame,
            Some(EncoderFrame::Video(_)) => {
                return Err(Error::Encode(
                    "video frame submitted to Opus encoder".to_string(),
                ))
            }
            None => {
                self.flushed = true;
                return Ok(SendStatus::Accepted);
            }
        };

        if frame.channels != self.channels || frame.nb_samples() != self.frame_size {
            return Err(Error::Encode(format!(
                "Opus expects {} samples x {} channels, got {} x {}",
                self.frame_size,
                self.channels,
                frame.nb_samples(),
                frame.channels
            )));
        }

        let len = self
            .encoder
            .encode_float(&frame.samples, &mut self.buffer)
            .map_err(|e| Error::Encode(format!("Opus encoding failed: {}", e)))?;

        self.pending = Some(Packet {
            data: self.buffer[..len].to_vec(),
            pts: frame.pts,
            dts: frame.pts,
            duration: self.frame_size as i64,
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

    /// OpusHead identification header
    fn codec_config(&self) -> Option<Vec<u8>> {
        let mut head = Vec::with_capacity(19);
        head.extend_from_slice(b"OpusHead");
        head.push(1);
        head.push(self.channels as u8);
        head.extend_from_slice(&self.pre_skip.to_le_bytes());
        head.extend_from_slice(&self.sample_rate.to_le_bytes());
        head.extend_from_slice(&0i16.to_le_bytes());
        head.push(0);
        Some(head)
    }

    fn codec_delay_ns(&self) -> u64 {
        self.pre_skip as u64 * 1_000_000_000 / OPUS_HEAD_RATE
    }
}
