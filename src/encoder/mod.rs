//! Encoders
//!
//! Every backend implements the same push/pull protocol: a frame (or `None`
//! to signal end of input) goes in through [`Encoder::send_frame`], and
//! compressed packets come out of [`Encoder::receive_packet`] until it reports
//! [`Received::Pending`] or [`Received::EndOfStream`].

#[cfg(feature = "av1")]
pub mod av1;

#[cfg(feature = "opus")]
pub mod opus;

pub mod pcm;

use crate::frame::EncoderFrame;
use crate::{AudioCodec, Error, MediaKind, Rational, Result, VideoCodec};

/// Encoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Encoded data
    pub data: Vec<u8>,
    /// Presentation timestamp in time_base units
    pub pts: i64,
    /// Decoding timestamp in time_base units
    pub dts: i64,
    /// Duration in time_base units
    pub duration: i64,
    /// Is this a keyframe?
    pub is_keyframe: bool,
    /// Index of the stream this packet belongs to
    pub stream_index: usize,
}

/// Outcome of [`Encoder::send_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Frame taken
    Accepted,
    /// Encoder is full; drain packets, then send the same frame again
    NotReady,
}

/// Outcome of [`Encoder::receive_packet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Packet(Packet),
    /// No packet right now; more input is needed
    Pending,
    /// End of input was signalled and every packet has been drained
    EndOfStream,
}

/// Encoder trait
pub trait Encoder: Send {
    /// Media kind this encoder consumes
    fn kind(&self) -> MediaKind;

    /// Time base of frame and packet timestamps
    fn time_base(&self) -> Rational;

    /// Fixed number of samples per channel each audio frame must hold
    fn frame_size(&self) -> Option<usize> {
        None
    }

    /// Submit a frame, or `None` to signal end of input
    fn send_frame(&mut self, frame: Option<EncoderFrame>) -> Result<SendStatus>;

    /// Retrieve the next packet
    fn receive_packet(&mut self) -> Result<Received>;

    /// Codec-specific configuration data for the container (CodecPrivate)
    fn codec_config(&self) -> Option<Vec<u8>> {
        None
    }

    /// Decoder delay to discard at the start of the stream, in nanoseconds
    fn codec_delay_ns(&self) -> u64 {
        0
    }
}

/// Video encoder configuration
#[derive(Debug, Clone)]
pub struct VideoEncoderConfig {
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frame rate (frames per second)
    pub fps: u32,
    /// Quality (0-100)
    pub quality: u8,
    /// Speed preset (0-10)
    pub speed: u8,
    /// Maximum keyframe interval in frames
    pub keyframe_interval: u32,
    /// No frame reordering
    pub low_latency: bool,
}

/// Audio encoder configuration
#[derive(Debug, Clone)]
pub struct AudioEncoderConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Target bitrate in bits per second
    pub bitrate: u32,
}

/// Create a video encoder for the specified codec
pub fn create_video_encoder(
    codec: VideoCodec,
    config: &VideoEncoderConfig,
) -> Result<Box<dyn Encoder>> {
    match codec {
        #[cfg(feature = "av1")]
        VideoCodec::Av1 => Ok(Box::new(av1::Av1Encoder::new(config)?)),
        #[cfg(not(feature = "av1"))]
        VideoCodec::Av1 => {
            let _ = config;
            Err(Error::UnsupportedFormat(
                "AV1 support not compiled in".to_string(),
            ))
        }
    }
}

/// Create an audio encoder for the specified codec
pub fn create_audio_encoder(
    codec: AudioCodec,
    config: &AudioEncoderConfig,
) -> Result<Box<dyn Encoder>> {
    if !codec.supports_sample_rate(config.sample_rate) {
        return Err(Error::Configuration(format!(
            "requested sample rate ({} Hz) is not supported by {:?}",
            config.sample_rate, codec
        )));
    }

    match codec {
        #[cfg(feature = "opus")]
        AudioCodec::Opus => Ok(Box::new(opus::OpusEncoder::new(config)?)),
        #[cfg(not(feature = "opus"))]
        AudioCodec::Opus => Err(Error::UnsupportedFormat(
            "Opus support not compiled in".to_string(),
        )),
        AudioCodec::Pcm => Ok(Box::new(pcm::PcmEncoder::new(config)?)),
    }
}
