//! rawmux - Raw frame encode/mux library
//!
//! A [`Session`] accepts packed RGBA video frames and interleaved 16-bit PCM
//! audio from a producer (typically a game or render loop), encodes them with
//! AV1 and Opus (or PCM), and writes a single interleaved Matroska/WebM file.
//!
//! ```no_run
//! use rawmux::Session;
//!
//! let mut session = Session::new();
//! session.configure("capture.webm", 640, 360, 30, 48000)?;
//! session.open()?;
//!
//! let frame_size = session.audio_frame_size().unwrap_or(0);
//! let rgba = vec![0u8; 640 * 360 * 4];
//! let pcm = vec![0i16; frame_size * 2];
//! session.supply_video(&rgba)?;
//! session.supply_audio(&pcm)?;
//!
//! session.close()?;
//! # Ok::<(), rawmux::Error>(())
//! ```

pub mod convert;
pub mod encoder;
pub mod error;
pub mod ffi;
pub mod frame;
pub mod muxer;
pub mod pipeline;
pub mod rational;
pub mod resample;
pub mod session;
pub mod writer;

pub use error::{Error, Result};
pub use rational::Rational;
pub use session::{Session, SessionState, SessionStats};

use std::path::{Path, PathBuf};

/// Media kind carried by a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// Video codec types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum VideoCodec {
    /// AV1 codec (using rav1e)
    Av1 = 0,
}

/// Audio codec types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum AudioCodec {
    /// Opus codec (using libopus)
    Opus = 0,
    /// Uncompressed 32-bit float PCM
    Pcm = 1,
}

/// Sample rates libopus accepts
pub const OPUS_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

impl AudioCodec {
    /// Check if the codec can encode at the given sample rate
    pub fn supports_sample_rate(&self, sample_rate: u32) -> bool {
        match self {
            AudioCodec::Opus => OPUS_SAMPLE_RATES.contains(&sample_rate),
            AudioCodec::Pcm => (8000..=192_000).contains(&sample_rate),
        }
    }
}

/// Container format types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum Container {
    /// Matroska container (AV1 video, Opus or PCM audio)
    Matroska = 0,
    /// WebM container (AV1 video, Opus audio)
    WebM = 1,
}

impl Container {
    /// Infer the container from the output file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "webm" => Some(Container::WebM),
            "mkv" | "mka" => Some(Container::Matroska),
            _ => None,
        }
    }

    /// EBML DocType written in the file header
    pub fn doc_type(&self) -> &'static str {
        match self {
            Container::Matroska => "matroska",
            Container::WebM => "webm",
        }
    }

    /// Check if the container supports the given video codec
    pub fn supports_video(&self, codec: VideoCodec) -> bool {
        match (self, codec) {
            (_, VideoCodec::Av1) => true,
        }
    }

    /// Check if the container supports the given audio codec
    pub fn supports_audio(&self, codec: AudioCodec) -> bool {
        match (self, codec) {
            (_, AudioCodec::Opus) => true,
            (Container::Matroska, AudioCodec::Pcm) => true,
            (Container::WebM, AudioCodec::Pcm) => false,
        }
    }

    /// Default video codec of the container, if one is compiled in
    pub fn default_video_codec(&self) -> Option<VideoCodec> {
        available_video(VideoCodec::Av1)
            .is_ok()
            .then_some(VideoCodec::Av1)
    }

    /// Default audio codec of the container, if one is compiled in
    pub fn default_audio_codec(&self) -> Option<AudioCodec> {
        if available_audio(AudioCodec::Opus).is_ok() {
            return Some(AudioCodec::Opus);
        }
        match self {
            Container::Matroska => Some(AudioCodec::Pcm),
            Container::WebM => None,
        }
    }
}

/// Filter used to resample chroma when converting RGBA to YUV 4:2:0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleFilter {
    /// Plain 2x2 average
    Box,
    /// Linear (triangle) filter
    Bilinear,
    /// Cubic (Catmull-Rom) filter
    #[default]
    Bicubic,
    /// Lanczos with window 3
    Lanczos3,
}

/// Container plus the codec chosen for each medium
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub container: Container,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
}

/// Options for an encode session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Output file path
    pub output_path: PathBuf,
    /// Frame width in pixels (even)
    pub width: u32,
    /// Frame height in pixels (even)
    pub height: u32,
    /// Frames per second
    pub framerate: u32,
    /// Audio sample rate in Hz
    pub sample_rate: u32,
    /// Container format; inferred from the output extension when `None`
    pub container: Option<Container>,
    /// Audio codec; the container default when `None`
    pub audio_codec: Option<AudioCodec>,
    /// Quality (0-100, where 100 is highest quality)
    pub quality: u8,
    /// Encoder speed preset (0-10, higher is faster)
    pub speed: u8,
    /// Maximum distance between keyframes, in frames
    pub keyframe_interval: u32,
    /// Disable frame reordering in the video encoder, trading compression for latency
    pub low_latency: bool,
    /// Audio bitrate in bits per second (ignored by PCM)
    pub audio_bitrate: u32,
    /// Chroma resampling filter
    pub scale_filter: ScaleFilter,
    /// How far one stream may run ahead of another before packets are forced out, in ms.
    /// 0 (the default) waits for every stream; late packets are dropped once enabled.
    pub max_interleave_delta_ms: u64,
}

impl SessionOptions {
    /// Options with default encoder settings
    pub fn new<P: Into<PathBuf>>(
        output_path: P,
        width: u32,
        height: u32,
        framerate: u32,
        sample_rate: u32,
    ) -> Self {
        Self {
            output_path: output_path.into(),
            width,
            height,
            framerate,
            sample_rate,
            container: None,
            audio_codec: None,
            quality: 70,
            speed: 6,
            keyframe_interval: 30,
            low_latency: false,
            audio_bitrate: 128_000,
            scale_filter: ScaleFilter::default(),
            max_interleave_delta_ms: 0,
        }
    }

    /// Resolve the container and codecs for these options
    pub fn format(&self) -> Result<FormatDescriptor> {
        let container = match self.container {
            Some(container) => container,
            None => Container::from_path(&self.output_path).unwrap_or_else(|| {
                tracing::info!(
                    path = %self.output_path.display(),
                    "could not deduce output format from file extension, using matroska"
                );
                Container::Matroska
            }),
        };

        let video_codec = container.default_video_codec().ok_or_else(|| {
            Error::UnsupportedFormat(format!("{:?} has no video codec available", container))
        })?;
        if !container.supports_video(video_codec) {
            return Err(Error::ContainerVideoMismatch {
                container,
                codec: video_codec,
            });
        }

        let audio_codec = match self.audio_codec {
            Some(codec) => codec,
            None => container.default_audio_codec().ok_or_else(|| {
                Error::UnsupportedFormat(format!("{:?} has no audio codec available", container))
            })?,
        };
        if !container.supports_audio(audio_codec) {
            return Err(Error::ContainerAudioMismatch {
                container,
                codec: audio_codec,
            });
        }
        available_audio(audio_codec)?;

        Ok(FormatDescriptor {
            container,
            video_codec,
            audio_codec,
        })
    }

    /// Validate the options and resolve the output format
    pub fn validate(&self) -> Result<FormatDescriptor> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Configuration(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(Error::Configuration(format!(
                "width and height must be multiples of 2, got {}x{}",
                self.width, self.height
            )));
        }
        if self.framerate == 0 {
            return Err(Error::Configuration("framerate must be non-zero".to_string()));
        }
        if self.quality > 100 {
            return Err(Error::Configuration(format!(
                "quality must be 0-100, got {}",
                self.quality
            )));
        }
        if self.speed > 10 {
            return Err(Error::Configuration(format!(
                "speed must be 0-10, got {}",
                self.speed
            )));
        }
        if self.keyframe_interval == 0 {
            return Err(Error::Configuration(
                "keyframe interval must be non-zero".to_string(),
            ));
        }

        let format = self.format()?;
        if !format.audio_codec.supports_sample_rate(self.sample_rate) {
            return Err(Error::Configuration(format!(
                "requested sample rate ({} Hz) is not supported by {:?}",
                self.sample_rate, format.audio_codec
            )));
        }

        Ok(format)
    }
}

/// Check if a video codec is available in this build
pub fn available_video(codec: VideoCodec) -> Result<()> {
    match codec {
        VideoCodec::Av1 => {
            #[cfg(feature = "av1")]
            {
                Ok(())
            }
            #[cfg(not(feature = "av1"))]
            {
                Err(Error::UnsupportedFormat(
                    "AV1 support not compiled in".to_string(),
                ))
            }
        }
    }
}

/// Check if an audio codec is available in this build
pub fn available_audio(codec: AudioCodec) -> Result<()> {
    match codec {
        AudioCodec::Opus => {
            #[cfg(feature = "opus")]
            {
                Ok(())
            }
            #[cfg(not(feature = "opus"))]
            {
                Err(Error::UnsupportedFormat(
                    "Opus support not compiled in".to_string(),
                ))
            }
        }
        AudioCodec::Pcm => Ok(()),
    }
}
