//! Encode session lifecycle
//!
//! `Unconfigured -> Configured -> Opened -> Draining -> Closed`. A session owns
//! both pipelines and the interleaving writer from `open` until `close`.

use crate::encoder::{
    create_audio_encoder, create_video_encoder, AudioEncoderConfig, VideoEncoderConfig,
};
use crate::muxer::{create_muxer, StreamConfig};
use crate::pipeline::{AudioPipeline, VideoPipeline};
use crate::writer::InterleavingWriter;
use crate::{Error, FormatDescriptor, Result, SessionOptions};
use std::path::{Path, PathBuf};

/// Audio is always interleaved stereo
pub const AUDIO_CHANNELS: u16 = 2;

const VIDEO_STREAM: usize = 0;
const AUDIO_STREAM: usize = 1;

/// Lifecycle state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconfigured,
    Configured,
    Opened,
    Draining,
    Closed,
}

/// Counters for what a session has processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub video_frames: u64,
    pub audio_samples: u64,
    pub packets_written: u64,
    /// Packets discarded for arriving behind the interleave delta
    pub packets_dropped: u64,
    /// Times a frame buffer was replaced because the encoder still held it
    pub frame_reallocations: u64,
}

struct Pipelines {
    video: VideoPipeline,
    audio: AudioPipeline,
    writer: InterleavingWriter,
}

impl Pipelines {
    fn stats(&self) -> SessionStats {
        SessionStats {
            video_frames: self.video.frames(),
            audio_samples: self.audio.samples(),
            packets_written: self.writer.packets_written(),
            packets_dropped: self.writer.packets_dropped(),
            frame_reallocations: self.video.reallocations() + self.audio.reallocations(),
        }
    }
}

/// Encode/mux session
pub struct Session {
    state: SessionState,
    options: Option<SessionOptions>,
    format: Option<FormatDescriptor>,
    pipelines: Option<Pipelines>,
    poisoned: Option<String>,
    last_stats: SessionStats,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unconfigured,
            options: None,
            format: None,
            pipelines: None,
            poisoned: None,
            last_stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Resolved container and codecs, once configured
    pub fn format(&self) -> Option<FormatDescriptor> {
        self.format
    }

    pub fn options(&self) -> Option<&SessionOptions> {
        self.options.as_ref()
    }

    /// Configure with default encoder settings
    pub fn configure<P: Into<PathBuf>>(
        &mut self,
        output_path: P,
        width: u32,
        height: u32,
        framerate: u32,
        sample_rate: u32,
    ) -> Result<()> {
        self.configure_with(SessionOptions::new(
            output_path,
            width,
            height,
            framerate,
            sample_rate,
        ))
    }

    /// Configure with explicit options.
    ///
    /// Allowed before `open`; a failure leaves the session unconfigured.
    pub fn configure_with(&mut self, options: SessionOptions) -> Result<()> {
        match self.state {
            SessionState::Unconfigured | SessionState::Configured => {}
            state => {
                return Err(Error::InvalidState(format!(
                    "cannot configure a session in state {:?}",
                    state
                )))
            }
        }

        self.state = SessionState::Unconfigured;
        self.options = None;
        self.format = None;

        let format = options.validate()?;
        self.options = Some(options);
        self.format = Some(format);
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Create both pipelines, the output file, and write the container header
    pub fn open(&mut self) -> Result<()> {
        if self.state != SessionState::Configured {
            return Err(Error::InvalidState(format!(
                "cannot open a session in state {:?}",
                self.state
            )));
        }
        let (options, format) = match (self.options.clone(), self.format) {
            (Some(options), Some(format)) => (options, format),
            _ => return Err(Error::InvalidState("session is not configured".to_string())),
        };

        match build_pipelines(&options, format) {
            Ok(pipelines) => {
                tracing::info!(
                    path = %options.output_path.display(),
                    container = ?format.container,
                    "#0 video: {:?} {}x{} @ {} fps, #1 audio: {:?} {} Hz stereo, {} samples/frame",
                    format.video_codec,
                    options.width,
                    options.height,
                    options.framerate,
                    format.audio_codec,
                    options.sample_rate,
                    pipelines.audio.frame_size()
                );
                self.pipelines = Some(pipelines);
                self.poisoned = None;
                self.last_stats = SessionStats::default();
                self.state = SessionState::Opened;
                Ok(())
            }
            Err(e) => {
                self.options = None;
                self.format = None;
                self.state = SessionState::Unconfigured;
                Err(e)
            }
        }
    }

    /// Fixed samples per channel each `supply_audio` call must carry
    pub fn audio_frame_size(&self) -> Option<usize> {
        self.pipelines.as_ref().map(|p| p.audio.frame_size())
    }

    /// Encode one packed RGBA frame of exactly `width * height * 4` bytes
    pub fn supply_video(&mut self, rgba: &[u8]) -> Result<()> {
        let pipelines = self.supply_target()?;
        let result = pipelines.video.supply(rgba, &mut pipelines.writer);
        self.after_supply(result)
    }

    /// Encode one frame of interleaved stereo samples, `audio_frame_size()` per channel
    pub fn supply_audio(&mut self, pcm: &[i16]) -> Result<()> {
        let pipelines = self.supply_target()?;
        let result = pipelines.audio.supply(pcm, &mut pipelines.writer);
        self.after_supply(result)
    }

    /// Flush both encoders, write remaining packets and the trailer.
    ///
    /// Closing an already closed session does nothing. Closing before `open`
    /// ends the session without creating any output.
    pub fn close(&mut self) -> Result<()> {
        match self.state {
            SessionState::Closed => return Ok(()),
            SessionState::Unconfigured | SessionState::Configured => {
                self.state = SessionState::Closed;
                return Ok(());
            }
            SessionState::Opened | SessionState::Draining => {}
        }

        self.state = SessionState::Draining;
        let Some(mut pipelines) = self.pipelines.take() else {
            self.state = SessionState::Closed;
            return Ok(());
        };

        let mut first_error = None;
        if let Err(e) = pipelines.video.flush(&mut pipelines.writer) {
            first_error.get_or_insert(e);
        }
        if let Err(e) = pipelines.audio.flush(&mut pipelines.writer) {
            first_error.get_or_insert(e);
        }

        self.last_stats = pipelines.stats();
        let Pipelines { writer, .. } = pipelines;
        match writer.finalize() {
            Ok(written) => self.last_stats.packets_written = written,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }

        self.state = SessionState::Closed;
        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::debug!(
                    frames = self.last_stats.video_frames,
                    samples = self.last_stats.audio_samples,
                    packets = self.last_stats.packets_written,
                    dropped = self.last_stats.packets_dropped,
                    reallocations = self.last_stats.frame_reallocations,
                    "session closed"
                );
                Ok(())
            }
        }
    }

    /// Frames, samples and packets processed so far
    pub fn stats(&self) -> SessionStats {
        self.pipelines
            .as_ref()
            .map_or(self.last_stats, Pipelines::stats)
    }

    /// Whether a fatal error stopped the session from accepting more input
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    fn supply_target(&mut self) -> Result<&mut Pipelines> {
        if self.state != SessionState::Opened {
            return Err(Error::InvalidState(format!(
                "cannot supply frames in state {:?}",
                self.state
            )));
        }
        if let Some(reason) = &self.poisoned {
            return Err(Error::InvalidState(format!(
                "session stopped after an earlier failure: {}",
                reason
            )));
        }
        self.pipelines
            .as_mut()
            .ok_or_else(|| Error::InvalidState("session has no pipelines".to_string()))
    }

    fn after_supply(&mut self, result: Result<usize>) -> Result<()> {
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.is_fatal_to_session() {
                    tracing::warn!(error = %e, "session poisoned, only close is allowed");
                    self.poisoned = Some(e.to_string());
                }
                Err(e)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if matches!(self.state, SessionState::Opened | SessionState::Draining) {
            if let Err(e) = self.close() {
                tracing::warn!(error = %e, "failed to close session on drop");
            }
        }
    }
}

fn build_pipelines(options: &SessionOptions, format: FormatDescriptor) -> Result<Pipelines> {
    let video_encoder = create_video_encoder(
        format.video_codec,
        &VideoEncoderConfig {
            width: options.width,
            height: options.height,
            fps: options.framerate,
            quality: options.quality,
            speed: options.speed,
            keyframe_interval: options.keyframe_interval,
            low_latency: options.low_latency,
        },
    )?;
    let audio_encoder = create_audio_encoder(
        format.audio_codec,
        &AudioEncoderConfig {
            sample_rate: options.sample_rate,
            channels: AUDIO_CHANNELS,
            bitrate: options.audio_bitrate,
        },
    )?;

    let streams = [
        StreamConfig::Video {
            codec: format.video_codec,
            width: options.width,
            height: options.height,
            fps: options.framerate,
            codec_private: video_encoder.codec_config(),
        },
        StreamConfig::Audio {
            codec: format.audio_codec,
            sample_rate: options.sample_rate,
            channels: AUDIO_CHANNELS,
            codec_private: audio_encoder.codec_config(),
            codec_delay_ns: audio_encoder.codec_delay_ns(),
        },
    ];

    let video = VideoPipeline::new(
        video_encoder,
        VIDEO_STREAM,
        options.width,
        options.height,
        options.scale_filter,
    )?;
    let audio = AudioPipeline::new(
        audio_encoder,
        AUDIO_STREAM,
        options.sample_rate,
        AUDIO_CHANNELS,
    )?;

    let muxer = match create_muxer(format.container, &options.output_path, &streams) {
        Ok(muxer) => muxer,
        Err(e) => {
            remove_partial_output(&options.output_path);
            return Err(e);
        }
    };
    let writer = InterleavingWriter::new(
        muxer,
        &[video.time_base(), audio.time_base()],
        options.max_interleave_delta_ms,
    );

    Ok(Pipelines {
        video,
        audio,
        writer,
    })
}

fn remove_partial_output(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial output");
        }
    }
}
