//! Audio pipeline: interleaved S16 in, encoded packets out
//!
//! Every supply call must carry exactly one encoder frame worth of samples.
//! Samples pass through a staging buffer tagged with a chunk counter, then the
//! resampler converts them into the reusable F32 frame. The frame pts is the
//! running sample count rescaled into the encoder's time base.

use super::StreamPipeline;
use crate::encoder::Encoder;
use crate::frame::{AudioFrame, EncoderFrame, SharedFrame};
use crate::resample::{AudioSpec, Resampler};
use crate::writer::InterleavingWriter;
use crate::{Error, MediaKind, Rational, Result};

/// Input samples copied out of the caller's buffer
struct StagedChunk {
    samples: Vec<i16>,
    index: i64,
}

pub struct AudioPipeline {
    stream: StreamPipeline,
    resampler: Resampler,
    staged: StagedChunk,
    frame: SharedFrame<AudioFrame>,
    frame_size: usize,
    channels: u16,
    sample_rate: u32,
    samples_emitted: i64,
}

impl AudioPipeline {
    pub fn new(
        encoder: Box<dyn Encoder>,
        stream_index: usize,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        if encoder.kind() != MediaKind::Audio {
            return Err(Error::Configuration(
                "audio pipeline needs an audio encoder".to_string(),
            ));
        }
        let frame_size = encoder
            .frame_size()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                Error::Configuration("audio encoder reports no frame size".to_string())
            })?;

        let spec = AudioSpec {
            sample_rate,
            channels,
        };
        let resampler = Resampler::new(spec, spec)?;

        Ok(Self {
            stream: StreamPipeline::new(encoder, stream_index),
            resampler,
            staged: StagedChunk {
                samples: Vec::with_capacity(frame_size * channels as usize),
                index: 0,
            },
            frame: SharedFrame::new(AudioFrame::new(channels, sample_rate, frame_size)),
            frame_size,
            channels,
            sample_rate,
            samples_emitted: 0,
        })
    }

    pub fn time_base(&self) -> Rational {
        self.stream.time_base()
    }

    /// Samples per channel each supply call must carry
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Samples per channel handed to the encoder so far
    pub fn samples(&self) -> u64 {
        self.samples_emitted as u64
    }

    pub fn reallocations(&self) -> u64 {
        self.frame.reallocations()
    }

    /// Convert one frame of interleaved samples, encode it, and write whatever packets result
    pub fn supply(&mut self, pcm: &[i16], writer: &mut InterleavingWriter) -> Result<usize> {
        let expected = self.frame_size * self.channels as usize;
        if pcm.len() != expected {
            return Err(Error::InvalidInput(format!(
                "expected {} samples ({} per channel x {} channels), got {}",
                expected,
                self.frame_size,
                self.channels,
                pcm.len()
            )));
        }

        self.staged.samples.clear();
        self.staged.samples.extend_from_slice(pcm);
        self.staged.index += 1;

        let wanted = self.resampler.output_samples_for(self.frame_size);
        if wanted != self.frame_size {
            return Err(Error::ConsistencyFault(format!(
                "resampler would produce {} samples for a {}-sample frame",
                wanted, self.frame_size
            )));
        }

        let frame = self.frame.make_writable();
        let converted = self
            .resampler
            .convert(&self.staged.samples, &mut frame.samples)?;
        if converted != self.frame_size {
            return Err(Error::ConsistencyFault(format!(
                "resampler produced {} samples, expected {} (chunk {})",
                converted, self.frame_size, self.staged.index
            )));
        }
        frame.pts = Rational::rescale(
            self.samples_emitted,
            Rational::new(1, self.sample_rate as i64),
            self.stream.time_base(),
        );
        self.samples_emitted += converted as i64;

        self.stream
            .submit(Some(EncoderFrame::Audio(self.frame.share())), writer)
    }

    /// Signal end of input and drain the encoder
    pub fn flush(&mut self, writer: &mut InterleavingWriter) -> Result<usize> {
        self.stream.submit(None, writer)
    }

    /// Swap in an output frame too small for one encoder frame
    #[cfg(test)]
    pub(crate) fn shrink_output_frame(&mut self, nb_samples: usize) {
        self.frame = SharedFrame::new(AudioFrame::new(
            self.channels,
            self.sample_rate,
            nb_samples,
        ));
    }
}
