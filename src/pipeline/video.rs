//! Video pipeline: RGBA in, AV1 packets out

use super::StreamPipeline;
use crate::convert::rgba_to_yuv420;
use crate::encoder::Encoder;
use crate::frame::{EncoderFrame, SharedFrame, VideoFrame};
use crate::writer::InterleavingWriter;
use crate::{Error, MediaKind, Rational, Result, ScaleFilter};

pub struct VideoPipeline {
    stream: StreamPipeline,
    frame: SharedFrame<VideoFrame>,
    filter: ScaleFilter,
    next_pts: i64,
}

impl VideoPipeline {
    pub fn new(
        encoder: Box<dyn Encoder>,
        stream_index: usize,
        width: u32,
        height: u32,
        filter: ScaleFilter,
    ) -> Result<Self> {
        if encoder.kind() != MediaKind::Video {
            return Err(Error::Configuration(
                "video pipeline needs a video encoder".to_string(),
            ));
        }

        Ok(Self {
            stream: StreamPipeline::new(encoder, stream_index),
            frame: SharedFrame::new(VideoFrame::try_new(width, height)?),
            filter,
            next_pts: 0,
        })
    }

    pub fn time_base(&self) -> Rational {
        self.stream.time_base()
    }

    /// Bytes one RGBA frame must contain
    pub fn frame_bytes(&self) -> usize {
        let frame = self.frame.get();
        frame.width as usize * frame.height as usize * 4
    }

    /// Frames accepted so far
    pub fn frames(&self) -> u64 {
        self.next_pts as u64
    }

    /// Times the output frame was still held by the encoder when it was needed again
    pub fn reallocations(&self) -> u64 {
        self.frame.reallocations()
    }

    /// Convert one RGBA frame, encode it, and write whatever packets result
    pub fn supply(&mut self, rgba: &[u8], writer: &mut InterleavingWriter) -> Result<usize> {
        if rgba.len() != self.frame_bytes() {
            return Err(Error::InvalidInput(format!(
                "expected {} bytes of RGBA, got {}",
                self.frame_bytes(),
                rgba.len()
            )));
        }

        let pts = self.next_pts;
        let frame = self.frame.make_writable();
        let (width, height) = (frame.width, frame.height);
        rgba_to_yuv420(rgba, width, height, self.filter, frame)?;
        frame.pts = pts;
        self.next_pts += 1;

        self.stream
            .submit(Some(EncoderFrame::Video(self.frame.share())), writer)
    }

    /// Signal end of input and drain the encoder
    pub fn flush(&mut self, writer: &mut InterleavingWriter) -> Result<usize> {
        self.stream.submit(None, writer)
    }
}
