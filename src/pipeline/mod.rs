//! Per-medium encode pipelines
//!
//! [`StreamPipeline`] drives one encoder's send/receive protocol and forwards
//! every packet to the [`InterleavingWriter`] before returning. The video and
//! audio pipelines wrap it with input conversion, the reusable output frame,
//! and timestamp assignment.

pub mod audio;
pub mod video;

pub use audio::AudioPipeline;
pub use video::VideoPipeline;

use crate::encoder::{Encoder, Received, SendStatus};
use crate::frame::EncoderFrame;
use crate::writer::InterleavingWriter;
use crate::{Error, MediaKind, Rational, Result};

/// Encoder plus the stream it feeds
pub struct StreamPipeline {
    encoder: Box<dyn Encoder>,
    stream_index: usize,
    finished: bool,
    packets: u64,
}

impl StreamPipeline {
    pub fn new(encoder: Box<dyn Encoder>, stream_index: usize) -> Self {
        Self {
            encoder,
            stream_index,
            finished: false,
            packets: 0,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.encoder.kind()
    }

    /// Time base of the encoder's timestamps
    pub fn time_base(&self) -> Rational {
        self.encoder.time_base()
    }

    /// Whether end of stream has been reached
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Submit a frame (or `None` to flush) and write every packet it yields.
    ///
    /// Returns the number of packets forwarded. A flush drains the encoder to
    /// end of stream and marks the stream finished in the writer.
    pub fn submit(
        &mut self,
        frame: Option<EncoderFrame>,
        writer: &mut InterleavingWriter,
    ) -> Result<usize> {
        if self.finished {
            return Err(Error::InvalidState(format!(
                "{:?} stream {} is already closed",
                self.kind(),
                self.stream_index
            )));
        }

        let flushing = frame.is_none();
        let mut emitted = 0;

        loop {
            match self.encoder.send_frame(frame.clone())? {
                SendStatus::Accepted => break,
                SendStatus::NotReady => {
                    let (count, eos) = self.drain(writer)?;
                    emitted += count;
                    if count == 0 || eos {
                        return Err(Error::Encode(format!(
                            "{:?} encoder refused input without producing output",
                            self.kind()
                        )));
                    }
                }
            }
        }

        let (count, mut eos) = self.drain(writer)?;
        emitted += count;

        if flushing {
            while !eos {
                let (count, reached) = self.drain(writer)?;
                if count == 0 && !reached {
                    return Err(Error::Encode(format!(
                        "{:?} encoder stalled before end of stream",
                        self.kind()
                    )));
                }
                emitted += count;
                eos = reached;
            }
            self.finished = true;
            writer.finish_stream(self.stream_index)?;
            tracing::debug!(
                stream = self.stream_index,
                packets = self.packets,
                "stream flushed"
            );
        } else if eos {
            return Err(Error::Encode(format!(
                "{:?} encoder ended the stream before it was flushed",
                self.kind()
            )));
        }

        Ok(emitted)
    }

    /// Receive packets until the encoder has nothing more for now.
    /// Returns the packet count and whether end of stream was reached.
    fn drain(&mut self, writer: &mut InterleavingWriter) -> Result<(usize, bool)> {
        let mut count = 0;
        loop {
            match self.encoder.receive_packet()? {
                Received::Packet(packet) => {
                    writer.write_packet(self.stream_index, packet)?;
                    self.packets += 1;
                    count += 1;
                }
                Received::Pending => return Ok((count, false)),
                Received::EndOfStream => return Ok((count, true)),
            }
        }
    }
}
