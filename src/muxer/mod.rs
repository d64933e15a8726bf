//! Container muxers

mod ebml;
pub mod matroska;

use crate::encoder::Packet;
use crate::{AudioCodec, Container, Rational, Result, VideoCodec};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Muxer trait.
///
/// The header is written when the muxer is created; packets arrive already
/// rescaled to [`Muxer::time_base`] and in interleaved order.
pub trait Muxer: Send {
    /// Time base the container stores timestamps in
    fn time_base(&self) -> Rational;

    /// Write a packet
    fn write_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Write the trailer, patch the header, and close the output
    fn finalize(self: Box<Self>) -> Result<()>;
}

/// Per-stream parameters recorded in the container header
#[derive(Debug, Clone)]
pub enum StreamConfig {
    Video {
        codec: VideoCodec,
        width: u32,
        height: u32,
        fps: u32,
        /// Codec-specific configuration data (e.g. av1C)
        codec_private: Option<Vec<u8>>,
    },
    Audio {
        codec: AudioCodec,
        sample_rate: u32,
        channels: u16,
        /// Codec-specific configuration data (e.g. OpusHead)
        codec_private: Option<Vec<u8>>,
        codec_delay_ns: u64,
    },
}

/// Create a muxer for the specified container format and write its header
pub fn create_muxer<P: AsRef<Path>>(
    container: Container,
    output_path: P,
    streams: &[StreamConfig],
) -> Result<Box<dyn Muxer>> {
    let file = File::create(output_path.as_ref())?;
    let writer = BufWriter::new(file);

    match container {
        Container::Matroska | Container::WebM => Ok(Box::new(matroska::MatroskaMuxer::new(
            writer,
            container.doc_type(),
            streams,
        )?)),
    }
}
