//! Matroska / WebM container muxer
//!
//! Layout: EBML header, then a Segment holding Info, Tracks and Clusters.
//! The Segment size and the Info Duration are written as placeholders and
//! patched by seeking back when the muxer is finalized. Clusters are built
//! in memory and written with their final size.

use super::ebml::{
    element, encode_id, encode_size_fixed8, encode_uint, float_element, string_element,
    uint_element,
};
use super::{Muxer, StreamConfig};
use crate::encoder::Packet;
use crate::{AudioCodec, Error, Rational, Result, VideoCodec};
use std::io::{Seek, SeekFrom, Write};

const EBML_HEADER: u32 = 0x1A45DFA3;
const SEGMENT: u32 = 0x18538067;
const INFO: u32 = 0x1549A966;
const TIMESTAMP_SCALE: u32 = 0x2AD7B1;
const MUXING_APP: u32 = 0x4D80;
const WRITING_APP: u32 = 0x5741;
const DURATION: u32 = 0x4489;
const TRACKS: u32 = 0x1654AE6B;
const TRACK_ENTRY: u32 = 0xAE;
const TRACK_NUMBER: u32 = 0xD7;
const TRACK_UID: u32 = 0x73C5;
const TRACK_TYPE: u32 = 0x83;
const FLAG_LACING: u32 = 0x9C;
const CODEC_ID: u32 = 0x86;
const CODEC_PRIVATE: u32 = 0x63A2;
const CODEC_DELAY: u32 = 0x56AA;
const SEEK_PRE_ROLL: u32 = 0x56BB;
const DEFAULT_DURATION: u32 = 0x23E383;
const VIDEO: u32 = 0xE0;
const PIXEL_WIDTH: u32 = 0xB0;
const PIXEL_HEIGHT: u32 = 0xBA;
const AUDIO: u32 = 0xE1;
const SAMPLING_FREQUENCY: u32 = 0xB5;
const CHANNELS: u32 = 0x9F;
const BIT_DEPTH: u32 = 0x6264;
const CLUSTER: u32 = 0x1F43B675;
const CLUSTER_TIMESTAMP: u32 = 0xE7;
const SIMPLE_BLOCK: u32 = 0xA3;

/// 8-byte "unknown size" marker
const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Nanoseconds per timestamp tick (1 ms)
const TIMESTAMP_SCALE_NS: u64 = 1_000_000;

/// Start a new cluster once the current one spans this many milliseconds
const MAX_CLUSTER_DURATION_MS: i64 = 5_000;

/// Opus decoders need 80 ms of pre-roll after a seek
const OPUS_SEEK_PRE_ROLL_NS: u64 = 80_000_000;

struct Cluster {
    timecode: i64,
    blocks: Vec<u8>,
}

/// Matroska muxer writing to any seekable sink
pub struct MatroskaMuxer<W: Write + Seek> {
    writer: W,
    /// Whether each track (by stream index) carries video
    video_tracks: Vec<bool>,
    segment_size_pos: u64,
    segment_data_start: u64,
    duration_pos: u64,
    cluster: Option<Cluster>,
    end_timestamp: i64,
    blocks_written: u64,
}

impl<W: Write + Seek> MatroskaMuxer<W> {
    /// Create the muxer and write the header
    pub fn new(mut writer: W, doc_type: &str, streams: &[StreamConfig]) -> Result<Self> {
        if streams.is_empty() || streams.len() > 126 {
            return Err(Error::Mux(format!(
                "Matroska muxer needs 1-126 streams, got {}",
                streams.len()
            )));
        }

        writer.write_all(&element(EBML_HEADER, &ebml_header(doc_type)))?;

        // Segment size stays "unknown" until finish() patches it
        writer.write_all(&encode_id(SEGMENT))?;
        let segment_size_pos = writer.stream_position()?;
        writer.write_all(&UNKNOWN_SIZE)?;
        let segment_data_start = writer.stream_position()?;

        // Info, with Duration last so its payload offset is known
        let mut info = Vec::new();
        info.extend(uint_element(TIMESTAMP_SCALE, TIMESTAMP_SCALE_NS));
        info.extend(string_element(MUXING_APP, concat!("rawmux-", env!("CARGO_PKG_VERSION"))));
        info.extend(string_element(WRITING_APP, concat!("rawmux-", env!("CARGO_PKG_VERSION"))));
        info.extend(float_element(DURATION, 0.0));
        let info = element(INFO, &info);
        let duration_pos = writer.stream_position()? + info.len() as u64 - 8;
        writer.write_all(&info)?;

        let mut tracks = Vec::new();
        for (index, stream) in streams.iter().enumerate() {
            tracks.extend(element(TRACK_ENTRY, &track_entry(index as u64 + 1, stream)));
        }
        writer.write_all(&element(TRACKS, &tracks))?;

        Ok(Self {
            writer,
            video_tracks: streams
                .iter()
                .map(|s| matches!(s, StreamConfig::Video { .. }))
                .collect(),
            segment_size_pos,
            segment_data_start,
            duration_pos,
            cluster: None,
            end_timestamp: 0,
            blocks_written: 0,
        })
    }

    /// Number of blocks written so far
    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    fn needs_new_cluster(&self, packet: &Packet) -> bool {
        let Some(cluster) = &self.cluster else {
            return true;
        };
        let relative = packet.pts - cluster.timecode;
        let is_video = self
            .video_tracks
            .get(packet.stream_index)
            .copied()
            .unwrap_or(false);

        relative < i16::MIN as i64
            || relative > i16::MAX as i64
            || relative >= MAX_CLUSTER_DURATION_MS
            || (is_video && packet.is_keyframe && !cluster.blocks.is_empty())
    }

    fn write_cluster(&mut self) -> Result<()> {
        if let Some(cluster) = self.cluster.take() {
            let mut data = uint_element(CLUSTER_TIMESTAMP, cluster.timecode as u64);
            data.extend(cluster.blocks);
            self.writer.write_all(&element(CLUSTER, &data))?;
        }
        Ok(())
    }

    /// Write the last cluster, patch the header, and return the sink
    pub fn finish(mut self) -> Result<W> {
        self.write_cluster()?;

        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(self.segment_size_pos))?;
        self.writer
            .write_all(&encode_size_fixed8(end - self.segment_data_start))?;
        self.writer.seek(SeekFrom::Start(self.duration_pos))?;
        self.writer
            .write_all(&(self.end_timestamp as f64).to_be_bytes())?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        tracing::debug!(
            blocks = self.blocks_written,
            duration_ms = self.end_timestamp,
            bytes = end,
            "matroska trailer written"
        );
        Ok(self.writer)
    }
}

impl<W: Write + Seek + Send> Muxer for MatroskaMuxer<W> {
    fn time_base(&self) -> Rational {
        Rational::new(1, (1_000_000_000 / TIMESTAMP_SCALE_NS) as i64)
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        if packet.stream_index >= self.video_tracks.len() {
            return Err(Error::Mux(format!(
                "packet for unknown stream {}",
                packet.stream_index
            )));
        }

        if self.needs_new_cluster(packet) {
            self.write_cluster()?;
            self.cluster = Some(Cluster {
                timecode: packet.pts.max(0),
                blocks: Vec::new(),
            });
        }

        if let Some(cluster) = self.cluster.as_mut() {
            let relative = (packet.pts - cluster.timecode) as i16;
            let mut block = Vec::with_capacity(packet.data.len() + 4);
            block.push(0x80 | (packet.stream_index as u8 + 1));
            block.extend_from_slice(&relative.to_be_bytes());
            block.push(if packet.is_keyframe { 0x80 } else { 0x00 });
            block.extend_from_slice(&packet.data);
            cluster.blocks.extend(element(SIMPLE_BLOCK, &block));
        }

        self.end_timestamp = self.end_timestamp.max(packet.pts + packet.duration);
        self.blocks_written += 1;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<()> {
        self.finish().map(|_| ())
    }
}

fn ebml_header(doc_type: &str) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend(uint_element(0x4286, 1)); // EBMLVersion
    data.extend(uint_element(0x42F7, 1)); // EBMLReadVersion
    data.extend(uint_element(0x42F2, 4)); // EBMLMaxIDLength
    data.extend(uint_element(0x42F3, 8)); // EBMLMaxSizeLength
    data.extend(string_element(0x4282, doc_type)); // DocType
    data.extend(uint_element(0x4287, 4)); // DocTypeVersion
    data.extend(uint_element(0x4285, 2)); // DocTypeReadVersion
    data
}

fn track_entry(number: u64, stream: &StreamConfig) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend(uint_element(TRACK_NUMBER, number));
    data.extend(uint_element(TRACK_UID, number));

    match stream {
        StreamConfig::Video {
            codec,
            width,
            height,
            fps,
            codec_private,
        } => {
            data.extend(uint_element(TRACK_TYPE, 1));
            data.extend(uint_element(FLAG_LACING, 0));
            data.extend(string_element(CODEC_ID, video_codec_id(*codec)));
            if let Some(private) = codec_private {
                data.extend(element(CODEC_PRIVATE, private));
            }
            if *fps > 0 {
                data.extend(uint_element(DEFAULT_DURATION, 1_000_000_000 / *fps as u64));
            }
            let mut video = uint_element(PIXEL_WIDTH, *width as u64);
            video.extend(uint_element(PIXEL_HEIGHT, *height as u64));
            data.extend(element(VIDEO, &video));
        }
        StreamConfig::Audio {
            codec,
            sample_rate,
            channels,
            codec_private,
            codec_delay_ns,
        } => {
            data.extend(uint_element(TRACK_TYPE, 2));
            data.extend(uint_element(FLAG_LACING, 0));
            data.extend(string_element(CODEC_ID, audio_codec_id(*codec)));
            if let Some(private) = codec_private {
                data.extend(element(CODEC_PRIVATE, private));
            }
            if *codec_delay_ns > 0 {
                data.extend(uint_element(CODEC_DELAY, *codec_delay_ns));
            }
            if *codec == AudioCodec::Opus {
                data.extend(uint_element(SEEK_PRE_ROLL, OPUS_SEEK_PRE_ROLL_NS));
            }
            let mut audio = float_element(SAMPLING_FREQUENCY, *sample_rate as f64);
            audio.extend(element(CHANNELS, &encode_uint(*channels as u64)));
            if *codec == AudioCodec::Pcm {
                audio.extend(uint_element(BIT_DEPTH, 32));
            }
            data.extend(element(AUDIO, &audio));
        }
    }

    data
}

fn video_codec_id(codec: VideoCodec) -> &'static str {
    match codec {
        VideoCodec::Av1 => "V_AV1",
    }
}

fn audio_codec_id(codec: AudioCodec) -> &'static str {
    match codec {
        AudioCodec::Opus => "A_OPUS",
        AudioCodec::Pcm => "A_PCM/FLOAT/IEEE",
    }
}
