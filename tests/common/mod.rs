//! Common test utilities

#![allow(dead_code)]

use std::path::Path;

/// Solid-colour RGBA frame
pub fn solid_rgba(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    std::iter::repeat([rgb[0], rgb[1], rgb[2], 255])
        .take((width * height) as usize)
        .flatten()
        .collect()
}

/// RGBA frame with a gradient that shifts with `index`, so frames differ
pub fn gradient_rgba(width: u32, height: u32, index: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(((x + index * 8) % 256) as u8);
            data.push(((y + index * 4) % 256) as u8);
            data.push(((x + y) % 256) as u8);
            data.push(255);
        }
    }
    data
}

/// Interleaved stereo silence
pub fn silent_pcm(frame_size: usize) -> Vec<i16> {
    vec![0; frame_size * 2]
}

/// Interleaved stereo sine at `freq` Hz, continuing from `start` samples
pub fn tone_pcm(frame_size: usize, sample_rate: u32, freq: f32, start: usize) -> Vec<i16> {
    (0..frame_size)
        .flat_map(|i| {
            let t = (start + i) as f32 / sample_rate as f32;
            let s = ((t * freq * std::f32::consts::TAU).sin() * 8000.0) as i16;
            [s, s]
        })
        .collect()
}

/// Verify that a file exists and has non-zero size
pub fn verify_file_exists_with_size<P: AsRef<Path>>(path: P) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    }
}

/// Get file size in bytes
pub fn get_file_size<P: AsRef<Path>>(path: P) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Track entry as read back from the file
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub number: u64,
    pub track_type: u64,
    pub codec_id: String,
    pub has_codec_private: bool,
}

/// SimpleBlock as read back from the file
#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
    pub track: u64,
    /// Absolute timestamp in milliseconds
    pub timestamp: i64,
    pub keyframe: bool,
    pub size: usize,
}

/// Parsed structure of a Matroska/WebM file
#[derive(Debug, Clone)]
pub struct MatroskaInfo {
    pub doc_type: String,
    /// Segment size as stored in the header, `None` if still "unknown"
    pub segment_size: Option<u64>,
    /// Bytes actually following the segment header
    pub segment_data_len: u64,
    pub duration_ms: Option<f64>,
    pub tracks: Vec<TrackInfo>,
    pub clusters: usize,
    pub blocks: Vec<BlockInfo>,
}

impl MatroskaInfo {
    pub fn track_blocks(&self, track: u64) -> Vec<BlockInfo> {
        self.blocks.iter().copied().filter(|b| b.track == track).collect()
    }
}

fn read_id(data: &[u8], pos: usize) -> Option<(u32, usize)> {
    let first = *data.get(pos)?;
    let len = first.leading_zeros() as usize + 1;
    if len > 4 {
        return None;
    }
    let bytes = data.get(pos..pos + len)?;
    Some((bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32), len))
}

/// Returns the size (`None` for the reserved unknown size) and its length in bytes
fn read_size(data: &[u8], pos: usize) -> Option<(Option<u64>, usize)> {
    let first = *data.get(pos)?;
    let len = first.leading_zeros() as usize + 1;
    if len > 8 {
        return None;
    }
    let bytes = data.get(pos..pos + len)?;
    let mask = if len == 8 { 0 } else { 0xFFu8 >> len };
    let mut value = (bytes[0] & mask) as u64;
    for &b in &bytes[1..] {
        value = (value << 8) | b as u64;
    }
    let all_ones = (1u64 << (7 * len)) - 1;
    Some(((value != all_ones).then_some(value), len))
}

/// Split a master element's payload into (id, payload) children
fn children(data: &[u8]) -> Vec<(u32, &[u8])> {
    let mut result = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let Some((id, id_len)) = read_id(data, pos) else { break };
        let Some((size, size_len)) = read_size(data, pos + id_len) else { break };
        let start = pos + id_len + size_len;
        let end = size.map_or(data.len(), |s| (start + s as usize).min(data.len()));
        result.push((id, &data[start..end]));
        pos = end;
    }
    result
}

fn read_uint(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Parse the parts of a Matroska file the tests care about
pub fn parse_matroska<P: AsRef<Path>>(path: P) -> std::io::Result<MatroskaInfo> {
    let bytes = std::fs::read(path)?;
    let invalid = |msg: &str| std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string());

    let top = children(&bytes);
    let (_, header) = top
        .iter()
        .find(|(id, _)| *id == 0x1A45DFA3)
        .ok_or_else(|| invalid("missing EBML header"))?;
    let doc_type = children(header)
        .iter()
        .find(|(id, _)| *id == 0x4282)
        .map(|(_, d)| String::from_utf8_lossy(d).into_owned())
        .ok_or_else(|| invalid("missing DocType"))?;

    // Locate the segment header to read its declared size
    let segment_pos = header.len()
        + read_size(&bytes, 4).map(|(_, l)| l).unwrap_or(0)
        + 4;
    let (seg_id, seg_id_len) = read_id(&bytes, segment_pos).ok_or_else(|| invalid("no segment"))?;
    if seg_id != 0x18538067 {
        return Err(invalid("segment does not follow the EBML header"));
    }
    let (segment_size, seg_size_len) =
        read_size(&bytes, segment_pos + seg_id_len).ok_or_else(|| invalid("bad segment size"))?;
    let segment_start = segment_pos + seg_id_len + seg_size_len;
    let segment = &bytes[segment_start..];

    let mut info = MatroskaInfo {
        doc_type,
        segment_size,
        segment_data_len: segment.len() as u64,
        duration_ms: None,
        tracks: Vec::new(),
        clusters: 0,
        blocks: Vec::new(),
    };

    for (id, data) in children(segment) {
        match id {
            0x1549A966 => {
                for (child, value) in children(data) {
                    if child == 0x4489 && value.len() == 8 {
                        let mut raw = [0u8; 8];
                        raw.copy_from_slice(value);
                        info.duration_ms = Some(f64::from_be_bytes(raw));
                    }
                }
            }
            0x1654AE6B => {
                for (child, entry) in children(data) {
                    if child != 0xAE {
                        continue;
                    }
                    let mut track = TrackInfo {
                        number: 0,
                        track_type: 0,
                        codec_id: String::new(),
                        has_codec_private: false,
                    };
                    for (field, value) in children(entry) {
                        match field {
                            0xD7 => track.number = read_uint(value),
                            0x83 => track.track_type = read_uint(value),
                            0x86 => track.codec_id = String::from_utf8_lossy(value).into_owned(),
                            0x63A2 => track.has_codec_private = !value.is_empty(),
                            _ => {}
                        }
                    }
                    info.tracks.push(track);
                }
            }
            0x1F43B675 => {
                info.clusters += 1;
                let mut cluster_ts = 0i64;
                for (child, value) in children(data) {
                    match child {
                        0xE7 => cluster_ts = read_uint(value) as i64,
                        0xA3 if value.len() >= 4 => {
                            let relative = i16::from_be_bytes([value[1], value[2]]);
                            info.blocks.push(BlockInfo {
                                track: (value[0] & 0x7F) as u64,
                                timestamp: cluster_ts + relative as i64,
                                keyframe: value[3] & 0x80 != 0,
                                size: value.len() - 4,
                            });
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_size() {
        assert_eq!(read_size(&[0x81], 0), Some((Some(1), 1)));
        assert_eq!(read_size(&[0x40, 0x7F], 0), Some((Some(127), 2)));
        assert_eq!(read_size(&[0xFF], 0), Some((None, 1)));
        assert_eq!(
            read_size(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], 0),
            Some((None, 8))
        );
    }

    #[test]
    fn test_solid_rgba_length() {
        assert_eq!(solid_rgba(4, 2, [1, 2, 3]).len(), 32);
        assert_eq!(tone_pcm(960, 48000, 440.0, 0).len(), 1920);
    }
}
