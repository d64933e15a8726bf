//! Integration tests for the encode session

mod common;

use common::*;
use rawmux::{AudioCodec, Error, Session, SessionOptions, SessionState};
use tempfile::TempDir;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;
const FPS: u32 = 30;

fn fast_options(path: std::path::PathBuf, sample_rate: u32) -> SessionOptions {
    let mut options = SessionOptions::new(path, WIDTH, HEIGHT, FPS, sample_rate);
    options.speed = 10;
    options.quality = 40;
    options
}

fn pcm_options(path: std::path::PathBuf) -> SessionOptions {
    let mut options = fast_options(path, 48000);
    options.audio_codec = Some(AudioCodec::Pcm);
    options
}

fn expected_ms(index: i64, num: i64, den: i64) -> i64 {
    // Round half away from zero, timestamps are non-negative
    (2 * index * num * 1000 + den) / (2 * den)
}

#[test]
fn test_supply_before_open() {
    let mut session = Session::new();
    let rgba = solid_rgba(WIDTH, HEIGHT, [0, 0, 0]);
    assert!(matches!(
        session.supply_video(&rgba),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn test_odd_dimensions_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("odd.mkv");

    let mut session = Session::new();
    let result = session.configure(&path, 65, 64, FPS, 48000);
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert_eq!(session.state(), SessionState::Unconfigured);
    assert!(!path.exists());
}

#[test]
#[cfg(all(feature = "av1", feature = "opus"))]
fn test_unsupported_sample_rate_creates_no_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("capture.webm");

    let mut session = Session::new();
    let result = session.configure(&path, WIDTH, HEIGHT, FPS, 44100);
    assert!(
        matches!(result, Err(Error::Configuration(_))),
        "unexpected result: {:?}",
        result
    );
    assert!(session.open().is_err());
    assert!(!path.exists());
}

#[test]
#[cfg(feature = "av1")]
fn test_open_close_without_frames() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.mkv");

    let mut session = Session::new();
    session.configure_with(pcm_options(path.clone())).unwrap();
    session.open().unwrap();
    assert_eq!(session.state(), SessionState::Opened);
    assert_eq!(session.audio_frame_size(), Some(1024));
    session.close().unwrap();
    assert_eq!(session.state(), SessionState::Closed);

    let info = parse_matroska(&path).unwrap();
    assert_eq!(info.doc_type, "matroska");
    assert_eq!(info.segment_size, Some(info.segment_data_len));
    assert_eq!(info.tracks.len(), 2);
    assert_eq!(info.tracks[0].codec_id, "V_AV1");
    assert!(info.tracks[0].has_codec_private);
    assert_eq!(info.tracks[1].codec_id, "A_PCM/FLOAT/IEEE");
    assert!(info.blocks.is_empty());
    assert_eq!(info.duration_ms, Some(0.0));
}

#[test]
#[cfg(feature = "av1")]
fn test_video_and_audio_timestamps() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("capture.mkv");
    let frames = 15;
    let audio_calls = 8;

    let mut session = Session::new();
    session.configure_with(pcm_options(path.clone())).unwrap();
    session.open().unwrap();
    let frame_size = session.audio_frame_size().unwrap();

    for i in 0..frames {
        session
            .supply_video(&gradient_rgba(WIDTH, HEIGHT, i as u32))
            .unwrap();
        if i < audio_calls {
            session
                .supply_audio(&tone_pcm(frame_size, 48000, 440.0, i * frame_size))
                .unwrap();
        }
    }

    let stats = session.stats();
    assert_eq!(stats.video_frames, frames as u64);
    assert_eq!(stats.audio_samples, (audio_calls * frame_size) as u64);
    session.close().unwrap();

    let info = parse_matroska(&path).unwrap();
    assert_eq!(info.segment_size, Some(info.segment_data_len));

    let mut video: Vec<i64> = info.track_blocks(1).iter().map(|b| b.timestamp).collect();
    video.sort_unstable();
    let expected: Vec<i64> = (0..frames as i64).map(|n| expected_ms(n, 1, FPS as i64)).collect();
    assert_eq!(video, expected);
    assert!(info.track_blocks(1)[0].keyframe);

    let audio: Vec<i64> = info.track_blocks(2).iter().map(|b| b.timestamp).collect();
    let expected: Vec<i64> = (0..audio_calls as i64)
        .map(|n| expected_ms(n, frame_size as i64, 48000))
        .collect();
    assert_eq!(audio, expected);
    assert!(info
        .track_blocks(2)
        .iter()
        .all(|b| b.size == frame_size * 2 * 4));

    // The two tracks are interleaved rather than written back to back
    let tracks: Vec<u64> = info.blocks.iter().map(|b| b.track).collect();
    let switches = tracks.windows(2).filter(|w| w[0] != w[1]).count();
    assert!(switches > 2, "tracks not interleaved: {:?}", tracks);

    let duration = info.duration_ms.unwrap();
    assert!(duration >= 466.0, "duration {}", duration);
}

#[test]
#[cfg(all(feature = "av1", feature = "opus"))]
fn test_webm_with_opus() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("capture.webm");

    let mut session = Session::new();
    session.configure_with(fast_options(path.clone(), 48000)).unwrap();
    session.open().unwrap();
    let frame_size = session.audio_frame_size().unwrap();
    assert_eq!(frame_size, 960);

    for i in 0..10 {
        session.supply_audio(&silent_pcm(frame_size)).unwrap();
        if i % 2 == 0 {
            session
                .supply_video(&solid_rgba(WIDTH, HEIGHT, [200, 30, 30]))
                .unwrap();
        }
    }
    session.close().unwrap();

    let info = parse_matroska(&path).unwrap();
    assert_eq!(info.doc_type, "webm");
    assert_eq!(info.tracks[1].codec_id, "A_OPUS");
    assert!(info.tracks[1].has_codec_private);
    assert_eq!(info.track_blocks(1).len(), 5);

    let audio: Vec<i64> = info.track_blocks(2).iter().map(|b| b.timestamp).collect();
    assert_eq!(audio, (0..10).map(|n| n * 20).collect::<Vec<_>>());
}

#[test]
#[cfg(feature = "av1")]
fn test_close_twice() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("twice.mkv");

    let mut session = Session::new();
    session.configure_with(pcm_options(path.clone())).unwrap();
    session.open().unwrap();
    session
        .supply_video(&solid_rgba(WIDTH, HEIGHT, [0, 128, 0]))
        .unwrap();
    session.close().unwrap();
    let size = get_file_size(&path).unwrap();

    session.close().unwrap();
    assert_eq!(get_file_size(&path).unwrap(), size);
    assert!(matches!(
        session.supply_video(&solid_rgba(WIDTH, HEIGHT, [0, 128, 0])),
        Err(Error::InvalidState(_))
    ));
}

#[test]
#[cfg(feature = "av1")]
fn test_wrong_buffer_length_keeps_session_usable() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lengths.mkv");

    let mut session = Session::new();
    session.configure_with(pcm_options(path.clone())).unwrap();
    session.open().unwrap();

    let short = vec![0u8; (WIDTH * HEIGHT * 4 - 4) as usize];
    assert!(matches!(
        session.supply_video(&short),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        session.supply_audio(&[0i16; 10]),
        Err(Error::InvalidInput(_))
    ));
    assert!(!session.is_poisoned());

    session
        .supply_video(&solid_rgba(WIDTH, HEIGHT, [10, 10, 10]))
        .unwrap();
    session.close().unwrap();

    let info = parse_matroska(&path).unwrap();
    assert_eq!(info.track_blocks(1).len(), 1);
}

#[test]
#[cfg(feature = "av1")]
fn test_drop_closes_session() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dropped.mkv");

    {
        let mut session = Session::new();
        session.configure_with(pcm_options(path.clone())).unwrap();
        session.open().unwrap();
        for i in 0..3 {
            session.supply_video(&gradient_rgba(WIDTH, HEIGHT, i)).unwrap();
        }
    }

    let info = parse_matroska(&path).unwrap();
    assert_eq!(info.segment_size, Some(info.segment_data_len));
    assert_eq!(info.track_blocks(1).len(), 3);
}

#[test]
#[cfg(feature = "av1")]
fn test_unknown_extension_writes_matroska() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("capture.bin");

    let mut session = Session::new();
    session.configure_with(pcm_options(path.clone())).unwrap();
    session.open().unwrap();
    session.close().unwrap();

    assert_eq!(parse_matroska(&path).unwrap().doc_type, "matroska");
}

#[test]
#[cfg(feature = "av1")]
fn test_open_failure_returns_to_unconfigured() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing").join("capture.mkv");

    let mut session = Session::new();
    session.configure_with(pcm_options(path.clone())).unwrap();
    assert!(matches!(session.open(), Err(Error::Io(_))));
    assert_eq!(session.state(), SessionState::Unconfigured);
    assert!(!path.exists());

    // Can be configured again with a usable path
    let path = temp_dir.path().join("capture.mkv");
    session.configure_with(pcm_options(path.clone())).unwrap();
    session.open().unwrap();
    session.close().unwrap();
    assert!(verify_file_exists_with_size(&path));
}

#[test]
#[cfg(feature = "av1")]
fn test_low_latency_keeps_presentation_order() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("lowlat.mkv");

    let mut options = pcm_options(path.clone());
    options.low_latency = true;
    let mut session = Session::new();
    session.configure_with(options).unwrap();
    session.open().unwrap();
    for i in 0..6 {
        session.supply_video(&gradient_rgba(WIDTH, HEIGHT, i)).unwrap();
    }
    session.close().unwrap();

    let info = parse_matroska(&path).unwrap();
    let video: Vec<i64> = info.track_blocks(1).iter().map(|b| b.timestamp).collect();
    assert_eq!(video, (0..6).map(|n| expected_ms(n, 1, FPS as i64)).collect::<Vec<_>>());
}
