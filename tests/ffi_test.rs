//! Integration tests for the C ABI

mod common;

use common::*;
use rawmux::error::ErrorCode;
use rawmux::ffi::*;
use std::ffi::CString;
use tempfile::TempDir;

#[test]
#[cfg(all(feature = "av1", feature = "opus"))]
fn test_session_through_c_abi() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ffi.mkv");
    let c_path = CString::new(path.to_str().unwrap()).unwrap();

    unsafe {
        let session = rawmux_session_new();
        assert_eq!(rawmux_audio_frame_size(session), 0);

        let result = rawmux_configure(session, c_path.as_ptr(), 64, 64, 30, 48000);
        assert_eq!(result.code, ErrorCode::Ok);
        let result = rawmux_open(session);
        assert_eq!(result.code, ErrorCode::Ok);

        let frame_size = rawmux_audio_frame_size(session);
        assert_eq!(frame_size, 960);

        let rgba = solid_rgba(64, 64, [0, 0, 255]);
        let pcm: Vec<u8> = tone_pcm(frame_size, 48000, 220.0, 0)
            .iter()
            .flat_map(|s| s.to_ne_bytes())
            .collect();

        for _ in 0..3 {
            let result = rawmux_supply_video(session, rgba.as_ptr(), rgba.len());
            assert_eq!(result.code, ErrorCode::Ok);
            let result = rawmux_supply_audio(session, pcm.as_ptr(), pcm.len());
            assert_eq!(result.code, ErrorCode::Ok);
        }

        // Half a frame of audio is rejected
        let mut result = rawmux_supply_audio(session, pcm.as_ptr(), pcm.len() / 2);
        assert_eq!(result.code, ErrorCode::InvalidInput);
        rawmux_free_result(&mut result);

        assert_eq!(rawmux_close(session).code, ErrorCode::Ok);
        assert_eq!(rawmux_close(session).code, ErrorCode::Ok);
        rawmux_session_free(session);
    }

    let info = parse_matroska(&path).unwrap();
    assert_eq!(info.tracks[1].codec_id, "A_OPUS");
    assert_eq!(info.track_blocks(1).len(), 3);
    assert_eq!(info.track_blocks(2).len(), 3);
}

#[test]
#[cfg(all(feature = "av1", feature = "opus"))]
fn test_configure_error_code() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.webm");
    let c_path = CString::new(path.to_str().unwrap()).unwrap();

    unsafe {
        let session = rawmux_session_new();
        let mut result = rawmux_configure(session, c_path.as_ptr(), 64, 64, 30, 44100);
        assert_eq!(result.code, ErrorCode::ConfigurationError);
        assert!(!result.message.is_null());
        rawmux_free_result(&mut result);

        let result = rawmux_configure(session, std::ptr::null(), 64, 64, 30, 48000);
        assert_eq!(result.code, ErrorCode::InvalidInput);
        rawmux_session_free(session);
    }

    assert!(!path.exists());
}
