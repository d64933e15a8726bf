//! FFI (Foreign Function Interface) for C interoperability
//!
//! A session is an opaque pointer created by [`rawmux_session_new`] and
//! released by [`rawmux_session_free`]. Every other call returns an
//! [`FfiResult`] whose message must be released with [`rawmux_free_result`].

use crate::convert::s16_from_ne_bytes;
use crate::error::ErrorCode;
use crate::{Error, Session};
use libc::{c_char, size_t};
use std::ffi::{CStr, CString};
use std::ptr;
use std::slice;

/// FFI result structure
#[repr(C)]
pub struct FfiResult {
    pub code: ErrorCode,
    pub message: *mut c_char,
}

impl FfiResult {
    fn ok() -> Self {
        Self {
            code: ErrorCode::Ok,
            message: ptr::null_mut(),
        }
    }

    fn error(code: ErrorCode, message: &str) -> Self {
        let c_message = CString::new(message).unwrap_or_else(|_| c"Unknown error".to_owned());
        Self {
            code,
            message: c_message.into_raw(),
        }
    }

    fn from_result(result: crate::Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::from(&e),
        }
    }
}

impl From<&Error> for FfiResult {
    fn from(err: &Error) -> Self {
        Self::error(ErrorCode::from(err), &err.to_string())
    }
}

/// Create a new, unconfigured session
#[no_mangle]
pub extern "C" fn rawmux_session_new() -> *mut Session {
    Box::into_raw(Box::new(Session::new()))
}

/// Free a session, closing it first if it is still open
///
/// # Safety
/// - `session` must be null or a pointer returned by `rawmux_session_new` that
///   has not been freed yet
#[no_mangle]
pub unsafe extern "C" fn rawmux_session_free(session: *mut Session) {
    if session.is_null() {
        return;
    }
    drop(Box::from_raw(session));
}

/// Configure the output file, picture size, frame rate and audio sample rate
///
/// # Safety
/// - `session` must be a valid session pointer
/// - `output_path` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn rawmux_configure(
    session: *mut Session,
    output_path: *const c_char,
    width: u32,
    height: u32,
    framerate: u32,
    sample_rate: u32,
) -> FfiResult {
    let Some(session) = session.as_mut() else {
        return FfiResult::error(ErrorCode::InvalidInput, "Session is null");
    };
    if output_path.is_null() {
        return FfiResult::error(ErrorCode::InvalidInput, "Output path is null");
    }

    let output_path = match CStr::from_ptr(output_path).to_str() {
        Ok(s) => s.to_string(),
        Err(_) => return FfiResult::error(ErrorCode::InvalidInput, "Invalid output path"),
    };

    FfiResult::from_result(session.configure(output_path, width, height, framerate, sample_rate))
}

/// Open the encoders and write the container header
///
/// # Safety
/// - `session` must be a valid session pointer
#[no_mangle]
pub unsafe extern "C" fn rawmux_open(session: *mut Session) -> FfiResult {
    match session.as_mut() {
        Some(session) => FfiResult::from_result(session.open()),
        None => FfiResult::error(ErrorCode::InvalidInput, "Session is null"),
    }
}

/// Supply one packed RGBA frame of `width * height * 4` bytes
///
/// # Safety
/// - `session` must be a valid session pointer
/// - `rgba` must point to `len` readable bytes
#[no_mangle]
pub unsafe extern "C" fn rawmux_supply_video(
    session: *mut Session,
    rgba: *const u8,
    len: size_t,
) -> FfiResult {
    let Some(session) = session.as_mut() else {
        return FfiResult::error(ErrorCode::InvalidInput, "Session is null");
    };
    if rgba.is_null() {
        return FfiResult::error(ErrorCode::InvalidInput, "Video buffer is null");
    }

    let rgba = slice::from_raw_parts(rgba, len);
    FfiResult::from_result(session.supply_video(rgba))
}

/// Supply one frame of interleaved native-endian 16-bit stereo samples
///
/// `byte_count` must equal `rawmux_audio_frame_size() * 2 channels * 2 bytes`.
///
/// # Safety
/// - `session` must be a valid session pointer
/// - `pcm` must point to `byte_count` readable bytes (no alignment required)
#[no_mangle]
pub unsafe extern "C" fn rawmux_supply_audio(
    session: *mut Session,
    pcm: *const u8,
    byte_count: size_t,
) -> FfiResult {
    let Some(session) = session.as_mut() else {
        return FfiResult::error(ErrorCode::InvalidInput, "Session is null");
    };
    if pcm.is_null() {
        return FfiResult::error(ErrorCode::InvalidInput, "Audio buffer is null");
    }

    let samples = match s16_from_ne_bytes(slice::from_raw_parts(pcm, byte_count)) {
        Ok(samples) => samples,
        Err(e) => return FfiResult::from(&e),
    };
    FfiResult::from_result(session.supply_audio(&samples))
}

/// Samples per channel each audio frame must hold, or 0 before `rawmux_open`
///
/// # Safety
/// - `session` must be null or a valid session pointer
#[no_mangle]
pub unsafe extern "C" fn rawmux_audio_frame_size(session: *const Session) -> size_t {
    session
        .as_ref()
        .and_then(Session::audio_frame_size)
        .unwrap_or(0)
}

/// Flush the encoders and write the trailer. Calling it again does nothing.
///
/// # Safety
/// - `session` must be a valid session pointer
#[no_mangle]
pub unsafe extern "C" fn rawmux_close(session: *mut Session) -> FfiResult {
    match session.as_mut() {
        Some(session) => FfiResult::from_result(session.close()),
        None => FfiResult::error(ErrorCode::InvalidInput, "Session is null"),
    }
}

/// Free a result's message string
///
/// # Safety
/// - `result` must point to a valid `FfiResult` that was returned by a rawmux function
#[no_mangle]
pub unsafe extern "C" fn rawmux_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }

    let result = &mut *result;
    if !result.message.is_null() {
        // Reclaim the CString and let it drop
        let _ = CString::from_raw(result.message);
        result.message = ptr::null_mut();
    }
}

/// Get version string
#[no_mangle]
pub extern "C" fn rawmux_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
