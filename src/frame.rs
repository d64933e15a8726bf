//! Raw frames handed to encoders, and the copy-on-write holder pipelines reuse

use crate::{Error, Result};
use std::sync::Arc;

/// Planar YUV 4:2:0 picture, 8 bits per sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Y, U and V planes, tightly packed (stride == plane width)
    pub planes: [Vec<u8>; 3],
    /// Presentation timestamp in the encoder's time base
    pub pts: i64,
}

impl VideoFrame {
    /// Allocate a black frame of the given size
    pub fn new(width: u32, height: u32) -> Self {
        let luma = width as usize * height as usize;
        let chroma = Self::chroma_width_of(width) * Self::chroma_height_of(height);
        Self {
            width,
            height,
            planes: [vec![16; luma], vec![128; chroma], vec![128; chroma]],
            pts: 0,
        }
    }

    /// Allocate a black frame, reporting allocation failure instead of aborting
    pub fn try_new(width: u32, height: u32) -> Result<Self> {
        let luma = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| Error::Allocation(format!("{}x{} frame is too large", width, height)))?;
        let chroma = Self::chroma_width_of(width) * Self::chroma_height_of(height);
        Ok(Self {
            width,
            height,
            planes: [
                filled_plane(luma, 16)?,
                filled_plane(chroma, 128)?,
                filled_plane(chroma, 128)?,
            ],
            pts: 0,
        })
    }

    fn chroma_width_of(width: u32) -> usize {
        (width as usize).div_ceil(2)
    }

    fn chroma_height_of(height: u32) -> usize {
        (height as usize).div_ceil(2)
    }

    /// Width of the U and V planes
    pub fn chroma_width(&self) -> usize {
        Self::chroma_width_of(self.width)
    }

    /// Height of the U and V planes
    pub fn chroma_height(&self) -> usize {
        Self::chroma_height_of(self.height)
    }

    /// Row stride of the given plane in bytes
    pub fn stride(&self, plane: usize) -> usize {
        if plane == 0 {
            self.width as usize
        } else {
            self.chroma_width()
        }
    }
}

fn filled_plane(len: usize, value: u8) -> Result<Vec<u8>> {
    let mut plane = Vec::new();
    plane
        .try_reserve_exact(len)
        .map_err(|e| Error::Allocation(format!("{} byte plane: {}", len, e)))?;
    plane.resize(len, value);
    Ok(plane)
}

/// Interleaved 32-bit float audio frame
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved samples, `nb_samples * channels` long
    pub samples: Vec<f32>,
    /// Presentation timestamp in the encoder's time base
    pub pts: i64,
}

impl AudioFrame {
    /// Allocate a silent frame holding `nb_samples` samples per channel
    pub fn new(channels: u16, sample_rate: u32, nb_samples: usize) -> Self {
        Self {
            channels,
            sample_rate,
            samples: vec![0.0; nb_samples * channels as usize],
            pts: 0,
        }
    }

    /// Samples per channel
    pub fn nb_samples(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Frame submitted to an encoder. Encoders may keep the `Arc` after submission.
#[derive(Debug, Clone)]
pub enum EncoderFrame {
    Video(Arc<VideoFrame>),
    Audio(Arc<AudioFrame>),
}

/// Frame types that can produce a fresh buffer with the same geometry
pub trait FrameBuffer: Clone {
    fn alloc_like(&self) -> Self;
}

impl FrameBuffer for VideoFrame {
    fn alloc_like(&self) -> Self {
        VideoFrame::new(self.width, self.height)
    }
}

impl FrameBuffer for AudioFrame {
    fn alloc_like(&self) -> Self {
        AudioFrame::new(self.channels, self.sample_rate, self.nb_samples())
    }
}

/// Reusable frame owned by one pipeline.
///
/// The pipeline holds the only mutable handle. Submitting the frame hands the
/// encoder a read-only `Arc` clone; [`SharedFrame::make_writable`] reuses the
/// buffer in place when nobody else holds it and swaps in a fresh backing
/// store otherwise, so a frame the encoder still references is never touched.
#[derive(Debug)]
pub struct SharedFrame<T> {
    inner: Arc<T>,
    reallocations: u64,
}

impl<T: FrameBuffer> SharedFrame<T> {
    pub fn new(frame: T) -> Self {
        Self {
            inner: Arc::new(frame),
            reallocations: 0,
        }
    }

    /// Exclusive access to the frame contents
    pub fn make_writable(&mut self) -> &mut T {
        if Arc::get_mut(&mut self.inner).is_none() {
            self.inner = Arc::new(self.inner.alloc_like());
            self.reallocations += 1;
        }
        // Unique at this point, so no clone happens.
        Arc::make_mut(&mut self.inner)
    }

    /// Read-only handle for submission
    pub fn share(&self) -> Arc<T> {
        Arc::clone(&self.inner)
    }

    /// Number of times a fresh backing store had to be allocated
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    pub fn get(&self) -> &T {
        &self.inner
    }
}
