//! Audio sample format conversion with a carried delay buffer
//!
//! Only same-rate conversion is supported: interleaved S16 in, interleaved
//! F32 out. Samples that do not fit into the caller's output are kept and
//! emitted first on the next call.

use crate::convert::s16_to_f32;
use crate::{Error, Result};

/// Rate and channel layout of one side of the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Stateful S16 to F32 converter
#[derive(Debug)]
pub struct Resampler {
    input: AudioSpec,
    output: AudioSpec,
    /// Converted samples not yet handed out, interleaved
    delay: Vec<f32>,
}

impl Resampler {
    pub fn new(input: AudioSpec, output: AudioSpec) -> Result<Self> {
        if input.sample_rate == 0 || input.channels == 0 {
            return Err(Error::Configuration(format!(
                "invalid resampler input {:?}",
                input
            )));
        }
        if input.sample_rate != output.sample_rate {
            return Err(Error::Configuration(format!(
                "sample rate conversion {} Hz -> {} Hz is not supported",
                input.sample_rate, output.sample_rate
            )));
        }
        if input.channels != output.channels {
            return Err(Error::Configuration(format!(
                "channel remixing {} -> {} is not supported",
                input.channels, output.channels
            )));
        }

        Ok(Self {
            input,
            output,
            delay: Vec::new(),
        })
    }

    /// Samples per channel buffered from earlier calls
    pub fn delay(&self) -> usize {
        self.delay.len() / self.output.channels as usize
    }

    /// Number of output samples per channel that `in_samples` more input will yield,
    /// including anything still buffered (rounded up)
    pub fn output_samples_for(&self, in_samples: usize) -> usize {
        let total = (self.delay() + in_samples) as u128 * self.output.sample_rate as u128;
        let rate = self.input.sample_rate as u128;
        total.div_ceil(rate) as usize
    }

    /// Convert interleaved `input` into `output`, returning samples written per channel.
    ///
    /// Whatever does not fit into `output` is retained for the next call.
    pub fn convert(&mut self, input: &[i16], output: &mut [f32]) -> Result<usize> {
        let channels = self.input.channels as usize;
        if input.len() % channels != 0 {
            return Err(Error::InvalidInput(format!(
                "{} samples is not a whole number of {}-channel frames",
                input.len(),
                channels
            )));
        }

        let start = self.delay.len();
        self.delay.resize(start + input.len(), 0.0);
        s16_to_f32(input, &mut self.delay[start..]);

        let capacity = output.len() / channels * channels;
        let written = capacity.min(self.delay.len());
        output[..written].copy_from_slice(&self.delay[..written]);
        self.delay.drain(..written);
        Ok(written / channels)
    }
}
