//! Core audio data types
//!
//! Defines the format descriptors and sample-block containers used
//! throughout the pipeline.

use serde::{Deserialize, Serialize};

/// PCM sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    Int16,
    Int32,
    Float32,
}

impl SampleFormat {
    /// Size of one sample in bytes.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Int32 => 4,
            SampleFormat::Float32 => 4,
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleFormat::Int16 => write!(f, "int16"),
            SampleFormat::Int32 => write!(f, "int32"),
            SampleFormat::Float32 => write!(f, "float32"),
        }
    }
}

/// Sample rate and channel layout of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    /// Sample rate in Hz (> 0)
    pub sample_rate: u32,

    /// Interleaved channel count (>= 1)
    pub channels: u16,
}

impl AudioSpec {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        debug_assert!(sample_rate > 0, "sample rate must be > 0");
        debug_assert!(channels >= 1, "channel count must be >= 1");
        Self {
            sample_rate,
            channels,
        }
    }

    /// Duration in milliseconds of `frames` frames at this rate.
    pub fn frames_to_ms(&self, frames: u64) -> u64 {
        (frames * 1000) / self.sample_rate as u64
    }

    /// Frame index corresponding to a millisecond offset.
    pub fn ms_to_frames(&self, ms: u64) -> u64 {
        (ms * self.sample_rate as u64) / 1000
    }
}

impl std::fmt::Display for AudioSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz, {} ch", self.sample_rate, self.channels)
    }
}

/// A block of interleaved `f32` samples in a fixed spec.
///
/// Produced by a decoder backend, consumed (and owned) by the converter
/// stage. Samples are interleaved: `[c0, c1, ..., c0, c1, ...]`.
#[derive(Debug, Clone)]
pub struct FrameBlock {
    pub spec: AudioSpec,
    pub samples: Vec<f32>,
}

impl FrameBlock {
    pub fn new(spec: AudioSpec, samples: Vec<f32>) -> Self {
        debug_assert_eq!(
            samples.len() % spec.channels as usize,
            0,
            "sample count must be a whole number of frames"
        );
        Self { spec, samples }
    }

    /// Number of frames in the block.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.spec.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A fully decoded source held in memory.
///
/// Returned by the whole-source decode conveniences; playback streams
/// through [`FrameBlock`]s instead.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub spec: AudioSpec,
    pub samples: Vec<f32>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.spec.channels as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.spec.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_block_counts_frames() {
        let block = FrameBlock::new(AudioSpec::new(44100, 2), vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(block.frames(), 2);
        assert!(!block.is_empty());
    }

    #[test]
    fn spec_time_conversions() {
        let spec = AudioSpec::new(44100, 2);
        assert_eq!(spec.frames_to_ms(44100), 1000);
        assert_eq!(spec.ms_to_frames(500), 22050);
    }

    #[test]
    fn decoded_audio_duration() {
        let audio = DecodedAudio {
            spec: AudioSpec::new(48000, 2),
            samples: vec![0.0; 48000 * 2],
        };
        assert_eq!(audio.frames(), 48000);
        assert!((audio.duration_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sample_format_widths() {
        assert_eq!(SampleFormat::Int16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::Int32.bytes_per_sample(), 4);
        assert_eq!(SampleFormat::Float32.bytes_per_sample(), 4);
    }
}
