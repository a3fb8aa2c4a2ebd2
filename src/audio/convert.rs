//! Sample-format conversion
//!
//! Integer/float conversions between the engine's internal `f32` currency
//! and the int16/int32 wire formats. Float-to-integer conversion rounds to
//! nearest and clamps on overflow, so a slightly-hot sample never wraps.

use crate::audio::types::SampleFormat;

/// Convert one `f32` sample (nominal range [-1.0, 1.0]) to `i16`.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * i16::MAX as f32)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Convert one `f32` sample to `i32`.
///
/// The scale runs through f64: f32 has too few mantissa bits to hold
/// `i32::MAX` exactly.
#[inline]
pub fn f32_to_i32(sample: f32) -> i32 {
    (sample as f64 * i32::MAX as f64)
        .round()
        .clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// Convert one `i16` sample to `f32`, normalized by `i16::MAX`.
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

/// Convert one `i32` sample to `f32`, normalized by `i32::MAX`.
#[inline]
pub fn i32_to_f32(sample: i32) -> f32 {
    (sample as f64 / i32::MAX as f64) as f32
}

/// An owned sample buffer in one of the supported wire formats.
#[derive(Debug, Clone)]
pub enum SampleBuffer {
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
}

impl SampleBuffer {
    /// Convert interleaved `f32` samples into the requested format.
    pub fn from_f32(samples: &[f32], format: SampleFormat) -> Self {
        match format {
            SampleFormat::Int16 => {
                SampleBuffer::Int16(samples.iter().map(|&s| f32_to_i16(s)).collect())
            }
            SampleFormat::Int32 => {
                SampleBuffer::Int32(samples.iter().map(|&s| f32_to_i32(s)).collect())
            }
            SampleFormat::Float32 => SampleBuffer::Float32(samples.to_vec()),
        }
    }

    /// Convert back to interleaved `f32`.
    pub fn to_f32(&self) -> Vec<f32> {
        match self {
            SampleBuffer::Int16(v) => v.iter().map(|&s| i16_to_f32(s)).collect(),
            SampleBuffer::Int32(v) => v.iter().map(|&s| i32_to_f32(s)).collect(),
            SampleBuffer::Float32(v) => v.clone(),
        }
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            SampleBuffer::Int16(_) => SampleFormat::Int16,
            SampleBuffer::Int32(_) => SampleFormat::Int32,
            SampleBuffer::Float32(_) => SampleFormat::Float32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::Int16(v) => v.len(),
            SampleBuffer::Int32(v) => v.len(),
            SampleBuffer::Float32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i16_rounds_to_nearest() {
        // 0.5 * 32767 = 16383.5, rounds to 16384
        assert_eq!(f32_to_i16(0.5), 16384);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(-0.5), -16384);
    }

    #[test]
    fn i16_clamps_overrange() {
        assert_eq!(f32_to_i16(1.5), i16::MAX);
        assert_eq!(f32_to_i16(-1.5), i16::MIN);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
    }

    #[test]
    fn i32_full_scale() {
        assert_eq!(f32_to_i32(1.0), i32::MAX);
        assert_eq!(f32_to_i32(2.0), i32::MAX);
        assert_eq!(f32_to_i32(-2.0), i32::MIN);
    }

    #[test]
    fn i16_round_trip_is_exact() {
        for s in [-32767i16, -12345, -1, 0, 1, 12345, 32767] {
            assert_eq!(f32_to_i16(i16_to_f32(s)), s);
        }
    }

    #[test]
    fn buffer_conversion_round_trip() {
        let input = vec![0.0f32, 0.25, -0.25, 1.0];
        let buf = SampleBuffer::from_f32(&input, SampleFormat::Int16);
        assert_eq!(buf.format(), SampleFormat::Int16);
        assert_eq!(buf.len(), 4);
        let back = buf.to_f32();
        for (a, b) in input.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1.0 / 32000.0, "{} vs {}", a, b);
        }
    }
}
