//! Streaming sample-rate conversion using rubato
//!
//! Wraps rubato's fixed-input-chunk resamplers for block-streaming use: the
//! engine feeds arbitrarily sized decoded blocks, this module accumulates
//! them into fixed chunks and carries the fractional conversion phase inside
//! the rubato state, so rate conversion is seamless across block boundaries.
//!
//! Quality mapping:
//! - `Linear`: `FastFixedIn` polynomial interpolation
//! - `HighQuality`: `SincFixedIn` windowed-sinc interpolation

use crate::audio::mixer::ChannelMixer;
use crate::audio::types::{AudioSpec, FrameBlock};
use crate::config::ResampleQuality;
use crate::error::{Error, Result};
use rubato::{
    FastFixedIn, PolynomialDegree, Resampler as RubatoResampler, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Input chunk size fed to the rubato resamplers, in frames.
const CHUNK_FRAMES: usize = 1024;

enum Inner {
    /// Input rate == output rate; blocks pass straight through.
    Passthrough,
    Fast(FastFixedIn<f32>),
    Sinc(SincFixedIn<f32>),
}

/// Streaming resampler carrying its inter-block phase across calls.
pub struct StreamResampler {
    inner: Inner,
    channels: usize,
    /// Planar accumulation of frames not yet forming a full chunk.
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    /// Create a resampler from `input_rate` to `output_rate`.
    pub fn new(
        input_rate: u32,
        output_rate: u32,
        channels: u16,
        quality: ResampleQuality,
    ) -> Result<Self> {
        let channels = channels as usize;

        if input_rate == output_rate {
            debug!("Sample rates match at {} Hz, resampler in passthrough", input_rate);
            return Ok(Self {
                inner: Inner::Passthrough,
                channels,
                pending: vec![Vec::new(); channels],
            });
        }

        let ratio = output_rate as f64 / input_rate as f64;
        debug!(
            "Creating {:?} resampler: {} Hz -> {} Hz ({} channels)",
            quality, input_rate, output_rate, channels
        );

        let inner = match quality {
            ResampleQuality::Linear => {
                let resampler = FastFixedIn::<f32>::new(
                    ratio,
                    1.0, // fixed ratio, no runtime changes
                    PolynomialDegree::Linear,
                    CHUNK_FRAMES,
                    channels,
                )
                .map_err(|e| Error::Config(format!("failed to create resampler: {}", e)))?;
                Inner::Fast(resampler)
            }
            ResampleQuality::HighQuality => {
                let params = SincInterpolationParameters {
                    sinc_len: 256,
                    f_cutoff: 0.95,
                    interpolation: SincInterpolationType::Linear,
                    oversampling_factor: 256,
                    window: WindowFunction::BlackmanHarris2,
                };
                let resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, channels)
                    .map_err(|e| Error::Config(format!("failed to create sinc resampler: {}", e)))?;
                Inner::Sinc(resampler)
            }
        };

        Ok(Self {
            inner,
            channels,
            pending: vec![Vec::new(); channels],
        })
    }

    /// Push an interleaved block, returning whatever output is ready.
    ///
    /// Frames that do not fill a whole chunk stay pending until the next
    /// push or a [`flush`](Self::flush).
    pub fn push(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        if matches!(self.inner, Inner::Passthrough) {
            return Ok(interleaved.to_vec());
        }

        deinterleave_into(interleaved, self.channels, &mut self.pending);

        let mut out = Vec::new();
        while self.pending[0].len() >= CHUNK_FRAMES {
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| {
                    let tail = ch.split_off(CHUNK_FRAMES);
                    std::mem::replace(ch, tail)
                })
                .collect();

            let planar = self.process_chunk(&chunk)?;
            interleave_into(&planar, &mut out);
        }

        Ok(out)
    }

    /// Drain pending input and the filter tail at end of stream.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        if matches!(self.inner, Inner::Passthrough) {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();

        if !self.pending[0].is_empty() {
            let rest: Vec<Vec<f32>> = self.pending.iter_mut().map(std::mem::take).collect();
            let planar = self.process_partial_chunk(Some(&rest))?;
            interleave_into(&planar, &mut out);
        }

        // One empty partial call pushes out the resampler's internal delay.
        let tail = self.process_partial_chunk(None)?;
        interleave_into(&tail, &mut out);

        Ok(out)
    }

    /// Discard pending input and internal phase (after a seek).
    pub fn reset(&mut self) {
        for ch in &mut self.pending {
            ch.clear();
        }
        match &mut self.inner {
            Inner::Passthrough => {}
            Inner::Fast(r) => r.reset(),
            Inner::Sinc(r) => r.reset(),
        }
    }

    fn process_chunk(&mut self, chunk: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        let result = match &mut self.inner {
            Inner::Passthrough => unreachable!("passthrough never chunks"),
            Inner::Fast(r) => r.process(chunk, None),
            Inner::Sinc(r) => r.process(chunk, None),
        };
        result.map_err(|e| Error::Malformed(format!("resampling failed: {}", e)))
    }

    fn process_partial_chunk(&mut self, input: Option<&[Vec<f32>]>) -> Result<Vec<Vec<f32>>> {
        let result = match &mut self.inner {
            Inner::Passthrough => unreachable!("passthrough never chunks"),
            Inner::Fast(r) => r.process_partial(input, None),
            Inner::Sinc(r) => r.process_partial(input, None),
        };
        result.map_err(|e| Error::Malformed(format!("resampling failed: {}", e)))
    }
}

/// Split interleaved samples onto per-channel accumulators.
fn deinterleave_into(samples: &[f32], channels: usize, planar: &mut [Vec<f32>]) {
    let frames = samples.len() / channels;
    for ch in planar.iter_mut() {
        ch.reserve(frames);
    }
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in planar.iter_mut().zip(frame.iter()) {
            ch.push(sample);
        }
    }
}

/// Append planar channel data as interleaved samples.
fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    if planar.is_empty() {
        return;
    }
    let frames = planar[0].len();
    out.reserve(frames * planar.len());
    for frame_idx in 0..frames {
        for ch in planar {
            out.push(ch[frame_idx]);
        }
    }
}

/// The full decoded-block transform: channel mix, then resample.
///
/// The only mutable state is the resampler phase; everything else is a pure
/// per-block function of the input.
pub struct StreamConverter {
    mixer: ChannelMixer,
    resampler: StreamResampler,
    mix_buf: Vec<f32>,
    in_spec: AudioSpec,
    out_spec: AudioSpec,
}

impl StreamConverter {
    pub fn new(in_spec: AudioSpec, out_spec: AudioSpec, quality: ResampleQuality) -> Result<Self> {
        Ok(Self {
            mixer: ChannelMixer::new(in_spec.channels, out_spec.channels),
            resampler: StreamResampler::new(
                in_spec.sample_rate,
                out_spec.sample_rate,
                out_spec.channels,
                quality,
            )?,
            mix_buf: Vec::new(),
            in_spec,
            out_spec,
        })
    }

    pub fn in_spec(&self) -> AudioSpec {
        self.in_spec
    }

    pub fn out_spec(&self) -> AudioSpec {
        self.out_spec
    }

    /// Convert one decoded block into interleaved samples in the output spec.
    pub fn convert(&mut self, block: &FrameBlock) -> Result<Vec<f32>> {
        debug_assert_eq!(block.spec, self.in_spec, "decoder spec changed mid-stream");
        let mut mix_buf = std::mem::take(&mut self.mix_buf);
        self.mixer.mix_into(&block.samples, &mut mix_buf);
        let out = self.resampler.push(&mix_buf)?;
        self.mix_buf = mix_buf;
        Ok(out)
    }

    /// Drain the resampler at end of stream.
    pub fn finish(&mut self) -> Result<Vec<f32>> {
        self.resampler.flush()
    }

    /// Drop in-flight state after a seek so stale audio is not emitted.
    pub fn reset(&mut self) {
        self.resampler.reset();
        self.mix_buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frames: usize, rate: u32, channels: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let t = i as f32 / rate as f32;
            let sample = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            for _ in 0..channels {
                out.push(sample);
            }
        }
        out
    }

    #[test]
    fn passthrough_returns_input() {
        let mut rs = StreamResampler::new(44100, 44100, 2, ResampleQuality::Linear).unwrap();
        let input = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(rs.push(&input).unwrap(), input);
        assert!(rs.flush().unwrap().is_empty());
    }

    #[test]
    fn total_output_length_matches_ratio() {
        let mut rs = StreamResampler::new(44100, 48000, 2, ResampleQuality::Linear).unwrap();
        let input = sine(44100, 44100, 2); // 1 second

        let mut out = rs.push(&input).unwrap();
        out.extend(rs.flush().unwrap());

        let out_frames = out.len() / 2;
        // Expect ~48000 frames, within one chunk of slack for filter delay.
        assert!(
            (out_frames as i64 - 48000).unsigned_abs() < CHUNK_FRAMES as u64 * 2,
            "expected ~48000 frames, got {}",
            out_frames
        );
    }

    #[test]
    fn phase_carries_across_blocks() {
        // Feeding the same signal in one shot or in small blocks must produce
        // the same total length: the carried phase owns the remainder.
        let input = sine(4096, 44100, 1);

        let mut one_shot = StreamResampler::new(44100, 22050, 1, ResampleQuality::Linear).unwrap();
        let mut a = one_shot.push(&input).unwrap();
        a.extend(one_shot.flush().unwrap());

        let mut blocky = StreamResampler::new(44100, 22050, 1, ResampleQuality::Linear).unwrap();
        let mut b = Vec::new();
        for chunk in input.chunks(700) {
            b.extend(blocky.push(chunk).unwrap());
        }
        b.extend(blocky.flush().unwrap());

        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn converter_resamples_and_mixes() {
        // 3 seconds of 44.1kHz mono into 48kHz stereo.
        let in_spec = AudioSpec::new(44100, 1);
        let out_spec = AudioSpec::new(48000, 2);
        let mut conv = StreamConverter::new(in_spec, out_spec, ResampleQuality::Linear).unwrap();

        let mut out = Vec::new();
        for _ in 0..3 {
            let block = FrameBlock::new(in_spec, sine(44100, 44100, 1));
            out.extend(conv.convert(&block).unwrap());
        }
        out.extend(conv.finish().unwrap());

        let expected = 3 * 48000 * 2;
        let slack = 2 * CHUNK_FRAMES * 2;
        assert!(
            (out.len() as i64 - expected as i64).unsigned_abs() < slack as u64,
            "expected ~{} samples, got {}",
            expected,
            out.len()
        );
    }

    #[test]
    fn reset_discards_pending() {
        let mut rs = StreamResampler::new(44100, 48000, 1, ResampleQuality::Linear).unwrap();
        // Less than a chunk: stays pending.
        assert!(rs.push(&[0.5; 100]).unwrap().is_empty());
        rs.reset();
        // Nothing pending after reset, so flush drains only the filter tail,
        // which is empty on a freshly reset resampler fed no data.
        let tail = rs.flush().unwrap();
        assert!(tail.iter().all(|&s| s == 0.0));
    }
}
