//! Channel up/down-mixing
//!
//! Reshapes interleaved blocks between channel layouts: mono is duplicated
//! up to stereo, stereo averages down to mono, and anything else goes
//! through a mix matrix (one row per output channel).

use crate::error::{Error, Result};

/// Channel mixer with a fixed `[out_channels][in_channels]` gain matrix.
///
/// The default matrix duplicates mono upward, averages paired channels
/// downward, and otherwise groups input channels round-robin onto outputs,
/// averaging each group.
#[derive(Debug, Clone)]
pub struct ChannelMixer {
    in_channels: usize,
    out_channels: usize,
    /// Empty when the layout is unchanged (identity fast path).
    matrix: Vec<Vec<f32>>,
}

impl ChannelMixer {
    /// Build a mixer with the default matrix for the given layouts.
    pub fn new(in_channels: u16, out_channels: u16) -> Self {
        let in_ch = in_channels as usize;
        let out_ch = out_channels as usize;

        let matrix = if in_ch == out_ch {
            Vec::new()
        } else {
            default_matrix(in_ch, out_ch)
        };

        Self {
            in_channels: in_ch,
            out_channels: out_ch,
            matrix,
        }
    }

    /// Build a mixer with an explicit matrix (`matrix[out][in]`).
    pub fn with_matrix(in_channels: u16, out_channels: u16, matrix: Vec<Vec<f32>>) -> Result<Self> {
        if matrix.len() != out_channels as usize
            || matrix.iter().any(|row| row.len() != in_channels as usize)
        {
            return Err(Error::Config(format!(
                "mix matrix must be {}x{}",
                out_channels, in_channels
            )));
        }
        Ok(Self {
            in_channels: in_channels as usize,
            out_channels: out_channels as usize,
            matrix,
        })
    }

    pub fn in_channels(&self) -> u16 {
        self.in_channels as u16
    }

    pub fn out_channels(&self) -> u16 {
        self.out_channels as u16
    }

    /// Mix an interleaved input block into `out` (cleared first).
    ///
    /// `input.len()` must be a whole number of input frames.
    pub fn mix_into(&self, input: &[f32], out: &mut Vec<f32>) {
        out.clear();

        if self.matrix.is_empty() {
            out.extend_from_slice(input);
            return;
        }

        let frames = input.len() / self.in_channels;
        out.reserve(frames * self.out_channels);

        for frame_idx in 0..frames {
            let frame = &input[frame_idx * self.in_channels..(frame_idx + 1) * self.in_channels];
            for row in &self.matrix {
                let mut acc = 0.0f32;
                for (gain, sample) in row.iter().zip(frame.iter()) {
                    acc += gain * sample;
                }
                out.push(acc);
            }
        }
    }

    /// Mix an interleaved input block, returning a fresh buffer.
    pub fn mix(&self, input: &[f32]) -> Vec<f32> {
        let mut out = Vec::new();
        self.mix_into(input, &mut out);
        out
    }
}

/// Default mix matrix: input channel `i` feeds output `i % out`, each output
/// averaging its contributors. Covers mono→stereo duplication and
/// stereo→mono averaging as the two degenerate cases.
fn default_matrix(in_ch: usize, out_ch: usize) -> Vec<Vec<f32>> {
    let mut matrix = vec![vec![0.0f32; in_ch]; out_ch];

    if in_ch < out_ch {
        // Upmix: repeat inputs across outputs.
        for (o, row) in matrix.iter_mut().enumerate() {
            row[o % in_ch] = 1.0;
        }
    } else {
        // Downmix: average the inputs that land on each output.
        for o in 0..out_ch {
            let contributors: Vec<usize> = (0..in_ch).filter(|i| i % out_ch == o).collect();
            let gain = 1.0 / contributors.len() as f32;
            for i in contributors {
                matrix[o][i] = gain;
            }
        }
    }

    matrix
}
