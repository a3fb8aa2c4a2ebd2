//! Core audio data types and per-block transforms
//!
//! The canonical in-engine currency is interleaved `f32` PCM. Decoders
//! normalize to it, the converter stages reshape it to the negotiated device
//! format, and the device backends convert to the wire sample type at the
//! last moment.

pub mod convert;
pub mod mixer;
pub mod resampler;
pub mod types;

pub use convert::SampleBuffer;
pub use mixer::ChannelMixer;
pub use resampler::{StreamConverter, StreamResampler};
pub use types::{AudioSpec, DecodedAudio, FrameBlock, SampleFormat};
