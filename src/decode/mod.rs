//! Decoder backends
//!
//! One uniform contract implemented per container format: a cheap
//! [`probe`](DecoderBackend::probe) over header bytes, an
//! [`open`](DecoderBackend::open) that parses the container and establishes
//! the native format, and a [`StreamDecoder`] handle that produces
//! interleaved `f32` blocks until end of stream.
//!
//! The WAV/FLAC/MP3/Ogg backends ride symphonia's per-container readers;
//! raw PCM passthrough is its own small reader. Backend resources are
//! released on drop, which makes close idempotent for free.

pub mod raw_pcm;
pub mod sniff;
pub mod symphonia;

use crate::audio::types::{AudioSpec, FrameBlock};
use crate::error::Result;
use ::symphonia::core::io::MediaSourceStream;
use serde::{Deserialize, Serialize};

pub use raw_pcm::{RawPcmBackend, RawPcmSpec};
pub use sniff::{decode_all, decode_file, inspect, inspect_file, open_bytes, open_path, open_raw_pcm, open_source};

/// Container format handled by a decoder backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Wav,
    Flac,
    Mp3,
    OggVorbis,
    RawPcm,
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerKind::Wav => write!(f, "wav"),
            ContainerKind::Flac => write!(f, "flac"),
            ContainerKind::Mp3 => write!(f, "mp3"),
            ContainerKind::OggVorbis => write!(f, "ogg/vorbis"),
            ContainerKind::RawPcm => write!(f, "raw pcm"),
        }
    }
}

/// Descriptive metadata for an opened source, without a playback session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub container: ContainerKind,
    pub spec: AudioSpec,
    /// Total frame count when the container declares it; streaming sources
    /// may not know.
    pub total_frames: Option<u64>,
}

impl SourceInfo {
    pub fn duration_seconds(&self) -> Option<f64> {
        self.total_frames
            .map(|frames| frames as f64 / self.spec.sample_rate as f64)
    }
}

/// Per-stream decode handle.
///
/// Exclusively owned by one playback session (or one whole-source decode);
/// dropped on close or fatal decode error.
pub trait StreamDecoder: Send {
    /// Native format of the decoded stream.
    fn spec(&self) -> AudioSpec;

    /// Container this stream was opened as.
    fn container(&self) -> ContainerKind;

    /// Declared total length in frames, when known.
    fn total_frames(&self) -> Option<u64>;

    /// Current position in frames (frames produced so far, adjusted by seeks).
    fn position(&self) -> u64;

    /// Decode up to `max_frames` of native-format samples.
    ///
    /// Partial blocks are valid. Returns `Ok(None)` at end of stream.
    /// Corrupt packets inside a healthy stream are skipped (see
    /// [`corrupt_packets`](Self::corrupt_packets)); unrecoverable corruption
    /// returns [`Error::Malformed`](crate::Error::Malformed).
    fn decode(&mut self, max_frames: usize) -> Result<Option<FrameBlock>>;

    /// Seek to an absolute frame position, returning the frame actually
    /// landed on. `Error::SeekUnsupported` when the source cannot seek.
    fn seek(&mut self, frame: u64) -> Result<u64>;

    /// Cumulative count of corrupt packets skipped so far.
    fn corrupt_packets(&self) -> u64;
}

/// A registered decoder backend for one container format.
pub trait DecoderBackend: Send + Sync {
    fn kind(&self) -> ContainerKind;

    /// Cheap signature check over a header prefix. Must not touch the
    /// source itself; the factory hands it already-read bytes.
    fn probe(&self, header: &[u8]) -> bool;

    /// Parse the container and build a decode handle.
    fn open(&self, source: MediaSourceStream) -> Result<Box<dyn StreamDecoder>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_kind_display() {
        assert_eq!(ContainerKind::Wav.to_string(), "wav");
        assert_eq!(ContainerKind::OggVorbis.to_string(), "ogg/vorbis");
    }

    #[test]
    fn source_info_duration() {
        let info = SourceInfo {
            container: ContainerKind::Wav,
            spec: AudioSpec::new(44100, 2),
            total_frames: Some(88200),
        };
        assert_eq!(info.duration_seconds(), Some(2.0));

        let unknown = SourceInfo {
            total_frames: None,
            ..info
        };
        assert_eq!(unknown.duration_seconds(), None);
    }
}
