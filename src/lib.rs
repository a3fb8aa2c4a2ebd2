//! # playhead
//!
//! Cross-format streaming audio decode and playback engine.
//!
//! A source with an unknown container is sniffed and opened by a matching
//! decoder backend (WAV, FLAC, MP3, Ogg/Vorbis, or explicit raw PCM), pulled
//! by a dedicated feed thread through channel mixing and sample-rate
//! conversion into a lock-free ring buffer, and drained by the output
//! device's real-time callback. Sessions run a small lifecycle state
//! machine; background faults land in an error slot and an event channel,
//! never in the callback.
//!
//! **Architecture:** symphonia + rubato + cpal + ringbuf, one feed thread
//! per session, all cross-thread audio through the SPSC ring.
//!
//! ```no_run
//! use playhead::{CpalBackend, PlaybackSession, PlayerConfig};
//!
//! playhead::init()?;
//! let backend = CpalBackend::new();
//! let config = PlayerConfig::default();
//! let mut session = PlaybackSession::open_path(
//!     std::path::Path::new("music.flac"),
//!     &config,
//!     &backend,
//! )?;
//! session.start()?;
//! # Ok::<(), playhead::Error>(())
//! ```

pub mod audio;
pub mod config;
pub mod decode;
pub mod error;
pub mod events;
pub mod output;
pub mod playback;
pub mod runtime;

pub use audio::{AudioSpec, DecodedAudio, FrameBlock, SampleFormat, StreamConverter};
pub use config::{OverrunPolicy, PausePolicy, PlayerConfig, ResampleQuality};
pub use decode::{
    decode_all, decode_file, inspect, inspect_file, open_bytes, open_path, open_raw_pcm,
    open_source, ContainerKind, DecoderBackend, RawPcmSpec, SourceInfo, StreamDecoder,
};
pub use error::{Error, Result};
pub use events::EngineEvent;
pub use output::{AudioBackend, CpalBackend, DeviceDescriptor, NullBackend, StreamRequest};
pub use playback::{PlaybackSession, SessionState, SessionStats};
pub use runtime::{init, live_sessions, shutdown};
