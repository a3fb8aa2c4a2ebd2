//! Device backend abstraction
//!
//! Decouples the playback engine from any specific platform audio API. The
//! default implementation wraps cpal; the null backend drives the same
//! callback contract from a plain thread for headless use and tests.
//!
//! The trait is object-safe: callbacks are boxed closures, streams are
//! boxed trait objects, and backends are selected at runtime.

pub mod cpal_backend;
pub mod null_backend;

use crate::audio::types::{AudioSpec, SampleFormat};
use crate::error::Result;
use serde::{Deserialize, Serialize};

pub use cpal_backend::CpalBackend;
pub use null_backend::NullBackend;

/// An available output device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Backend-scoped identifier, usable as `StreamRequest::device_id`
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Whether this is the system default output
    pub is_default: bool,
}

/// What the engine asks of a backend when opening an output stream.
///
/// The backend negotiates the closest configuration it can actually drive;
/// the caller reads the result off the returned stream and resamples to it.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Device to open (None = default device)
    pub device_id: Option<String>,

    /// Preferred sample rate and channel count
    pub spec: AudioSpec,

    /// Preferred callback granularity in frames
    pub period_frames: u32,
}

/// Audio output callback.
///
/// Invoked by the backend on its real-time context with an interleaved f32
/// buffer (`frames * channels` samples, in the negotiated spec) to fill.
/// Implementations must not allocate, lock, or block: the only sanctioned
/// cross-thread interaction is a wait-free ring buffer read.
pub type OutputCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Stream error callback, invoked off the caller's thread when the backend
/// fails mid-stream (device unplugged, server died).
pub type ErrorCallback = Box<dyn FnMut(&str) + Send + 'static>;

/// An open output stream with a negotiated format.
///
/// Dropping the stream closes it.
pub trait OutputStream {
    /// Negotiated sample rate and channel count.
    fn spec(&self) -> AudioSpec;

    /// Wire sample format the device runs at (conversion from f32 is the
    /// backend's job).
    fn sample_format(&self) -> SampleFormat;

    /// Callback granularity in frames.
    fn period_frames(&self) -> u32;

    /// Begin invoking the callback.
    fn start(&mut self) -> Result<()>;

    /// Stop invoking the callback; the stream may be started again.
    fn stop(&mut self) -> Result<()>;
}

/// Pluggable audio output backend.
pub trait AudioBackend {
    /// Backend name, e.g. "cpal" or "null".
    fn name(&self) -> &str;

    /// Enumerate available output devices.
    fn devices(&self) -> Result<Vec<DeviceDescriptor>>;

    /// The system default output device, if any.
    fn default_device(&self) -> Result<Option<DeviceDescriptor>>;

    /// The stream format `open_output` would negotiate for this request.
    ///
    /// Some backends cannot drive the exact requested format and will use
    /// the closest one available; callers that must size buffers before
    /// opening (the engine's ring is built into the data callback) ask
    /// here first. The default implementation echoes the request.
    fn probe_format(&self, request: &StreamRequest) -> Result<AudioSpec> {
        Ok(request.spec)
    }

    /// Open an output stream, negotiating the closest supported format.
    fn open_output(
        &self,
        request: &StreamRequest,
        data: OutputCallback,
        error: ErrorCallback,
    ) -> Result<Box<dyn OutputStream>>;
}
