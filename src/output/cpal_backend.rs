//! Audio output via cpal
//!
//! Default device backend for desktop hosts (ALSA, CoreAudio, WASAPI).
//! Negotiates the closest supported configuration to the requested spec,
//! preferring f32 wire format, and converts from the engine's f32 currency
//! on the device thread when the hardware wants integers.

use crate::audio::convert::f32_to_i16;
use crate::audio::types::{AudioSpec, SampleFormat as EngineSampleFormat};
use crate::error::{Error, Result};
use crate::output::{
    AudioBackend, DeviceDescriptor, ErrorCallback, OutputCallback, OutputStream, StreamRequest,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig, SupportedBufferSize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scratch size for integer-format conversion, in frames. Resized on the
/// device thread only if a callback ever asks for more.
const SCRATCH_FRAMES: usize = 8192;

/// cpal-backed output device backend.
pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// Find the requested device, falling back to the default device with a
    /// warning when the name does not resolve.
    fn find_device(&self, device_id: Option<&str>) -> Result<Device> {
        if let Some(name) = device_id {
            let mut devices = self
                .host
                .output_devices()
                .map_err(|e| Error::Device(format!("failed to enumerate devices: {}", e)))?;

            if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(device);
            }
            warn!("Requested device '{}' not found, falling back to default", name);
        }

        self.host
            .default_output_device()
            .ok_or_else(|| Error::Device("no default output device available".to_string()))
    }

    /// Pick the closest supported configuration to the request.
    ///
    /// Preference order: exact channels + rate at f32; then f32 at the same
    /// channel count with the rate clamped into a supported range; then the
    /// device default.
    fn negotiate(device: &Device, request: &StreamRequest) -> Result<(StreamConfig, SampleFormat)> {
        let wanted_rate = cpal::SampleRate(request.spec.sample_rate);

        let ranges: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::Device(format!("failed to query device configs: {}", e)))?
            .collect();

        let exact = ranges.iter().find(|r| {
            r.channels() == request.spec.channels
                && r.min_sample_rate() <= wanted_rate
                && r.max_sample_rate() >= wanted_rate
                && r.sample_format() == SampleFormat::F32
        });
        if let Some(range) = exact {
            let supported = range.clone().with_sample_rate(wanted_rate);
            return Ok(Self::apply_period(supported, request.period_frames));
        }

        let same_channels = ranges.iter().find(|r| {
            r.channels() == request.spec.channels && r.sample_format() == SampleFormat::F32
        });
        if let Some(range) = same_channels {
            let clamped = wanted_rate
                .clamp(range.min_sample_rate(), range.max_sample_rate());
            let supported = range.clone().with_sample_rate(clamped);
            return Ok(Self::apply_period(supported, request.period_frames));
        }

        let supported = device
            .default_output_config()
            .map_err(|e| Error::Device(format!("failed to get default config: {}", e)))?;
        Ok(Self::apply_period(supported, request.period_frames))
    }

    fn apply_period(
        supported: cpal::SupportedStreamConfig,
        period_frames: u32,
    ) -> (StreamConfig, SampleFormat) {
        let sample_format = supported.sample_format();
        let buffer_size = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max } => {
                cpal::BufferSize::Fixed(period_frames.clamp(*min, *max))
            }
            SupportedBufferSize::Unknown => {
                warn!("Device does not report a buffer size range, using its default period");
                cpal::BufferSize::Default
            }
        };

        let mut config = supported.config();
        config.buffer_size = buffer_size;
        (config, sample_format)
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());

        let devices: Vec<DeviceDescriptor> = self
            .host
            .output_devices()
            .map_err(|e| Error::Device(format!("failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .map(|name| DeviceDescriptor {
                is_default: Some(&name) == default_name.as_ref(),
                id: name.clone(),
                name,
            })
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    fn default_device(&self) -> Result<Option<DeviceDescriptor>> {
        Ok(self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok())
            .map(|name| DeviceDescriptor {
                id: name.clone(),
                name,
                is_default: true,
            }))
    }

    fn probe_format(&self, request: &StreamRequest) -> Result<AudioSpec> {
        let device = self.find_device(request.device_id.as_deref())?;
        let (config, _) = Self::negotiate(&device, request)?;
        Ok(AudioSpec::new(config.sample_rate.0, config.channels))
    }

    fn open_output(
        &self,
        request: &StreamRequest,
        data: OutputCallback,
        error: ErrorCallback,
    ) -> Result<Box<dyn OutputStream>> {
        let device = self.find_device(request.device_id.as_deref())?;
        let (config, wire_format) = Self::negotiate(&device, request)?;

        debug!(
            "Negotiated output: {} Hz, {} ch, {:?}, buffer {:?}",
            config.sample_rate.0, config.channels, wire_format, config.buffer_size
        );

        let failed = Arc::new(AtomicBool::new(false));
        let stream = match wire_format {
            SampleFormat::F32 => build_stream_f32(&device, &config, data, error, &failed)?,
            SampleFormat::I16 => build_stream_i16(&device, &config, data, error, &failed)?,
            SampleFormat::U16 => build_stream_u16(&device, &config, data, error, &failed)?,
            other => {
                return Err(Error::Device(format!(
                    "unsupported device sample format: {:?}",
                    other
                )))
            }
        };

        let period_frames = match config.buffer_size {
            cpal::BufferSize::Fixed(n) => n,
            cpal::BufferSize::Default => {
                // cpal will not say; typical device periods sit near 512.
                warn!("Device period unknown, assuming 512 frames");
                512
            }
        };

        Ok(Box::new(CpalStream {
            stream,
            spec: AudioSpec::new(config.sample_rate.0, config.channels),
            sample_format: match wire_format {
                SampleFormat::F32 => EngineSampleFormat::Float32,
                SampleFormat::I16 | SampleFormat::U16 => EngineSampleFormat::Int16,
                _ => unreachable!("rejected above"),
            },
            period_frames,
            _failed: failed,
        }))
    }
}

fn stream_error_fn(
    failed: &Arc<AtomicBool>,
    mut error: ErrorCallback,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    let failed = Arc::clone(failed);
    move |err| {
        tracing::error!("Audio stream error: {}", err);
        failed.store(true, Ordering::SeqCst);
        error(&err.to_string());
    }
}

fn build_stream_f32(
    device: &Device,
    config: &StreamConfig,
    mut data: OutputCallback,
    error: ErrorCallback,
    failed: &Arc<AtomicBool>,
) -> Result<Stream> {
    device
        .build_output_stream(
            config,
            move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                data(out);
            },
            stream_error_fn(failed, error),
            None,
        )
        .map_err(|e| Error::Device(format!("failed to build stream: {}", e)))
}

fn build_stream_i16(
    device: &Device,
    config: &StreamConfig,
    mut data: OutputCallback,
    error: ErrorCallback,
    failed: &Arc<AtomicBool>,
) -> Result<Stream> {
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES * config.channels as usize];
    device
        .build_output_stream(
            config,
            move |out: &mut [i16], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < out.len() {
                    scratch.resize(out.len(), 0.0);
                }
                let buf = &mut scratch[..out.len()];
                data(buf);
                for (d, &s) in out.iter_mut().zip(buf.iter()) {
                    *d = f32_to_i16(s);
                }
            },
            stream_error_fn(failed, error),
            None,
        )
        .map_err(|e| Error::Device(format!("failed to build stream: {}", e)))
}

fn build_stream_u16(
    device: &Device,
    config: &StreamConfig,
    mut data: OutputCallback,
    error: ErrorCallback,
    failed: &Arc<AtomicBool>,
) -> Result<Stream> {
    let mut scratch = vec![0.0f32; SCRATCH_FRAMES * config.channels as usize];
    device
        .build_output_stream(
            config,
            move |out: &mut [u16], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < out.len() {
                    scratch.resize(out.len(), 0.0);
                }
                let buf = &mut scratch[..out.len()];
                data(buf);
                for (d, &s) in out.iter_mut().zip(buf.iter()) {
                    // Shift [-1.0, 1.0] onto the unsigned range.
                    *d = ((s.clamp(-1.0, 1.0) + 1.0) * 32767.5) as u16;
                }
            },
            stream_error_fn(failed, error),
            None,
        )
        .map_err(|e| Error::Device(format!("failed to build stream: {}", e)))
}

/// An open cpal stream with its negotiated format.
struct CpalStream {
    stream: Stream,
    spec: AudioSpec,
    sample_format: EngineSampleFormat,
    period_frames: u32,
    _failed: Arc<AtomicBool>,
}

impl OutputStream for CpalStream {
    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn sample_format(&self) -> EngineSampleFormat {
        self.sample_format
    }

    fn period_frames(&self) -> u32 {
        self.period_frames
    }

    fn start(&mut self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| Error::Device(format!("failed to start stream: {}", e)))
    }

    fn stop(&mut self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| Error::Device(format!("failed to pause stream: {}", e)))
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        let _ = self.stream.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_devices_does_not_panic() {
        // Enumeration requires a host but not working hardware; either
        // outcome is acceptable on CI boxes.
        let backend = CpalBackend::new();
        let _ = backend.devices();
        let _ = backend.default_device();
    }
}
