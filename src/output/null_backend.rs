//! Headless output backend
//!
//! Drives the output callback from a paced worker thread instead of real
//! hardware, accepting whatever spec the engine requests. Used by tests,
//! CI, and environments with no audio device. An optional tap forwards
//! every produced buffer to a channel so tests can observe the played
//! stream.

use crate::audio::types::{AudioSpec, SampleFormat};
use crate::error::{Error, Result};
use crate::output::{
    AudioBackend, DeviceDescriptor, ErrorCallback, OutputCallback, OutputStream, StreamRequest,
};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Output backend that consumes audio into the void at wall-clock rate.
pub struct NullBackend {
    /// Run the pacing thread without sleeping (tests drain faster than
    /// real time).
    realtime: bool,

    /// Optional copy of every produced buffer.
    tap: Option<Sender<Vec<f32>>>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self {
            realtime: true,
            tap: None,
        }
    }

    /// Run the callback loop flat-out instead of at wall-clock pace.
    pub fn unpaced() -> Self {
        Self {
            realtime: false,
            tap: None,
        }
    }

    /// Forward every produced buffer to `tap`.
    pub fn with_tap(mut self, tap: Sender<Vec<f32>>) -> Self {
        self.tap = Some(tap);
        self
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn devices(&self) -> Result<Vec<DeviceDescriptor>> {
        Ok(vec![DeviceDescriptor {
            id: "null".to_string(),
            name: "Null Output".to_string(),
            is_default: true,
        }])
    }

    fn default_device(&self) -> Result<Option<DeviceDescriptor>> {
        Ok(self.devices()?.into_iter().next())
    }

    fn open_output(
        &self,
        request: &StreamRequest,
        data: OutputCallback,
        _error: ErrorCallback,
    ) -> Result<Box<dyn OutputStream>> {
        // A bit bucket supports any format; negotiation echoes the request.
        debug!(
            "Null output opened: {}, period {} frames",
            request.spec, request.period_frames
        );
        Ok(Box::new(NullStream {
            spec: request.spec,
            period_frames: request.period_frames,
            realtime: self.realtime,
            tap: self.tap.clone(),
            callback: Some(data),
            alive: Arc::new(AtomicBool::new(true)),
            active: Arc::new(AtomicBool::new(false)),
            worker: None,
        }))
    }
}

struct NullStream {
    spec: AudioSpec,
    period_frames: u32,
    realtime: bool,
    tap: Option<Sender<Vec<f32>>>,
    /// Moved into the worker on first start.
    callback: Option<OutputCallback>,
    /// Worker thread lifetime flag
    alive: Arc<AtomicBool>,
    /// Whether the callback is currently being invoked
    active: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl OutputStream for NullStream {
    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn sample_format(&self) -> SampleFormat {
        SampleFormat::Float32
    }

    fn period_frames(&self) -> u32 {
        self.period_frames
    }

    fn start(&mut self) -> Result<()> {
        if self.worker.is_none() {
            let mut callback = self
                .callback
                .take()
                .ok_or_else(|| Error::Device("null stream already torn down".to_string()))?;

            let alive = Arc::clone(&self.alive);
            let active = Arc::clone(&self.active);
            let samples = self.period_frames as usize * self.spec.channels as usize;
            let period = Duration::from_secs_f64(
                self.period_frames as f64 / self.spec.sample_rate as f64,
            );
            let realtime = self.realtime;
            let tap = self.tap.clone();

            self.worker = Some(std::thread::spawn(move || {
                let mut buf = vec![0.0f32; samples];
                while alive.load(Ordering::Acquire) {
                    if active.load(Ordering::Acquire) {
                        callback(&mut buf);
                        if let Some(tap) = &tap {
                            let _ = tap.send(buf.clone());
                        }
                    }
                    if realtime {
                        std::thread::sleep(period);
                    } else {
                        std::thread::yield_now();
                    }
                }
            }));
        }

        self.active.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.active.store(false, Ordering::Release);
        Ok(())
    }
}

impl Drop for NullStream {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        self.alive.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_runs_only_while_started() {
        let backend = NullBackend::unpaced();
        let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let cb_counter = Arc::clone(&counter);

        let mut stream = backend
            .open_output(
                &StreamRequest {
                    device_id: None,
                    spec: AudioSpec::new(48000, 2),
                    period_frames: 64,
                },
                Box::new(move |out| {
                    cb_counter.fetch_add(1, Ordering::Relaxed);
                    out.fill(0.0);
                }),
                Box::new(|_| {}),
            )
            .unwrap();

        assert_eq!(counter.load(Ordering::Relaxed), 0);

        stream.start().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while counter.load(Ordering::Relaxed) < 3 && std::time::Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert!(counter.load(Ordering::Relaxed) >= 3);

        stream.stop().unwrap();
        let settled = counter.load(Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(20));
        // A callback may have been mid-flight at stop; after that, nothing.
        assert!(counter.load(Ordering::Relaxed) <= settled + 1);
    }

    #[test]
    fn negotiation_echoes_request() {
        let backend = NullBackend::new();
        let stream = backend
            .open_output(
                &StreamRequest {
                    device_id: None,
                    spec: AudioSpec::new(44100, 1),
                    period_frames: 256,
                },
                Box::new(|out| out.fill(0.0)),
                Box::new(|_| {}),
            )
            .unwrap();
        assert_eq!(stream.spec(), AudioSpec::new(44100, 1));
        assert_eq!(stream.period_frames(), 256);
    }
}
