//! Playback session orchestration
//!
//! A [`PlaybackSession`] wires one decoder, one converter, one ring buffer
//! and one device stream together and owns the lifecycle state machine.
//! The decode side lives on a dedicated feed thread; the device callback
//! only ever touches the ring consumer. Teardown happens in reverse
//! acquisition order and is idempotent, including from `Errored`.

use crate::config::{PausePolicy, PlayerConfig};
use crate::decode::{self, SourceInfo, StreamDecoder};
use crate::audio::resampler::StreamConverter;
use crate::error::{Error, Result};
use crate::events::EngineEvent;
use crate::output::{AudioBackend, OutputStream, StreamRequest};
use crate::playback::feeder::{FeederContext, FeederHandle};
use crate::playback::ring_buffer::{PlayoutRing, RingMonitor};
use crate::playback::state::SessionState;
use crate::runtime;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use symphonia::core::io::MediaSource;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Statistics snapshot for a running session.
#[derive(Debug, Clone, Copy)]
pub struct SessionStats {
    /// Source-frame playback position
    pub position_frames: u64,

    /// Ring underrun events seen by the device callback
    pub underruns: u64,

    /// Frames dropped under the `DropNewest` overrun policy
    pub dropped_frames: u64,

    /// Ring capacity in device frames
    pub ring_capacity_frames: usize,
}

/// One open source playing to one output device.
pub struct PlaybackSession {
    id: Uuid,
    state: SessionState,
    pause_policy: PausePolicy,
    info: SourceInfo,
    stream: Option<Box<dyn OutputStream>>,
    feeder: Option<FeederHandle>,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
    error_slot: Arc<Mutex<Option<Error>>>,
    faulted: Arc<AtomicBool>,
    position: Arc<AtomicU64>,
    ring_monitor: RingMonitor,
}

impl PlaybackSession {
    /// Open a byte source, sniffing its container format.
    pub fn open(
        source: Box<dyn MediaSource>,
        config: &PlayerConfig,
        backend: &dyn AudioBackend,
    ) -> Result<Self> {
        let decoder = decode::open_source(source)?;
        Self::open_with_decoder(decoder, config, backend)
    }

    /// Open an audio file, sniffing its container format.
    pub fn open_path(
        path: &std::path::Path,
        config: &PlayerConfig,
        backend: &dyn AudioBackend,
    ) -> Result<Self> {
        let decoder = decode::open_path(path)?;
        Self::open_with_decoder(decoder, config, backend)
    }

    /// Open an already-constructed decoder (custom sources, raw PCM).
    pub fn open_with_decoder(
        decoder: Box<dyn StreamDecoder>,
        config: &PlayerConfig,
        backend: &dyn AudioBackend,
    ) -> Result<Self> {
        runtime::ensure_init()?;
        config.validate()?;

        let id = Uuid::new_v4();
        let native = decoder.spec();
        let info = SourceInfo {
            container: decoder.container(),
            spec: native,
            total_frames: decoder.total_frames(),
        };
        debug!("Session {} opening: {} source, {}", id, info.container, native);

        let request = StreamRequest {
            device_id: config.device_id.clone(),
            spec: native,
            period_frames: config.buffer_period_frames,
        };

        // The ring is created in the device format, so the negotiated spec
        // must be known before the data callback (which owns the consumer)
        // is built.
        let device_spec = backend.probe_format(&request)?;

        let ring_frames = config
            .ring_capacity_frames
            .max(2 * config.buffer_period_frames as usize);
        let ring = PlayoutRing::new(ring_frames, device_spec.channels);
        let ring_monitor = ring.monitor();
        let (producer, mut consumer) = ring.split();

        let (events_tx, events_rx) = unbounded();
        let faulted = Arc::new(AtomicBool::new(false));
        let position = Arc::new(AtomicU64::new(0));
        let error_slot = Arc::new(Mutex::new(None));

        let data_callback = Box::new(move |out: &mut [f32]| {
            consumer.read_or_silence(out);
        });

        let error_callback = {
            let events_tx = events_tx.clone();
            let faulted = Arc::clone(&faulted);
            Box::new(move |message: &str| {
                faulted.store(true, Ordering::Release);
                let _ = events_tx.send(EngineEvent::Fault {
                    session: id,
                    message: format!("device stream failed: {}", message),
                });
            })
        };

        let stream = backend.open_output(&request, data_callback, error_callback)?;
        if stream.spec() != device_spec {
            return Err(Error::Device(format!(
                "backend negotiated {} after probing {}",
                stream.spec(),
                device_spec
            )));
        }

        let converter =
            StreamConverter::new(native, device_spec, config.resample_quality)?;

        let feeder = FeederHandle::spawn(FeederContext {
            session: id,
            decoder,
            converter,
            producer,
            overrun_policy: config.overrun_policy,
            events: events_tx.clone(),
            error_slot: Arc::clone(&error_slot),
            faulted: Arc::clone(&faulted),
            position: Arc::clone(&position),
        })?;

        runtime::register_session();

        let mut session = Self {
            id,
            state: SessionState::Opening,
            pause_policy: config.pause_policy,
            info,
            stream: Some(stream),
            feeder: Some(feeder),
            events_tx,
            events_rx,
            error_slot,
            faulted,
            position,
            ring_monitor,
        };
        session.set_state(SessionState::Ready);
        info!(
            "Session {} ready: {} -> {} ({} frame ring)",
            id, native, device_spec, ring_frames
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state, folding in faults observed since the last
    /// call.
    pub fn state(&mut self) -> SessionState {
        self.refresh_fault();
        self.state
    }

    /// Source format information.
    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    /// Playback position in source frames.
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Event receiver for this session (single consumer).
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.events_rx.clone()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            position_frames: self.position(),
            underruns: self.ring_monitor.underruns(),
            dropped_frames: self.ring_monitor.dropped_frames(),
            ring_capacity_frames: self.ring_monitor.capacity_frames(),
        }
    }

    /// Take the fatal error that moved the session to `Errored`, if any.
    pub fn take_error(&self) -> Option<Error> {
        self.error_slot.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Begin or resume playback: Ready/Paused → Playing.
    pub fn start(&mut self) -> Result<()> {
        self.refresh_fault();
        match self.state {
            SessionState::Ready | SessionState::Paused => {}
            state => {
                return Err(Error::InvalidState(format!(
                    "cannot start playback from {}",
                    state
                )))
            }
        }

        if let Some(feeder) = &self.feeder {
            feeder.resume();
        }
        if let Some(stream) = &mut self.stream {
            if let Err(e) = stream.start() {
                self.faulted.store(true, Ordering::Release);
                self.refresh_fault();
                return Err(e);
            }
        }
        self.set_state(SessionState::Playing);
        Ok(())
    }

    /// Pause playback: Playing → Paused.
    ///
    /// Under `Starve` the device stream keeps running and drains into
    /// silence; under `SuspendDevice` the stream itself is stopped.
    pub fn pause(&mut self) -> Result<()> {
        self.refresh_fault();
        if self.state != SessionState::Playing {
            return Err(Error::InvalidState(format!(
                "cannot pause from {}",
                self.state
            )));
        }

        if let Some(feeder) = &self.feeder {
            feeder.pause();
        }
        if self.pause_policy == PausePolicy::SuspendDevice {
            if let Some(stream) = &mut self.stream {
                stream.stop()?;
                let _ = self.events_tx.send(EngineEvent::DeviceStopped { session: self.id });
            }
        }
        self.set_state(SessionState::Paused);
        Ok(())
    }

    /// Seek to an absolute source frame; valid in Ready/Playing/Paused.
    ///
    /// On success the ring is flushed so no pre-seek audio is played.
    /// `SeekUnsupported` leaves the position unchanged and is non-fatal.
    pub fn seek(&mut self, frame: u64) -> Result<u64> {
        self.refresh_fault();
        if !self.state.seekable() {
            return Err(Error::InvalidState(format!(
                "cannot seek from {}",
                self.state
            )));
        }

        let feeder = self
            .feeder
            .as_ref()
            .ok_or_else(|| Error::InvalidState("feed thread is gone".to_string()))?;
        feeder.seek(frame)
    }

    /// Stop playback and release all resources. Alias of [`close`](Self::close).
    pub fn stop(&mut self) -> Result<()> {
        self.close()
    }

    /// Tear the session down in reverse acquisition order.
    ///
    /// Idempotent, safe from every state including `Errored`, and always
    /// reaches `Closed`.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.set_state(SessionState::Stopping);

        // Device first: after this no callback runs, so the consumer half
        // dies with the stream.
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.stop() {
                warn!("Session {}: device stop during close failed: {}", self.id, e);
            }
            let _ = self.events_tx.send(EngineEvent::DeviceStopped { session: self.id });
        }

        // Then the feed thread; join before the shared state goes away.
        if let Some(mut feeder) = self.feeder.take() {
            feeder.stop_and_join();
        }

        self.set_state(SessionState::Closed);
        runtime::unregister_session();
        info!("Session {} closed", self.id);
        Ok(())
    }

    /// Move to `Errored` if a background context deposited a fault.
    fn refresh_fault(&mut self) {
        if self.faulted.load(Ordering::Acquire)
            && matches!(
                self.state,
                SessionState::Opening
                    | SessionState::Ready
                    | SessionState::Playing
                    | SessionState::Paused
            )
        {
            self.set_state(SessionState::Errored);
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition(next) || next == SessionState::Errored,
            "invalid transition {} -> {}",
            self.state,
            next
        );
        debug!("Session {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        let _ = self.events_tx.send(EngineEvent::StateChanged {
            session: self.id,
            state: next,
        });
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
