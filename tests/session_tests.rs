//! Playback session lifecycle tests
//!
//! Runs real sessions against the null output backend: no audio hardware,
//! same callback contract. Serialized because session accounting is
//! process-wide.

use playhead::{
    AudioSpec, ContainerKind, EngineEvent, Error, FrameBlock, NullBackend, OverrunPolicy,
    PlaybackSession, PlayerConfig, SessionState, StreamDecoder,
};
use serial_test::serial;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

fn test_config() -> PlayerConfig {
    PlayerConfig {
        buffer_period_frames: 256,
        ring_capacity_frames: 1024,
        ..Default::default()
    }
}

fn write_wav(dir: &tempfile::TempDir, seconds: f64, sample_rate: u32) -> PathBuf {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let path = dir.path().join("clip.wav");
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let frames = (seconds * sample_rate as f64) as usize;
    for i in 0..frames {
        writer
            .write_sample(((i % 64) as i16 - 32) * 256)
            .unwrap();
    }
    writer.finalize().unwrap();
    path
}

/// Wait for a matching event, draining others.
fn wait_for(
    events: &crossbeam_channel::Receiver<EngineEvent>,
    mut pred: impl FnMut(&EngineEvent) -> bool,
) -> EngineEvent {
    let deadline = std::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let remaining = deadline
            .checked_duration_since(std::time::Instant::now())
            .expect("timed out waiting for event");
        let event = events.recv_timeout(remaining).expect("event channel closed");
        if pred(&event) {
            return event;
        }
    }
}

#[test]
#[serial]
fn plays_wav_to_end_and_closes() {
    playhead::init().unwrap();
    let sessions_before = playhead::live_sessions();

    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir, 0.25, 8000);

    let backend = NullBackend::unpaced();
    let mut session = PlaybackSession::open_path(&path, &test_config(), &backend).unwrap();
    let events = session.events();

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.info().container, ContainerKind::Wav);
    assert_eq!(playhead::live_sessions(), sessions_before + 1);

    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Playing);

    wait_for(&events, |e| matches!(e, EngineEvent::EndOfStream { .. }));
    assert_eq!(session.position(), 2000);

    session.close().unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(playhead::live_sessions(), sessions_before);
}

#[test]
#[serial]
fn close_from_ready_without_playing() {
    playhead::init().unwrap();
    let sessions_before = playhead::live_sessions();

    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir, 0.1, 8000);

    let backend = NullBackend::unpaced();
    let mut session = PlaybackSession::open_path(&path, &test_config(), &backend).unwrap();
    session.close().unwrap();
    assert_eq!(session.state(), SessionState::Closed);

    // Idempotent, and stop() is the same teardown.
    session.close().unwrap();
    session.stop().unwrap();
    assert_eq!(playhead::live_sessions(), sessions_before);
}

#[test]
#[serial]
fn pause_and_resume_round_trip() {
    playhead::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir, 2.0, 44100);

    let backend = NullBackend::new();
    let mut session = PlaybackSession::open_path(&path, &test_config(), &backend).unwrap();

    session.start().unwrap();
    session.pause().unwrap();
    assert_eq!(session.state(), SessionState::Paused);

    // Pausing twice is an error, resuming works.
    assert!(matches!(session.pause(), Err(Error::InvalidState(_))));
    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Playing);

    session.close().unwrap();
}

#[test]
#[serial]
fn seek_mid_playback_returns_landed_frame() {
    playhead::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir, 1.0, 8000);

    let backend = NullBackend::unpaced();
    let mut session = PlaybackSession::open_path(&path, &test_config(), &backend).unwrap();
    let events = session.events();

    session.start().unwrap();
    let landed = session.seek(0).unwrap();
    assert_eq!(landed, 0);

    // The stream still runs to completion after the rewind.
    wait_for(&events, |e| matches!(e, EngineEvent::EndOfStream { .. }));
    session.close().unwrap();
}

#[test]
#[serial]
fn seek_in_ready_state_is_valid() {
    playhead::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir, 1.0, 8000);

    let backend = NullBackend::unpaced();
    let mut session = PlaybackSession::open_path(&path, &test_config(), &backend).unwrap();

    let landed = session.seek(4000).unwrap();
    assert_eq!(landed, 4000);
    assert_eq!(session.position(), 4000);

    session.close().unwrap();
}

// ---------------------------------------------------------------------------
// Scripted decoders: codec-independent fault and recovery scenarios
// ---------------------------------------------------------------------------

enum Step {
    Block(usize),
    CorruptFrame,
    Fatal,
}

/// Decoder that replays a fixed script of outcomes.
struct ScriptedDecoder {
    spec: AudioSpec,
    steps: VecDeque<Step>,
    position: u64,
    corrupt: u64,
    seekable: bool,
}

impl ScriptedDecoder {
    fn new(steps: Vec<Step>, seekable: bool) -> Self {
        Self {
            spec: AudioSpec::new(8000, 1),
            steps: steps.into(),
            position: 0,
            corrupt: 0,
            seekable,
        }
    }
}

impl StreamDecoder for ScriptedDecoder {
    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn container(&self) -> ContainerKind {
        ContainerKind::RawPcm
    }

    fn total_frames(&self) -> Option<u64> {
        None
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn decode(&mut self, max_frames: usize) -> playhead::Result<Option<FrameBlock>> {
        match self.steps.pop_front() {
            Some(Step::Block(frames)) => {
                let frames = frames.min(max_frames);
                self.position += frames as u64;
                Ok(Some(FrameBlock::new(self.spec, vec![0.1; frames])))
            }
            Some(Step::CorruptFrame) => {
                self.corrupt += 1;
                Err(Error::FrameCorrupt("scripted corruption".to_string()))
            }
            Some(Step::Fatal) => Err(Error::Malformed("scripted fatal error".to_string())),
            None => Ok(None),
        }
    }

    fn seek(&mut self, frame: u64) -> playhead::Result<u64> {
        if self.seekable {
            self.position = frame;
            Ok(frame)
        } else {
            Err(Error::SeekUnsupported)
        }
    }

    fn corrupt_packets(&self) -> u64 {
        self.corrupt
    }
}

#[test]
#[serial]
fn corrupt_frame_is_skipped_not_fatal() {
    playhead::init().unwrap();

    let decoder = ScriptedDecoder::new(
        vec![
            Step::Block(256),
            Step::CorruptFrame,
            Step::Block(256),
        ],
        false,
    );

    let backend = NullBackend::unpaced();
    let mut session =
        PlaybackSession::open_with_decoder(Box::new(decoder), &test_config(), &backend).unwrap();
    let events = session.events();

    session.start().unwrap();

    // The warning arrives, and the stream still finishes normally.
    wait_for(&events, |e| matches!(e, EngineEvent::DecodeWarning { .. }));
    wait_for(&events, |e| matches!(e, EngineEvent::EndOfStream { .. }));

    assert_eq!(session.state(), SessionState::Playing);
    assert!(session.take_error().is_none());
    session.close().unwrap();
}

#[test]
#[serial]
fn fatal_decode_error_moves_session_to_errored() {
    playhead::init().unwrap();
    let sessions_before = playhead::live_sessions();

    let decoder = ScriptedDecoder::new(vec![Step::Block(256), Step::Fatal], false);

    let backend = NullBackend::unpaced();
    let mut session =
        PlaybackSession::open_with_decoder(Box::new(decoder), &test_config(), &backend).unwrap();
    let events = session.events();

    session.start().unwrap();
    wait_for(&events, |e| matches!(e, EngineEvent::Fault { .. }));

    assert_eq!(session.state(), SessionState::Errored);
    assert!(matches!(session.take_error(), Some(Error::Malformed(_))));

    // Only close() is reachable from Errored, and it always succeeds.
    assert!(matches!(session.start(), Err(Error::InvalidState(_))));
    assert!(matches!(session.seek(0), Err(Error::InvalidState(_))));
    session.close().unwrap();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(playhead::live_sessions(), sessions_before);
}

#[test]
#[serial]
fn unseekable_source_reports_seek_unsupported() {
    playhead::init().unwrap();

    let decoder = ScriptedDecoder::new(vec![Step::Block(256), Step::Block(256)], false);

    let backend = NullBackend::unpaced();
    let mut session =
        PlaybackSession::open_with_decoder(Box::new(decoder), &test_config(), &backend).unwrap();

    let position_before = session.position();
    assert!(matches!(session.seek(100), Err(Error::SeekUnsupported)));
    assert_eq!(session.position(), position_before);

    // Non-fatal: the session is still usable.
    session.start().unwrap();
    assert_eq!(session.state(), SessionState::Playing);
    session.close().unwrap();
}

#[test]
#[serial]
fn drop_newest_policy_counts_dropped_frames() {
    playhead::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(&dir, 1.0, 44100);

    let config = PlayerConfig {
        overrun_policy: OverrunPolicy::DropNewest,
        buffer_period_frames: 128,
        ring_capacity_frames: 256,
        ..Default::default()
    };

    // Paced backend: the decoder outruns the wall-clock consumer by far,
    // so the tiny ring must overflow.
    let backend = NullBackend::new();
    let mut session = PlaybackSession::open_path(&path, &config, &backend).unwrap();
    let events = session.events();

    session.start().unwrap();
    wait_for(&events, |e| matches!(e, EngineEvent::EndOfStream { .. }));

    assert!(
        session.stats().dropped_frames > 0,
        "expected overruns with a 256-frame ring and a 1s source"
    );
    session.close().unwrap();
}

#[test]
#[serial]
fn uninitialized_engine_rejects_open() {
    // This test must not assume engine state left by others: force the
    // shutdown path by closing everything first.
    if playhead::live_sessions() == 0 {
        let _ = playhead::shutdown();
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(&dir, 0.1, 8000);
        let backend = NullBackend::unpaced();

        let result = PlaybackSession::open_path(&path, &test_config(), &backend);
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }
    playhead::init().unwrap();
}
