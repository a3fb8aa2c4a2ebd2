//! Decode/feed worker thread
//!
//! One dedicated thread per session looping decode → convert → ring write.
//! Control arrives over a command channel and is observed between frame
//! blocks, never mid-block, so a cancelled worker always leaves the decoder
//! in a consistent state. Fatal errors are deposited in the session's error
//! slot and reported as a `Fault` event; the worker itself never panics the
//! pipeline.

use crate::audio::resampler::StreamConverter;
use crate::config::OverrunPolicy;
use crate::decode::StreamDecoder;
use crate::error::{Error, Result};
use crate::events::EngineEvent;
use crate::playback::ring_buffer::RingProducer;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Frames decoded per loop iteration.
const DECODE_BLOCK_FRAMES: usize = 1024;

/// Emit a progress event every this many blocks.
const PROGRESS_EVERY_BLOCKS: u32 = 8;

/// How long a blocked write waits before re-checking for commands.
const WRITE_RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// Commands accepted by the worker.
enum FeederCommand {
    Resume,
    Pause,
    Seek {
        frame: u64,
        reply: Sender<Result<u64>>,
    },
    Stop,
}

/// What a blocked ring write was interrupted by.
enum WriteOutcome {
    Done,
    Seek {
        frame: u64,
        reply: Sender<Result<u64>>,
    },
    Stop,
}

/// Everything the worker thread owns.
pub(crate) struct FeederContext {
    pub session: Uuid,
    pub decoder: Box<dyn StreamDecoder>,
    pub converter: StreamConverter,
    pub producer: RingProducer,
    pub overrun_policy: OverrunPolicy,
    pub events: Sender<EngineEvent>,
    pub error_slot: Arc<Mutex<Option<Error>>>,
    pub faulted: Arc<AtomicBool>,
    pub position: Arc<AtomicU64>,
}

/// Session-side handle to the worker thread.
pub(crate) struct FeederHandle {
    commands: Sender<FeederCommand>,
    worker: Option<JoinHandle<()>>,
}

impl FeederHandle {
    /// Spawn the worker. It starts idle; `resume` begins feeding.
    pub fn spawn(ctx: FeederContext) -> Result<Self> {
        let (commands, command_rx) = unbounded();
        let session = ctx.session;
        let worker = std::thread::Builder::new()
            .name(format!("playhead-feed-{}", session))
            .spawn(move || Feeder::new(ctx, command_rx).run())?;

        Ok(Self {
            commands,
            worker: Some(worker),
        })
    }

    pub fn resume(&self) {
        let _ = self.commands.send(FeederCommand::Resume);
    }

    pub fn pause(&self) {
        let _ = self.commands.send(FeederCommand::Pause);
    }

    /// Seek and wait for the worker to acknowledge between blocks.
    pub fn seek(&self, frame: u64) -> Result<u64> {
        let (reply_tx, reply_rx) = bounded(1);
        self.commands
            .send(FeederCommand::Seek {
                frame,
                reply: reply_tx,
            })
            .map_err(|_| Error::InvalidState("feed thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| Error::InvalidState("feed thread is gone".to_string()))?
    }

    /// Signal the worker to exit and wait for it to acknowledge.
    pub fn stop_and_join(&mut self) {
        let _ = self.commands.send(FeederCommand::Stop);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Feed thread panicked during teardown");
            }
        }
    }
}

impl Drop for FeederHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

struct Feeder {
    ctx: FeederContext,
    commands: Receiver<FeederCommand>,
    feeding: bool,
    eof: bool,
    reported_corrupt: u64,
    blocks_since_progress: u32,
}

impl Feeder {
    fn new(ctx: FeederContext, commands: Receiver<FeederCommand>) -> Self {
        Self {
            ctx,
            commands,
            feeding: false,
            eof: false,
            reported_corrupt: 0,
            blocks_since_progress: 0,
        }
    }

    fn run(mut self) {
        debug!("Feed thread for session {} started", self.ctx.session);

        loop {
            // Idle (paused, finished, or faulted) blocks on the channel;
            // active feeding only polls so decoding keeps moving.
            let command = if self.feeding && !self.eof {
                match self.commands.try_recv() {
                    Ok(cmd) => Some(cmd),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                match self.commands.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                }
            };

            if let Some(command) = command {
                match command {
                    FeederCommand::Resume => self.feeding = true,
                    FeederCommand::Pause => self.feeding = false,
                    FeederCommand::Seek { frame, reply } => self.handle_seek(frame, reply),
                    FeederCommand::Stop => break,
                }
                continue;
            }

            if !self.feed_one_block() {
                break;
            }
        }

        debug!("Feed thread for session {} exiting", self.ctx.session);
    }

    /// Decode, convert and enqueue one block. Returns false to exit.
    fn feed_one_block(&mut self) -> bool {
        match self.ctx.decoder.decode(DECODE_BLOCK_FRAMES) {
            Ok(Some(block)) => {
                self.report_corrupt_packets();

                let samples = match self.ctx.converter.convert(&block) {
                    Ok(samples) => samples,
                    Err(e) => return self.fault(e),
                };

                let outcome = self.write_out(&samples);
                self.ctx
                    .position
                    .store(self.ctx.decoder.position(), Ordering::Relaxed);

                self.blocks_since_progress += 1;
                if self.blocks_since_progress >= PROGRESS_EVERY_BLOCKS {
                    self.blocks_since_progress = 0;
                    let _ = self.ctx.events.send(EngineEvent::Progress {
                        session: self.ctx.session,
                        frames: self.ctx.decoder.position(),
                    });
                }

                self.resolve(outcome)
            }
            Ok(None) => {
                let tail = match self.ctx.converter.finish() {
                    Ok(tail) => tail,
                    Err(e) => return self.fault(e),
                };
                let outcome = self.write_out(&tail);
                self.eof = true;
                let _ = self.ctx.events.send(EngineEvent::EndOfStream {
                    session: self.ctx.session,
                });
                debug!("Session {} reached end of stream", self.ctx.session);
                self.resolve(outcome)
            }
            Err(e) if e.is_recoverable() => {
                // A backend may surface single corrupt frames as errors;
                // skip them the same way in-backend skipping works.
                warn!("Skipping corrupt frame: {}", e);
                self.reported_corrupt = self
                    .ctx
                    .decoder
                    .corrupt_packets()
                    .max(self.reported_corrupt + 1);
                let _ = self.ctx.events.send(EngineEvent::DecodeWarning {
                    session: self.ctx.session,
                    corrupt_packets: self.reported_corrupt,
                });
                true
            }
            Err(e) => self.fault(e),
        }
    }

    /// Apply a write outcome; returns false when the worker must exit.
    fn resolve(&mut self, outcome: WriteOutcome) -> bool {
        match outcome {
            WriteOutcome::Done => true,
            WriteOutcome::Seek { frame, reply } => {
                self.handle_seek(frame, reply);
                true
            }
            WriteOutcome::Stop => false,
        }
    }

    /// Write converted samples into the ring per the overrun policy.
    fn write_out(&mut self, samples: &[f32]) -> WriteOutcome {
        let channels = self.ctx.converter.out_spec().channels as usize;

        match self.ctx.overrun_policy {
            OverrunPolicy::DropNewest => {
                let frames = samples.len() / channels;
                let written = self.ctx.producer.try_write(samples);
                if written < frames {
                    self.ctx.producer.note_dropped(frames - written);
                }
                WriteOutcome::Done
            }
            OverrunPolicy::Block => {
                let mut offset = 0;
                while offset < samples.len() {
                    let written = self.ctx.producer.try_write(&samples[offset..]);
                    offset += written * channels;
                    if offset >= samples.len() {
                        break;
                    }

                    // Ring full: wait for the consumer, staying responsive
                    // to control while blocked.
                    match self.commands.recv_timeout(WRITE_RETRY_INTERVAL) {
                        Ok(FeederCommand::Resume) => self.feeding = true,
                        Ok(FeederCommand::Pause) => self.feeding = false,
                        Ok(FeederCommand::Seek { frame, reply }) => {
                            // The rest of this block predates the seek.
                            return WriteOutcome::Seek { frame, reply };
                        }
                        Ok(FeederCommand::Stop) => return WriteOutcome::Stop,
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => return WriteOutcome::Stop,
                    }
                }
                WriteOutcome::Done
            }
        }
    }

    fn handle_seek(&mut self, frame: u64, reply: Sender<Result<u64>>) {
        match self.ctx.decoder.seek(frame) {
            Ok(landed) => {
                self.ctx.converter.reset();
                self.ctx.producer.flush();
                self.eof = false;
                self.ctx.position.store(landed, Ordering::Relaxed);
                debug!("Session {} seek -> frame {}", self.ctx.session, landed);
                let _ = reply.send(Ok(landed));
            }
            Err(Error::SeekUnsupported) => {
                let _ = self.ctx.events.send(EngineEvent::SeekRejected {
                    session: self.ctx.session,
                });
                let _ = reply.send(Err(Error::SeekUnsupported));
            }
            Err(e) => {
                let message = e.to_string();
                let _ = reply.send(Err(e));
                self.fault(Error::Malformed(message));
            }
        }
    }

    /// Report newly skipped corrupt packets as a warning event.
    fn report_corrupt_packets(&mut self) {
        let corrupt = self.ctx.decoder.corrupt_packets();
        if corrupt > self.reported_corrupt {
            self.reported_corrupt = corrupt;
            let _ = self.ctx.events.send(EngineEvent::DecodeWarning {
                session: self.ctx.session,
                corrupt_packets: corrupt,
            });
        }
    }

    /// Deposit a fatal error and stop feeding. Returns true: the worker
    /// stays alive so stop/close can still tear it down cleanly.
    fn fault(&mut self, e: Error) -> bool {
        error!("Session {} faulted: {}", self.ctx.session, e);
        let message = e.to_string();
        if let Ok(mut slot) = self.ctx.error_slot.lock() {
            slot.get_or_insert(e);
        }
        self.ctx.faulted.store(true, Ordering::Release);
        let _ = self.ctx.events.send(EngineEvent::Fault {
            session: self.ctx.session,
            message,
        });
        self.feeding = false;
        true
    }
}
