//! Playback pipeline: ring buffer, feed thread, session state machine

pub(crate) mod feeder;
pub mod ring_buffer;
pub mod session;
pub mod state;

pub use ring_buffer::{PlayoutRing, RingConsumer, RingMonitor, RingProducer, RingStats};
pub use session::{PlaybackSession, SessionStats};
pub use state::SessionState;
