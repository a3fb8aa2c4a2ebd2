//! Engine event stream
//!
//! Background contexts (the feed thread, the device error callback) report
//! through a channel rather than synchronously: the real-time callback
//! never surfaces errors itself, it emits silence and lets the background
//! side observe and report the fault.

use crate::playback::state::SessionState;
use serde::Serialize;
use uuid::Uuid;

/// Events emitted by a playback session.
///
/// Delivered over a `crossbeam_channel`; obtain the receiver with
/// [`PlaybackSession::events`](crate::PlaybackSession::events).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The session state machine advanced.
    StateChanged {
        session: Uuid,
        state: SessionState,
    },

    /// Playback position report, in frames of the source stream.
    Progress {
        session: Uuid,
        frames: u64,
    },

    /// Corrupt frames were skipped; playback continues.
    DecodeWarning {
        session: Uuid,
        corrupt_packets: u64,
    },

    /// A seek was rejected by the source; position is unchanged.
    SeekRejected {
        session: Uuid,
    },

    /// The decoder reached end of stream; buffered audio is still draining.
    EndOfStream {
        session: Uuid,
    },

    /// The device stream was stopped (suspended pause or teardown).
    DeviceStopped {
        session: Uuid,
    },

    /// Unrecoverable failure; the session has moved to `Errored`.
    Fault {
        session: Uuid,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged() {
        let event = EngineEvent::EndOfStream {
            session: Uuid::nil(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"end_of_stream\""));
    }
}
