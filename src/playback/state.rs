//! Playback session state machine
//!
//! `Closed → Opening → Ready → Playing ⇄ Paused → Stopping → Closed`, with
//! `Opening` and `Playing` able to fall into `Errored` on unrecoverable
//! failure. From `Errored` only closing is reachable.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`PlaybackSession`](crate::PlaybackSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Closed,
    Opening,
    Ready,
    Playing,
    Paused,
    Stopping,
    Errored,
}

impl SessionState {
    /// Whether the transition `self -> next` is part of the lifecycle.
    pub fn can_transition(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed, Opening) => true,
            (Opening, Ready) | (Opening, Errored) => true,
            (Ready, Playing) | (Ready, Stopping) => true,
            (Playing, Paused) | (Playing, Stopping) | (Playing, Errored) => true,
            (Paused, Playing) | (Paused, Stopping) => true,
            (Errored, Stopping) => true,
            (Stopping, Closed) => true,
            _ => false,
        }
    }

    /// Whether seeking is permitted in this state.
    pub fn seekable(self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::Playing | SessionState::Paused
        )
    }

    /// Whether the session still holds resources.
    pub fn is_open(self) -> bool {
        !matches!(self, SessionState::Closed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Closed => write!(f, "closed"),
            SessionState::Opening => write!(f, "opening"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Playing => write!(f, "playing"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Stopping => write!(f, "stopping"),
            SessionState::Errored => write!(f, "errored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn happy_path_transitions() {
        for (from, to) in [
            (Closed, Opening),
            (Opening, Ready),
            (Ready, Playing),
            (Playing, Paused),
            (Paused, Playing),
            (Playing, Stopping),
            (Stopping, Closed),
        ] {
            assert!(from.can_transition(to), "{} -> {}", from, to);
        }
    }

    #[test]
    fn errored_only_reaches_stopping() {
        for next in [Closed, Opening, Ready, Playing, Paused] {
            assert!(!Errored.can_transition(next), "errored -> {}", next);
        }
        assert!(Errored.can_transition(Stopping));
    }

    #[test]
    fn seek_permitted_states() {
        assert!(Ready.seekable());
        assert!(Playing.seekable());
        assert!(Paused.seekable());
        assert!(!Closed.seekable());
        assert!(!Errored.seekable());
        assert!(!Stopping.seekable());
    }
}
